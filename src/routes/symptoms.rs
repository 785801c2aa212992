use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use tracing::{info, warn};

use super::{
    not_found_on_404, parse_id, render, render_status, ConfirmDeleteTemplate, EditQuery, Layout,
};
use crate::{
    api::ApiError,
    auth::{self, CurrentUser},
    error::AppError,
    models::symptom::{
        group_by_recent_cycles, CycleSymptoms, Symptom, SymptomCategory, SymptomForm,
        MAX_SEVERITY, MIN_SEVERITY,
    },
    state::AppState,
};

const VIEW: &str = "your symptoms";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(symptoms_page).post(create_symptom))
        .route("/:id", get(symptom_detail).post(update_symptom))
        .route("/:id/delete", get(confirm_delete).post(delete_symptom))
}

#[derive(Template)]
#[template(path = "symptoms/index.html")]
struct SymptomsTemplate {
    layout: Layout,
    symptoms: Vec<Symptom>,
    by_cycle: Vec<CycleSymptoms>,
    form: SymptomForm,
    editing: Option<i64>,
    error_message: Option<String>,
    categories: [SymptomCategory; 4],
    type_groups: Vec<TypeGroup>,
    severities: Vec<u8>,
}

/// Type options of one category, for an `<optgroup>`.
struct TypeGroup {
    label: &'static str,
    types: Vec<&'static str>,
}

fn type_groups() -> Vec<TypeGroup> {
    SymptomCategory::ALL
        .iter()
        .map(|category| TypeGroup {
            label: category.as_str(),
            types: category.types().to_vec(),
        })
        .collect()
}

async fn render_page(
    state: &AppState,
    jar: PrivateCookieJar,
    status: StatusCode,
    form: SymptomForm,
    editing: Option<i64>,
    error_message: Option<String>,
) -> Result<Response, AppError> {
    let symptoms = state.api.symptoms().await?;
    // Grouping is a nicety; the log still renders when cycles are unavailable.
    let by_cycle = match state.api.cycles().await {
        Ok(cycles) => group_by_recent_cycles(&symptoms, &cycles),
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => {
            warn!("loading cycles for symptom grouping failed: {err}");
            Vec::new()
        }
    };
    let (jar, layout) = Layout::load(state, jar).await;
    Ok((
        jar,
        render_status(
            status,
            SymptomsTemplate {
                layout,
                symptoms,
                by_cycle,
                form,
                editing,
                error_message,
                categories: SymptomCategory::ALL,
                type_groups: type_groups(),
                severities: (MIN_SEVERITY..=MAX_SEVERITY).collect(),
            },
        ),
    )
        .into_response())
}

async fn symptoms_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Query(query): Query<EditQuery>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let editing = query.id("symptom")?;
    let form = match editing {
        Some(id) => SymptomForm::from_symptom(&state.api.symptom(id).await?),
        None => SymptomForm::default(),
    };
    render_page(&state, jar, StatusCode::OK, form, editing, None).await
}

async fn create_symptom(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Form(form): Form<SymptomForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    save(state, jar, None, form).await
}

async fn update_symptom(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<SymptomForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "symptom")?;
    save(state, jar, Some(id), form).await
}

async fn save(
    state: AppState,
    jar: PrivateCookieJar,
    id: Option<i64>,
    form: SymptomForm,
) -> Result<Response, AppError> {
    let payload = match form.validate() {
        Ok(payload) => payload,
        Err(err) => {
            return render_page(
                &state,
                jar,
                StatusCode::BAD_REQUEST,
                form,
                id,
                Some(err.to_string()),
            )
            .await
        }
    };

    let result = match id {
        Some(id) => state.api.update_symptom(id, &payload).await,
        None => state.api.create_symptom(&payload).await,
    };
    match result {
        Ok(ack) => {
            info!(?id, kind = %payload.symptom_type, "symptom saved");
            let fallback = if id.is_some() {
                "Symptom updated successfully!"
            } else {
                "Symptom logged successfully!"
            };
            let jar = auth::flash_success(jar, ack.text().unwrap_or(fallback));
            if id.is_some() {
                return Ok((jar, Redirect::to("/symptoms")).into_response());
            }
            // A fresh entry keeps date and category for quick follow-ups.
            render_page(&state, jar, StatusCode::OK, form.after_submit(), None, None).await
        }
        Err(err @ ApiError::Unauthorized(_)) => Err(err.into()),
        Err(err) => {
            warn!(?id, "saving symptom failed: {err}");
            let jar = auth::flash_error(jar, err.message_or("Failed to save symptom."));
            Ok((jar, Redirect::to("/symptoms")).into_response())
        }
    }
}

#[derive(Template)]
#[template(path = "symptoms/detail.html")]
struct SymptomDetailTemplate {
    layout: Layout,
    symptom: Symptom,
}

async fn symptom_detail(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "symptom")?;
    let symptom = state.api.symptom(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((jar, render(SymptomDetailTemplate { layout, symptom })))
}

async fn confirm_delete(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "symptom")?;
    let symptom = state.api.symptom(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(ConfirmDeleteTemplate {
            layout,
            what: "symptom",
            summary: format!("{} on {}", symptom.symptom_type, symptom.date),
            action: format!("/symptoms/{id}/delete"),
            back: "/symptoms".into(),
        }),
    ))
}

async fn delete_symptom(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "symptom")?;
    let jar = match state.api.delete_symptom(id).await {
        Ok(_) => {
            info!(id, "symptom deleted");
            auth::flash_success(jar, "Symptom deleted.")
        }
        Err(err) => {
            warn!(id, "deleting symptom failed: {err}");
            auth::flash_error(jar, err.message_or("Failed to delete symptom."))
        }
    };
    Ok((jar, Redirect::to("/symptoms")))
}
