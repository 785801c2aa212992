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
    models::cycle::{Cycle, CycleForm, DurationChart, FlowIntensity},
    state::AppState,
};

const VIEW: &str = "your cycles";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cycles_page).post(create_cycle))
        .route("/:id", get(cycle_detail).post(update_cycle))
        .route("/:id/delete", get(confirm_delete).post(delete_cycle))
}

#[derive(Template)]
#[template(path = "cycles/index.html")]
struct CyclesTemplate {
    layout: Layout,
    cycles: Vec<Cycle>,
    chart: DurationChart,
    form: CycleForm,
    editing: Option<i64>,
    error_message: Option<String>,
    flows: [FlowIntensity; 4],
}

async fn render_page(
    state: &AppState,
    jar: PrivateCookieJar,
    status: StatusCode,
    form: CycleForm,
    editing: Option<i64>,
    error_message: Option<String>,
) -> Result<Response, AppError> {
    let cycles = state.api.cycles().await?;
    let chart = DurationChart::from_cycles(&cycles);
    let (jar, layout) = Layout::load(state, jar).await;
    Ok((
        jar,
        render_status(
            status,
            CyclesTemplate {
                layout,
                cycles,
                chart,
                form,
                editing,
                error_message,
                flows: FlowIntensity::ALL,
            },
        ),
    )
        .into_response())
}

async fn cycles_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Query(query): Query<EditQuery>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let editing = query.id("cycle")?;
    let form = match editing {
        Some(id) => CycleForm::from_cycle(&state.api.cycle(id).await?),
        None => CycleForm::default(),
    };
    render_page(&state, jar, StatusCode::OK, form, editing, None).await
}

async fn create_cycle(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Form(form): Form<CycleForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    save(state, jar, None, form).await
}

async fn update_cycle(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CycleForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "cycle")?;
    save(state, jar, Some(id), form).await
}

async fn save(
    state: AppState,
    jar: PrivateCookieJar,
    id: Option<i64>,
    form: CycleForm,
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
        Some(id) => state.api.update_cycle(id, &payload).await,
        None => state.api.create_cycle(&payload).await,
    };
    let jar = match result {
        Ok(ack) => {
            info!(?id, start = %payload.start_date, "cycle saved");
            let fallback = if id.is_some() {
                "Cycle updated successfully!"
            } else {
                "Cycle added successfully!"
            };
            auth::flash_success(jar, ack.text().unwrap_or(fallback))
        }
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => {
            warn!(?id, "saving cycle failed: {err}");
            auth::flash_error(jar, err.message_or("Failed to save cycle."))
        }
    };
    Ok((jar, Redirect::to("/cycles")).into_response())
}

#[derive(Template)]
#[template(path = "cycles/detail.html")]
struct CycleDetailTemplate {
    layout: Layout,
    cycle: Cycle,
}

async fn cycle_detail(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "cycle")?;
    let cycle = state.api.cycle(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((jar, render(CycleDetailTemplate { layout, cycle })))
}

async fn confirm_delete(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "cycle")?;
    let cycle = state.api.cycle(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(ConfirmDeleteTemplate {
            layout,
            what: "cycle",
            summary: format!("{} to {}", cycle.start_date, cycle.end_text()),
            action: format!("/cycles/{id}/delete"),
            back: "/cycles".into(),
        }),
    ))
}

/// Deletes and goes back to the list whatever the outcome.
async fn delete_cycle(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "cycle")?;
    let jar = match state.api.delete_cycle(id).await {
        Ok(_) => {
            info!(id, "cycle deleted");
            auth::flash_success(jar, "Cycle deleted.")
        }
        Err(err) => {
            warn!(id, "deleting cycle failed: {err}");
            auth::flash_error(jar, err.message_or("Failed to delete cycle."))
        }
    };
    Ok((jar, Redirect::to("/cycles")))
}
