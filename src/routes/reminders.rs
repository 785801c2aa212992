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
    models::reminder::{Frequency, MedicationReminder, ReminderCategory, ReminderForm},
    state::AppState,
};

const VIEW: &str = "your medication reminders";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(reminders_page).post(create_reminder))
        .route("/:id", get(reminder_detail).post(update_reminder))
        .route("/:id/delete", get(confirm_delete).post(delete_reminder))
}

#[derive(Template)]
#[template(path = "reminders/index.html")]
struct RemindersTemplate {
    layout: Layout,
    reminders: Vec<MedicationReminder>,
    form: ReminderForm,
    editing: Option<i64>,
    error_message: Option<String>,
    frequencies: [Frequency; 3],
    categories: [ReminderCategory; 4],
}

async fn render_page(
    state: &AppState,
    jar: PrivateCookieJar,
    status: StatusCode,
    form: ReminderForm,
    editing: Option<i64>,
    error_message: Option<String>,
) -> Result<Response, AppError> {
    let reminders = state.api.reminders().await?;
    let (jar, layout) = Layout::load(state, jar).await;
    Ok((
        jar,
        render_status(
            status,
            RemindersTemplate {
                layout,
                reminders,
                form,
                editing,
                error_message,
                frequencies: Frequency::ALL,
                categories: ReminderCategory::ALL,
            },
        ),
    )
        .into_response())
}

async fn reminders_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Query(query): Query<EditQuery>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let editing = query.id("reminder")?;
    let form = match editing {
        Some(id) => ReminderForm::from_reminder(&state.api.reminder(id).await?),
        None => ReminderForm::default(),
    };
    render_page(&state, jar, StatusCode::OK, form, editing, None).await
}

async fn create_reminder(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Form(form): Form<ReminderForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    save(state, jar, None, form).await
}

async fn update_reminder(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<ReminderForm>,
) -> Result<Response, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "reminder")?;
    save(state, jar, Some(id), form).await
}

async fn save(
    state: AppState,
    jar: PrivateCookieJar,
    id: Option<i64>,
    form: ReminderForm,
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
        Some(id) => state.api.update_reminder(id, &payload).await,
        None => state.api.create_reminder(&payload).await,
    };
    let jar = match result {
        Ok(ack) => {
            info!(?id, name = %payload.name, "reminder saved");
            // New or moved reminders change what is upcoming.
            state.poller.refresh().await;
            let fallback = if id.is_some() {
                "Reminder updated successfully!"
            } else {
                "Reminder added successfully!"
            };
            auth::flash_success(jar, ack.text().unwrap_or(fallback))
        }
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => {
            warn!(?id, "saving reminder failed: {err}");
            auth::flash_error(jar, err.message_or("Failed to save reminder."))
        }
    };
    Ok((jar, Redirect::to("/reminders")).into_response())
}

#[derive(Template)]
#[template(path = "reminders/detail.html")]
struct ReminderDetailTemplate {
    layout: Layout,
    reminder: MedicationReminder,
}

async fn reminder_detail(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "reminder")?;
    let reminder = state.api.reminder(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((jar, render(ReminderDetailTemplate { layout, reminder })))
}

async fn confirm_delete(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "reminder")?;
    let reminder = state.api.reminder(id).await.map_err(not_found_on_404)?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(ConfirmDeleteTemplate {
            layout,
            what: "reminder",
            summary: format!("{} at {}", reminder.name, reminder.time),
            action: format!("/reminders/{id}/delete"),
            back: "/reminders".into(),
        }),
    ))
}

async fn delete_reminder(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "reminder")?;
    let jar = match state.api.delete_reminder(id).await {
        Ok(_) => {
            info!(id, "reminder deleted");
            state.poller.refresh().await;
            auth::flash_success(jar, "Reminder deleted.")
        }
        Err(err) => {
            warn!(id, "deleting reminder failed: {err}");
            auth::flash_error(jar, err.message_or("Failed to delete reminder."))
        }
    };
    Ok((jar, Redirect::to("/reminders")))
}
