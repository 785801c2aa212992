use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::warn;

use super::{parse_id, render, Layout};
use crate::{
    api::ApiError,
    auth::{self, CurrentUser},
    error::AppError,
    models::notification::{Notification, NotificationMode, NotificationSettings},
    state::AppState,
};

const VIEW: &str = "your notifications";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications_page))
        .route("/mode", post(toggle_mode))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
        .route("/:id/snooze", post(snooze))
        .route("/settings", get(settings_form).post(settings_submit))
}

#[derive(Template)]
#[template(path = "notifications/index.html")]
struct NotificationsTemplate {
    layout: Layout,
    items: Vec<Notification>,
    showing_all: bool,
    snooze_minutes: u32,
}

async fn notifications_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user(VIEW)?;
    match state.poller.fetch_due().await {
        Ok(_) => {}
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => warn!("loading notifications failed: {err}"),
    }
    let items = state.poller.items().await;
    let showing_all = state.poller.mode().await == NotificationMode::All;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(NotificationsTemplate {
            layout,
            items,
            showing_all,
            snooze_minutes: state.config.snooze_minutes,
        }),
    ))
}

async fn toggle_mode(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let mode = state.poller.mode().await.toggled();
    let jar = match state.poller.set_mode(mode).await {
        Ok(_) => jar,
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Could not load notifications.")),
    };
    Ok((jar, Redirect::to("/notifications")))
}

async fn mark_all_read(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let jar = match state.poller.mark_all_read().await {
        Ok(_) => auth::flash_success(jar, "All notifications marked as read."),
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Failed to mark notifications read.")),
    };
    Ok((jar, Redirect::to("/notifications")))
}

async fn mark_read(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "notification")?;
    let jar = match state.poller.mark_read(id).await {
        Ok(()) => jar,
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Failed to mark notification read.")),
    };
    Ok((jar, Redirect::to("/notifications")))
}

#[derive(Debug, Default, Deserialize)]
struct SnoozeForm {
    minutes: Option<u32>,
}

async fn snooze(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<SnoozeForm>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user(VIEW)?;
    let id = parse_id(&raw_id, "notification")?;
    let minutes = form
        .minutes
        .filter(|m| *m > 0)
        .unwrap_or(state.config.snooze_minutes);
    let jar = match state.poller.snooze(id, minutes).await {
        Ok(_) => auth::flash_success(jar, format!("Snoozed for {minutes} minutes.")),
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Failed to snooze notification.")),
    };
    Ok((jar, Redirect::to("/notifications")))
}

#[derive(Template)]
#[template(path = "notifications/settings.html")]
struct SettingsTemplate {
    layout: Layout,
}

async fn settings_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user("your notification settings")?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((jar, render(SettingsTemplate { layout })))
}

/// Unchecked boxes are simply absent from the submitted form.
#[derive(Debug, Default, Deserialize)]
struct SettingsForm {
    reminders_enabled: Option<String>,
    period_alerts_enabled: Option<String>,
}

impl SettingsForm {
    fn settings(&self) -> NotificationSettings {
        NotificationSettings {
            reminders_enabled: self.reminders_enabled.is_some(),
            period_alerts_enabled: self.period_alerts_enabled.is_some(),
        }
    }
}

async fn settings_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user("your notification settings")?;
    let jar = match state.api.update_notification_settings(&form.settings()).await {
        Ok(ack) => auth::flash_success(jar, ack.text().unwrap_or("Notification settings saved.")),
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Failed to save settings.")),
    };
    Ok((jar, Redirect::to("/notifications/settings")))
}
