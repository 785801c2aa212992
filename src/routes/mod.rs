pub mod cycles;
pub mod dashboard;
pub mod insights;
pub mod notifications;
pub mod public;
pub mod reminders;
pub mod symptoms;

use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::{
    api::ApiError,
    auth::{self, Flash},
    error::AppError,
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(dashboard::router())
        .merge(insights::router())
        .nest("/cycles", cycles::router())
        .nest("/symptoms", symptoms::router())
        .nest("/reminders", reminders::router())
        .nest("/notifications", notifications::router())
        .nest_service("/static", ServeDir::new("static"))
        .fallback(not_found)
        .with_state(state)
}

/// Everything `base.html` needs: nav state, the unread badge, a pending
/// flash banner and a due-notification alert.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub logged_in: bool,
    pub username: String,
    pub unread_count: usize,
    pub flash: Option<Flash>,
    pub alert: Option<String>,
}

impl Layout {
    pub async fn load(state: &AppState, jar: PrivateCookieJar) -> (PrivateCookieJar, Self) {
        let (jar, flash) = auth::take_flash(jar);
        let user = state.session.current_user();
        let (unread_count, alert) = if user.is_some() {
            let alert = state.poller.take_alert().await;
            (
                state.poller.unread_count().await,
                alert.map(|n| n.alert_text().to_string()),
            )
        } else {
            (0, None)
        };
        let layout = Self {
            logged_in: user.is_some(),
            username: user.map(|u| u.display_name().to_string()).unwrap_or_default(),
            unread_count,
            flash,
            alert,
        };
        (jar, layout)
    }

    /// Layout for pages rendered with no request context, such as error pages.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

pub fn render<T: Template + AskamaTemplateResponse>(template: T) -> Response {
    AskamaTemplateResponse::into_response(template)
}

pub fn render_status<T: Template + AskamaTemplateResponse>(status: StatusCode, template: T) -> Response {
    (status, render(template)).into_response()
}

/// `?edit=<id>` on list pages.
#[derive(Debug, Default, Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

impl EditQuery {
    pub fn id(&self, what: &'static str) -> Result<Option<i64>, AppError> {
        self.edit
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_id(raw, what))
            .transpose()
    }
}

pub fn parse_id(raw: &str, what: &'static str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {what} ID")))
}

/// A missing record reads as our own 404 page rather than a gateway error.
pub fn not_found_on_404(err: ApiError) -> AppError {
    match err.status() {
        Some(404) => AppError::NotFound,
        _ => err.into(),
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    layout: Layout,
    title: String,
    message: String,
}

#[derive(Template)]
#[template(path = "login_required.html")]
struct LoginRequiredTemplate {
    layout: Layout,
    view: &'static str,
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub layout: Layout,
    pub what: &'static str,
    pub summary: String,
    pub action: String,
    pub back: String,
}

pub fn login_required_page(view: &'static str) -> Response {
    render_status(
        StatusCode::UNAUTHORIZED,
        LoginRequiredTemplate {
            layout: Layout::bare(),
            view,
        },
    )
}

pub fn not_found_page() -> Response {
    error_page(StatusCode::NOT_FOUND, "That page does not exist.")
}

pub fn error_page(status: StatusCode, message: &str) -> Response {
    render_status(
        status,
        ErrorTemplate {
            layout: Layout::bare(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.to_string(),
        },
    )
}

async fn not_found() -> Response {
    not_found_page()
}
