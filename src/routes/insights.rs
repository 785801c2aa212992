use askama::Template;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Local;
use tracing::warn;

use super::{render, Layout};
use crate::{
    api::ApiError,
    auth::{self, CurrentUser},
    error::AppError,
    models::insights::Insights,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/insights", get(insights_page))
}

#[derive(Template)]
#[template(path = "insights.html")]
struct InsightsTemplate {
    layout: Layout,
    insights: Insights,
    care_tips: Vec<&'static str>,
    period_alert: Option<&'static str>,
}

async fn insights_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user("your insights")?;
    let (summary, predictions) = tokio::join!(
        state.api.insights_summary(),
        state.api.insights_predictions()
    );
    let mut failed = false;
    let insights = Insights {
        summary: loaded_or_default(summary, "insights summary", &mut failed)?,
        predictions: loaded_or_default(predictions, "insights predictions", &mut failed)?,
    };
    let jar = if failed {
        auth::flash_error(jar, "Failed to load insights data.")
    } else {
        jar
    };

    let today = Local::now().date_naive();
    let period_alert = state.period_alert.check(insights.next_period(), today).await?;
    let care_tips = insights.care_tips(today);

    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(InsightsTemplate {
            layout,
            insights,
            care_tips,
            period_alert,
        }),
    ))
}

/// A failed half of the page renders empty; only a rejected session aborts.
fn loaded_or_default<T: Default>(
    result: Result<T, ApiError>,
    what: &str,
    failed: &mut bool,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(err @ ApiError::Unauthorized(_)) => Err(err.into()),
        Err(err) => {
            warn!("loading {what} failed: {err}");
            *failed = true;
            Ok(T::default())
        }
    }
}
