use askama::Template;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Local;

use super::{render, Layout};
use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        cycle::DurationChart,
        dashboard::{ReminderBrief, SymptomTrend},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    layout: Layout,
    welcome_name: String,
    cycle_length: String,
    last_period: String,
    next_period: String,
    ovulation: String,
    chart: DurationChart,
    trend: SymptomTrend,
    symptom_lines: Vec<String>,
    reminders: Vec<ReminderBrief>,
    insight_lines: Vec<String>,
    care_tips: Vec<&'static str>,
}

async fn dashboard(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user("your dashboard")?;
    let data = state.api.dashboard().await?;
    let today = Local::now().date_naive();

    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((
        jar,
        render(DashboardTemplate {
            layout,
            welcome_name: data.welcome_name().to_string(),
            cycle_length: data.cycle_length_text(),
            last_period: data.last_period_text().to_string(),
            next_period: data.next_period_text().to_string(),
            ovulation: data.ovulation_text(),
            chart: data.duration_chart(),
            trend: data.symptom_trend(),
            symptom_lines: data.symptom_lines(),
            reminders: data.reminders.clone(),
            insight_lines: data.insight_lines(),
            care_tips: data.care_tips(today),
        }),
    ))
}
