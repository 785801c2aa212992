use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{render, render_status, Layout};
use crate::{
    api::ApiError,
    auth::{self, CurrentUser},
    error::AppError,
    models::{
        feedback::FeedbackPayload,
        user::{
            is_email_valid, is_identifier_valid, is_password_valid, ForgotPasswordPayload,
            LoginPayload, RegisterPayload, ResetPasswordPayload, MIN_PASSWORD_LEN,
        },
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/login/validate", post(login_validate))
        .route("/signup", get(signup_form).post(signup_submit))
        .route("/logout", post(logout))
        .route(
            "/forgot-password",
            get(forgot_password_form).post(forgot_password_submit),
        )
        .route(
            "/reset-password",
            get(reset_password_form).post(reset_password_submit),
        )
        .route("/profile/refresh", post(profile_refresh))
        .route("/feedback", get(feedback_form).post(feedback_submit))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    layout: Layout,
}

async fn landing(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    let (jar, layout) = Layout::load(&state, jar).await;
    (jar, render(LandingTemplate { layout }))
}

// Login

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    layout: Layout,
    error_message: Option<String>,
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    identifier: Option<String>,
}

async fn login_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Query(query): Query<LoginQuery>,
) -> Response {
    if current.is_logged_in() {
        return Redirect::to("/dashboard").into_response();
    }
    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render(LoginTemplate {
            layout,
            error_message: None,
            identifier: query.identifier.unwrap_or_default(),
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    password: String,
}

/// Local checks run before anything is sent.
fn check_credentials(form: &LoginForm) -> Result<(), String> {
    if form.identifier.trim().is_empty() || form.password.is_empty() {
        return Err("Please fill in all fields".into());
    }
    if !is_identifier_valid(&form.identifier) {
        return Err("Please enter a valid email address".into());
    }
    if !is_password_valid(&form.password) {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    Ok(())
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(message) = check_credentials(&form) {
        return Ok(render_login_error(&state, jar, form.identifier, message).await);
    }

    let payload = LoginPayload::from_identifier(&form.identifier, &form.password);
    match state.api.login(&payload).await {
        Ok(response) => {
            let session = state
                .session
                .set(response.user, response.access_token)
                .await?;
            info!(user = %session.user.username, "logged in");
            let jar = auth::flash_success(jar, "Login successful!");
            Ok((jar, Redirect::to("/dashboard")).into_response())
        }
        Err(err @ (ApiError::Unauthorized(_) | ApiError::Validation { .. })) => {
            let message = err.message_or("Invalid username or password");
            Ok(render_login_error(&state, jar, form.identifier, message).await)
        }
        Err(err) => {
            warn!("login failed: {err}");
            Ok(render_login_error(&state, jar, form.identifier, err.user_message()).await)
        }
    }
}

async fn render_login_error(
    state: &AppState,
    jar: PrivateCookieJar,
    identifier: String,
    message: String,
) -> Response {
    let (jar, layout) = Layout::load(state, jar).await;
    (
        jar,
        render_status(
            StatusCode::BAD_REQUEST,
            LoginTemplate {
                layout,
                error_message: Some(message),
                identifier,
            },
        ),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    message: String,
}

/// Credential pre-check for the login form's inline feedback.
async fn login_validate(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> (StatusCode, Json<ValidationResult>) {
    if let Err(message) = check_credentials(&form) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidationResult {
                valid: false,
                message,
            }),
        );
    }
    let payload = LoginPayload::from_identifier(&form.identifier, &form.password);
    match state.api.validate_login(&payload).await {
        Ok(ack) => (
            StatusCode::OK,
            Json(ValidationResult {
                valid: true,
                message: ack.text().unwrap_or("Credentials look good").to_string(),
            }),
        ),
        Err(err) => {
            let status = err
                .status()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                Json(ValidationResult {
                    valid: false,
                    message: err.message_or("Invalid username or password"),
                }),
            )
        }
    }
}

// Signup

#[derive(Template)]
#[template(path = "auth/signup.html")]
struct SignupTemplate {
    layout: Layout,
    error_message: Option<String>,
    username: String,
    email: String,
}

async fn signup_form(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render(SignupTemplate {
            layout,
            error_message: None,
            username: String::new(),
            email: String::new(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

fn check_signup(form: &SignupForm) -> Result<(), String> {
    if form.username.trim().is_empty()
        || form.email.trim().is_empty()
        || form.password.is_empty()
        || form.confirm_password.is_empty()
    {
        return Err("All fields are required".into());
    }
    if !is_email_valid(form.email.trim()) {
        return Err("Please enter a valid email address".into());
    }
    if !is_password_valid(&form.password) {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if form.password != form.confirm_password {
        return Err("Passwords do not match".into());
    }
    Ok(())
}

async fn signup_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if let Err(message) = check_signup(&form) {
        return Ok(render_signup_error(&state, jar, form, message).await);
    }

    let payload = RegisterPayload {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password.clone(),
    };
    match state.api.register(&payload).await {
        Ok(ack) => {
            info!(username = %payload.username, "account registered");
            let jar = auth::flash_success(
                jar,
                ack.text().unwrap_or("Signup successful! Please log in."),
            );
            let target = format!(
                "/login?identifier={}",
                url::form_urlencoded::byte_serialize(payload.username.as_bytes())
                    .collect::<String>()
            );
            Ok((jar, Redirect::to(&target)).into_response())
        }
        Err(err) => {
            let message = err.message_or("Signup failed");
            Ok(render_signup_error(&state, jar, form, message).await)
        }
    }
}

async fn render_signup_error(
    state: &AppState,
    jar: PrivateCookieJar,
    form: SignupForm,
    message: String,
) -> Response {
    let (jar, layout) = Layout::load(state, jar).await;
    (
        jar,
        render_status(
            StatusCode::BAD_REQUEST,
            SignupTemplate {
                layout,
                error_message: Some(message),
                username: form.username,
                email: form.email,
            },
        ),
    )
        .into_response()
}

// Logout, profile

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    state.session.clear().await?;
    // The poller also follows the session, but logout must not return
    // while a poll is still running.
    state.poller.stop().await;
    Ok((auth::flash_success(jar, "You have been logged out."), Redirect::to("/")))
}

async fn profile_refresh(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user("your profile")?;
    let profile = state.api.profile().await?;
    state.session.update_user(profile).await?;
    Ok((auth::flash_success(jar, "Profile refreshed."), Redirect::to("/dashboard")))
}

// Password reset

#[derive(Template)]
#[template(path = "auth/forgot_password.html")]
struct ForgotPasswordTemplate {
    layout: Layout,
    error_message: Option<String>,
    sent_message: Option<String>,
    email: String,
}

async fn forgot_password_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render(ForgotPasswordTemplate {
            layout,
            error_message: None,
            sent_message: None,
            email: String::new(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordForm {
    #[serde(default)]
    email: String,
}

async fn forgot_password_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let (error_message, sent_message) = if !is_email_valid(&email) {
        (Some("Please enter a valid email address".to_string()), None)
    } else {
        match state
            .api
            .forgot_password(&ForgotPasswordPayload {
                email: email.clone(),
            })
            .await
        {
            Ok(ack) => (
                None,
                Some(
                    ack.text()
                        .unwrap_or("If that address is registered, a reset link is on its way.")
                        .to_string(),
                ),
            ),
            Err(err) => (Some(err.message_or("Could not send the reset link")), None),
        }
    };
    let status = if error_message.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render_status(
            status,
            ForgotPasswordTemplate {
                layout,
                error_message,
                sent_message,
                email,
            },
        ),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    layout: Layout,
    error_message: Option<String>,
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResetQuery {
    token: Option<String>,
}

async fn reset_password_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<ResetQuery>,
) -> impl IntoResponse {
    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render(ResetPasswordTemplate {
            layout,
            error_message: None,
            token: query.token.unwrap_or_default(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ResetPasswordForm {
    #[serde(default)]
    token: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

async fn reset_password_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let problem = if form.token.trim().is_empty() {
        Some("The reset link is missing its token".to_string())
    } else if !is_password_valid(&form.password) {
        Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ))
    } else if form.password != form.confirm_password {
        Some("Passwords do not match".to_string())
    } else {
        None
    };

    let error_message = match problem {
        Some(message) => message,
        None => {
            let payload = ResetPasswordPayload {
                token: form.token.trim().to_string(),
                password: form.password.clone(),
            };
            match state.api.reset_password(&payload).await {
                Ok(ack) => {
                    let jar = auth::flash_success(
                        jar,
                        ack.text().unwrap_or("Password updated. Please log in."),
                    );
                    return (jar, Redirect::to("/login")).into_response();
                }
                Err(err) => err.message_or("Could not reset the password"),
            }
        }
    };

    let (jar, layout) = Layout::load(&state, jar).await;
    (
        jar,
        render_status(
            StatusCode::BAD_REQUEST,
            ResetPasswordTemplate {
                layout,
                error_message: Some(error_message),
                token: form.token,
            },
        ),
    )
        .into_response()
}

// Feedback

#[derive(Template)]
#[template(path = "feedback.html")]
struct FeedbackTemplate {
    layout: Layout,
}

async fn feedback_form(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user("the feedback form")?;
    let (jar, layout) = Layout::load(&state, jar).await;
    Ok((jar, render(FeedbackTemplate { layout })))
}

#[derive(Debug, Deserialize)]
struct FeedbackForm {
    #[serde(default)]
    feedback: String,
}

async fn feedback_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    current: CurrentUser,
    Form(form): Form<FeedbackForm>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    current.require_user("the feedback form")?;
    let feedback = form.feedback.trim();
    if feedback.is_empty() {
        let jar = auth::flash_error(jar, "Please write something before sending.");
        return Ok((jar, Redirect::to("/feedback")));
    }
    let jar = match state
        .api
        .submit_feedback(&FeedbackPayload {
            feedback: feedback.to_string(),
        })
        .await
    {
        Ok(ack) => auth::flash_success(jar, ack.text().unwrap_or("Thanks for your feedback!")),
        Err(err @ ApiError::Unauthorized(_)) => return Err(err.into()),
        Err(err) => auth::flash_error(jar, err.message_or("Could not send feedback")),
    };
    Ok((jar, Redirect::to("/feedback")))
}
