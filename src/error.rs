use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{api::ApiError, routes};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("not found")]
    NotFound,
    #[error("login required for {0}")]
    LoginRequired(&'static str),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::LoginRequired(view) => routes::login_required_page(view),
            AppError::NotFound => routes::not_found_page(),
            AppError::Api(ApiError::Unauthorized(_)) => {
                warn!("remote service rejected the session token");
                Redirect::to("/login").into_response()
            }
            AppError::Api(err) => {
                warn!("remote call failed: {err}");
                routes::error_page(StatusCode::BAD_GATEWAY, &err.user_message())
            }
            AppError::BadRequest(message) => routes::error_page(StatusCode::BAD_REQUEST, &message),
            AppError::Config(_) | AppError::Io(_) | AppError::Database(_) | AppError::Other(_) => {
                error!("request failed: {self}");
                routes::error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side.",
                )
            }
        }
    }
}
