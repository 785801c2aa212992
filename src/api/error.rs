use thiserror::Error;

/// Failure taxonomy for calls to the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rejected ({status}): {message}")]
    Validation { status: u16, message: String },
    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

impl ApiError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ApiError::Unauthorized(message),
            400..=499 => ApiError::Validation { status, message },
            _ => ApiError::Unexpected { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Validation { status, .. } | ApiError::Unexpected { status, .. } => {
                Some(*status)
            }
        }
    }

    /// Text fit for an alert banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(err) if err.is_timeout() => {
                "The HerSync service took too long to answer.".into()
            }
            ApiError::Transport(_) => "Could not reach the HerSync service.".into(),
            ApiError::Unauthorized(_) => "Unauthorized access. Please log in again.".into(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Unexpected { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Unexpected { .. } => "An unknown error occurred while fetching data.".into(),
        }
    }

    /// The service's own wording when it sent one, else `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ApiError::Unauthorized(message)
            | ApiError::Validation { message, .. }
            | ApiError::Unexpected { message, .. }
                if !message.is_empty() =>
            {
                message.clone()
            }
            _ => fallback.to_string(),
        }
    }
}
