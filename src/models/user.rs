use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "profilePhoto", skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        if self.username.trim().is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

/// Login body: the identifier goes out as `email` when it looks like one,
/// otherwise as `username`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginPayload {
    Email { email: String, password: String },
    Username { username: String, password: String },
}

impl LoginPayload {
    pub fn from_identifier(identifier: &str, password: &str) -> Self {
        let identifier = identifier.trim();
        if identifier.contains('@') {
            Self::Email {
                email: identifier.to_string(),
                password: password.to_string(),
            }
        } else {
            Self::Username {
                username: identifier.to_string(),
                password: password.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordPayload {
    pub token: String,
    pub password: String,
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid e-mail pattern"));

/// Loose `local@domain.tld` shape check, no whitespace anywhere.
pub fn is_email_valid(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Identifier rule from the login form: e-mails must be well formed,
/// usernames just non-empty.
pub fn is_identifier_valid(identifier: &str) -> bool {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return false;
    }
    !identifier.contains('@') || is_email_valid(identifier)
}

pub fn is_password_valid(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}
