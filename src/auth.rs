use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};

use crate::{error::AppError, models::user::UserProfile, state::AppState};

pub const FLASH_COOKIE: &str = "hersync_flash";

/// Whoever the session store currently holds. There is a single session per
/// instance, so no per-request cookie is involved. A session past its
/// expiry is cleared here and reads as logged out.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<UserProfile>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.session.active_user().await?))
    }
}

impl CurrentUser {
    /// `view` names what the visitor tried to open, for the login prompt.
    pub fn require_user(&self, view: &'static str) -> Result<&UserProfile, AppError> {
        self.0.as_ref().ok_or(AppError::LoginRequired(view))
    }

    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// One-shot banner carried across a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn css_class(&self) -> &'static str {
        self.kind.as_str()
    }

    fn encode(&self) -> String {
        format!("{}|{}", self.kind.as_str(), self.message)
    }

    fn decode(raw: &str) -> Option<Self> {
        let (kind, message) = raw.split_once('|')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        Some(Self {
            kind,
            message: message.to_string(),
        })
    }
}

pub fn set_flash(jar: PrivateCookieJar, kind: FlashKind, message: impl Into<String>) -> PrivateCookieJar {
    let flash = Flash {
        kind,
        message: message.into(),
    };
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn flash_success(jar: PrivateCookieJar, message: impl Into<String>) -> PrivateCookieJar {
    set_flash(jar, FlashKind::Success, message)
}

pub fn flash_error(jar: PrivateCookieJar, message: impl Into<String>) -> PrivateCookieJar {
    set_flash(jar, FlashKind::Error, message)
}

/// Reads and clears the pending flash.
pub fn take_flash(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<Flash>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| Flash::decode(cookie.value()));
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, None);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
}
