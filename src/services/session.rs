use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    models::{session::PersistedSession, user::UserProfile},
    services::storage::StorageService,
};

pub const SESSION_KEY: &str = "tokenData";
/// Bare token key written by older clients; still honoured for requests.
pub const LEGACY_TOKEN_KEY: &str = "token";
pub const SESSION_TTL_DAYS: i64 = 7;

/// The one session of this client profile: persisted token + expiry + user,
/// mirrored in memory. Subscribers see every login and logout, including
/// the logout that happens when the expiry passes while the process runs.
#[derive(Clone)]
pub struct SessionStore {
    storage: StorageService,
    current: Arc<watch::Sender<Option<UserProfile>>>,
    expiry: Arc<watch::Sender<Option<DateTime<Utc>>>>,
}

impl SessionStore {
    pub fn new(storage: StorageService) -> Self {
        let (current, _) = watch::channel(None);
        let (expiry, _) = watch::channel(None);
        Self {
            storage,
            current: Arc::new(current),
            expiry: Arc::new(expiry),
        }
    }

    /// The logged in user, or none once the session has expired.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.current_user_at(Utc::now())
    }

    pub fn current_user_at(&self, now: DateTime<Utc>) -> Option<UserProfile> {
        if self.expired_at(now) {
            return None;
        }
        self.current.borrow().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }

    /// Like [`Self::current_user`], but an expired session is also wiped
    /// from storage and subscribers are told about the logout.
    pub async fn active_user(&self) -> Result<Option<UserProfile>, AppError> {
        self.active_user_at(Utc::now()).await
    }

    pub async fn active_user_at(&self, now: DateTime<Utc>) -> Result<Option<UserProfile>, AppError> {
        if self.expired_at(now) {
            info!("session expired");
            self.clear().await?;
            return Ok(None);
        }
        Ok(self.current.borrow().clone())
    }

    fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.borrow().is_some_and(|expiry| now >= expiry)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.current.subscribe()
    }

    pub async fn restore(&self) -> Result<Option<UserProfile>, AppError> {
        self.restore_at(Utc::now()).await
    }

    /// Loads the persisted session. Expired or unreadable data is wiped and
    /// reads as logged out.
    pub async fn restore_at(&self, now: DateTime<Utc>) -> Result<Option<UserProfile>, AppError> {
        let Some(session) = self.load().await? else {
            self.expiry.send_replace(None);
            self.current.send_replace(None);
            return Ok(None);
        };
        if session.is_valid_at(now) {
            info!(user = %session.user.username, expiry = %session.expiry, "session restored");
            self.expiry.send_replace(Some(session.expiry));
            self.current.send_replace(Some(session.user.clone()));
            Ok(Some(session.user))
        } else {
            info!(expiry = %session.expiry, "stored session expired");
            self.storage.remove_item(SESSION_KEY).await?;
            self.expiry.send_replace(None);
            self.current.send_replace(None);
            Ok(None)
        }
    }

    pub async fn set(&self, user: UserProfile, token: String) -> Result<PersistedSession, AppError> {
        self.set_at(user, token, Utc::now()).await
    }

    pub async fn set_at(
        &self,
        user: UserProfile,
        token: String,
        now: DateTime<Utc>,
    ) -> Result<PersistedSession, AppError> {
        let session = PersistedSession {
            token,
            expiry: now + Duration::days(SESSION_TTL_DAYS),
            user,
        };
        self.persist(&session).await?;
        info!(user = %session.user.username, expiry = %session.expiry, "session stored");
        self.expiry.send_replace(Some(session.expiry));
        self.current.send_replace(Some(session.user.clone()));
        Ok(session)
    }

    /// Swaps the profile of a live session; token and expiry stay as they are.
    pub async fn update_user(&self, user: UserProfile) -> Result<(), AppError> {
        let Some(mut session) = self.load().await? else {
            return Err(AppError::LoginRequired("your profile"));
        };
        session.user = user;
        self.persist(&session).await?;
        self.current.send_replace(Some(session.user));
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.storage.remove_item(SESSION_KEY).await?;
        self.storage.remove_item(LEGACY_TOKEN_KEY).await?;
        self.expiry.send_replace(None);
        self.current.send_replace(None);
        info!("session cleared");
        Ok(())
    }

    /// Bearer token for outgoing requests. An expired session is cleared
    /// instead of being sent.
    pub async fn token(&self) -> Result<Option<String>, AppError> {
        self.token_at(Utc::now()).await
    }

    pub async fn token_at(&self, now: DateTime<Utc>) -> Result<Option<String>, AppError> {
        if self.expired_at(now) {
            info!("session expired, dropping token");
            self.clear().await?;
            return Ok(None);
        }
        if let Some(raw) = self.storage.get_item(SESSION_KEY).await? {
            match serde_json::from_str::<PersistedSession>(&raw) {
                Ok(session) if session.is_valid_at(now) => return Ok(Some(session.token)),
                Ok(_) => {
                    info!("stored session expired, dropping token");
                    self.clear().await?;
                    return Ok(None);
                }
                Err(err) => warn!("failed to parse stored session: {err}"),
            }
        }
        Ok(self
            .storage
            .get_item(LEGACY_TOKEN_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    async fn load(&self) -> Result<Option<PersistedSession>, AppError> {
        let Some(raw) = self.storage.get_item(SESSION_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                debug!("discarding malformed session: {err}");
                self.storage.remove_item(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn persist(&self, session: &PersistedSession) -> Result<(), AppError> {
        let raw = serde_json::to_string(session).map_err(|err| AppError::Other(err.into()))?;
        self.storage.set_item(SESSION_KEY, &raw).await
    }
}
