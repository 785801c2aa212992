use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    api::ApiClient,
    config::AppConfig,
    db::DbPool,
    error::AppError,
    services::{
        notifications::NotificationPoller, period_alert::PeriodAlert, session::SessionStore,
        storage::StorageService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: StorageService,
    pub session: SessionStore,
    pub api: ApiClient,
    pub poller: NotificationPoller,
    pub period_alert: PeriodAlert,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Result<Self, AppError> {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);

        let storage = StorageService::new(db);
        let session = SessionStore::new(storage.clone());
        let api = ApiClient::new(&config.api_base, config.api_timeout, session.clone())?;
        let poller = NotificationPoller::new(Arc::new(api.clone()), config.poll_interval);
        let period_alert = PeriodAlert::new(storage.clone());

        Ok(Self {
            config,
            storage,
            session,
            api,
            poller,
            period_alert,
            cookie_key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
