use std::{sync::Arc, time::Duration};

use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::error::ApiError;
use crate::services::session::SessionStore;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Arc<str>,
    session: SessionStore,
}

/// Loose acknowledgement body returned by mutating endpoints. Missing or
/// non-JSON bodies read as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Ack {
    pub fn text(&self) -> Option<&str> {
        self.msg.as_deref().or(self.message.as_deref())
    }
}

impl ApiClient {
    pub fn new(base: &Url, timeout: Duration, session: SessionStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hersync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: Arc::from(base.as_str().trim_end_matches('/')),
            session,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method.clone(), self.url(path));
        match self.session.token().await {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => {
                warn!(%method, path, "no session token found, sending unauthenticated");
                builder
            }
            Err(err) => {
                warn!(%method, path, "session token unreadable, sending unauthenticated: {err}");
                builder
            }
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        debug!(status = %response.status(), url = %response.url(), "api response");
        classify(response).await
    }

    pub(super) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path).await).await?;
        Ok(response.json().await?)
    }

    pub(super) async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path).await.json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    pub(super) async fn send_for_ack<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Ack, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.request(method, path).await;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        let raw = response.text().await?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }
}

async fn classify(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(ApiError::from_status(status.as_u16(), message))
}

/// Pulls the human-readable part out of an error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_string))
}
