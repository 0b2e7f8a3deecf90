//! REST API client for the dashboard backend.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns `Result<_, ApiError>`; the application layer turns
//! failures into notifications instead of propagating them to the user.

pub mod brand;
pub mod projects;

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use brand::BrandPreferences;
pub use projects::{Project, ProjectFilter, ProjectStatus, ProjectTask};

use crate::config::{HttpTimeouts, join_segments};
use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request could not be sent or its body read.
    #[error("API request failed: {0}")]
    Request(String),

    /// The server returned a non-success status.
    #[error("API response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_API_REQUEST",
            Self::Response { status: 404, .. } => "E_NOT_FOUND",
            Self::Response { .. } => "E_API_RESPONSE",
            Self::Parse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }

    fn user_message(&self) -> String {
        match self {
            Self::Response { status: 404, .. } => "The requested item was not found.".into(),
            Self::Request(_) | Self::Response { .. } => "Could not reach the server. Please try again.".into(),
            Self::Parse(_) | Self::HttpClientBuild(_) => "Something went wrong. Please try again.".into(),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::HttpClientBuild(format!("invalid base URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base })
    }

    /// Brand-voice preferences stored for `email`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on request failure, non-2xx, or a bad body.
    pub async fn brand_preferences(&self, email: &str) -> Result<BrandPreferences, ApiError> {
        let request = self
            .http
            .get(self.url(["api", "brand", "preferences"])?)
            .query(&[("email", email)]);
        self.fetch_json(request).await
    }

    /// Store brand-voice preferences for `email`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on request failure or non-2xx.
    pub async fn save_brand_preferences(&self, email: &str, prefs: &BrandPreferences) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct SaveBody<'a> {
            user_email: &'a str,
            #[serde(flatten)]
            prefs: &'a BrandPreferences,
        }

        let request = self
            .http
            .post(self.url(["api", "brand", "preferences"])?)
            .json(&SaveBody { user_email: email, prefs });
        self.send(request).await.map(|_| ())
    }

    /// All projects visible to the current user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on request failure, non-2xx, or a bad body.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let url = self.url(["api", "projects"])?;
        let body: projects::ProjectsBody = self.fetch_json(self.http.get(url)).await?;
        Ok(body.into_projects())
    }

    /// A single project by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Response`] with status 404 when it does not exist.
    pub async fn project(&self, id: &str) -> Result<Project, ApiError> {
        let url = self.url(["api", "projects", id])?;
        self.fetch_json(self.http.get(url)).await
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn url<const N: usize>(&self, segments: [&str; N]) -> Result<Url, ApiError> {
        join_segments(&self.base, segments)
            .ok_or_else(|| ApiError::Request(format!("unusable base URL {}", self.base)))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let text = self.send(request).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().path().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        debug!(%url, status, "api response");
        if !(200..300).contains(&status) {
            return Err(ApiError::Response { status, body: text });
        }
        Ok(text)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
