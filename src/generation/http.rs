//! HTTP transport for the generation service.
//!
//! Submit: `POST {base}/generate[/kind]` with a JSON body, answered by
//! `{ "task_id": "..." }`. Poll: `GET {base}/generate/result/{task_id}`.

use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use super::types::{GenerationBackend, GenerationError, GenerationKind, GenerationRequest, PollResponse, SubmitResponse, TaskId};
use crate::config::{HttpTimeouts, join_segments};

pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
    base_url: String,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, GenerationError> {
        let base_url = base_url.trim_end_matches('/');
        let base = Url::parse(base_url)
            .map_err(|e| GenerationError::HttpClientBuild(format!("invalid base URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| GenerationError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base, base_url: base_url.to_string() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Option<Url> {
        join_segments(&self.base, segments)
    }
}

#[async_trait::async_trait]
impl GenerationBackend for HttpBackend {
    async fn submit(&self, kind: GenerationKind, request: &GenerationRequest) -> Result<SubmitResponse, GenerationError> {
        let url = self
            .endpoint(kind.submit_path().trim_start_matches('/').split('/'))
            .ok_or_else(|| GenerationError::Submission { reason: format!("unusable base URL {}", self.base_url) })?;
        debug!(%url, %kind, "submitting generation request");
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Submission { reason: e.to_string() })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Submission { reason: e.to_string() })?;
        if !status.is_success() {
            return Err(GenerationError::Submission { reason: format!("HTTP {}: {text}", status.as_u16()) });
        }
        serde_json::from_str(&text)
            .map_err(|e| GenerationError::Submission { reason: format!("invalid submit response: {e}") })
    }

    async fn poll(&self, task_id: &TaskId) -> Result<PollResponse, GenerationError> {
        let url = self
            .endpoint(["generate", "result", task_id.as_str()])
            .ok_or_else(|| GenerationError::Transport { status: None, message: format!("unusable base URL {}", self.base_url) })?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::Transport { status: None, message: e.to_string() })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport { status: Some(status), message: e.to_string() })?;
        if !(200..300).contains(&status) {
            return Err(GenerationError::Transport { status: Some(status), message: text });
        }
        parse_poll_response(status, &text)
    }
}

fn parse_poll_response(status: u16, text: &str) -> Result<PollResponse, GenerationError> {
    serde_json::from_str(text).map_err(|e| GenerationError::Transport {
        status: Some(status),
        message: format!("invalid poll response: {e}"),
    })
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
