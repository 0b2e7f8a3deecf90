//! Generation types: wire shapes, task bookkeeping, errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by the generation request/poll flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The request never produced a task id.
    #[error("submission failed: {reason}")]
    Submission { reason: String },

    /// A status poll could not be completed.
    #[error("transport error: {message}")]
    Transport { status: Option<u16>, message: String },

    /// The attempt budget ran out while the task was still pending.
    #[error("task {task_id} still pending after {attempts} attempts")]
    Timeout { task_id: TaskId, attempts: u32 },

    /// The backend reported the task as failed, or completed it with no output.
    #[error("task {task_id} failed: {reason}")]
    Failed { task_id: TaskId, reason: String },

    /// Polling was stopped through the cancellation token.
    #[error("polling cancelled for task {task_id}")]
    Cancelled { task_id: TaskId },

    /// Another caller is already polling this task.
    #[error("task {task_id} is already being polled")]
    AlreadyPolling { task_id: TaskId },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for GenerationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Submission { .. } => "E_SUBMISSION",
            Self::Transport { .. } => "E_TRANSPORT",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Failed { .. } => "E_GENERATION_FAILED",
            Self::Cancelled { .. } => "E_CANCELLED",
            Self::AlreadyPolling { .. } => "E_ALREADY_POLLING",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport { status: None | Some(429 | 500..=599), .. })
    }

    fn user_message(&self) -> String {
        match self {
            Self::Submission { .. } => "Failed to start content generation. Please try again.".into(),
            Self::Transport { .. } => "Server error while generating content.".into(),
            Self::Timeout { .. } => "Generation is taking longer than expected. Please try again later.".into(),
            Self::Failed { reason, .. } => format!("Generation failed: {reason}"),
            Self::Cancelled { .. } => "Generation cancelled.".into(),
            Self::AlreadyPolling { .. } => "This generation is already in progress.".into(),
            Self::HttpClientBuild(_) => "Content generation is unavailable.".into(),
        }
    }
}

// =============================================================================
// IDS & KINDS
// =============================================================================

/// Opaque backend-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which generator a request targets. Each maps to its own submit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    /// Free-form prompt; also backs the chat assistant.
    General,
    Blog,
    Article,
    Email,
    Caption,
    Hashtags,
    Outreach,
}

impl GenerationKind {
    pub const ALL: [Self; 7] =
        [Self::General, Self::Blog, Self::Article, Self::Email, Self::Caption, Self::Hashtags, Self::Outreach];

    #[must_use]
    pub fn submit_path(self) -> &'static str {
        match self {
            Self::General => "/generate",
            Self::Blog => "/generate/blog",
            Self::Article => "/generate/article",
            Self::Email => "/generate/email",
            Self::Caption => "/generate/caption",
            Self::Hashtags => "/generate/hashtags",
            Self::Outreach => "/generate/outreach",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Blog => "blog",
            Self::Article => "article",
            Self::Email => "email",
            Self::Caption => "caption",
            Self::Hashtags => "hashtags",
            Self::Outreach => "outreach",
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GenerationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown generation kind: {s}"))
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Brand-voice parameters merged into generation requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

impl ToneParams {
    /// Fill unset (or blank) fields from `defaults`. Explicit values win.
    #[must_use]
    pub fn merged_over(self, defaults: &ToneParams) -> Self {
        fn pick(own: Option<String>, fallback: Option<&String>) -> Option<String> {
            own.filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.filter(|v| !v.trim().is_empty()).cloned())
        }
        Self {
            tone: pick(self.tone, defaults.tone.as_ref()),
            style: pick(self.style, defaults.style.as_ref()),
            sample: pick(self.sample, defaults.sample.as_ref()),
        }
    }
}

/// Body of a submit call: prompt, tone params, and tool-specific fields
/// (`length`, `platform`, `audience`, ...) flattened into one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub params: ToneParams,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_params(mut self, params: ToneParams) -> Self {
        self.params = params;
        self
    }

    /// Add a tool-specific field. Reserved keys (`prompt`, `tone`, `style`,
    /// `sample`) are ignored so they cannot shadow the typed fields.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !matches!(key.as_str(), "prompt" | "tone" | "style" | "sample") {
            self.extra.insert(key, value.into());
        }
        self
    }
}

// =============================================================================
// WIRE RESPONSES
// =============================================================================

/// `POST /generate...` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Status string reported by the result endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Pending,
    Completed,
    Failed,
    /// Anything else; polled again like `Pending`.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollOutput {
    #[serde(default)]
    pub response: Option<String>,
}

/// `GET /generate/result/{task_id}` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    pub status: PollStatus,
    #[serde(default)]
    pub output: Option<PollOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PollResponse {
    #[must_use]
    pub fn pending() -> Self {
        Self { status: PollStatus::Pending, output: None, error: None }
    }

    #[must_use]
    pub fn completed(response: impl Into<String>) -> Self {
        Self {
            status: PollStatus::Completed,
            output: Some(PollOutput { response: Some(response.into()) }),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: PollStatus::Failed, output: None, error: Some(error.into()) }
    }

    /// Non-empty generated text, if any.
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|o| o.response.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

// =============================================================================
// TASK BOOKKEEPING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Submitted,
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Returned by `submit`; identifies the task to await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: TaskId,
    pub kind: GenerationKind,
}

/// Client-side record of one generation task.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub task_id: TaskId,
    pub kind: GenerationKind,
    pub prompt: String,
    pub params: ToneParams,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub failure: Option<GenerationError>,
    /// Status polls issued so far.
    pub attempts: u32,
    pub(crate) polling: bool,
}

impl GenerationTask {
    #[must_use]
    pub fn new(task_id: TaskId, kind: GenerationKind, request: &GenerationRequest) -> Self {
        Self {
            task_id,
            kind,
            prompt: request.prompt.clone(),
            params: request.params.clone(),
            status: TaskStatus::Submitted,
            result: None,
            failure: None,
            attempts: 0,
            polling: false,
        }
    }

    /// Move to `next`. Terminal states are sticky; returns `false` if refused.
    pub fn transition(&mut self, next: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    /// Outcome of a task that already reached a terminal state.
    #[must_use]
    pub fn terminal_outcome(&self) -> Option<Result<String, GenerationError>> {
        match self.status {
            TaskStatus::Completed => self.result.clone().map(Ok),
            TaskStatus::Failed => Some(Err(self.failure.clone().unwrap_or_else(|| GenerationError::Failed {
                task_id: self.task_id.clone(),
                reason: "unknown failure".into(),
            }))),
            TaskStatus::Submitted | TaskStatus::Pending => None,
        }
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// Transport seam for the generation service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit a request to the endpoint for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Submission`] when the endpoint is unreachable
    /// or rejects the request.
    async fn submit(&self, kind: GenerationKind, request: &GenerationRequest) -> Result<SubmitResponse, GenerationError>;

    /// Fetch the current status of a task.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] on network failure, non-2xx
    /// status, or an unparseable body.
    async fn poll(&self, task_id: &TaskId) -> Result<PollResponse, GenerationError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
