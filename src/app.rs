//! Application context.
//!
//! DESIGN
//! ======
//! `App` owns every long-lived piece of client state: the session, the
//! notification queue, the generation client, the REST client, and the
//! cached brand voice. Views borrow it instead of reaching for globals.
//! `shutdown` cancels the root token, which every `cancellation()` child
//! observes, so outstanding polls stop at once.
//!
//! ERROR HANDLING
//! ==============
//! Construction can fail (`AppError`). After that, user actions never
//! return errors: each failure becomes exactly one notification and the
//! action yields `None`/`false`.

use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, BrandPreferences, Project, ProjectFilter};
use crate::chat::{ChatMessage, ChatState};
use crate::config::{ClientConfig, ConfigError};
use crate::error::ErrorCode;
use crate::generation::http::HttpBackend;
use crate::generation::{GenerationBackend, GenerationClient, GenerationError, GenerationKind, GenerationRequest, ToneParams};
use crate::notify::NotificationCenter;
use crate::session::{Authenticator, DemoAuthenticator, Session, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ErrorCode for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Generation(e) => e.error_code(),
            Self::Api(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Config(e) => e.retryable(),
            Self::Generation(e) => e.retryable(),
            Self::Api(e) => e.retryable(),
        }
    }
}

pub struct App {
    config: ClientConfig,
    session: SessionState,
    notifications: NotificationCenter,
    generation: GenerationClient,
    api: ApiClient,
    brand_voice: RwLock<Option<BrandPreferences>>,
    shutdown: CancellationToken,
}

impl App {
    /// Build the production context: HTTP backends plus the demo authenticator.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn start(config: ClientConfig) -> Result<Self, AppError> {
        let backend = HttpBackend::new(&config.generation_url, config.timeouts)?;
        let api = ApiClient::new(&config.api_url, config.timeouts)?;
        info!(generation_url = %config.generation_url, api_url = %config.api_url, "app started");
        Ok(Self::from_parts(config, Arc::new(DemoAuthenticator::new()), Arc::new(backend), api))
    }

    /// Build a context from injected parts.
    #[must_use]
    pub fn from_parts(
        config: ClientConfig,
        auth: Arc<dyn Authenticator>,
        backend: Arc<dyn GenerationBackend>,
        api: ApiClient,
    ) -> Self {
        Self {
            session: SessionState::new(auth),
            notifications: NotificationCenter::new(config.notification_ttl),
            generation: GenerationClient::new(backend, config.poll),
            api,
            brand_voice: RwLock::new(None),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    #[must_use]
    pub fn generation(&self) -> &GenerationClient {
        &self.generation
    }

    /// Token cancelled by [`App::shutdown`], or earlier by its holder.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    /// Sign in and announce the result.
    pub async fn login(&self, email: &str, password: &str) -> Option<Session> {
        match self.session.login(email, password).await {
            Ok(session) => Some(session),
            Err(e) => {
                self.notifications.error_from(&e);
                None
            }
        }
    }

    /// Sign out and forget the cached brand voice.
    pub fn logout(&self) {
        self.session.logout();
        *self.brand_voice.write().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    fn require_session(&self) -> Option<Session> {
        match self.session.require() {
            Ok(session) => Some(session),
            Err(e) => {
                self.notifications.warning(e.user_message());
                None
            }
        }
    }

    // =========================================================================
    // GENERATION
    // =========================================================================

    /// Generate content with the cached brand voice filled in under the
    /// request's own tone parameters.
    pub async fn generate(
        &self,
        kind: GenerationKind,
        mut request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Option<String> {
        self.require_session()?;
        request.params = request.params.merged_over(&self.voice_params());

        match self.generation.generate(kind, request, cancel).await {
            Ok(text) => {
                self.notifications.success(format!("{} generated.", kind_label(kind)));
                Some(text)
            }
            Err(e) => {
                self.report_generation_error(&e);
                None
            }
        }
    }

    /// Send a chat message and return the assistant's reply.
    pub async fn chat(&self, chat: &mut ChatState, text: &str, cancel: &CancellationToken) -> Option<ChatMessage> {
        self.require_session()?;
        match chat.send(&self.generation, text, self.voice_params(), cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                self.report_generation_error(&e);
                None
            }
        }
    }

    fn report_generation_error(&self, err: &GenerationError) {
        if matches!(err, GenerationError::Cancelled { .. }) {
            debug!(error = %err, "generation cancelled");
            return;
        }
        self.notifications.error_from(err);
    }

    fn voice_params(&self) -> ToneParams {
        self.brand_voice
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(ToneParams::from)
            .unwrap_or_default()
    }

    // =========================================================================
    // BRAND VOICE
    // =========================================================================

    /// Fetch the signed-in user's brand voice and cache it for generation.
    pub async fn load_brand_voice(&self) -> Option<BrandPreferences> {
        let session = self.require_session()?;
        match self.api.brand_preferences(&session.email).await {
            Ok(prefs) => {
                self.cache_voice(prefs.clone());
                Some(prefs)
            }
            Err(e) => {
                self.notifications.error_from(&e);
                None
            }
        }
    }

    /// Store the brand voice for the signed-in user. Returns `true` on success.
    pub async fn save_brand_voice(&self, prefs: BrandPreferences) -> bool {
        let Some(session) = self.require_session() else {
            return false;
        };
        match self.api.save_brand_preferences(&session.email, &prefs).await {
            Ok(()) => {
                self.cache_voice(prefs);
                self.notifications.success("Brand voice saved.");
                true
            }
            Err(e) => {
                self.notifications.error_from(&e);
                false
            }
        }
    }

    /// Brand voice currently used for generation, if loaded.
    #[must_use]
    pub fn brand_voice(&self) -> Option<BrandPreferences> {
        self.brand_voice
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn cache_voice(&self, prefs: BrandPreferences) {
        *self.brand_voice.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(prefs);
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    /// Projects matching `filter`.
    pub async fn projects(&self, filter: &ProjectFilter) -> Option<Vec<Project>> {
        self.require_session()?;
        match self.api.list_projects().await {
            Ok(projects) => Some(filter.apply(projects)),
            Err(e) => {
                self.notifications.error_from(&e);
                None
            }
        }
    }

    pub async fn project(&self, id: &str) -> Option<Project> {
        self.require_session()?;
        match self.api.project(id).await {
            Ok(project) => Some(project),
            Err(e) => {
                self.notifications.error_from(&e);
                None
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stop every outstanding poll and drop all notifications.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.notifications.clear();
        info!("app shut down");
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn kind_label(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::General => "Content",
        GenerationKind::Blog => "Blog post",
        GenerationKind::Article => "Article",
        GenerationKind::Email => "Email",
        GenerationKind::Caption => "Caption",
        GenerationKind::Hashtags => "Hashtags",
        GenerationKind::Outreach => "Outreach message",
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
