//! Session state: the signed-in user and dashboard route gating.
//!
//! DESIGN
//! ======
//! One logical session per client. `SessionState` owns it behind a lock
//! that is never held across an await: the `Authenticator` call happens
//! first, and only its result is written under the lock.
//!
//! Profile and brand updates use merge-patch semantics: `None` fields in a
//! patch leave the stored value alone. Updates without a session are no-ops.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Credentials were rejected.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// A required sign-up field was blank.
    #[error("{field} is required")]
    Validation { field: &'static str },

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "E_AUTH",
            Self::Validation { .. } => "E_VALIDATION",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Auth { .. } => "Invalid email or password.".into(),
            Self::Validation { field } => format!("Please enter your {field}."),
            Self::NotAuthenticated => "Please sign in to continue.".into(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrandPurpose {
    Business,
    Creator,
    Student,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub name: String,
    pub logo: Option<String>,
    pub purpose: Option<BrandPurpose>,
    pub colors: Vec<String>,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub brand_profile: Option<BrandProfile>,
}

/// Partial update for [`Session`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

impl ProfilePatch {
    fn apply(self, session: &mut Session) {
        if let Some(v) = self.display_name {
            session.display_name = v;
        }
        if let Some(v) = self.email {
            session.email = v;
        }
        if let Some(v) = self.avatar_url {
            session.avatar_url = Some(v);
        }
        if let Some(v) = self.role {
            session.role = v;
        }
    }
}

/// Partial update for [`BrandProfile`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct BrandProfilePatch {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub purpose: Option<BrandPurpose>,
    pub colors: Option<Vec<String>>,
}

impl BrandProfilePatch {
    fn apply(self, profile: &mut BrandProfile) {
        if let Some(v) = self.name {
            profile.name = v;
        }
        if let Some(v) = self.logo {
            profile.logo = Some(v);
        }
        if let Some(v) = self.purpose {
            profile.purpose = Some(v);
        }
        if let Some(v) = self.colors {
            profile.colors = v;
        }
    }
}

// =============================================================================
// AUTHENTICATOR
// =============================================================================

/// Credential check behind login and sign-up. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SessionError::Auth`] when the credentials are rejected.
    async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError::Auth`] when the account cannot be created.
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Session, SessionError>;
}

const DEMO_AVATAR_URL: &str =
    "https://images.pexels.com/photos/220453/pexels-photo-220453.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1";

/// Accepts any well-formed credentials and returns a fixed demo account.
#[derive(Debug, Clone, Default)]
pub struct DemoAuthenticator {
    latency: Duration,
}

impl DemoAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated round-trip delay applied to every call.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl Authenticator for DemoAuthenticator {
    async fn login(&self, email: &str, _password: &str) -> Result<Session, SessionError> {
        self.simulate_latency().await;
        Ok(Session {
            id: "1".into(),
            display_name: "Demo User".into(),
            email: email.to_string(),
            avatar_url: Some(DEMO_AVATAR_URL.into()),
            role: "user".into(),
            brand_profile: None,
        })
    }

    async fn sign_up(&self, name: &str, email: &str, _password: &str) -> Result<Session, SessionError> {
        self.simulate_latency().await;
        Ok(Session {
            id: "2".into(),
            display_name: name.to_string(),
            email: email.to_string(),
            avatar_url: None,
            role: "user".into(),
            brand_profile: None,
        })
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// Client routes relevant to session gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    SignUp,
    OtpVerification,
    Onboarding,
    /// Any dashboard page, keyed by its path.
    Dashboard(String),
}

impl Route {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Self::Login,
            "/signup" => Self::SignUp,
            "/otp-verification" => Self::OtpVerification,
            "/onboarding" => Self::Onboarding,
            "" => Self::Dashboard("/".into()),
            other => Self::Dashboard(other.to_string()),
        }
    }

    #[must_use]
    pub fn requires_session(&self) -> bool {
        matches!(self, Self::Dashboard(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

// =============================================================================
// SESSION STATE
// =============================================================================

pub struct SessionState {
    auth: Arc<dyn Authenticator>,
    current: RwLock<Option<Session>>,
}

impl SessionState {
    #[must_use]
    pub fn new(auth: Arc<dyn Authenticator>) -> Self {
        Self { auth, current: RwLock::new(None) }
    }

    /// Sign in and replace any existing session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Auth`] for a malformed email, an empty
    /// password, or credentials the authenticator rejects.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let email = email.trim();
        if !is_plausible_email(email) || password.is_empty() {
            return Err(SessionError::Auth { reason: "invalid credentials".into() });
        }
        let session = self.auth.login(email, password).await?;
        info!(user_id = %session.id, "signed in");
        *self.write() = Some(session.clone());
        Ok(session)
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Validation`] naming the first blank field, or
    /// an authenticator error.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<Session, SessionError> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() {
            return Err(SessionError::Validation { field: "name" });
        }
        if email.is_empty() {
            return Err(SessionError::Validation { field: "email" });
        }
        if password.trim().is_empty() {
            return Err(SessionError::Validation { field: "password" });
        }
        let session = self.auth.sign_up(name, email, password).await?;
        info!(user_id = %session.id, "signed up");
        *self.write() = Some(session.clone());
        Ok(session)
    }

    /// Clear the session. Safe to call when nobody is signed in.
    pub fn logout(&self) {
        if let Some(session) = self.write().take() {
            info!(user_id = %session.id, "signed out");
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// The current session, or an error for callers that need one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] when nobody is signed in.
    pub fn require(&self) -> Result<Session, SessionError> {
        self.current().ok_or(SessionError::NotAuthenticated)
    }

    /// Decide whether `route` may be shown.
    #[must_use]
    pub fn guard(&self, route: &Route) -> Access {
        if route.requires_session() && !self.is_authenticated() {
            debug!(?route, "redirecting to login");
            return Access::Redirect(Route::Login);
        }
        Access::Allow
    }

    /// Merge `patch` into the session. Returns the updated session, or
    /// `None` when nobody is signed in.
    pub fn update_profile(&self, patch: ProfilePatch) -> Option<Session> {
        let mut current = self.write();
        let session = current.as_mut()?;
        patch.apply(session);
        Some(session.clone())
    }

    /// Merge `patch` into the brand profile, creating it if absent.
    pub fn update_brand_profile(&self, patch: BrandProfilePatch) -> Option<Session> {
        let mut current = self.write();
        let session = current.as_mut()?;
        patch.apply(session.brand_profile.get_or_insert_with(BrandProfile::default));
        Some(session.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
