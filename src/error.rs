//! Shared error classification.
//!
//! DESIGN
//! ======
//! Every module owns its own `thiserror` enum. `ErrorCode` gives them a
//! common shape so callers (the notification channel, retry loops, the CLI)
//! can classify failures without matching on concrete types.

/// Stable classification for an error value.
pub trait ErrorCode: std::fmt::Display {
    /// Machine-readable code, e.g. `"E_TIMEOUT"`.
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same request may succeed.
    fn retryable(&self) -> bool {
        false
    }

    /// Message suitable for a user-facing notification.
    fn user_message(&self) -> String {
        self.to_string()
    }
}
