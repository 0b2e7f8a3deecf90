//! Genify client core: session, notifications, generation polling, and the
//! dashboard REST API, tied together by [`app::App`].

pub mod api;
pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod notify;
pub mod session;
