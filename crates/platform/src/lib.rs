//! Dashboard access control: the shared-password gate and per-client sessions.

pub mod auth;

pub use auth::{AuthOutcome, PasswordGate, Session, SessionManager};
