//! Password gate and session-scoped "authenticated" state.
//!
//! Each interactive client gets its own [`Session`]. A session starts locked
//! and stays unlocked for the rest of its life once the shared password has
//! been entered. There is no expiry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use insights_core::{InsightsError, InsightsResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Per-client dashboard session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub authenticated: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            authenticated: false,
            created_at: now,
            last_active: now,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one password attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    Granted,
    Empty,
    Rejected,
}

impl AuthOutcome {
    /// Message shown to the user. Never contains the secret.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Granted => "Senha correta! Acessando o dashboard...",
            Self::Empty => "Digite a senha para acessar o dashboard.",
            Self::Rejected => "Senha incorreta. Tente novamente.",
        }
    }
}

/// Compares user input against the shared secret.
pub struct PasswordGate {
    secret: String,
}

impl PasswordGate {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if secret.is_empty() {
            warn!("Dashboard password is not configured; every login will be rejected");
        }
        Self { secret }
    }

    pub fn check(&self, input: &str) -> AuthOutcome {
        if input.is_empty() {
            return AuthOutcome::Empty;
        }
        if !self.secret.is_empty() && constant_time_eq(input.as_bytes(), self.secret.as_bytes()) {
            AuthOutcome::Granted
        } else {
            AuthOutcome::Rejected
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Holds every live session and the gate they unlock through.
pub struct SessionManager {
    gate: PasswordGate,
    sessions: DashMap<Uuid, Session>,
}

impl SessionManager {
    pub fn new(gate: PasswordGate) -> Self {
        Self {
            gate,
            sessions: DashMap::new(),
        }
    }

    /// Open a new, locked session.
    pub fn create_session(&self) -> Session {
        let session = Session::new();
        info!(session_id = %session.session_id, "Session created");
        self.sessions.insert(session.session_id, session.clone());
        session
    }

    /// Snapshot of a session, touching its activity timestamp.
    pub fn get(&self, session_id: Uuid) -> Option<Session> {
        let mut entry = self.sessions.get_mut(&session_id)?;
        entry.last_active = Utc::now();
        Some(entry.clone())
    }

    /// Submit a password for a session. A wrong or empty password leaves the
    /// session as it was, so an unlocked session stays unlocked.
    pub fn login(&self, session_id: Uuid, input: &str) -> InsightsResult<AuthOutcome> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| InsightsError::UnknownSession(session_id.to_string()))?;

        let outcome = self.gate.check(input);
        entry.last_active = Utc::now();
        match outcome {
            AuthOutcome::Granted => {
                entry.authenticated = true;
                info!(session_id = %session_id, "Session authenticated");
            }
            AuthOutcome::Empty => {}
            AuthOutcome::Rejected => {
                metrics::counter!("auth.failures").increment(1);
                warn!(session_id = %session_id, "Rejected dashboard password");
            }
        }
        Ok(outcome)
    }

    /// Remove a session. Returns `true` when it existed.
    pub fn revoke(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.remove(&session_id).is_some();
        if removed {
            info!(session_id = %session_id, "Session revoked");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
