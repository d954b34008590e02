use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;


/// Resolved identity behind a bearer token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Bearer token presented on connect (UUID v4)
    pub token: String,
    /// Domain identity attached to every client opened with this token
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
}

/// In-memory token → identity store.
///
/// State resets on restart; sessions are reissued through the admin API.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token for `user_id`. User 0 is reserved for anonymous clients.
    pub fn issue(&self, user_id: u64) -> Result<Session, SessionError> {
        if user_id == 0 {
            return Err(SessionError::AnonymousUser);
        }

        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    pub fn lookup(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    /// Returns true if the token existed
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[derive(Debug, PartialEq)]
pub enum SessionError {
    AnonymousUser,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::AnonymousUser => write!(f, "user_id 0 is reserved for anonymous clients"),
        }
    }
}

impl std::error::Error for SessionError {}
