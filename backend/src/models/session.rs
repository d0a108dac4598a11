//! Device sessions and the per-principal session list.
//!
//! A principal owns an ordered [`SessionList`]; every operation here is a pure
//! in-memory mutation and is persisted by saving the owning principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::SessionId;

const MAX_DEVICE_LABEL_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One authenticated device or browser instance.
pub struct Session {
    pub id: SessionId,
    /// Best-effort client description; never used for security decisions.
    pub device_label: Option<String>,
    /// Digest of the current refresh correlation identifier. The raw value is
    /// never stored.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Absolute expiry fixed at login; rotation does not move it.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        token_hash: String,
        device_label: Option<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            device_label: device_label.and_then(|label| sanitize_device_label(&label)),
            token_hash,
            created_at: now,
            last_used_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn sanitize_device_label(raw: &str) -> Option<String> {
    let label: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DEVICE_LABEL_CHARS)
        .collect();
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

/// Ordered collection of a principal's sessions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionList(Vec<Session>);

impl SessionList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.0.iter()
    }

    /// Appends a session, then evicts the oldest-created sessions until at most
    /// `cap` remain. Returns the evicted sessions.
    pub fn append(&mut self, session: Session, cap: usize) -> Vec<Session> {
        self.0.push(session);
        let overflow = self.0.len().saturating_sub(cap.max(1));
        if overflow == 0 {
            return Vec::new();
        }
        // Stable sort keeps insertion order for equal timestamps.
        self.0.sort_by_key(|session| session.created_at);
        self.0.drain(..overflow).collect()
    }

    pub fn find_by_hash(&self, token_hash: &str) -> Option<&Session> {
        self.0.iter().find(|session| session.token_hash == token_hash)
    }

    pub fn find_by_id(&self, id: SessionId) -> Option<&Session> {
        self.0.iter().find(|session| session.id == id)
    }

    pub fn remove_by_hash(&mut self, token_hash: &str) -> Option<Session> {
        let index = self
            .0
            .iter()
            .position(|session| session.token_hash == token_hash)?;
        Some(self.0.remove(index))
    }

    pub fn remove_by_id(&mut self, id: SessionId) -> Option<Session> {
        let index = self.0.iter().position(|session| session.id == id)?;
        Some(self.0.remove(index))
    }

    /// Installs a new refresh hash and last-used timestamp on one session.
    /// Both fields change together or not at all.
    pub fn replace_hash(&mut self, id: SessionId, new_hash: String, now: DateTime<Utc>) -> bool {
        match self.0.iter_mut().find(|session| session.id == id) {
            Some(session) => {
                session.token_hash = new_hash;
                session.last_used_at = now;
                true
            }
            None => false,
        }
    }

    /// Removes every session and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.0.len();
        self.0.clear();
        count
    }
}

impl From<Vec<Session>> for SessionList {
    fn from(sessions: Vec<Session>) -> Self {
        Self(sessions)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Session metadata exposed over the API. Secrets are never included.
pub struct SessionResponse {
    pub id: String,
    pub device_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            device_label: session.device_label.clone(),
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}
