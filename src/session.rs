//! Session model shared by storage, the auth store, and the API client.
//!
//! DESIGN
//! ======
//! A `Session` is created by the server on successful authentication and is
//! otherwise treated as an opaque record on the client. Expiry is an absolute
//! wall-clock timestamp; every validity check takes `now` explicitly so
//! callers and tests agree on a single clock reading.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// The kind of account a session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Individual,
    Organization,
}

impl SubjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Organization => "organization",
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-issued proof of an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique subject identifier (user or organization id).
    pub subject_id: Uuid,
    /// Whether the subject is an individual freelancer or an organization.
    pub kind: SubjectKind,
    /// Bearer token presented to the API server.
    pub token: String,
    /// Absolute expiry, unix seconds on the wire.
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// True once `now` has reached the expiry timestamp.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        !self.is_expired_at(now)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
