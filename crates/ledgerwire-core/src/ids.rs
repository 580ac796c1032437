//! Branded identifiers.
//!
//! Session IDs are UUID v7 so they sort by creation time in logs.
//! Subscription keys are derived from a session ID and a topic and are
//! unique per (session, topic) pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Topic;

/// Identifier of one client session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session ID.
    pub fn new() -> Self {
        Self(format!("sess_{}", Uuid::now_v7().simple()))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a session subscribes to one backend topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Key for `topic` owned by `session`.
    pub fn new(session: &SessionId, topic: Topic) -> Self {
        Self(format!("{session}/{}", topic.name()))
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key belongs to `session`.
    pub fn is_owned_by(&self, session: &SessionId) -> bool {
        self.0
            .strip_prefix(session.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
