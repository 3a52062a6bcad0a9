//! Data models for stored recovery props

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A recovery payload: an arbitrary JSON object keyed by string.
pub type RecoveryProps = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Experience identifier must not be empty")]
pub struct EmptyExperienceId;

/// Opaque identifier scoping stored props to one running application instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperienceId(String);

impl ExperienceId {
    /// Create an identifier, rejecting empty or whitespace-only strings
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyExperienceId> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EmptyExperienceId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExperienceId {
    type Error = EmptyExperienceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for ExperienceId {
    type Err = EmptyExperienceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ExperienceId> for String {
    fn from(id: ExperienceId) -> Self {
        id.0
    }
}

/// One persisted, not yet consumed snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredProps {
    /// Experience the snapshot belongs to
    pub experience_id: String,
    /// Encoded props as written by the application
    pub props: String,
    /// When the snapshot was last written
    pub updated_at: DateTime<Utc>,
}
