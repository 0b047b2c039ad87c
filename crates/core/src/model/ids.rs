use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier is blank.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} must not be empty")]
pub struct IdError {
    kind: &'static str,
}

impl IdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn non_blank(kind: &'static str, raw: String) -> Result<String, IdError> {
    if raw.trim().is_empty() {
        return Err(IdError { kind });
    }
    Ok(raw)
}

/// Identifier of the viewer a progress record belongs to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if `raw` is empty or only whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("userId", raw.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of the video being watched.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Creates a `VideoId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if `raw` is empty or only whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_blank("videoId", raw.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of a progress record: one per (user, video) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    pub user_id: UserId,
    pub video_id: VideoId,
}

impl ProgressKey {
    #[must_use]
    pub fn new(user_id: UserId, video_id: VideoId) -> Self {
        Self { user_id, video_id }
    }
}

// ─── Conversions ───────────────────────────────────────────────────────────────

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for VideoId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for VideoId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ─── Formatting ────────────────────────────────────────────────────────────────

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.video_id)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("user-1").unwrap();
        assert_eq!(id.to_string(), "user-1");
    }

    #[test]
    fn test_blank_ids_rejected() {
        assert_eq!(UserId::new("").unwrap_err().kind(), "userId");
        assert_eq!(VideoId::new("   ").unwrap_err().kind(), "videoId");
    }

    #[test]
    fn test_video_id_from_str() {
        let id: VideoId = "intro".parse().unwrap();
        assert_eq!(id.as_str(), "intro");
    }

    #[test]
    fn test_key_display() {
        let key = ProgressKey::new(UserId::new("u").unwrap(), VideoId::new("v").unwrap());
        assert_eq!(key.to_string(), "u/v");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = UserId::new("alice").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""alice""#);
        assert!(serde_json::from_str::<UserId>(r#""""#).is_err());
    }
}
