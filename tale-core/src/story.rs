//! Story records.
//!
//! A [`Story`] is produced by a generator, handed once to the library and
//! never mutated afterwards. The core only looks at the `id`; everything
//! else is carried along for the views.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a story.
///
/// Serialized as a bare string so payloads written by other tools with
/// arbitrary string ids still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub String);

impl StoryId {
    /// Create a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One generated narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// Assigned by the generator at creation time.
    pub id: StoryId,

    /// Display title.
    pub title: String,

    /// Story text, one entry per paragraph.
    #[serde(default)]
    pub body: Vec<String>,

    /// Theme or prompt the story was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Creation time in unix seconds.
    #[serde(default)]
    pub created_at: u64,
}

impl Story {
    /// Create a story with a fresh id and the current timestamp.
    pub fn new(title: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            id: StoryId::new(),
            title: title.into(),
            body,
            theme: None,
            created_at: unix_now(),
        }
    }

    /// Create a story with a caller-chosen id.
    pub fn with_id(id: impl Into<StoryId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: Vec::new(),
            theme: None,
            created_at: 0,
        }
    }

    /// Set the theme.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Word count across all paragraphs.
    pub fn word_count(&self) -> usize {
        self.body.iter().map(|p| p.split_whitespace().count()).sum()
    }
}

/// Current time in unix seconds.
pub(crate) fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_id_serializes_as_string() {
        let story = Story::with_id("a", "T");
        let json = serde_json::to_value(&story).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["title"], "T");
        assert!(json.get("theme").is_none());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let story: Story = serde_json::from_str(r#"{"id":"x","title":"Only a title"}"#).unwrap();
        assert_eq!(story.id.as_str(), "x");
        assert!(story.body.is_empty());
        assert_eq!(story.created_at, 0);
    }

    #[test]
    fn test_fresh_ids_differ() {
        let a = Story::new("One", vec![]);
        let b = Story::new("Two", vec![]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_word_count() {
        let story = Story::new(
            "Counting",
            vec!["Once upon a time".to_string(), "the end".to_string()],
        );
        assert_eq!(story.word_count(), 6);
    }
}
