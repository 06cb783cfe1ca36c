//! Durable key-value storage for the story library.
//!
//! The library lives in a single named slot as a JSON snapshot of the whole
//! sequence. Every mutation rewrites the slot; there is no append log.

use crate::story::Story;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version: supported up to {supported}, found {found}")]
    UnsupportedVersion { supported: u32, found: u32 },

    #[error("Stored data is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistError {
    /// True when the stored bytes were read but cannot be a snapshot, as
    /// opposed to the storage itself failing.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PersistError::Json(_) | PersistError::Encoding(_) | PersistError::UnsupportedVersion { .. }
        )
    }
}

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A local key-value persistence mechanism.
///
/// Values are whole documents; `set` replaces whatever was stored under the
/// key.
pub trait KeyValueStore {
    /// Read the value stored under `key`, `None` if the slot is empty.
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// Overwrite the value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;

    /// Clear the slot. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;
}

/// In-memory store, mostly for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one slot already filled.
    pub fn with_slot(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.into(), value.into());
        Self { slots }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.slots.remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read(self.slot_path(key)) {
            Ok(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        let path = self.slot_path(key);
        // Write beside the target and rename so a crash never leaves half a snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Turn a slot key into a safe file stem.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// The persisted form of the library.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LibrarySnapshot {
    version: u32,
    stories: Vec<Story>,
}

#[derive(Serialize)]
struct LibrarySnapshotRef<'a> {
    version: u32,
    stories: &'a [Story],
}

/// Either the versioned envelope or the older bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnyPayload {
    Versioned(LibrarySnapshot),
    Legacy(Vec<Story>),
}

/// A decoded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Version the payload was written with; 0 for the unversioned array form.
    pub version: u32,
    pub stories: Vec<Story>,
}

/// Serialize a story sequence into the current snapshot format.
///
/// The output depends only on `stories`, so two encodes of equal sequences
/// are byte-identical.
pub fn encode_snapshot(stories: &[Story]) -> Result<String, PersistError> {
    let snapshot = LibrarySnapshotRef {
        version: SNAPSHOT_VERSION,
        stories,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

/// Parse a stored payload.
pub fn decode_snapshot(content: &str) -> Result<Decoded, PersistError> {
    match serde_json::from_str::<AnyPayload>(content)? {
        AnyPayload::Versioned(snapshot) => {
            if snapshot.version > SNAPSHOT_VERSION {
                return Err(PersistError::UnsupportedVersion {
                    supported: SNAPSHOT_VERSION,
                    found: snapshot.version,
                });
            }
            Ok(Decoded {
                version: snapshot.version,
                stories: snapshot.stories,
            })
        }
        AnyPayload::Legacy(stories) => Ok(Decoded {
            version: 0,
            stories,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Story> {
        vec![
            Story::with_id("b", "The Second Tale"),
            Story::with_id("a", "The First Tale").with_theme("dragons"),
        ]
    }

    #[test]
    fn test_encode_is_deterministic() {
        let stories = sample();
        assert_eq!(
            encode_snapshot(&stories).unwrap(),
            encode_snapshot(&stories.clone()).unwrap()
        );
    }

    #[test]
    fn test_encode_carries_version() {
        let json: serde_json::Value =
            serde_json::from_str(&encode_snapshot(&sample()).unwrap()).unwrap();
        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["stories"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_decode_round_trip() {
        let stories = sample();
        let decoded = decode_snapshot(&encode_snapshot(&stories).unwrap()).unwrap();
        assert_eq!(decoded.version, SNAPSHOT_VERSION);
        assert_eq!(decoded.stories, stories);
    }

    #[test]
    fn test_decode_legacy_array() {
        let decoded = decode_snapshot(r#"[{"id":"old","title":"Legacy"}]"#).unwrap();
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.stories.len(), 1);
        assert_eq!(decoded.stories[0].id.as_str(), "old");
    }

    #[test]
    fn test_decode_future_version_rejected() {
        let err = decode_snapshot(r#"{"version":99,"stories":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn test_decode_garbage_rejected() {
        assert!(matches!(
            decode_snapshot("not json at all"),
            Err(PersistError::Json(_))
        ));
        assert!(decode_snapshot(r#"{"stories":"nope"}"#).is_err());
    }

    #[test]
    fn test_memory_store_slots() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("tale-library"), "tale-library");
        assert_eq!(sanitize_key("my stories/../x"), "my_stories_.._x");
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = FileStore::open(temp_dir.path().join("data")).unwrap();

        assert_eq!(store.get("tale-library").unwrap(), None);

        store.set("tale-library", "[]").unwrap();
        assert!(store.slot_path("tale-library").exists());
        assert!(!store.slot_path("tale-library").with_extension("json.tmp").exists());

        // A second handle on the same directory sees the data.
        let reopened = FileStore::open(store.dir()).unwrap();
        assert_eq!(reopened.get("tale-library").unwrap().as_deref(), Some("[]"));

        store.remove("tale-library").unwrap();
        store.remove("tale-library").unwrap();
        assert_eq!(store.get("tale-library").unwrap(), None);
    }

    #[test]
    fn test_file_store_invalid_utf8_is_malformed() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path()).unwrap();
        fs::write(store.slot_path("tale-library"), [0xff, 0xfe, 0x5b]).unwrap();

        let err = store.get("tale-library").unwrap_err();
        assert!(matches!(err, PersistError::Encoding(_)));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_storage_failures_are_not_malformed() {
        assert!(!PersistError::Unavailable("busy".to_string()).is_malformed());
        assert!(decode_snapshot("{").unwrap_err().is_malformed());
    }
}
