//! The story library: an ordered, durable collection of stories.
//!
//! Newest stories come first. Memory and storage never diverge: a mutation
//! is computed on a copy, written to the backend, and only then committed.

use crate::persist::{decode_snapshot, encode_snapshot, KeyValueStore, PersistError};
use crate::story::{Story, StoryId};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default slot name for the library payload.
pub const DEFAULT_SLOT: &str = "tale-library";

/// Errors from library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The slot holds data that is not a readable story sequence.
    #[error("Library data is corrupt: {0}")]
    CorruptState(#[source] PersistError),

    /// Reading or writing the backend failed.
    #[error("Could not persist library: {0}")]
    Persistence(#[source] PersistError),
}

/// Configuration for a library store.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Key of the slot holding the snapshot.
    pub slot: String,

    /// Copy an unreadable payload aside before discarding it.
    pub backup_corrupt: bool,
}

impl LibraryConfig {
    pub fn new() -> Self {
        Self {
            slot: DEFAULT_SLOT.to_string(),
            backup_corrupt: true,
        }
    }

    /// Set the slot name.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Enable or disable the corrupt payload backup.
    pub fn with_backup_corrupt(mut self, backup: bool) -> Self {
        self.backup_corrupt = backup;
        self
    }

    /// Key the corrupt payload is copied to.
    pub fn backup_slot(&self) -> String {
        format!("{}.corrupt", self.slot)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened when an unreadable payload was found at startup.
#[derive(Debug)]
pub struct Recovery {
    /// Why the payload was rejected.
    pub error: LibraryError,

    /// Slot the payload was copied to, if the backup succeeded.
    pub backup_slot: Option<String>,
}

/// Ordered, durable collection of stories.
pub struct LibraryStore<B: KeyValueStore> {
    backend: B,
    config: LibraryConfig,
    stories: Vec<Story>,
}

impl<B: KeyValueStore> LibraryStore<B> {
    /// Create an empty store over `backend` without reading it.
    pub fn new(backend: B, config: LibraryConfig) -> Self {
        Self {
            backend,
            config,
            stories: Vec::new(),
        }
    }

    /// Create a store and load it, falling back to an empty library if the
    /// stored payload is unreadable.
    ///
    /// The corrupt payload is copied to [`LibraryConfig::backup_slot`] (when
    /// enabled) and cleared from the main slot. A failure to read the backend
    /// is returned as an error and leaves the slot alone.
    pub fn open(
        backend: B,
        config: LibraryConfig,
    ) -> Result<(Self, Option<Recovery>), LibraryError> {
        let mut store = Self::new(backend, config);
        let loaded = store.load().map(|stories| stories.len());
        let recovery = match loaded {
            Ok(count) => {
                info!(count, "library opened");
                None
            }
            Err(error @ LibraryError::CorruptState(_)) => Some(store.recover(error)),
            Err(error) => {
                warn!(slot = %store.config.slot, %error, "could not read library");
                return Err(error);
            }
        };
        Ok((store, recovery))
    }

    fn recover(&mut self, error: LibraryError) -> Recovery {
        warn!(slot = %self.config.slot, %error, "discarding unreadable library payload");
        self.stories.clear();

        let mut backup_slot = None;
        if self.config.backup_corrupt {
            let target = self.config.backup_slot();
            match self.backend.get(&self.config.slot) {
                Ok(Some(raw)) => match self.backend.set(&target, &raw) {
                    Ok(()) => backup_slot = Some(target),
                    Err(e) => warn!(slot = %target, error = %e, "could not back up corrupt payload"),
                },
                Ok(None) => {}
                Err(e) => warn!(error = %e, "could not re-read corrupt payload for backup"),
            }
        }

        if let Err(e) = self.backend.remove(&self.config.slot) {
            warn!(slot = %self.config.slot, error = %e, "could not clear corrupt payload");
        }

        Recovery { error, backup_slot }
    }

    /// Read the durable slot into memory.
    ///
    /// A missing slot loads as an empty library. On error the in-memory
    /// sequence is left untouched.
    pub fn load(&mut self) -> Result<&[Story], LibraryError> {
        let raw = self.backend.get(&self.config.slot).map_err(|e| {
            if e.is_malformed() {
                LibraryError::CorruptState(e)
            } else {
                LibraryError::Persistence(e)
            }
        })?;

        self.stories = match raw {
            None => {
                debug!(slot = %self.config.slot, "no saved library, starting empty");
                Vec::new()
            }
            Some(content) => {
                let decoded = decode_snapshot(&content).map_err(LibraryError::CorruptState)?;
                debug!(
                    slot = %self.config.slot,
                    version = decoded.version,
                    count = decoded.stories.len(),
                    "loaded library"
                );
                decoded.stories
            }
        };

        Ok(&self.stories)
    }

    /// Prepend `story` and persist.
    ///
    /// Stories with an id already in the library are not merged: the new
    /// entry is prepended alongside the old one.
    pub fn add(&mut self, story: Story) -> Result<&[Story], LibraryError> {
        let id = story.id.clone();
        let mut updated = Vec::with_capacity(self.stories.len() + 1);
        updated.push(story);
        updated.extend(self.stories.iter().cloned());

        self.commit(updated)?;
        info!(id = %id, count = self.stories.len(), "story added to library");
        Ok(&self.stories)
    }

    /// Remove every story with `id` and persist. An unknown id is a no-op.
    pub fn remove(&mut self, id: &StoryId) -> Result<&[Story], LibraryError> {
        let updated: Vec<Story> = self
            .stories
            .iter()
            .filter(|s| &s.id != id)
            .cloned()
            .collect();
        let removed = self.stories.len() - updated.len();

        self.commit(updated)?;
        info!(id = %id, removed, count = self.stories.len(), "story removed from library");
        Ok(&self.stories)
    }

    /// Write `updated` to the backend, then swap it in.
    fn commit(&mut self, updated: Vec<Story>) -> Result<(), LibraryError> {
        let payload = encode_snapshot(&updated).map_err(LibraryError::Persistence)?;
        if let Err(e) = self.backend.set(&self.config.slot, &payload) {
            warn!(slot = %self.config.slot, error = %e, "library write failed, keeping previous state");
            return Err(LibraryError::Persistence(e));
        }
        self.stories = updated;
        Ok(())
    }

    /// Current stories, newest first.
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    /// Find the first story with `id`.
    pub fn get(&self, id: &StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| &s.id == id)
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access. Writing the library slot directly breaks the
    /// memory/storage agreement until the next mutation.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
