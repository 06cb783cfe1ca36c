//! Testing utilities for the story reader.
//!
//! This module provides tools for integration testing:
//! - `MockGenerator` for deterministic stories without a model
//! - `FlakyStore` for simulating storage that refuses writes
//! - `TestHarness` for scripted reader sessions
//! - Assertion helpers for verifying controller and library state

use crate::controller::Screen;
use crate::generator::{GenerationConfig, GenerationError, StoryGenerator};
use crate::library::{LibraryConfig, LibraryStore};
use crate::persist::{encode_snapshot, KeyValueStore, MemoryStore, PersistError};
use crate::session::{SessionError, StorySession};
use crate::story::Story;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A generator that returns scripted results.
///
/// Each call takes the next queued result as soon as it starts. A gated
/// generator then waits for [`MockGenerator::release`] before returning,
/// which lets tests cancel while a generation is in flight.
#[derive(Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<Story, GenerationError>>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    last_config: Mutex<Option<GenerationConfig>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every result until a permit is released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held generations complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queue a story to return.
    pub fn queue_story(&self, story: Story) {
        self.lock_responses().push_back(Ok(story));
    }

    /// Queue a failure to return.
    pub fn queue_failure(&self, message: impl Into<String>) {
        self.lock_responses()
            .push_back(Err(GenerationError::Failed(message.into())));
    }

    /// Number of generate calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Config passed to the most recent call.
    pub fn last_config(&self) -> Option<GenerationConfig> {
        self.last_config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Story, GenerationError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StoryGenerator for MockGenerator {
    async fn generate(&self, config: &GenerationConfig) -> Result<Story, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());

        let response = self.lock_responses().pop_front().unwrap_or_else(|| {
            Ok(Story::new(
                "Untitled",
                vec!["The generator has no more scripted stories.".to_string()],
            ))
        });

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| GenerationError::Interrupted)?;
            permit.forget();
        }

        response
    }
}

/// Memory store whose reads or writes can be switched off.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: bool,
    fail_writes: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store.
    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Make `get` fail until switched back.
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make `set` and `remove` fail until switched back.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        if self.fail_reads {
            return Err(PersistError::Unavailable("storage busy".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Unavailable("storage quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Unavailable("storage quota exceeded".to_string()));
        }
        self.inner.remove(key)
    }
}

/// Test harness for running reader scenarios.
pub struct TestHarness {
    /// Session under test.
    pub session: StorySession<FlakyStore>,
    /// The generator behind the session.
    pub generator: Arc<MockGenerator>,
}

impl TestHarness {
    /// Create a harness with an empty library.
    pub fn new() -> Self {
        Self::with_backend(FlakyStore::new())
    }

    /// Create a harness over a prepared backend, loading whatever it holds.
    pub fn with_backend(backend: FlakyStore) -> Self {
        let (library, _) =
            LibraryStore::open(backend, LibraryConfig::new()).expect("backend should be readable");
        let generator = Arc::new(MockGenerator::new());
        let session = StorySession::new(library, generator.clone());
        Self { session, generator }
    }

    /// Queue a story for the next generation.
    pub fn expect_story(&mut self, story: Story) -> &mut Self {
        self.generator.queue_story(story);
        self
    }

    /// Queue a failure for the next generation.
    pub fn expect_failure(&mut self, message: &str) -> &mut Self {
        self.generator.queue_failure(message);
        self
    }

    /// Start a generation and wait for it. Requires a tokio runtime.
    pub async fn generate(&mut self) -> Result<Story, SessionError> {
        self.session
            .start_generation(GenerationConfig::default())?;
        self.session.next_story().await
    }

    /// Make the backend refuse writes.
    pub fn fail_writes(&mut self, fail: bool) {
        self.session
            .controller_mut()
            .backend_mut()
            .set_fail_writes(fail);
    }

    /// Ids in library order.
    pub fn library_ids(&self) -> Vec<String> {
        self.session
            .stories()
            .iter()
            .map(|s| s.id.to_string())
            .collect()
    }

    /// Raw payload currently in the library slot.
    pub fn stored_payload(&self) -> Option<String> {
        let library = self.session.controller().library();
        library
            .backend()
            .get(&library.config().slot)
            .unwrap_or_default()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the visible screen.
#[track_caller]
pub fn assert_screen(harness: &TestHarness, expected: Screen) {
    let actual = harness.session.screen();
    assert_eq!(actual, expected, "Expected screen {expected}, got {actual}");
}

/// Assert library ids, newest first.
#[track_caller]
pub fn assert_library(harness: &TestHarness, expected: &[&str]) {
    let actual = harness.library_ids();
    assert_eq!(actual, expected, "Unexpected library contents");
}

/// Assert the slot holds exactly the encoding of the in-memory library.
#[track_caller]
pub fn assert_storage_in_sync(harness: &TestHarness) {
    let expected = encode_snapshot(harness.session.stories()).expect("encode should succeed");
    let stored = harness.stored_payload();
    assert_eq!(
        stored.as_deref(),
        Some(expected.as_str()),
        "Stored payload differs from in-memory library"
    );
}

/// Assert that exactly one screen is active and a story is attached only
/// while reading.
#[track_caller]
pub fn assert_view_consistent(harness: &TestHarness) {
    let reading = harness.session.screen() == Screen::Reading;
    assert_eq!(
        harness.session.active_story().is_some(),
        reading,
        "Active story must be present exactly while reading"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator_order() {
        let generator = MockGenerator::new();
        generator.queue_story(Story::with_id("1", "One"));
        generator.queue_failure("boom");

        let config = GenerationConfig::new("x");
        assert_eq!(generator.generate(&config).await.unwrap().id.as_str(), "1");
        assert_eq!(
            generator.generate(&config).await.unwrap_err(),
            GenerationError::Failed("boom".to_string())
        );
        assert!(generator
            .generate(&config)
            .await
            .unwrap()
            .body[0]
            .contains("no more scripted"));
        assert_eq!(generator.calls(), 3);
    }

    #[test]
    fn test_flaky_store_toggle() {
        let mut store = FlakyStore::new();
        store.set("k", "v").unwrap();

        store.set_fail_writes(true);
        assert!(store.set("k", "w").is_err());
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.set_fail_writes(false);
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store.set_fail_reads(true);
        assert!(store.get("k").is_err());
        store.set("k", "x").unwrap();
        store.set_fail_reads(false);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_harness_flow() {
        let mut harness = TestHarness::new();
        harness
            .expect_story(Story::with_id("a", "A"))
            .expect_story(Story::with_id("b", "B"));

        harness.generate().await.unwrap();
        harness.session.back().unwrap();
        harness.generate().await.unwrap();

        assert_screen(&harness, Screen::Reading);
        assert_library(&harness, &["b", "a"]);
        assert_storage_in_sync(&harness);
        assert_view_consistent(&harness);
    }

    #[tokio::test]
    async fn test_harness_failure() {
        let mut harness = TestHarness::new();
        harness.expect_failure("offline");

        assert!(harness.generate().await.is_err());
        assert_screen(&harness, Screen::Library);
        assert_library(&harness, &[]);
    }
}
