//! StorySession - the primary public API for the story reader.
//!
//! Wraps the [`ViewController`], its library, and a [`StoryGenerator`].
//! Starting a generation spawns a tokio task; its result comes back on a
//! oneshot channel and is turned into a `StoryReady` intent by
//! [`StorySession::next_story`]. Cancelling aborts the task and drops the
//! receiver, so a story from an abandoned generation can never arrive.

use crate::controller::{Intent, Outcome, Screen, ViewController, ViewState};
use crate::generator::{GenerationConfig, GenerationError, StoryGenerator, TemplateGenerator};
use crate::library::{LibraryConfig, LibraryError, LibraryStore, Recovery};
use crate::persist::{FileStore, KeyValueStore, PersistError};
use crate::story::{Story, StoryId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors from StorySession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Storage error: {0}")]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("No story is being generated")]
    NotGenerating,

    #[error("No unsaved story to retry")]
    NothingToRetry,
}

/// Configuration for opening a session on disk.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the library slot file.
    pub data_dir: PathBuf,

    /// Library slot settings.
    pub library: LibraryConfig,

    /// Artificial latency for the built-in generator.
    pub generator_delay: Duration,
}

impl SessionConfig {
    /// Create a config storing data under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            library: LibraryConfig::new(),
            generator_delay: Duration::from_millis(800),
        }
    }

    /// Set the library slot name.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.library = self.library.with_slot(slot);
        self
    }

    /// Set the built-in generator's latency.
    pub fn with_generator_delay(mut self, delay: Duration) -> Self {
        self.generator_delay = delay;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("saves")
    }
}

/// A generation that has been started and not yet collected.
struct PendingGeneration {
    ticket: u64,
    result_rx: oneshot::Receiver<Result<Story, GenerationError>>,
    handle: JoinHandle<()>,
}

/// A story reader session.
pub struct StorySession<B: KeyValueStore> {
    controller: ViewController<B>,
    generator: Arc<dyn StoryGenerator>,
    pending: Option<PendingGeneration>,
    next_ticket: u64,
    /// A delivered story whose save failed.
    unsaved: Option<Story>,
    recovery: Option<Recovery>,
}

impl StorySession<FileStore> {
    /// Open the on-disk library described by `config` with the built-in
    /// template generator.
    ///
    /// An unreadable library is set aside and the session starts empty; see
    /// [`StorySession::recovery`].
    pub fn open(config: SessionConfig) -> Result<Self, SessionError> {
        let backend = FileStore::open(&config.data_dir)?;
        let (library, recovery) = LibraryStore::open(backend, config.library)?;
        let generator = TemplateGenerator::new().with_delay(config.generator_delay);

        let mut session = Self::new(library, Arc::new(generator));
        session.recovery = recovery;
        Ok(session)
    }
}

impl<B: KeyValueStore> StorySession<B> {
    /// Create a session over an already loaded library.
    pub fn new(library: LibraryStore<B>, generator: Arc<dyn StoryGenerator>) -> Self {
        Self {
            controller: ViewController::new(library),
            generator,
            pending: None,
            next_ticket: 0,
            unsaved: None,
            recovery: None,
        }
    }

    /// Switch to the generating screen and start producing a story.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_generation(&mut self, config: GenerationConfig) -> Result<Outcome, SessionError> {
        if self.controller.dispatch(Intent::StartGenerate)? == Outcome::Ignored {
            return Ok(Outcome::Ignored);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let (result_tx, result_rx) = oneshot::channel();
        let generator = Arc::clone(&self.generator);
        let handle = tokio::spawn(async move {
            let result = generator.generate(&config).await;
            // The receiver is gone if the generation was cancelled.
            let _ = result_tx.send(result);
        });

        debug!(ticket, "generation started");
        self.pending = Some(PendingGeneration {
            ticket,
            result_rx,
            handle,
        });
        Ok(Outcome::Applied)
    }

    /// Abandon the generation in progress and return to the library.
    pub fn cancel(&mut self) -> Result<Outcome, SessionError> {
        let outcome = self.controller.dispatch(Intent::Cancel)?;
        if outcome == Outcome::Applied {
            self.unsaved = None;
            if let Some(pending) = self.pending.take() {
                pending.handle.abort();
                info!(ticket = pending.ticket, "generation cancelled");
            }
        }
        Ok(outcome)
    }

    /// Wait for the running generation and open the story it produced.
    ///
    /// Cancel safe: dropping the returned future leaves the generation
    /// pending. A failed generation returns the session to the library. A
    /// story that could not be saved is kept for [`Self::retry_save`] and the
    /// session stays on the generating screen. If the controller is no
    /// longer generating the story is dropped with
    /// [`SessionError::NotGenerating`].
    pub async fn next_story(&mut self) -> Result<Story, SessionError> {
        let pending = self.pending.as_mut().ok_or(SessionError::NotGenerating)?;
        let received = (&mut pending.result_rx).await;
        let ticket = pending.ticket;
        self.pending = None;

        let result = received.unwrap_or(Err(GenerationError::Interrupted));
        match result {
            Ok(story) => {
                debug!(ticket, id = %story.id, "generation finished");
                self.deliver(story)
            }
            Err(error) => {
                warn!(ticket, %error, "generation failed");
                self.controller.dispatch(Intent::Cancel)?;
                Err(error.into())
            }
        }
    }

    /// Try saving a story whose earlier save failed.
    pub fn retry_save(&mut self) -> Result<Story, SessionError> {
        let story = self.unsaved.take().ok_or(SessionError::NothingToRetry)?;
        self.deliver(story)
    }

    fn deliver(&mut self, story: Story) -> Result<Story, SessionError> {
        match self.controller.dispatch(Intent::StoryReady(story.clone())) {
            Ok(Outcome::Applied) => Ok(story),
            Ok(Outcome::Ignored) => {
                // The controller left the generating screen behind our back.
                warn!(
                    id = %story.id,
                    screen = %self.screen(),
                    "story arrived outside generation, dropped"
                );
                Err(SessionError::NotGenerating)
            }
            Err(error) => {
                self.unsaved = Some(story);
                Err(error.into())
            }
        }
    }

    /// Open a library story.
    pub fn open_story(&mut self, id: &StoryId) -> Result<Outcome, SessionError> {
        Ok(self.controller.open_story_by_id(id)?)
    }

    /// Leave the reader.
    pub fn back(&mut self) -> Result<Outcome, SessionError> {
        Ok(self.controller.dispatch(Intent::Back)?)
    }

    /// Delete a library story.
    pub fn delete_story(&mut self, id: &StoryId) -> Result<Outcome, SessionError> {
        Ok(self.controller.dispatch(Intent::DeleteStory(id.clone()))?)
    }

    /// Route any intent through the session.
    ///
    /// `StartGenerate` starts a generation with the default config and
    /// `Cancel` aborts the running one, so the task bookkeeping stays in
    /// step with the screen.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Outcome, SessionError> {
        match intent {
            Intent::StartGenerate => self.start_generation(GenerationConfig::default()),
            Intent::Cancel => self.cancel(),
            Intent::StoryReady(story) => {
                if self.screen() != Screen::Generating {
                    return Ok(Outcome::Ignored);
                }
                // Supersedes whatever the running task would have produced.
                if let Some(pending) = self.pending.take() {
                    pending.handle.abort();
                }
                self.deliver(story).map(|_| Outcome::Applied)
            }
            other => Ok(self.controller.dispatch(other)?),
        }
    }

    /// True while a spawned generation has not been collected.
    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    /// Story waiting for [`Self::retry_save`].
    pub fn unsaved(&self) -> Option<&Story> {
        self.unsaved.as_ref()
    }

    /// Report from startup if the library payload had to be discarded.
    pub fn recovery(&self) -> Option<&Recovery> {
        self.recovery.as_ref()
    }

    pub fn state(&self) -> &ViewState {
        self.controller.state()
    }

    pub fn screen(&self) -> Screen {
        self.controller.screen()
    }

    pub fn active_story(&self) -> Option<&Story> {
        self.controller.active_story()
    }

    pub fn stories(&self) -> &[Story] {
        self.controller.stories()
    }

    pub fn controller(&self) -> &ViewController<B> {
        &self.controller
    }

    /// Mutable controller access, e.g. to subscribe views.
    pub fn controller_mut(&mut self) -> &mut ViewController<B> {
        &mut self.controller
    }
}

impl<B: KeyValueStore> Drop for StorySession<B> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}
