//! The view state machine.
//!
//! [`ViewController`] decides which screen is visible and which story is
//! being read. Views never change state themselves; they send an [`Intent`]
//! and re-render when a subscriber callback fires.
//!
//! | Screen     | Intent           | Next       |
//! |------------|------------------|------------|
//! | Library    | `StartGenerate`  | Generating |
//! | Library    | `OpenStory`      | Reading    |
//! | Library    | `DeleteStory`    | Library    |
//! | Generating | `Cancel`         | Library    |
//! | Generating | `StoryReady`     | Reading    |
//! | Reading    | `Back`           | Library    |
//!
//! Any other combination is ignored.

use crate::library::{LibraryError, LibraryStore};
use crate::persist::KeyValueStore;
use crate::story::{Story, StoryId};
use std::fmt;
use tracing::debug;

/// Which screen is showing, without the attached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Library,
    Generating,
    Reading,
}

impl Screen {
    pub fn name(self) -> &'static str {
        match self {
            Screen::Library => "library",
            Screen::Generating => "generating",
            Screen::Reading => "reading",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The current view. Only `Reading` carries a story.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Library,
    Generating,
    Reading(Story),
}

impl ViewState {
    pub fn screen(&self) -> Screen {
        match self {
            ViewState::Library => Screen::Library,
            ViewState::Generating => Screen::Generating,
            ViewState::Reading(_) => Screen::Reading,
        }
    }

    /// The story being read, if any.
    pub fn active_story(&self) -> Option<&Story> {
        match self {
            ViewState::Reading(story) => Some(story),
            _ => None,
        }
    }
}

/// A user or system event fed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Ask for a new story.
    StartGenerate,
    /// Open a story from the library.
    OpenStory(Story),
    /// Abandon the generation in progress.
    Cancel,
    /// The generator delivered a story.
    StoryReady(Story),
    /// Leave the reader.
    Back,
    /// Delete a story from the library.
    DeleteStory(StoryId),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::StartGenerate => "start_generate",
            Intent::OpenStory(_) => "open_story",
            Intent::Cancel => "cancel",
            Intent::StoryReady(_) => "story_ready",
            Intent::Back => "back",
            Intent::DeleteStory(_) => "delete_story",
        }
    }
}

/// Whether an intent did anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored,
}

/// Notification sent to subscribers after an applied intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    ScreenChanged { from: Screen, to: Screen },
    LibraryChanged { len: usize },
}

/// Handle returned by [`ViewController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&ViewChange, &ViewState, &[Story])>;

/// Single-writer state machine over the visible screen.
pub struct ViewController<B: KeyValueStore> {
    library: LibraryStore<B>,
    state: ViewState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl<B: KeyValueStore> ViewController<B> {
    /// Create a controller on the library screen.
    pub fn new(library: LibraryStore<B>) -> Self {
        Self {
            library,
            state: ViewState::Library,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Apply an intent.
    ///
    /// Intents that are not valid on the current screen return
    /// `Ok(Outcome::Ignored)` and change nothing. A failed library write
    /// leaves the controller on the screen it was on.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Outcome, LibraryError> {
        let from = self.state.screen();
        let name = intent.name();
        let mut changes = Vec::new();

        match (from, intent) {
            (Screen::Library, Intent::StartGenerate) => {
                self.state = ViewState::Generating;
            }
            (Screen::Library, Intent::OpenStory(story)) => {
                self.state = ViewState::Reading(story);
            }
            (Screen::Library, Intent::DeleteStory(id)) => {
                let len = self.library.remove(&id)?.len();
                changes.push(ViewChange::LibraryChanged { len });
            }
            (Screen::Generating, Intent::Cancel) => {
                self.state = ViewState::Library;
            }
            (Screen::Generating, Intent::StoryReady(story)) => {
                let len = self.library.add(story.clone())?.len();
                changes.push(ViewChange::LibraryChanged { len });
                self.state = ViewState::Reading(story);
            }
            (Screen::Reading, Intent::Back) => {
                self.state = ViewState::Library;
            }
            (screen, _) => {
                debug!(intent = name, %screen, "ignoring intent");
                return Ok(Outcome::Ignored);
            }
        }

        let to = self.state.screen();
        if from != to {
            changes.insert(0, ViewChange::ScreenChanged { from, to });
        }
        debug!(intent = name, %from, %to, "intent applied");

        self.notify(&changes);
        Ok(Outcome::Applied)
    }

    /// Open the library story with `id`. Unknown ids are ignored.
    pub fn open_story_by_id(&mut self, id: &StoryId) -> Result<Outcome, LibraryError> {
        match self.library.get(id).cloned() {
            Some(story) => self.dispatch(Intent::OpenStory(story)),
            None => {
                debug!(id = %id, "no story with that id");
                Ok(Outcome::Ignored)
            }
        }
    }

    /// Register a callback run after every applied intent.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ViewChange, &ViewState, &[Story]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Drop a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, changes: &[ViewChange]) {
        for change in changes {
            for (_, subscriber) in self.subscribers.iter_mut() {
                subscriber(change, &self.state, self.library.stories());
            }
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    pub fn active_story(&self) -> Option<&Story> {
        self.state.active_story()
    }

    /// Stories in the library, newest first.
    pub fn stories(&self) -> &[Story] {
        self.library.stories()
    }

    pub fn library(&self) -> &LibraryStore<B> {
        &self.library
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.library.backend_mut()
    }
}
