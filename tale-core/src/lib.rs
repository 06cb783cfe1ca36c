//! Story library and view state machine for an AI story reader.
//!
//! This crate provides:
//! - A durable, ordered library of generated stories
//! - The view controller deciding between library, generating and reading
//! - A pluggable story generator with an offline template implementation
//! - An async session tying generation to the controller
//!
//! # Quick Start
//!
//! ```ignore
//! use tale_core::{GenerationConfig, SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = StorySession::open(SessionConfig::new("saves"))?;
//!
//!     session.start_generation(GenerationConfig::new("a lighthouse that could not sleep"))?;
//!     let story = session.next_story().await?;
//!     println!("{}", story.title);
//!
//!     session.back()?;
//!     println!("{} stories saved", session.stories().len());
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod generator;
pub mod library;
pub mod persist;
pub mod session;
pub mod story;
pub mod testing;

// Primary public API
pub use controller::{Intent, Outcome, Screen, SubscriptionId, ViewChange, ViewController, ViewState};
pub use generator::{GenerationConfig, GenerationError, StoryGenerator, StoryLength, TemplateGenerator};
pub use library::{LibraryConfig, LibraryError, LibraryStore, Recovery};
pub use persist::{FileStore, KeyValueStore, MemoryStore, PersistError};
pub use session::{SessionConfig, SessionError, StorySession};
pub use story::{Story, StoryId};
pub use testing::{FlakyStore, MockGenerator, TestHarness};
