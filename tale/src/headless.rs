//! Headless mode for the story reader.
//!
//! A line-oriented text interface suitable for terminals, scripts and
//! automated testing. Lines starting with `#` are commands; every screen
//! change is printed by a subscriber on the view controller.

use crate::views::{self, Command};
use std::io::{self, Write};
use tale_core::{
    KeyValueStore, Outcome, Screen, SessionError, StorySession, ViewChange, ViewState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Whether to keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run the reader on stdin/stdout until `#quit` or end of input.
///
/// At end of input a story still being written is awaited and saved;
/// `#quit` abandons it.
pub async fn run_headless<B: KeyValueStore>(mut session: StorySession<B>) -> io::Result<()> {
    println!("=== Story Reader ===");
    if let Some(recovery) = session.recovery() {
        println!("[WARNING] Saved library could not be read and was reset: {}", recovery.error);
        if let Some(slot) = &recovery.backup_slot {
            println!("[WARNING] The unreadable data was kept in '{slot}'");
        }
    }
    println!("Type #help for commands.");
    println!();
    print!("{}", views::render(session.state(), session.stories()));
    io::stdout().flush().ok();

    session.controller_mut().subscribe(print_on_change);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = if session.is_generating() {
            tokio::select! {
                line = lines.next_line() => line?,
                result = session.next_story() => {
                    if let Err(e) = result {
                        report_error(&e);
                    }
                    continue;
                }
            }
        } else {
            lines.next_line().await?
        };

        let Some(line) = line else {
            finish_pending(&mut session).await;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if handle_line(&mut session, line) == Flow::Quit {
            println!("Goodbye!");
            break;
        }
        io::stdout().flush().ok();
    }

    Ok(())
}

/// At end of input, wait for a story still being written so it gets saved.
async fn finish_pending<B: KeyValueStore>(session: &mut StorySession<B>) {
    if !session.is_generating() {
        return;
    }
    println!("[STATUS] Input closed, finishing the story being written...");
    if let Err(e) = session.next_story().await {
        report_error(&e);
    }
}

/// Subscriber that re-renders on screen changes and on library edits made
/// from the library screen.
fn print_on_change(change: &ViewChange, state: &ViewState, stories: &[tale_core::Story]) {
    let redraw = match change {
        ViewChange::ScreenChanged { .. } => true,
        ViewChange::LibraryChanged { .. } => state.screen() == Screen::Library,
    };
    if redraw {
        println!();
        print!("{}", views::render(state, stories));
        io::stdout().flush().ok();
    }
}

fn handle_line<B: KeyValueStore>(session: &mut StorySession<B>, line: &str) -> Flow {
    let command = match views::parse_command(line, session.stories()) {
        Ok(command) => command,
        Err(message) => {
            println!("[ERROR] {message}");
            return Flow::Continue;
        }
    };
    debug!(?command, "command");

    let result = match command {
        Command::Quit => return Flow::Quit,
        Command::Help => {
            println!("{}", views::help_text());
            return Flow::Continue;
        }
        Command::Show => {
            print!("{}", views::render(session.state(), session.stories()));
            return Flow::Continue;
        }
        Command::Retry => session.retry_save().map(|_| Outcome::Applied),
        Command::Generate(config) => session.start_generation(config),
        Command::Intent(intent) => session.dispatch(intent),
    };

    match result {
        Ok(Outcome::Applied) => {}
        Ok(Outcome::Ignored) => {
            println!("[IGNORED] Not available on the {} screen", session.screen());
        }
        Err(e) => report_error(&e),
    }
    Flow::Continue
}

fn report_error(error: &SessionError) {
    println!("[ERROR] {error}");
    if let SessionError::Library(_) = error {
        println!("[ERROR] Nothing was changed. Type #retry to try saving again, or #cancel.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tale_core::{LibraryConfig, LibraryStore, MemoryStore, MockGenerator, Story};

    fn session() -> StorySession<MemoryStore> {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_story(Story::with_id("a", "A"));
        StorySession::new(
            LibraryStore::new(MemoryStore::new(), LibraryConfig::new()),
            generator,
        )
    }

    #[tokio::test]
    async fn test_handle_line_drives_session() {
        let mut session = session();

        assert_eq!(handle_line(&mut session, "#new owls"), Flow::Continue);
        assert_eq!(session.screen(), Screen::Generating);

        session.next_story().await.unwrap();
        assert_eq!(session.screen(), Screen::Reading);

        handle_line(&mut session, "#back");
        handle_line(&mut session, "#delete 1");
        assert!(session.stories().is_empty());

        assert_eq!(handle_line(&mut session, "#quit"), Flow::Quit);
    }

    #[tokio::test]
    async fn test_end_of_input_saves_pending_story() {
        let mut session = session();
        handle_line(&mut session, "#new owls");
        assert!(session.is_generating());

        finish_pending(&mut session).await;
        assert!(!session.is_generating());
        assert_eq!(session.screen(), Screen::Reading);
        assert_eq!(session.stories().len(), 1);
        assert!(session.controller().library().backend().get("tale-library").unwrap().is_some());

        // Nothing pending is a no-op.
        finish_pending(&mut session).await;
        assert_eq!(session.stories().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_line_ignores_bad_input() {
        let mut session = session();
        assert_eq!(handle_line(&mut session, "hello"), Flow::Continue);
        assert_eq!(handle_line(&mut session, "#back"), Flow::Continue);
        assert_eq!(handle_line(&mut session, "#open 3"), Flow::Continue);
        assert_eq!(session.screen(), Screen::Library);
    }
}
