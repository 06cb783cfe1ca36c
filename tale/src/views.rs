//! Text views and command parsing.
//!
//! Views are pure: they take the current state and library and return the
//! text to print. Commands typed by the reader are parsed into intents here;
//! nothing in this module touches the session.

use tale_core::{GenerationConfig, Intent, Story, StoryLength, ViewState};

/// Something the reader asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a generation with this config.
    Generate(GenerationConfig),
    /// Forward to the controller.
    Intent(Intent),
    /// Retry saving a story whose save failed.
    Retry,
    /// Re-print the current view.
    Show,
    Help,
    Quit,
}

/// Render whichever screen `state` is on.
pub fn render(state: &ViewState, stories: &[Story]) -> String {
    match state {
        ViewState::Library => render_library(stories),
        ViewState::Generating => render_generating(),
        ViewState::Reading(story) => render_reader(story),
    }
}

pub fn render_library(stories: &[Story]) -> String {
    let mut out = String::from("[LIBRARY]\n");
    if stories.is_empty() {
        out.push_str("  No stories yet. Type #new <theme> to write one.\n");
        return out;
    }
    for (i, story) in stories.iter().enumerate() {
        let theme = story
            .theme
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:>2}. {}{} - {} words\n",
            i + 1,
            story.title,
            theme,
            story.word_count()
        ));
    }
    out
}

pub fn render_generating() -> String {
    "[GENERATING] Writing your story... (#cancel to stop)\n".to_string()
}

pub fn render_reader(story: &Story) -> String {
    let mut out = format!("[READING] {}\n\n", story.title);
    for para in &story.body {
        out.push_str(para);
        out.push_str("\n\n");
    }
    out.push_str("(#back to return to the library)\n");
    out
}

pub fn help_text() -> &'static str {
    "[HELP]
  #new [--hero NAME] [--length short|medium|long] <theme>  - Write a new story
  #open <number|id>    - Read a story from the library
  #delete <number|id>  - Delete a story from the library
  #back                - Return to the library
  #cancel              - Stop the story being written
  #retry               - Retry saving a story that failed to save
  #show                - Show the current screen again
  #help                - Show this help
  #quit                - Exit"
}

/// Parse one input line.
pub fn parse_command(line: &str, stories: &[Story]) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('#') else {
        return Err("Commands start with '#'. Type #help for help.".to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    match name.as_str() {
        "new" | "generate" => parse_generate(&args).map(Command::Generate),
        "open" | "read" => {
            let story = resolve(&args, stories)?;
            Ok(Command::Intent(Intent::OpenStory(story.clone())))
        }
        "delete" | "rm" => {
            let story = resolve(&args, stories)?;
            Ok(Command::Intent(Intent::DeleteStory(story.id.clone())))
        }
        "back" => Ok(Command::Intent(Intent::Back)),
        "cancel" => Ok(Command::Intent(Intent::Cancel)),
        "retry" => Ok(Command::Retry),
        "show" | "list" | "status" => Ok(Command::Show),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err("Unknown command. Type #help for help.".to_string()),
    }
}

fn parse_generate(args: &[&str]) -> Result<GenerationConfig, String> {
    let mut hero = None;
    let mut length = StoryLength::default();
    let mut words = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--hero" => {
                let value = args.get(i + 1).ok_or("Usage: --hero NAME")?;
                hero = Some(value.to_string());
                i += 1;
            }
            "--length" => {
                let value = args.get(i + 1).ok_or("Usage: --length short|medium|long")?;
                length = StoryLength::parse(value)
                    .ok_or_else(|| format!("Unknown length '{value}'"))?;
                i += 1;
            }
            word => words.push(word),
        }
        i += 1;
    }

    let mut config = if words.is_empty() {
        GenerationConfig::default()
    } else {
        GenerationConfig::new(words.join(" "))
    };
    config = config.with_length(length);
    if let Some(hero) = hero {
        config = config.with_hero(hero);
    }
    Ok(config)
}

/// Find a story by 1-based list number or by id.
fn resolve<'a>(args: &[&str], stories: &'a [Story]) -> Result<&'a Story, String> {
    let key = args.first().ok_or("Usage: <number|id>")?;

    if let Ok(n) = key.parse::<usize>() {
        if let Some(story) = n.checked_sub(1).and_then(|i| stories.get(i)) {
            return Ok(story);
        }
    }

    stories
        .iter()
        .find(|s| s.id.as_str() == *key)
        .ok_or_else(|| format!("No story '{key}' in the library"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Vec<Story> {
        vec![
            Story::with_id("b", "Second").with_theme("snow"),
            Story::with_id("a", "First"),
        ]
    }

    #[test]
    fn test_render_empty_library() {
        assert!(render(&ViewState::Library, &[]).contains("No stories yet"));
    }

    #[test]
    fn test_render_library_numbers_stories() {
        let out = render_library(&library());
        assert!(out.contains(" 1. Second (snow)"));
        assert!(out.contains(" 2. First"));
    }

    #[test]
    fn test_render_reader_prints_paragraphs() {
        let story = Story::new("Tide", vec!["First.".to_string(), "Second.".to_string()]);
        let out = render(&ViewState::Reading(story), &[]);
        assert!(out.starts_with("[READING] Tide"));
        assert!(out.contains("First.\n\nSecond."));
    }

    #[test]
    fn test_render_generating() {
        assert!(render(&ViewState::Generating, &library()).contains("[GENERATING]"));
    }

    #[test]
    fn test_parse_requires_hash() {
        assert!(parse_command("open 1", &library()).is_err());
    }

    #[test]
    fn test_parse_open_by_number_and_id() {
        let stories = library();
        assert_eq!(
            parse_command("#open 2", &stories).unwrap(),
            Command::Intent(Intent::OpenStory(stories[1].clone()))
        );
        assert_eq!(
            parse_command("#read b", &stories).unwrap(),
            Command::Intent(Intent::OpenStory(stories[0].clone()))
        );
        assert!(parse_command("#open 0", &stories).is_err());
        assert!(parse_command("#open 9", &stories).is_err());
        assert!(parse_command("#open", &stories).is_err());
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            parse_command("#delete 1", &library()).unwrap(),
            Command::Intent(Intent::DeleteStory("b".into()))
        );
    }

    #[test]
    fn test_parse_new_with_options() {
        let command =
            parse_command("#new --hero Mira --length short a lost kite", &[]).unwrap();
        let Command::Generate(config) = command else {
            panic!("expected a generate command");
        };
        assert_eq!(config.prompt, "a lost kite");
        assert_eq!(config.hero.as_deref(), Some("Mira"));
        assert_eq!(config.length, StoryLength::Short);
    }

    #[test]
    fn test_parse_new_defaults() {
        assert_eq!(
            parse_command("#new", &[]).unwrap(),
            Command::Generate(GenerationConfig::default())
        );
        assert!(parse_command("#new --length epic dragons", &[]).is_err());
        assert!(parse_command("#new --hero", &[]).is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("#back", &[]).unwrap(), Command::Intent(Intent::Back));
        assert_eq!(parse_command("#CANCEL", &[]).unwrap(), Command::Intent(Intent::Cancel));
        assert_eq!(parse_command("#retry", &[]).unwrap(), Command::Retry);
        assert_eq!(parse_command("#list", &[]).unwrap(), Command::Show);
        assert_eq!(parse_command("#exit", &[]).unwrap(), Command::Quit);
        assert!(parse_command("#dance", &[]).is_err());
    }
}
