//! Story generation.
//!
//! The controller does not know how stories are written. Anything that
//! implements [`StoryGenerator`] can back a session: a remote model, the
//! offline [`TemplateGenerator`], or a scripted mock in tests.

use crate::story::{unix_now, Story, StoryId};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Errors from story generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("Generation was interrupted")]
    Interrupted,
}

/// How long a story should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    /// Number of middle paragraphs between the opening and the ending.
    pub fn middle_paragraphs(self) -> usize {
        match self {
            StoryLength::Short => 1,
            StoryLength::Medium => 3,
            StoryLength::Long => 5,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "short" | "s" => Some(StoryLength::Short),
            "medium" | "m" => Some(StoryLength::Medium),
            "long" | "l" => Some(StoryLength::Long),
            _ => None,
        }
    }
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Free-form theme, e.g. "a brave little lighthouse".
    pub prompt: String,

    /// Name of the main character, if the reader picked one.
    pub hero: Option<String>,

    pub length: StoryLength,
}

impl GenerationConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            hero: None,
            length: StoryLength::default(),
        }
    }

    /// Set the main character.
    pub fn with_hero(mut self, hero: impl Into<String>) -> Self {
        self.hero = Some(hero.into());
        self
    }

    /// Set the story length.
    pub fn with_length(mut self, length: StoryLength) -> Self {
        self.length = length;
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new("a surprise")
    }
}

/// Produces one story per call.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(&self, config: &GenerationConfig) -> Result<Story, GenerationError>;
}

const HEROES: &[&str] = &[
    "a curious fox",
    "a sleepy dragon",
    "a small lighthouse keeper",
    "a clockwork owl",
    "a girl who collected clouds",
];

const PLACES: &[&str] = &[
    "at the edge of a whispering forest",
    "in a village built on the back of a turtle",
    "beside a lake that reflected tomorrow",
    "high in a tower made of books",
];

const TURNS: &[&str] = &[
    "One morning a letter arrived with no name on it, only a map.",
    "The wind carried a song nobody had heard before.",
    "A door appeared in the old oak tree, just big enough to squeeze through.",
    "The stars went out one by one, and someone had to find them.",
    "A stranger asked for help and offered nothing in return.",
    "The river stopped flowing and began, very politely, to talk.",
    "Every clock in the village struck thirteen at once.",
];

const ENDINGS: &[&str] = &[
    "And from that day on, nobody was ever quite as afraid of the dark.",
    "They walked home slowly, because the best part of an adventure is the way back.",
    "The map went into a drawer, but it was never really put away.",
    "And if you listen closely tonight, you might still hear the song.",
];

/// Offline generator that assembles a tale from phrase tables.
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    delay: Duration,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before returning, to behave like a remote model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Build a story synchronously.
    pub fn compose(&self, config: &GenerationConfig) -> Story {
        let mut rng = rand::thread_rng();

        let hero = config
            .hero
            .clone()
            .unwrap_or_else(|| pick(&mut rng, HEROES).to_string());
        let place = pick(&mut rng, PLACES);
        let theme = config.prompt.trim();

        let mut body = Vec::with_capacity(config.length.middle_paragraphs() + 2);
        body.push(format!(
            "Once upon a time, {place}, there lived {hero}. This is a story about {theme}."
        ));

        let mut turns: Vec<&str> = TURNS.to_vec();
        turns.shuffle(&mut rng);
        for turn in turns.iter().cycle().take(config.length.middle_paragraphs()) {
            let courage = rng.gen_range(2..=9);
            body.push(format!(
                "{turn} {} thought about it {courage} times, and then did it anyway.",
                capitalize(&hero)
            ));
        }
        body.push(pick(&mut rng, ENDINGS).to_string());

        Story {
            id: StoryId::new(),
            title: title_for(&hero, theme),
            body,
            theme: (!theme.is_empty()).then(|| theme.to_string()),
            created_at: unix_now(),
        }
    }
}

#[async_trait]
impl StoryGenerator for TemplateGenerator {
    async fn generate(&self, config: &GenerationConfig) -> Result<Story, GenerationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.compose(config))
    }
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_for(hero: &str, theme: &str) -> String {
    let hero = hero
        .trim_start_matches("a ")
        .trim_start_matches("an ")
        .trim_start_matches("the ");
    if theme.is_empty() {
        format!("The Tale of the {}", capitalize(hero))
    } else {
        format!("{} and {}", capitalize(hero), theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_builder() {
        let config = GenerationConfig::new("friendship")
            .with_hero("Mira")
            .with_length(StoryLength::Long);
        assert_eq!(config.prompt, "friendship");
        assert_eq!(config.hero.as_deref(), Some("Mira"));
        assert_eq!(config.length, StoryLength::Long);
    }

    #[test]
    fn test_story_length_parse() {
        assert_eq!(StoryLength::parse("SHORT"), Some(StoryLength::Short));
        assert_eq!(StoryLength::parse("l"), Some(StoryLength::Long));
        assert_eq!(StoryLength::parse("epic"), None);
    }

    #[test]
    fn test_compose_paragraph_count() {
        let generator = TemplateGenerator::new();
        for length in [StoryLength::Short, StoryLength::Medium, StoryLength::Long] {
            let story = generator.compose(&GenerationConfig::new("rain").with_length(length));
            assert_eq!(story.body.len(), length.middle_paragraphs() + 2);
        }
    }

    #[test]
    fn test_compose_uses_hero_and_theme() {
        let story = TemplateGenerator::new()
            .compose(&GenerationConfig::new("a lost kite").with_hero("Mira"));
        assert!(story.body[0].contains("Mira"));
        assert!(story.body[0].contains("a lost kite"));
        assert_eq!(story.title, "Mira and a lost kite");
        assert_eq!(story.theme.as_deref(), Some("a lost kite"));
    }

    #[test]
    fn test_compose_gives_fresh_ids() {
        let generator = TemplateGenerator::new();
        let config = GenerationConfig::default();
        assert_ne!(generator.compose(&config).id, generator.compose(&config).id);
    }

    #[test]
    fn test_title_without_theme() {
        assert_eq!(title_for("a sleepy dragon", ""), "The Tale of the Sleepy dragon");
    }

    #[tokio::test]
    async fn test_template_generator_async() {
        let generator = TemplateGenerator::new().with_delay(Duration::from_millis(5));
        let story = generator
            .generate(&GenerationConfig::new("snow"))
            .await
            .expect("template generation should not fail");
        assert!(!story.title.is_empty());
    }
}
