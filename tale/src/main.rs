//! Story reader application.
//!
//! Browse a library of generated stories, write new ones and read them,
//! from a line-oriented terminal interface:
//!
//! ```bash
//! cargo run -p tale -- --data-dir ./saves --delay-ms 500
//! ```
//!
//! Settings are read from `.env`, then `TALE_DATA_DIR`, `TALE_SLOT` and
//! `TALE_DELAY_MS`, then command line flags. Set `RUST_LOG=debug` to see
//! state transitions on stderr.

mod headless;
mod views;

use anyhow::Context;
use std::time::Duration;
use tale_core::{SessionConfig, StorySession};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = parse_config(&args, |key| std::env::var(key).ok())?;
    tracing::info!(data_dir = %config.data_dir.display(), slot = %config.library.slot, "opening library");

    let session = StorySession::open(config).context("failed to open the story library")?;
    headless::run_headless(session)
        .await
        .context("terminal input failed")?;
    Ok(())
}

/// Build the session config from environment lookups and arguments.
///
/// Arguments win over the environment.
fn parse_config(
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<SessionConfig> {
    let mut config = SessionConfig::default();

    if let Some(dir) = env("TALE_DATA_DIR") {
        config.data_dir = dir.into();
    }
    if let Some(slot) = env("TALE_SLOT") {
        config = config.with_slot(slot);
    }
    if let Some(ms) = env("TALE_DELAY_MS") {
        config = config.with_generator_delay(parse_delay(&ms)?);
    }

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" => {
                let dir = args.get(i + 1).context("--data-dir needs a path")?;
                config.data_dir = dir.into();
                i += 1;
            }
            "--slot" => {
                let slot = args.get(i + 1).context("--slot needs a name")?;
                config = config.with_slot(slot.clone());
                i += 1;
            }
            "--delay-ms" => {
                let ms = args.get(i + 1).context("--delay-ms needs a number")?;
                config = config.with_generator_delay(parse_delay(ms)?);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    Ok(config)
}

fn parse_delay(ms: &str) -> anyhow::Result<Duration> {
    let ms: u64 = ms
        .trim()
        .parse()
        .with_context(|| format!("invalid delay '{ms}', expected milliseconds"))?;
    Ok(Duration::from_millis(ms))
}

fn print_help() {
    println!("Story reader");
    println!();
    println!("Usage: tale [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --data-dir <PATH>   Directory for the library file (default: saves)");
    println!("  --slot <NAME>       Library slot name (default: tale-library)");
    println!("  --delay-ms <MS>     Simulated generation time (default: 800)");
    println!("  -h, --help          Show this help");
    println!();
    println!("Environment:");
    println!("  TALE_DATA_DIR, TALE_SLOT, TALE_DELAY_MS  Same as the flags above");
    println!("  RUST_LOG                                 Log filter, logs go to stderr");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("tale")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse_config(&args(&[]), |_| None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("saves"));
        assert_eq!(config.library.slot, "tale-library");
    }

    #[test]
    fn test_env_then_args() {
        let env: HashMap<&str, &str> = [
            ("TALE_DATA_DIR", "/from/env"),
            ("TALE_SLOT", "env-slot"),
            ("TALE_DELAY_MS", "5"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let config = parse_config(&args(&[]), lookup).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/from/env"));
        assert_eq!(config.library.slot, "env-slot");
        assert_eq!(config.generator_delay, Duration::from_millis(5));

        let config =
            parse_config(&args(&["--slot", "cli-slot", "--delay-ms", "0"]), lookup).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/from/env"));
        assert_eq!(config.library.slot, "cli-slot");
        assert_eq!(config.generator_delay, Duration::ZERO);
    }

    #[test]
    fn test_bad_values() {
        assert!(parse_config(&args(&["--delay-ms", "soon"]), |_| None).is_err());
        assert!(parse_config(&args(&["--data-dir"]), |_| None).is_err());
    }
}
