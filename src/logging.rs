//! Log output selection and subscriber setup.
//!
//! `--log` picks where `tracing` output goes: `0`/`off`, `1`/`stdout`,
//! `2`/`stderr` (default) or a file name opened in append mode. `--verbose`
//! lowers the level from INFO to DEBUG; `RUST_LOG` overrides both.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "0" | "off" | "none" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" | "" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }
}

/// Level used when `RUST_LOG` is not set.
pub fn default_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::INFO }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber.
pub fn init_logging(target: &LogTarget, verbose: bool) -> Result<()> {
    let level = default_level(verbose);
    match target {
        LogTarget::Off => {
            // No logging
        }
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(level))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(level))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(level))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_target_parsing() {
        assert_eq!(LogTarget::from_str("0"), LogTarget::Off);
        assert_eq!(LogTarget::from_str("off"), LogTarget::Off);
        assert_eq!(LogTarget::from_str("1"), LogTarget::Stdout);
        assert_eq!(LogTarget::from_str("stderr"), LogTarget::Stderr);
        assert_eq!(LogTarget::from_str(""), LogTarget::Stderr);
        assert_eq!(
            LogTarget::from_str("sync.log"),
            LogTarget::File(PathBuf::from("sync.log"))
        );
    }

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), Level::DEBUG);
        assert_eq!(default_level(false), Level::INFO);
    }

    #[test]
    fn test_off_installs_nothing() {
        assert!(init_logging(&LogTarget::Off, false).is_ok());
    }
}
