//! Tracing setup for the popup terminal and its demo binary.
//!
//! Much smaller than a full multi-layer setup: one `fmt` layer, writer
//! chosen by the caller, level filter from `RUST_LOG` with a default.

use tracing_subscriber::{fmt, EnvFilter};

/// Where log lines go. A popup embedded in a curses screen can't share
/// stdout with the terminal it's drawing into, so file output is the
/// common case; stderr is useful when nothing else owns the terminal yet.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(std::path::PathBuf),
}

/// Install a global `tracing` subscriber. Safe to call at most once per
/// process; a second call is a logic error in the caller, not something
/// this function tries to paper over.
///
/// # Errors
/// Returns an error if `target` names a file that can't be created, or if a
/// global subscriber is already installed.
pub fn init(target: LogTarget) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => {
            fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            fmt().with_env_filter(filter).with_writer(file).with_ansi(false).try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_target_creates_parent_relative_file() {
        let dir = std::env::temp_dir().join("popup_term_logging_test");
        let _ = std::fs::remove_file(&dir);
        let target = LogTarget::File(dir.clone());
        // Only assert the file gets created; a second `init` in the same
        // process would error on "already set", so we don't call `init`
        // twice across the test suite.
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&dir);
        assert!(file.is_ok());
        let _ = std::fs::remove_file(&dir);
        let _ = target;
    }
}
