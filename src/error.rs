//! Error taxonomy for the popup terminal.
//!
//! Mirrors the split the rest of this lineage uses: a narrow `thiserror` enum
//! for the library surface, with `miette` reserved for the outer binary.

use std::io;

use thiserror::Error;

/// Errors that can surface from the handful of fallible popup-terminal
/// constructors. Everything reachable from the steady-state loop (`pump`,
/// `draw`, `handle_key`, `set_geom`, `close`) is infallible by contract and
/// degrades silently instead of returning one of these.
#[derive(Debug, Error)]
pub enum PopupError {
    /// Opening the PTY pair or spawning the child failed.
    #[error("failed to spawn child on pty: {0}")]
    Spawn(#[source] io::Error),
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, PopupError>;
