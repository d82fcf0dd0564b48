//! A small popup terminal: a VT100-ish cell grid driven by a PTY-backed
//! child process, rendered into a `pancurses` window and embeddable inside a
//! larger curses UI.
//!
//! The crate is organised the way the rest of this lineage organises a
//! terminal subsystem — parser, grid, color, render and pty as separate
//! modules under one roof — but the event loop here is deliberately
//! synchronous: one [`popup::Popup`] is pumped once per outer tick, with no
//! background thread and no async runtime.

pub mod color;
pub mod error;
pub mod grid;
pub mod keyenc;
pub mod logging;
pub mod popup;
pub mod pty;
pub mod render;
pub mod vt;

pub use error::{PopupError, Result};
pub use popup::{OwnerNode, Popup, PopupMode, Rect};
