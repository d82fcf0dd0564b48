//! The popup controller: the INPUT/TERM state machine that owns one
//! viewport rectangle, one cell grid + VT parser, one PTY and one raw-output
//! ring, and drives them from a single synchronous `pump()` per outer tick.

use std::collections::VecDeque;

use tracing::debug;

use crate::{keyenc, pty::PtySupervisor, vt::Vt};

/// Bound on the raw-tail ring used to recover a picker's final selection line.
const RAW_TAIL_CAPACITY: usize = 8 * 1024;
/// Bound on the INPUT-mode command buffer.
const INPUT_MAX_LEN: usize = 255;
/// Substring that marks a command as a fuzzy-picker whose final output line
/// should be harvested on exit. Kept as a literal substring match rather
/// than generalised to "any command with a trailing selection line" — see
/// DESIGN.md for the rationale.
const PICKER_SENTINEL: &str = "fzy";

/// A per-node record in the outer tree: the one thing the popup writes back
/// to when a picker produces a selection.
pub trait OwnerNode {
    /// Human-readable label shown in the INPUT-mode prompt.
    fn display_name(&self) -> &str;
    /// The command to run, if this node has one configured.
    fn command(&self) -> Option<&str>;
    /// Store a harvested picker selection.
    fn set_val(&mut self, val: String);
}

/// INPUT: editing a command line. TERM: a child is running and forwarding keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupMode {
    Input,
    Term,
}

/// A rectangle in host-terminal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub y: i32,
    pub x: i32,
    pub h: i32,
    pub w: i32,
}

impl Rect {
    #[must_use]
    pub fn clamped(y: i32, x: i32, h: i32, w: i32) -> Self {
        Self { y, x, h: h.max(3), w: w.max(10) }
    }

    #[must_use]
    pub fn inner(self) -> (usize, usize) {
        ((self.h - 2).max(1) as usize, (self.w - 2).max(1) as usize)
    }
}

/// The popup itself. `None` when closed; `Some` wraps the open state.
#[derive(Debug, Default)]
pub struct Popup {
    open: Option<OpenPopup>,
    /// Set by `pump` when a picker just harvested a selection; the outer
    /// loop should read then clear this before the next `open`.
    pub closed_by_enter: bool,
    /// One-shot token naming which owner `closed_by_enter`'s harvest was
    /// written to. The popup never stores an owner reference across calls
    /// (each `open`/`pump` borrows one for the duration of that call only),
    /// so this is the display name, not the node itself — enough for the
    /// outer loop to tell which tree node just changed.
    pub last_owner: Option<String>,
}

#[derive(Debug)]
struct OpenPopup {
    mode: PopupMode,
    rect: Rect,
    input: String,
    owner_display_name: String,
    term: Option<TermState>,
}

struct TermState {
    vt: Vt,
    pty: PtySupervisor,
    raw_tail: VecDeque<u8>,
    cmd: String,
}

impl std::fmt::Debug for TermState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermState").field("cmd", &self.cmd).finish_non_exhaustive()
    }
}

impl Popup {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn is_open(&self) -> bool { self.open.is_some() }

    #[must_use]
    pub fn mode(&self) -> Option<PopupMode> { self.open.as_ref().map(|o| o.mode) }

    /// Open the popup at `rect`. If `owner` already has a command, spawn it
    /// immediately (TERM); otherwise start in INPUT mode so the user can type one.
    pub fn open(&mut self, owner: &dyn OwnerNode, rect: Rect) {
        self.closed_by_enter = false;
        self.last_owner = None;
        let rect = Rect::clamped(rect.y, rect.x, rect.h, rect.w);
        let owner_display_name = owner.display_name().to_string();
        match owner.command() {
            Some(cmd) if !cmd.trim().is_empty() => {
                let (rows, cols) = rect.inner();
                let term = Self::spawn_term(cmd, rows, cols);
                self.open = Some(OpenPopup {
                    mode: PopupMode::Term,
                    rect,
                    input: String::new(),
                    owner_display_name,
                    term,
                });
            }
            _ => {
                self.open = Some(OpenPopup {
                    mode: PopupMode::Input,
                    rect,
                    input: String::new(),
                    owner_display_name,
                    term: None,
                });
            }
        }
    }

    fn spawn_term(cmd: &str, rows: usize, cols: usize) -> Option<TermState> {
        match PtySupervisor::spawn(cmd, rows as u16, cols as u16) {
            Ok(pty) => Some(TermState {
                vt: Vt::new(rows, cols),
                pty,
                raw_tail: VecDeque::with_capacity(RAW_TAIL_CAPACITY),
                cmd: cmd.to_string(),
            }),
            Err(e) => {
                tracing::warn!("popup spawn failed, staying in INPUT mode: {e}");
                None
            }
        }
    }

    /// Handle one host key event. Returns true if something changed (repaint needed).
    pub fn handle_key(&mut self, input: pancurses::Input) -> bool {
        let Some(state) = self.open.as_ref() else { return false };
        match state.mode {
            PopupMode::Input => self.handle_input_key(input),
            PopupMode::Term => self.handle_term_key(input),
        }
    }

    fn handle_input_key(&mut self, input: pancurses::Input) -> bool {
        // Ctrl+X or ESC fully closes the popup from INPUT mode.
        if matches!(input, pancurses::Input::Character('\x18') | pancurses::Input::Character('\x1b')) {
            self.close();
            return true;
        }

        let Some(state) = self.open.as_mut() else { return false };
        match input {
            pancurses::Input::Character(c) if (' '..='~').contains(&c) => {
                if state.input.len() < INPUT_MAX_LEN {
                    state.input.push(c);
                }
                true
            }
            pancurses::Input::KeyBackspace | pancurses::Input::Character('\x7f') => {
                state.input.pop();
                true
            }
            pancurses::Input::Character('\r') | pancurses::Input::KeyEnter => {
                let cmd = state.input.trim_start().to_string();
                if !cmd.is_empty() {
                    let (rows, cols) = state.rect.inner();
                    state.term = Popup::spawn_term(&cmd, rows, cols);
                    if state.term.is_some() {
                        state.mode = PopupMode::Term;
                    }
                }
                true
            }
            _ => false,
        }
    }

    fn handle_term_key(&mut self, input: pancurses::Input) -> bool {
        // Ctrl+X force-closes the whole popup, not just the running child.
        if input == pancurses::Input::Character('\x18') {
            self.close();
            return true;
        }

        let Some(state) = self.open.as_mut() else { return false };
        let Some(term) = state.term.as_mut() else { return false };
        if let Some(bytes) = keyenc::encode(input, term.vt.grid.app_cursor) {
            term.pty.write_best_effort(&bytes);
        }
        true
    }

    /// Drain PTY output into the grid (and raw-tail ring), and reap the
    /// child if it has exited, harvesting a picker selection if applicable.
    /// Returns true if anything changed.
    pub fn pump(&mut self, owner: &mut dyn OwnerNode) -> bool {
        let Some(state) = self.open.as_mut() else { return false };
        let Some(term) = state.term.as_mut() else { return false };

        let mut changed = false;
        let raw_tail = &mut term.raw_tail;
        let consumed = term.pty.drain_into(|chunk| {
            term.vt.feed(chunk);
            for &b in chunk {
                if raw_tail.len() == RAW_TAIL_CAPACITY {
                    raw_tail.pop_front();
                }
                raw_tail.push_back(b);
            }
        });
        changed |= consumed > 0;

        if term.pty.try_wait_exited() {
            // Drain one more time under the same budget.
            let raw_tail = &mut term.raw_tail;
            term.pty.drain_into(|chunk| {
                term.vt.feed(chunk);
                for &b in chunk {
                    if raw_tail.len() == RAW_TAIL_CAPACITY {
                        raw_tail.pop_front();
                    }
                    raw_tail.push_back(b);
                }
            });

            if term.cmd.contains(PICKER_SENTINEL) {
                if let Some(selection) = harvest_selection(&term.raw_tail) {
                    let name = owner.display_name().to_string();
                    owner.set_val(selection);
                    self.closed_by_enter = true;
                    self.last_owner = Some(name);
                }
            }
            state.term = None;
            state.mode = PopupMode::Input;
            changed = true;
            debug!("popup child exited, returning to INPUT mode");
        }
        changed
    }

    /// Resize/move the popup. Returns true if geometry actually changed.
    pub fn set_geom(&mut self, y: i32, x: i32, h: i32, w: i32) -> bool {
        let Some(state) = self.open.as_mut() else { return false };
        let new_rect = Rect::clamped(y, x, h, w);
        if new_rect == state.rect {
            return false;
        }
        let (rows, cols) = new_rect.inner();
        state.rect = new_rect;
        if let Some(term) = state.term.as_mut() {
            term.vt.resize(rows, cols);
            term.pty.resize(rows as u16, cols as u16);
        }
        true
    }

    /// Tear down the popup unconditionally (forced close). Always SIGTERMs
    /// a running child and waits the bounded grace period before dropping
    /// the PTY.
    pub fn close(&mut self) {
        if let Some(mut state) = self.open.take() {
            if let Some(term) = state.term.as_mut() {
                term.pty.kill_and_reap();
            }
        }
    }

    #[must_use]
    pub fn rect(&self) -> Option<Rect> { self.open.as_ref().map(|o| o.rect) }

    #[must_use]
    pub fn grid(&self) -> Option<&crate::grid::Grid> {
        self.open.as_ref().and_then(|o| o.term.as_ref()).map(|t| &t.vt.grid)
    }

    #[must_use]
    pub fn input_prompt(&self) -> Option<(&str, &str)> {
        self.open.as_ref().map(|o| (o.owner_display_name.as_str(), o.input.as_str()))
    }

    /// Render the popup into `window`: a bordered sub-window with the cell
    /// grid in TERM mode, or a single prompt line in INPUT mode. No-op while
    /// closed. Thin wrapper over [`crate::render::draw`], which does the
    /// actual run-merging against the grid.
    pub fn draw(&self, window: &pancurses::Window, pairs: &mut crate::color::PairCache) {
        let Some(state) = self.open.as_ref() else { return };
        match state.term.as_ref() {
            Some(term) => {
                if let Ok(sub) = window.subwin(state.rect.h, state.rect.w, state.rect.y, state.rect.x) {
                    sub.erase();
                    sub.draw_box(0, 0);
                    crate::render::draw(&sub, &term.vt.grid, pairs);
                }
            }
            None => {
                window.mvaddstr(
                    state.rect.y + state.rect.h,
                    state.rect.x,
                    &format!("run for {}: {}", state.owner_display_name, state.input),
                );
            }
        }
    }
}

/// Strip ANSI from the raw tail, find the last non-empty line, and strip an
/// optional leading `"> "` prompt.
fn harvest_selection(raw_tail: &VecDeque<u8>) -> Option<String> {
    let bytes: Vec<u8> = raw_tail.iter().copied().collect();
    let stripped = strip_ansi_escapes::strip(&bytes);
    let text = String::from_utf8_lossy(&stripped);
    let line = text.lines().rev().find(|l| !l.trim().is_empty())?;
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix("> ").unwrap_or(trimmed);
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    struct TestOwner {
        name: String,
        cmd: Option<String>,
        val: Option<String>,
    }

    impl OwnerNode for TestOwner {
        fn display_name(&self) -> &str { &self.name }
        fn command(&self) -> Option<&str> { self.cmd.as_deref() }
        fn set_val(&mut self, val: String) { self.val = Some(val); }
    }

    #[test]
    fn picker_harvest_round_trip() {
        let raw: VecDeque<u8> = b"\x1b[7m> alpha\x1b[0m\r\n> beta\r\nbeta\r\n".iter().copied().collect();
        assert_eq!(harvest_selection(&raw), Some("beta".to_string()));
    }

    #[test]
    fn harvest_respects_optional_prompt_prefix() {
        let raw: VecDeque<u8> = b"\x1b[7m> /etc/passwd\x1b[0m\r\n".iter().copied().collect();
        assert_eq!(harvest_selection(&raw), Some("/etc/passwd".to_string()));
    }

    #[test]
    fn rect_is_clamped_to_minimums() {
        let r = Rect::clamped(0, 0, 1, 1);
        assert_eq!(r.h, 3);
        assert_eq!(r.w, 10);
        assert_eq!(r.inner(), (1, 8));
    }

    #[test]
    fn open_without_command_enters_input_mode() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: None, val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        assert_eq!(popup.mode(), Some(PopupMode::Input));
    }

    #[test]
    fn esc_closes_popup_from_input_mode() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: None, val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        assert!(popup.is_open());

        let changed = popup.handle_key(pancurses::Input::Character('\x1b'));
        assert!(changed);
        assert!(!popup.is_open());
    }

    #[test]
    fn ctrl_x_closes_popup_from_input_mode() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: None, val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));

        let changed = popup.handle_key(pancurses::Input::Character('\x18'));
        assert!(changed);
        assert!(!popup.is_open());
    }

    #[test]
    #[serial]
    fn ctrl_x_fully_closes_popup_from_term_mode() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: Some("sleep 30".into()), val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        assert_eq!(popup.mode(), Some(PopupMode::Term));

        let changed = popup.handle_key(pancurses::Input::Character('\x18'));
        assert!(changed);
        assert!(!popup.is_open());
        assert_eq!(popup.mode(), None);
    }

    #[test]
    #[serial]
    fn picker_harvest_end_to_end_through_pump() {
        let mut popup = Popup::new();
        let mut owner = TestOwner {
            name: "picker".into(),
            // "# fzy" is a shell comment: it makes the command string match
            // the picker sentinel without needing a real `fzy` binary on PATH.
            cmd: Some("printf '> alpha\\r\\n> beta\\r\\nbeta\\r\\n' # fzy".into()),
            val: None,
        };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        assert_eq!(popup.mode(), Some(PopupMode::Term));

        for _ in 0..200 {
            popup.pump(&mut owner);
            if popup.closed_by_enter {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(popup.closed_by_enter);
        assert_eq!(popup.last_owner.as_deref(), Some("picker"));
        assert_eq!(owner.val.as_deref(), Some("beta"));
        assert_eq!(popup.mode(), Some(PopupMode::Input));
    }

    #[test]
    #[serial]
    fn set_geom_resizes_the_live_grid() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: Some("sleep 30".into()), val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        let (rows_before, cols_before) = {
            let g = popup.grid().expect("grid");
            (g.rows, g.cols)
        };

        let changed = popup.set_geom(0, 0, 20, 40);
        assert!(changed);
        let (rows_after, cols_after) = {
            let g = popup.grid().expect("grid");
            (g.rows, g.cols)
        };
        assert!(rows_after > rows_before);
        assert!(cols_after > cols_before);

        popup.close();
    }

    #[test]
    #[serial]
    fn close_force_kills_a_running_child_within_bound() {
        let mut popup = Popup::new();
        let owner = TestOwner { name: "node".into(), cmd: Some("sleep 30".into()), val: None };
        popup.open(&owner, Rect::clamped(0, 0, 10, 20));
        assert_eq!(popup.mode(), Some(PopupMode::Term));

        let start = std::time::Instant::now();
        popup.close();
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        assert!(!popup.is_open());
    }
}
