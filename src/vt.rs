//! VT100/ANSI byte-stream dispatch: a `vte::Perform` implementation that
//! drives a [`Grid`](crate::grid::Grid). The automaton states themselves
//! (NORMAL/ESC/CSI/OSC) are `vte`'s own; this module only decides what each
//! dispatched event means for the grid.

use vte::{Params, Perform};

use crate::{
    color,
    grid::{EraseMode, Grid},
};

/// Wraps a [`Grid`] and a [`vte::Parser`], exposing a single `feed` entry
/// point. One `Vt` is owned by each popup in TERM mode.
pub struct Vt {
    pub grid: Grid,
    parser: vte::Parser,
}

impl std::fmt::Debug for Vt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vt").field("grid", &self.grid).finish_non_exhaustive()
    }
}

impl Vt {
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { grid: Grid::new(rows, cols), parser: vte::Parser::new() }
    }

    /// Feed a chunk of raw bytes from the child through the parser into the grid.
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut performer = Performer { grid: &mut self.grid };
        for &b in bytes {
            self.parser.advance(&mut performer, b);
        }
    }

    /// Resize the underlying grid (see `Grid::resize` for preservation rules).
    pub fn resize(&mut self, rows: usize, cols: usize) { self.grid.resize(rows, cols); }
}

struct Performer<'a> {
    grid: &'a mut Grid,
}

fn first_params(params: &Params) -> Vec<u16> {
    params.iter().map(|sub| *sub.first().unwrap_or(&0)).collect()
}

fn param_or(params: &[u16], idx: usize, default: u16) -> u16 {
    match params.get(idx) {
        Some(&0) | None => default,
        Some(&v) => v,
    }
}

impl Performer<'_> {
    fn sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.grid.cur_attr = crate::grid::Attr::default();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.grid.cur_attr = crate::grid::Attr::default(),
                1 => self.grid.cur_attr.set_flag(crate::grid::BOLD, true),
                2 => self.grid.cur_attr.set_flag(crate::grid::DIM, true),
                4 => self.grid.cur_attr.set_flag(crate::grid::UNDERLINE, true),
                7 => self.grid.cur_attr.set_flag(crate::grid::REVERSE, true),
                22 => {
                    self.grid.cur_attr.set_flag(crate::grid::BOLD, false);
                    self.grid.cur_attr.set_flag(crate::grid::DIM, false);
                }
                24 => self.grid.cur_attr.set_flag(crate::grid::UNDERLINE, false),
                27 => self.grid.cur_attr.set_flag(crate::grid::REVERSE, false),
                30..=37 => self.grid.cur_attr.set_fg((params[i] - 30 + 1) as u8),
                39 => self.grid.cur_attr.set_fg(0),
                40..=47 => self.grid.cur_attr.set_bg((params[i] - 40 + 1) as u8),
                49 => self.grid.cur_attr.set_bg(0),
                90..=97 => {
                    self.grid.cur_attr.set_fg((params[i] - 90 + 1) as u8);
                    self.grid.cur_attr.set_flag(crate::grid::BOLD, true);
                }
                100..=107 => self.grid.cur_attr.set_bg((params[i] - 100 + 1) as u8),
                38 | 48 => {
                    let is_fg = params[i] == 38;
                    match params.get(i + 1) {
                        Some(5) => {
                            if let Some(&idx) = params.get(i + 2) {
                                let reduced = color::reduce_256(idx as u8);
                                if is_fg {
                                    self.grid.cur_attr.set_fg(reduced);
                                } else {
                                    self.grid.cur_attr.set_bg(reduced);
                                }
                            }
                            i += 2;
                        }
                        Some(2) => {
                            let r = *params.get(i + 2).unwrap_or(&0) as u8;
                            let g = *params.get(i + 3).unwrap_or(&0) as u8;
                            let b = *params.get(i + 4).unwrap_or(&0) as u8;
                            let reduced = color::reduce_rgb(r, g, b);
                            if is_fg {
                                self.grid.cur_attr.set_fg(reduced);
                            } else {
                                self.grid.cur_attr.set_bg(reduced);
                            }
                            i += 4;
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
}

impl Perform for Performer<'_> {
    fn print(&mut self, c: char) {
        let byte = if c.is_ascii() { c as u8 } else { b'?' };
        self.grid.put(byte);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x0E => self.grid.use_g1 = true,
            0x0F => self.grid.use_g1 = false,
            b'\r' => self.grid.cr(),
            b'\n' => self.grid.lf(),
            0x08 => self.grid.bs(),
            b'\t' => self.grid.ht(),
            0x07 => {} // BEL ignored
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, c: char) {
        let p = first_params(params);
        let dec_private = intermediates.contains(&b'?');

        if c != 'm' {
            self.grid.wrap_pending = false;
        }

        match c {
            'H' | 'f' => {
                self.grid.cup(param_or(&p, 0, 1) as usize, param_or(&p, 1, 1) as usize);
            }
            'A' => self.grid.cursor_up(param_or(&p, 0, 1) as usize),
            'B' => self.grid.cursor_down(param_or(&p, 0, 1) as usize),
            'C' => self.grid.cursor_forward(param_or(&p, 0, 1) as usize),
            'D' => self.grid.cursor_backward(param_or(&p, 0, 1) as usize),
            'E' => self.grid.cursor_next_line(param_or(&p, 0, 1) as usize),
            'F' => self.grid.cursor_prev_line(param_or(&p, 0, 1) as usize),
            'G' => self.grid.cursor_column(param_or(&p, 0, 1) as usize),
            'd' => self.grid.cursor_row(param_or(&p, 0, 1) as usize),
            'J' => self.grid.erase_in_display(EraseMode::from_param(p.first().copied().unwrap_or(0))),
            'K' => self.grid.erase_in_line(EraseMode::from_param(p.first().copied().unwrap_or(0))),
            'r' => {
                let top = param_or(&p, 0, 1) as usize;
                let bottom = if p.len() > 1 && p[1] != 0 {
                    p[1] as usize
                } else {
                    self.grid.rows
                };
                self.grid.set_scroll_region(top, bottom);
            }
            'L' => self.grid.insert_lines(param_or(&p, 0, 1) as usize),
            'M' => self.grid.delete_lines(param_or(&p, 0, 1) as usize),
            '@' => self.grid.insert_chars(param_or(&p, 0, 1) as usize),
            'P' => self.grid.delete_chars(param_or(&p, 0, 1) as usize),
            'X' => self.grid.erase_chars(param_or(&p, 0, 1) as usize),
            'S' => self.grid.scroll_up(param_or(&p, 0, 1) as usize),
            'T' => self.grid.scroll_down(param_or(&p, 0, 1) as usize),
            's' => self.grid.save_cursor(),
            'u' => self.grid.restore_cursor(),
            'h' if dec_private => self.set_dec_mode(&p, true),
            'l' if dec_private => self.set_dec_mode(&p, false),
            'm' => self.sgr(&p),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if intermediates == [b'('] || intermediates == [b')'] {
            let charset = match byte {
                b'0' => crate::grid::Charset::LineDrawing,
                _ => crate::grid::Charset::Ascii,
            };
            if intermediates == [b'('] {
                self.grid.g0_charset = charset;
            } else {
                self.grid.g1_charset = charset;
            }
            return;
        }
        match byte {
            b'c' => self.grid.full_reset(),
            b'7' => self.grid.save_cursor(),
            b'8' => self.grid.restore_cursor(),
            b'D' => self.grid.lf(),
            b'M' => self.grid.ri(),
            b'E' => self.grid.nel(),
            b'=' => self.grid.app_keypad = true,
            b'>' => self.grid.app_keypad = false,
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}
    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
}

impl Performer<'_> {
    fn set_dec_mode(&mut self, params: &[u16], enabled: bool) {
        for &mode in params {
            match mode {
                1 => self.grid.app_cursor = enabled,
                47 | 1049 => {
                    if enabled {
                        self.grid.erase_in_display(EraseMode::All);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decstbm_then_lf_scrolls_containment() {
        let mut vt = Vt::new(5, 3);
        vt.feed(b"\x1b[2;4r");
        vt.feed(b"\x1b[4;1H");
        vt.feed(b"A\n");
        assert_eq!(vt.grid.cy, 3);
        assert_eq!(vt.grid.cx, 0);
    }

    #[test]
    fn erase_in_display_keeps_modes_end_to_end() {
        let mut vt = Vt::new(5, 5);
        vt.feed(b"\x1b[?1h\x1b(0\x1b[2J");
        assert!(vt.grid.app_cursor);
        assert_eq!(vt.grid.g0_charset, crate::grid::Charset::LineDrawing);
        for row in 0..5 {
            for col in 0..5 {
                assert_eq!(vt.grid.cell(row, col).0, b' ');
            }
        }
    }

    #[test]
    fn sgr_color_degradation() {
        let mut vt = Vt::new(3, 3);
        vt.feed(b"\x1b[38;5;196m");
        assert_eq!(vt.grid.cur_attr.fg(), 2);
        vt.feed(b"\x1b[0m\x1b[38;2;0;255;0m");
        assert_eq!(vt.grid.cur_attr.fg(), 3);
    }

    #[test]
    fn dec_private_mode_toggles_app_cursor() {
        let mut vt = Vt::new(3, 3);
        assert!(!vt.grid.app_cursor);
        vt.feed(b"\x1b[?1h");
        assert!(vt.grid.app_cursor);
        vt.feed(b"\x1b[?1l");
        assert!(!vt.grid.app_cursor);
    }

    #[test]
    fn insert_delete_line_respects_region_end_to_end() {
        let mut vt = Vt::new(10, 3);
        vt.feed(b"\x1b[3;5r"); // region rows 2..4 (0-based)
        vt.feed(b"\x1b[1;1H"); // cursor row 0, outside region
        vt.feed(b"\x1b[L"); // insert line: no-op outside region
        assert_eq!(vt.grid.cy, 0);
    }
}
