//! Walks the cell grid, merges consecutive cells of equal attribute into
//! runs, and draws them into a `pancurses` window. Never mutates the grid.

use pancurses::{chtype, Window};

use crate::{
    color::PairCache,
    grid::{Attr, Grid, ACS, BOLD, DIM, REVERSE, UNDERLINE},
};

/// Map one VT100 line-drawing byte to its `pancurses` ACS glyph. Bytes with
/// no corresponding line-drawing glyph fall back to themselves.
#[must_use]
fn acs_glyph(byte: u8) -> chtype {
    match byte {
        b'q' => pancurses::acs::hline(),
        b'x' => pancurses::acs::vline(),
        b'l' => pancurses::acs::ulcorner(),
        b'k' => pancurses::acs::urcorner(),
        b'm' => pancurses::acs::llcorner(),
        b'j' => pancurses::acs::lrcorner(),
        b't' => pancurses::acs::ltee(),
        b'u' => pancurses::acs::rtee(),
        b'v' => pancurses::acs::btee(),
        b'w' => pancurses::acs::ttee(),
        b'n' => pancurses::acs::plus(),
        other => chtype::from(other),
    }
}

fn attr_mask(attr: Attr, pairs: &mut PairCache) -> chtype {
    let mut mask: chtype = 0;
    if attr.has(BOLD) {
        mask |= pancurses::A_BOLD;
    }
    if attr.has(DIM) {
        mask |= pancurses::A_DIM;
    }
    if attr.has(UNDERLINE) {
        mask |= pancurses::A_UNDERLINE;
    }
    if attr.has(REVERSE) {
        mask |= pancurses::A_REVERSE;
    }
    if let Some(pair_id) = pairs.pair_for(attr.fg(), attr.bg()) {
        mask |= pancurses::COLOR_PAIR(pair_id as chtype);
    }
    mask
}

/// Render `grid` into `window` at the window's origin, one run per
/// `pancurses` call. Host cells beyond the grid's extent are padded with
/// spaces under the default attribute.
pub fn draw(window: &Window, grid: &Grid, pairs: &mut PairCache) {
    let (win_rows, win_cols) = window.get_max_yx();
    let win_rows = win_rows.max(0) as usize;
    let win_cols = win_cols.max(0) as usize;

    for row in 0..win_rows.min(grid.rows) {
        window.mv(row as i32, 0);
        let mut col = 0;
        while col < grid.cols.min(win_cols) {
            let (_, attr) = grid.cell(row, col);
            let run_start = col;
            while col < grid.cols.min(win_cols) && grid.cell(row, col).1 == attr {
                col += 1;
            }
            let mask = attr_mask(attr, pairs);
            window.attrset(mask);
            for c in run_start..col {
                let (byte, a) = grid.cell(row, c);
                let ch = if a.has(ACS) { acs_glyph(byte) } else { chtype::from(byte) };
                window.addch(ch);
            }
        }
        window.attrset(0);
        for _ in grid.cols.min(win_cols)..win_cols {
            window.addch(' ');
        }
    }
    for row in grid.rows.min(win_rows)..win_rows {
        window.mv(row as i32, 0);
        for _ in 0..win_cols {
            window.addch(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acs_glyph_maps_known_bytes() {
        assert_eq!(acs_glyph(b'q'), pancurses::acs::hline());
        assert_eq!(acs_glyph(b'x'), pancurses::acs::vline());
        assert_eq!(acs_glyph(b'Z'), chtype::from(b'Z'));
    }

    #[test]
    fn attr_mask_allocates_pair_only_when_non_default() {
        let mut pairs = PairCache::new(16, 256);
        let default = Attr::default();
        assert_eq!(attr_mask(default, &mut pairs) & pancurses::A_BOLD, 0);

        let mut colored = Attr::default();
        colored.set_fg(2);
        let mask = attr_mask(colored, &mut pairs);
        assert_ne!(mask, 0);
    }
}
