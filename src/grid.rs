//! The cell grid: a rows×cols array of (glyph byte, attribute word) pairs,
//! plus cursor, scroll-region and charset state. This is the terminal's
//! "screen memory" — the VT parser (`crate::vt`) is the only thing that
//! mutates it.

/// Reverse video.
pub const REVERSE: u16 = 0x01;
/// Bold / bright.
pub const BOLD: u16 = 0x02;
/// Underline.
pub const UNDERLINE: u16 = 0x04;
/// Dim / faint.
pub const DIM: u16 = 0x08;
/// Set when the cell was written while GL was bound to the line-drawing charset.
pub const ACS: u16 = 0x10;

const FG_SHIFT: u16 = 8;
const BG_SHIFT: u16 = 12;
const COLOR_MASK: u16 = 0x0F;

/// A packed 16-bit cell attribute: style flags plus a 4-bit fg/bg palette
/// index each (0 = default, 1..8 = ANSI color).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr(pub u16);

impl Attr {
    #[must_use]
    pub fn flags(self) -> u16 { self.0 & (REVERSE | BOLD | UNDERLINE | DIM | ACS) }

    #[must_use]
    pub fn has(self, flag: u16) -> bool { self.0 & flag != 0 }

    pub fn set_flag(&mut self, flag: u16, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[must_use]
    pub fn fg(self) -> u8 { ((self.0 >> FG_SHIFT) & COLOR_MASK) as u8 }

    pub fn set_fg(&mut self, idx: u8) {
        self.0 = (self.0 & !(COLOR_MASK << FG_SHIFT)) | (u16::from(idx & 0x0F) << FG_SHIFT);
    }

    #[must_use]
    pub fn bg(self) -> u8 { ((self.0 >> BG_SHIFT) & COLOR_MASK) as u8 }

    pub fn set_bg(&mut self, idx: u8) {
        self.0 = (self.0 & !(COLOR_MASK << BG_SHIFT)) | (u16::from(idx & 0x0F) << BG_SHIFT);
    }
}

/// Which of the two designated character sets GL is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Ascii,
    LineDrawing,
}

/// Erase-in-line / erase-in-display mode, as selected by the CSI parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// From cursor to end.
    ToEnd,
    /// From start to cursor (inclusive).
    ToStart,
    /// Entire line/screen.
    All,
}

impl EraseMode {
    #[must_use]
    pub fn from_param(p: u16) -> Self {
        match p {
            1 => EraseMode::ToStart,
            2 => EraseMode::All,
            _ => EraseMode::ToEnd,
        }
    }
}

/// The rectangular cell grid and all the VT100 state that travels with it.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<u8>,
    attrs: Vec<Attr>,

    pub cx: usize,
    pub cy: usize,
    pub saved_cx: usize,
    pub saved_cy: usize,
    pub cur_attr: Attr,

    pub scroll_top: usize,
    pub scroll_bottom: usize,

    pub wrap_pending: bool,

    pub g0_charset: Charset,
    pub g1_charset: Charset,
    pub use_g1: bool,

    pub app_cursor: bool,
    pub app_keypad: bool,
}

impl Grid {
    /// Create a blank grid. `rows` and `cols` are clamped to at least 1.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![b' '; rows * cols],
            attrs: vec![Attr::default(); rows * cols],
            cx: 0,
            cy: 0,
            saved_cx: 0,
            saved_cy: 0,
            cur_attr: Attr::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            wrap_pending: false,
            g0_charset: Charset::Ascii,
            g1_charset: Charset::Ascii,
            use_g1: false,
            app_cursor: false,
            app_keypad: false,
        }
    }

    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> (u8, Attr) {
        let i = self.idx(row, col);
        (self.cells[i], self.attrs[i])
    }

    fn idx(&self, row: usize, col: usize) -> usize { row * self.cols + col }

    /// Resize in place, preserving whatever upper-left content still fits
    /// and blanking newly exposed cells with the current attribute.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut new_cells = vec![b' '; rows * cols];
        let mut new_attrs = vec![self.cur_attr; rows * cols];
        for row in 0..rows.min(self.rows) {
            for col in 0..cols.min(self.cols) {
                let old = self.idx(row, col);
                let new = row * cols + col;
                new_cells[new] = self.cells[old];
                new_attrs[new] = self.attrs[old];
            }
        }
        self.cells = new_cells;
        self.attrs = new_attrs;
        self.rows = rows;
        self.cols = cols;
        self.cx = self.cx.min(cols - 1);
        self.cy = self.cy.min(rows - 1);
        self.scroll_top = self.scroll_top.min(rows - 1);
        self.scroll_bottom = self.scroll_bottom.min(rows - 1).max(self.scroll_top);
        self.wrap_pending = false;
    }

    fn clear_wrap(&mut self) { self.wrap_pending = false; }

    /// Put a single printable byte at the cursor, handling deferred wrap.
    pub fn put(&mut self, byte: u8) {
        if self.wrap_pending {
            self.wrap_pending = false;
            self.cx = 0;
            self.advance_line();
        }
        let mut attr = self.cur_attr;
        if self.use_g1 {
            attr.set_flag(ACS, self.g1_charset == Charset::LineDrawing);
        } else {
            attr.set_flag(ACS, self.g0_charset == Charset::LineDrawing);
        }
        let i = self.idx(self.cy, self.cx);
        self.cells[i] = byte;
        self.attrs[i] = attr;
        if self.cx == self.cols - 1 {
            self.wrap_pending = true;
        } else {
            self.cx += 1;
        }
    }

    /// Move down one line within the scroll region, scrolling if at the bottom.
    fn advance_line(&mut self) {
        if self.cy == self.scroll_bottom {
            self.scroll_up(1);
        } else {
            self.cy = (self.cy + 1).min(self.rows - 1);
        }
    }

    /// Line feed / IND.
    pub fn lf(&mut self) {
        self.clear_wrap();
        self.advance_line();
    }

    /// Reverse index.
    pub fn ri(&mut self) {
        self.clear_wrap();
        if self.cy == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cy = self.cy.saturating_sub(1);
        }
    }

    /// Next line: CR then LF.
    pub fn nel(&mut self) {
        self.cr();
        self.lf();
    }

    pub fn cr(&mut self) {
        self.cx = 0;
        self.clear_wrap();
    }

    pub fn bs(&mut self) {
        self.clear_wrap();
        self.cx = self.cx.saturating_sub(1);
    }

    pub fn ht(&mut self) {
        self.clear_wrap();
        self.cx = ((self.cx / 8) + 1) * 8;
        self.cx = self.cx.min(self.cols - 1);
    }

    fn blank_row_range(&mut self, row: usize, from: usize, to_exclusive: usize) {
        let attr = self.cur_attr;
        for col in from..to_exclusive {
            let i = self.idx(row, col);
            self.cells[i] = b' ';
            self.attrs[i] = attr;
        }
    }

    /// CSI K.
    pub fn erase_in_line(&mut self, mode: EraseMode) {
        match mode {
            EraseMode::ToEnd => self.blank_row_range(self.cy, self.cx, self.cols),
            EraseMode::ToStart => self.blank_row_range(self.cy, 0, self.cx + 1),
            EraseMode::All => self.blank_row_range(self.cy, 0, self.cols),
        }
    }

    /// CSI J. Must never touch charset/DECCKM/keypad/scroll-region/saved cursor.
    pub fn erase_in_display(&mut self, mode: EraseMode) {
        match mode {
            EraseMode::ToEnd => {
                self.blank_row_range(self.cy, self.cx, self.cols);
                for row in (self.cy + 1)..self.rows {
                    self.blank_row_range(row, 0, self.cols);
                }
            }
            EraseMode::ToStart => {
                for row in 0..self.cy {
                    self.blank_row_range(row, 0, self.cols);
                }
                self.blank_row_range(self.cy, 0, self.cx + 1);
            }
            EraseMode::All => {
                for row in 0..self.rows {
                    self.blank_row_range(row, 0, self.cols);
                }
            }
        }
    }

    /// Scroll the region `[scroll_top, scroll_bottom]` up by `n`, discarding
    /// the top `n` rows and filling the bottom `n` with blanks.
    pub fn scroll_up(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        if n < height {
            for row in top..=(bottom - n) {
                for col in 0..self.cols {
                    let src = self.idx(row + n, col);
                    let dst = self.idx(row, col);
                    self.cells[dst] = self.cells[src];
                    self.attrs[dst] = self.attrs[src];
                }
            }
        }
        for row in (bottom + 1 - n)..=bottom {
            self.blank_row_range(row, 0, self.cols);
        }
    }

    /// Scroll the region down by `n` (the RI / DECSTBM-aware direction).
    pub fn scroll_down(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        if n < height {
            for row in (top..=(bottom - n)).rev() {
                for col in 0..self.cols {
                    let src = self.idx(row, col);
                    let dst = self.idx(row + n, col);
                    self.cells[dst] = self.cells[src];
                    self.attrs[dst] = self.attrs[src];
                }
            }
        }
        for row in top..(top + n) {
            self.blank_row_range(row, 0, self.cols);
        }
    }

    /// CSI L at the cursor row, legal only inside the scroll region.
    pub fn insert_lines(&mut self, n: usize) {
        if self.cy < self.scroll_top || self.cy > self.scroll_bottom {
            return;
        }
        let saved_top = self.scroll_top;
        self.scroll_top = self.cy;
        self.scroll_down(n);
        self.scroll_top = saved_top;
    }

    /// CSI M at the cursor row, legal only inside the scroll region.
    pub fn delete_lines(&mut self, n: usize) {
        if self.cy < self.scroll_top || self.cy > self.scroll_bottom {
            return;
        }
        let saved_top = self.scroll_top;
        self.scroll_top = self.cy;
        self.scroll_up(n);
        self.scroll_top = saved_top;
    }

    /// CSI @.
    pub fn insert_chars(&mut self, n: usize) {
        let row = self.cy;
        let n = n.min(self.cols - self.cx);
        for col in ((self.cx + n)..self.cols).rev() {
            let src = self.idx(row, col - n);
            let dst = self.idx(row, col);
            self.cells[dst] = self.cells[src];
            self.attrs[dst] = self.attrs[src];
        }
        self.blank_row_range(row, self.cx, self.cx + n);
    }

    /// CSI P.
    pub fn delete_chars(&mut self, n: usize) {
        let row = self.cy;
        let n = n.min(self.cols - self.cx);
        for col in self.cx..(self.cols - n) {
            let src = self.idx(row, col + n);
            let dst = self.idx(row, col);
            self.cells[dst] = self.cells[src];
            self.attrs[dst] = self.attrs[src];
        }
        self.blank_row_range(row, self.cols - n, self.cols);
    }

    /// CSI X.
    pub fn erase_chars(&mut self, n: usize) {
        let end = (self.cx + n).min(self.cols);
        self.blank_row_range(self.cy, self.cx, end);
    }

    /// CSI r. 1-based inclusive; invalid resets to full screen. Homes the cursor.
    pub fn set_scroll_region(&mut self, top_1based: usize, bottom_1based: usize) {
        let top = top_1based.saturating_sub(1);
        let bottom = bottom_1based.saturating_sub(1);
        if top >= bottom || bottom >= self.rows {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        } else {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
        self.cx = 0;
        self.cy = 0;
        self.clear_wrap();
    }

    pub fn cup(&mut self, row_1based: usize, col_1based: usize) {
        self.cy = row_1based.saturating_sub(1).min(self.rows - 1);
        self.cx = col_1based.saturating_sub(1).min(self.cols - 1);
        self.clear_wrap();
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.cy = self.cy.saturating_sub(n);
        self.clear_wrap();
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.cy = (self.cy + n).min(self.rows - 1);
        self.clear_wrap();
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.cx = (self.cx + n).min(self.cols - 1);
        self.clear_wrap();
    }

    pub fn cursor_backward(&mut self, n: usize) {
        self.cx = self.cx.saturating_sub(n);
        self.clear_wrap();
    }

    pub fn cursor_next_line(&mut self, n: usize) {
        self.cursor_down(n);
        self.cx = 0;
    }

    pub fn cursor_prev_line(&mut self, n: usize) {
        self.cursor_up(n);
        self.cx = 0;
    }

    pub fn cursor_column(&mut self, col_1based: usize) {
        self.cx = col_1based.saturating_sub(1).min(self.cols - 1);
        self.clear_wrap();
    }

    pub fn cursor_row(&mut self, row_1based: usize) {
        self.cy = row_1based.saturating_sub(1).min(self.rows - 1);
        self.clear_wrap();
    }

    pub fn save_cursor(&mut self) {
        self.saved_cx = self.cx;
        self.saved_cy = self.cy;
    }

    pub fn restore_cursor(&mut self) {
        self.cx = self.saved_cx.min(self.cols - 1);
        self.cy = self.saved_cy.min(self.rows - 1);
        self.clear_wrap();
    }

    /// ESC c: full reset of cell contents and all modes.
    pub fn full_reset(&mut self) {
        let rows = self.rows;
        let cols = self.cols;
        *self = Grid::new(rows, cols);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn attr_packs_fg_bg_independently_of_flags() {
        let mut a = Attr::default();
        a.set_flag(BOLD, true);
        a.set_fg(3);
        a.set_bg(5);
        assert!(a.has(BOLD));
        assert!(!a.has(REVERSE));
        assert_eq!(a.fg(), 3);
        assert_eq!(a.bg(), 5);
    }

    #[test]
    fn put_wraps_at_last_column_without_advancing_cursor() {
        let mut g = Grid::new(3, 5);
        for b in b"HELLO" {
            g.put(*b);
        }
        assert_eq!(&g.cells[0..5], b"HELLO");
        assert_eq!(g.cy, 0);
        assert_eq!(g.cx, 4);
        assert!(g.wrap_pending);

        g.put(b'!');
        assert_eq!(&g.cells[0..5], b"HELLO");
        assert_eq!(g.cy, 1);
        assert_eq!(g.cx, 1);
        assert_eq!(g.cells[g.idx(1, 0)], b'!');
    }

    #[test]
    fn lf_scrolls_only_within_region() {
        let mut g = Grid::new(10, 3);
        g.scroll_top = 2;
        g.scroll_bottom = 4;
        g.cy = 4;
        g.cells[g.idx(0, 0)] = b'A';
        g.cells[g.idx(9, 0)] = b'Z';
        g.cells[g.idx(2, 0)] = b'2';
        g.cells[g.idx(3, 0)] = b'3';
        g.cells[g.idx(4, 0)] = b'4';
        g.lf();
        assert_eq!(g.cells[g.idx(0, 0)], b'A');
        assert_eq!(g.cells[g.idx(9, 0)], b'Z');
        assert_eq!(g.cells[g.idx(2, 0)], b'3');
        assert_eq!(g.cells[g.idx(3, 0)], b'4');
        assert_eq!(g.cells[g.idx(4, 0)], b' ');
        assert_eq!(g.cy, 4);
    }

    #[test]
    fn insert_delete_line_noop_outside_region() {
        let mut g = Grid::new(10, 3);
        g.scroll_top = 2;
        g.scroll_bottom = 4;
        g.cy = 0;
        g.cells[g.idx(0, 0)] = b'A';
        g.insert_lines(1);
        assert_eq!(g.cells[g.idx(0, 0)], b'A');
    }

    #[test]
    fn erase_in_display_all_preserves_modes() {
        let mut g = Grid::new(5, 5);
        g.app_cursor = true;
        g.g0_charset = Charset::LineDrawing;
        g.scroll_top = 1;
        g.scroll_bottom = 3;
        g.saved_cx = 2;
        g.saved_cy = 2;
        g.cur_attr.set_fg(4);
        g.erase_in_display(EraseMode::All);
        assert!(g.app_cursor);
        assert_eq!(g.g0_charset, Charset::LineDrawing);
        assert_eq!((g.scroll_top, g.scroll_bottom), (1, 3));
        assert_eq!((g.saved_cx, g.saved_cy), (2, 2));
        for &b in &g.cells {
            assert_eq!(b, b' ');
        }
    }

    #[test]
    fn erase_in_line_uses_current_sgr() {
        let mut g = Grid::new(3, 5);
        g.cur_attr.set_bg(1);
        g.cy = 1;
        g.erase_in_line(EraseMode::All);
        for col in 0..g.cols {
            let (_, attr) = g.cell(1, col);
            assert_eq!(attr.bg(), 1);
        }
    }
}
