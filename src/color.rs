//! Projection of 24-bit and xterm-256 colors onto the 8-color palette the
//! cell grid's attribute word can hold, plus lazy (fg,bg) -> host color pair
//! allocation.

/// Reduce an xterm-256 color index to one of the 8 ANSI colors (1..8; 0 is
/// "default" and is never produced by this function).
#[must_use]
pub fn reduce_256(index: u8) -> u8 {
    match index {
        0..=15 => reduce_basic(index),
        16..=231 => {
            let cube = index - 16;
            let r = cube / 36;
            let g = (cube / 6) % 6;
            let b = cube % 6;
            let axis = |v: u8| -> u8 { [0u8, 51, 102, 153, 204, 255][v as usize] };
            reduce_rgb(axis(r), axis(g), axis(b))
        }
        232..=255 => {
            // Grayscale ramp: luminance threshold decides black vs white.
            // Boundary at index 244/245, matching the source ramp's
            // `level = 8 + (n-232)*10; level > 128 ? white : black`.
            let level = index - 232;
            if level <= 12 { 1 } else { 8 }
        }
    }
}

/// 0..7 pass through, 8..15 fold onto their non-bright counterpart; both
/// land on the grid's 1-based 8-color palette.
fn reduce_basic(index: u8) -> u8 {
    let base = if index < 8 { index } else { index - 8 };
    base + 1
}

/// Chromaticity sieve mapping raw RGB onto the 8-color palette (1..8).
#[must_use]
pub fn reduce_rgb(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max < 40 {
        return 1; // black
    }
    if min > 200 {
        return 8; // white
    }
    if max - min < 20 {
        let mean = (u16::from(r) + u16::from(g) + u16::from(b)) / 3;
        return if mean > 128 { 8 } else { 1 };
    }
    let hi_r = r > 160;
    let hi_g = g > 160;
    let hi_b = b > 160;
    match (hi_r, hi_g, hi_b) {
        (true, true, true) => 8,
        (true, true, false) => 4,  // yellow
        (true, false, true) => 6,  // magenta
        (false, true, true) => 7,  // cyan
        (true, false, false) => 2, // red
        (false, true, false) => 3, // green
        (false, false, true) => 5, // blue
        (false, false, false) => {
            // No channel crosses the threshold: break ties by dominant channel.
            if r >= g && r >= b {
                2
            } else if g >= r && g >= b {
                3
            } else {
                5
            }
        }
    }
}

/// Color pair id together with the default "no pair needed" sentinel.
pub type PairId = i16;

/// Lazily-allocating cache of (fg, bg) -> host color pair id.
///
/// `start_id` lets the popup's allocator begin above whatever fixed pairs
/// the outer UI already owns, so the two never collide.
#[derive(Debug)]
pub struct PairCache {
    next_id: PairId,
    max_id: PairId,
    table: [[Option<PairId>; 16]; 16],
}

impl PairCache {
    #[must_use]
    pub fn new(start_id: PairId, max_id: PairId) -> Self {
        Self {
            next_id: start_id,
            max_id,
            table: [[None; 16]; 16],
        }
    }

    /// Look up (or lazily allocate) the pair id for `(fg, bg)`, where 0 means
    /// "default" for either channel. `fg`/`bg` are the grid's 4-bit palette
    /// indices (0..15), matching the attribute word's nibble width even
    /// though the color reducers only ever produce 0..8. Returns `None` if
    /// the host pair table was exhausted (caller should degrade to the
    /// default pair).
    pub fn pair_for(&mut self, fg: u8, bg: u8) -> Option<PairId> {
        if fg == 0 && bg == 0 {
            return None;
        }
        let fg = (fg & 0x0F) as usize;
        let bg = (bg & 0x0F) as usize;
        if let Some(id) = self.table[fg][bg] {
            return Some(id);
        }
        if self.next_id >= self.max_id {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.table[fg][bg] = Some(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_256_passthrough_for_low_range() {
        assert_eq!(reduce_basic(0), 1);
        assert_eq!(reduce_basic(3), 4);
        assert_eq!(reduce_basic(8), 1);
        assert_eq!(reduce_basic(11), 4);
    }

    #[test]
    fn grayscale_boundary_matches_source_ramp() {
        assert_eq!(reduce_256(244), 1);
        assert_eq!(reduce_256(245), 8);
    }

    #[test]
    fn color_degradation_matches_scenarios() {
        // SGR 38;5;196 -> red.
        let r = 255u8;
        let g = 0u8;
        let b = 0u8;
        assert_eq!(reduce_rgb(r, g, b), 2);
        // SGR 38;2;0;255;0 -> green.
        assert_eq!(reduce_rgb(0, 255, 0), 3);
    }

    #[test]
    fn pair_cache_is_idempotent() {
        let mut cache = PairCache::new(16, 256);
        let first = cache.pair_for(2, 0);
        let second = cache.pair_for(2, 0);
        assert_eq!(first, second);
        assert!(first.unwrap() >= 16);
    }

    #[test]
    fn pair_cache_degrades_when_exhausted() {
        let mut cache = PairCache::new(16, 17);
        assert!(cache.pair_for(1, 1).is_some());
        assert!(cache.pair_for(2, 2).is_none());
    }

    #[test]
    fn default_fg_bg_bypasses_allocation() {
        let mut cache = PairCache::new(16, 256);
        assert_eq!(cache.pair_for(0, 0), None);
    }
}
