//! Scroll virtualization: which slice of the flattened rows must exist.
//!
//! All rows share one fixed height, so the visible range and every row's
//! absolute offset fall out of integer arithmetic on the four inputs. The
//! result is always recomputed fresh; there is no incremental state to drift.

/// Fixed-geometry viewport description.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    /// Uniform row height, in the same units as the scroll offset.
    pub item_height: u64,
    pub viewport_height: u64,
    /// Extra rows materialized past each visible edge.
    pub overscan: u64,
}

impl Viewport {
    pub fn new(item_height: u64, viewport_height: u64, overscan: u64) -> Self {
        Self {
            item_height,
            viewport_height,
            overscan,
        }
    }
}

/// The materialized index range plus the geometry the host needs to size and
/// place things: total scrollable extent and per-row absolute offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    /// First materialized row index (inclusive).
    pub start: u64,
    /// Last materialized row index (inclusive).
    pub end: u64,
    pub item_height: u64,
    /// Height of the full row sequence, for sizing the scroll container.
    pub total_extent: u64,
}

impl RowWindow {
    /// Absolute vertical offset of a row.
    pub fn offset_of(&self, index: u64) -> u64 {
        index * self.item_height
    }

    pub fn indices(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }

    pub fn row_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Compute the window for the current scroll position. Returns `None` when
/// there are no rows at all (`total_rows == 0`) or the geometry is degenerate
/// (`item_height == 0`).
pub fn window(viewport: Viewport, total_rows: u64, scroll_offset: u64) -> Option<RowWindow> {
    if total_rows == 0 || viewport.item_height == 0 {
        return None;
    }

    let first_visible = scroll_offset / viewport.item_height;
    let last_visible = (scroll_offset + viewport.viewport_height).div_ceil(viewport.item_height);

    let start = first_visible.saturating_sub(viewport.overscan);
    let end = (last_visible + viewport.overscan).min(total_rows - 1);

    Some(RowWindow {
        start: start.min(end),
        end,
        item_height: viewport.item_height,
        total_extent: total_rows * viewport.item_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example() {
        // 1000 rows of height 20, a 200-high viewport scrolled to 400,
        // overscan 2: rows 18..=32 must be materialized.
        let w = window(Viewport::new(20, 200, 2), 1000, 400).unwrap();
        assert_eq!(w.start, 18);
        assert_eq!(w.end, 32);
        assert_eq!(w.total_extent, 20_000);
        assert_eq!(w.offset_of(w.start), 360);
    }

    #[test]
    fn clamps_at_the_top() {
        let w = window(Viewport::new(20, 200, 3), 1000, 0).unwrap();
        assert_eq!(w.start, 0);
        assert_eq!(w.end, 13);
    }

    #[test]
    fn clamps_at_the_bottom() {
        let w = window(Viewport::new(20, 200, 3), 15, 1_000_000).unwrap();
        assert_eq!(w.end, 14);
        assert!(w.start <= w.end);
    }

    #[test]
    fn empty_sequence_has_no_window() {
        assert_eq!(window(Viewport::new(20, 200, 2), 0, 0), None);
    }

    #[test]
    fn single_row() {
        let w = window(Viewport::new(20, 200, 2), 1, 0).unwrap();
        assert_eq!(w.start, 0);
        assert_eq!(w.end, 0);
        assert_eq!(w.row_count(), 1);
        assert_eq!(w.total_extent, 20);
    }

    #[test]
    fn fractional_scroll_positions_round_outward() {
        // Offset 410 straddles row 20; the last visible edge at 610 rounds
        // up to row 31.
        let w = window(Viewport::new(20, 200, 0), 1000, 410).unwrap();
        assert_eq!(w.start, 20);
        assert_eq!(w.end, 31);
    }
}
