//! Viewport intersection adapter for the TUI host.
//!
//! Translates the terminal scroll state (offset + height) and the rendered
//! line spans of blocks/sections into the ordered `(target, intersecting)`
//! batches the engine consumes. The trigger bands transpose the web-side
//! observer margins into row counts.
//!
//! Updates are produced in document order (ascending span start); the
//! scroll-spy's last-processed-wins tie-break therefore resolves to the
//! bottommost section of the band.

use crate::engine::IntersectionUpdate;

/// A half-open range of 0-based rendered line indices: `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    fn end(&self) -> usize {
        self.start + self.len
    }

    /// Number of this span's lines inside `[lo, hi)`.
    fn overlap(&self, lo: usize, hi: usize) -> usize {
        let top = self.start.max(lo);
        let bottom = self.end().min(hi);
        bottom.saturating_sub(top)
    }
}

// ---------------------------------------------------------------------------
// Reveal band
// ---------------------------------------------------------------------------

/// Trigger band for the one-shot reveal watch.
///
/// A block intersects when at least `threshold` of its lines overlap the
/// viewport with `bottom_inset` rows removed from the bottom edge — the row
/// analogue of the web observer's `-100px` bottom root margin.
#[derive(Debug, Clone, Copy)]
pub struct RevealBand {
    /// Rows removed from the viewport bottom before testing overlap.
    pub bottom_inset: usize,
    /// Fraction of a block's lines that must be inside the band (0.0–1.0).
    pub threshold: f32,
}

impl Default for RevealBand {
    fn default() -> Self {
        Self {
            bottom_inset: 3,
            threshold: 0.1,
        }
    }
}

/// Compute one reveal-watch batch for the current scroll position.
///
/// Every span gets an update; the observer's own state handles released
/// targets, so reporting all of them is harmless.
pub fn reveal_updates(
    spans: &[LineSpan],
    scroll_offset: usize,
    viewport_height: usize,
    band: RevealBand,
) -> Vec<IntersectionUpdate> {
    let lo = scroll_offset;
    let hi = (scroll_offset + viewport_height).saturating_sub(band.bottom_inset);

    spans
        .iter()
        .enumerate()
        .map(|(target, span)| {
            let needed = required_lines(span.len, band.threshold);
            IntersectionUpdate {
                target,
                intersecting: hi > lo && span.overlap(lo, hi) >= needed,
            }
        })
        .collect()
}

/// Minimum overlapping lines for a span of `len` lines at `threshold`.
///
/// Always at least 1 for a non-empty span so thin blocks (a single line)
/// still trigger; an empty span never intersects.
fn required_lines(len: usize, threshold: f32) -> usize {
    if len == 0 {
        return usize::MAX;
    }
    ((len as f32 * threshold).ceil() as usize).max(1)
}

// ---------------------------------------------------------------------------
// Scroll-spy band
// ---------------------------------------------------------------------------

/// Trigger band for the scroll-spy watch: a thin horizontal region near the
/// viewport top. Row analogue of `rootMargin: -100px 0px -70% 0px` with
/// threshold 0 — a section counts as current while any of its lines crosses
/// the band.
#[derive(Debug, Clone, Copy)]
pub struct SpyBand {
    /// Rows skipped below the viewport top before the band starts.
    pub top_offset: usize,
    /// Fraction of the viewport height the band extends down to (0.0–1.0).
    pub depth: f32,
}

impl Default for SpyBand {
    fn default() -> Self {
        Self {
            top_offset: 1,
            depth: 0.3,
        }
    }
}

/// Compute one spy-watch batch for the current scroll position, in document
/// order.
pub fn spy_updates(
    spans: &[LineSpan],
    scroll_offset: usize,
    viewport_height: usize,
    band: SpyBand,
) -> Vec<IntersectionUpdate> {
    let lo = scroll_offset + band.top_offset;
    let depth_rows = ((viewport_height as f32 * band.depth) as usize).max(band.top_offset + 1);
    let hi = scroll_offset + depth_rows;

    spans
        .iter()
        .enumerate()
        .map(|(target, span)| IntersectionUpdate {
            target,
            intersecting: span.overlap(lo, hi) > 0,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_overlap_counts_contained_lines() {
        let span = LineSpan::new(10, 5); // lines 10..15
        assert_eq!(span.overlap(0, 100), 5);
        assert_eq!(span.overlap(12, 14), 2);
        assert_eq!(span.overlap(15, 20), 0);
        assert_eq!(span.overlap(0, 10), 0);
    }

    #[test]
    fn reveal_block_in_view_intersects() {
        let spans = [LineSpan::new(0, 4), LineSpan::new(50, 4)];
        let batch = reveal_updates(&spans, 0, 20, RevealBand::default());
        assert!(batch[0].intersecting);
        assert!(!batch[1].intersecting);
    }

    #[test]
    fn reveal_bottom_inset_delays_trigger() {
        // Viewport rows 0..20, inset 3 → band 0..17. A block starting at row
        // 17 is on screen but not yet inside the band.
        let spans = [LineSpan::new(17, 2)];
        let band = RevealBand {
            bottom_inset: 3,
            threshold: 0.1,
        };
        let batch = reveal_updates(&spans, 0, 20, band);
        assert!(!batch[0].intersecting);

        // One row of scroll brings it in.
        let batch = reveal_updates(&spans, 1, 20, band);
        assert!(batch[0].intersecting);
    }

    #[test]
    fn reveal_threshold_requires_fraction_of_block() {
        // 20-line block, threshold 0.25 → needs 5 lines inside the band.
        let spans = [LineSpan::new(16, 20)];
        let band = RevealBand {
            bottom_inset: 0,
            threshold: 0.25,
        };
        // Band 0..20 → 4 lines visible: below threshold.
        assert!(!reveal_updates(&spans, 0, 20, band)[0].intersecting);
        // Band 1..21 → 5 lines visible: meets it.
        assert!(reveal_updates(&spans, 1, 20, band)[0].intersecting);
    }

    #[test]
    fn reveal_single_line_block_needs_one_line() {
        let spans = [LineSpan::new(5, 1)];
        let batch = reveal_updates(&spans, 0, 20, RevealBand::default());
        assert!(batch[0].intersecting);
    }

    #[test]
    fn reveal_empty_span_never_intersects() {
        let spans = [LineSpan::new(5, 0)];
        let batch = reveal_updates(&spans, 0, 20, RevealBand::default());
        assert!(!batch[0].intersecting);
    }

    #[test]
    fn reveal_degenerate_viewport_yields_no_intersections() {
        let spans = [LineSpan::new(0, 2)];
        let band = RevealBand {
            bottom_inset: 5,
            threshold: 0.1,
        };
        // Height 4 with inset 5 → empty band.
        let batch = reveal_updates(&spans, 0, 4, band);
        assert!(!batch[0].intersecting);
    }

    #[test]
    fn spy_band_selects_section_near_top() {
        // Viewport rows 10..40, default band rows 11..19.
        let spans = [
            LineSpan::new(0, 12),  // ends at 12: crosses the band top
            LineSpan::new(12, 20), // 12..32: inside the band
            LineSpan::new(32, 20), // below the band
        ];
        let batch = spy_updates(&spans, 10, 30, SpyBand::default());
        assert!(batch[0].intersecting);
        assert!(batch[1].intersecting);
        assert!(!batch[2].intersecting);
    }

    #[test]
    fn spy_updates_are_in_document_order() {
        let spans = [LineSpan::new(0, 5), LineSpan::new(5, 5), LineSpan::new(10, 5)];
        let batch = spy_updates(&spans, 0, 30, SpyBand::default());
        let targets: Vec<usize> = batch.iter().map(|u| u.target).collect();
        assert_eq!(targets, vec![0, 1, 2]);
    }

    #[test]
    fn spy_band_has_nonzero_height_even_in_tiny_viewports() {
        // depth * height rounds to 0 in a 2-row viewport; the band still
        // covers at least one row past the top offset.
        let spans = [LineSpan::new(1, 1)];
        let batch = spy_updates(&spans, 0, 2, SpyBand::default());
        assert!(batch[0].intersecting);
    }

    #[test]
    fn spy_section_scrolled_past_leaves_band() {
        let spans = [LineSpan::new(0, 5), LineSpan::new(5, 50)];
        // Scrolled deep: section 0 is far above the band.
        let batch = spy_updates(&spans, 20, 30, SpyBand::default());
        assert!(!batch[0].intersecting);
        assert!(batch[1].intersecting);
    }
}
