//! Navigation window expansion and prefetch ordering.

use crate::key::SegmentKey;

/// A viewer's position in segment space.
///
/// Windows are expressed in the segment length the viewer is currently
/// looking at; planning translates the covered region into every other
/// configured length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationWindow {
    /// Source signal under review.
    pub source_id: u32,
    /// Segment length of the current view.
    pub segment_length: u32,
    /// Segment index at the center of the view.
    pub center_index: u32,
    /// Segments to cover on each side of the center.
    pub radius: u32,
    /// Overlap applied to the plots, in basis points.
    pub overlap_bp: u16,
}

impl NavigationWindow {
    pub fn new(
        source_id: u32,
        segment_length: u32,
        center_index: u32,
        radius: u32,
        overlap_bp: u16,
    ) -> Self {
        Self {
            source_id,
            segment_length,
            center_index,
            radius,
            overlap_bp,
        }
    }

    /// Sample at the midpoint of the centered segment.
    fn center_sample(&self) -> u64 {
        let center = SegmentKey::new(
            self.source_id,
            self.segment_length,
            self.center_index,
            self.overlap_bp,
        );
        center.sample_start() + u64::from(self.segment_length) / 2
    }
}

/// Expand a window into render candidates for every configured segment
/// length, hottest first.
///
/// The covered region carries across lengths through the center segment's
/// midpoint sample, so navigating at one zoom level pre-renders the same
/// part of the signal at the others. Candidates are ordered by distance
/// from the per-length center, smaller lengths first on ties, index order
/// as the final tie-break. A window near the start of a source clamps
/// at index zero rather than wrapping.
pub fn plan_window(window: &NavigationWindow, segment_lengths: &[u32]) -> Vec<SegmentKey> {
    let center_sample = window.center_sample();
    let mut candidates: Vec<(u32, SegmentKey)> = Vec::new();

    for &length in segment_lengths {
        if length == 0 {
            continue;
        }
        let center = if length == window.segment_length {
            window.center_index
        } else {
            let stride = SegmentKey::new(window.source_id, length, 0, window.overlap_bp).stride();
            (center_sample / stride).min(u64::from(u32::MAX)) as u32
        };
        let lo = center.saturating_sub(window.radius);
        let hi = center.saturating_add(window.radius);
        for index in lo..=hi {
            let key = SegmentKey::new(window.source_id, length, index, window.overlap_bp);
            candidates.push((index.abs_diff(center), key));
        }
    }

    candidates.sort_by_key(|(distance, key)| (*distance, key.segment_length, key.segment_index));
    candidates.into_iter().map(|(_, key)| key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_length_window_covers_center_plus_minus_radius() {
        let window = NavigationWindow::new(1, 8192, 100, 5, 0);
        let keys = plan_window(&window, &[8192]);

        assert_eq!(keys.len(), 11);
        let mut indices: Vec<u32> = keys.iter().map(|k| k.segment_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (95..=105).collect::<Vec<u32>>());
        assert!(keys.iter().all(|k| k.segment_length == 8192));
    }

    #[test]
    fn test_center_segment_comes_first() {
        let window = NavigationWindow::new(1, 8192, 100, 5, 0);
        let keys = plan_window(&window, &[8192]);

        assert_eq!(keys[0].segment_index, 100);
        // Nondecreasing distance from the center
        let distances: Vec<u32> = keys.iter().map(|k| k.segment_index.abs_diff(100)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_multi_length_expansion_covers_the_same_region() {
        // Center segment 10 at length 65536 has its midpoint at sample
        // 688128, which falls in segment 84 at 8192 and segment 1 at 524288.
        let window = NavigationWindow::new(1, 65536, 10, 2, 0);
        let keys = plan_window(&window, &[524288, 65536, 8192]);

        let of_length = |length: u32| -> Vec<u32> {
            let mut v: Vec<u32> = keys
                .iter()
                .filter(|k| k.segment_length == length)
                .map(|k| k.segment_index)
                .collect();
            v.sort_unstable();
            v
        };
        assert_eq!(of_length(8192), (82..=86).collect::<Vec<u32>>());
        assert_eq!(of_length(65536), (8..=12).collect::<Vec<u32>>());
        // Clamped at zero on the low side
        assert_eq!(of_length(524288), (0..=3).collect::<Vec<u32>>());
    }

    #[test]
    fn test_ties_prefer_smaller_lengths() {
        let window = NavigationWindow::new(1, 65536, 10, 2, 0);
        let keys = plan_window(&window, &[524288, 65536, 8192]);

        // The three per-length centers lead, smallest length first
        assert_eq!((keys[0].segment_length, keys[0].segment_index), (8192, 84));
        assert_eq!((keys[1].segment_length, keys[1].segment_index), (65536, 10));
        assert_eq!((keys[2].segment_length, keys[2].segment_index), (524288, 1));
    }

    #[test]
    fn test_window_near_start_clamps_at_zero() {
        let window = NavigationWindow::new(4, 8192, 1, 5, 0);
        let keys = plan_window(&window, &[8192]);

        let mut indices: Vec<u32> = keys.iter().map(|k| k.segment_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..=6).collect::<Vec<u32>>());
    }

    #[test]
    fn test_overlap_keeps_own_length_center() {
        let window = NavigationWindow::new(2, 8192, 40, 1, 5000);
        let keys = plan_window(&window, &[8192]);

        assert_eq!(keys[0].segment_index, 40);
        assert!(keys.iter().all(|k| k.overlap_bp == 5000));
    }

    proptest! {
        /// Property: planning is a pure function of its inputs.
        #[test]
        fn prop_plan_is_deterministic(
            source_id in 0u32..1000,
            center in 0u32..50_000,
            radius in 0u32..64,
        ) {
            let window = NavigationWindow::new(source_id, 8192, center, radius, 0);
            let lengths = [524288u32, 65536, 8192];
            prop_assert_eq!(plan_window(&window, &lengths), plan_window(&window, &lengths));
        }

        /// Property: the window's own length covers exactly the clamped
        /// center-radius range, ordered by distance with the lower index
        /// first on equidistant pairs.
        #[test]
        fn prop_own_length_range_and_order(
            center in 0u32..10_000,
            radius in 0u32..64,
        ) {
            let window = NavigationWindow::new(1, 8192, center, radius, 0);
            let keys = plan_window(&window, &[8192]);

            let lo = center.saturating_sub(radius);
            let hi = center + radius;
            prop_assert_eq!(keys.len() as u32, hi - lo + 1);
            prop_assert_eq!(keys[0].segment_index, center);

            let ranks: Vec<(u32, u32)> = keys
                .iter()
                .map(|k| (k.segment_index.abs_diff(center), k.segment_index))
                .collect();
            prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        }

        /// Property: every candidate carries the window's source and overlap,
        /// and no key is planned twice.
        #[test]
        fn prop_candidates_are_unique_and_tagged(
            source_id in 0u32..100,
            center in 0u32..5_000,
            radius in 0u32..32,
            overlap_bp in 0u16..5000,
        ) {
            let window = NavigationWindow::new(source_id, 65536, center, radius, overlap_bp);
            let keys = plan_window(&window, &[524288, 65536, 8192]);

            let mut seen = std::collections::HashSet::new();
            for key in &keys {
                prop_assert_eq!(key.source_id, source_id);
                prop_assert_eq!(key.overlap_bp, overlap_bp);
                prop_assert!(seen.insert(*key));
            }
        }
    }
}
