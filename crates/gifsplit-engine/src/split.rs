//! Deterministic segment splitting.
//!
//! Scenes longer than the duration cap are cut into equal-width pieces,
//! never a run of full-cap pieces plus a short remainder tail: a 12s scene
//! with a 5s cap becomes three 4s pieces, not {5, 5, 2}.

use gifsplit_models::TimeRange;

/// Tolerance for float noise when a duration is an exact multiple of the cap.
const EPSILON: f64 = 1e-9;

/// Split one scene into `ceil(D/C)` equal-width pieces, each at most `cap`.
///
/// Scenes already within the cap come back unchanged. The last piece ends
/// exactly at the scene's end, so no drift accumulates across boundaries.
pub fn split_scene(scene: TimeRange, cap: f64) -> Vec<TimeRange> {
    let duration = scene.duration();
    if duration <= 0.0 {
        return Vec::new();
    }
    if duration <= cap + EPSILON {
        return vec![scene];
    }

    let pieces = ((duration / cap) - EPSILON).ceil().max(1.0) as usize;
    let width = duration / pieces as f64;

    (0..pieces)
        .map(|i| {
            let start = scene.start + width * i as f64;
            let end = if i + 1 == pieces {
                scene.end
            } else {
                scene.start + width * (i + 1) as f64
            };
            TimeRange::new(start, end)
        })
        .collect()
}

/// Expand detected scenes into the ordered list of encode intervals.
pub fn plan_intervals(scenes: &[TimeRange], cap: f64) -> Vec<TimeRange> {
    scenes
        .iter()
        .flat_map(|scene| split_scene(*scene, cap))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths(ranges: &[TimeRange]) -> Vec<f64> {
        ranges.iter().map(|r| r.duration()).collect()
    }

    #[test]
    fn test_short_scene_unchanged() {
        let pieces = split_scene(TimeRange::new(2.0, 6.0), 5.0);
        assert_eq!(pieces.len(), 1);
        assert_eq!((pieces[0].start, pieces[0].end), (2.0, 6.0));
    }

    #[test]
    fn test_twelve_over_five_gives_three_fours() {
        let pieces = split_scene(TimeRange::new(0.0, 12.0), 5.0);
        assert_eq!(pieces.len(), 3);
        for w in widths(&pieces) {
            assert!((w - 4.0).abs() < 1e-9);
            assert!(w <= 5.0);
        }
        // never a remainder tail
        assert_eq!(pieces[2].end, 12.0);
    }

    #[test]
    fn test_exact_multiple_is_not_overcut() {
        let pieces = split_scene(TimeRange::new(0.0, 10.0), 5.0);
        assert_eq!(pieces.len(), 2);
        assert_eq!(widths(&pieces), vec![5.0, 5.0]);

        // 15s from a non-zero start, still exactly three
        let pieces = split_scene(TimeRange::new(7.0, 22.0), 5.0);
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn test_barely_over_cap_splits_in_two() {
        let pieces = split_scene(TimeRange::new(0.0, 5.2), 5.0);
        assert_eq!(pieces.len(), 2);
        for w in widths(&pieces) {
            assert!(w <= 5.0);
        }
    }

    #[test]
    fn test_pieces_tile_the_scene_exactly() {
        let scene = TimeRange::new(3.3, 31.1);
        let pieces = split_scene(scene, 4.0);
        assert_eq!(pieces[0].start, scene.start);
        assert_eq!(pieces.last().unwrap().end, scene.end);
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_split_is_reproducible() {
        let scene = TimeRange::new(0.0, 17.7);
        assert_eq!(split_scene(scene, 5.0), split_scene(scene, 5.0));
    }

    #[test]
    fn test_degenerate_scene_dropped() {
        assert!(split_scene(TimeRange::new(5.0, 5.0), 5.0).is_empty());
        assert!(split_scene(TimeRange::new(5.0, 4.0), 5.0).is_empty());
    }

    #[test]
    fn test_plan_preserves_scene_order() {
        let scenes = [TimeRange::new(0.0, 4.0), TimeRange::new(4.0, 16.0)];
        let intervals = plan_intervals(&scenes, 5.0);
        assert_eq!(intervals.len(), 4);
        assert_eq!(intervals[0].end, 4.0);
        assert_eq!(intervals[1].start, 4.0);
        let starts: Vec<f64> = intervals.iter().map(|r| r.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(starts, sorted);
    }
}
