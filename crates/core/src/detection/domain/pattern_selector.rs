use std::str::FromStr;

use crate::shared::region::{Region, DEFAULT_IOU_THRESHOLD};

/// How raw scanner candidates are reduced to the final pattern list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorKind {
    /// Accumulate every candidate as-is.
    Keep,
    /// Greedy non-maximum suppression by score.
    Suppress,
    /// Fuse overlapping candidates into one score-weighted box.
    Merge,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Keep => "keep",
            SelectorKind::Suppress => "suppress",
            SelectorKind::Merge => "merge",
        }
    }
}

impl FromStr for SelectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(SelectorKind::Keep),
            "suppress" => Ok(SelectorKind::Suppress),
            "merge" => Ok(SelectorKind::Merge),
            other => Err(format!(
                "expected 'keep', 'suppress' or 'merge', got '{other}'"
            )),
        }
    }
}

/// Post-scan selection stage of the face finder.
///
/// Output is always clamped to the frame, restricted to the ROI (when one
/// is set), sorted by descending score and truncated to `max_patterns`.
#[derive(Clone, Debug)]
pub struct PatternSelector {
    kind: SelectorKind,
    overlap_threshold: f64,
    max_patterns: usize,
    roi: Option<Region>,
}

impl PatternSelector {
    pub fn new(kind: SelectorKind, overlap_threshold: f64, max_patterns: usize) -> Self {
        Self {
            kind,
            overlap_threshold,
            max_patterns,
            roi: None,
        }
    }

    /// Restricts patterns to those touching `roi` (frame pixels).
    pub fn with_roi(mut self, roi: Region) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn select(&self, candidates: &[Region], frame_w: u32, frame_h: u32) -> Vec<Region> {
        let in_view: Vec<Region> = candidates
            .iter()
            .filter(|r| self.roi.as_ref().map_or(true, |roi| overlaps(r, roi)))
            .filter_map(|r| r.clamp_to(frame_w, frame_h))
            .collect();

        let mut selected = match self.kind {
            SelectorKind::Keep => in_view,
            SelectorKind::Suppress => suppress(in_view, self.overlap_threshold),
            SelectorKind::Merge => merge(&in_view, self.overlap_threshold),
        };

        sort_by_score(&mut selected);
        if self.max_patterns > 0 {
            selected.truncate(self.max_patterns);
        }
        selected
    }
}

impl Default for PatternSelector {
    fn default() -> Self {
        Self::new(SelectorKind::Merge, DEFAULT_IOU_THRESHOLD, 0)
    }
}

fn overlaps(a: &Region, b: &Region) -> bool {
    a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
}

fn sort_by_score(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn suppress(mut candidates: Vec<Region>, threshold: f64) -> Vec<Region> {
    sort_by_score(&mut candidates);
    Region::deduplicate(&candidates, threshold)
}

/// Transitively clusters candidates whose IoU exceeds `threshold` and
/// replaces each cluster by its score-weighted mean box.
///
/// A fused box drifts towards its cluster centroid and may then overlap a
/// neighbour it was never clustered with, so clustering repeats until a
/// pass fuses nothing.
fn merge(candidates: &[Region], threshold: f64) -> Vec<Region> {
    let mut current = merge_pass(candidates, threshold);
    loop {
        let next = merge_pass(&current, threshold);
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

fn merge_pass(candidates: &[Region], threshold: f64) -> Vec<Region> {
    let n = candidates.len();
    let mut cluster_of: Vec<Option<usize>> = vec![None; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for seed in 0..n {
        if cluster_of[seed].is_some() {
            continue;
        }
        let id = clusters.len();
        cluster_of[seed] = Some(id);
        let mut members = vec![seed];
        let mut cursor = 0;
        while cursor < members.len() {
            let current = members[cursor];
            for other in 0..n {
                if cluster_of[other].is_none()
                    && candidates[current].iou(&candidates[other]) > threshold
                {
                    cluster_of[other] = Some(id);
                    members.push(other);
                }
            }
            cursor += 1;
        }
        clusters.push(members);
    }

    clusters
        .iter()
        .map(|members| fuse(members.iter().map(|&i| &candidates[i])))
        .collect()
}

fn fuse<'a>(members: impl Iterator<Item = &'a Region> + Clone) -> Region {
    let positive_total: f64 = members.clone().map(|r| r.score.max(0.0)).sum();
    let count = members.clone().count() as f64;
    let weight = |r: &Region| {
        if positive_total > 0.0 {
            r.score.max(0.0) / positive_total
        } else {
            1.0 / count
        }
    };

    let (mut x1, mut y1, mut x2, mut y2) = (0.0, 0.0, 0.0, 0.0);
    let mut best = f64::NEG_INFINITY;
    for r in members {
        let w = weight(r);
        x1 += r.x as f64 * w;
        y1 += r.y as f64 * w;
        x2 += (r.x + r.width) as f64 * w;
        y2 += (r.y + r.height) as f64 * w;
        best = best.max(r.score);
    }

    let x = x1.round() as i32;
    let y = y1.round() as i32;
    Region::new(x, y, x2.round() as i32 - x, y2.round() as i32 - y, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scored(x: i32, y: i32, w: i32, h: i32, score: f64) -> Region {
        Region::new(x, y, w, h, score)
    }

    fn overlapping_pair() -> Vec<Region> {
        vec![scored(10, 10, 40, 40, 1.0), scored(14, 14, 40, 40, 3.0)]
    }

    #[rstest]
    #[case::keep("keep", SelectorKind::Keep)]
    #[case::suppress("suppress", SelectorKind::Suppress)]
    #[case::merge("merge", SelectorKind::Merge)]
    fn test_kind_parses_and_prints(#[case] text: &str, #[case] kind: SelectorKind) {
        assert_eq!(text.parse::<SelectorKind>().unwrap(), kind);
        assert_eq!(kind.as_str(), text);
    }

    #[test]
    fn test_kind_rejects_unknown() {
        assert!("overlap".parse::<SelectorKind>().is_err());
    }

    #[test]
    fn test_keep_accumulates_everything_sorted() {
        let selector = PatternSelector::new(SelectorKind::Keep, 0.3, 0);
        let out = selector.select(&overlapping_pair(), 100, 100);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, 3.0);
    }

    #[test]
    fn test_suppress_keeps_highest_score() {
        let selector = PatternSelector::new(SelectorKind::Suppress, 0.3, 0);
        let out = selector.select(&overlapping_pair(), 100, 100);
        assert_eq!(out, vec![scored(14, 14, 40, 40, 3.0)]);
    }

    #[test]
    fn test_merge_weights_by_score() {
        let selector = PatternSelector::new(SelectorKind::Merge, 0.3, 0);
        let out = selector.select(&overlapping_pair(), 100, 100);
        // x1 = 10*0.25 + 14*0.75 = 13, x2 = 50*0.25 + 54*0.75 = 53
        assert_eq!(out, vec![scored(13, 13, 40, 40, 3.0)]);
    }

    #[test]
    fn test_merge_uniform_when_scores_not_positive() {
        let candidates = vec![scored(0, 0, 20, 20, -1.0), scored(2, 2, 20, 20, 0.0)];
        let out = PatternSelector::new(SelectorKind::Merge, 0.3, 0).select(&candidates, 100, 100);
        assert_eq!(out, vec![scored(1, 1, 20, 20, 0.0)]);
    }

    #[test]
    fn test_merge_is_transitive() {
        // a overlaps b, b overlaps c, a and c are disjoint
        let candidates = vec![
            scored(0, 0, 20, 20, 1.0),
            scored(8, 0, 20, 20, 1.0),
            scored(16, 0, 20, 20, 1.0),
        ];
        let out = PatternSelector::new(SelectorKind::Merge, 0.2, 0).select(&candidates, 100, 100);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], scored(8, 0, 20, 20, 1.0));
    }

    fn two_pairs() -> Vec<Region> {
        vec![
            scored(0, 0, 30, 30, 2.0),
            scored(5, 5, 30, 30, 1.0),
            scored(60, 60, 30, 30, 0.5),
            scored(62, 58, 30, 30, 0.7),
        ]
    }

    /// The first two fuse into (5, 0), which then overlaps the third by 0.38.
    fn drifting_cluster() -> Vec<Region> {
        vec![
            scored(0, 0, 20, 20, 1.0),
            scored(10, 0, 20, 20, 1.0),
            scored(5, 9, 20, 20, 1.0),
        ]
    }

    #[rstest]
    fn test_no_overlap_survives_selection(
        #[values(SelectorKind::Suppress, SelectorKind::Merge)] kind: SelectorKind,
        #[values(two_pairs(), drifting_cluster())] candidates: Vec<Region>,
    ) {
        let out = PatternSelector::new(kind, 0.3, 0).select(&candidates, 100, 100);
        assert!(!out.is_empty());
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                assert!(a.iou(b) <= 0.3, "{kind:?} kept {a:?} and {b:?}");
            }
        }
    }

    #[test]
    fn test_merge_repeats_until_stable() {
        let out =
            PatternSelector::new(SelectorKind::Merge, 0.3, 0).select(&drifting_cluster(), 100, 100);
        assert_eq!(out, vec![scored(5, 5, 20, 20, 1.0)]);
    }

    #[test]
    fn test_max_patterns_truncates_by_score() {
        let candidates = vec![
            scored(0, 0, 10, 10, 0.1),
            scored(50, 50, 10, 10, 0.9),
            scored(80, 0, 10, 10, 0.5),
        ];
        let out = PatternSelector::new(SelectorKind::Keep, 0.3, 1).select(&candidates, 100, 100);
        assert_eq!(out, vec![scored(50, 50, 10, 10, 0.9)]);
    }

    #[test]
    fn test_roi_drops_outside_and_frame_clamps() {
        let candidates = vec![scored(-5, 10, 20, 20, 1.0), scored(70, 70, 20, 20, 1.0)];
        let selector = PatternSelector::new(SelectorKind::Keep, 0.3, 0)
            .with_roi(Region::new(0, 0, 50, 100, 0.0));
        let out = selector.select(&candidates, 100, 100);
        assert_eq!(out, vec![scored(0, 10, 15, 20, 1.0)]);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(PatternSelector::default().select(&[], 10, 10).is_empty());
    }
}
