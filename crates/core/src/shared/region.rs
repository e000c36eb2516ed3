use serde::{Deserialize, Serialize};

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// A detected pattern: an axis-aligned face candidate in frame coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector confidence. Scale depends on the backend.
    pub score: f64,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Clips the region to `[0, width) × [0, height)`.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(width as i32);
        let y2 = (self.y + self.height).min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        })
    }

    /// Greedy deduplication: keeps a region only if its IoU with every
    /// previously-kept region is at or below the threshold.
    pub fn deduplicate(regions: &[Region], iou_threshold: f64) -> Vec<Region> {
        if regions.len() <= 1 {
            return regions.to_vec();
        }
        let mut kept: Vec<Region> = Vec::with_capacity(regions.len());
        for r in regions {
            let dominated = kept.iter().any(|k| r.iou(k) > iou_threshold);
            if !dominated {
                kept.push(r.clone());
            }
        }
        kept
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        inter / (area_a + area_b - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn region(x: i32, y: i32, w: i32, h: i32) -> Region {
        Region::new(x, y, w, h, 1.0)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_regions() {
        let a = region(10, 10, 100, 100);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = region(0, 0, 50, 50);
        let b = region(100, 100, 50, 50);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100, union 10000 + 10000 - 5000
        let a = region(0, 0, 100, 100);
        let b = region(50, 0, 100, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_touching_edges() {
        let a = region(0, 0, 50, 50);
        let b = region(50, 0, 50, 50);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[rstest]
    #[case::zero_width(region(0, 0, 0, 100), region(0, 0, 50, 50), 0.0)]
    #[case::zero_height(region(0, 0, 100, 0), region(0, 0, 50, 50), 0.0)]
    fn test_iou_degenerate(#[case] a: Region, #[case] b: Region, #[case] expected: f64) {
        assert_relative_eq!(a.iou(&b), expected);
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_center() {
        let r = region(10, 20, 40, 60);
        assert_eq!(r.center(), (30.0, 50.0));
    }

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let r = region(10, 10, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_crosses_left_and_bottom() {
        let r = region(-10, 90, 30, 30);
        let clamped = r.clamp_to(100, 100).unwrap();
        assert_eq!((clamped.x, clamped.y), (0, 90));
        assert_eq!((clamped.width, clamped.height), (20, 10));
    }

    #[test]
    fn test_clamp_outside_is_none() {
        assert!(region(200, 200, 10, 10).clamp_to(100, 100).is_none());
        assert!(region(-20, 0, 20, 10).clamp_to(100, 100).is_none());
    }

    // ── Deduplication ────────────────────────────────────────────────

    #[test]
    fn test_deduplicate_empty() {
        assert!(Region::deduplicate(&[], DEFAULT_IOU_THRESHOLD).is_empty());
    }

    #[test]
    fn test_deduplicate_removes_overlapping() {
        let regions = vec![region(0, 0, 100, 100), region(10, 10, 100, 100)];
        let result = Region::deduplicate(&regions, DEFAULT_IOU_THRESHOLD);
        assert_eq!(result, vec![regions[0].clone()]);
    }

    #[test]
    fn test_deduplicate_keeps_non_overlapping() {
        let regions = vec![region(0, 0, 50, 50), region(200, 200, 50, 50)];
        let result = Region::deduplicate(&regions, DEFAULT_IOU_THRESHOLD);
        assert_eq!(result.len(), 2);
    }
}
