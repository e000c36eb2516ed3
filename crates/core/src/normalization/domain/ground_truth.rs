use serde::Serialize;

use crate::shared::region::Region;

/// Points in bounding-box ground truth.
pub const BOUNDING_BOX_POINTS: usize = 5;

/// Where the reference points came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthKind {
    /// Corners and centre of a detected pattern.
    BoundingBox,
    /// Annotated facial landmarks, in annotation order.
    Landmarks,
}

/// Ordered reference points (frame coordinates) that drive normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundTruth {
    kind: GroundTruthKind,
    points: Vec<(f64, f64)>,
}

impl GroundTruth {
    /// Bounding-box ground truth:
    /// `[top-left, top-right, bottom-left, bottom-right, centre]`.
    pub fn from_region(region: &Region) -> Self {
        let x1 = region.x as f64;
        let y1 = region.y as f64;
        let x2 = x1 + region.width as f64;
        let y2 = y1 + region.height as f64;
        Self {
            kind: GroundTruthKind::BoundingBox,
            points: vec![(x1, y1), (x2, y1), (x1, y2), (x2, y2), region.center()],
        }
    }

    pub fn landmarks(points: Vec<(f64, f64)>) -> Self {
        Self {
            kind: GroundTruthKind::Landmarks,
            points,
        }
    }

    pub fn kind(&self) -> GroundTruthKind {
        self.kind
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
