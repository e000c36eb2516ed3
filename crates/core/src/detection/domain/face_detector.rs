use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face finding.
///
/// Returns the patterns found in one frame. An empty vector is a normal
/// outcome (no face in view), not an error. Implementations may keep
/// scratch state between frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
