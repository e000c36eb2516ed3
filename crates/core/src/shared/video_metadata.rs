use std::path::PathBuf;

/// Stream properties reported by a [`crate::video::domain::video_reader::VideoReader`].
///
/// Single images are described as a one-frame stream with `fps = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn is_still_image(&self) -> bool {
        self.fps == 0.0 && self.total_frames == 1
    }

    /// Number of frames a run will visit, given an optional cap.
    ///
    /// Containers that do not report a frame count yield the cap itself
    /// (or 0 when uncapped).
    pub fn frames_to_visit(&self, max_frames: Option<usize>) -> usize {
        match (self.total_frames, max_frames) {
            (0, Some(cap)) => cap,
            (total, Some(cap)) => total.min(cap),
            (total, None) => total,
        }
    }
}
