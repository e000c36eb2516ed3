use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Frame source for the crop pipeline.
///
/// Readers hand out single-plane luma frames indexed from 0 in decode
/// order. `frames` before a successful `open` yields one error.
pub trait VideoReader: Send {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Lazily decodes the remaining frames.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases decoder state. Safe to call more than once.
    fn close(&mut self);
}
