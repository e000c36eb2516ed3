use std::path::Path;

use crate::shared::frame::Frame;

/// Persists one normalized crop.
pub trait ImageWriter: Send {
    /// Encodes `frame` at `path`, creating parent directories. `size`
    /// rescales the image before encoding.
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
