use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Adapts a single still image to the [`VideoReader`] interface.
///
/// The image is decoded eagerly on `open` and served as a one-frame gray
/// video with `fps=0` and `total_frames=1`.
pub struct ImageFileReader {
    frame: Option<Frame>,
    opened: bool,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self {
            frame: None,
            opened: false,
        }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let luma = image::open(path)
            .map_err(|e| format!("cannot decode {}: {e}", path.display()))?
            .into_luma8();
        let (width, height) = luma.dimensions();
        let codec = image::ImageFormat::from_path(path)
            .map(|f| format!("{f:?}").to_lowercase())
            .unwrap_or_default();

        self.frame = Some(Frame::gray(luma.into_raw(), width, height, 0));
        self.opened = true;
        Ok(VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec,
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err("ImageFileReader: not opened".into())));
        }
        Box::new(self.frame.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.frame = None;
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_rgb_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("still.png");
        image::RgbImage::from_pixel(width, height, image::Rgb([50, 100, 200]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), 100, 80);
        let mut reader = ImageFileReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (100, 80));
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.codec, "png");
        assert!(meta.is_still_image());
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = ImageFileReader::new();
        assert!(reader.open(Path::new("/nonexistent/test.png")).is_err());
    }

    #[test]
    fn test_yields_one_gray_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), 100, 80);
        let mut reader = ImageFileReader::new();
        reader.open(&path).unwrap();

        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.index(), 0);
        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.data().len(), 100 * 80);
        // Luma of (50, 100, 200) is about 96.
        assert!((frame.data()[0] as i32 - 96).abs() <= 2);
    }

    #[test]
    fn test_pgm_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.pgm");
        image::GrayImage::from_pixel(32, 24, image::Luma([77]))
            .save(&path)
            .unwrap();
        let mut reader = ImageFileReader::new();
        reader.open(&path).unwrap();
        let frame = reader.frames().next().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert!(frame.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = ImageFileReader::new();
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb_image(dir.path(), 10, 10);
        let mut reader = ImageFileReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
        assert!(reader.frames().next().unwrap().is_err());
    }
}
