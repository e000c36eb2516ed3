use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::pattern_selector::PatternSelector;
use crate::params::face_finder_params::{FaceFinderParams, Roi};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Multiscale sliding-window face finder backed by the SeetaFace cascade.
///
/// Each frame is converted to a single gray plane, cropped to the
/// configured ROI and scanned over an image pyramid. Raw hits are mapped
/// back to frame coordinates and reduced by the [`PatternSelector`].
pub struct MultiscaleFaceFinder {
    model: rustface::Model,
    min_face_size: u32,
    max_face_size: u32,
    scale_factor: f32,
    step: (u32, u32),
    score_threshold: f64,
    roi: Roi,
    selector: PatternSelector,
}

impl MultiscaleFaceFinder {
    pub fn new(model_path: &Path, params: &FaceFinderParams) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(model_path)
            .map_err(|e| format!("cannot open face model {}: {e}", model_path.display()))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| format!("invalid face model {}: {e}", model_path.display()))?;
        Ok(Self::with_model(model, params))
    }

    pub fn with_model(model: rustface::Model, params: &FaceFinderParams) -> Self {
        Self {
            model,
            min_face_size: params.min_face_size,
            max_face_size: params.max_face_size,
            scale_factor: params.scale_factor,
            step: (params.step_x, params.step_y),
            score_threshold: params.score_threshold,
            roi: params.roi,
            selector: PatternSelector::new(
                params.selector,
                params.overlap_threshold,
                params.max_patterns,
            ),
        }
    }

    fn scan(&self, plane: &[u8], width: u32, height: u32) -> Vec<Region> {
        if width < self.min_face_size || height < self.min_face_size {
            return Vec::new();
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        if self.max_face_size > 0 {
            detector.set_max_face_size(self.max_face_size);
        }
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(self.scale_factor);
        detector.set_slide_window_step(self.step.0, self.step.1);

        detector
            .detect(&rustface::ImageData::new(plane, width, height))
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Region::new(
                    bbox.x(),
                    bbox.y(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                    face.score(),
                )
            })
            .collect()
    }
}

impl FaceDetector for MultiscaleFaceFinder {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let gray: Cow<'_, Frame> = if frame.is_gray() {
            Cow::Borrowed(frame)
        } else {
            Cow::Owned(frame.to_gray())
        };
        let (fw, fh) = (gray.width(), gray.height());

        let roi = self
            .roi
            .to_region(fw, fh)
            .clamp_to(fw, fh)
            .ok_or_else(|| format!("scan region lies outside the {fw}x{fh} frame"))?;

        let candidates = if self.roi.is_full() {
            self.scan(gray.data(), fw, fh)
        } else {
            let plane = crop_plane(gray.data(), fw, &roi);
            self.scan(&plane, roi.width as u32, roi.height as u32)
                .into_iter()
                .map(|r| translate(r, roi.x, roi.y))
                .collect()
        };

        let selector = if self.roi.is_full() {
            self.selector.clone()
        } else {
            self.selector.clone().with_roi(roi)
        };
        let patterns = selector.select(&candidates, fw, fh);
        log::debug!(
            "Frame {}: {} candidates, {} patterns kept",
            frame.index(),
            candidates.len(),
            patterns.len()
        );
        Ok(patterns)
    }
}

/// Copies the `roi` rectangle out of a single-plane image of row length `width`.
fn crop_plane(plane: &[u8], width: u32, roi: &Region) -> Vec<u8> {
    let stride = width as usize;
    let (x, w) = (roi.x as usize, roi.width as usize);
    let mut out = Vec::with_capacity(w * roi.height as usize);
    for row in roi.y as usize..(roi.y + roi.height) as usize {
        let start = row * stride + x;
        out.extend_from_slice(&plane[start..start + w]);
    }
    out
}

fn translate(region: Region, dx: i32, dy: i32) -> Region {
    Region {
        x: region.x + dx,
        y: region.y + dy,
        ..region
    }
}
