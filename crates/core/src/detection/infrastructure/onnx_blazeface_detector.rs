/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Single-shot alternative to the multiscale scanner. Gray frames are
/// replicated across the three input channels.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::pattern_selector::{PatternSelector, SelectorKind};
use crate::params::face_finder_params::{FaceFinderParams, Roi};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// IoU above which raw anchor hits are the same face.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
    filter: PatternFilter,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model. `score_threshold` is read as a
    /// probability in `[0, 1]`.
    pub fn new(
        model_path: &Path,
        params: &FaceFinderParams,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(platform_execution_providers())?
            .commit_from_file(model_path)?;
        Ok(Self {
            session,
            confidence: params.score_threshold,
            anchors: generate_anchors(),
            filter: PatternFilter::new(params),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let fw = frame.width();
        let fh = frame.height();
        if fw == 0 || fh == 0 {
            return Ok(Vec::new());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let candidates = decode(&self.anchors, reg_data, score_data, self.confidence, fw, fh);
        let patterns = self.filter.apply(&candidates, fw, fh);
        log::debug!(
            "Frame {}: {} anchor hits, {} patterns kept",
            frame.index(),
            candidates.len(),
            patterns.len()
        );
        Ok(patterns)
    }
}

/// Everything after decoding: NMS over raw anchor hits, the face-size
/// bounds, then the configured selector limited to the scan region.
#[derive(Clone, Debug)]
struct PatternFilter {
    min_face_size: u32,
    max_face_size: u32,
    roi: Roi,
    nms: PatternSelector,
    selector: PatternSelector,
}

impl PatternFilter {
    fn new(params: &FaceFinderParams) -> Self {
        Self {
            min_face_size: params.min_face_size,
            max_face_size: params.max_face_size,
            roi: params.roi,
            nms: PatternSelector::new(SelectorKind::Suppress, NMS_IOU_THRESH, 0),
            selector: PatternSelector::new(
                params.selector,
                params.overlap_threshold,
                params.max_patterns,
            ),
        }
    }

    fn fits_size_range(&self, region: &Region) -> bool {
        let side = region.width.max(region.height) as u32;
        side >= self.min_face_size && (self.max_face_size == 0 || side <= self.max_face_size)
    }

    fn apply(&self, candidates: &[Region], fw: u32, fh: u32) -> Vec<Region> {
        let sized: Vec<Region> = self
            .nms
            .select(candidates, fw, fh)
            .into_iter()
            .filter(|r| self.fits_size_range(r))
            .collect();
        if self.roi.is_full() {
            self.selector.select(&sized, fw, fh)
        } else {
            self.selector
                .clone()
                .with_roi(self.roi.to_region(fw, fh))
                .select(&sized, fw, fh)
        }
    }
}

/// Turns anchor-relative regressions into frame-space regions scoring at
/// least `confidence`.
fn decode(
    anchors: &[[f32; 2]],
    reg_data: &[f32],
    score_data: &[f32],
    confidence: f64,
    fw: u32,
    fh: u32,
) -> Vec<Region> {
    let mut regions = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score) as f64;
        if score < confidence {
            continue;
        }
        let reg_offset = i * 16;
        if reg_offset + 4 > reg_data.len() {
            break;
        }

        let anchor = &anchors[i];
        let cx = anchor[0] + reg_data[reg_offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[reg_offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[reg_offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[reg_offset + 3] / INPUT_SIZE as f32;

        let x1 = ((cx - w / 2.0) * fw as f32).round() as i32;
        let y1 = ((cy - h / 2.0) * fh as f32).round() as i32;
        let x2 = ((cx + w / 2.0) * fw as f32).round() as i32;
        let y2 = ((cy + h / 2.0) * fh as f32).round() as i32;
        regions.push(Region::new(x1, y1, x2 - x1, y2 - y1, score));
    }
    regions
}

/// CoreML on macOS, DirectML on Windows; other platforms stay on the CPU.
fn platform_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();
    providers
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let planes = frame.channels() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    if src_h == 0 || src_w == 0 {
        return tensor;
    }

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c.min(planes - 1)]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// The short-range model uses two feature map sizes, 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
