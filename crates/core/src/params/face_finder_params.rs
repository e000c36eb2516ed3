use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::detection::domain::pattern_selector::SelectorKind;
use crate::shared::constants::SEETA_MIN_FACE_SIZE;
use crate::shared::region::Region;

use super::parameter_set::{ParameterError, ParameterSet};

/// Face finder backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    /// SeetaFace funnel cascade scanned over an image pyramid.
    Seeta,
    /// BlazeFace short-range ONNX model.
    Blazeface,
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seeta" => Ok(DetectorKind::Seeta),
            "blazeface" => Ok(DetectorKind::Blazeface),
            other => Err(format!("expected 'seeta' or 'blazeface', got '{other}'")),
        }
    }
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Seeta => "seeta",
            DetectorKind::Blazeface => "blazeface",
        }
    }
}

/// Scan area, as fractions of the frame size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Roi {
    pub const FULL: Roi = Roi {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn is_full(&self) -> bool {
        *self == Roi::FULL
    }

    /// Pixel rectangle of the ROI within a `frame_w × frame_h` frame.
    pub fn to_region(&self, frame_w: u32, frame_h: u32) -> Region {
        let x = (self.x * frame_w as f64).round() as i32;
        let y = (self.y * frame_h as f64).round() as i32;
        let x2 = ((self.x + self.width) * frame_w as f64).round() as i32;
        let y2 = ((self.y + self.height) * frame_h as f64).round() as i32;
        Region::new(x, y, x2 - x, y2 - y, 0.0)
    }
}

/// Settings for the multiscale face finder (`*.params` files).
#[derive(Clone, Debug, PartialEq)]
pub struct FaceFinderParams {
    pub detector: DetectorKind,
    /// `None` resolves the default model for the backend.
    pub model: Option<PathBuf>,
    pub min_face_size: u32,
    /// 0 means unbounded.
    pub max_face_size: u32,
    pub scale_factor: f32,
    pub step_x: u32,
    pub step_y: u32,
    pub score_threshold: f64,
    pub roi: Roi,
    pub selector: SelectorKind,
    pub overlap_threshold: f64,
    /// 0 means unlimited.
    pub max_patterns: usize,
}

impl Default for FaceFinderParams {
    fn default() -> Self {
        Self {
            detector: DetectorKind::Seeta,
            model: None,
            min_face_size: SEETA_MIN_FACE_SIZE,
            max_face_size: 0,
            scale_factor: 0.8,
            step_x: 4,
            step_y: 4,
            score_threshold: 2.0,
            roi: Roi::FULL,
            selector: SelectorKind::Merge,
            overlap_threshold: 0.3,
            max_patterns: 0,
        }
    }
}

impl FaceFinderParams {
    /// Reads and validates a finder parameter file.
    pub fn load(path: &Path) -> Result<Self, ParameterError> {
        let mut set = Self::default().to_parameter_set()?;
        set.load(path)?;
        Self::from_parameter_set(&set)
    }

    pub fn from_str_params(text: &str) -> Result<Self, ParameterError> {
        let mut set = Self::default().to_parameter_set()?;
        set.load_str(text)?;
        Self::from_parameter_set(&set)
    }

    /// Declares every finder parameter with `self`'s values as defaults.
    pub fn to_parameter_set(&self) -> Result<ParameterSet, ParameterError> {
        let mut set = ParameterSet::new();
        set.add_str("detector", self.detector.as_str(), "backend: seeta | blazeface")?;
        let model = self
            .model
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        set.add_str("model", &model, "model file (empty = default model)")?;
        set.add_int("min_face_size", self.min_face_size as i64, "smallest face, pixels")?;
        set.add_int("max_face_size", self.max_face_size as i64, "largest face, pixels (0 = no limit)")?;
        set.add_float("scale_factor", self.scale_factor as f64, "pyramid down-scaling per level")?;
        set.add_int("step_x", self.step_x as i64, "horizontal window step, pixels")?;
        set.add_int("step_y", self.step_y as i64, "vertical window step, pixels")?;
        set.add_float("score_threshold", self.score_threshold, "minimum classifier score")?;
        set.add_float_array(
            "roi",
            &[self.roi.x, self.roi.y, self.roi.width, self.roi.height],
            "scan region x y w h, fractions of the frame",
        )?;
        set.add_str("selector", self.selector.as_str(), "candidate selection: keep | suppress | merge")?;
        set.add_float("overlap_threshold", self.overlap_threshold, "IoU at which patterns are the same face")?;
        set.add_int("max_patterns", self.max_patterns as i64, "keep at most N patterns (0 = all)")?;
        Ok(set)
    }

    pub fn from_parameter_set(set: &ParameterSet) -> Result<Self, ParameterError> {
        let detector = set
            .get_str("detector")?
            .parse::<DetectorKind>()
            .map_err(|reason| invalid("detector", reason))?;
        let selector = set
            .get_str("selector")?
            .parse::<SelectorKind>()
            .map_err(|reason| invalid("selector", reason))?;
        let model = match set.get_str("model")? {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        let roi = match set.get_float_array("roi")? {
            &[x, y, width, height] => Roi {
                x,
                y,
                width,
                height,
            },
            other => {
                return Err(invalid(
                    "roi",
                    format!("expected 4 values, got {}", other.len()),
                ))
            }
        };

        let params = Self {
            detector,
            model,
            min_face_size: non_negative(set, "min_face_size")? as u32,
            max_face_size: non_negative(set, "max_face_size")? as u32,
            scale_factor: set.get_float("scale_factor")? as f32,
            step_x: non_negative(set, "step_x")? as u32,
            step_y: non_negative(set, "step_y")? as u32,
            score_threshold: set.get_float("score_threshold")?,
            roi,
            selector,
            overlap_threshold: set.get_float("overlap_threshold")?,
            max_patterns: non_negative(set, "max_patterns")? as usize,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.detector == DetectorKind::Seeta && self.min_face_size < SEETA_MIN_FACE_SIZE {
            return Err(invalid(
                "min_face_size",
                format!("must be >= {SEETA_MIN_FACE_SIZE} for seeta, got {}", self.min_face_size),
            ));
        }
        if self.max_face_size != 0 && self.max_face_size < self.min_face_size {
            return Err(invalid(
                "max_face_size",
                format!(
                    "{} is below min_face_size {}",
                    self.max_face_size, self.min_face_size
                ),
            ));
        }
        if self.scale_factor.is_nan() || self.scale_factor <= 0.0 || self.scale_factor >= 1.0 {
            return Err(invalid(
                "scale_factor",
                format!("must be in (0, 1), got {}", self.scale_factor),
            ));
        }
        if self.step_x == 0 || self.step_y == 0 {
            return Err(invalid("step_x/step_y", "steps must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(invalid(
                "overlap_threshold",
                format!("must be in [0, 1], got {}", self.overlap_threshold),
            ));
        }
        let Roi {
            x,
            y,
            width,
            height,
        } = self.roi;
        let inside = x >= 0.0 && y >= 0.0 && x + width <= 1.0 + 1e-9 && y + height <= 1.0 + 1e-9;
        if !inside || width <= 0.0 || height <= 0.0 {
            return Err(invalid(
                "roi",
                format!("{x} {y} {width} {height} is empty or outside the unit square"),
            ));
        }
        Ok(())
    }
}

fn non_negative(set: &ParameterSet, name: &str) -> Result<i64, ParameterError> {
    let value = set.get_int(name)?;
    if value < 0 {
        return Err(invalid(name, format!("must be >= 0, got {value}")));
    }
    Ok(value)
}

fn invalid(name: &str, reason: String) -> ParameterError {
    ParameterError::Invalid {
        name: name.to_string(),
        reason,
    }
}
