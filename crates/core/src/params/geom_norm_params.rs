use std::path::Path;

use crate::shared::constants::{NORM_OUTPUT_HEIGHT, NORM_OUTPUT_WIDTH};

use super::parameter_set::{ParameterError, ParameterSet};

/// Geometric normalization settings (`*.cfg` files).
///
/// Point indices refer to the ground-truth point list. For bounding-box
/// ground truth that is `[top-left, top-right, bottom-left, bottom-right,
/// centre]`; for annotated landmarks it is the annotation order.
#[derive(Clone, Debug, PartialEq)]
pub struct GeomNormParams {
    pub output_width: u32,
    pub output_height: u32,
    pub rot_points: (usize, usize),
    /// Degrees, measured from the +x axis towards +y (image rows).
    pub rot_angle: f64,
    pub scale_points: (usize, usize),
    pub scale_dist: f64,
    pub crop_points: (usize, usize),
    pub crop_anchor: (f64, f64),
}

impl Default for GeomNormParams {
    /// The 64×80 bounding-box layout: box width spans the output width and
    /// the box centre sits in the middle of the output.
    fn default() -> Self {
        Self {
            output_width: NORM_OUTPUT_WIDTH,
            output_height: NORM_OUTPUT_HEIGHT,
            rot_points: (0, 1),
            rot_angle: 0.0,
            scale_points: (0, 1),
            scale_dist: NORM_OUTPUT_WIDTH as f64,
            crop_points: (0, 3),
            crop_anchor: (
                NORM_OUTPUT_WIDTH as f64 / 2.0,
                NORM_OUTPUT_HEIGHT as f64 / 2.0,
            ),
        }
    }
}

impl GeomNormParams {
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

    pub fn to_parameter_set(&self) -> Result<ParameterSet, ParameterError> {
        let mut set = ParameterSet::new();
        set.add_int("output_width", self.output_width as i64, "normalized image width")?;
        set.add_int("output_height", self.output_height as i64, "normalized image height")?;
        set.add_int_array(
            "rot_points",
            &pair(self.rot_points),
            "ground-truth points giving the orientation",
        )?;
        set.add_float("rot_angle", self.rot_angle, "output angle of that vector, degrees")?;
        set.add_int_array(
            "scale_points",
            &pair(self.scale_points),
            "ground-truth points giving the reference distance",
        )?;
        set.add_float("scale_dist", self.scale_dist, "output distance between them, pixels")?;
        set.add_int_array(
            "crop_points",
            &pair(self.crop_points),
            "ground-truth points whose midpoint is the anchor",
        )?;
        set.add_float_array(
            "crop_anchor",
            &[self.crop_anchor.0, self.crop_anchor.1],
            "output position of the anchor",
        )?;
        Ok(set)
    }

    pub fn from_parameter_set(set: &ParameterSet) -> Result<Self, ParameterError> {
        let crop_anchor = match set.get_float_array("crop_anchor")? {
            &[ax, ay] => (ax, ay),
            other => {
                return Err(invalid(
                    "crop_anchor",
                    format!("expected 2 values, got {}", other.len()),
                ))
            }
        };
        let params = Self {
            output_width: dimension(set, "output_width")?,
            output_height: dimension(set, "output_height")?,
            rot_points: index_pair(set, "rot_points")?,
            rot_angle: set.get_float("rot_angle")?,
            scale_points: index_pair(set, "scale_points")?,
            scale_dist: set.get_float("scale_dist")?,
            crop_points: index_pair(set, "crop_points")?,
            crop_anchor,
        };
        if params.scale_dist.is_nan() || params.scale_dist <= 0.0 {
            return Err(invalid(
                "scale_dist",
                format!("must be > 0, got {}", params.scale_dist),
            ));
        }
        Ok(params)
    }

    /// Highest ground-truth point index the configuration refers to.
    pub fn max_point_index(&self) -> usize {
        [
            self.rot_points.0,
            self.rot_points.1,
            self.scale_points.0,
            self.scale_points.1,
            self.crop_points.0,
            self.crop_points.1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

fn pair((a, b): (usize, usize)) -> [i64; 2] {
    [a as i64, b as i64]
}

fn dimension(set: &ParameterSet, name: &str) -> Result<u32, ParameterError> {
    let value = set.get_int(name)?;
    if value < 1 || value > u32::MAX as i64 {
        return Err(invalid(name, format!("must be >= 1, got {value}")));
    }
    Ok(value as u32)
}

fn index_pair(set: &ParameterSet, name: &str) -> Result<(usize, usize), ParameterError> {
    match set.get_int_array(name)? {
        &[a, b] if a >= 0 && b >= 0 => Ok((a as usize, b as usize)),
        &[a, b] => Err(invalid(name, format!("indices must be >= 0, got {a} {b}"))),
        other => Err(invalid(
            name,
            format!("expected 2 indices, got {}", other.len()),
        )),
    }
}

fn invalid(name: &str, reason: String) -> ParameterError {
    ParameterError::Invalid {
        name: name.to_string(),
        reason,
    }
}
