use std::borrow::Cow;

use thiserror::Error;

use crate::normalization::domain::ground_truth::GroundTruth;
use crate::params::geom_norm_params::GeomNormParams;
use crate::shared::frame::Frame;

#[derive(Error, Debug, PartialEq)]
pub enum GeomNormError {
    #[error("{role} point index {index} is out of range ({available} ground-truth points)")]
    PointIndexOutOfRange {
        role: &'static str,
        index: usize,
        available: usize,
    },
    #[error("{role} points {first} and {second} coincide")]
    DegenerateGroundTruth {
        role: &'static str,
        first: usize,
        second: usize,
    },
    #[error("cannot normalize an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },
}

/// Similarity transform from output pixels back into the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Transform {
    cos: f64,
    sin: f64,
    inv_scale: f64,
    anchor: (f64, f64),
    crop_anchor: (f64, f64),
}

impl Transform {
    /// Continuous source position of the centre of output pixel `(u, v)`,
    /// shifted so that integer coordinates are pixel centres.
    fn source_of(&self, u: u32, v: u32) -> (f64, f64) {
        let dx = (u as f64 + 0.5 - self.crop_anchor.0) * self.inv_scale;
        let dy = (v as f64 + 0.5 - self.crop_anchor.1) * self.inv_scale;
        (
            self.anchor.0 + self.cos * dx - self.sin * dy - 0.5,
            self.anchor.1 + self.sin * dx + self.cos * dy - 0.5,
        )
    }
}

/// Rotates, scales and crops a frame around ground-truth points so that
/// the face lands at a canonical position and size.
#[derive(Clone, Debug)]
pub struct GeomNormalizer {
    params: GeomNormParams,
}

impl GeomNormalizer {
    pub fn new(params: GeomNormParams) -> Self {
        Self { params }
    }

    /// Fails unless ground truth with `available` points covers every
    /// configured point index.
    pub fn check_point_count(&self, available: usize) -> Result<(), GeomNormError> {
        let index = self.params.max_point_index();
        if index >= available {
            return Err(GeomNormError::PointIndexOutOfRange {
                role: "configured",
                index,
                available,
            });
        }
        Ok(())
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.params.output_width, self.params.output_height)
    }

    /// Produces a single-plane `output_width × output_height` frame carrying
    /// the source frame index. RGB input is converted to gray first.
    pub fn normalize(&self, frame: &Frame, gt: &GroundTruth) -> Result<Frame, GeomNormError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(GeomNormError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }
        let transform = self.transform_for(gt)?;
        let gray: Cow<'_, Frame> = if frame.is_gray() {
            Cow::Borrowed(frame)
        } else {
            Cow::Owned(frame.to_gray())
        };

        let (out_w, out_h) = self.output_size();
        let mut data = Vec::with_capacity(out_w as usize * out_h as usize);
        for v in 0..out_h {
            for u in 0..out_w {
                let (sx, sy) = transform.source_of(u, v);
                let value = sample_bilinear(&gray, sx, sy);
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        Ok(Frame::gray(data, out_w, out_h, frame.index()))
    }

    fn transform_for(&self, gt: &GroundTruth) -> Result<Transform, GeomNormError> {
        let p = &self.params;
        let (r0, r1) = resolve_pair(gt, p.rot_points, "rotation")?;
        let (s0, s1) = resolve_pair(gt, p.scale_points, "scale")?;
        let (c0, c1) = resolve_pair(gt, p.crop_points, "crop")?;

        let distance = (s1.0 - s0.0).hypot(s1.1 - s0.1);
        if distance <= f64::EPSILON {
            return Err(GeomNormError::DegenerateGroundTruth {
                role: "scale",
                first: p.scale_points.0,
                second: p.scale_points.1,
            });
        }

        // A coincident rotation pair gives atan2(0, 0) = 0, i.e. no rotation.
        let theta = (r1.1 - r0.1).atan2(r1.0 - r0.0) - p.rot_angle.to_radians();
        let (sin, cos) = theta.sin_cos();

        Ok(Transform {
            cos,
            sin,
            inv_scale: distance / p.scale_dist,
            anchor: ((c0.0 + c1.0) / 2.0, (c0.1 + c1.1) / 2.0),
            crop_anchor: p.crop_anchor,
        })
    }
}

fn resolve_pair(
    gt: &GroundTruth,
    (a, b): (usize, usize),
    role: &'static str,
) -> Result<((f64, f64), (f64, f64)), GeomNormError> {
    let fetch = |index: usize| {
        gt.point(index).ok_or(GeomNormError::PointIndexOutOfRange {
            role,
            index,
            available: gt.len(),
        })
    };
    Ok((fetch(a)?, fetch(b)?))
}

/// Bilinear sample of plane 0. Neighbours outside the frame read as 0.
fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let w = frame.width() as i64;
    let h = frame.height() as i64;
    let stride = frame.width() as usize * frame.channels() as usize;
    let data = frame.data();
    let at = |px: i64, py: i64| -> f64 {
        if px < 0 || py < 0 || px >= w || py >= h {
            return 0.0;
        }
        data[py as usize * stride + px as usize * frame.channels() as usize] as f64
    };

    let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
    let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::region::Region;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Gray frame whose value at `(x, y)` is `f(x, y)`.
    fn frame_from(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Frame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Frame::gray(data, width, height, 7)
    }

    fn pixel(frame: &Frame, u: u32, v: u32) -> u8 {
        frame.data()[(v * frame.width() + u) as usize]
    }

    fn eyes_params(scale_dist: f64) -> GeomNormParams {
        GeomNormParams {
            rot_points: (0, 1),
            rot_angle: 0.0,
            scale_points: (0, 1),
            scale_dist,
            crop_points: (0, 1),
            crop_anchor: (32.0, 24.0),
            ..GeomNormParams::default()
        }
    }

    #[rstest]
    #[case::small_box(Region::new(5, 5, 12, 12, 1.0), 40, 30)]
    #[case::large_box(Region::new(0, 0, 600, 400, 1.0), 640, 480)]
    #[case::box_past_edge(Region::new(-50, -20, 100, 140, 1.0), 64, 64)]
    fn test_output_is_always_64x80_gray(
        #[case] region: Region,
        #[case] width: u32,
        #[case] height: u32,
    ) {
        let frame = frame_from(width, height, |x, y| (x ^ y) as u8);
        let normalizer = GeomNormalizer::new(GeomNormParams::default());
        let out = normalizer
            .normalize(&frame, &GroundTruth::from_region(&region))
            .unwrap();
        assert_eq!((out.width(), out.height(), out.channels()), (64, 80, 1));
        assert_eq!(out.data().len(), 64 * 80);
        assert_eq!(out.index(), 7);
    }

    #[test]
    fn test_rgb_input_is_converted() {
        let frame = Frame::new(vec![200u8; 100 * 100 * 3], 100, 100, 3, 0);
        let gt = GroundTruth::from_region(&Region::new(20, 20, 60, 60, 1.0));
        let out = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(pixel(&out, 32, 40), 200);
    }

    #[test]
    fn test_square_box_is_centred_on_anchor() {
        // 100x100 bright box in a dark 300x300 frame.
        let frame = frame_from(300, 300, |x, y| {
            if (50..150).contains(&x) && (50..150).contains(&y) {
                200
            } else {
                0
            }
        });
        let gt = GroundTruth::from_region(&Region::new(50, 50, 100, 100, 1.0));
        let out = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap();

        // Box spans columns 0..64 and rows 8..72 of the output.
        assert_eq!(pixel(&out, 32, 40), 200);
        assert_eq!(pixel(&out, 0, 40), 200);
        assert_eq!(pixel(&out, 32, 10), 200);
        assert_eq!(pixel(&out, 32, 2), 0);
        assert_eq!(pixel(&out, 32, 77), 0);
    }

    #[test]
    fn test_unit_scale_copies_pixels() {
        let frame = frame_from(256, 256, |x, _| x as u8);
        // 64px wide box maps 1:1; anchor (128, 128) lands on (32, 40).
        let gt = GroundTruth::from_region(&Region::new(96, 96, 64, 64, 1.0));
        let out = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap();
        for u in [0, 10, 63] {
            assert_eq!(pixel(&out, u, 40), 96 + u as u8);
        }
    }

    #[test]
    fn test_scale_follows_box_width() {
        let frame = frame_from(256, 256, |x, _| x as u8);
        // 32px box mapped to 64px: content is magnified by 2.
        let gt = GroundTruth::from_region(&Region::new(100, 100, 32, 32, 1.0));
        let out = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap();
        // Source x = 99.75 + u / 2
        assert_eq!(pixel(&out, 10, 40), 105);
        assert_eq!(pixel(&out, 12, 40), 106);
        assert_eq!(pixel(&out, 30, 40), 115);
    }

    #[test]
    fn test_rotation_aligns_vertical_eyes() {
        let frame = frame_from(256, 256, |_, y| y as u8);
        // Eye vector points down the image; output wants it along +x.
        let gt = GroundTruth::landmarks(vec![(100.0, 100.0), (100.0, 140.0)]);
        let out = GeomNormalizer::new(eyes_params(40.0))
            .normalize(&frame, &gt)
            .unwrap();
        // Source row = 88 + u along output row 24.
        assert_eq!(pixel(&out, 0, 24), 88);
        assert_eq!(pixel(&out, 20, 24), 108);
        assert_eq!(pixel(&out, 63, 24), 151);
    }

    #[test]
    fn test_outside_frame_reads_black() {
        let frame = frame_from(40, 40, |_, _| 255);
        let gt = GroundTruth::from_region(&Region::new(0, 0, 40, 40, 1.0));
        let out = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap();
        assert_eq!(pixel(&out, 32, 40), 255);
        assert_eq!(pixel(&out, 32, 0), 0);
        assert_eq!(pixel(&out, 32, 79), 0);
    }

    #[test]
    fn test_point_index_beyond_ground_truth() {
        let frame = frame_from(50, 50, |_, _| 0);
        let gt = GroundTruth::landmarks(vec![(10.0, 10.0), (30.0, 10.0)]);
        let err = GeomNormalizer::new(GeomNormParams::default())
            .normalize(&frame, &gt)
            .unwrap_err();
        assert_eq!(
            err,
            GeomNormError::PointIndexOutOfRange {
                role: "crop",
                index: 3,
                available: 2
            }
        );
    }

    #[rstest]
    #[case::bounding_box(GeomNormParams::default(), 5, None)]
    #[case::two_eyes(eyes_params(33.0), 2, None)]
    #[case::eyes_layout_on_one_point(eyes_params(33.0), 1, Some(1))]
    #[case::corner_layout_on_eyes(GeomNormParams::default(), 2, Some(3))]
    fn test_check_point_count(
        #[case] params: GeomNormParams,
        #[case] available: usize,
        #[case] missing_index: Option<usize>,
    ) {
        let result = GeomNormalizer::new(params).check_point_count(available);
        match missing_index {
            None => assert_eq!(result, Ok(())),
            Some(index) => assert_eq!(
                result,
                Err(GeomNormError::PointIndexOutOfRange {
                    role: "configured",
                    index,
                    available
                })
            ),
        }
    }

    #[test]
    fn test_coincident_scale_points_are_degenerate() {
        let frame = frame_from(50, 50, |_, _| 0);
        let gt = GroundTruth::landmarks(vec![(10.0, 10.0), (10.0, 10.0)]);
        let err = GeomNormalizer::new(eyes_params(33.0))
            .normalize(&frame, &gt)
            .unwrap_err();
        assert!(matches!(err, GeomNormError::DegenerateGroundTruth { .. }));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = Frame::gray(Vec::new(), 0, 0, 0);
        let gt = GroundTruth::from_region(&Region::new(0, 0, 10, 10, 1.0));
        assert!(matches!(
            GeomNormalizer::new(GeomNormParams::default()).normalize(&frame, &gt),
            Err(GeomNormError::EmptyFrame { .. })
        ));
    }

    #[test]
    fn test_sample_bilinear_interpolates() {
        let frame = Frame::gray(vec![0, 100, 200, 100], 2, 2, 0);
        assert_relative_eq!(sample_bilinear(&frame, 0.5, 0.0), 50.0);
        assert_relative_eq!(sample_bilinear(&frame, 0.5, 0.5), 100.0);
        assert_relative_eq!(sample_bilinear(&frame, 1.0, 1.0), 100.0);
    }
}
