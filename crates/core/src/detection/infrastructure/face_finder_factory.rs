use std::path::PathBuf;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::model_resolver::{ModelResolver, ProgressFn};
use crate::detection::infrastructure::multiscale_face_finder::MultiscaleFaceFinder;
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::params::face_finder_params::{DetectorKind, FaceFinderParams};
use crate::shared::constants::{SEETA_MODEL_NAME, SEETA_MODEL_URL};

/// Builds the face finder described by `params`.
///
/// The SeetaFace model is fetched into the model cache when `params.model`
/// is unset; BlazeFace has no default model and requires one.
pub fn create_face_finder(
    params: &FaceFinderParams,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    params.validate()?;
    let model_path = resolve_model_path(params, progress)?;
    log::info!(
        "Face finder: {} ({})",
        params.detector.as_str(),
        model_path.display()
    );

    match params.detector {
        DetectorKind::Seeta => Ok(Box::new(MultiscaleFaceFinder::new(&model_path, params)?)),
        DetectorKind::Blazeface => Ok(Box::new(OnnxBlazefaceDetector::new(&model_path, params)?)),
    }
}

fn resolve_model_path(
    params: &FaceFinderParams,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &params.model {
        if !path.is_file() {
            return Err(format!("model file not found: {}", path.display()).into());
        }
        return Ok(path.clone());
    }
    match params.detector {
        DetectorKind::Seeta => {
            Ok(ModelResolver::new()?.resolve(SEETA_MODEL_NAME, SEETA_MODEL_URL, progress)?)
        }
        DetectorKind::Blazeface => {
            Err("the blazeface detector needs an explicit 'model' parameter".into())
        }
    }
}
