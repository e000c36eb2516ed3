use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::normalization::domain::ground_truth::GroundTruth;

#[derive(Error, Debug)]
pub enum GroundTruthError {
    #[error("failed to read annotations {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: {count} coordinates given, expected x y pairs")]
    OddCoordinates { line: usize, count: usize },
    #[error("line {line}: frame {frame} is already annotated")]
    Duplicate { line: usize, frame: usize },
}

/// Per-frame landmark annotations.
///
/// One frame per line: `frame_index x0 y0 x1 y1 ...`. Blank lines and
/// `#` comments are ignored.
#[derive(Clone, Debug, Default)]
pub struct GroundTruthFile {
    frames: BTreeMap<usize, GroundTruth>,
}

impl GroundTruthFile {
    pub fn load(path: &Path) -> Result<Self, GroundTruthError> {
        let text = std::fs::read_to_string(path).map_err(|e| GroundTruthError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file = Self::parse(&text)?;
        log::info!(
            "Loaded annotations for {} frames from {}",
            file.len(),
            path.display()
        );
        Ok(file)
    }

    pub fn parse(text: &str) -> Result<Self, GroundTruthError> {
        let mut frames = BTreeMap::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let mut tokens = content.split_whitespace();
            let frame = tokens
                .next()
                .unwrap_or_default()
                .parse::<usize>()
                .map_err(|e| GroundTruthError::Syntax {
                    line,
                    message: format!("bad frame index: {e}"),
                })?;
            let coords = tokens
                .map(|t| match t.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    Ok(_) => Err(GroundTruthError::Syntax {
                        line,
                        message: format!("coordinate '{t}' is not finite"),
                    }),
                    Err(e) => Err(GroundTruthError::Syntax {
                        line,
                        message: format!("bad coordinate '{t}': {e}"),
                    }),
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if coords.is_empty() || coords.len() % 2 != 0 {
                return Err(GroundTruthError::OddCoordinates {
                    line,
                    count: coords.len(),
                });
            }

            let points = coords.chunks_exact(2).map(|p| (p[0], p[1])).collect();
            if frames.insert(frame, GroundTruth::landmarks(points)).is_some() {
                return Err(GroundTruthError::Duplicate { line, frame });
            }
        }
        Ok(Self { frames })
    }

    pub fn get(&self, frame_index: usize) -> Option<&GroundTruth> {
        self.frames.get(&frame_index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Point count of the sparsest annotation, `None` when nothing is annotated.
    pub fn fewest_points(&self) -> Option<usize> {
        self.frames.values().map(GroundTruth::len).min()
    }

    /// Annotated frame indices in ascending order.
    pub fn frame_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames.keys().copied()
    }
}
