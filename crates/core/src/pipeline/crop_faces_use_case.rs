use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;

use crate::detection::domain::face_detector::FaceDetector;
use crate::normalization::domain::geom_normalizer::GeomNormalizer;
use crate::normalization::domain::ground_truth::{
    BOUNDING_BOX_POINTS, GroundTruth, GroundTruthKind,
};
use crate::normalization::infrastructure::ground_truth_file::GroundTruthFile;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;
type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Where a frame's ground truth comes from.
pub enum PatternSource {
    /// Run the face finder; every pattern becomes bounding-box ground truth.
    Detector(Box<dyn FaceDetector>),
    /// Use annotated landmarks; unannotated frames have no patterns.
    Annotations(GroundTruthFile),
}

impl PatternSource {
    fn patterns(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<(Option<Region>, GroundTruth)>, Box<dyn std::error::Error>> {
        match self {
            PatternSource::Detector(detector) => Ok(detector
                .detect(frame)?
                .into_iter()
                .map(|region| {
                    let gt = GroundTruth::from_region(&region);
                    (Some(region), gt)
                })
                .collect()),
            PatternSource::Annotations(file) => Ok(file
                .get(frame.index())
                .map(|gt| vec![(None, gt.clone())])
                .unwrap_or_default()),
        }
    }

    /// Smallest ground truth this source can produce, if known up front.
    fn fewest_points(&self) -> Option<usize> {
        match self {
            PatternSource::Detector(_) => Some(BOUNDING_BOX_POINTS),
            PatternSource::Annotations(file) => file.fewest_points(),
        }
    }
}

/// One normalized face written to disk.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CropRecord {
    pub frame_index: usize,
    pub pattern_index: usize,
    pub ground_truth: GroundTruthKind,
    /// Detected pattern; `None` for annotated ground truth.
    pub region: Option<Region>,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Outcome of a crop run, serialized as the run manifest.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CropReport {
    pub source: Option<PathBuf>,
    pub frames_read: usize,
    pub frames_skipped: usize,
    pub crops: Vec<CropRecord>,
}

impl CropReport {
    pub fn write_manifest(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// File name of the `pattern`-th crop of frame `frame_index`.
pub fn crop_file_name(frame_index: usize, pattern: usize) -> String {
    format!("frame{frame_index:05}_face{pattern:02}.png")
}

/// Decode → find faces → normalize → write, one PNG per pattern.
///
/// Decoding runs on its own thread feeding a bounded channel; everything
/// else runs on the caller's thread in frame order. Single use: the reader
/// and pattern source are consumed by the first `execute`.
pub struct CropFacesUseCase {
    reader: Option<Box<dyn VideoReader>>,
    source: Option<PatternSource>,
    normalizer: GeomNormalizer,
    writer: Box<dyn ImageWriter>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
    channel_capacity: usize,
}

impl CropFacesUseCase {
    /// `reader` must already be opened.
    pub fn new(
        reader: Box<dyn VideoReader>,
        source: PatternSource,
        normalizer: GeomNormalizer,
        writer: Box<dyn ImageWriter>,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<ProgressCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            source: Some(source),
            normalizer,
            writer,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        output_dir: &Path,
        max_frames: Option<usize>,
    ) -> Result<CropReport, Box<dyn std::error::Error>> {
        let mut reader = self.reader.take().ok_or("Pipeline already executed")?;
        let mut source = self.source.take().ok_or("Pipeline already executed")?;
        if let Some(available) = source.fewest_points() {
            if let Err(e) = self.normalizer.check_point_count(available) {
                reader.close();
                return Err(e.into());
            }
        }

        let total = metadata.frames_to_visit(max_frames);
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(self.channel_capacity);
        let reader_handle = spawn_reader(reader, frame_tx, max_frames, self.cancelled.clone());

        let mut report = CropReport {
            source: metadata.source_path.clone(),
            ..CropReport::default()
        };
        let result = self.run_main_loop(frame_rx, &mut source, output_dir, total, &mut report);

        let joined = join_reader(reader_handle);
        result?;
        joined?;

        self.logger.info(&format!(
            "Wrote {} crops from {} frames ({} skipped)",
            report.crops.len(),
            report.frames_read,
            report.frames_skipped
        ));
        self.logger.summary();
        Ok(report)
    }

    /// Consumes `frame_rx` until the reader finishes or an error occurs.
    /// Returning drops the receiver, which stops the reader thread.
    fn run_main_loop(
        &mut self,
        frame_rx: crossbeam_channel::Receiver<Result<Frame, SendError>>,
        source: &mut PatternSource,
        output_dir: &Path,
        total: usize,
        report: &mut CropReport,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for received in frame_rx {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            let frame = received.map_err(|e| e.to_string())?;
            report.frames_read += 1;

            let started = Instant::now();
            let patterns = source.patterns(&frame)?;
            self.logger.timing("detect", elapsed_ms(started));
            self.logger.metric("patterns_per_frame", patterns.len() as f64);

            if patterns.is_empty() {
                self.logger.info(&format!("Skipping frame {}", frame.index()));
                report.frames_skipped += 1;
            }
            for (pattern_index, (region, gt)) in patterns.into_iter().enumerate() {
                let record = self.crop_one(&frame, pattern_index, region, &gt, output_dir)?;
                report.crops.push(record);
            }

            self.logger.progress(report.frames_read, total);
            if let Some(ref callback) = self.on_progress {
                if !callback(report.frames_read, total) {
                    self.cancelled.store(true, Ordering::Relaxed);
                    return Err("Cancelled".into());
                }
            }
        }
        Ok(())
    }

    fn crop_one(
        &mut self,
        frame: &Frame,
        pattern_index: usize,
        region: Option<Region>,
        gt: &GroundTruth,
        output_dir: &Path,
    ) -> Result<CropRecord, Box<dyn std::error::Error>> {
        let started = Instant::now();
        let normalized = self
            .normalizer
            .normalize(frame, gt)
            .map_err(|e| format!("frame {}, pattern {pattern_index}: {e}", frame.index()))?;
        self.logger.timing("normalize", elapsed_ms(started));

        let output = output_dir.join(crop_file_name(frame.index(), pattern_index));
        let started = Instant::now();
        self.writer.write(&output, &normalized, None)?;
        self.logger.timing("write", elapsed_ms(started));

        if let Some(r) = &region {
            log::debug!(
                "Frame {} pattern {pattern_index}: ({}, {}) {}x{} score {:.2}",
                frame.index(),
                r.x,
                r.y,
                r.width,
                r.height,
                r.score
            );
        }
        Ok(CropRecord {
            frame_index: frame.index(),
            pattern_index,
            ground_truth: gt.kind(),
            region,
            output,
            width: normalized.width(),
            height: normalized.height(),
        })
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: crossbeam_channel::Sender<Result<Frame, SendError>>,
    max_frames: Option<usize>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        let limit = max_frames.unwrap_or(usize::MAX);
        for frame_result in reader.frames().take(limit) {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let failed = frame_result.is_err();
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        reader
    })
}

fn join_reader(handle: JoinHandle<Box<dyn VideoReader>>) -> Result<(), Box<dyn std::error::Error>> {
    match handle.join() {
        Ok(mut reader) => {
            reader.close();
            Ok(())
        }
        Err(_) => Err("Reader thread panicked".into()),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
