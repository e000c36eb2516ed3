use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Every decoded picture is converted to 8-bit luma and handed out as a
/// single-plane [`Frame`].
pub struct FfmpegReader {
    stream: Option<OpenStream>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    next_index: usize,
    finished: bool,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| format!("no video stream in {}", path.display()))?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let total_frames = stream.frames().max(0) as usize;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::GRAY8,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        log::debug!(
            "Opened {}: {}x{} {} @ {:.2} fps, {} frames",
            path.display(),
            width,
            height,
            metadata.codec,
            fps,
            total_frames
        );

        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            next_index: 0,
            finished: false,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.stream.as_mut() {
            Some(stream) => Box::new(GrayFrameIter {
                stream,
                flushing: false,
            }),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

/// Lazy decode loop: one packet at a time, draining the decoder at EOF.
struct GrayFrameIter<'a> {
    stream: &'a mut OpenStream,
    flushing: bool,
}

impl GrayFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let s = &mut *self.stream;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        s.decoder.receive_frame(&mut decoded).ok()?;

        let mut gray = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = s.scaler.run(&decoded, &mut gray) {
            return Some(Err(Box::new(e)));
        }
        let luma = extract_plane(&gray, s.width, s.height);
        let frame = Frame::gray(luma, s.width, s.height, s.next_index);
        s.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for GrayFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stream.finished {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.stream.finished = true;
            return None;
        }

        loop {
            let packet = {
                let s = &mut *self.stream;
                match s.ictx.packets().next() {
                    Some((stream, packet)) if stream.index() == s.stream_index => Some(packet),
                    Some(_) => continue,
                    None => None,
                }
            };

            match packet {
                Some(packet) => {
                    if let Err(e) = self.stream.decoder.send_packet(&packet) {
                        log::warn!("Dropping undecodable packet: {e}");
                        continue;
                    }
                }
                None => {
                    let _ = self.stream.decoder.send_eof();
                    self.flushing = true;
                }
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
            if self.flushing {
                self.stream.finished = true;
                return None;
            }
        }
    }
}

/// Copies plane 0 into a tightly-packed buffer, dropping row padding
/// (stride > width).
fn extract_plane(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let w = width as usize;

    let mut pixels = Vec::with_capacity(w * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + w]);
    }
    pixels
}
