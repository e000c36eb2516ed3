use ndarray::ArrayView3;

/// BT.601 luma weights used for RGB → gray conversion.
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// A single video/image frame: contiguous pixel planes in row-major order.
///
/// Readers hand out 1-plane (grayscale) frames; the face finder and the
/// geometric normalizer both operate on luma only.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Single-plane luma frame.
    pub fn gray(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        Self::new(data, width, height, 1, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_gray(&self) -> bool {
        self.channels == 1
    }

    /// Converts to a 1-plane luma frame. Gray frames are cloned as-is.
    pub fn to_gray(&self) -> Frame {
        if self.is_gray() {
            return self.clone();
        }
        let channels = self.channels as usize;
        let data = self
            .data
            .chunks_exact(channels)
            .map(|px| {
                if channels < 3 {
                    return px[0];
                }
                let luma = px[0] as f32 * LUMA_WEIGHTS[0]
                    + px[1] as f32 * LUMA_WEIGHTS[1]
                    + px[2] as f32 * LUMA_WEIGHTS[2];
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Frame::gray(data, self.width, self.height, self.index)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
