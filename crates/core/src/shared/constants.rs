pub const SEETA_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const SEETA_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

/// Canonical normalized face size (width × height, single plane).
pub const NORM_OUTPUT_WIDTH: u32 = 64;
pub const NORM_OUTPUT_HEIGHT: u32 = 80;

/// SeetaFace cannot scan windows smaller than its 20px base classifier.
pub const SEETA_MIN_FACE_SIZE: u32 = 20;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "pgm", "tiff", "tif", "webp"];

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
