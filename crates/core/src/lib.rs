//! Face finding and geometric normalization of video frames.
//!
//! A video (or still image) is decoded to gray frames, each frame is scanned
//! for face patterns, and every pattern is rotated, scaled and cropped into a
//! fixed-size image.

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod region;
    pub mod video_metadata;
}

pub mod params {
    pub mod face_finder_params;
    pub mod geom_norm_params;
    pub mod parameter_set;
}

pub mod video {
    pub mod domain {
        pub mod image_writer;
        pub mod video_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod image_file_reader;
        pub mod image_file_writer;
    }
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod pattern_selector;
    }
    pub mod infrastructure;
}

pub mod normalization {
    pub mod domain {
        pub mod geom_normalizer;
        pub mod ground_truth;
    }
    pub mod infrastructure {
        pub mod ground_truth_file;
    }
}

pub mod pipeline {
    pub mod crop_faces_use_case;
    pub mod pipeline_logger;
}
