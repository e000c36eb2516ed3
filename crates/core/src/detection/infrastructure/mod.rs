pub mod face_finder_factory;
pub mod model_resolver;
pub mod multiscale_face_finder;
pub mod onnx_blazeface_detector;
