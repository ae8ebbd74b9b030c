pub mod execution_provider;
pub mod math;
pub mod model_resolver;
pub mod onnx_emotion_extractor;
pub mod onnx_face_detector;
pub mod onnx_face_embedder;
