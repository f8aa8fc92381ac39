pub mod detector;
pub mod engine;
pub mod keypoint;
pub mod mapper;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;

pub use detector::{check_output, ModelLoader, PoseDetector};
pub use engine::{InferenceEngine, InputShape, SampleType};
pub use keypoint::{Keypoint, KeypointIndex, KeypointSet};
pub use mapper::{KeypointMapper, MirrorAxes, ScreenSize, VALUES_PER_KEYPOINT};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
pub use preprocess::{CropRect, FrameTransform, ResizeFilter, TransformedBuffer};
