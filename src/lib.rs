pub mod camera;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod pose;
pub mod publish;
pub mod render;

pub use error::{PipelineError, Result};
