use anyhow::Context;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::engine::{InferenceEngine, InputShape, SampleType};
use super::preprocess::TransformedBuffer;
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};

/// ONNX Runtime によるポーズ推定エンジン
///
/// 入力: [1, H, W, 3] (u8 / i32 / f32)
/// 出力: 先頭出力テンソルを平坦化したベクトル（MoveNet は [1, 1, 17, 3]）
pub struct OnnxEngine {
    session: Session,
    shape: InputShape,
    input_name: String,
    output_name: String,
    output_len: usize,
}

impl OnnxEngine {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        shape: InputShape,
        input_name: &str,
        output_name: &str,
        output_len: usize,
    ) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .with_context(|| format!("Failed to load ONNX model {}", model_path.as_ref().display()))?;

        Ok(Self {
            session,
            shape,
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
            output_len,
        })
    }

    pub fn from_config(config: &ModelConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.path,
            InputShape::from_config(config),
            &config.input_name,
            &config.output_name,
            config.output_len,
        )
    }
}

fn ort_error(e: ort::Error) -> PipelineError {
    PipelineError::inference(e.to_string())
}

impl InferenceEngine for OnnxEngine {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn run(&mut self, input: &TransformedBuffer) -> Result<Vec<f32>> {
        let array = input.to_tensor();
        let outputs = match self.shape.sample_type {
            SampleType::Uint8 => {
                let tensor = Tensor::from_array(array).map_err(ort_error)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(ort_error)?
            }
            SampleType::Int32 => {
                let tensor = Tensor::from_array(array.mapv(i32::from)).map_err(ort_error)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(ort_error)?
            }
            SampleType::Float32 => {
                let tensor = Tensor::from_array(array.mapv(f32::from)).map_err(ort_error)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(ort_error)?
            }
        };

        let output: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
            .try_extract_array()
            .map_err(ort_error)?;

        Ok(output.iter().copied().collect())
    }
}
