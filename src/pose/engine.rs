use serde::Deserialize;

use super::preprocess::TransformedBuffer;
use crate::config::ModelConfig;
use crate::error::Result;

/// エンジンへ渡すテンソルの要素型
///
/// 変換バッファは常に u8。型変換はエンジン側で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    Uint8,
    Int32,
    Float32,
}

/// モデルが宣言する入力形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub sample_type: SampleType,
}

impl InputShape {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            width: config.input_width,
            height: config.input_height,
            channels: config.channels,
            sample_type: config.sample_type,
        }
    }

    pub fn matches(&self, buffer: &TransformedBuffer) -> bool {
        self.width == buffer.width()
            && self.height == buffer.height()
            && self.channels == TransformedBuffer::CHANNELS
    }
}

/// 同期推論エンジン
///
/// 呼び出し元のスレッドを結果が出るまでブロックする。
pub trait InferenceEngine: Send {
    fn input_shape(&self) -> InputShape;

    /// 出力ベクトルの宣言長
    fn output_len(&self) -> usize;

    fn run(&mut self, input: &TransformedBuffer) -> Result<Vec<f32>>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_shape(&self) -> InputShape {
        (**self).input_shape()
    }

    fn output_len(&self) -> usize {
        (**self).output_len()
    }

    fn run(&mut self, input: &TransformedBuffer) -> Result<Vec<f32>> {
        (**self).run(input)
    }
}
