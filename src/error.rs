//! Error taxonomy for the frame pipeline.

use thiserror::Error;

use crate::camera::PixelFormat;

/// フレーム処理パイプラインのエラー
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 変換できないピクセルフォーマット
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    /// クロップ・スケール・画面サイズの不正
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// モデルの読み込み完了前に推論が呼ばれた
    #[error("model not loaded")]
    ModelNotLoaded,

    /// 出力ベクトルが宣言より短い（マッパー側でフィルタされる）
    #[error("malformed output: expected {expected} values, got {actual}")]
    MalformedOutput { expected: usize, actual: usize },

    /// 推論エンジン側の失敗
    #[error("inference failed: {0}")]
    Inference(String),

    /// 設定ファイルの読み込み・解析失敗
    #[error("config error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry(reason.into())
    }

    pub fn inference(reason: impl Into<String>) -> Self {
        Self::Inference(reason.into())
    }

    /// ログ抑制用のエラー種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::InvalidGeometry(_) => "InvalidGeometry",
            Self::ModelNotLoaded => "ModelNotLoaded",
            Self::MalformedOutput { .. } => "MalformedOutput",
            Self::Inference(_) => "Inference",
            Self::Config(_) => "Config",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
