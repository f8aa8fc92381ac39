use log::{error, info};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::pose::{CropRect, MirrorAxes, ResizeFilter, SampleType};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub mapper: MapperConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            camera: CameraConfig::default(),
            model: ModelConfig::default(),
            transform: TransformConfig::default(),
            mapper: MapperConfig::default(),
            screen: ScreenConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// デバイス番号
    #[serde(default)]
    pub index: i32,
    /// 要求解像度（16:9）
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    /// 要求フレームレート
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
    /// フロントカメラ（映像が鏡像）
    #[serde(default = "default_true")]
    pub front: bool,
}

fn default_camera_width() -> u32 { 1920 }
fn default_camera_height() -> u32 { 1080 }
fn default_camera_fps() -> u32 { 60 }
fn default_true() -> bool { true }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
            front: default_true(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// モデルファイルのパス
    #[serde(default = "default_model_path")]
    pub path: String,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
    /// エンジンへ渡すテンソルの型
    #[serde(default)]
    pub sample_type: SampleType,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    /// 出力ベクトル長（17キーポイント × 3）
    #[serde(default = "default_output_len")]
    pub output_len: usize,
}

fn default_model_path() -> String { "models/movenet_thunder.onnx".to_string() }
fn default_input_size() -> u32 { 256 }
fn default_channels() -> u32 { 3 }
fn default_input_name() -> String { "input".to_string() }
fn default_output_name() -> String { "output_0".to_string() }
fn default_output_len() -> usize { 51 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            input_width: default_input_size(),
            input_height: default_input_size(),
            channels: default_channels(),
            sample_type: SampleType::default(),
            input_name: default_input_name(),
            output_name: default_output_name(),
            output_len: default_output_len(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TransformConfig {
    /// クロップ領域（ソースフレームのピクセル座標）。未指定ならフレーム全体
    #[serde(default)]
    pub crop: Option<CropRect>,
    #[serde(default)]
    pub filter: ResizeFilter,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapperConfig {
    /// 先頭から捨てるキーポイント数（MoveNetでは顔の5点）
    #[serde(default = "default_skip_count")]
    pub skip_count: usize,
    /// X軸を反転。未指定なら `camera.front` に従う
    #[serde(default)]
    pub mirror_x: Option<bool>,
    /// Y軸を反転。未指定なら `camera.front` に従う
    #[serde(default)]
    pub mirror_y: Option<bool>,
}

fn default_skip_count() -> usize { 5 }

impl MapperConfig {
    /// フロントカメラは鏡像なので既定で両軸反転
    pub fn mirror(&self, front: bool) -> MirrorAxes {
        MirrorAxes {
            x: self.mirror_x.unwrap_or(front),
            y: self.mirror_y.unwrap_or(front),
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            skip_count: default_skip_count(),
            mirror_x: None,
            mirror_y: None,
        }
    }
}

/// 描画先デバイスの画面サイズ（論理ピクセル）
#[derive(Debug, Deserialize, Clone)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: f32,
    #[serde(default = "default_screen_height")]
    pub height: f32,
}

fn default_screen_width() -> f32 { 423.0 }
fn default_screen_height() -> f32 { 883.137_3 }

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// これ未満の信頼度の点は描かない
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// モデル入力サイズの枠を描く
    #[serde(default = "default_true")]
    pub reference_border: bool,
    #[serde(default = "default_point_radius")]
    pub point_radius: i32,
    /// カメラ映像を背景に描く
    #[serde(default = "default_true")]
    pub preview: bool,
}

fn default_confidence_threshold() -> f32 { 0.3 }
fn default_point_radius() -> i32 { 5 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            reference_border: default_true(),
            point_radius: default_point_radius(),
            preview: default_true(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// 読めなければ既定値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// 起動時に一度だけ行うジオメトリ検査
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        if model.input_width == 0 || model.input_height == 0 {
            return Err(PipelineError::invalid_geometry(format!(
                "model input {}x{}",
                model.input_width, model.input_height
            )));
        }
        if model.channels != 3 {
            return Err(PipelineError::invalid_geometry(format!(
                "model expects {} channels, only RGB is produced",
                model.channels
            )));
        }
        let screen = &self.screen;
        if !(screen.width.is_finite() && screen.height.is_finite())
            || screen.width <= 0.0
            || screen.height <= 0.0
        {
            return Err(PipelineError::invalid_geometry(format!(
                "screen {}x{}",
                screen.width, screen.height
            )));
        }
        if let Some(crop) = &self.transform.crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(PipelineError::invalid_geometry(format!(
                    "empty crop {}x{}",
                    crop.width, crop.height
                )));
            }
        }
        Ok(())
    }
}
