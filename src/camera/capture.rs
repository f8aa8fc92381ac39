use anyhow::{Context, Result};
use log::info;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};

use super::frame::{CapturedFrame, PixelFormat};
use super::FrameSource;
use crate::config::CameraConfig;

/// OpenCVを使用したカメラキャプチャ（BGRフレームを返す）
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    pub fn from_config(config: &CameraConfig) -> Result<Self> {
        Self::open_with_config(
            config.index,
            Some(config.width),
            Some(config.height),
            Some(config.fps),
        )
    }

    /// 解像度とFPSを指定してカメラを開く
    pub fn open_with_config(
        index: i32,
        width: Option<u32>,
        height: Option<u32>,
        fps: Option<u32>,
    ) -> Result<Self> {
        let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        if let Some(f) = fps {
            capture.set(videoio::CAP_PROP_FPS, f as f64)?;
        }
        // ドライバ側にフレームを溜めない
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS)?;
        info!(
            "camera {}: {}x{} @ {} fps",
            index, actual_width, actual_height, actual_fps
        );

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    /// フレームを読み込む（BGR形式）
    pub fn read_frame(&mut self) -> Result<CapturedFrame> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        // ROI等で非連続の場合はコピーして詰める
        let frame = if frame.is_continuous() {
            frame
        } else {
            frame.try_clone()?
        };

        // ネゴシエーション結果と違うサイズが来ても、実際のサイズで渡す
        let width = frame.cols() as u32;
        let height = frame.rows() as u32;
        let data = frame.data_bytes()?.to_vec();

        Ok(CapturedFrame::new(width, height, PixelFormat::Bgr8, data))
    }
}

impl FrameSource for OpenCvCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        self.read_frame()
    }
}
