use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// キャプチャデバイスが渡すピクセルフォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// パック RGB (3 bytes/pixel)
    Rgb8,
    /// パック BGR (3 bytes/pixel, OpenCV の既定)
    Bgr8,
    /// パック RGBA (4 bytes/pixel)
    Rgba8,
    /// パック BGRA (4 bytes/pixel)
    Bgra8,
    /// 輝度のみ (1 byte/pixel)
    Gray8,
    /// Y プレーン + UV インターリーブ (4:2:0)
    Nv12,
    /// Y プレーン + VU インターリーブ (4:2:0, Android 既定)
    Nv21,
    /// Y / U / V の3プレーン (4:2:0)
    I420,
    /// 圧縮フレーム（変換不可）
    Mjpeg,
}

impl PixelFormat {
    /// 指定サイズのフレームに必要なバイト数。圧縮フォーマットは None
    pub fn buffer_size(&self, width: u32, height: u32) -> Option<usize> {
        let w = width as usize;
        let h = height as usize;
        let chroma = chroma_width(width) * chroma_height(height);
        match self {
            Self::Rgb8 | Self::Bgr8 => Some(w * h * 3),
            Self::Rgba8 | Self::Bgra8 => Some(w * h * 4),
            Self::Gray8 => Some(w * h),
            Self::Nv12 | Self::Nv21 | Self::I420 => Some(w * h + chroma * 2),
            Self::Mjpeg => None,
        }
    }
}

/// 4:2:0 の色差プレーン幅（奇数幅は切り上げ）
pub(crate) fn chroma_width(width: u32) -> usize {
    (width as usize + 1) / 2
}

pub(crate) fn chroma_height(height: u32) -> usize {
    (height as usize + 1) / 2
}

/// 1回の処理呼び出しの間だけ有効なフレーム
///
/// バッファは借用なので、処理関数の外へ持ち出せない。
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// フォーマットが変換可能で、バッファが宣言サイズを満たすか検査
    pub fn validate(&self) -> Result<()> {
        let Some(expected) = self.format.buffer_size(self.width, self.height) else {
            return Err(PipelineError::UnsupportedFormat(self.format));
        };
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::invalid_geometry(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.data.len() < expected {
            return Err(PipelineError::invalid_geometry(format!(
                "{:?} frame {}x{} needs {} bytes, got {}",
                self.format,
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// キャプチャスレッドから処理スレッドへ渡す所有フレーム
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn as_frame(&self) -> Frame<'_> {
        Frame::new(self.width, self.height, self.format, &self.data)
    }
}
