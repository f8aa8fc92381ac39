use image::{Rgb, RgbImage};
use ndarray::Array4;
use serde::Deserialize;

use crate::camera::frame::{chroma_height, chroma_width};
use crate::camera::{Frame, PixelFormat};
use crate::config::{ModelConfig, TransformConfig};
use crate::error::{PipelineError, Result};

/// クロップ領域（ソースフレームのピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// フレーム内に収まっているか
    pub fn check_within(&self, width: u32, height: u32) -> Result<()> {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        if self.width == 0 || self.height == 0 || right > width as u64 || bottom > height as u64 {
            return Err(PipelineError::invalid_geometry(format!(
                "crop {}x{}+{}+{} outside frame {}x{}",
                self.width, self.height, self.x, self.y, width, height
            )));
        }
        Ok(())
    }
}

/// リサンプリングフィルタ。どちらも決定的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    #[default]
    Nearest,
    Bilinear,
}

/// モデル入力用のパック RGB (u8) バッファ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TransformedBuffer {
    pub const CHANNELS: u32 = 3;

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// (x, y) の RGB 値
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * self.width + x) * Self::CHANNELS) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// [1, H, W, 3] の NHWC テンソルに変換
    pub fn to_tensor(&self) -> Array4<u8> {
        let shape = (1, self.height as usize, self.width as usize, 3);
        Array4::from_shape_vec(shape, self.data.clone())
            .unwrap_or_else(|_| Array4::zeros(shape))
    }
}

/// キャプチャフレームをモデル入力形状へ変換する
///
/// - クロップ（既定はフレーム全体）
/// - W×H にリサイズ
/// - 色変換（YUV 4:2:0 / BGR / RGBA など → パック RGB）
///
/// 出力画素ごとに必要なソース画素だけを読んで変換する。
/// ソース全体の RGB 画像は作らない。
#[derive(Debug, Clone)]
pub struct FrameTransform {
    target_width: u32,
    target_height: u32,
    crop: Option<CropRect>,
    filter: ResizeFilter,
}

impl FrameTransform {
    pub fn new(target_width: u32, target_height: u32) -> Result<Self> {
        if target_width == 0 || target_height == 0 {
            return Err(PipelineError::invalid_geometry(format!(
                "target size {}x{}",
                target_width, target_height
            )));
        }
        Ok(Self {
            target_width,
            target_height,
            crop: None,
            filter: ResizeFilter::default(),
        })
    }

    pub fn from_config(model: &ModelConfig, transform: &TransformConfig) -> Result<Self> {
        let mut t = Self::new(model.input_width, model.input_height)?.with_filter(transform.filter);
        if let Some(crop) = transform.crop {
            t = t.with_crop(crop);
        }
        Ok(t)
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn apply(&self, frame: &Frame<'_>) -> Result<TransformedBuffer> {
        frame.validate()?;
        let crop = self
            .crop
            .unwrap_or_else(|| CropRect::full(frame.width, frame.height));
        crop.check_within(frame.width, frame.height)?;

        let sampler = Sampler::new(frame)?;
        let (tw, th) = (self.target_width, self.target_height);

        let image = match self.filter {
            ResizeFilter::Nearest => {
                let xs = nearest_indices(crop.x, crop.width, tw);
                let ys = nearest_indices(crop.y, crop.height, th);
                RgbImage::from_fn(tw, th, |x, y| {
                    Rgb(sampler.rgb(xs[x as usize], ys[y as usize]))
                })
            }
            ResizeFilter::Bilinear => {
                let xs = linear_taps(crop.x, crop.width, tw);
                let ys = linear_taps(crop.y, crop.height, th);
                RgbImage::from_fn(tw, th, |x, y| {
                    Rgb(sampler.bilinear(&xs[x as usize], &ys[y as usize]))
                })
            }
        };

        Ok(TransformedBuffer {
            width: tw,
            height: th,
            data: image.into_raw(),
        })
    }
}

/// 出力画素の中心に最も近いソース画素 floor((o + 0.5) * src / dst)
fn nearest_indices(start: u32, src: u32, dst: u32) -> Vec<usize> {
    let (src, dst) = (src as u64, dst as u64);
    (0..dst)
        .map(|o| (start as u64 + (2 * o + 1) * src / (2 * dst)) as usize)
        .collect()
}

/// 線形補間の2タップ（中心合わせ、端はクランプ）
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    lo: usize,
    hi: usize,
    t: f32,
}

fn linear_taps(start: u32, src: u32, dst: u32) -> Vec<Tap> {
    let scale = src as f32 / dst as f32;
    let last = src as usize - 1;
    (0..dst)
        .map(|o| {
            let s = ((o as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (s.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            Tap {
                lo: start as usize + lo,
                hi: start as usize + hi,
                t: s - lo as f32,
            }
        })
        .collect()
}

/// BT.601 limited range の整数近似
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clip = |x: i32| x.clamp(0, 255) as u8;
    [
        clip((298 * c + 409 * e + 128) >> 8),
        clip((298 * c - 100 * d - 208 * e + 128) >> 8),
        clip((298 * c + 516 * d + 128) >> 8),
    ]
}

/// 検証済みフレームから1画素ずつ RGB を読む
struct Sampler<'a> {
    format: PixelFormat,
    width: usize,
    luma_size: usize,
    chroma_stride: usize,
    chroma_plane: usize,
    data: &'a [u8],
}

impl<'a> Sampler<'a> {
    fn new(frame: &Frame<'a>) -> Result<Self> {
        if frame.format == PixelFormat::Mjpeg {
            return Err(PipelineError::UnsupportedFormat(frame.format));
        }
        let width = frame.width as usize;
        let chroma_stride = chroma_width(frame.width);
        Ok(Self {
            format: frame.format,
            width,
            luma_size: width * frame.height as usize,
            chroma_stride,
            chroma_plane: chroma_stride * chroma_height(frame.height),
            data: frame.data,
        })
    }

    #[inline]
    fn rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let d = self.data;
        let i = y * self.width + x;
        match self.format {
            PixelFormat::Rgb8 => [d[i * 3], d[i * 3 + 1], d[i * 3 + 2]],
            PixelFormat::Bgr8 => [d[i * 3 + 2], d[i * 3 + 1], d[i * 3]],
            PixelFormat::Rgba8 => [d[i * 4], d[i * 4 + 1], d[i * 4 + 2]],
            PixelFormat::Bgra8 => [d[i * 4 + 2], d[i * 4 + 1], d[i * 4]],
            PixelFormat::Gray8 => [d[i]; 3],
            PixelFormat::Nv12 | PixelFormat::Nv21 => {
                let c = self.luma_size + (y / 2) * self.chroma_stride * 2 + (x / 2) * 2;
                let (u, v) = if self.format == PixelFormat::Nv21 {
                    (d[c + 1], d[c])
                } else {
                    (d[c], d[c + 1])
                };
                yuv_to_rgb(d[i], u, v)
            }
            PixelFormat::I420 => {
                let c = self.luma_size + (y / 2) * self.chroma_stride + x / 2;
                yuv_to_rgb(d[i], d[c], d[c + self.chroma_plane])
            }
            // new で弾いている
            PixelFormat::Mjpeg => [0; 3],
        }
    }

    fn bilinear(&self, tx: &Tap, ty: &Tap) -> [u8; 3] {
        let p00 = self.rgb(tx.lo, ty.lo);
        let p10 = self.rgb(tx.hi, ty.lo);
        let p01 = self.rgb(tx.lo, ty.hi);
        let p11 = self.rgb(tx.hi, ty.hi);
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        std::array::from_fn(|c| {
            let top = lerp(p00[c] as f32, p10[c] as f32, tx.t);
            let bottom = lerp(p01[c] as f32, p11[c] as f32, tx.t);
            lerp(top, bottom, ty.t).round().clamp(0.0, 255.0) as u8
        })
    }
}
