use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

use super::frame::{chroma_height, chroma_width, CapturedFrame, PixelFormat};
use super::FrameSource;

/// テスト・ベンチマーク用の決定的なフレーム生成器
///
/// 横方向に R、縦方向に G のグラデーションを描き、フレームごとに B を進める。
pub struct SyntheticSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    counter: u64,
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            counter: 0,
            interval: None,
            last: None,
        }
    }

    /// キャプチャデバイスのようにFPSでペースを取る
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        self
    }

    /// 指定番号のフレームを生成（ペース制御なし）
    pub fn frame_at(&self, index: u64) -> CapturedFrame {
        let w = self.width as usize;
        let h = self.height as usize;
        let blue = (index % 256) as u8;
        let r_at = |x: usize| ((x * 255) / w.max(1)) as u8;
        let g_at = |y: usize| ((y * 255) / h.max(1)) as u8;

        let data = match self.format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 | PixelFormat::Rgba8 | PixelFormat::Bgra8 => {
                let bgr = matches!(self.format, PixelFormat::Bgr8 | PixelFormat::Bgra8);
                let alpha = matches!(self.format, PixelFormat::Rgba8 | PixelFormat::Bgra8);
                let mut data = Vec::with_capacity(w * h * if alpha { 4 } else { 3 });
                for y in 0..h {
                    for x in 0..w {
                        let (r, g, b) = (r_at(x), g_at(y), blue);
                        if bgr {
                            data.extend_from_slice(&[b, g, r]);
                        } else {
                            data.extend_from_slice(&[r, g, b]);
                        }
                        if alpha {
                            data.push(255);
                        }
                    }
                }
                data
            }
            PixelFormat::Gray8 => (0..h)
                .flat_map(|y| (0..w).map(move |x| ((x + y + index as usize) % 256) as u8))
                .collect(),
            PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 => {
                let chroma = chroma_width(self.width) * chroma_height(self.height);
                let mut data = Vec::with_capacity(w * h + chroma * 2);
                for y in 0..h {
                    for x in 0..w {
                        data.push(16 + ((x + y + index as usize) % 220) as u8);
                    }
                }
                data.extend(std::iter::repeat(128u8).take(chroma * 2));
                data
            }
            PixelFormat::Mjpeg => vec![0xFF, 0xD8, 0xFF, 0xD9],
        };

        CapturedFrame::new(self.width, self.height, self.format, data)
    }
}

impl FrameSource for SyntheticSource {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());

        let frame = self.frame_at(self.counter);
        self.counter += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_match_declared_size() {
        for format in [
            PixelFormat::Rgb8,
            PixelFormat::Bgra8,
            PixelFormat::Gray8,
            PixelFormat::Nv12,
            PixelFormat::I420,
        ] {
            let source = SyntheticSource::new(33, 17, format);
            let frame = source.frame_at(0);
            assert_eq!(Some(frame.data.len()), format.buffer_size(33, 17), "{:?}", format);
        }
    }

    #[test]
    fn test_frames_are_deterministic() {
        let source = SyntheticSource::new(64, 36, PixelFormat::Rgb8);
        assert_eq!(source.frame_at(5).data, source.frame_at(5).data);
        assert_ne!(source.frame_at(5).data, source.frame_at(6).data);
    }

    #[test]
    fn test_next_frame_advances() {
        let mut source = SyntheticSource::new(8, 8, PixelFormat::Rgb8);
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.data, source.frame_at(0).data);
        assert_eq!(second.data, source.frame_at(1).data);
        assert_eq!(source.resolution(), (8, 8));
    }
}
