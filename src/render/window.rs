use anyhow::Result;
use minifb::{Key, Window, WindowOptions};

use crate::pose::{KeypointSet, MirrorAxes, TransformedBuffer};
use crate::render::overlay::{line_pixels, BorderRect, OverlayStyle};
use crate::render::skeleton::{BORDER_COLOR, KEYPOINT_COLOR, PLACEHOLDER_COLOR, SKELETON_COLOR};

/// 基準枠の線幅
const BORDER_WIDTH: i32 = 5;

/// minifbを使用したレンダラー
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;
        window.set_target_fps(fps);

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn clear(&mut self, color: u32) {
        self.buffer.fill(color);
    }

    /// カメラ未接続・権限なしの表示（灰色地に×印）
    pub fn draw_placeholder(&mut self) {
        self.clear(PLACEHOLDER_COLOR);
        let (w, h) = (self.width as i32 - 1, self.height as i32 - 1);
        self.draw_line(0, 0, w, h, KEYPOINT_COLOR);
        self.draw_line(w, 0, 0, h, KEYPOINT_COLOR);
    }

    /// ウィンドウサイズに変換済みの RGB バッファを背景として描画
    ///
    /// キーポイントと同じ向きになるよう反転する。
    pub fn draw_preview(&mut self, preview: &TransformedBuffer, mirror: MirrorAxes) {
        let pw = preview.width() as usize;
        let ph = preview.height() as usize;
        for y in 0..self.height.min(ph) {
            let sy = if mirror.y { ph - 1 - y } else { y };
            for x in 0..self.width.min(pw) {
                let sx = if mirror.x { pw - 1 - x } else { x };
                let [r, g, b] = preview.pixel(sx as u32, sy as u32);
                self.buffer[y * self.width + x] = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            }
        }
    }

    /// キーポイント・骨格線・基準枠を描画
    pub fn draw_keypoints(&mut self, set: &KeypointSet, style: &OverlayStyle) {
        for ((x1, y1), (x2, y2)) in style.segments(set) {
            self.draw_line(x1, y1, x2, y2, SKELETON_COLOR);
        }
        for (px, py) in style.points(set) {
            self.draw_circle(px, py, style.point_radius, KEYPOINT_COLOR);
        }
    }

    pub fn draw_border(&mut self, rect: &BorderRect) {
        for i in 0..BORDER_WIDTH {
            let (x0, y0) = (rect.x - BORDER_WIDTH / 2 + i, rect.y - BORDER_WIDTH / 2 + i);
            let (x1, y1) = (
                rect.x + rect.width + BORDER_WIDTH / 2 - i,
                rect.y + rect.height + BORDER_WIDTH / 2 - i,
            );
            self.draw_line(x0, y0, x1, y0, BORDER_COLOR);
            self.draw_line(x1, y0, x1, y1, BORDER_COLOR);
            self.draw_line(x1, y1, x0, y1, BORDER_COLOR);
            self.draw_line(x0, y1, x0, y0, BORDER_COLOR);
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        for (x, y) in line_pixels((x0, y0), (x1, y1), self.width, self.height) {
            self.set_pixel(x, y, color);
        }
    }

    /// 塗りつぶし円。行ごとに横幅を求めて埋める
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        let visible = |c: i32, size: usize| {
            c >= -radius && (c as i64) <= size as i64 + radius as i64
        };
        if !visible(cx, self.width) || !visible(cy, self.height) {
            return;
        }
        let r2 = (radius * radius) as f32;
        for dy in -radius..=radius {
            let half = (r2 - (dy * dy) as f32).sqrt() as i32;
            for x in cx - half..=cx + half {
                self.set_pixel(x, cy + dy, color);
            }
        }
    }

    /// 画面外は無視
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        if x < self.width && y < self.height {
            self.buffer[y * self.width + x] = color;
        }
    }
}
