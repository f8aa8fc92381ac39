use crate::config::{ModelConfig, RenderConfig};
use crate::pose::KeypointSet;

use super::skeleton::SKELETON_CONNECTIONS;

/// 基準枠の左上オフセット
const BORDER_OFFSET: i32 = 2;

/// 描画上の矩形（画面ピクセル）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// 描画側の判断（閾値・半径・基準枠）
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub confidence_threshold: f32,
    pub point_radius: i32,
    pub border: Option<BorderRect>,
}

impl OverlayStyle {
    /// 基準枠はモデル入力サイズで描く
    pub fn from_config(render: &RenderConfig, model: &ModelConfig) -> Self {
        let border = render.reference_border.then(|| BorderRect {
            x: BORDER_OFFSET,
            y: BORDER_OFFSET,
            width: model.input_width as i32,
            height: model.input_height as i32,
        });
        Self {
            confidence_threshold: render.confidence_threshold,
            point_radius: render.point_radius,
            border,
        }
    }

    /// 閾値以上の点のピクセル座標
    pub fn points(&self, set: &KeypointSet) -> Vec<(i32, i32)> {
        set.visible(self.confidence_threshold)
            .map(|kp| kp.to_pixel())
            .collect()
    }

    /// 両端が閾値以上の骨格線
    pub fn segments(&self, set: &KeypointSet) -> Vec<((i32, i32), (i32, i32))> {
        SKELETON_CONNECTIONS
            .iter()
            .filter_map(|(start, end)| {
                let a = set.get(*start)?;
                let b = set.get(*end)?;
                (a.is_valid(self.confidence_threshold) && b.is_valid(self.confidence_threshold))
                    .then(|| (a.to_pixel(), b.to_pixel()))
            })
            .collect()
    }
}

/// 線分上のピクセル列。長い方の軸に沿って1ピクセルずつ補間する
///
/// 端点は画面の1ピクセル外側までに寄せるので、極端な座標でも歩数は画面サイズで抑えられる。
pub fn line_pixels(
    from: (i32, i32),
    to: (i32, i32),
    width: usize,
    height: usize,
) -> impl Iterator<Item = (i32, i32)> {
    let max_x = width.min(i32::MAX as usize) as i32;
    let max_y = height.min(i32::MAX as usize) as i32;
    let clamp = |(x, y): (i32, i32)| (x.clamp(-1, max_x), y.clamp(-1, max_y));
    let (x0, y0) = clamp(from);
    let (x1, y1) = clamp(to);

    let steps = (x1 - x0).abs().max((y1 - y0).abs());
    let (dx, dy) = if steps == 0 {
        (0.0, 0.0)
    } else {
        ((x1 - x0) as f32 / steps as f32, (y1 - y0) as f32 / steps as f32)
    };
    (0..=steps).map(move |i| {
        let x = x0 as f32 + dx * i as f32;
        let y = y0 as f32 + dy * i as f32;
        (x.round() as i32, y.round() as i32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KeypointIndex};

    fn style(threshold: f32) -> OverlayStyle {
        OverlayStyle {
            confidence_threshold: threshold,
            point_radius: 5,
            border: None,
        }
    }

    #[test]
    fn test_points_filtered_by_confidence() {
        let set = KeypointSet::new(
            vec![
                Keypoint::new(10.0, 10.0, 0.9),
                Keypoint::new(20.0, 20.0, 0.1),
                Keypoint::new(30.4, 30.6, 0.5),
            ],
            5,
        );
        assert_eq!(style(0.3).points(&set), vec![(10, 10), (30, 31)]);
        assert_eq!(style(0.0).points(&set).len(), 3);
    }

    #[test]
    fn test_segments_need_both_ends() {
        let mut points = vec![Keypoint::new(0.0, 0.0, 0.0); 12];
        points[0] = Keypoint::new(1.0, 1.0, 0.9); // LeftShoulder
        points[1] = Keypoint::new(5.0, 1.0, 0.9); // RightShoulder
        points[2] = Keypoint::new(1.0, 5.0, 0.1); // LeftElbow
        let set = KeypointSet::new(points, KeypointIndex::LeftShoulder as usize);

        let segments = style(0.3).segments(&set);
        assert_eq!(segments, vec![((1, 1), (5, 1))]);
    }

    #[test]
    fn test_line_pixels_endpoints() {
        let points: Vec<_> = line_pixels((0, 0), (4, 2), 10, 10).collect();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], (0, 0));
        assert_eq!(points[4], (4, 2));
        assert_eq!(line_pixels((3, 3), (3, 3), 10, 10).count(), 1);
    }

    #[test]
    fn test_line_pixels_far_outside_is_bounded() {
        // 信頼度の低い点が画面外の極端な座標に落ちた場合
        let points: Vec<_> = line_pixels((i32::MIN, 0), (i32::MAX, 5), 100, 10).collect();
        assert!(points.len() <= 103);
        assert!(points.iter().all(|&(x, y)| (-1..=100).contains(&x) && (-1..=10).contains(&y)));

        let far: Vec<_> = line_pixels((i32::MAX, i32::MAX), (i32::MIN, i32::MIN), 423, 883).collect();
        assert!(far.len() <= 886);
    }

    #[test]
    fn test_border_from_config() {
        let style = OverlayStyle::from_config(&RenderConfig::default(), &ModelConfig::default());
        assert_eq!(
            style.border,
            Some(BorderRect { x: 2, y: 2, width: 256, height: 256 })
        );

        let render = RenderConfig {
            reference_border: false,
            ..RenderConfig::default()
        };
        assert!(OverlayStyle::from_config(&render, &ModelConfig::default()).border.is_none());
    }
}
