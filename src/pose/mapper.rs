use super::keypoint::{Keypoint, KeypointSet};
use crate::config::Config;
use crate::error::{PipelineError, Result};

/// 1キーポイントあたりの値の数 (y, x, confidence)
pub const VALUES_PER_KEYPOINT: usize = 3;

/// 軸反転の設定
///
/// フロントカメラは鏡像なので両軸反転、リアカメラは反転なし。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorAxes {
    pub x: bool,
    pub y: bool,
}

impl MirrorAxes {
    pub const BOTH: Self = Self { x: true, y: true };
    pub const NONE: Self = Self { x: false, y: false };
}

/// 描画先の画面サイズ（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// 正規化座標の出力ベクトルを画面座標のキーポイント列へ変換する
#[derive(Debug, Clone)]
pub struct KeypointMapper {
    skip_count: usize,
    mirror: MirrorAxes,
    screen: ScreenSize,
}

impl KeypointMapper {
    /// 画面サイズが 0 以下・非有限なら `InvalidGeometry`
    pub fn new(skip_count: usize, mirror: MirrorAxes, screen: ScreenSize) -> Result<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(screen.width) || !valid(screen.height) {
            return Err(PipelineError::invalid_geometry(format!(
                "screen {}x{}",
                screen.width, screen.height
            )));
        }
        Ok(Self {
            skip_count,
            mirror,
            screen,
        })
    }

    /// 反転は `mapper.mirror_*`、未指定なら `camera.front` から決まる
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.mapper.skip_count,
            config.mapper.mirror(config.camera.front),
            ScreenSize::new(config.screen.width, config.screen.height),
        )
    }

    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// 先頭から捨てる値の数
    pub fn skip_offset(&self) -> usize {
        self.skip_count * VALUES_PER_KEYPOINT
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn mirror(&self) -> MirrorAxes {
        self.mirror
    }

    /// 出力ベクトルを (rawY, rawX, confidence) の3つ組に分け、画面座標へ射影
    ///
    /// 末尾の半端な値と、非有限値を含む組は捨てる。順序はモデル出力順のまま。
    pub fn map(&self, output: &[f32]) -> KeypointSet {
        let tuples = output.get(self.skip_offset()..).unwrap_or(&[]);
        let points = tuples
            .chunks_exact(VALUES_PER_KEYPOINT)
            .enumerate()
            .filter_map(|(i, t)| {
                self.project(t[0], t[1], t[2])
                    .map(|kp| (self.skip_count + i, kp))
            })
            .collect();
        KeypointSet::from_indexed(points)
    }

    fn project(&self, raw_y: f32, raw_x: f32, confidence: f32) -> Option<Keypoint> {
        if !(raw_y.is_finite() && raw_x.is_finite() && confidence.is_finite()) {
            return None;
        }
        let nx = if self.mirror.x { 1.0 - raw_x } else { raw_x };
        let ny = if self.mirror.y { 1.0 - raw_y } else { raw_y };
        Some(Keypoint::new(
            nx * self.screen.width,
            ny * self.screen.height,
            confidence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::KeypointIndex;

    fn mapper(skip: usize, mirror: MirrorAxes) -> KeypointMapper {
        KeypointMapper::new(skip, mirror, ScreenSize::new(400.0, 800.0)).unwrap()
    }

    #[test]
    fn test_tuple_count_with_remainder() {
        let m = mapper(2, MirrorAxes::BOTH);
        for k in 0..6 {
            for r in 0..3 {
                let output = vec![0.5f32; 3 * k + m.skip_offset() + r];
                assert_eq!(m.map(&output).len(), k, "k={} r={}", k, r);
            }
        }
    }

    #[test]
    fn test_under_length_is_empty() {
        let m = mapper(5, MirrorAxes::BOTH);
        assert!(m.map(&[]).is_empty());
        assert!(m.map(&[0.1; 14]).is_empty());
        assert!(m.map(&[0.1; 17]).is_empty());
        assert_eq!(m.map(&[0.1; 18]).len(), 1);
    }

    #[test]
    fn test_mirrored_corners() {
        let m = mapper(0, MirrorAxes::BOTH);
        let set = m.map(&[0.0, 0.0, 0.25, 1.0, 1.0, 0.75]);
        assert_eq!(set.keypoints()[0], Keypoint::new(400.0, 800.0, 0.25));
        assert_eq!(set.keypoints()[1], Keypoint::new(0.0, 0.0, 0.75));
    }

    #[test]
    fn test_unmirrored() {
        let m = mapper(0, MirrorAxes::NONE);
        // (rawY, rawX, conf)
        let set = m.map(&[0.25, 0.5, 0.9]);
        assert_eq!(set.keypoints()[0], Keypoint::new(200.0, 200.0, 0.9));
    }

    #[test]
    fn test_single_axis_mirror() {
        let m = mapper(0, MirrorAxes { x: true, y: false });
        let set = m.map(&[0.25, 0.25, 1.0]);
        assert_eq!(set.keypoints()[0], Keypoint::new(300.0, 200.0, 1.0));
    }

    #[test]
    fn test_confidence_passes_through() {
        let m = mapper(0, MirrorAxes::BOTH);
        let set = m.map(&[0.1, 0.2, 0.0, 0.3, 0.4, 1.0, 0.5, 0.6, 0.123]);
        let conf: Vec<f32> = set.iter().map(|k| k.confidence).collect();
        assert_eq!(conf, vec![0.0, 1.0, 0.123]);
    }

    #[test]
    fn test_non_finite_tuple_dropped() {
        let m = mapper(0, MirrorAxes::BOTH);
        let set = m.map(&[0.1, 0.1, 0.9, f32::NAN, 0.2, 0.8, 0.3, 0.3, 0.7]);
        assert_eq!(set.len(), 2);
        // 順序は保たれ、番号も飛ぶ
        let indices: Vec<usize> = set.iter_indexed().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_skip_keeps_model_indices() {
        let m = mapper(KeypointIndex::FACE_COUNT, MirrorAxes::BOTH);
        let output = vec![0.5f32; KeypointIndex::COUNT * 3];
        let set = m.map(&output);
        assert_eq!(set.len(), 12);
        assert!(set.get(KeypointIndex::Nose).is_none());
        assert!(set.get(KeypointIndex::RightAnkle).is_some());
    }

    #[test]
    fn test_order_preserved() {
        let m = mapper(0, MirrorAxes::NONE);
        let set = m.map(&[0.0, 0.9, 0.1, 0.0, 0.1, 0.9]);
        assert!(set.keypoints()[0].x > set.keypoints()[1].x);
    }

    #[test]
    fn test_zero_screen_rejected() {
        for (w, h) in [(0.0, 883.0), (423.0, 0.0), (-1.0, 10.0), (f32::NAN, 10.0)] {
            let result = KeypointMapper::new(0, MirrorAxes::BOTH, ScreenSize::new(w, h));
            assert!(matches!(result, Err(PipelineError::InvalidGeometry(_))));
        }
    }

    #[test]
    fn test_from_config_follows_camera_facing() {
        let mut config = Config::default();
        assert_eq!(KeypointMapper::from_config(&config).unwrap().mirror(), MirrorAxes::BOTH);

        config.camera.front = false;
        let m = KeypointMapper::from_config(&config).unwrap();
        assert_eq!(m.mirror(), MirrorAxes::NONE);
        let set = m.map(&[0.0; 15].iter().copied().chain([0.25, 0.75, 0.9]).collect::<Vec<_>>());
        assert!((set.keypoints()[0].x - 0.75 * config.screen.width).abs() < 1e-3);
    }
}
