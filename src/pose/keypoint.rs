/// MoveNet の 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    /// 顔グループ（鼻・目・耳）の点数
    pub const FACE_COUNT: usize = 5;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            _ => None,
        }
    }
}

/// 画面座標系の単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// X座標（画面ピクセル）
    pub x: f32,
    /// Y座標（画面ピクセル）
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)。パイプラインでは閾値処理しない
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// 描画用の整数ピクセル座標
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// 1フレーム分のキーポイント列（モデル出力順）
///
/// 不正なタプルはマッパーで除かれるので、各点のモデル上の番号も保持する。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointSet {
    keypoints: Vec<Keypoint>,
    indices: Vec<usize>,
}

impl KeypointSet {
    /// 連番のキーポイント列から作る。`first_index` は先頭点のモデル上の番号
    pub fn new(keypoints: Vec<Keypoint>, first_index: usize) -> Self {
        let indices = (first_index..first_index + keypoints.len()).collect();
        Self { keypoints, indices }
    }

    /// (モデル上の番号, 点) の列から作る。番号は昇順であること
    pub fn from_indexed(points: Vec<(usize, Keypoint)>) -> Self {
        let (indices, keypoints) = points.into_iter().unzip();
        Self { keypoints, indices }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter()
    }

    /// (モデル上の番号, 点) を順に返す
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &Keypoint)> {
        self.indices.iter().copied().zip(self.keypoints.iter())
    }

    /// 名前でキーポイントを取得。スキップされた・欠落した点は None
    pub fn get(&self, index: KeypointIndex) -> Option<&Keypoint> {
        self.indices
            .binary_search(&(index as usize))
            .ok()
            .map(|i| &self.keypoints[i])
    }

    /// 閾値以上の点のみ
    pub fn visible(&self, threshold: f32) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter().filter(move |k| k.is_valid(threshold))
    }
}
