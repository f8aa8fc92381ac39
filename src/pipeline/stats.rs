use std::time::{Duration, Instant};

/// 1フレーム分の段階別処理時間
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTimings {
    pub transform: Duration,
    pub inference: Duration,
    pub mapping: Duration,
}

impl FrameTimings {
    pub fn total(&self) -> Duration {
        self.transform + self.inference + self.mapping
    }

    /// 合計を n フレームで割った平均。n = 0 なら 0
    fn per_frame(&self, n: u64) -> FrameTimings {
        let div = |d: Duration| match n {
            0 => Duration::ZERO,
            n => Duration::from_nanos((d.as_nanos() / n as u128).min(u64::MAX as u128) as u64),
        };
        FrameTimings {
            transform: div(self.transform),
            inference: div(self.inference),
            mapping: div(self.mapping),
        }
    }
}

/// パイプラインの累積カウンタ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// 推論まで完了したフレーム
    pub processed: u64,
    /// publish できたフレーム
    pub published: u64,
    /// モデル未ロードでスキップ
    pub skipped_not_loaded: u64,
    /// 変換・推論エラーで破棄
    pub failed: u64,
    /// 処理が追いつかず上書きされたキャプチャフレーム
    pub frames_dropped: u64,
    total: FrameTimings,
}

impl PipelineStats {
    pub fn record(&mut self, timings: &FrameTimings) {
        self.processed += 1;
        self.total.transform += timings.transform;
        self.total.inference += timings.inference;
        self.total.mapping += timings.mapping;
    }

    /// 処理済みフレームの平均時間
    pub fn average(&self) -> FrameTimings {
        self.total.per_frame(self.processed)
    }
}

/// 1秒ごとにFPSと段階別平均を集計する
pub struct ThroughputMeter {
    started: Instant,
    frames: u32,
    sum: FrameTimings,
}

/// 集計結果
#[derive(Debug, Clone, Copy)]
pub struct Throughput {
    pub fps: f32,
    pub average: FrameTimings,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            frames: 0,
            sum: FrameTimings::default(),
        }
    }

    /// 1フレーム記録。集計期間が過ぎていれば結果を返してリセット
    pub fn tick(&mut self, timings: &FrameTimings) -> Option<Throughput> {
        self.frames += 1;
        self.sum.transform += timings.transform;
        self.sum.inference += timings.inference;
        self.sum.mapping += timings.mapping;

        let elapsed = self.started.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let result = Throughput {
            fps: self.frames as f32 / elapsed.as_secs_f32(),
            average: self.sum.per_frame(self.frames as u64),
        };
        *self = Self::new();
        Some(result)
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
