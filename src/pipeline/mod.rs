//! Per-frame processing: transform, inference, mapping, publish.
//!
//! Every step of one frame runs synchronously on the calling thread.
//! A frame that fails anywhere is abandoned and the previously published
//! keypoint set stays visible.

pub mod runner;
pub mod stats;

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::camera::Frame;
use crate::error::PipelineError;
use crate::pose::{
    check_output, FrameTransform, InferenceEngine, KeypointMapper, KeypointSet, PoseDetector,
};
use crate::publish::Publisher;

pub use runner::ProcessingThread;
pub use stats::{FrameTimings, PipelineStats, Throughput, ThroughputMeter};

/// カメラ無効化などのライフサイクル終了を伝えるフラグ
#[derive(Debug, Clone)]
pub struct Lifecycle {
    active: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 以後の処理呼び出しを no-op にする
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// 1フレーム処理の結果
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// 新しいキーポイント列を publish した
    Published {
        keypoints: usize,
        timings: FrameTimings,
    },
    /// モデル未ロード。フレームごとスキップ
    ModelNotLoaded,
    /// 変換・推論の失敗。前回の結果を表示し続ける
    Failed(&'static str),
    /// 描画側が既に無い
    ReceiverClosed,
    /// ライフサイクル終了後の呼び出し
    Inactive,
}

pub struct FramePipeline<E> {
    transform: FrameTransform,
    detector: PoseDetector<E>,
    mapper: KeypointMapper,
    publisher: Publisher<KeypointSet>,
    lifecycle: Lifecycle,
    frame_budget: Option<Duration>,
    stats: PipelineStats,
    last_error: Option<&'static str>,
    waiting_for_model: bool,
    output_warned: bool,
}

impl<E: InferenceEngine> FramePipeline<E> {
    pub fn new(
        transform: FrameTransform,
        detector: PoseDetector<E>,
        mapper: KeypointMapper,
        publisher: Publisher<KeypointSet>,
    ) -> Self {
        Self {
            transform,
            detector,
            mapper,
            publisher,
            lifecycle: Lifecycle::new(),
            frame_budget: None,
            stats: PipelineStats::default(),
            last_error: None,
            waiting_for_model: false,
            output_warned: false,
        }
    }

    /// キャプチャFPSから1フレームの時間予算を設定
    pub fn with_frame_budget(mut self, fps: u32) -> Self {
        self.frame_budget = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut PipelineStats {
        &mut self.stats
    }

    /// 1フレームを処理する。フレームはこの呼び出しの間だけ借用される
    pub fn process_frame(&mut self, frame: &Frame<'_>) -> FrameOutcome {
        if !self.lifecycle.is_active() {
            return FrameOutcome::Inactive;
        }

        // モデルが届くまでは変換もしない
        if !self.detector.is_loaded() {
            return self.wait_for_model();
        }

        let t0 = Instant::now();
        let input = match self.transform.apply(frame) {
            Ok(buffer) => buffer,
            Err(e) => return self.abandon(e),
        };
        let t1 = Instant::now();

        let output = match self.detector.invoke(&input) {
            Ok(output) => output,
            Err(PipelineError::ModelNotLoaded) => return self.wait_for_model(),
            Err(e) => return self.abandon(e),
        };
        drop(input);
        let t2 = Instant::now();

        if self.waiting_for_model {
            info!("model ready, processing frames");
            self.waiting_for_model = false;
        }
        self.check_output(&output);

        let set = self.mapper.map(&output);
        let t3 = Instant::now();

        // 推論中にライフサイクルが終わっていたら publish しない
        if !self.lifecycle.is_active() {
            return FrameOutcome::Inactive;
        }

        let timings = FrameTimings {
            transform: t1 - t0,
            inference: t2 - t1,
            mapping: t3 - t2,
        };
        self.stats.record(&timings);
        if let Some(budget) = self.frame_budget {
            if timings.total() > budget {
                debug!(
                    "frame over budget: {:.1}ms > {:.1}ms",
                    timings.total().as_secs_f64() * 1000.0,
                    budget.as_secs_f64() * 1000.0
                );
            }
        }
        self.last_error = None;

        let keypoints = set.len();
        if !self.publisher.publish(set) {
            return FrameOutcome::ReceiverClosed;
        }
        self.stats.published += 1;
        FrameOutcome::Published { keypoints, timings }
    }

    fn wait_for_model(&mut self) -> FrameOutcome {
        self.stats.skipped_not_loaded += 1;
        if !self.waiting_for_model {
            info!("waiting for model, skipping frames");
            self.waiting_for_model = true;
        }
        FrameOutcome::ModelNotLoaded
    }

    fn abandon(&mut self, error: PipelineError) -> FrameOutcome {
        self.stats.failed += 1;
        let kind = error.kind();
        if self.last_error != Some(kind) {
            warn!("frame dropped: {}", error);
            self.last_error = Some(kind);
        } else {
            debug!("frame dropped: {}", error);
        }
        FrameOutcome::Failed(kind)
    }

    fn check_output(&mut self, output: &[f32]) {
        let Some(expected) = self.detector.output_len() else {
            return;
        };
        match check_output(output, expected) {
            Ok(()) => self.output_warned = false,
            Err(e) => {
                if !self.output_warned {
                    debug!("{}; mapping well-formed tuples only", e);
                    self.output_warned = true;
                }
            }
        }
    }
}
