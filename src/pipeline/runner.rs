use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

use super::stats::{PipelineStats, ThroughputMeter};
use super::{FrameOutcome, FramePipeline, Lifecycle};
use crate::camera::CapturedFrame;
use crate::pose::InferenceEngine;
use crate::publish::Subscriber;

/// 新フレーム待ちの上限。ライフサイクル終了をこの間隔で確認する
const FRAME_WAIT: Duration = Duration::from_millis(100);

/// パイプライン専用の処理スレッド
///
/// フレームスロットの最新フレームだけを処理する。処理中に届いたフレームは
/// 上書きされ、処理されないまま捨てられる。
pub struct ProcessingThread {
    lifecycle: Lifecycle,
    handle: Option<thread::JoinHandle<PipelineStats>>,
}

impl ProcessingThread {
    pub fn spawn<E>(
        pipeline: FramePipeline<E>,
        frames: Subscriber<CapturedFrame>,
    ) -> std::io::Result<Self>
    where
        E: InferenceEngine + 'static,
    {
        let lifecycle = pipeline.lifecycle();
        let handle = thread::Builder::new()
            .name("pose-processing".to_string())
            .spawn(move || run(pipeline, frames))?;

        Ok(Self {
            lifecycle,
            handle: Some(handle),
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止して累積統計を返す
    pub fn stop(mut self) -> PipelineStats {
        self.shutdown().unwrap_or_default()
    }

    fn shutdown(&mut self) -> Option<PipelineStats> {
        self.lifecycle.deactivate();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                warn!("processing thread panicked");
                None
            }
        }
    }
}

impl Drop for ProcessingThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<E: InferenceEngine>(
    mut pipeline: FramePipeline<E>,
    frames: Subscriber<CapturedFrame>,
) -> PipelineStats {
    let lifecycle = pipeline.lifecycle();
    let mut meter = ThroughputMeter::new();
    let mut last_seen = 0u64;

    while lifecycle.is_active() {
        let Some((generation, frame)) = frames.wait_newer(last_seen, FRAME_WAIT) else {
            if !frames.has_publisher() {
                debug!("frame source closed");
                break;
            }
            continue;
        };

        let skipped = generation - last_seen - 1;
        if last_seen > 0 && skipped > 0 {
            pipeline.stats_mut().frames_dropped += skipped;
        }
        last_seen = generation;

        let outcome = pipeline.process_frame(&frame.as_frame());
        // フレームはここで手放す
        drop(frame);

        match outcome {
            FrameOutcome::Published { timings, .. } => {
                if let Some(t) = meter.tick(&timings) {
                    info!(
                        "FPS: {:.1}, transform: {:.1}ms, inference: {:.1}ms, mapping: {:.2}ms",
                        t.fps,
                        t.average.transform.as_secs_f64() * 1000.0,
                        t.average.inference.as_secs_f64() * 1000.0,
                        t.average.mapping.as_secs_f64() * 1000.0
                    );
                }
            }
            FrameOutcome::ReceiverClosed => {
                debug!("keypoint consumer gone");
            }
            FrameOutcome::Inactive => break,
            FrameOutcome::ModelNotLoaded | FrameOutcome::Failed(_) => {}
        }
    }

    pipeline.stats().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PixelFormat, SyntheticSource, ThreadedCamera};
    use crate::pose::detector::tests::ScriptedEngine;
    use crate::pose::{FrameTransform, KeypointMapper, MirrorAxes, PoseDetector, ScreenSize};
    use crate::publish::latest;
    use std::time::Instant;

    fn pipeline_with(
        output: Vec<f32>,
    ) -> (FramePipeline<ScriptedEngine>, Subscriber<crate::pose::KeypointSet>) {
        let (publisher, subscriber) = latest();
        let pipeline = FramePipeline::new(
            FrameTransform::new(32, 32).unwrap(),
            PoseDetector::new(ScriptedEngine::new(32, 32, output)),
            KeypointMapper::new(0, MirrorAxes::BOTH, ScreenSize::new(100.0, 200.0)).unwrap(),
            publisher,
        );
        (pipeline, subscriber)
    }

    #[test]
    fn test_processes_published_frames() {
        let (pipeline, keypoints) = pipeline_with(vec![0.5, 0.5, 0.9]);
        let (frame_tx, frame_rx) = latest();
        let processing = ProcessingThread::spawn(pipeline, frame_rx).unwrap();

        let source = SyntheticSource::new(64, 36, PixelFormat::Nv12);
        frame_tx.publish(source.frame_at(0));

        let (_, set) = keypoints.wait_newer(0, Duration::from_secs(5)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.keypoints()[0].x, 50.0);

        let stats = processing.stop();
        assert_eq!(stats.published, 1);
    }

    #[test]
    fn test_exits_when_source_closes() {
        let (pipeline, _keypoints) = pipeline_with(vec![]);
        let (frame_tx, frame_rx) = latest::<CapturedFrame>();
        let processing = ProcessingThread::spawn(pipeline, frame_rx).unwrap();
        drop(frame_tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while processing.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!processing.is_running());
    }

    #[test]
    fn test_with_threaded_camera() {
        let (pipeline, keypoints) = pipeline_with(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let (frame_tx, frame_rx) = latest();
        let camera = ThreadedCamera::start(
            SyntheticSource::new(160, 90, PixelFormat::I420).with_fps(120),
            frame_tx,
        )
        .unwrap();
        let processing = ProcessingThread::spawn(pipeline, frame_rx).unwrap();

        let mut seen = 0;
        let deadline = Instant::now() + Duration::from_secs(5);
        while seen < 3 && Instant::now() < deadline {
            if let Some((generation, set)) = keypoints.wait_newer(seen, Duration::from_millis(500)) {
                assert_eq!(set.len(), 2);
                seen = generation;
            }
        }
        assert!(seen >= 3);

        // ライフサイクル終了後は publish されない
        processing.lifecycle().deactivate();
        let stats = processing.stop();
        let after = keypoints.generation();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(keypoints.generation(), after);
        assert!(stats.processed >= 3);
        camera.stop();
    }
}
