use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::frame::CapturedFrame;
use super::FrameSource;
use crate::publish::Publisher;

/// 読み取りエラー時の待機
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// 別スレッドでキャプチャを行い、最新フレームだけをスロットへ書き込む
///
/// 処理側が追いつかなければ古いフレームは上書きされて消える。
/// キャプチャ側が処理を待つことはない。
pub struct ThreadedCamera {
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedCamera {
    pub fn start<S>(mut source: S, frames: Publisher<CapturedFrame>) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        let (width, height) = source.resolution();
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = running.clone();

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let mut error_streak = 0u32;
                while running_ref.load(Ordering::Acquire) {
                    // 受け手が居なければ次の読み込み（ブロックしうる）をしない
                    if frames.is_closed() {
                        debug!("frame consumer gone, stopping capture");
                        break;
                    }
                    match source.next_frame() {
                        Ok(frame) => {
                            if error_streak > 0 {
                                info!("capture recovered after {} errors", error_streak);
                                error_streak = 0;
                            }
                            if !frames.publish(frame) {
                                debug!("frame consumer gone, stopping capture");
                                break;
                            }
                        }
                        Err(e) => {
                            if error_streak == 0 {
                                warn!("frame read error: {:#}", e);
                            }
                            error_streak += 1;
                            thread::sleep(ERROR_BACKOFF);
                        }
                    }
                }
            })
            .context("Failed to spawn capture thread")?;

        Ok(Self {
            running,
            width,
            height,
            handle: Some(handle),
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// キャプチャを止めてスレッドを回収
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

impl Drop for ThreadedCamera {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PixelFormat, SyntheticSource};
    use crate::publish::latest;
    use std::time::Instant;

    #[test]
    fn test_threaded_camera_publishes_frames() {
        let (publisher, subscriber) = latest();
        let camera =
            ThreadedCamera::start(SyntheticSource::new(16, 9, PixelFormat::Rgb8), publisher)
                .unwrap();
        assert_eq!(camera.resolution(), (16, 9));

        let (generation, frame) = subscriber
            .wait_newer(0, Duration::from_secs(5))
            .unwrap();
        assert!(generation >= 1);
        assert_eq!(frame.width, 16);
        camera.stop();
    }

    #[test]
    fn test_threaded_camera_stops_when_consumer_dropped() {
        let (publisher, subscriber) = latest();
        let camera =
            ThreadedCamera::start(SyntheticSource::new(4, 4, PixelFormat::Gray8), publisher)
                .unwrap();
        drop(subscriber);

        let deadline = Instant::now() + Duration::from_secs(5);
        while camera.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!camera.is_running());
    }

    /// 読み込み回数を数えるソース
    struct CountingSource {
        inner: SyntheticSource,
        reads: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn resolution(&self) -> (u32, u32) {
            self.inner.resolution()
        }

        fn next_frame(&mut self) -> Result<CapturedFrame> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.next_frame()
        }
    }

    #[test]
    fn test_closed_consumer_skips_read() {
        let (publisher, subscriber) = latest();
        subscriber.close();
        let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let source = CountingSource {
            inner: SyntheticSource::new(4, 4, PixelFormat::Gray8),
            reads: reads.clone(),
        };
        let camera = ThreadedCamera::start(source, publisher).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while camera.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!camera.is_running());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }
}
