use anyhow::Result;
use std::time::Instant;

use pose_overlay::camera::{PixelFormat, SyntheticSource};
use pose_overlay::config::Config;
use pose_overlay::logging;
use pose_overlay::pipeline::{FrameOutcome, FramePipeline};
use pose_overlay::pose::{FrameTransform, KeypointMapper, OnnxEngine, PoseDetector};
use pose_overlay::publish::latest;

const CONFIG_PATH: &str = "config.toml";
const DEFAULT_ITERATIONS: u64 = 100;
const WARMUP: u64 = 5;

fn main() -> Result<()> {
    logging::init("warn");
    let config = Config::load_or_default(CONFIG_PATH);
    config.validate()?;

    let iterations = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ITERATIONS);

    // 実カメラと同じ解像度のNV12フレーム
    let source = SyntheticSource::new(config.camera.width, config.camera.height, PixelFormat::Nv12);
    let engine = OnnxEngine::from_config(&config.model)?;
    let (publisher, _keypoints) = latest();
    let mut pipeline = FramePipeline::new(
        FrameTransform::from_config(&config.model, &config.transform)?,
        PoseDetector::new(engine),
        KeypointMapper::from_config(&config)?,
        publisher,
    );

    println!(
        "Model: {} ({}x{})",
        config.model.path, config.model.input_width, config.model.input_height
    );
    println!("Frame: {}x{} NV12", config.camera.width, config.camera.height);

    for i in 0..WARMUP {
        pipeline.process_frame(&source.frame_at(i).as_frame());
    }
    let warmup = pipeline.stats().clone();

    let start = Instant::now();
    let mut keypoints = 0;
    for i in 0..iterations {
        let frame = source.frame_at(WARMUP + i);
        if let FrameOutcome::Published { keypoints: n, .. } = pipeline.process_frame(&frame.as_frame()) {
            keypoints = n;
        }
    }
    let elapsed = start.elapsed();

    let stats = pipeline.stats();
    let measured = stats.processed - warmup.processed;
    if measured == 0 {
        anyhow::bail!("no frame was processed ({} failed)", stats.failed);
    }
    let average = stats.average();
    let avg_ms = elapsed.as_secs_f64() * 1000.0 / iterations as f64;

    println!(
        "Pipeline: {:.2}ms/frame = {:.1} FPS ({} of {} frames, {} keypoints)",
        avg_ms,
        1000.0 / avg_ms,
        measured,
        iterations,
        keypoints
    );
    println!(
        "  transform: {:.2}ms, inference: {:.2}ms, mapping: {:.3}ms",
        average.transform.as_secs_f64() * 1000.0,
        average.inference.as_secs_f64() * 1000.0,
        average.mapping.as_secs_f64() * 1000.0
    );

    Ok(())
}
