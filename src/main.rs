use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use pose_overlay::camera::{CapturedFrame, OpenCvCamera, ThreadedCamera};
use pose_overlay::config::Config;
use pose_overlay::logging;
use pose_overlay::pipeline::{FramePipeline, ProcessingThread};
use pose_overlay::pose::{FrameTransform, KeypointMapper, KeypointSet, OnnxEngine, PoseDetector};
use pose_overlay::publish::latest;
use pose_overlay::render::{MinifbRenderer, OverlayStyle, BACKGROUND_COLOR};

const CONFIG_PATH: &str = "config.toml";
const WINDOW_TITLE: &str = "Pose Overlay";
/// 描画ループの上限FPS
const REDRAW_FPS: usize = 60;

fn main() -> Result<()> {
    // ログレベルは設定ファイルから取るので、読み込みエラーの報告は初期化後に行う
    let level = Config::load(CONFIG_PATH)
        .map(|c| c.log_level)
        .unwrap_or_else(|_| "info".to_string());
    logging::init(&level);
    let config = Config::load_or_default(CONFIG_PATH);

    info!("Pose Overlay {}", env!("GIT_VERSION"));
    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        return Err(e.into());
    }

    let mapper = KeypointMapper::from_config(&config)?;
    let mirror = mapper.mirror();
    let transform = FrameTransform::from_config(&config.model, &config.transform)?;
    let style = OverlayStyle::from_config(&config.render, &config.model);
    info!(
        "model: {} ({}x{}), skip={}, mirror x={} y={}",
        config.model.path,
        config.model.input_width,
        config.model.input_height,
        mapper.skip_count(),
        mirror.x,
        mirror.y
    );

    let window_width = config.screen.width.round() as usize;
    let window_height = config.screen.height.round() as usize;
    let mut renderer = MinifbRenderer::new(WINDOW_TITLE, window_width, window_height, REDRAW_FPS)?;

    let (frame_tx, frames) = latest::<CapturedFrame>();
    let camera = match OpenCvCamera::from_config(&config.camera)
        .and_then(|source| ThreadedCamera::start(source, frame_tx))
    {
        Ok(camera) => camera,
        Err(e) => {
            warn!("camera unavailable: {:#}", e);
            return show_placeholder(&mut renderer);
        }
    };
    let (width, height) = camera.resolution();
    info!("camera: {}x{}", width, height);

    let (detector, loader) = PoseDetector::deferred();
    let model = config.model.clone();
    loader.spawn(move || OnnxEngine::from_config(&model));

    let (keypoint_tx, keypoints) = latest::<KeypointSet>();
    let pipeline = FramePipeline::new(transform, detector, mapper, keypoint_tx)
        .with_frame_budget(config.camera.fps);
    let processing = ProcessingThread::spawn(pipeline, frames.clone())
        .context("Failed to spawn processing thread")?;

    let preview = FrameTransform::new(window_width as u32, window_height as u32)?;
    let mut preview_generation = 0u64;
    let mut preview_buffer = None;

    while renderer.is_open() {
        if config.render.preview {
            if let Some((generation, frame)) = frames.snapshot() {
                if generation != preview_generation {
                    preview_generation = generation;
                    match preview.apply(&frame.as_frame()) {
                        Ok(buffer) => preview_buffer = Some(buffer),
                        Err(e) => debug!("preview skipped: {}", e),
                    }
                }
            }
        }

        match &preview_buffer {
            Some(buffer) => renderer.draw_preview(buffer, mirror),
            None => renderer.clear(BACKGROUND_COLOR),
        }
        if let Some(border) = &style.border {
            renderer.draw_border(border);
        }
        if let Some(set) = keypoints.latest() {
            renderer.draw_keypoints(&set, &style);
        }
        renderer.update()?;
    }

    info!("Shutting down...");
    keypoints.close();
    let stats = processing.stop();
    camera.stop();

    let average = stats.average();
    info!(
        "processed {} frames ({} published, {} waiting for model, {} failed, {} dropped)",
        stats.processed, stats.published, stats.skipped_not_loaded, stats.failed, stats.frames_dropped
    );
    info!(
        "average: transform {:.1}ms, inference {:.1}ms, mapping {:.2}ms",
        average.transform.as_secs_f64() * 1000.0,
        average.inference.as_secs_f64() * 1000.0,
        average.mapping.as_secs_f64() * 1000.0
    );
    Ok(())
}

/// カメラが使えないときは枠だけ表示して終了を待つ
fn show_placeholder(renderer: &mut MinifbRenderer) -> Result<()> {
    while renderer.is_open() {
        renderer.draw_placeholder();
        renderer.update()?;
    }
    Ok(())
}
