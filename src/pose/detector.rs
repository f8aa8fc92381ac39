use log::{error, info};
use std::sync::mpsc;
use std::thread;

use super::engine::{InferenceEngine, InputShape};
use super::preprocess::TransformedBuffer;
use crate::error::{PipelineError, Result};

/// 推論呼び出し口
///
/// モデルは後から届いてもよい。届くまでは `ModelNotLoaded` を返す。
pub struct PoseDetector<E> {
    engine: Option<E>,
    pending: Option<mpsc::Receiver<E>>,
}

/// 別スレッドで読み込んだモデルを検出器へ渡す
pub struct ModelLoader<E> {
    tx: mpsc::Sender<E>,
}

impl<E: InferenceEngine> PoseDetector<E> {
    /// 読み込み済みエンジンで初期化
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
            pending: None,
        }
    }

    /// 未ロード状態で作り、ローダーを返す
    pub fn deferred() -> (Self, ModelLoader<E>) {
        let (tx, rx) = mpsc::channel();
        let detector = Self {
            engine: None,
            pending: Some(rx),
        };
        (detector, ModelLoader { tx })
    }

    pub fn is_loaded(&mut self) -> bool {
        self.poll_pending();
        self.engine.is_some()
    }

    pub fn input_shape(&self) -> Option<InputShape> {
        self.engine.as_ref().map(|e| e.input_shape())
    }

    pub fn output_len(&self) -> Option<usize> {
        self.engine.as_ref().map(|e| e.output_len())
    }

    /// 変換済みバッファで推論し、出力ベクトルを返す
    ///
    /// バッファは宣言形状と完全一致している必要がある（ここではリサイズしない）。
    pub fn invoke(&mut self, input: &TransformedBuffer) -> Result<Vec<f32>> {
        self.poll_pending();
        let engine = self.engine.as_mut().ok_or(PipelineError::ModelNotLoaded)?;

        let shape = engine.input_shape();
        if !shape.matches(input) {
            return Err(PipelineError::invalid_geometry(format!(
                "buffer {}x{}x{} does not match model input {}x{}x{}",
                input.width(),
                input.height(),
                TransformedBuffer::CHANNELS,
                shape.width,
                shape.height,
                shape.channels
            )));
        }

        engine.run(input)
    }

    fn poll_pending(&mut self) {
        let Some(rx) = &self.pending else {
            return;
        };
        match rx.try_recv() {
            Ok(engine) => {
                self.engine = Some(engine);
                self.pending = None;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                // ローダーが渡さずに終了した
                self.pending = None;
            }
        }
    }
}

impl<E: InferenceEngine + 'static> ModelLoader<E> {
    /// エンジンを渡す。検出器が既に無ければ false
    pub fn deliver(self, engine: E) -> bool {
        self.tx.send(engine).is_ok()
    }

    /// 読み込み関数を別スレッドで実行して渡す
    pub fn spawn<F>(self, load: F) -> thread::JoinHandle<()>
    where
        F: FnOnce() -> anyhow::Result<E> + Send + 'static,
    {
        thread::spawn(move || match load() {
            Ok(engine) => {
                if self.deliver(engine) {
                    info!("model loaded");
                }
            }
            Err(e) => error!("failed to load model: {:#}", e),
        })
    }
}

/// 出力長が宣言より短ければ `MalformedOutput`
pub fn check_output(output: &[f32], expected: usize) -> Result<()> {
    if output.len() < expected {
        return Err(PipelineError::MalformedOutput {
            expected,
            actual: output.len(),
        });
    }
    Ok(())
}
