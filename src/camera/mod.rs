#[cfg(feature = "desktop")]
pub mod capture;
pub mod frame;
pub mod synthetic;
pub mod threaded;

#[cfg(feature = "desktop")]
pub use capture::OpenCvCamera;
pub use frame::{CapturedFrame, Frame, PixelFormat};
pub use synthetic::SyntheticSource;
pub use threaded::ThreadedCamera;

/// フレームを1枚ずつ供給するキャプチャ元
pub trait FrameSource: Send {
    /// ネゴシエーション後の解像度
    fn resolution(&self) -> (u32, u32);

    /// 次のフレームを読み込む（届くまでブロックしてよい）
    fn next_frame(&mut self) -> anyhow::Result<CapturedFrame>;
}
