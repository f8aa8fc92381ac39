pub mod overlay;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use overlay::{line_pixels, BorderRect, OverlayStyle};
pub use skeleton::{BACKGROUND_COLOR, SKELETON_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
