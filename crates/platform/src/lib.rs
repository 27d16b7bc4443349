//! Platform abstraction layer for the triangle renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Key translation for the application driver
//! - Vulkan surface creation and the instance extensions it needs

mod input;
mod window;

pub use input::Key;
pub use window::{Surface, Window, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
