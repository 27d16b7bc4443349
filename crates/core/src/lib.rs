//! Core utilities for the triangle renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error taxonomy, result alias and context wrapping
//! - Logging initialization and the plain-text log file
//! - Frame timer
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::{Config, GraphicsConfig, HeadlessConfig, LogConfig, WindowConfig};
pub use error::{Error, Result, ResultExt};
pub use logging::{create_log_file, file_layer, init_logging};
pub use timer::{FrameReport, Timer};
