//! Application driver for the triangle renderer.
//!
//! - [`driver`] - event handling, minimize tracking and the per-iteration render
//! - [`cli`] - command line arguments and configuration overrides
//! - [`report`] - fatal error reporting
//! - [`windowed`] - the winit event loop over the Vulkan backend

pub mod cli;
pub mod driver;
pub mod report;
pub mod windowed;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use triangle_core::Config;
use triangle_renderer::{Extent, headless};

pub use cli::Cli;
pub use driver::{AppEvent, Driver, FrameTarget};

/// Renders `config.headless.frames` frames on the simulated GPU.
///
/// # Errors
///
/// Returns the first fatal error, wrapped with context.
pub fn run_headless(config: &Config) -> Result<()> {
    let extent = Extent::new(config.window.width, config.window.height);
    let latency = Duration::from_millis(config.headless.gpu_latency_ms);

    let graphics = headless::create(extent, config.graphics.clear_color, latency)
        .context("Can not initialize headless graphics")?;
    let mut driver = Driver::new(graphics);

    for _ in 0..config.headless.frames {
        driver
            .iterate()
            .context("Error occurred while processing main loop")?;
    }

    let mut graphics = driver.into_target();
    graphics.destroy().context("Can not release graphics")?;

    let journal = graphics.backend().journal();
    info!(
        "Headless run finished: {} frames, presented {:?}, {} drains, {} advances",
        graphics.frame_count(),
        journal.presented_indices(),
        graphics.drain_count(),
        graphics.advance_count()
    );
    Ok(())
}
