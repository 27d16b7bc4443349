//! Application driver.
//!
//! The driver consumes window events one at a time and runs at most one frame
//! per loop iteration. It tracks whether the window is minimized; while it is,
//! no resize reaches the renderer and no frame is rendered.

use std::time::Duration;

use tracing::{debug, info};

use triangle_core::{Result, Timer};
use triangle_platform::Key;
use triangle_renderer::{Backend, Graphics};

/// How often the average frame time is logged.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Window events the driver reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    CloseRequested,
    KeyPressed(Key),
    Resized {
        width: u32,
        height: u32,
        minimized: bool,
    },
}

/// What the driver renders into.
pub trait FrameTarget {
    /// Per-iteration update before rendering.
    fn update(&mut self);

    /// Renders one frame.
    fn render(&mut self) -> Result<()>;

    /// Resizes the back-buffers.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
}

impl<B: Backend> FrameTarget for Graphics<B> {
    fn update(&mut self) {
        Graphics::update(self);
    }

    fn render(&mut self) -> Result<()> {
        Graphics::render(self)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        Graphics::resize(self, width, height)
    }
}

/// Event handling and the render loop.
pub struct Driver<T> {
    target: T,
    running: bool,
    minimized: bool,
    frames: u64,
    timer: Timer,
}

impl<T: FrameTarget> Driver<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            running: true,
            minimized: false,
            frames: 0,
            timer: Timer::new(),
        }
    }

    /// Applies one window event.
    ///
    /// # Errors
    ///
    /// Returns the renderer's resize failure.
    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.running = false;
            }
            AppEvent::KeyPressed(Key::Escape) => {
                info!("Escape pressed, shutting down");
                self.running = false;
            }
            AppEvent::KeyPressed(_) => {}
            AppEvent::Resized {
                width,
                height,
                minimized,
            } => {
                let minimized = minimized || width == 0 || height == 0;
                if minimized != self.minimized {
                    info!("Window {}", if minimized { "minimized" } else { "restored" });
                    if !minimized {
                        self.timer.restart_window();
                    }
                }
                self.minimized = minimized;

                if !minimized {
                    self.target.resize(width, height)?;
                }
            }
        }
        Ok(())
    }

    /// Ends one loop iteration: renders a frame unless minimized or stopped.
    ///
    /// Returns false once the loop should terminate.
    ///
    /// # Errors
    ///
    /// Returns the renderer's frame failure.
    pub fn iterate(&mut self) -> Result<bool> {
        if !self.running {
            return Ok(false);
        }
        if self.minimized {
            return Ok(true);
        }

        self.target.update();
        self.target.render()?;
        self.frames += 1;

        self.timer.tick();
        if let Some(report) = self.timer.report(REPORT_INTERVAL) {
            debug!(
                "{} frames, average {:.2} ms ({:.1} fps)",
                report.frames,
                report.average.as_secs_f64() * 1000.0,
                report.fps()
            );
        }
        Ok(true)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn target(&self) -> &T {
        &self.target
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        renders: u32,
        resizes: Vec<(u32, u32)>,
    }

    impl FrameTarget for Counter {
        fn update(&mut self) {}

        fn render(&mut self) -> Result<()> {
            self.renders += 1;
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) -> Result<()> {
            self.resizes.push((width, height));
            Ok(())
        }
    }

    #[test]
    fn test_zero_sized_resize_counts_as_minimized() {
        let mut driver = Driver::new(Counter::default());
        driver
            .handle_event(AppEvent::Resized {
                width: 0,
                height: 0,
                minimized: false,
            })
            .unwrap();

        assert!(driver.is_minimized());
        assert!(driver.target().resizes.is_empty());
        assert!(driver.iterate().unwrap());
        assert_eq!(driver.target().renders, 0);
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let mut driver = Driver::new(Counter::default());
        driver
            .handle_event(AppEvent::KeyPressed(Key::Unidentified))
            .unwrap();
        assert!(driver.is_running());
    }

    #[test]
    fn test_restore_restarts_report_window() {
        let mut driver = Driver::new(Counter::default());
        driver.iterate().unwrap();
        driver
            .handle_event(AppEvent::Resized {
                width: 0,
                height: 0,
                minimized: true,
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        driver
            .handle_event(AppEvent::Resized {
                width: 800,
                height: 600,
                minimized: false,
            })
            .unwrap();

        assert_eq!(driver.timer.window_frames(), 0);
        assert!(driver.timer.window_elapsed() < Duration::from_millis(50));
        assert_eq!(driver.timer.frame_count(), 1);
    }
}
