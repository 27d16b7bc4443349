//! Windowed run on the Vulkan backend.

use anyhow::{Context, Result};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use triangle_core::Config;
use triangle_platform::{Key, Window};
use triangle_renderer::Graphics;
use triangle_renderer::vulkan::{self, VulkanBackend};

use crate::driver::{AppEvent, Driver};

/// winit handler forwarding window events to the [`Driver`].
struct App {
    config: Config,
    // Drops before the window it renders into
    driver: Option<Driver<Graphics<VulkanBackend>>>,
    window: Option<Window>,
    error: Option<triangle_core::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            driver: None,
            window: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: triangle_core::Error) {
        error!("{}", err.chain());
        self.error = Some(err);
        event_loop.exit();
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        if let Err(e) = driver.handle_event(event) {
            self.fail(event_loop, e);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, e.context("Can not create window")),
        };
        match vulkan::create(&window, &self.config.graphics) {
            Ok(graphics) => {
                info!("Initialization complete, entering main loop");
                self.driver = Some(Driver::new(graphics));
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e.context("Can not initialize graphics")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.dispatch(event_loop, AppEvent::CloseRequested),
            WindowEvent::Resized(size) => {
                let minimized = match self.window.as_mut() {
                    Some(window) => {
                        window.resize(size.width, size.height);
                        window.is_minimized()
                    }
                    None => return,
                };
                self.dispatch(
                    event_loop,
                    AppEvent::Resized {
                        width: size.width,
                        height: size.height,
                        minimized,
                    },
                );
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.dispatch(event_loop, AppEvent::KeyPressed(Key::from(event.physical_key)));
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        match driver.iterate() {
            Ok(true) => {}
            Ok(false) => event_loop.exit(),
            Err(e) => self.fail(event_loop, e),
        }
    }
}

/// Opens the window and runs the event loop until close or a fatal error.
///
/// # Errors
///
/// Returns the first fatal error, wrapped with context.
pub fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new().context("Can not create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .context("Error occurred while processing main loop")?;

    if let Some(err) = app.error.take() {
        return Err(err).context("Error occurred while processing main loop");
    }

    if let Some(driver) = app.driver.take() {
        let frames = driver.frame_count();
        let mut graphics = driver.into_target();
        graphics.destroy().context("Can not release graphics")?;
        info!("Rendered {} frames", frames);
    }
    Ok(())
}
