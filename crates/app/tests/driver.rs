//! Driver behavior over a recording target and over the simulated GPU.

use std::time::Duration;

use triangle_app::{AppEvent, Driver, FrameTarget};
use triangle_core::{Error, Result};
use triangle_platform::Key;
use triangle_renderer::Extent;
use triangle_renderer::headless::{self, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Update,
    Render,
    Resize(u32, u32),
}

#[derive(Default)]
struct Recording {
    calls: Vec<Call>,
    fail_render: bool,
}

impl Recording {
    fn renders(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Render).count()
    }

    fn resizes(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Resize(w, h) => Some((*w, *h)),
                _ => None,
            })
            .collect()
    }
}

impl FrameTarget for Recording {
    fn update(&mut self) {
        self.calls.push(Call::Update);
    }

    fn render(&mut self) -> Result<()> {
        if self.fail_render {
            return Err(Error::Submission("queue rejected command list".to_string()));
        }
        self.calls.push(Call::Render);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.calls.push(Call::Resize(width, height));
        Ok(())
    }
}

fn minimize() -> AppEvent {
    AppEvent::Resized {
        width: 0,
        height: 0,
        minimized: true,
    }
}

fn restore(width: u32, height: u32) -> AppEvent {
    AppEvent::Resized {
        width,
        height,
        minimized: false,
    }
}

#[test]
fn test_renders_once_per_iteration() {
    let mut driver = Driver::new(Recording::default());
    for _ in 0..3 {
        assert!(driver.iterate().unwrap());
    }

    assert_eq!(driver.frame_count(), 3);
    assert_eq!(
        driver.target().calls,
        vec![
            Call::Update,
            Call::Render,
            Call::Update,
            Call::Render,
            Call::Update,
            Call::Render
        ]
    );
}

#[test]
fn test_no_frames_while_minimized() {
    let mut driver = Driver::new(Recording::default());
    driver.iterate().unwrap();

    driver.handle_event(minimize()).unwrap();
    for _ in 0..4 {
        assert!(driver.iterate().unwrap());
    }
    assert_eq!(driver.target().renders(), 1);

    driver.handle_event(restore(1280, 720)).unwrap();
    driver.iterate().unwrap();
    assert_eq!(driver.target().renders(), 2);
    assert!(!driver.is_minimized());
}

#[test]
fn test_resize_never_reaches_target_while_minimized() {
    let mut driver = Driver::new(Recording::default());

    driver.handle_event(minimize()).unwrap();
    driver
        .handle_event(AppEvent::Resized {
            width: 800,
            height: 600,
            minimized: true,
        })
        .unwrap();
    assert!(driver.target().resizes().is_empty());

    driver.handle_event(restore(800, 600)).unwrap();
    assert_eq!(driver.target().resizes(), vec![(800, 600)]);
}

#[test]
fn test_close_stops_the_loop() {
    let mut driver = Driver::new(Recording::default());
    driver.handle_event(AppEvent::CloseRequested).unwrap();

    assert!(!driver.is_running());
    assert!(!driver.iterate().unwrap());
    assert_eq!(driver.target().renders(), 0);
}

#[test]
fn test_escape_stops_the_loop() {
    let mut driver = Driver::new(Recording::default());
    driver.handle_event(AppEvent::KeyPressed(Key::Escape)).unwrap();

    assert!(!driver.iterate().unwrap());
}

#[test]
fn test_render_failure_propagates() {
    let mut driver = Driver::new(Recording {
        fail_render: true,
        ..Recording::default()
    });

    let err = driver.iterate().unwrap_err();
    assert_eq!(err.kind_name(), "SubmissionError");
    assert_eq!(driver.frame_count(), 0);
}

#[test]
fn test_minimize_and_restore_over_headless_gpu() {
    let graphics = headless::create(Extent::new(1280, 720), [0.0, 0.0, 0.0, 1.0], Duration::ZERO).unwrap();
    let mut driver = Driver::new(graphics);

    driver.iterate().unwrap();
    driver.handle_event(minimize()).unwrap();
    driver.iterate().unwrap();
    driver.iterate().unwrap();
    driver.handle_event(restore(640, 480)).unwrap();
    driver.iterate().unwrap();

    let mut graphics = driver.into_target();
    graphics.destroy().unwrap();

    let journal = graphics.backend().journal();
    assert_eq!(journal.presented_indices(), vec![0, 0]);
    assert_eq!(
        journal.count(|e| matches!(e, Event::Recreate { width: 640, height: 480, .. })),
        1
    );
    assert_eq!(graphics.extent(), Extent::new(640, 480));
}
