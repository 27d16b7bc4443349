//! Frame lifecycle tests against the simulated GPU.

use std::sync::Arc;
use std::time::Duration;

use triangle_renderer::headless::{
    self, Event, HeadlessAllocator, HeadlessBackend, HeadlessFence, HeadlessGpu, HeadlessSurface,
    Journal,
};
use triangle_renderer::recorder::COMMANDS_PER_FRAME;
use triangle_renderer::{BackBufferState, Extent, Graphics, PresentationSurface, RecorderState};

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn graphics(latency: Duration) -> Graphics<HeadlessBackend> {
    headless::create(Extent::new(1280, 720), BLACK, latency).expect("Failed to create headless graphics")
}

fn graphics_with_buffers(count: usize) -> triangle_core::Result<Graphics<HeadlessBackend>> {
    let gpu = HeadlessGpu::start(Duration::ZERO)?;
    let journal = Journal::new();
    let surface =
        HeadlessSurface::with_buffer_count(Extent::new(1280, 720), count, Arc::clone(&gpu), journal.clone())?;
    let fence = HeadlessFence::new(Arc::clone(&gpu), journal.clone());
    let allocators = [HeadlessAllocator::new(0), HeadlessAllocator::new(1)];
    Graphics::new(HeadlessBackend::new(gpu, journal), surface, allocators, fence, BLACK)
}

#[test]
fn test_five_frames_then_teardown() {
    let mut graphics = graphics(Duration::ZERO);

    for _ in 0..5 {
        graphics.update();
        graphics.render().unwrap();
    }
    graphics.destroy().unwrap();

    let journal = graphics.backend().journal();
    assert_eq!(journal.presented_indices(), vec![0, 1, 0, 1, 0]);
    assert_eq!(graphics.frame_count(), 5);
    assert_eq!(graphics.advance_count(), 5);
    assert_eq!(graphics.drain_count(), 1);

    // Every submitted list holds the full frame
    let submits: Vec<_> = journal
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Submit { slot, commands } => Some((slot, commands)),
            _ => None,
        })
        .collect();
    assert_eq!(
        submits,
        vec![
            (0, COMMANDS_PER_FRAME),
            (1, COMMANDS_PER_FRAME),
            (0, COMMANDS_PER_FRAME),
            (1, COMMANDS_PER_FRAME),
            (0, COMMANDS_PER_FRAME),
        ]
    );
}

#[test]
fn test_fence_values_increase_across_frames_and_drain() {
    let mut graphics = graphics(Duration::ZERO);
    for _ in 0..3 {
        graphics.render().unwrap();
    }
    graphics.destroy().unwrap();

    let signals: Vec<u64> = graphics
        .backend()
        .journal()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Signal(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(signals, vec![1, 2, 3, 4]);
}

#[test]
fn test_first_frame_rebuilds_views() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();
    graphics.render().unwrap();

    let journal = graphics.backend().journal();
    assert_eq!(journal.count(|e| *e == Event::RebuildViews), 1);
    assert!(!graphics.surface().views_stale());
}

#[test]
fn test_recorder_is_idle_between_frames() {
    let mut graphics = graphics(Duration::ZERO);
    assert_eq!(graphics.recorder_state(), RecorderState::Idle);

    for _ in 0..4 {
        graphics.render().unwrap();
        assert_eq!(graphics.recorder_state(), RecorderState::Idle);
        assert_eq!(graphics.recorder().commands().len(), COMMANDS_PER_FRAME);
    }
}

#[test]
fn test_back_buffers_are_presentable_after_each_frame() {
    let mut graphics = graphics(Duration::ZERO);
    for _ in 0..3 {
        graphics.render().unwrap();
        for index in 0..graphics.surface().buffer_count() {
            assert_eq!(
                graphics.surface().buffer_state(index),
                Some(BackBufferState::Presentable)
            );
        }
    }
}

#[test]
fn test_resize_drains_before_releasing_buffers() {
    let mut graphics = graphics(Duration::from_millis(2));
    graphics.render().unwrap();
    graphics.render().unwrap();
    graphics.render().unwrap();
    assert_eq!(graphics.current_index(), 1);

    graphics.resize(640, 480).unwrap();

    let journal = graphics.backend().journal();
    let events = journal.events();
    let release = journal
        .position(|e| matches!(e, Event::Release { .. }))
        .expect("Buffers were not released");
    assert!(
        matches!(events[release - 1], Event::Wait(_)),
        "Release must follow a wait, got {:?}",
        &events[..release]
    );
    assert_eq!(events[release], Event::Release { outstanding: 0 });
    assert_eq!(
        events[release + 1],
        Event::Recreate {
            width: 640,
            height: 480,
            index: 0
        }
    );

    assert_eq!(graphics.extent(), Extent::new(640, 480));
    assert_eq!(graphics.current_index(), 0);
    assert_eq!(graphics.current_slot(), 0);
    assert!(!graphics.has_outstanding_work().unwrap());
    assert_eq!(graphics.drain_count(), 1);
}

#[test]
fn test_frames_after_resize_start_at_first_buffer() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();
    graphics.resize(640, 480).unwrap();
    graphics.render().unwrap();
    graphics.render().unwrap();

    let journal = graphics.backend().journal();
    assert_eq!(journal.presented_indices(), vec![0, 0, 1]);
    assert_eq!(journal.count(|e| *e == Event::RebuildViews), 2);
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();

    graphics.resize(0, 0).unwrap();
    graphics.resize(800, 0).unwrap();

    assert_eq!(graphics.extent(), Extent::new(1280, 720));
    assert_eq!(graphics.drain_count(), 0);
    assert_eq!(
        graphics
            .backend()
            .journal()
            .count(|e| matches!(e, Event::Release { .. })),
        0
    );
}

#[test]
fn test_cpu_stays_at_most_one_frame_ahead() {
    let mut graphics = graphics(Duration::from_millis(5));

    for _ in 0..6 {
        graphics.render().unwrap();
        let outstanding = graphics.backend().gpu().outstanding().unwrap();
        assert!(outstanding <= 1, "{} frames outstanding", outstanding);
    }
}

#[test]
fn test_no_outstanding_work_after_destroy() {
    let mut graphics = graphics(Duration::from_millis(3));
    graphics.render().unwrap();
    graphics.render().unwrap();

    graphics.destroy().unwrap();

    assert!(!graphics.has_outstanding_work().unwrap());
    assert_eq!(graphics.backend().gpu().outstanding().unwrap(), 0);
    assert_eq!(graphics.backend().gpu().executed().unwrap(), 2);
}

#[test]
fn test_destroy_is_idempotent() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();

    graphics.destroy().unwrap();
    graphics.destroy().unwrap();

    assert!(graphics.is_destroyed());
    assert_eq!(graphics.drain_count(), 1);
    assert!(graphics.render().is_err());
}

#[test]
fn test_device_loss_fails_the_frame() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();

    graphics.backend().gpu().lose_device();

    let err = graphics.render().unwrap_err();
    assert!(err.is_device_lost(), "unexpected error: {}", err.chain());
    assert_eq!(err.kind_name(), "DeviceLostError");
}

#[test]
fn test_device_loss_fails_resize() {
    let mut graphics = graphics(Duration::ZERO);
    graphics.render().unwrap();
    graphics.backend().gpu().lose_device();

    let err = graphics.resize(640, 480).unwrap_err();
    assert!(err.is_device_lost());
    assert!(err.chain().starts_with("Can not resize window to 640x480"));
}

#[test]
fn test_extra_back_buffers_share_frame_slots() {
    let mut graphics = graphics_with_buffers(3).expect("Failed to create headless graphics");
    for _ in 0..5 {
        graphics.render().unwrap();
    }
    graphics.destroy().unwrap();

    let journal = graphics.backend().journal();
    assert_eq!(journal.presented_indices(), vec![0, 1, 2, 0, 1]);
    let slots: Vec<usize> = journal
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Submit { slot, .. } => Some(slot),
            _ => None,
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 0, 0, 1]);
    assert_eq!(graphics.backend().gpu().outstanding().unwrap(), 0);
}

#[test]
fn test_too_few_back_buffers_is_setup_error() {
    let Err(err) = graphics_with_buffers(1) else {
        panic!("a single back-buffer was accepted");
    };
    assert_eq!(err.kind_name(), "SetupError");
}
