//! Per-frame command recording.
//!
//! Each frame runs `Idle -> Recording -> Closed` and appends exactly six
//! commands, in order:
//!
//! 1. [`Command::PrepareTarget`] - rebuild back-buffer views if they went stale
//! 2. [`Command::SetFixedState`] - viewport, scissor and topology
//! 3. [`Command::Transition`] - back-buffer from presentable to render target
//! 4. [`Command::Clear`] - clear to the background color
//! 5. [`Command::Draw`] - bind the vertex buffer and draw the triangle
//! 6. [`Command::Transition`] - back to presentable

use tracing::trace;

use triangle_core::{Error, Result, ResultExt};

use crate::TRIANGLE_VERTEX_COUNT;
use crate::backend::Backend;
use crate::frame::FrameSlot;
use crate::surface::{BackBufferState, Extent, PresentationSurface};

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
}

/// One logical step of a frame's command list.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Makes the back-buffer usable as a target, rebuilding views when stale.
    PrepareTarget { rebuild_views: bool },
    /// Fixed viewport/scissor covering the surface, and the topology.
    SetFixedState { extent: Extent, topology: Topology },
    /// Back-buffer state change.
    Transition {
        index: usize,
        from: BackBufferState,
        to: BackBufferState,
    },
    /// Clears the back-buffer.
    Clear { index: usize, color: [f32; 4] },
    /// Binds the static vertex buffer and draws.
    Draw { vertex_count: u32 },
}

/// Number of commands in every frame.
pub const COMMANDS_PER_FRAME: usize = 6;

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Closed,
}

/// Builds the command list for one frame.
#[derive(Debug)]
pub struct CommandRecorder {
    state: RecorderState,
    commands: Vec<Command>,
    clear_color: [f32; 4],
}

impl CommandRecorder {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            state: RecorderState::Idle,
            commands: Vec::with_capacity(COMMANDS_PER_FRAME),
            clear_color,
        }
    }

    #[inline]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Commands of the frame being or last recorded.
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// The six commands for rendering into `surface`'s current back-buffer.
    pub fn frame_commands(&self, surface: &impl PresentationSurface) -> [Command; COMMANDS_PER_FRAME] {
        let index = surface.current_index();
        [
            Command::PrepareTarget {
                rebuild_views: surface.views_stale(),
            },
            Command::SetFixedState {
                extent: surface.extent(),
                topology: Topology::TriangleList,
            },
            Command::Transition {
                index,
                from: BackBufferState::Presentable,
                to: BackBufferState::RenderTarget,
            },
            Command::Clear {
                index,
                color: self.clear_color,
            },
            Command::Draw {
                vertex_count: TRIANGLE_VERTEX_COUNT,
            },
            Command::Transition {
                index,
                from: BackBufferState::RenderTarget,
                to: BackBufferState::Presentable,
            },
        ]
    }

    /// Records and closes a frame's command list.
    ///
    /// Reclaims `slot`'s allocator first, which fails with
    /// [`Error::ResourceInUse`] if `completed` has not reached the slot's marker.
    ///
    /// # Errors
    ///
    /// Any backend failure is returned as [`Error::Recording`]; the recorder is
    /// back in `Idle` afterwards.
    pub fn record<B: Backend>(
        &mut self,
        backend: &mut B,
        slot: &mut FrameSlot<B::Allocator>,
        surface: &mut B::Surface,
        completed: u64,
    ) -> Result<()> {
        if self.state == RecorderState::Recording {
            return Err(Error::Recording(
                "Command list is already recording".to_string(),
            ));
        }

        slot.reset_allocator(completed)
            .with_context(|| format!("Can not reclaim allocator of frame slot {}", slot.index()))?;

        self.commands.clear();
        self.state = RecorderState::Recording;

        let result = self.record_steps(backend, slot, surface);
        self.state = match result {
            Ok(()) => RecorderState::Closed,
            Err(_) => RecorderState::Idle,
        };
        result
    }

    fn record_steps<B: Backend>(
        &mut self,
        backend: &mut B,
        slot: &mut FrameSlot<B::Allocator>,
        surface: &mut B::Surface,
    ) -> Result<()> {
        let allocator = slot.allocator_mut();
        backend
            .begin(allocator)
            .context("Can not begin command list")?;

        for command in self.frame_commands(&*surface) {
            trace!("Recording {:?}", command);
            backend
                .encode(allocator, surface, &command)
                .with_context(|| format!("Can not record {:?}", command))?;
            self.commands.push(command);
        }

        backend
            .close(allocator)
            .context("Can not close command list")
    }

    /// Marks the closed list as handed to the GPU queue.
    pub fn mark_submitted(&mut self) {
        if self.state == RecorderState::Closed {
            self.state = RecorderState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CommandAllocator;
    use crate::sync::TimelineFence;

    #[derive(Debug, Default)]
    struct ListAllocator {
        list: Vec<Command>,
        resets: u32,
    }

    impl CommandAllocator for ListAllocator {
        fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            self.list.clear();
            Ok(())
        }
    }

    struct FixedSurface {
        stale: bool,
        index: usize,
    }

    impl PresentationSurface for FixedSurface {
        fn extent(&self) -> Extent {
            Extent::new(1280, 720)
        }
        fn current_index(&self) -> usize {
            self.index
        }
        fn buffer_count(&self) -> usize {
            2
        }
        fn present(&mut self) -> Result<()> {
            Ok(())
        }
        fn release_buffers(&mut self) -> Result<()> {
            Ok(())
        }
        fn recreate_buffers(&mut self, _width: u32, _height: u32) -> Result<()> {
            Ok(())
        }
        fn views_stale(&self) -> bool {
            self.stale
        }
        fn rebuild_views(&mut self) -> Result<()> {
            self.stale = false;
            Ok(())
        }
    }

    struct NoFence;

    impl TimelineFence for NoFence {
        fn signal(&self, _value: u64) -> Result<()> {
            Ok(())
        }
        fn completed_value(&self) -> Result<u64> {
            Ok(0)
        }
        fn wait(&self, _value: u64) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct ListBackend {
        fail_on_draw: bool,
    }

    impl Backend for ListBackend {
        type Allocator = ListAllocator;
        type Surface = FixedSurface;
        type Fence = NoFence;

        fn begin(&mut self, allocator: &mut ListAllocator) -> Result<()> {
            assert!(allocator.list.is_empty());
            Ok(())
        }

        fn encode(
            &mut self,
            allocator: &mut ListAllocator,
            surface: &mut FixedSurface,
            command: &Command,
        ) -> Result<()> {
            match command {
                Command::PrepareTarget { rebuild_views: true } => surface.rebuild_views()?,
                Command::Draw { .. } if self.fail_on_draw => {
                    return Err(Error::Recording("draw rejected".into()));
                }
                _ => {}
            }
            allocator.list.push(command.clone());
            Ok(())
        }

        fn close(&mut self, _allocator: &mut ListAllocator) -> Result<()> {
            Ok(())
        }

        fn submit(&mut self, _allocator: &mut ListAllocator, _surface: &mut FixedSurface) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_records_six_commands_in_order() {
        let mut recorder = CommandRecorder::new([0.0, 0.0, 0.0, 1.0]);
        let mut backend = ListBackend::default();
        let mut slot = FrameSlot::new(0, ListAllocator::default());
        let mut surface = FixedSurface { stale: true, index: 1 };

        recorder.record(&mut backend, &mut slot, &mut surface, 0).unwrap();

        assert_eq!(recorder.state(), RecorderState::Closed);
        let commands = recorder.commands();
        assert_eq!(commands.len(), COMMANDS_PER_FRAME);
        assert_eq!(commands[0], Command::PrepareTarget { rebuild_views: true });
        assert!(matches!(commands[1], Command::SetFixedState { topology: Topology::TriangleList, .. }));
        assert_eq!(
            commands[2],
            Command::Transition {
                index: 1,
                from: BackBufferState::Presentable,
                to: BackBufferState::RenderTarget
            }
        );
        assert!(matches!(commands[3], Command::Clear { index: 1, .. }));
        assert_eq!(commands[4], Command::Draw { vertex_count: 3 });
        assert_eq!(
            commands[5],
            Command::Transition {
                index: 1,
                from: BackBufferState::RenderTarget,
                to: BackBufferState::Presentable
            }
        );
        assert!(!surface.stale);
    }

    #[test]
    fn test_second_frame_starts_from_empty_list() {
        let mut recorder = CommandRecorder::new([0.0; 4]);
        let mut backend = ListBackend::default();
        let mut slot = FrameSlot::new(0, ListAllocator::default());
        let mut surface = FixedSurface { stale: true, index: 0 };

        recorder.record(&mut backend, &mut slot, &mut surface, 0).unwrap();
        recorder.mark_submitted();
        assert_eq!(recorder.state(), RecorderState::Idle);

        recorder.record(&mut backend, &mut slot, &mut surface, 0).unwrap();
        assert_eq!(recorder.commands().len(), COMMANDS_PER_FRAME);
        assert_eq!(slot.allocator().list.len(), COMMANDS_PER_FRAME);
        assert_eq!(slot.allocator().resets, 2);
        assert_eq!(
            recorder.commands()[0],
            Command::PrepareTarget { rebuild_views: false }
        );
    }

    #[test]
    fn test_slot_in_use_is_not_recorded() {
        let mut recorder = CommandRecorder::new([0.0; 4]);
        let mut backend = ListBackend::default();
        let mut slot = FrameSlot::new(1, ListAllocator::default());
        slot.set_marker(3);
        let mut surface = FixedSurface { stale: false, index: 1 };

        let err = recorder
            .record(&mut backend, &mut slot, &mut surface, 2)
            .unwrap_err();
        assert!(matches!(err.root(), Error::ResourceInUse { slot: 1, .. }));
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(slot.allocator().resets, 0);
    }

    #[test]
    fn test_backend_failure_is_recording_error() {
        let mut recorder = CommandRecorder::new([0.0; 4]);
        let mut backend = ListBackend { fail_on_draw: true };
        let mut slot = FrameSlot::new(0, ListAllocator::default());
        let mut surface = FixedSurface { stale: false, index: 0 };

        let err = recorder
            .record(&mut backend, &mut slot, &mut surface, 0)
            .unwrap_err();
        assert!(matches!(err.root(), Error::Recording(_)));
        assert_eq!(recorder.state(), RecorderState::Idle);
    }
}
