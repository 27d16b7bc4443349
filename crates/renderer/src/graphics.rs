//! The graphics facade.
//!
//! [`Graphics`] owns the presentation surface, the frame slots, the fence
//! protocol and the recorder, and runs one frame per [`Graphics::render`]:
//! record, submit, present, advance.
//!
//! # Resource Destruction Order
//!
//! [`Graphics::destroy`] drains the GPU first. Fields then drop in declaration
//! order: fence, slots (allocators), surface (back-buffers), and finally the
//! backend with the pipeline state, vertex buffer and device.

use tracing::{debug, error, info};

use triangle_core::{Error, Result, ResultExt};

use crate::FRAME_COUNT;
use crate::backend::Backend;
use crate::frame::FrameSlots;
use crate::recorder::{CommandRecorder, RecorderState};
use crate::surface::{Extent, PresentationSurface};
use crate::sync::SyncEngine;

/// Renders a static triangle through a [`Backend`].
pub struct Graphics<B: Backend> {
    recorder: CommandRecorder,
    sync: SyncEngine<B::Fence>,
    slots: FrameSlots<B::Allocator>,
    surface: B::Surface,
    backend: B,
    frames: u64,
    destroyed: bool,
}

impl<B: Backend> Graphics<B> {
    /// Assembles the renderer from backend-created parts.
    ///
    /// `fence` must start at 0 and `surface` must already expose a valid
    /// current back-buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the surface holds fewer than
    /// [`FRAME_COUNT`] back-buffers. More are accepted; frame slots are then
    /// shared by back-buffer index modulo [`FRAME_COUNT`].
    pub fn new(
        backend: B,
        surface: B::Surface,
        allocators: [B::Allocator; FRAME_COUNT],
        fence: B::Fence,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        if surface.buffer_count() < FRAME_COUNT {
            return Err(Error::Setup(format!(
                "Surface provides {} back-buffers, {} required",
                surface.buffer_count(),
                FRAME_COUNT
            )));
        }

        let sync = SyncEngine::new(fence, surface.current_index());
        info!(
            "Graphics initialized: {}, {} back-buffers, {} frame slots",
            surface.extent(),
            surface.buffer_count(),
            FRAME_COUNT
        );

        Ok(Self {
            recorder: CommandRecorder::new(clear_color),
            sync,
            slots: FrameSlots::new(allocators),
            surface,
            backend,
            frames: 0,
            destroyed: false,
        })
    }

    /// Per-iteration update hook. The scene is static.
    pub fn update(&mut self) {}

    /// Renders one frame: record, submit, present, advance.
    ///
    /// If the surface reported itself out of date, the back-buffers are
    /// rebuilt at the current extent first.
    ///
    /// # Errors
    ///
    /// Every failure is fatal: recording, submission, present, fence and
    /// rebuild errors are wrapped and returned.
    pub fn render(&mut self) -> Result<()> {
        if self.destroyed {
            return Err(Error::Setup("Graphics already destroyed".to_string()));
        }

        if self.surface.needs_rebuild() {
            let extent = self.surface.extent();
            debug!("Surface out of date, rebuilding at {}", extent);
            self.resize_buffers(extent)
                .context("Can not rebuild out-of-date surface")?;
            if self.surface.needs_rebuild() {
                debug!("Surface still out of date, skipping frame");
                return Ok(());
            }
        }

        let slot = self.sync.current_slot();
        let completed = self.sync.completed_value()?;

        self.recorder
            .record(
                &mut self.backend,
                &mut self.slots[slot],
                &mut self.surface,
                completed,
            )
            .context("Can not populate command list")?;

        self.backend
            .submit(self.slots[slot].allocator_mut(), &mut self.surface)
            .context("Can not execute command list")?;
        self.recorder.mark_submitted();

        self.surface.present().context("Can not present frame")?;

        let next_index = self.surface.current_index();
        self.sync
            .advance(&mut self.slots, next_index)
            .context("Can not move to next frame")?;

        self.frames += 1;
        Ok(())
    }

    /// Resizes the back-buffers.
    ///
    /// Zero sizes are ignored; the window is minimized and no surface of that
    /// size is ever created.
    ///
    /// # Errors
    ///
    /// Returns the drain failure ([`Error::DeviceLost`]) or the reallocation
    /// failure ([`Error::Resize`]).
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            debug!("Ignoring resize to zero dimensions");
            return Ok(());
        }
        if self.destroyed {
            return Err(Error::Setup("Graphics already destroyed".to_string()));
        }

        info!("Resizing window to {}", extent);
        self.resize_buffers(extent)
            .with_context(|| format!("Can not resize window to {}", extent))
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<()> {
        self.sync
            .drain(&mut self.slots)
            .context("Can not wait for GPU before resize")?;

        self.surface
            .release_buffers()
            .context("Can not release back-buffers")?;
        self.surface
            .recreate_buffers(extent.width, extent.height)
            .context("Can not resize back-buffers")?;

        let index = self.surface.current_index();
        self.sync.rebase(index);
        debug!("Back-buffers recreated, current index {}", index);
        Ok(())
    }

    /// Drains all GPU work. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceLost`] if the drain fails.
    pub fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        self.sync
            .drain(&mut self.slots)
            .context("Can not wait for GPU at shutdown")?;

        info!(
            "Graphics destroyed after {} frames ({} drains, {} advances)",
            self.frames,
            self.sync.drain_count(),
            self.sync.advance_count()
        );
        Ok(())
    }

    /// Returns true if any frame's GPU work is still outstanding.
    pub fn has_outstanding_work(&self) -> Result<bool> {
        self.sync.has_outstanding_work(&self.slots)
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn drain_count(&self) -> u64 {
        self.sync.drain_count()
    }

    #[inline]
    pub fn advance_count(&self) -> u64 {
        self.sync.advance_count()
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.surface.current_index()
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.sync.current_slot()
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.surface.extent()
    }

    #[inline]
    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    #[inline]
    pub fn recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    #[inline]
    pub fn slots(&self) -> &FrameSlots<B::Allocator> {
        &self.slots
    }

    #[inline]
    pub fn surface(&self) -> &B::Surface {
        &self.surface
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl<B: Backend> Drop for Graphics<B> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            error!("Failed to drain GPU during drop: {}", e.chain());
        }
    }
}
