//! GPU backend seam.
//!
//! A backend turns the recorder's [`Command`] sequence into real GPU work and
//! owns the objects that live for the whole run (pipeline state, vertex buffer).

use triangle_core::Result;

use crate::frame::CommandAllocator;
use crate::recorder::Command;
use crate::surface::PresentationSurface;
use crate::sync::TimelineFence;

/// The GPU side of [`crate::Graphics`].
pub trait Backend {
    /// Per-slot command storage, also holding that slot's command list.
    type Allocator: CommandAllocator;
    /// Back-buffer chain.
    type Surface: PresentationSurface;
    /// Timeline fence advanced by the graphics queue.
    type Fence: TimelineFence;

    /// Opens a command list on a freshly reset allocator, bound to the
    /// pipeline state.
    fn begin(&mut self, allocator: &mut Self::Allocator) -> Result<()>;

    /// Appends one command.
    fn encode(
        &mut self,
        allocator: &mut Self::Allocator,
        surface: &mut Self::Surface,
        command: &Command,
    ) -> Result<()>;

    /// Closes the command list so it can be submitted.
    fn close(&mut self, allocator: &mut Self::Allocator) -> Result<()>;

    /// Submits the closed command list to the graphics queue.
    fn submit(&mut self, allocator: &mut Self::Allocator, surface: &mut Self::Surface)
    -> Result<()>;
}
