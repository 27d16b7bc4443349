//! Frame lifecycle and GPU synchronization for the triangle renderer.
//!
//! This crate orchestrates one frame at a time:
//! - [`surface`] - the presentation surface contract (back-buffers, present, resize)
//! - [`frame`] - the fixed set of per-frame slots (allocator + completion marker)
//! - [`sync`] - the fence protocol bounding how far the CPU runs ahead of the GPU
//! - [`recorder`] - the ordered per-frame command sequence
//! - [`graphics`] - the [`Graphics`] facade tying them together
//!
//! Two backends implement the GPU side: [`vulkan`] for real hardware and
//! [`headless`], a simulated GPU on a worker thread.

pub mod backend;
pub mod frame;
pub mod graphics;
pub mod headless;
pub mod recorder;
pub mod shaders;
pub mod surface;
pub mod sync;
pub mod vulkan;

pub use backend::Backend;
pub use frame::{CommandAllocator, FrameSlot, FrameSlots, slot_for};
pub use graphics::Graphics;
pub use recorder::{Command, CommandRecorder, RecorderState, Topology};
pub use shaders::ShaderLibrary;
pub use surface::{BackBufferState, Extent, PresentationSurface};
pub use sync::{SyncEngine, TimelineFence};

/// Number of frame slots, and of back-buffers requested from the surface.
pub const FRAME_COUNT: usize = 2;

/// Vertices drawn by the single draw call of every frame.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;
