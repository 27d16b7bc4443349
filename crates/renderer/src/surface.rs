//! Presentation surface contract.

use std::fmt;

use triangle_core::Result;

/// Size of the drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// GPU-visible state of a back-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackBufferState {
    /// Owned by the presentation engine, may be shown.
    Presentable,
    /// Bound as the color target of the frame being recorded.
    RenderTarget,
}

/// A chain of back-buffers bound to a display region.
///
/// Implementations exclusively own their back-buffers. The buffers are
/// released and recreated as a unit, and only after the caller has drained
/// all GPU work that may reference them.
pub trait PresentationSurface {
    /// Current size of the back-buffers.
    fn extent(&self) -> Extent;

    /// Index of the back-buffer the next frame renders into.
    ///
    /// Changes after every successful [`present`](Self::present).
    fn current_index(&self) -> usize;

    /// Number of back-buffers in the chain.
    fn buffer_count(&self) -> usize;

    /// Hands the current back-buffer to the display and rotates to the next one.
    fn present(&mut self) -> Result<()>;

    /// Releases every back-buffer and its views.
    fn release_buffers(&mut self) -> Result<()>;

    /// Requests a new set of back-buffers at `width` x `height` and resets the
    /// current index from the presentation mechanism. Views become stale.
    fn recreate_buffers(&mut self, width: u32, height: u32) -> Result<()>;

    /// Returns true when the back-buffer views must be rebuilt before use.
    fn views_stale(&self) -> bool;

    /// Rebuilds the back-buffer views.
    fn rebuild_views(&mut self) -> Result<()>;

    /// Returns true when the presentation mechanism reported the chain as out of
    /// date and a full resize is required before the next frame.
    fn needs_rebuild(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_is_empty() {
        assert!(Extent::new(0, 720).is_empty());
        assert!(Extent::new(1280, 0).is_empty());
        assert!(!Extent::new(1280, 720).is_empty());
    }

    #[test]
    fn test_extent_display() {
        assert_eq!(Extent::new(640, 480).to_string(), "640x480");
    }
}
