//! CPU/GPU synchronization over a single timeline fence.
//!
//! The fence is a counter the GPU queue raises as submitted work completes.
//! Every frame slot remembers the fence value that retires its latest work
//! (its marker). The engine keeps one rule: a slot's marker is always the
//! value that will be signaled once that slot's GPU work completes.
//!
//! Two operations keep the CPU from touching resources the GPU still reads:
//! - [`SyncEngine::drain`] signals a fresh value and blocks until it is reached,
//!   so nothing is outstanding afterwards.
//! - [`SyncEngine::advance`] signals the value for the frame just submitted,
//!   moves to the slot of the next back-buffer, and blocks only if that slot's
//!   previous frame has not completed. At most `FRAME_COUNT - 1` frames stay
//!   in flight past the CPU.

use tracing::debug;

use triangle_core::{Result, ResultExt};

use crate::frame::{CommandAllocator, FrameSlots, slot_for};

/// A monotonically increasing GPU-to-CPU progress counter.
///
/// Implementations report every failure as [`triangle_core::Error::DeviceLost`].
pub trait TimelineFence {
    /// Asks the GPU queue to raise the counter to `value` once all work
    /// submitted before this call has completed.
    fn signal(&self, value: u64) -> Result<()>;

    /// The value the GPU has reached so far.
    fn completed_value(&self) -> Result<u64>;

    /// Blocks the calling thread until the counter reaches `value`.
    ///
    /// There is no timeout; completion is guaranteed unless the device is lost.
    fn wait(&self, value: u64) -> Result<()>;
}

/// Fence protocol state.
pub struct SyncEngine<F> {
    fence: F,
    /// Value the next signal will use.
    next_value: u64,
    /// Slot of the back-buffer being rendered.
    current: usize,
    drains: u64,
    advances: u64,
}

impl<F: TimelineFence> SyncEngine<F> {
    /// Creates the engine for a fence that starts at 0.
    ///
    /// `buffer_index` is the surface's current back-buffer index.
    pub fn new(fence: F, buffer_index: usize) -> Self {
        Self {
            fence,
            next_value: 1,
            current: slot_for(buffer_index),
            drains: 0,
            advances: 0,
        }
    }

    /// Slot the next frame records into.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Value the next signal will use.
    #[inline]
    pub fn next_value(&self) -> u64 {
        self.next_value
    }

    /// Number of drains performed.
    #[inline]
    pub fn drain_count(&self) -> u64 {
        self.drains
    }

    /// Number of advances performed.
    #[inline]
    pub fn advance_count(&self) -> u64 {
        self.advances
    }

    #[inline]
    pub fn fence(&self) -> &F {
        &self.fence
    }

    /// Reads the completed fence value.
    pub fn completed_value(&self) -> Result<u64> {
        self.fence
            .completed_value()
            .context("Can not read fence value")
    }

    /// Waits for all submitted GPU work to complete.
    pub fn drain<A: CommandAllocator>(&mut self, slots: &mut FrameSlots<A>) -> Result<()> {
        let value = self.next_value;

        self.fence
            .signal(value)
            .context("Can not signal fence for full synchronization")?;
        self.fence
            .wait(value)
            .context("Can not wait for full synchronization")?;

        slots[self.current].set_marker(value);
        self.next_value += 1;
        self.drains += 1;

        debug!("Drained GPU work up to fence value {}", value);
        Ok(())
    }

    /// Ends the frame just submitted and presented.
    ///
    /// `buffer_index` is the surface's current back-buffer index after present.
    pub fn advance<A: CommandAllocator>(
        &mut self,
        slots: &mut FrameSlots<A>,
        buffer_index: usize,
    ) -> Result<()> {
        let submitted = self.next_value;

        self.fence
            .signal(submitted)
            .context("Can not signal end of frame")?;
        slots[self.current].set_marker(submitted);
        self.next_value += 1;

        self.current = slot_for(buffer_index);

        let marker = slots[self.current].marker();
        let completed = self.completed_value()?;
        if completed < marker {
            debug!(
                "Waiting for slot {} (marker {}, completed {})",
                self.current, marker, completed
            );
            self.fence
                .wait(marker)
                .context("Can not wait for frame slot")?;
        }

        self.advances += 1;
        Ok(())
    }

    /// Re-reads the current slot after the surface reset its index.
    ///
    /// Only valid right after a drain, when no slot is in use.
    pub fn rebase(&mut self, buffer_index: usize) {
        self.current = slot_for(buffer_index);
    }

    /// Returns true if any slot's GPU work is still outstanding.
    pub fn has_outstanding_work<A: CommandAllocator>(&self, slots: &FrameSlots<A>) -> Result<bool> {
        let completed = self.completed_value()?;
        Ok(slots.any_in_use(completed))
    }
}
