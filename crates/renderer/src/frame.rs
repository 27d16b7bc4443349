//! Per-frame slots.
//!
//! One [`FrameSlot`] exists per in-flight frame. Each pairs a command allocator
//! with the completion marker last associated with it. [`FrameSlots`] is a
//! fixed-size arena indexed by frame slot.

use std::ops::{Index, IndexMut};

use triangle_core::{Error, Result};

use crate::FRAME_COUNT;

/// Backing storage for a frame's command list.
pub trait CommandAllocator {
    /// Reclaims all memory used by previously recorded command lists.
    ///
    /// Only called once the GPU has finished with every list from this allocator.
    fn reset(&mut self) -> Result<()>;
}

/// Maps a back-buffer index onto its frame slot.
#[inline]
pub fn slot_for(buffer_index: usize) -> usize {
    buffer_index % FRAME_COUNT
}

/// One in-flight frame context.
#[derive(Debug)]
pub struct FrameSlot<A> {
    index: usize,
    allocator: A,
    marker: u64,
}

impl<A: CommandAllocator> FrameSlot<A> {
    /// Creates a slot with marker 0, which every fence has already reached.
    pub fn new(index: usize, allocator: A) -> Self {
        Self {
            index,
            allocator,
            marker: 0,
        }
    }

    /// Slot index in `0..FRAME_COUNT`.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fence value that completes this slot's most recent GPU work.
    #[inline]
    pub fn marker(&self) -> u64 {
        self.marker
    }

    #[inline]
    pub fn set_marker(&mut self, marker: u64) {
        self.marker = marker;
    }

    /// Returns true if the GPU may still be reading this slot's resources.
    #[inline]
    pub fn in_use(&self, completed: u64) -> bool {
        completed < self.marker
    }

    /// Resets the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceInUse`] if `completed` has not reached the
    /// slot's marker. The allocator is left untouched in that case.
    pub fn reset_allocator(&mut self, completed: u64) -> Result<()> {
        if self.in_use(completed) {
            return Err(Error::ResourceInUse {
                slot: self.index,
                marker: self.marker,
                completed,
            });
        }
        self.allocator.reset()
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    #[inline]
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }
}

/// Exactly [`FRAME_COUNT`] frame slots.
#[derive(Debug)]
pub struct FrameSlots<A> {
    slots: [FrameSlot<A>; FRAME_COUNT],
}

impl<A: CommandAllocator> FrameSlots<A> {
    /// Wraps one allocator per slot, in slot order.
    pub fn new(allocators: [A; FRAME_COUNT]) -> Self {
        let mut index = 0;
        let slots = allocators.map(|allocator| {
            let slot = FrameSlot::new(index, allocator);
            index += 1;
            slot
        });
        Self { slots }
    }

    /// Returns true if any slot's marker is beyond `completed`.
    pub fn any_in_use(&self, completed: u64) -> bool {
        self.slots.iter().any(|slot| slot.in_use(completed))
    }

    /// Largest marker over all slots.
    pub fn max_marker(&self) -> u64 {
        self.slots.iter().map(FrameSlot::marker).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot<A>> {
        self.slots.iter()
    }
}

impl<A> Index<usize> for FrameSlots<A> {
    type Output = FrameSlot<A>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.slots[index]
    }
}

impl<A> IndexMut<usize> for FrameSlots<A> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.slots[index]
    }
}
