//! Simulated GPU backend.
//!
//! A worker thread stands in for the GPU queue. It consumes submitted command
//! lists and fence signals strictly in order, optionally sleeping per command
//! list, and publishes the fence value through a mutex and condition variable.
//! The surface tracks the state of each back-buffer and every interaction is
//! appended to a shared [`Journal`], so the frame lifecycle can be observed
//! without a display or a driver.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use triangle_renderer::headless::{self, Event};
//! use triangle_renderer::Extent;
//!
//! # fn main() -> triangle_core::Result<()> {
//! let mut graphics = headless::create(Extent::new(1280, 720), [0.0, 0.0, 0.0, 1.0], Duration::ZERO)?;
//! graphics.render()?;
//! graphics.destroy()?;
//!
//! let presents = graphics.backend().journal().count(|e| matches!(e, Event::Present { .. }));
//! assert_eq!(presents, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use triangle_core::{Error, Result};

use crate::FRAME_COUNT;
use crate::backend::Backend;
use crate::frame::CommandAllocator;
use crate::graphics::Graphics;
use crate::recorder::Command;
use crate::surface::{BackBufferState, Extent, PresentationSurface};
use crate::sync::TimelineFence;

/// Something the simulated GPU or surface observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A command list was queued.
    Submit { slot: usize, commands: usize },
    /// A fence signal was queued.
    Signal(u64),
    /// The CPU blocked on a fence value.
    Wait(u64),
    /// A back-buffer was handed to the display.
    Present { index: usize },
    /// Back-buffers were released with `outstanding` command lists unfinished.
    Release { outstanding: u64 },
    /// Back-buffers were recreated; `index` is the new current index.
    Recreate { width: u32, height: u32, index: usize },
    /// Back-buffer views were rebuilt.
    RebuildViews,
}

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.lock().push(event);
    }

    /// Copy of all events so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Position of the first event matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.lock().iter().position(predicate)
    }

    /// Back-buffer indices in presentation order.
    pub fn presented_indices(&self) -> Vec<usize> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Present { index } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        // The journal only holds plain data; a panic elsewhere can not corrupt it.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
enum Work {
    Execute { slot: usize },
    Signal(u64),
    Shutdown,
}

#[derive(Debug, Default)]
struct GpuState {
    queue: VecDeque<Work>,
    completed: u64,
    submitted: u64,
    executed: u64,
    lost: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<GpuState>,
    progress: Condvar,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, GpuState>> {
        self.state
            .lock()
            .map_err(|_| Error::DeviceLost("Simulated GPU state poisoned".to_string()))
    }
}

/// The simulated GPU: one queue executed by a worker thread.
pub struct HeadlessGpu {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl HeadlessGpu {
    /// Starts the worker. Each command list takes `latency` to execute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the worker thread can not be spawned.
    pub fn start(latency: Duration) -> Result<Arc<Self>> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("headless-gpu".to_string())
            .spawn(move || run_queue(&worker_shared, latency))
            .map_err(|e| Error::Setup(format!("Can not start simulated GPU: {}", e)))?;

        info!("Simulated GPU started (latency {:?})", latency);
        Ok(Arc::new(Self {
            shared,
            worker: Some(worker),
        }))
    }

    fn push(&self, work: Work) -> Result<()> {
        let mut state = self.shared.lock()?;
        if let Work::Execute { .. } = work {
            state.submitted += 1;
        }
        state.queue.push_back(work);
        self.shared.progress.notify_all();
        Ok(())
    }

    /// Command lists submitted but not yet executed.
    pub fn outstanding(&self) -> Result<u64> {
        let state = self.shared.lock()?;
        Ok(state.submitted - state.executed)
    }

    /// Command lists executed so far.
    pub fn executed(&self) -> Result<u64> {
        Ok(self.shared.lock()?.executed)
    }

    /// Simulates device removal. Every later fence operation fails.
    pub fn lose_device(&self) {
        match self.shared.state.lock() {
            Ok(mut state) => state.lost = true,
            Err(poisoned) => poisoned.into_inner().lost = true,
        }
        self.shared.progress.notify_all();
        warn!("Simulated GPU device lost");
    }

    fn completed(&self) -> Result<u64> {
        let state = self.shared.lock()?;
        if state.lost {
            return Err(Error::DeviceLost("GPU device removed".to_string()));
        }
        Ok(state.completed)
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        let state = self.shared.lock()?;
        let state = self
            .shared
            .progress
            .wait_while(state, |s| s.completed < value && !s.lost)
            .map_err(|_| Error::DeviceLost("Simulated GPU state poisoned".to_string()))?;
        if state.lost {
            return Err(Error::DeviceLost(format!(
                "GPU device removed while waiting for {}",
                value
            )));
        }
        Ok(())
    }
}

impl Drop for HeadlessGpu {
    fn drop(&mut self) {
        if self.push(Work::Shutdown).is_err() {
            warn!("Simulated GPU state poisoned during shutdown");
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Simulated GPU worker panicked");
        }
        debug!("Simulated GPU stopped");
    }
}

fn run_queue(shared: &Shared, latency: Duration) {
    loop {
        let work = {
            let Ok(state) = shared.state.lock() else {
                return;
            };
            let Ok(mut state) = shared.progress.wait_while(state, |s| s.queue.is_empty()) else {
                return;
            };
            match state.queue.pop_front() {
                Some(work) => work,
                None => continue,
            }
        };

        match work {
            Work::Shutdown => return,
            Work::Execute { slot } => {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                let Ok(mut state) = shared.state.lock() else {
                    return;
                };
                state.executed += 1;
                tracing::trace!("Executed command list of slot {}", slot);
            }
            Work::Signal(value) => {
                let Ok(mut state) = shared.state.lock() else {
                    return;
                };
                if !state.lost {
                    state.completed = state.completed.max(value);
                }
            }
        }
        shared.progress.notify_all();
    }
}

/// Fence backed by the simulated queue.
pub struct HeadlessFence {
    gpu: Arc<HeadlessGpu>,
    journal: Journal,
}

impl HeadlessFence {
    pub fn new(gpu: Arc<HeadlessGpu>, journal: Journal) -> Self {
        Self { gpu, journal }
    }
}

impl TimelineFence for HeadlessFence {
    fn signal(&self, value: u64) -> Result<()> {
        self.gpu.completed()?;
        self.journal.record(Event::Signal(value));
        self.gpu.push(Work::Signal(value))
    }

    fn completed_value(&self) -> Result<u64> {
        self.gpu.completed()
    }

    fn wait(&self, value: u64) -> Result<()> {
        self.journal.record(Event::Wait(value));
        self.gpu.wait_for(value)
    }
}

/// A frame slot's command storage.
#[derive(Debug)]
pub struct HeadlessAllocator {
    slot: usize,
    list: Vec<Command>,
    open: bool,
    resets: u64,
}

impl HeadlessAllocator {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            list: Vec::new(),
            open: false,
            resets: 0,
        }
    }

    /// Commands recorded since the last reset.
    pub fn commands(&self) -> &[Command] {
        &self.list
    }

    pub fn reset_count(&self) -> u64 {
        self.resets
    }
}

impl CommandAllocator for HeadlessAllocator {
    fn reset(&mut self) -> Result<()> {
        self.list.clear();
        self.open = false;
        self.resets += 1;
        Ok(())
    }
}

/// Back-buffer chain without a display.
pub struct HeadlessSurface {
    extent: Extent,
    buffers: Vec<BackBufferState>,
    current: usize,
    views_stale: bool,
    gpu: Arc<HeadlessGpu>,
    journal: Journal,
}

impl HeadlessSurface {
    /// Creates `FRAME_COUNT` presentable back-buffers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceCreation`] for a zero-sized extent.
    pub fn new(extent: Extent, gpu: Arc<HeadlessGpu>, journal: Journal) -> Result<Self> {
        Self::with_buffer_count(extent, FRAME_COUNT, gpu, journal)
    }

    /// Creates `count` presentable back-buffers, like a swapchain that hands
    /// out more images than requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceCreation`] for a zero-sized extent or no buffers.
    pub fn with_buffer_count(
        extent: Extent,
        count: usize,
        gpu: Arc<HeadlessGpu>,
        journal: Journal,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::SurfaceCreation(
                "Can not create a surface without back-buffers".to_string(),
            ));
        }
        if extent.is_empty() {
            return Err(Error::SurfaceCreation(format!(
                "Can not create a {} surface",
                extent
            )));
        }
        Ok(Self {
            extent,
            buffers: vec![BackBufferState::Presentable; count],
            current: 0,
            views_stale: true,
            gpu,
            journal,
        })
    }

    /// State of back-buffer `index`.
    pub fn buffer_state(&self, index: usize) -> Option<BackBufferState> {
        self.buffers.get(index).copied()
    }

    fn transition(&mut self, index: usize, from: BackBufferState, to: BackBufferState) -> Result<()> {
        let state = self
            .buffers
            .get_mut(index)
            .ok_or_else(|| Error::Recording(format!("Back-buffer {} does not exist", index)))?;
        if *state != from {
            return Err(Error::Recording(format!(
                "Back-buffer {} is {:?}, expected {:?}",
                index, state, from
            )));
        }
        *state = to;
        Ok(())
    }

    fn expect_state(&self, index: usize, expected: BackBufferState) -> Result<()> {
        match self.buffers.get(index) {
            Some(state) if *state == expected => Ok(()),
            Some(state) => Err(Error::Recording(format!(
                "Back-buffer {} is {:?}, expected {:?}",
                index, state, expected
            ))),
            None => Err(Error::Recording(format!(
                "Back-buffer {} does not exist",
                index
            ))),
        }
    }
}

impl PresentationSurface for HeadlessSurface {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn present(&mut self) -> Result<()> {
        match self.buffers.get(self.current) {
            Some(BackBufferState::Presentable) => {}
            Some(state) => {
                return Err(Error::Submission(format!(
                    "Back-buffer {} presented while {:?}",
                    self.current, state
                )));
            }
            None => {
                return Err(Error::Submission(
                    "No back-buffers to present".to_string(),
                ));
            }
        }
        self.journal.record(Event::Present {
            index: self.current,
        });
        self.current = (self.current + 1) % self.buffers.len();
        Ok(())
    }

    fn release_buffers(&mut self) -> Result<()> {
        let outstanding = self.gpu.outstanding()?;
        self.journal.record(Event::Release { outstanding });
        if outstanding > 0 {
            return Err(Error::Resize(format!(
                "{} command lists still reference the back-buffers",
                outstanding
            )));
        }
        self.buffers.clear();
        self.views_stale = true;
        Ok(())
    }

    fn recreate_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            return Err(Error::Resize(format!(
                "Can not allocate {} back-buffers",
                extent
            )));
        }
        self.extent = extent;
        self.buffers = vec![BackBufferState::Presentable; self.buffers.len()];
        // A fresh chain starts at its first buffer
        self.current = 0;
        self.views_stale = true;
        self.journal.record(Event::Recreate {
            width,
            height,
            index: self.current,
        });
        Ok(())
    }

    fn views_stale(&self) -> bool {
        self.views_stale
    }

    fn rebuild_views(&mut self) -> Result<()> {
        if self.buffers.is_empty() {
            return Err(Error::Recording(
                "No back-buffers to build views for".to_string(),
            ));
        }
        self.views_stale = false;
        self.journal.record(Event::RebuildViews);
        Ok(())
    }
}

/// Backend for the simulated GPU.
pub struct HeadlessBackend {
    gpu: Arc<HeadlessGpu>,
    journal: Journal,
}

impl HeadlessBackend {
    pub fn new(gpu: Arc<HeadlessGpu>, journal: Journal) -> Self {
        Self { gpu, journal }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn gpu(&self) -> &Arc<HeadlessGpu> {
        &self.gpu
    }
}

impl Backend for HeadlessBackend {
    type Allocator = HeadlessAllocator;
    type Surface = HeadlessSurface;
    type Fence = HeadlessFence;

    fn begin(&mut self, allocator: &mut HeadlessAllocator) -> Result<()> {
        if allocator.open || !allocator.list.is_empty() {
            return Err(Error::Recording(format!(
                "Allocator of slot {} was not reset",
                allocator.slot
            )));
        }
        allocator.open = true;
        Ok(())
    }

    fn encode(
        &mut self,
        allocator: &mut HeadlessAllocator,
        surface: &mut HeadlessSurface,
        command: &Command,
    ) -> Result<()> {
        if !allocator.open {
            return Err(Error::Recording("Command list is closed".to_string()));
        }
        match *command {
            Command::PrepareTarget { rebuild_views } => {
                if rebuild_views {
                    surface.rebuild_views()?;
                } else if surface.views_stale() {
                    return Err(Error::Recording(
                        "Back-buffer views are stale".to_string(),
                    ));
                }
            }
            Command::SetFixedState { extent, .. } => {
                if extent.is_empty() {
                    return Err(Error::Recording(format!("Invalid viewport {}", extent)));
                }
            }
            Command::Transition { index, from, to } => surface.transition(index, from, to)?,
            Command::Clear { index, .. } => {
                surface.expect_state(index, BackBufferState::RenderTarget)?;
            }
            Command::Draw { .. } => {
                surface.expect_state(surface.current_index(), BackBufferState::RenderTarget)?;
            }
        }
        allocator.list.push(command.clone());
        Ok(())
    }

    fn close(&mut self, allocator: &mut HeadlessAllocator) -> Result<()> {
        if !allocator.open {
            return Err(Error::Recording("Command list is not recording".to_string()));
        }
        allocator.open = false;
        Ok(())
    }

    fn submit(&mut self, allocator: &mut HeadlessAllocator, _surface: &mut HeadlessSurface) -> Result<()> {
        if allocator.open {
            return Err(Error::Submission(
                "Command list submitted while recording".to_string(),
            ));
        }
        self.journal.record(Event::Submit {
            slot: allocator.slot,
            commands: allocator.list.len(),
        });
        self.gpu
            .push(Work::Execute {
                slot: allocator.slot,
            })
            .map_err(|e| Error::Submission(e.to_string()))
    }
}

/// Creates a [`Graphics`] over a fresh simulated GPU.
///
/// # Errors
///
/// Returns an error if the GPU worker can not start or `extent` is empty.
pub fn create(
    extent: Extent,
    clear_color: [f32; 4],
    latency: Duration,
) -> Result<Graphics<HeadlessBackend>> {
    let gpu = HeadlessGpu::start(latency)?;
    let journal = Journal::new();

    let surface = HeadlessSurface::new(extent, Arc::clone(&gpu), journal.clone())?;
    let fence = HeadlessFence::new(Arc::clone(&gpu), journal.clone());
    let allocators = [HeadlessAllocator::new(0), HeadlessAllocator::new(1)];
    let backend = HeadlessBackend::new(gpu, journal);

    Graphics::new(backend, surface, allocators, fence, clear_color)
}
