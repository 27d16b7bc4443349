//! Swapchain-backed presentation surface.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use triangle_core::{Error, Result};
use triangle_platform::Surface;
use triangle_rhi::RhiError;
use triangle_rhi::device::Device;
use triangle_rhi::instance::Instance;
use triangle_rhi::swapchain::Swapchain;
use triangle_rhi::sync::Semaphore;

use super::{rhi_error, vk_error};
use crate::FRAME_COUNT;
use crate::surface::{Extent, PresentationSurface};

/// Binary semaphores ordering acquire, render and present.
///
/// `image_available` holds one more semaphore than there are images, so an
/// acquire never reuses a semaphore still pending from an earlier acquire.
/// `render_finished` is indexed by image.
struct PresentSemaphores {
    image_available: Vec<Semaphore>,
    render_finished: Vec<Semaphore>,
}

impl PresentSemaphores {
    fn new(device: &Arc<Device>, image_count: usize) -> std::result::Result<Self, RhiError> {
        let image_available = (0..=image_count)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let render_finished = (0..image_count)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            image_available,
            render_finished,
        })
    }
}

/// A Vulkan swapchain bound to a window surface.
///
/// The next image is acquired eagerly after every present, so
/// [`current_index`](PresentationSurface::current_index) always names the image
/// the next frame renders into.
pub struct VulkanSurface {
    // Drop order: semaphores, swapchain, platform surface, then the shared handles.
    semaphores: Option<PresentSemaphores>,
    swapchain: Swapchain,
    surface: Surface,
    device: Arc<Device>,
    instance: Arc<Instance>,
    current: usize,
    acquired: Option<usize>,
    next_semaphore: usize,
    needs_rebuild: bool,
}

impl VulkanSurface {
    /// Creates a swapchain of [`FRAME_COUNT`] images (or the surface minimum)
    /// and acquires the first image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceCreation`] if the swapchain, its semaphores or
    /// the first acquire fail.
    pub fn new(
        instance: Arc<Instance>,
        device: Arc<Device>,
        surface: Surface,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            FRAME_COUNT as u32,
            vsync,
        )
        .map_err(|e| rhi_error("Can not create swapchain", e, Error::SurfaceCreation))?;

        let semaphores = PresentSemaphores::new(&device, swapchain.image_count())
            .map_err(|e| rhi_error("Can not create present semaphores", e, Error::SurfaceCreation))?;

        let mut created = Self {
            semaphores: Some(semaphores),
            swapchain,
            surface,
            device,
            instance,
            current: 0,
            acquired: None,
            next_semaphore: 0,
            needs_rebuild: false,
        };
        created
            .acquire()
            .map_err(|e| vk_error("Can not acquire first back-buffer", e, Error::SurfaceCreation))?;

        info!(
            "Presentation surface ready: {}x{}, {} images, {:?}",
            created.swapchain.extent().width,
            created.swapchain.extent().height,
            created.swapchain.image_count(),
            created.swapchain.present_mode()
        );
        Ok(created)
    }

    /// Color format of the back-buffers.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    #[inline]
    pub(crate) fn vk_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub(crate) fn image(&self, index: usize) -> Option<vk::Image> {
        self.swapchain.image(index)
    }

    #[inline]
    pub(crate) fn image_view(&self, index: usize) -> Option<vk::ImageView> {
        self.swapchain.image_view(index)
    }

    /// `(wait, signal)` semaphores for the frame rendering into the current image.
    pub(crate) fn frame_semaphores(&self) -> Result<(vk::Semaphore, vk::Semaphore)> {
        let semaphores = self
            .semaphores
            .as_ref()
            .ok_or_else(|| Error::Submission("Back-buffers are released".to_string()))?;
        let wait = self
            .acquired
            .and_then(|i| semaphores.image_available.get(i))
            .ok_or_else(|| Error::Submission("No back-buffer acquired".to_string()))?;
        let signal = semaphores.render_finished.get(self.current).ok_or_else(|| {
            Error::Submission(format!("Back-buffer {} has no semaphore", self.current))
        })?;
        Ok((wait.handle(), signal.handle()))
    }

    /// Acquires the next image. An out-of-date swapchain flags a rebuild
    /// instead of failing.
    fn acquire(&mut self) -> std::result::Result<(), vk::Result> {
        let Some(semaphores) = self.semaphores.as_ref() else {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        };
        let semaphore_index = self.next_semaphore % semaphores.image_available.len();
        let semaphore = semaphores.image_available[semaphore_index].handle();

        match self.swapchain.acquire_next_image(semaphore) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!("Acquired suboptimal image {}", index);
                }
                self.current = index as usize;
                self.acquired = Some(semaphore_index);
                self.next_semaphore = semaphore_index + 1;
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire");
                self.acquired = None;
                self.needs_rebuild = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl PresentationSurface for VulkanSurface {
    fn extent(&self) -> Extent {
        let extent = self.swapchain.extent();
        Extent::new(extent.width, extent.height)
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn buffer_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn present(&mut self) -> Result<()> {
        let (_, render_finished) = self.frame_semaphores()?;
        self.acquired = None;

        match self.swapchain.present(
            self.device.present_queue(),
            self.current as u32,
            render_finished,
        ) {
            Ok(false) => {}
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on present");
                self.needs_rebuild = true;
                return Ok(());
            }
            Err(e) => return Err(vk_error("Can not present back-buffer", e, Error::Submission)),
        }

        self.acquire()
            .map_err(|e| vk_error("Can not acquire next back-buffer", e, Error::Submission))
    }

    fn release_buffers(&mut self) -> Result<()> {
        self.device
            .wait_idle()
            .map_err(|e| rhi_error("Can not idle device", e, Error::Resize))?;

        self.swapchain.destroy_image_views();
        self.semaphores = None;
        self.acquired = None;
        debug!("Back-buffer views and semaphores released");
        Ok(())
    }

    fn recreate_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)
            .map_err(|e| rhi_error("Can not recreate swapchain", e, Error::Resize))?;

        let semaphores = PresentSemaphores::new(&self.device, self.swapchain.image_count())
            .map_err(|e| rhi_error("Can not create present semaphores", e, Error::Resize))?;
        self.semaphores = Some(semaphores);
        self.next_semaphore = 0;
        self.needs_rebuild = false;

        self.acquire()
            .map_err(|e| vk_error("Can not acquire back-buffer", e, Error::Resize))?;
        if self.needs_rebuild {
            warn!("Swapchain out of date right after recreation");
        }
        Ok(())
    }

    fn views_stale(&self) -> bool {
        self.swapchain.views_stale()
    }

    fn rebuild_views(&mut self) -> Result<()> {
        self.swapchain
            .rebuild_image_views()
            .map_err(|e| rhi_error("Can not create back-buffer views", e, Error::Recording))
    }

    fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }
}
