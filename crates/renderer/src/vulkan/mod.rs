//! Vulkan backend.
//!
//! Maps the recorder's commands onto one command buffer per frame slot,
//! rendering with dynamic rendering into swapchain images. The timeline
//! fence is a timeline semaphore signaled by an empty submission after each
//! frame's work on the graphics queue.

mod frame;
mod surface;

use std::sync::Arc;

use ash::vk;
use tracing::info;

use triangle_core::{Error, GraphicsConfig, Result};
use triangle_platform::Window;
use triangle_rhi::RhiError;
use triangle_rhi::buffer::{Buffer, BufferUsage};
use triangle_rhi::command::CommandPool;
use triangle_rhi::device::Device;
use triangle_rhi::instance::Instance;
use triangle_rhi::physical_device::select_physical_device;
use triangle_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use triangle_rhi::shader::{Shader, ShaderStage};
use triangle_rhi::vertex::TriangleVertex;

pub use frame::{VulkanAllocator, VulkanFence};
pub use surface::VulkanSurface;

use crate::backend::Backend;
use crate::graphics::Graphics;
use crate::recorder::{Command, Topology};
use crate::shaders::ShaderLibrary;
use crate::surface::{BackBufferState, PresentationSurface};

const APP_NAME: &std::ffi::CStr = c"Triangle Renderer";

/// Wraps an RHI failure in `kind`, or [`Error::DeviceLost`] if the device is gone.
pub(crate) fn rhi_error(what: &str, err: RhiError, kind: fn(String) -> Error) -> Error {
    if err.is_device_lost() {
        Error::DeviceLost(format!("{}: {}", what, err))
    } else {
        kind(format!("{}: {}", what, err))
    }
}

pub(crate) fn vk_error(what: &str, result: vk::Result, kind: fn(String) -> Error) -> Error {
    rhi_error(what, RhiError::from(result), kind)
}

/// Image layouts for a back-buffer state change.
///
/// The previous contents are discarded when entering the render target
/// state; every frame clears the whole image.
fn transition_layouts(
    from: BackBufferState,
    to: BackBufferState,
) -> Result<(vk::ImageLayout, vk::ImageLayout)> {
    match (from, to) {
        (BackBufferState::Presentable, BackBufferState::RenderTarget) => Ok((
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )),
        (BackBufferState::RenderTarget, BackBufferState::Presentable) => Ok((
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )),
        _ => Err(Error::Recording(format!(
            "Invalid back-buffer transition {:?} -> {:?}",
            from, to
        ))),
    }
}

fn vk_topology(topology: Topology) -> vk::PrimitiveTopology {
    match topology {
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
    }
}

/// Pipeline state and the static vertex buffer.
pub struct VulkanBackend {
    pipeline: Pipeline,
    _layout: PipelineLayout,
    vertex_buffer: Buffer,
    device: Arc<Device>,
    // Outlives the device
    _instance: Arc<Instance>,
}

impl VulkanBackend {
    /// Builds the pipeline for `color_format` and uploads the triangle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if pipeline creation or the upload fails.
    pub fn new(
        instance: Arc<Instance>,
        device: Arc<Device>,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        color_format: vk::Format,
    ) -> Result<Self> {
        let layout = PipelineLayout::empty(device.clone())
            .map_err(|e| rhi_error("Can not create pipeline layout", e, Error::Setup))?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_binding(TriangleVertex::binding_description())
            .vertex_attributes(&TriangleVertex::attribute_descriptions())
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .color_attachment_format(color_format)
            .build(device.clone(), &layout)
            .map_err(|e| rhi_error("Can not create graphics pipeline", e, Error::Setup))?;

        let upload_pool = CommandPool::new_transient(device.clone(), device.graphics_family())
            .map_err(|e| rhi_error("Can not create upload allocator", e, Error::Setup))?;
        let vertex_buffer = Buffer::new_device_local(
            device.clone(),
            &upload_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&TriangleVertex::TRIANGLE),
        )
        .map_err(|e| rhi_error("Can not upload vertex buffer", e, Error::Setup))?;

        info!(
            "Triangle uploaded ({} vertices, {} bytes)",
            TriangleVertex::TRIANGLE.len(),
            vertex_buffer.size()
        );

        Ok(Self {
            pipeline,
            _layout: layout,
            vertex_buffer,
            device,
            _instance: instance,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Backend for VulkanBackend {
    type Allocator = VulkanAllocator;
    type Surface = VulkanSurface;
    type Fence = VulkanFence;

    fn begin(&mut self, allocator: &mut VulkanAllocator) -> Result<()> {
        let cmd = allocator.command_buffer();
        cmd.begin()
            .map_err(|e| rhi_error("Can not open command list", e, Error::Recording))?;
        cmd.bind_graphics_pipeline(self.pipeline.handle());
        Ok(())
    }

    fn encode(
        &mut self,
        allocator: &mut VulkanAllocator,
        surface: &mut VulkanSurface,
        command: &Command,
    ) -> Result<()> {
        let cmd = allocator.command_buffer();
        match *command {
            Command::PrepareTarget { rebuild_views } => {
                if rebuild_views {
                    surface.rebuild_views()?;
                }
            }
            Command::SetFixedState { extent, topology } => {
                cmd.set_viewport_and_scissor(vk::Extent2D {
                    width: extent.width,
                    height: extent.height,
                });
                cmd.set_primitive_topology(vk_topology(topology));
            }
            Command::Transition { index, from, to } => {
                let (old_layout, new_layout) = transition_layouts(from, to)?;
                let image = surface.image(index).ok_or_else(|| {
                    Error::Recording(format!("Back-buffer {} does not exist", index))
                })?;
                cmd.transition_image_layout(image, old_layout, new_layout);
            }
            Command::Clear { index, color } => {
                let view = surface.image_view(index).ok_or_else(|| {
                    Error::Recording(format!("Back-buffer {} has no view", index))
                })?;
                cmd.begin_rendering_cleared(view, surface.vk_extent(), color);
            }
            Command::Draw { vertex_count } => {
                cmd.bind_vertex_buffer(self.vertex_buffer.handle());
                cmd.draw(vertex_count);
                cmd.end_rendering();
            }
        }
        Ok(())
    }

    fn close(&mut self, allocator: &mut VulkanAllocator) -> Result<()> {
        allocator
            .command_buffer()
            .end()
            .map_err(|e| rhi_error("Can not close command list", e, Error::Recording))
    }

    fn submit(&mut self, allocator: &mut VulkanAllocator, surface: &mut VulkanSurface) -> Result<()> {
        let (wait, signal) = surface.frame_semaphores()?;

        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [allocator.command_buffer().handle()];
        let signal_semaphores = [signal];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer is closed, both semaphores belong to the
        // live swapchain and only this thread submits to the graphics queue.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())
                .map_err(|e| rhi_error("Can not submit command list", e, Error::Submission))
        }
    }
}

/// Initializes Vulkan for `window`: device, swapchain, pipeline state and the
/// triangle's vertex buffer.
///
/// # Errors
///
/// Returns [`Error::SurfaceCreation`] when no instance, surface or suitable
/// GPU is available, [`Error::Shader`] when the shader blobs are missing and
/// [`Error::Setup`] for any other failure.
pub fn create(window: &Window, config: &GraphicsConfig) -> Result<Graphics<VulkanBackend>> {
    let extensions = window.required_extensions()?;
    let instance = Arc::new(
        Instance::new(APP_NAME, config.validation, &extensions)
            .map_err(|e| rhi_error("Can not create Vulkan instance", e, Error::SurfaceCreation))?,
    );

    let platform_surface = window.create_surface(instance.entry(), instance.handle())?;

    let physical_device = select_physical_device(
        instance.handle(),
        platform_surface.handle(),
        platform_surface.loader(),
    )
    .map_err(|e| rhi_error("Can not find a suitable GPU", e, Error::SurfaceCreation))?;
    info!("Using GPU: {:?}", physical_device);

    let device = Device::new(&instance, &physical_device)
        .map_err(|e| rhi_error("Can not create device", e, Error::Setup))?;

    let surface = VulkanSurface::new(
        instance.clone(),
        device.clone(),
        platform_surface,
        window.width(),
        window.height(),
        config.vsync,
    )?;

    let allocators = [
        VulkanAllocator::new(device.clone())?,
        VulkanAllocator::new(device.clone())?,
    ];
    let fence = VulkanFence::new(device.clone())?;

    let library = ShaderLibrary::beside_executable(&config.shader_dir)?;
    let vertex_shader = Shader::from_spirv_bytes(
        device.clone(),
        &library.load("triangle.vert")?,
        ShaderStage::Vertex,
        "main",
    )
    .map_err(|e| rhi_error("Can not create vertex shader", e, Error::Shader))?;
    let fragment_shader = Shader::from_spirv_bytes(
        device.clone(),
        &library.load("triangle.frag")?,
        ShaderStage::Fragment,
        "main",
    )
    .map_err(|e| rhi_error("Can not create fragment shader", e, Error::Shader))?;

    let backend = VulkanBackend::new(
        instance,
        device,
        &vertex_shader,
        &fragment_shader,
        surface.format(),
    )?;

    Graphics::new(backend, surface, allocators, fence, config.clear_color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_target_transition_discards_contents() {
        let (old, new) =
            transition_layouts(BackBufferState::Presentable, BackBufferState::RenderTarget).unwrap();
        assert_eq!(old, vk::ImageLayout::UNDEFINED);
        assert_eq!(new, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_present_transition() {
        let (old, new) =
            transition_layouts(BackBufferState::RenderTarget, BackBufferState::Presentable).unwrap();
        assert_eq!(old, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(new, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_same_state_transition_is_rejected() {
        let result = transition_layouts(BackBufferState::Presentable, BackBufferState::Presentable);
        assert!(matches!(result, Err(Error::Recording(_))));
    }

    #[test]
    fn test_device_lost_overrides_error_kind() {
        let err = vk_error("Can not present", vk::Result::ERROR_DEVICE_LOST, Error::Submission);
        assert!(err.is_device_lost());

        let err = vk_error("Can not present", vk::Result::ERROR_SURFACE_LOST_KHR, Error::Submission);
        assert!(matches!(err, Error::Submission(ref msg) if msg.starts_with("Can not present")));
    }

    #[test]
    fn test_topology_mapping() {
        assert_eq!(
            vk_topology(Topology::TriangleList),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
    }
}
