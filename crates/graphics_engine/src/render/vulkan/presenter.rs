//! Presentation target over a real swapchain
//!
//! Owns everything whose shape depends on the surface: the swapchain, the
//! render pass, the depth buffer, the viewport-baked pipelines and one
//! framebuffer and command buffer per swapchain image. All of it is rebuilt
//! together by [`PresentationTarget::recreate`].

use std::sync::Arc;

use ash::vk;

use crate::config::{EngineConfig, PresentModePreference};
use crate::render::device::GpuDevice;
use crate::render::error::{EngineError, EngineResult};
use crate::render::frame::{AcquireOutcome, PresentOutcome, PresentationTarget};
use crate::render::pipeline::registry::PipelineRegistry;
use crate::render::recording::RenderCommand;
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::context::Surface;
use crate::render::vulkan::descriptor::DescriptorPool;
use crate::render::vulkan::device::VulkanDevice;
use crate::render::vulkan::render_pass::{DepthBuffer, Framebuffer, RenderPass};
use crate::render::vulkan::swapchain::Swapchain;
use crate::render::vulkan::sync::Semaphore;

/// Swapchain-backed [`PresentationTarget`]
pub struct VulkanPresenter {
    // Field order is drop order
    framebuffers: Vec<Framebuffer>,
    registry: PipelineRegistry,
    depth_buffer: DepthBuffer,
    render_pass: RenderPass,
    swapchain: Swapchain,
    image_available: Semaphore,
    render_finished: Semaphore,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    descriptor_pool: DescriptorPool,
    surface: Surface,
    device: Arc<VulkanDevice>,
    window_extent: vk::Extent2D,
    present_mode: PresentModePreference,
    recorded: bool,
}

impl VulkanPresenter {
    /// Build the swapchain and everything sized by it
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: Surface,
        config: &EngineConfig,
        window_extent: vk::Extent2D,
    ) -> EngineResult<Self> {
        let raw = device.raw();
        let descriptor_pool = DescriptorPool::new(raw, &config.descriptor_pool)?;
        let command_pool = CommandPool::new(
            raw,
            device.physical().graphics_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let image_available = Semaphore::new(raw)?;
        let render_finished = Semaphore::new(raw)?;

        let swapchain = Swapchain::new(
            &device,
            &surface,
            window_extent,
            config.present_mode,
            vk::SwapchainKHR::null(),
        )?;
        let depth_format = device.physical().depth_format;
        let render_pass = RenderPass::new_forward_pass(raw, swapchain.format().format, depth_format)?;
        let gpu: Arc<dyn GpuDevice> = device.clone();
        let depth_buffer = DepthBuffer::new(&gpu, depth_format, swapchain.extent())?;
        let registry = PipelineRegistry::new(raw, &config.shader_dir, render_pass.handle(), swapchain.extent())?;
        let framebuffers = create_framebuffers(&device, &swapchain, &render_pass, &depth_buffer)?;
        let command_buffers = command_pool.allocate_command_buffers(image_count(&swapchain)?)?;

        Ok(Self {
            framebuffers,
            registry,
            depth_buffer,
            render_pass,
            swapchain,
            image_available,
            render_finished,
            command_buffers,
            command_pool,
            descriptor_pool,
            surface,
            device,
            window_extent,
            present_mode: config.present_mode,
            recorded: false,
        })
    }

    /// Pipelines built for the current surface
    pub const fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    /// Pool every descriptor set is allocated from
    pub const fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.descriptor_pool.handle()
    }

    /// Current swapchain extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Whether the per-image command buffers hold a usable recording
    pub const fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Forget the current recording; nothing is submitted until the next
    /// [`record`](Self::record)
    pub fn invalidate(&mut self) {
        self.recorded = false;
    }

    /// Window size to use at the next recreation
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    /// Record `commands` into the command buffer of every swapchain image
    ///
    /// Must not be called while a previous submission is still executing;
    /// [`PresentationTarget::submit`] waits for the queue, so between frames
    /// this always holds.
    pub fn record(&mut self, commands: &[RenderCommand], clear_values: &[vk::ClearValue; 2]) -> EngineResult<()> {
        self.recorded = false;
        if self.command_buffers.is_empty() {
            // A failed rebuild left nothing to record into; the pending
            // recreation re-records once it succeeds
            log::debug!("[FRAME] No command buffers, recording deferred");
            return Ok(());
        }
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent(),
        };

        for (&command_buffer, framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            let mut recorder = CommandRecorder::new(command_buffer, self.device.raw());
            recorder.begin(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;
            {
                let mut pass = recorder.begin_render_pass(
                    self.render_pass.handle(),
                    framebuffer.handle(),
                    render_area,
                    clear_values,
                )?;
                pass.encode(commands);
            }
            recorder.end()?;
        }

        self.recorded = true;
        log::trace!(
            "[FRAME] Recorded {} commands into {} buffers",
            commands.len(),
            self.command_buffers.len()
        );
        Ok(())
    }

    fn rebuild(&mut self) -> EngineResult<()> {
        let raw = self.device.raw();
        self.framebuffers.clear();

        let swapchain = Swapchain::new(
            &self.device,
            &self.surface,
            self.window_extent,
            self.present_mode,
            self.swapchain.handle(),
        )?;
        // The retired swapchain is destroyed here, after its replacement exists
        self.swapchain = swapchain;

        let depth_format = self.device.physical().depth_format;
        self.render_pass = RenderPass::new_forward_pass(raw, self.swapchain.format().format, depth_format)?;
        let gpu: Arc<dyn GpuDevice> = self.device.clone();
        self.depth_buffer = DepthBuffer::new(&gpu, depth_format, self.swapchain.extent())?;
        self.registry
            .rebuild(self.render_pass.handle(), self.swapchain.extent())?;
        self.framebuffers = create_framebuffers(&self.device, &self.swapchain, &self.render_pass, &self.depth_buffer)?;
        self.command_buffers = self
            .command_pool
            .allocate_command_buffers(image_count(&self.swapchain)?)?;
        Ok(())
    }
}

fn image_count(swapchain: &Swapchain) -> EngineResult<u32> {
    u32::try_from(swapchain.image_views().len()).map_err(|_| EngineError::InvalidOperation {
        reason: "swapchain image count exceeds u32".to_string(),
    })
}

fn create_framebuffers(
    device: &VulkanDevice,
    swapchain: &Swapchain,
    render_pass: &RenderPass,
    depth_buffer: &DepthBuffer,
) -> EngineResult<Vec<Framebuffer>> {
    swapchain
        .image_views()
        .iter()
        .map(|&view| {
            Framebuffer::new(
                device.raw(),
                render_pass.handle(),
                view,
                depth_buffer.view(),
                swapchain.extent(),
            )
        })
        .collect()
}

impl PresentationTarget for VulkanPresenter {
    fn acquire(&mut self) -> EngineResult<AcquireOutcome> {
        Ok(self
            .swapchain
            .acquire_next_image(self.image_available.handle())?
            .map_or(AcquireOutcome::OutOfDate, |(image_index, _suboptimal)| {
                AcquireOutcome::Acquired(image_index)
            }))
    }

    fn submit(&mut self, image_index: u32) -> EngineResult<()> {
        if !self.recorded {
            return Err(EngineError::InvalidOperation {
                reason: "submit before any commands were recorded".to_string(),
            });
        }
        let command_buffer = usize::try_from(image_index)
            .ok()
            .and_then(|i| self.command_buffers.get(i).copied())
            .ok_or_else(|| EngineError::InvalidOperation {
                reason: format!("no command buffer for swapchain image {image_index}"),
            })?;

        let wait_semaphores = [self.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [self.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let raw = self.device.raw();
        let queue = self.device.graphics_queue();
        unsafe {
            raw.queue_submit(queue, &[submit_info], vk::Fence::null())?;
            // One frame in flight: nothing recorded may be touched until this returns
            raw.queue_wait_idle(queue)?;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> EngineResult<PresentOutcome> {
        let current = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.render_finished.handle(),
        )?;
        Ok(if current {
            PresentOutcome::Presented
        } else {
            PresentOutcome::Stale
        })
    }

    fn recreate(&mut self) -> EngineResult<()> {
        self.device.wait_idle()?;
        self.recorded = false;
        self.command_pool.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();
        self.rebuild()
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("[FRAME] Wait for idle before teardown failed: {e}");
        }
    }
}
