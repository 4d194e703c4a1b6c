//! Command pools and type-safe command buffer recording

use ash::{vk, Device};

use crate::render::device::TransferCommand;
use crate::render::error::{EngineError, EngineResult};
use crate::render::recording::RenderCommand;
use crate::render::resources::transition_barrier;

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for `queue_family_index`
    pub fn new(device: &Device, queue_family_index: u32, flags: vk::CommandPoolCreateFlags) -> EngineResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None)? };
        Ok(Self {
            device: device.clone(),
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> EngineResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info)? })
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Get the command pool handle
    pub const fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Buffers allocated from the pool may still be pending
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Command buffer recorder that tracks whether recording is open
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer allocated from a pool
    pub fn new(command_buffer: vk::CommandBuffer, device: &Device) -> Self {
        Self {
            command_buffer,
            device: device.clone(),
            recording: false,
        }
    }

    /// Begin command recording
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> EngineResult<&mut Self> {
        if self.recording {
            return Err(EngineError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device.begin_command_buffer(self.command_buffer, &begin_info)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin a render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> EngineResult<ActiveRenderPass<'_>> {
        self.ensure_recording()?;

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// Record one transfer outside any render pass
    pub fn record_transfer(&mut self, command: &TransferCommand) -> EngineResult<()> {
        self.ensure_recording()?;

        match *command {
            TransferCommand::CopyBuffer { src, dst, size } => {
                let region = vk::BufferCopy::builder().src_offset(0).dst_offset(0).size(size).build();
                unsafe {
                    self.device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
                }
            }
            TransferCommand::CopyImage { src, dst, width, height } => {
                let layers = vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                };
                let region = vk::ImageCopy::builder()
                    .src_subresource(layers)
                    .src_offset(vk::Offset3D::default())
                    .dst_subresource(layers)
                    .dst_offset(vk::Offset3D::default())
                    .extent(vk::Extent3D { width, height, depth: 1 })
                    .build();
                unsafe {
                    self.device.cmd_copy_image(
                        self.command_buffer,
                        src,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        dst,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region],
                    );
                }
            }
            TransferCommand::TransitionLayout { image, format, old, new } => {
                let barrier = transition_barrier(old, new, format)?;
                unsafe {
                    self.device.cmd_pipeline_barrier(
                        self.command_buffer,
                        barrier.src_stage,
                        barrier.dst_stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier.image_barrier(image, old, new)],
                    );
                }
            }
        }
        Ok(())
    }

    /// End command recording
    pub fn end(mut self) -> EngineResult<vk::CommandBuffer> {
        self.ensure_recording()?;
        unsafe {
            self.device.end_command_buffer(self.command_buffer)?;
        }
        self.recording = false;
        Ok(self.command_buffer)
    }

    fn ensure_recording(&self) -> EngineResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(EngineError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            })
        }
    }
}

/// Render pass scope; ends the pass on drop
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    /// Encode a planned command stream
    pub fn encode(&mut self, commands: &[RenderCommand]) {
        for command in commands {
            self.encode_one(command);
        }
    }

    fn encode_one(&mut self, command: &RenderCommand) {
        let device = &self.recorder.device;
        let command_buffer = self.recorder.command_buffer;
        unsafe {
            match *command {
                RenderCommand::BindPipeline { pipeline, .. } => {
                    device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
                }
                RenderCommand::BindGlobalSet { layout, set } => {
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        0,
                        &[set],
                        &[],
                    );
                }
                RenderCommand::BindGeometry { vertex, index } => {
                    device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex], &[0]);
                    device.cmd_bind_index_buffer(command_buffer, index, 0, vk::IndexType::UINT32);
                }
                RenderCommand::BindLocalSet { layout, set } => {
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        1,
                        &[set],
                        &[],
                    );
                }
                RenderCommand::DrawIndexed { index_count } => {
                    device.cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0);
                }
            }
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
