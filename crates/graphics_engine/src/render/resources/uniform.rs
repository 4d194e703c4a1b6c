//! Device-local uniform buffers updated through a persistent staging buffer

use std::marker::PhantomData;
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::render::device::{GpuDevice, TransferCommand};
use crate::render::error::{EngineError, EngineResult};
use crate::render::resources::buffer::Buffer;

/// Uniform buffer for shader uniforms of type `T`
///
/// Updates write the host-visible staging buffer, then copy it into the
/// device-local uniform buffer with a blocking one-shot command.
pub struct UniformBuffer<T> {
    staging: Buffer,
    uniform: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Create uniform buffer
    pub fn new(device: &Arc<dyn GpuDevice>) -> EngineResult<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let staging = Buffer::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let uniform = Buffer::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        Ok(Self {
            staging,
            uniform,
            _marker: PhantomData,
        })
    }

    /// Create the buffer and write an initial value
    pub fn with_value(device: &Arc<dyn GpuDevice>, value: &T) -> EngineResult<Self> {
        let buffer = Self::new(device)?;
        buffer.update(value)?;
        Ok(buffer)
    }

    /// Update uniform data
    pub fn update(&self, value: &T) -> EngineResult<()> {
        let device = self.uniform.device().ok_or_else(|| EngineError::InvalidOperation {
            reason: "update of a released uniform buffer".to_string(),
        })?;
        self.staging.write_bytes(bytemuck::bytes_of(value))?;
        device.execute_one_time(&[TransferCommand::CopyBuffer {
            src: self.staging.handle(),
            dst: self.uniform.handle(),
            size: self.size(),
        }])
    }
}

impl<T> UniformBuffer<T> {
    /// Native handle of the device-local uniform buffer
    pub fn handle(&self) -> vk::Buffer {
        self.uniform.handle()
    }

    /// Size of `T` in bytes
    pub const fn size(&self) -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }

    /// Whether this handle still owns its buffers
    pub fn is_live(&self) -> bool {
        self.uniform.is_live()
    }

    /// Release both buffers
    pub fn release(&mut self) {
        self.staging.release();
        self.uniform.release();
    }
}

impl<T> std::fmt::Debug for UniformBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBuffer")
            .field("handle", &self.handle())
            .field("size", &self.size())
            .finish()
    }
}
