//! Buffer handles for vertex, index and staging data
//!
//! A [`Buffer`] is either empty or owns exactly one native buffer and its
//! memory. Taking it with [`std::mem::take`] moves ownership out and leaves
//! an empty handle behind, so a handle is released exactly once.

use std::sync::Arc;

use ash::vk;

use crate::render::device::{BufferAllocation, GpuDevice, TransferCommand};
use crate::render::error::{EngineError, EngineResult};

struct LiveBuffer {
    device: Arc<dyn GpuDevice>,
    allocation: BufferAllocation,
    size: vk::DeviceSize,
}

/// Buffer wrapper with memory management
#[derive(Default)]
pub struct Buffer {
    live: Option<LiveBuffer>,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: &Arc<dyn GpuDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> EngineResult<Self> {
        let allocation = device.create_buffer(size, usage, properties)?;
        Ok(Self {
            live: Some(LiveBuffer {
                device: Arc::clone(device),
                allocation,
                size,
            }),
        })
    }

    /// Create a buffer holding `data`
    ///
    /// With `use_staging` the data goes through a temporary host-visible
    /// buffer into device-local memory; the staging buffer is released
    /// before this returns, on success and on failure. Without staging the
    /// destination itself is host-visible and written through a mapping.
    pub fn with_data(
        device: &Arc<dyn GpuDevice>,
        data: &[u8],
        usage: vk::BufferUsageFlags,
        use_staging: bool,
    ) -> EngineResult<Self> {
        let size = data.len() as vk::DeviceSize;
        if size == 0 {
            return Err(EngineError::InvalidOperation {
                reason: "cannot create a buffer from empty data".to_string(),
            });
        }

        if !use_staging {
            let buffer = Self::new(device, size, usage, host_visible())?;
            buffer.write_bytes(data)?;
            return Ok(buffer);
        }

        let staging = Self::new(device, size, vk::BufferUsageFlags::TRANSFER_SRC, host_visible())?;
        staging.write_bytes(data)?;

        let buffer = Self::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        device.execute_one_time(&[TransferCommand::CopyBuffer {
            src: staging.handle(),
            dst: buffer.handle(),
            size,
        }])?;

        log::trace!("[BUFFER] Uploaded {size} bytes through staging");
        Ok(buffer)
    }

    /// Copy bytes into host-visible memory
    pub fn write_bytes(&self, data: &[u8]) -> EngineResult<()> {
        let live = self.live.as_ref().ok_or_else(|| EngineError::InvalidOperation {
            reason: "write to an empty buffer".to_string(),
        })?;
        if data.len() as vk::DeviceSize > live.size {
            return Err(EngineError::InvalidOperation {
                reason: format!("{} bytes do not fit a {} byte buffer", data.len(), live.size),
            });
        }
        live.device.write_memory(live.allocation.memory, 0, data)
    }

    /// Native buffer handle, null when empty
    pub fn handle(&self) -> vk::Buffer {
        self.live
            .as_ref()
            .map_or_else(vk::Buffer::null, |live| live.allocation.buffer)
    }

    /// Size in bytes, zero when empty
    pub fn size(&self) -> vk::DeviceSize {
        self.live.as_ref().map_or(0, |live| live.size)
    }

    /// Whether this handle owns a native buffer
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Device this buffer was created on
    pub(crate) fn device(&self) -> Option<&Arc<dyn GpuDevice>> {
        self.live.as_ref().map(|live| &live.device)
    }

    /// Destroy the buffer, then free its memory. No-op when empty.
    pub fn release(&mut self) {
        if let Some(live) = self.live.take() {
            live.device.destroy_buffer(live.allocation.buffer);
            live.device.free_memory(live.allocation.memory);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle())
            .field("size", &self.size())
            .finish()
    }
}

/// Index buffer that remembers how many indices it holds
#[derive(Debug, Default)]
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Create an index buffer from 32-bit indices
    pub fn new(device: &Arc<dyn GpuDevice>, indices: &[u32], use_staging: bool) -> EngineResult<Self> {
        let index_count = u32::try_from(indices.len()).map_err(|_| EngineError::InvalidOperation {
            reason: format!("{} indices exceed the u32 range", indices.len()),
        })?;
        let buffer = Buffer::with_data(
            device,
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
            use_staging,
        )?;
        Ok(Self { buffer, index_count })
    }

    /// Native buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Whether this handle owns a native buffer
    pub fn is_live(&self) -> bool {
        self.buffer.is_live()
    }

    /// Release the underlying buffer
    pub fn release(&mut self) {
        self.buffer.release();
        self.index_count = 0;
    }
}

fn host_visible() -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
}
