//! Device seam used by every resource handle
//!
//! Handles keep an `Arc<dyn GpuDevice>` instead of a raw device pointer, so
//! the context needed to destroy a resource is injected at construction and
//! outlives every handle created from it.

use ash::vk;

use crate::render::error::EngineResult;

/// Buffer plus the memory bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAllocation {
    /// Native buffer handle
    pub buffer: vk::Buffer,
    /// Memory bound at offset 0
    pub memory: vk::DeviceMemory,
}

/// Image plus the memory bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAllocation {
    /// Native image handle
    pub image: vk::Image,
    /// Memory bound at offset 0
    pub memory: vk::DeviceMemory,
}

/// Parameters of a 2D, single-mip image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: vk::Format,
    /// Linear for host-written staging images, optimal otherwise
    pub tiling: vk::ImageTiling,
    /// How the image will be used
    pub usage: vk::ImageUsageFlags,
    /// Layout at creation: preinitialized keeps host writes valid
    pub initial_layout: vk::ImageLayout,
    /// Memory properties the backing allocation must have
    pub properties: vk::MemoryPropertyFlags,
}

/// One binding written into a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorWrite {
    /// Whole-buffer uniform binding
    UniformBuffer {
        /// Binding slot
        binding: u32,
        /// Uniform buffer
        buffer: vk::Buffer,
        /// Bytes visible to the shader
        range: vk::DeviceSize,
    },
    /// Texture sampled in shader-read-only layout
    CombinedImageSampler {
        /// Binding slot
        binding: u32,
        /// Image view
        view: vk::ImageView,
        /// Sampler
        sampler: vk::Sampler,
    },
}

impl DescriptorWrite {
    /// Binding slot this write targets
    pub const fn binding(&self) -> u32 {
        match self {
            Self::UniformBuffer { binding, .. } | Self::CombinedImageSampler { binding, .. } => *binding,
        }
    }
}

/// Commands recorded into a one-shot transfer command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCommand {
    /// Copy `size` bytes from the start of `src` to the start of `dst`
    CopyBuffer {
        /// Source buffer
        src: vk::Buffer,
        /// Destination buffer
        dst: vk::Buffer,
        /// Bytes to copy
        size: vk::DeviceSize,
    },
    /// Copy the color aspect of mip 0 from `src` to `dst`
    CopyImage {
        /// Source image, in transfer-source layout
        src: vk::Image,
        /// Destination image, in transfer-destination layout
        dst: vk::Image,
        /// Width in texels
        width: u32,
        /// Height in texels
        height: u32,
    },
    /// Layout transition through a pipeline barrier
    TransitionLayout {
        /// Image to transition
        image: vk::Image,
        /// Image format (selects the aspect)
        format: vk::Format,
        /// Current layout
        old: vk::ImageLayout,
        /// Target layout
        new: vk::ImageLayout,
    },
}

/// Operations resource handles need from the logical device
///
/// Creation calls either return a fully built object or fail without leaving
/// anything allocated. Destruction calls accept handles created by the same
/// device and are never called twice for one handle.
pub trait GpuDevice: Send + Sync {
    /// Create a buffer and bind freshly allocated memory to it
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> EngineResult<BufferAllocation>;

    /// Destroy a buffer created by [`create_buffer`](Self::create_buffer)
    fn destroy_buffer(&self, buffer: vk::Buffer);

    /// Free memory returned by a create call
    fn free_memory(&self, memory: vk::DeviceMemory);

    /// Map host-visible memory, copy `data` at `offset`, then unmap
    fn write_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> EngineResult<()>;

    /// Create an image and bind freshly allocated memory to it
    fn create_image(&self, desc: &ImageDesc) -> EngineResult<ImageAllocation>;

    /// Destroy an image created by [`create_image`](Self::create_image)
    fn destroy_image(&self, image: vk::Image);

    /// Row pitch of mip 0, color aspect of a linear image
    fn image_row_pitch(&self, image: vk::Image) -> vk::DeviceSize;

    /// Create a 2D view over mip 0
    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> EngineResult<vk::ImageView>;

    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Create a linear, repeating sampler
    fn create_sampler(&self, max_anisotropy: f32) -> EngineResult<vk::Sampler>;

    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);

    /// Allocate one descriptor set from `pool`
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> EngineResult<vk::DescriptorSet>;

    /// Write all bindings in a single update call
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]);

    /// Return a set to the pool it came from
    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet);

    /// Record `commands` into a one-shot command buffer, submit, and block
    /// until the queue is idle. The command buffer is freed before returning.
    fn execute_one_time(&self, commands: &[TransferCommand]) -> EngineResult<()>;
}
