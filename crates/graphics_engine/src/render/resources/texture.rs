//! Sampled RGBA8 textures
//!
//! A texture owns an image, its memory, one view and one sampler. Release
//! order is sampler, view, image, then memory.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::render::device::{GpuDevice, ImageAllocation, ImageDesc, TransferCommand};
use crate::render::error::{EngineError, EngineResult};

/// Format of every texture created from RGBA8 pixels
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const BYTES_PER_PIXEL: usize = 4;

struct LiveTexture {
    device: Arc<dyn GpuDevice>,
    image: ImageAllocation,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

/// Texture ready to be bound as a combined image sampler
#[derive(Default)]
pub struct Texture {
    live: Option<LiveTexture>,
    width: u32,
    height: u32,
}

/// Image created for the duration of an upload, destroyed on drop
struct ScratchImage<'a> {
    device: &'a Arc<dyn GpuDevice>,
    allocation: Option<ImageAllocation>,
}

impl<'a> ScratchImage<'a> {
    fn new(device: &'a Arc<dyn GpuDevice>, desc: &ImageDesc) -> EngineResult<Self> {
        Ok(Self {
            device,
            allocation: Some(device.create_image(desc)?),
        })
    }

    fn image(&self) -> vk::Image {
        self.allocation.map_or_else(vk::Image::null, |a| a.image)
    }

    fn memory(&self) -> vk::DeviceMemory {
        self.allocation.map_or_else(vk::DeviceMemory::null, |a| a.memory)
    }

    /// Keep the image alive past this guard
    fn keep(mut self) -> Option<ImageAllocation> {
        self.allocation.take()
    }
}

impl Drop for ScratchImage<'_> {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.device.destroy_image(allocation.image);
            self.device.free_memory(allocation.memory);
        }
    }
}

impl Texture {
    /// Create a texture from tightly packed RGBA8 pixels
    ///
    /// With `use_staging` the pixels go through a linear staging image into
    /// an optimal-tiled device-local image, and the staging image is gone
    /// when this returns. Without staging the linear image is sampled
    /// directly.
    pub fn from_rgba8(
        device: &Arc<dyn GpuDevice>,
        pixels: &[u8],
        width: u32,
        height: u32,
        use_staging: bool,
        max_anisotropy: f32,
    ) -> EngineResult<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(EngineError::InvalidOperation {
                reason: format!(
                    "{} bytes of pixel data for a {width}x{height} RGBA8 texture",
                    pixels.len()
                ),
            });
        }

        let image = if use_staging {
            Self::upload_staged(device, pixels, width, height)?
        } else {
            Self::upload_linear(device, pixels, width, height)?
        };

        // From here the image is owned by the texture, including on error.
        let mut texture = Self {
            live: Some(LiveTexture {
                device: Arc::clone(device),
                image,
                view: vk::ImageView::null(),
                sampler: vk::Sampler::null(),
            }),
            width,
            height,
        };
        if let Some(live) = texture.live.as_mut() {
            live.view = device.create_image_view(image.image, TEXTURE_FORMAT, vk::ImageAspectFlags::COLOR)?;
            live.sampler = device.create_sampler(max_anisotropy)?;
        }

        log::debug!("[TEXTURE] Created {width}x{height} texture (staging: {use_staging})");
        Ok(texture)
    }

    fn upload_staged(
        device: &Arc<dyn GpuDevice>,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> EngineResult<ImageAllocation> {
        let staging = ScratchImage::new(
            device,
            &ImageDesc {
                width,
                height,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::LINEAR,
                usage: vk::ImageUsageFlags::TRANSFER_SRC,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
                properties: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            },
        )?;
        let row_pitch = device.image_row_pitch(staging.image());
        device.write_memory(staging.memory(), 0, &pitched_rows(pixels, width, height, row_pitch))?;

        let destination = ScratchImage::new(
            device,
            &ImageDesc {
                width,
                height,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        device.execute_one_time(&[
            TransferCommand::TransitionLayout {
                image: staging.image(),
                format: TEXTURE_FORMAT,
                old: vk::ImageLayout::PREINITIALIZED,
                new: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            },
            TransferCommand::TransitionLayout {
                image: destination.image(),
                format: TEXTURE_FORMAT,
                old: vk::ImageLayout::PREINITIALIZED,
                new: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            },
            TransferCommand::CopyImage {
                src: staging.image(),
                dst: destination.image(),
                width,
                height,
            },
            TransferCommand::TransitionLayout {
                image: destination.image(),
                format: TEXTURE_FORMAT,
                old: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                new: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        ])?;

        drop(staging);
        destination.keep().ok_or_else(|| EngineError::InvalidOperation {
            reason: "texture destination image missing after upload".to_string(),
        })
    }

    fn upload_linear(
        device: &Arc<dyn GpuDevice>,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> EngineResult<ImageAllocation> {
        let image = ScratchImage::new(
            device,
            &ImageDesc {
                width,
                height,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::LINEAR,
                usage: vk::ImageUsageFlags::SAMPLED,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
                properties: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            },
        )?;
        let row_pitch = device.image_row_pitch(image.image());
        device.write_memory(image.memory(), 0, &pitched_rows(pixels, width, height, row_pitch))?;
        device.execute_one_time(&[TransferCommand::TransitionLayout {
            image: image.image(),
            format: TEXTURE_FORMAT,
            old: vk::ImageLayout::PREINITIALIZED,
            new: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }])?;

        image.keep().ok_or_else(|| EngineError::InvalidOperation {
            reason: "texture image missing after upload".to_string(),
        })
    }

    /// Native image view, null when empty
    pub fn view(&self) -> vk::ImageView {
        self.live.as_ref().map_or_else(vk::ImageView::null, |live| live.view)
    }

    /// Native sampler, null when empty
    pub fn sampler(&self) -> vk::Sampler {
        self.live.as_ref().map_or_else(vk::Sampler::null, |live| live.sampler)
    }

    /// Native image, null when empty
    pub fn image(&self) -> vk::Image {
        self.live.as_ref().map_or_else(vk::Image::null, |live| live.image.image)
    }

    /// Texture extent in texels
    pub const fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether this handle owns native resources
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Release sampler and view before the image, memory last
    pub fn release(&mut self) {
        if let Some(live) = self.live.take() {
            if live.sampler != vk::Sampler::null() {
                live.device.destroy_sampler(live.sampler);
            }
            if live.view != vk::ImageView::null() {
                live.device.destroy_image_view(live.view);
            }
            live.device.destroy_image(live.image.image);
            live.device.free_memory(live.image.memory);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("image", &self.image())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Lay tightly packed rows out with the destination's row stride
///
/// When the stride equals the packed row size the input is used as is.
pub fn pitched_rows(pixels: &[u8], width: u32, height: u32, row_pitch: vk::DeviceSize) -> Cow<'_, [u8]> {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let pitch = usize::try_from(row_pitch).unwrap_or(row_bytes).max(row_bytes);
    if pitch == row_bytes {
        return Cow::Borrowed(pixels);
    }

    let rows = height as usize;
    let mut laid_out = vec![0; pitch * rows.saturating_sub(1) + row_bytes];
    for (y, row) in pixels.chunks_exact(row_bytes).take(rows).enumerate() {
        laid_out[y * pitch..y * pitch + row_bytes].copy_from_slice(row);
    }
    Cow::Owned(laid_out)
}

/// Decode an image file into RGBA8 pixels plus its extent
pub fn load_rgba8(path: impl AsRef<Path>) -> EngineResult<(Vec<u8>, u32, u32)> {
    let path = path.as_ref();
    let decoded = image::open(path)
        .map_err(|e| EngineError::UnsupportedFormat(format!("{}: {e}", path.display())))?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    Ok((decoded.into_raw(), width, height))
}
