//! Swapchain creation and the choices it is built from

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use crate::config::PresentModePreference;
use crate::render::error::{EngineError, EngineResult};
use crate::render::vulkan::context::Surface;
use crate::render::vulkan::device::VulkanDevice;

/// Pick the surface format, preferring 8-bit UNORM BGRA/RGBA in sRGB space
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> EngineResult<vk::SurfaceFormatKHR> {
    const PREFERRED: [vk::Format; 2] = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];

    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Ok(vk::SurfaceFormatKHR {
                format: PREFERRED[0],
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            });
        }
    }

    PREFERRED
        .iter()
        .find_map(|&format| {
            available
                .iter()
                .find(|sf| sf.format == format && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| EngineError::UnsupportedFormat("surface reports no formats".to_string()))
}

/// Mailbox when preferred and supported, FIFO otherwise
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox if available.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// Use the surface's fixed extent, or clamp the window size to its limits
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, bounded by the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// Swapchain and views over its images, destroyed together
pub struct Swapchain {
    device: ash::Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for `surface`, retiring `old` when non-null
    pub fn new(
        device: &VulkanDevice,
        surface: &Surface,
        window_extent: vk::Extent2D,
        preference: PresentModePreference,
        old: vk::SwapchainKHR,
    ) -> EngineResult<Self> {
        let physical = device.physical();
        let (caps, formats, present_modes) = unsafe {
            (
                surface
                    .loader()
                    .get_physical_device_surface_capabilities(physical.device, surface.handle())?,
                surface
                    .loader()
                    .get_physical_device_surface_formats(physical.device, surface.handle())?,
                surface
                    .loader()
                    .get_physical_device_surface_present_modes(physical.device, surface.handle())?,
            )
        };

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, preference);
        let extent = choose_extent(&caps, window_extent);
        let image_count = choose_image_count(&caps);

        let families = [physical.graphics_family, physical.present_family];
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old);
        let create_info = if physical.graphics_family == physical.present_family {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        };

        let loader = SwapchainLoader::new(device.instance().instance(), device.raw());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let mut this = Self {
            device: device.raw().clone(),
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent,
        };
        // Views created so far are released by Drop if a later one fails
        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for &image in &this.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { this.device.create_image_view(&view_info, None)? };
            this.image_views.push(view);
        }

        log::info!(
            "[SWAPCHAIN] Created {}x{} with {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );
        Ok(this)
    }

    /// Acquire the next image; `Ok(None)` when the swapchain is out of date
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> EngineResult<Option<(u32, bool)>> {
        match unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => Ok(Some((index, suboptimal))),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Queue `image_index` for presentation; `Ok(false)` when out of date or suboptimal
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> EngineResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Swapchain handle
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Image extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format of the images
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// One view per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32), counts: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: counts.0,
            max_image_count: counts.1,
            ..Default::default()
        }
    }

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_surface_format_preference() {
        let available = [format(vk::Format::R8G8B8A8_UNORM), format(vk::Format::B8G8R8A8_UNORM)];
        assert_eq!(choose_surface_format(&available).unwrap().format, vk::Format::B8G8R8A8_UNORM);

        let only_rgba = [format(vk::Format::R16G16B16A16_SFLOAT), format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(choose_surface_format(&only_rgba).unwrap().format, vk::Format::R8G8B8A8_UNORM);

        let fallback = [format(vk::Format::R16G16B16A16_SFLOAT)];
        assert_eq!(
            choose_surface_format(&fallback).unwrap().format,
            vk::Format::R16G16B16A16_SFLOAT
        );

        let unconstrained = [format(vk::Format::UNDEFINED)];
        assert_eq!(
            choose_surface_format(&unconstrained).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );

        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let all = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&all, PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], PresentModePreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(choose_present_mode(&all, PresentModePreference::Fifo), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_clamped_only_when_surface_is_flexible() {
        let fixed = caps((800, 600), (1, 1), (4096, 4096), (2, 0));
        let window = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        assert_eq!(choose_extent(&fixed, window).width, 800);

        let flexible = caps((u32::MAX, u32::MAX), (200, 200), (1000, 700), (2, 0));
        let extent = choose_extent(&flexible, window);
        assert_eq!((extent.width, extent.height), (1000, 700));

        let tiny = vk::Extent2D { width: 10, height: 10 };
        let extent = choose_extent(&flexible, tiny);
        assert_eq!((extent.width, extent.height), (200, 200));
    }

    #[test]
    fn test_image_count_is_min_plus_one_bounded() {
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (1, 1), (2, 0))), 3);
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (1, 1), (2, 8))), 3);
        assert_eq!(choose_image_count(&caps((1, 1), (1, 1), (1, 1), (3, 3))), 3);
    }
}
