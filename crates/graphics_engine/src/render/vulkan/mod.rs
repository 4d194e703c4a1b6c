//! Native Vulkan backend
//!
//! Everything here talks to `ash` directly. The rest of the renderer sees
//! it through [`GpuDevice`](crate::render::device::GpuDevice) and
//! [`PresentationTarget`](crate::render::frame::PresentationTarget).

pub mod commands;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod pipeline;
pub mod presenter;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{PhysicalDeviceInfo, Surface, VulkanInstance};
pub use device::VulkanDevice;
pub use presenter::VulkanPresenter;
