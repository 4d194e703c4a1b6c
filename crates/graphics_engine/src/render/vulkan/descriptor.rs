//! Descriptor set layouts and the shared descriptor pool

use ash::{vk, Device};

use crate::config::DescriptorPoolConfig;
use crate::render::error::EngineResult;
use crate::render::pipeline::SetLayoutKind;

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
    kind: SetLayoutKind,
}

impl DescriptorSetLayout {
    /// Create the layout for `kind`
    pub fn new(device: &Device, kind: SetLayoutKind) -> EngineResult<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = kind
            .bindings()
            .iter()
            .map(|binding| binding.layout_binding())
            .collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };
        Ok(Self {
            device: device.clone(),
            layout,
            kind,
        })
    }

    /// Get the Vulkan descriptor set layout handle
    pub const fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Which table entry this layout was built from
    pub const fn kind(&self) -> SetLayoutKind {
        self.kind
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool that individual sets are freed back into
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool sized by `config`
    pub fn new(device: &Device, config: &DescriptorPoolConfig) -> EngineResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(config.uniform_buffers)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(config.combined_image_samplers)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(config.max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };
        log::debug!("[DESCRIPTOR] Created pool for {} sets", config.max_sets);
        Ok(Self {
            device: device.clone(),
            pool,
        })
    }

    /// Get the pool handle
    pub const fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
