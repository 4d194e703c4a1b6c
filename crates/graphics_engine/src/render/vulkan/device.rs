//! Logical device and the native implementation of [`GpuDevice`]

use std::sync::{Arc, Mutex};

use ash::{vk, Device};

use crate::render::device::{BufferAllocation, DescriptorWrite, GpuDevice, ImageAllocation, ImageDesc, TransferCommand};
use crate::render::error::{EngineError, EngineResult};
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::context::{find_memory_type, PhysicalDeviceInfo, VulkanInstance};

/// Logical device, its queues and a pool for one-shot transfers
///
/// Resource handles keep this alive through `Arc<dyn GpuDevice>`, so the
/// native device is destroyed only after the last handle created from it.
pub struct VulkanDevice {
    device: Device,
    physical: PhysicalDeviceInfo,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_pool: Mutex<Option<CommandPool>>,
    // Destroyed after the device
    instance: Arc<VulkanInstance>,
}

impl VulkanDevice {
    /// Create the logical device on `physical`
    pub fn new(instance: &Arc<VulkanInstance>, physical: PhysicalDeviceInfo) -> EngineResult<Arc<Self>> {
        let device = physical.create_logical_device(instance.instance())?;
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };

        let transfer_pool = match CommandPool::new(
            &device,
            physical.graphics_family,
            vk::CommandPoolCreateFlags::TRANSIENT,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        log::info!("[DEVICE] Logical device created");
        Ok(Arc::new(Self {
            device,
            physical,
            graphics_queue,
            present_queue,
            transfer_pool: Mutex::new(Some(transfer_pool)),
            instance: Arc::clone(instance),
        }))
    }

    /// Device function table
    pub const fn raw(&self) -> &Device {
        &self.device
    }

    /// Physical device the logical device was created on
    pub const fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Instance the device belongs to
    pub const fn instance(&self) -> &Arc<VulkanInstance> {
        &self.instance
    }

    /// Queue used for rendering and transfers
    pub const fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation
    pub const fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Block until all queues are idle
    pub fn wait_idle(&self) -> EngineResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    fn allocate_bound_memory(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> EngineResult<vk::DeviceMemory> {
        let memory_type_index =
            find_memory_type(&self.physical.memory_properties, requirements.memory_type_bits, properties)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        Ok(unsafe { self.device.allocate_memory(&alloc_info, None)? })
    }

    fn record_and_submit(&self, command_buffer: vk::CommandBuffer, commands: &[TransferCommand]) -> EngineResult<()> {
        let mut recorder = CommandRecorder::new(command_buffer, &self.device);
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        for command in commands {
            recorder.record_transfer(command)?;
        }
        let command_buffer = recorder.end()?;

        let submit_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&submit_buffers).build();
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(self.graphics_queue)?;
        }
        Ok(())
    }
}

impl GpuDevice for VulkanDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> EngineResult<BufferAllocation> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate_bound_memory(requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        log::trace!("[BUFFER] Created {size} bytes, usage {usage:?}");
        Ok(BufferAllocation { buffer, memory })
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) };
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) };
    }

    fn write_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> EngineResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            let mapped = self.device.map_memory(
                memory,
                offset,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> EngineResult<ImageAllocation> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(desc.initial_layout)
            .usage(desc.usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let image = unsafe { self.device.create_image(&image_info, None)? };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let memory = match self.allocate_bound_memory(requirements, desc.properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            unsafe {
                self.device.destroy_image(image, None);
                self.device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(ImageAllocation { image, memory })
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) };
    }

    fn image_row_pitch(&self, image: vk::Image) -> vk::DeviceSize {
        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        unsafe { self.device.get_image_subresource_layout(image, subresource).row_pitch }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> EngineResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        Ok(unsafe { self.device.create_image_view(&create_info, None)? })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_sampler(&self, max_anisotropy: f32) -> EngineResult<vk::Sampler> {
        let limit = self.physical.properties.limits.max_sampler_anisotropy;
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy.min(limit))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);
        Ok(unsafe { self.device.create_sampler(&sampler_info, None)? })
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) };
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> EngineResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter().next().ok_or(EngineError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        // Info structs must stay in place while the writes point at them
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::UniformBuffer { buffer, range, .. } => [vk::DescriptorBufferInfo {
                    buffer,
                    offset: 0,
                    range,
                }],
                DescriptorWrite::CombinedImageSampler { .. } => [vk::DescriptorBufferInfo::default()],
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::CombinedImageSampler { view, sampler, .. } => [vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }],
                DescriptorWrite::UniformBuffer { .. } => [vk::DescriptorImageInfo::default()],
            })
            .collect();

        let native: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .enumerate()
            .map(|(i, write)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(write.binding())
                    .dst_array_element(0);
                match write {
                    DescriptorWrite::UniformBuffer { .. } => builder
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(&buffer_infos[i])
                        .build(),
                    DescriptorWrite::CombinedImageSampler { .. } => builder
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(&image_infos[i])
                        .build(),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&native, &[]) };
    }

    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        if let Err(e) = unsafe { self.device.free_descriptor_sets(pool, &[set]) } {
            log::warn!("[DESCRIPTOR] Failed to free descriptor set: {e:?}");
        }
    }

    fn execute_one_time(&self, commands: &[TransferCommand]) -> EngineResult<()> {
        let guard = self.transfer_pool.lock().map_err(|_| EngineError::InvalidOperation {
            reason: "transfer command pool lock poisoned".to_string(),
        })?;
        let pool = guard.as_ref().ok_or_else(|| EngineError::InvalidOperation {
            reason: "transfer command pool already destroyed".to_string(),
        })?;

        let command_buffers = pool.allocate_command_buffers(1)?;
        let result = match command_buffers.first() {
            Some(&command_buffer) => self.record_and_submit(command_buffer, commands),
            None => Err(EngineError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY)),
        };
        pool.free_command_buffers(&command_buffers);
        result
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        let pool = match self.transfer_pool.get_mut() {
            Ok(pool) => pool.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(pool);
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("[DEVICE] Logical device destroyed");
    }
}
