//! Descriptor set handles
//!
//! Sets are allocated from a pool created with `FREE_DESCRIPTOR_SET`, so each
//! handle returns its own set to the pool when released.

use std::sync::Arc;

use ash::vk;

use crate::render::capability::ShaderUsage;
use crate::render::device::{DescriptorWrite, GpuDevice};
use crate::render::error::EngineResult;

struct LiveSet {
    device: Arc<dyn GpuDevice>,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

/// Descriptor set plus the capability flags of the data written into it
#[derive(Default)]
pub struct DescriptorSet {
    live: Option<LiveSet>,
    layout: vk::DescriptorSetLayout,
    usage: ShaderUsage,
}

impl DescriptorSet {
    /// Allocate a set for `layout` and write all `writes` in one update
    ///
    /// `usage` must describe exactly the data the writes bind.
    pub fn allocate(
        device: &Arc<dyn GpuDevice>,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        usage: ShaderUsage,
        writes: &[DescriptorWrite],
    ) -> EngineResult<Self> {
        let set = device.allocate_descriptor_set(pool, layout)?;
        if !writes.is_empty() {
            device.update_descriptor_set(set, writes);
        }
        Ok(Self {
            live: Some(LiveSet {
                device: Arc::clone(device),
                pool,
                set,
            }),
            layout,
            usage,
        })
    }

    /// Native descriptor set, null when empty
    pub fn handle(&self) -> vk::DescriptorSet {
        self.live
            .as_ref()
            .map_or_else(vk::DescriptorSet::null, |live| live.set)
    }

    /// Layout the set was allocated with
    pub const fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Capability flags of the bound data
    pub const fn usage(&self) -> ShaderUsage {
        self.usage
    }

    /// Whether this handle owns a set
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Return the set to its pool. No-op when empty.
    pub fn release(&mut self) {
        if let Some(live) = self.live.take() {
            live.device.free_descriptor_set(live.pool, live.set);
        }
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("handle", &self.handle())
            .field("usage", &self.usage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{mock_device, Kind};

    #[test]
    fn test_all_writes_go_in_one_update() {
        let (mock, device) = mock_device();
        let writes = [
            DescriptorWrite::UniformBuffer {
                binding: 0,
                buffer: vk::Buffer::null(),
                range: 64,
            },
            DescriptorWrite::CombinedImageSampler {
                binding: 1,
                view: vk::ImageView::null(),
                sampler: vk::Sampler::null(),
            },
        ];
        let set = DescriptorSet::allocate(
            &device,
            vk::DescriptorPool::null(),
            vk::DescriptorSetLayout::null(),
            ShaderUsage::LOCAL_TEXTURED,
            &writes,
        )
        .unwrap();

        let updates = mock.descriptor_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, set.handle());
        assert_eq!(updates[0].1, writes.to_vec());
        assert_eq!(set.usage(), ShaderUsage::LOCAL_TEXTURED);
    }

    #[test]
    fn test_moved_set_is_freed_once() {
        let (mock, device) = mock_device();
        let mut set = DescriptorSet::allocate(
            &device,
            vk::DescriptorPool::null(),
            vk::DescriptorSetLayout::null(),
            ShaderUsage::empty(),
            &[],
        )
        .unwrap();
        let moved = std::mem::take(&mut set);
        set.release();
        assert_eq!(mock.live_of(Kind::DescriptorSet), 1);
        drop(moved);
        assert_eq!(mock.live_of(Kind::DescriptorSet), 0);
    }
}
