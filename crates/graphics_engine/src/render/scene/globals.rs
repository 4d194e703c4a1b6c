//! Scene-wide uniform buffers and the global descriptor sets bound to them

use std::sync::Arc;

use ash::vk;
use nalgebra::{Matrix4, Vector3};

use crate::render::capability::ShaderUsage;
use crate::render::component::MatrixData;
use crate::render::device::{DescriptorWrite, GpuDevice};
use crate::render::error::EngineResult;
use crate::render::pipeline::{PipelineLayoutKind, SetBinding, SetLayoutKind};
use crate::render::resources::{DescriptorSet, UniformBuffer};

/// Vec3 padded to 16 bytes for std140 layout
pub type PaddedVec3 = [f32; 4];

/// Projection-view transform, light position and camera position
#[derive(Debug)]
pub struct GlobalBuffers {
    transform: UniformBuffer<MatrixData>,
    light: UniformBuffer<PaddedVec3>,
    camera: UniformBuffer<PaddedVec3>,
}

impl GlobalBuffers {
    /// Create the buffers with an identity transform and origin positions
    pub fn new(device: &Arc<dyn GpuDevice>) -> EngineResult<Self> {
        Ok(Self {
            transform: UniformBuffer::with_value(device, &Matrix4::<f32>::identity().into())?,
            light: UniformBuffer::with_value(device, &[0.0; 4])?,
            camera: UniformBuffer::with_value(device, &[0.0; 4])?,
        })
    }

    /// Upload the projection-view matrix
    pub fn set_projection_view(&self, projection_view: &Matrix4<f32>) -> EngineResult<()> {
        let data: MatrixData = (*projection_view).into();
        self.transform.update(&data)
    }

    /// Upload the light position
    pub fn set_light_position(&self, position: &Vector3<f32>) -> EngineResult<()> {
        self.light.update(&pad(position))
    }

    /// Upload the camera position
    pub fn set_camera_position(&self, position: &Vector3<f32>) -> EngineResult<()> {
        self.camera.update(&pad(position))
    }

    /// Uniform buffer read at `binding` of a global set
    fn buffer_at(&self, binding: u32) -> Option<(vk::Buffer, vk::DeviceSize)> {
        match binding {
            0 => Some((self.transform.handle(), self.transform.size())),
            1 => Some((self.light.handle(), self.light.size())),
            2 => Some((self.camera.handle(), self.camera.size())),
            _ => None,
        }
    }
}

fn pad(v: &Vector3<f32>) -> PaddedVec3 {
    [v.x, v.y, v.z, 0.0]
}

/// Global descriptor sets of one scene, one per distinct global layout
///
/// The sets reference the global buffers, which are kept alive here.
#[derive(Debug)]
pub struct SceneGlobals {
    // Freed before the buffers they point at
    sets: Vec<DescriptorSet>,
    buffers: Arc<GlobalBuffers>,
}

impl SceneGlobals {
    /// Allocate and write a set for every global layout any pipeline uses
    pub fn new(
        device: &Arc<dyn GpuDevice>,
        pool: vk::DescriptorPool,
        set_layout: impl Fn(SetLayoutKind) -> vk::DescriptorSetLayout,
        buffers: Arc<GlobalBuffers>,
    ) -> EngineResult<Self> {
        let mut kinds: Vec<SetLayoutKind> = Vec::new();
        for layout in PipelineLayoutKind::ALL {
            if !kinds.contains(&layout.global()) {
                kinds.push(layout.global());
            }
        }

        let mut sets = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let writes: Vec<DescriptorWrite> = kind
                .bindings()
                .iter()
                .filter_map(|binding| match *binding {
                    SetBinding::Uniform(slot) => {
                        buffers
                            .buffer_at(slot)
                            .map(|(buffer, range)| DescriptorWrite::UniformBuffer {
                                binding: slot,
                                buffer,
                                range,
                            })
                    }
                    SetBinding::Sampler(_) => None,
                })
                .collect();
            sets.push(DescriptorSet::allocate(device, pool, set_layout(kind), kind.usage(), &writes)?);
        }

        log::debug!("[SCENE] Created {} global descriptor sets", sets.len());
        Ok(Self { sets, buffers })
    }

    /// Set whose flags equal `usage`
    pub fn find(&self, usage: ShaderUsage) -> Option<vk::DescriptorSet> {
        self.sets
            .iter()
            .find(|set| set.usage() == usage)
            .map(DescriptorSet::handle)
    }

    /// Every set with its flags, as consumed by command planning
    pub fn bindings(&self) -> Vec<(ShaderUsage, vk::DescriptorSet)> {
        self.sets.iter().map(|set| (set.usage(), set.handle())).collect()
    }

    /// Buffers the sets read from
    pub const fn buffers(&self) -> &Arc<GlobalBuffers> {
        &self.buffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{mock_device, Kind};
    use approx::assert_relative_eq;

    fn layout_of(kind: SetLayoutKind) -> vk::DescriptorSetLayout {
        use ash::vk::Handle;
        vk::DescriptorSetLayout::from_raw(1000 + kind.index() as u64)
    }

    #[test]
    fn test_one_set_per_global_combination() {
        let (mock, device) = mock_device();
        let buffers = Arc::new(GlobalBuffers::new(&device).unwrap());
        let globals = SceneGlobals::new(&device, vk::DescriptorPool::null(), layout_of, buffers).unwrap();

        let usages: Vec<ShaderUsage> = globals.bindings().iter().map(|(usage, _)| *usage).collect();
        assert_eq!(usages.len(), 4);
        for usage in [
            ShaderUsage::GLOBAL_PV,
            ShaderUsage::GLOBAL_LIT,
            ShaderUsage::GLOBAL_LIT_CAMERA,
            ShaderUsage::empty(),
        ] {
            assert!(globals.find(usage).is_some(), "{usage:?}");
        }
        assert!(globals.find(ShaderUsage::TEXTURE).is_none());
        assert_eq!(mock.live_of(Kind::DescriptorSet), 4);
    }

    #[test]
    fn test_sets_bind_buffers_at_fixed_slots() {
        let (mock, device) = mock_device();
        let buffers = Arc::new(GlobalBuffers::new(&device).unwrap());
        let transform = buffers.transform.handle();
        let camera = buffers.camera.handle();
        let _globals = SceneGlobals::new(&device, vk::DescriptorPool::null(), layout_of, buffers).unwrap();

        let updates = mock.descriptor_updates();
        // the empty set needs no update
        assert_eq!(updates.len(), 3);
        let lit_camera = updates.iter().find(|(_, writes)| writes.len() == 3).unwrap();
        assert_eq!(
            lit_camera.1[0],
            DescriptorWrite::UniformBuffer {
                binding: 0,
                buffer: transform,
                range: 64
            }
        );
        assert_eq!(
            lit_camera.1[2],
            DescriptorWrite::UniformBuffer {
                binding: 2,
                buffer: camera,
                range: 16
            }
        );
    }

    #[test]
    fn test_light_position_is_padded() {
        let (mock, device) = mock_device();
        let buffers = GlobalBuffers::new(&device).unwrap();
        buffers.set_light_position(&Vector3::new(1.0, -2.0, 3.5)).unwrap();

        let bytes = mock.buffer_contents(buffers.light.handle());
        let light: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|word| f32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        assert_eq!(light.len(), 4);
        assert_relative_eq!(light[0], 1.0);
        assert_relative_eq!(light[1], -2.0);
        assert_relative_eq!(light[2], 3.5);
        assert_relative_eq!(light[3], 0.0);
    }

    #[test]
    fn test_everything_released_with_scene() {
        let (mock, device) = mock_device();
        let buffers = Arc::new(GlobalBuffers::new(&device).unwrap());
        let globals = SceneGlobals::new(&device, vk::DescriptorPool::null(), layout_of, buffers).unwrap();
        drop(globals);
        assert_eq!(mock.live_count(), 0);
    }
}
