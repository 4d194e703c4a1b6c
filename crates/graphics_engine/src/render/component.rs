//! Drawable component: geometry, textures, per-object uniforms and descriptors

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use crate::foundation::ObjectId;
use crate::render::capability::ShaderUsage;
use crate::render::device::DescriptorWrite;
use crate::render::error::EngineResult;
use crate::render::pipeline::PipelineType;
use crate::render::recording::Drawable;
use crate::render::resources::{DescriptorSet, Model, ModelType, Texture, UniformBuffer};
use crate::render::scene::DrawItem;

/// Column-major 4x4 matrix as uploaded to a uniform buffer
pub type MatrixData = [[f32; 4]; 4];

/// Textures bound by a component, from plain to parallax shading
#[derive(Debug, Clone)]
pub enum TextureSet {
    /// Base color only
    Single(Arc<Texture>),
    /// Base color and tangent-space normal map
    BumpMapped {
        /// Base color
        base: Arc<Texture>,
        /// Normal map
        normal: Arc<Texture>,
    },
    /// Base color, normal map and height map
    Parallax {
        /// Base color
        base: Arc<Texture>,
        /// Normal map
        normal: Arc<Texture>,
        /// Height map
        depth: Arc<Texture>,
    },
}

impl TextureSet {
    /// Textures in binding order, starting at binding 1
    pub fn textures(&self) -> Vec<&Arc<Texture>> {
        match self {
            Self::Single(base) => vec![base],
            Self::BumpMapped { base, normal } => vec![base, normal],
            Self::Parallax { base, normal, depth } => vec![base, normal, depth],
        }
    }

    /// Flags contributed by the bound textures
    pub fn usage(&self) -> ShaderUsage {
        match self {
            Self::Single(_) => ShaderUsage::TEXTURE,
            Self::BumpMapped { .. } => ShaderUsage::TEXTURE | ShaderUsage::NORMAL_MAP,
            Self::Parallax { .. } => ShaderUsage::TEXTURE | ShaderUsage::NORMAL_MAP | ShaderUsage::DEPTH_MAP,
        }
    }

    /// Sampler writes for binding 1 onward
    pub fn sampler_writes(&self) -> Vec<DescriptorWrite> {
        (1_u32..)
            .zip(self.textures())
            .map(|(binding, texture)| DescriptorWrite::CombinedImageSampler {
                binding,
                view: texture.view(),
                sampler: texture.sampler(),
            })
            .collect()
    }
}

/// Local flags of a set binding a model transform, `model`'s vertex data and `textures`
pub fn local_usage(model: &Model, textures: &TextureSet) -> ShaderUsage {
    let tangents = if model.model_type() == ModelType::Model3DTangent {
        ShaderUsage::TANGENTS
    } else {
        ShaderUsage::empty()
    };
    ShaderUsage::MODEL_TRANSFORM | tangents | textures.usage()
}

/// One drawable object
///
/// Geometry and textures are shared with other components; the uniform
/// buffer and descriptor set belong to this component alone.
#[derive(Debug)]
pub struct GraphicsComponent {
    id: ObjectId,
    layer: i32,
    pipeline_type: PipelineType,
    model: Arc<Model>,
    textures: TextureSet,
    // Freed before the uniform buffer it points at
    descriptor_set: DescriptorSet,
    transform: UniformBuffer<MatrixData>,
}

impl GraphicsComponent {
    /// Assemble a component from already created parts
    pub(crate) const fn from_parts(
        id: ObjectId,
        layer: i32,
        pipeline_type: PipelineType,
        model: Arc<Model>,
        textures: TextureSet,
        descriptor_set: DescriptorSet,
        transform: UniformBuffer<MatrixData>,
    ) -> Self {
        Self {
            id,
            layer,
            pipeline_type,
            model,
            textures,
            descriptor_set,
            transform,
        }
    }

    /// Upload a new model matrix
    pub fn set_transform(&self, model_matrix: &Matrix4<f32>) -> EngineResult<()> {
        let data: MatrixData = (*model_matrix).into();
        self.transform.update(&data)
    }

    /// Shared geometry
    pub const fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Bound textures
    pub const fn textures(&self) -> &TextureSet {
        &self.textures
    }

    /// Per-object descriptor set
    pub const fn descriptor_set(&self) -> &DescriptorSet {
        &self.descriptor_set
    }

    /// Per-object uniform buffer
    pub const fn transform_buffer(&self) -> &UniformBuffer<MatrixData> {
        &self.transform
    }
}

impl DrawItem for GraphicsComponent {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn layer(&self) -> i32 {
        self.layer
    }

    fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }
}

impl Drawable for GraphicsComponent {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.model.vertex_buffer()
    }

    fn index_buffer(&self) -> vk::Buffer {
        self.model.index_buffer()
    }

    fn index_count(&self) -> u32 {
        self.model.index_count()
    }

    fn local_set(&self) -> vk::DescriptorSet {
        self.descriptor_set.handle()
    }

    fn local_usage(&self) -> ShaderUsage {
        self.descriptor_set.usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::GpuDevice;
    use crate::render::mock::mock_device;
    use crate::render::resources::{Vertex3D, Vertex3DTangent};

    fn texture(device: &Arc<dyn GpuDevice>) -> Arc<Texture> {
        Arc::new(Texture::from_rgba8(device, &[0; 4], 1, 1, true, 1.0).unwrap())
    }

    #[test]
    fn test_sampler_bindings_follow_texture_order() {
        let (_mock, device) = mock_device();
        let (base, normal, depth) = (texture(&device), texture(&device), texture(&device));
        let set = TextureSet::Parallax {
            base: Arc::clone(&base),
            normal: Arc::clone(&normal),
            depth: Arc::clone(&depth),
        };

        let writes = set.sampler_writes();
        let bindings: Vec<u32> = writes.iter().map(DescriptorWrite::binding).collect();
        assert_eq!(bindings, vec![1, 2, 3]);
        assert_eq!(
            writes[1],
            DescriptorWrite::CombinedImageSampler {
                binding: 2,
                view: normal.view(),
                sampler: normal.sampler(),
            }
        );
        assert_eq!(set.usage(), ShaderUsage::TEXTURE | ShaderUsage::NORMAL_MAP | ShaderUsage::DEPTH_MAP);
    }

    #[test]
    fn test_local_usage_adds_tangents_only_for_tangent_models() {
        let (_mock, device) = mock_device();
        let plain = Model::new(&device, &[Vertex3D::default(); 3], &[0, 1, 2], true).unwrap();
        let tangent = Model::new(&device, &[Vertex3DTangent::default(); 3], &[0, 1, 2], true).unwrap();
        let bump = TextureSet::BumpMapped {
            base: texture(&device),
            normal: texture(&device),
        };

        assert_eq!(local_usage(&tangent, &bump), ShaderUsage::LOCAL_BUMP_MAPPED);
        assert_eq!(
            local_usage(&plain, &bump),
            ShaderUsage::LOCAL_BUMP_MAPPED - ShaderUsage::TANGENTS
        );
        assert_eq!(
            local_usage(&plain, &TextureSet::Single(texture(&device))),
            ShaderUsage::LOCAL_TEXTURED
        );
    }
}
