//! Resource factory: buffers, textures, models and drawable components
//!
//! The factory holds no GPU objects of its own. It borrows the descriptor
//! pool and set layouts owned by the presenter and pipeline registry, which
//! outlive every resource created here.

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use crate::foundation::ObjectId;
use crate::render::component::{local_usage, GraphicsComponent, MatrixData, TextureSet};
use crate::render::device::{DescriptorWrite, GpuDevice};
use crate::render::error::{ensure_capabilities, EngineError, EngineResult};
use crate::render::pipeline::config::{PipelineConfig, SetLayoutKind};
use crate::render::pipeline::PipelineType;
use crate::render::resources::{
    load_rgba8, Buffer, DescriptorSet, IndexBuffer, Model, ModelCache, Texture, TextureCache, UniformBuffer,
    VertexFormat,
};
use crate::render::scene::{GlobalBuffers, SceneGlobals};

/// Creates GPU resources against one device
pub struct ResourceFactory {
    device: Arc<dyn GpuDevice>,
    descriptor_pool: vk::DescriptorPool,
    set_layouts: [vk::DescriptorSetLayout; SetLayoutKind::ALL.len()],
    max_anisotropy: f32,
    textures: TextureCache,
    models: ModelCache,
}

impl ResourceFactory {
    /// Factory allocating descriptor sets from `descriptor_pool`
    ///
    /// `set_layout` is queried once per layout kind.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        descriptor_pool: vk::DescriptorPool,
        set_layout: impl Fn(SetLayoutKind) -> vk::DescriptorSetLayout,
        max_anisotropy: f32,
    ) -> Self {
        Self {
            device,
            descriptor_pool,
            set_layouts: SetLayoutKind::ALL.map(set_layout),
            max_anisotropy,
            textures: TextureCache::new(),
            models: ModelCache::new(),
        }
    }

    /// Device every resource is created on
    pub const fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    fn set_layout(&self, kind: SetLayoutKind) -> vk::DescriptorSetLayout {
        self.set_layouts[kind.index()]
    }

    /// Vertex buffer holding `data`
    pub fn create_vertex_buffer(&self, data: &[u8], use_staging: bool) -> EngineResult<Buffer> {
        Buffer::with_data(&self.device, data, vk::BufferUsageFlags::VERTEX_BUFFER, use_staging)
    }

    /// 32-bit index buffer
    pub fn create_index_buffer(&self, indices: &[u32], use_staging: bool) -> EngineResult<IndexBuffer> {
        IndexBuffer::new(&self.device, indices, use_staging)
    }

    /// Texture from tightly packed RGBA8 pixels
    pub fn create_texture(&self, pixels: &[u8], width: u32, height: u32, use_staging: bool) -> EngineResult<Arc<Texture>> {
        Texture::from_rgba8(&self.device, pixels, width, height, use_staging, self.max_anisotropy).map(Arc::new)
    }

    /// Decode an image file into a staged texture, shared by file name
    pub fn load_texture(&mut self, path: &str) -> EngineResult<Arc<Texture>> {
        let device = &self.device;
        let max_anisotropy = self.max_anisotropy;
        self.textures.load_or_insert_with(path, |path| {
            let (pixels, width, height) = load_rgba8(path)?;
            Texture::from_rgba8(device, &pixels, width, height, true, max_anisotropy)
        })
    }

    /// Upload a mesh
    pub fn create_model<V: VertexFormat>(
        &self,
        vertices: &[V],
        indices: &[u32],
        use_staging: bool,
    ) -> EngineResult<Arc<Model>> {
        Model::new(&self.device, vertices, indices, use_staging).map(Arc::new)
    }

    /// Upload a mesh once per `name`; later calls return the shared copy
    pub fn cached_model<V: VertexFormat>(&mut self, name: &str, vertices: &[V], indices: &[u32]) -> EngineResult<Arc<Model>> {
        let device = &self.device;
        self.models
            .load_or_insert_with(name, |_| Model::new(device, vertices, indices, true))
    }

    /// Drop cached resources nothing else references
    pub fn purge_unused(&mut self) -> usize {
        self.textures.purge_unused() + self.models.purge_unused()
    }

    /// Drawable component for `pipeline_type`
    ///
    /// The local descriptor set binds the model transform at binding 0 and
    /// the textures from binding 1, all written in one update. Fails without
    /// creating anything when the model's vertex layout or the bound data do
    /// not match what the pipeline was built for.
    pub fn create_graphics_component(
        &self,
        id: ObjectId,
        model: Arc<Model>,
        textures: TextureSet,
        pipeline_type: PipelineType,
        layer: i32,
    ) -> EngineResult<GraphicsComponent> {
        let config = PipelineConfig::for_type(pipeline_type);
        if model.model_type() != config.model_type {
            return Err(EngineError::InvalidOperation {
                reason: format!(
                    "{pipeline_type:?} draws {:?} vertices, model has {:?}",
                    config.model_type,
                    model.model_type()
                ),
            });
        }
        let usage = local_usage(&model, &textures);
        ensure_capabilities("local set", config.requirements().local, usage)?;

        let identity: MatrixData = Matrix4::<f32>::identity().into();
        let transform = UniformBuffer::with_value(&self.device, &identity)?;

        let mut writes = vec![DescriptorWrite::UniformBuffer {
            binding: 0,
            buffer: transform.handle(),
            range: transform.size(),
        }];
        writes.extend(textures.sampler_writes());

        let descriptor_set = DescriptorSet::allocate(
            &self.device,
            self.descriptor_pool,
            self.set_layout(config.layout.local()),
            usage,
            &writes,
        )?;

        log::debug!("[FACTORY] Created component {id} for {pipeline_type:?} on layer {layer}");
        Ok(GraphicsComponent::from_parts(
            id,
            layer,
            pipeline_type,
            model,
            textures,
            descriptor_set,
            transform,
        ))
    }

    /// Projection-view, light and camera buffers shared by scenes
    pub fn create_global_buffers(&self) -> EngineResult<Arc<GlobalBuffers>> {
        GlobalBuffers::new(&self.device).map(Arc::new)
    }

    /// Global descriptor sets of one scene reading from `buffers`
    pub fn create_scene_globals(&self, buffers: Arc<GlobalBuffers>) -> EngineResult<SceneGlobals> {
        SceneGlobals::new(
            &self.device,
            self.descriptor_pool,
            |kind| self.set_layout(kind),
            buffers,
        )
    }
}

impl std::fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("descriptor_pool", &self.descriptor_pool)
            .field("cached_textures", &self.textures.len())
            .field("cached_models", &self.models.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::capability::ShaderUsage;
    use crate::render::mock::{mock_device, Kind, MockDevice};
    use crate::render::recording::Drawable;
    use crate::render::resources::{Vertex2D, Vertex3D, Vertex3DTangent};
    use crate::render::scene::DrawItem;
    use ash::vk::Handle;

    fn factory() -> (Arc<MockDevice>, ResourceFactory) {
        let (mock, device) = mock_device();
        let factory = ResourceFactory::new(
            device,
            vk::DescriptorPool::from_raw(0xD00),
            |kind| vk::DescriptorSetLayout::from_raw(0x100 + kind.index() as u64),
            16.0,
        );
        (mock, factory)
    }

    fn texture(factory: &ResourceFactory) -> Arc<Texture> {
        factory.create_texture(&[255; 16], 2, 2, false).unwrap()
    }

    #[test]
    fn test_component_writes_transform_and_texture_in_one_update() {
        let (mock, factory) = factory();
        let model = factory.create_model(&[Vertex3D::default(); 3], &[0, 1, 2], true).unwrap();
        let base = texture(&factory);
        let updates_before = mock.descriptor_updates().len();

        let component = factory
            .create_graphics_component(7, model, TextureSet::Single(Arc::clone(&base)), PipelineType::Phong, 2)
            .unwrap();

        let updates = mock.descriptor_updates();
        assert_eq!(updates.len(), updates_before + 1);
        let (set, writes) = updates.last().unwrap();
        assert_eq!(*set, component.local_set());
        assert_eq!(
            *writes,
            vec![
                DescriptorWrite::UniformBuffer {
                    binding: 0,
                    buffer: component.transform_buffer().handle(),
                    range: 64,
                },
                DescriptorWrite::CombinedImageSampler {
                    binding: 1,
                    view: base.view(),
                    sampler: base.sampler(),
                },
            ]
        );
        assert_eq!(component.local_usage(), ShaderUsage::LOCAL_TEXTURED);
        assert_eq!(component.object_id(), 7);
        assert_eq!(component.layer(), 2);
        assert_eq!(component.index_count(), 3);
    }

    #[test]
    fn test_component_starts_with_identity_transform() {
        let (mock, factory) = factory();
        let model = factory.create_model(&[Vertex3D::default(); 3], &[0, 1, 2], true).unwrap();
        let component = factory
            .create_graphics_component(1, model, TextureSet::Single(texture(&factory)), PipelineType::NoLight, 0)
            .unwrap();

        let bytes = mock.buffer_contents(component.transform_buffer().handle());
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let identity: MatrixData = Matrix4::<f32>::identity().into();
        assert_eq!(floats, identity.iter().flatten().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_bump_mapped_component_needs_normal_map() {
        let (mock, factory) = factory();
        let model = factory
            .create_model(&[Vertex3DTangent::default(); 3], &[0, 1, 2], true)
            .unwrap();
        let live_before = mock.live_count();

        let err = factory
            .create_graphics_component(1, Arc::clone(&model), TextureSet::Single(texture(&factory)), PipelineType::BumpMap, 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::CapabilityMismatch { what: "local set", .. }));
        // only the texture made for the call was created, and it is gone again
        assert_eq!(mock.live_count(), live_before);

        let textures = TextureSet::BumpMapped {
            base: texture(&factory),
            normal: texture(&factory),
        };
        let component = factory
            .create_graphics_component(2, model, textures, PipelineType::BumpMap, 0)
            .unwrap();
        assert_eq!(component.local_usage(), ShaderUsage::LOCAL_BUMP_MAPPED);
    }

    #[test]
    fn test_vertex_layout_must_match_pipeline() {
        let (_mock, factory) = factory();
        let model = factory.create_model(&[Vertex2D::default(); 3], &[0, 1, 2], true).unwrap();
        let err = factory
            .create_graphics_component(1, model, TextureSet::Single(texture(&factory)), PipelineType::Phong, 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation { .. }));
    }

    #[test]
    fn test_component_uses_local_layout_of_its_pipeline() {
        let (mock, factory) = factory();
        let model = factory
            .create_model(&[Vertex3DTangent::default(); 3], &[0, 1, 2], true)
            .unwrap();
        let textures = TextureSet::Parallax {
            base: texture(&factory),
            normal: texture(&factory),
            depth: texture(&factory),
        };
        let component = factory
            .create_graphics_component(3, model, textures, PipelineType::Parallax, 0)
            .unwrap();

        assert_eq!(
            component.descriptor_set().layout(),
            vk::DescriptorSetLayout::from_raw(0x100 + SetLayoutKind::LocalParallax.index() as u64)
        );
        assert_eq!(mock.descriptor_updates().last().map(|(_, w)| w.len()), Some(4));
    }

    #[test]
    fn test_shared_model_outlives_first_component() {
        let (mock, factory) = factory();
        let model = factory.create_model(&[Vertex3D::default(); 3], &[0, 1, 2], false).unwrap();
        let first = factory
            .create_graphics_component(1, Arc::clone(&model), TextureSet::Single(texture(&factory)), PipelineType::NoLight, 0)
            .unwrap();
        let second = factory
            .create_graphics_component(2, Arc::clone(&model), TextureSet::Single(texture(&factory)), PipelineType::NoLight, 0)
            .unwrap();
        drop(model);

        drop(first);
        assert_eq!(second.vertex_buffer(), second.model().vertex_buffer());
        assert_eq!(mock.live_of(Kind::DescriptorSet), 1);

        drop(second);
        assert_eq!(mock.live_count(), 0);
    }

    #[test]
    fn test_scene_globals_use_factory_pool() {
        let (mock, factory) = factory();
        let buffers = factory.create_global_buffers().unwrap();
        let globals = factory.create_scene_globals(Arc::clone(&buffers)).unwrap();

        assert!(globals.find(ShaderUsage::GLOBAL_LIT_CAMERA).is_some());
        drop(globals);
        drop(buffers);
        assert_eq!(mock.live_count(), 0);
    }

    #[test]
    fn test_cached_model_is_uploaded_once() {
        let (mock, mut factory) = factory();
        let vertices = [Vertex3D::default(); 3];
        let first = factory.cached_model("meshes/cube.obj", &vertices, &[0, 1, 2]).unwrap();
        let buffers = mock.live_of(Kind::Buffer);
        let second = factory.cached_model("other/cube.obj", &vertices, &[0, 1, 2]).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mock.live_of(Kind::Buffer), buffers);

        drop(first);
        drop(second);
        assert_eq!(factory.purge_unused(), 1);
        assert_eq!(mock.live_count(), 0);
    }
}
