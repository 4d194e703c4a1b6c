//! Top-level renderer facade
//!
//! `Engine` wires the native backend to the scene registry: resources are
//! created through it, objects are moved between scenes through it, and
//! [`Engine::update`] plus [`Engine::draw`] drive one scene to the screen.

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::EngineConfig;
use crate::foundation::{IdAllocator, ObjectId};
use crate::render::component::{GraphicsComponent, TextureSet};
use crate::render::device::GpuDevice;
use crate::render::error::{EngineError, EngineResult};
use crate::render::factory::ResourceFactory;
use crate::render::frame::{FrameController, FrameOutcome, PresentationTarget};
use crate::render::pipeline::PipelineType;
use crate::render::recording::plan_scene_commands;
use crate::render::resources::{Buffer, IndexBuffer, Model, Texture, VertexFormat};
use crate::render::scene::{GlobalBuffers, Scene, SceneGlobals, SceneId, SceneManager};
use crate::render::vulkan::{PhysicalDeviceInfo, Surface, VulkanDevice, VulkanInstance, VulkanPresenter};

type Scenes = SceneManager<GraphicsComponent, SceneGlobals>;

/// Whether `update(scene_id)` has to rebuild the recorded commands
///
/// Commands are rebuilt when the scene changed since it was recorded, when
/// a different scene was recorded last, or when nothing valid is recorded.
/// An empty scene never records.
fn needs_recording(scene_id: SceneId, dirty: bool, empty: bool, active: Option<SceneId>, recorded: bool) -> bool {
    !empty && (dirty || active != Some(scene_id) || !recorded)
}

/// Presentation target that holds the recording of one scene
trait SceneTarget: PresentationTarget {
    /// Whether a usable recording exists
    fn is_recorded(&self) -> bool;

    /// Drop the current recording
    fn invalidate(&mut self);

    /// Record `scene` and return the number of planned commands
    fn record_scene(
        &mut self,
        scene: &Scene<GraphicsComponent, SceneGlobals>,
        clear_values: &[vk::ClearValue; 2],
    ) -> EngineResult<usize>;
}

impl SceneTarget for VulkanPresenter {
    fn is_recorded(&self) -> bool {
        Self::is_recorded(self)
    }

    fn invalidate(&mut self) {
        Self::invalidate(self);
    }

    fn record_scene(
        &mut self,
        scene: &Scene<GraphicsComponent, SceneGlobals>,
        clear_values: &[vk::ClearValue; 2],
    ) -> EngineResult<usize> {
        let registry = self.registry();
        let commands = plan_scene_commands(
            scene.draw_list().items(),
            &scene.globals().bindings(),
            |pipeline_type| registry.binding(pipeline_type),
        )?;
        self.record(&commands, clear_values)?;
        Ok(commands.len())
    }
}

/// Scenes plus the target their active one is recorded on
///
/// Every change that can free a handle referenced by the active recording
/// drops that recording first.
struct SceneRenderer<P> {
    // Field order is drop order: objects and scenes release their
    // descriptor sets before the target destroys the pool
    scenes: Scenes,
    target: P,
    frames: FrameController,
    active_scene: Option<SceneId>,
    clear_values: [vk::ClearValue; 2],
}

impl<P: SceneTarget> SceneRenderer<P> {
    fn new(target: P, clear_values: [vk::ClearValue; 2]) -> Self {
        Self {
            scenes: SceneManager::new(),
            target,
            frames: FrameController::new(),
            active_scene: None,
            clear_values,
        }
    }

    fn deregister_scene(&mut self, scene_id: SceneId) -> EngineResult<()> {
        self.invalidate_if_active(scene_id);
        self.scenes.deregister_scene(scene_id)?;
        if self.active_scene == Some(scene_id) {
            self.active_scene = None;
        }
        Ok(())
    }

    fn detach_object(&mut self, scene_id: SceneId, object_id: ObjectId) -> EngineResult<()> {
        self.scenes.detach(scene_id, object_id)?;
        self.invalidate_if_active(scene_id);
        Ok(())
    }

    fn delete_object(&mut self, object_id: ObjectId, scene_id: Option<SceneId>) -> EngineResult<()> {
        let component = self.scenes.delete(object_id, scene_id)?;
        if let Some(scene_id) = scene_id {
            self.invalidate_if_active(scene_id);
        }
        // No frame is in flight between draws, so the handles can go now
        drop(component);
        Ok(())
    }

    fn update(&mut self, scene_id: SceneId) -> EngineResult<()> {
        let scene = self.scenes.scene(scene_id)?;
        if !needs_recording(
            scene_id,
            scene.is_dirty(),
            scene.draw_list().is_empty(),
            self.active_scene,
            self.target.is_recorded(),
        ) {
            return Ok(());
        }
        self.record_scene(scene_id)
    }

    fn draw(&mut self) -> EngineResult<()> {
        if !self.target.is_recorded() && !self.frames.resize_pending() {
            log::trace!("[ENGINE] Nothing recorded, skipping frame");
            return Ok(());
        }

        match self.frames.draw_frame(&mut self.target)? {
            FrameOutcome::Presented => Ok(()),
            FrameOutcome::Recreated { .. } => {
                let Some(scene_id) = self.active_scene else {
                    return Ok(());
                };
                if self.scenes.scene(scene_id)?.draw_list().is_empty() {
                    return Ok(());
                }
                self.record_scene(scene_id)
            }
        }
    }

    fn record_scene(&mut self, scene_id: SceneId) -> EngineResult<()> {
        let count = self
            .target
            .record_scene(self.scenes.scene(scene_id)?, &self.clear_values)?;
        self.scenes.scene_mut(scene_id)?.mark_recorded();
        self.active_scene = Some(scene_id);
        log::debug!("[ENGINE] Recorded {scene_id:?} ({count} commands)");
        Ok(())
    }

    fn invalidate_if_active(&mut self, scene_id: SceneId) {
        if self.active_scene == Some(scene_id) {
            self.target.invalidate();
        }
    }
}

/// Rendering engine bound to one window
pub struct Engine {
    renderer: SceneRenderer<VulkanPresenter>,
    factory: ResourceFactory,
    device: Arc<VulkanDevice>,
    ids: IdAllocator,
}

impl Engine {
    /// Create the Vulkan context for a caller-owned window
    ///
    /// The window must outlive the engine. `size` is the drawable size in
    /// pixels.
    pub fn new(
        config: &EngineConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        size: (u32, u32),
    ) -> EngineResult<Self> {
        config.validate()?;

        let instance = VulkanInstance::new(display, &config.application_name, config.enable_validation)?;
        let surface = Surface::new(&instance, display, window)?;
        let physical = PhysicalDeviceInfo::select_suitable_device(instance.instance(), &surface)?;
        let device = VulkanDevice::new(&instance, physical)?;

        let extent = vk::Extent2D {
            width: size.0,
            height: size.1,
        };
        let presenter = VulkanPresenter::new(Arc::clone(&device), surface, config, extent)?;

        let gpu: Arc<dyn GpuDevice> = device.clone();
        let registry = presenter.registry();
        let factory = ResourceFactory::new(
            gpu,
            presenter.descriptor_pool(),
            |kind| registry.set_layout(kind),
            config.max_anisotropy,
        );

        Ok(Self {
            renderer: SceneRenderer::new(presenter, clear_values(config)),
            factory,
            device,
            ids: IdAllocator::new(),
        })
    }

    /// Resource factory, for callers that manage their own handles
    pub const fn factory(&self) -> &ResourceFactory {
        &self.factory
    }

    /// Vertex buffer holding `data`
    pub fn create_vertex_buffer(&self, data: &[u8], use_staging: bool) -> EngineResult<Buffer> {
        self.factory.create_vertex_buffer(data, use_staging)
    }

    /// 32-bit index buffer
    pub fn create_index_buffer(&self, indices: &[u32], use_staging: bool) -> EngineResult<IndexBuffer> {
        self.factory.create_index_buffer(indices, use_staging)
    }

    /// Texture from tightly packed RGBA8 pixels
    pub fn create_texture(&self, pixels: &[u8], width: u32, height: u32, use_staging: bool) -> EngineResult<Arc<Texture>> {
        self.factory.create_texture(pixels, width, height, use_staging)
    }

    /// Decode and upload an image file, shared by file name
    pub fn load_texture(&mut self, path: &str) -> EngineResult<Arc<Texture>> {
        self.factory.load_texture(path)
    }

    /// Upload a mesh
    pub fn create_model<V: VertexFormat>(
        &self,
        vertices: &[V],
        indices: &[u32],
        use_staging: bool,
    ) -> EngineResult<Arc<Model>> {
        self.factory.create_model(vertices, indices, use_staging)
    }

    /// Projection-view, light and camera buffers for [`register_scene`](Self::register_scene)
    pub fn create_global_buffers(&self) -> EngineResult<Arc<GlobalBuffers>> {
        self.factory.create_global_buffers()
    }

    /// Create a drawable object in the unassigned pool and return its id
    pub fn create_graphics_component(
        &mut self,
        model: Arc<Model>,
        textures: TextureSet,
        pipeline_type: PipelineType,
        layer: i32,
    ) -> EngineResult<ObjectId> {
        let id = self.ids.allocate();
        let component = self
            .factory
            .create_graphics_component(id, model, textures, pipeline_type, layer)?;
        self.renderer.scenes.add_unassigned(component)?;
        Ok(id)
    }

    /// Upload a new model matrix for an object
    pub fn set_object_transform(&self, object_id: ObjectId, model_matrix: &Matrix4<f32>) -> EngineResult<()> {
        self.renderer
            .scenes
            .get(object_id)
            .ok_or(EngineError::NotFound { object_id })?
            .set_transform(model_matrix)
    }

    /// Register a scene drawing with `buffers` as its global data
    pub fn register_scene(&mut self, buffers: Arc<GlobalBuffers>) -> EngineResult<SceneId> {
        let globals = self.factory.create_scene_globals(buffers)?;
        Ok(self.renderer.scenes.register_scene(globals))
    }

    /// Remove a scene; its objects return to the unassigned pool
    pub fn deregister_scene(&mut self, scene_id: SceneId) -> EngineResult<()> {
        self.renderer.deregister_scene(scene_id)
    }

    /// Move an unassigned object into a scene
    pub fn attach_object(&mut self, scene_id: SceneId, object_id: ObjectId) -> EngineResult<()> {
        self.renderer.scenes.attach(scene_id, object_id)
    }

    /// Move an object from a scene back to the unassigned pool
    pub fn detach_object(&mut self, scene_id: SceneId, object_id: ObjectId) -> EngineResult<()> {
        self.renderer.detach_object(scene_id, object_id)
    }

    /// Destroy an object held by `scene_id`, or by the unassigned pool
    pub fn delete_object(&mut self, object_id: ObjectId, scene_id: Option<SceneId>) -> EngineResult<()> {
        self.renderer.delete_object(object_id, scene_id)
    }

    /// Move an object to another draw layer
    pub fn set_object_layer(&mut self, object_id: ObjectId, layer: i32, scene_id: Option<SceneId>) -> EngineResult<()> {
        self.renderer.scenes.set_layer(object_id, layer, scene_id)
    }

    /// Make `scene_id` the drawn scene, rebuilding commands if it changed
    pub fn update(&mut self, scene_id: SceneId) -> EngineResult<()> {
        self.renderer.update(scene_id)
    }

    /// Run one acquire, submit, present cycle
    ///
    /// Does nothing until a non-empty scene has been recorded. A stale
    /// surface is rebuilt here and the active scene re-recorded, so the
    /// caller only sees a skipped frame. A failed rebuild is retried on the
    /// next call.
    pub fn draw(&mut self) -> EngineResult<()> {
        self.renderer.draw()
    }

    /// Rebuild the swapchain at the next draw for a new drawable size
    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("[ENGINE] Resize to {width}x{height}");
        self.renderer
            .target
            .set_window_extent(vk::Extent2D { width, height });
        self.renderer.frames.notify_resized();
    }

    /// Block until the GPU has finished all submitted work
    pub fn finish(&self) -> EngineResult<()> {
        self.device.wait_idle()
    }

    /// Frame counters and state
    pub const fn frames(&self) -> &FrameController {
        &self.renderer.frames
    }

    /// Scene registry and unassigned pool
    pub const fn scenes(&self) -> &Scenes {
        &self.renderer.scenes
    }
}

fn clear_values(config: &EngineConfig) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: config.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: config.clear_depth,
                stencil: 0,
            },
        },
    ]
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("[ENGINE] Wait for idle on shutdown failed: {e}");
        }
    }
}
