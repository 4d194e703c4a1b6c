//! Rendering core
//!
//! Resource handles, capability flags, the pipeline registry, scene draw
//! lists, command planning and the frame lifecycle. The [`vulkan`] module
//! is the only part that calls the native API.

pub mod capability;
pub mod component;
pub mod device;
pub mod error;
pub mod factory;
pub mod frame;
pub mod pipeline;
pub mod recording;
pub mod resources;
pub mod scene;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

pub use capability::{ShaderUsage, StageUsage};
pub use component::{GraphicsComponent, MatrixData, TextureSet};
pub use device::GpuDevice;
pub use error::{EngineError, EngineResult};
pub use factory::ResourceFactory;
pub use frame::{AcquireOutcome, FrameController, FrameOutcome, FrameState, PresentOutcome, PresentationTarget};
pub use pipeline::{PipelineBinding, PipelineType};
pub use recording::{plan_scene_commands, Drawable, RenderCommand};
pub use scene::{GlobalBuffers, SceneGlobals, SceneId, SceneManager};
