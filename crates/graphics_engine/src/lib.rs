//! # Graphics Engine
//!
//! The Vulkan rendering core of a small engine: GPU resource lifetimes,
//! shader capability matching, a registry of pipelines per draw style,
//! layered draw scheduling with minimal state changes, and the swapchain
//! frame loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphics_engine::prelude::*;
//! # fn run(display: raw_window_handle::RawDisplayHandle, window: raw_window_handle::RawWindowHandle) -> EngineResult<()> {
//! let config = EngineConfig::new("demo");
//! let mut engine = Engine::new(&config, display, window, (1280, 720))?;
//!
//! let quad = [Vertex3D::default(); 4];
//! let model = engine.create_model(&quad, &[0, 1, 2, 2, 3, 0], true)?;
//! let texture = engine.create_texture(&[255; 4], 1, 1, true)?;
//! let object = engine.create_graphics_component(model, TextureSet::Single(texture), PipelineType::NoLight, 0)?;
//!
//! let globals = engine.create_global_buffers()?;
//! let scene = engine.register_scene(globals)?;
//! engine.attach_object(scene, object)?;
//!
//! engine.update(scene)?;
//! engine.draw()?;
//! engine.finish()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

mod engine;

pub use engine::Engine;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig, PresentModePreference},
        foundation::{IdAllocator, ObjectId},
        render::{
            resources::{Model, ModelType, Texture, Vertex2D, Vertex3D, Vertex3DTangent},
            scene::{GlobalBuffers, SceneId},
            EngineError, EngineResult, GraphicsComponent, PipelineType, ShaderUsage, TextureSet,
        },
        Engine,
    };
}
