//! GPU resource handles and the data they carry

pub mod buffer;
pub mod cache;
pub mod descriptor;
pub mod model;
pub mod texture;
pub mod transition;
pub mod uniform;
pub mod vertex;

pub use buffer::{Buffer, IndexBuffer};
pub use cache::{resource_name, CacheStats, ModelCache, ResourceCache, TextureCache};
pub use descriptor::DescriptorSet;
pub use model::{Model, VertexFormat};
pub use texture::{load_rgba8, pitched_rows, Texture, TEXTURE_FORMAT};
pub use transition::{has_stencil_component, transition_barrier, TransitionBarrier};
pub use uniform::UniformBuffer;
pub use vertex::{ModelType, Vertex2D, Vertex3D, Vertex3DTangent};
