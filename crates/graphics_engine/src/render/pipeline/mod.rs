//! Draw styles and the pipelines that implement them

pub mod config;
pub mod registry;

pub use config::{
    CullMode, PipelineConfig, PipelineLayoutKind, PolygonMode, SetBinding, SetLayoutKind, ShaderStage,
};
pub use registry::PipelineRegistry;

use ash::vk;

use crate::render::capability::ShaderUsage;

/// Draw style of a component, one pipeline each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineType {
    /// Textured, no lighting
    NoLight,
    /// Textured 2D overlay drawn in screen space
    OrthoTextured,
    /// Per-fragment Phong lighting
    Phong,
    /// Quantized cel shading
    Toon,
    /// Unlit polygon outlines
    Wireframe,
    /// Unlit and never writes depth
    Skybox,
    /// Phong with a tangent-space normal map
    BumpMap,
    /// Bump mapping plus parallax offset from a height map
    Parallax,
}

impl PipelineType {
    /// Every draw style, in registry order
    pub const ALL: [Self; 8] = [
        Self::NoLight,
        Self::OrthoTextured,
        Self::Phong,
        Self::Toon,
        Self::Wireframe,
        Self::Skybox,
        Self::BumpMap,
        Self::Parallax,
    ];

    /// Slot of this draw style in the registry table
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Native pipeline state and requirements needed to record draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineBinding {
    /// Draw style this binding belongs to
    pub pipeline_type: PipelineType,
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
    /// Layout used for descriptor binding
    pub layout: vk::PipelineLayout,
    /// Flags the global set (set 0) must carry
    pub global_req: ShaderUsage,
    /// Flags a component's local set (set 1) must carry
    pub local_req: ShaderUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_cover_registry_table() {
        for (slot, pipeline_type) in PipelineType::ALL.iter().enumerate() {
            assert_eq!(pipeline_type.index(), slot);
        }
    }
}
