//! Shader capability flags
//!
//! Every shader stage declares which shader-visible variables it reads, split
//! into the scene-wide ("global", descriptor set 0) and per-object ("local",
//! descriptor set 1) groups. A pipeline's requirement is the union over its
//! stages; a descriptor set's flags are the union of what was written into it.

use bitflags::bitflags;

bitflags! {
    /// Bitset of shader-visible variable kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderUsage: u32 {
        /// Projection-view matrix (vertex stage)
        const PV_TRANSFORM = 1;
        /// Light position (vertex stage)
        const LIGHT = 1 << 1;
        /// Per-object model matrix (vertex stage)
        const MODEL_TRANSFORM = 1 << 2;
        /// Tangent/bitangent vertex attributes
        const TANGENTS = 1 << 3;
        /// Camera eye position (vertex stage)
        const CAMERA_POSITION = 1 << 4;
        /// Base color texture (fragment stage)
        const TEXTURE = 1 << 5;
        /// Normal map texture (fragment stage)
        const NORMAL_MAP = 1 << 6;
        /// Height map texture used for parallax (fragment stage)
        const DEPTH_MAP = 1 << 7;
    }
}

impl ShaderUsage {
    /// Flags of a global set carrying only the projection-view matrix
    pub const GLOBAL_PV: Self = Self::PV_TRANSFORM;
    /// Flags of a global set carrying projection-view and light
    pub const GLOBAL_LIT: Self = Self::PV_TRANSFORM.union(Self::LIGHT);
    /// Flags of a global set carrying projection-view, light and camera
    pub const GLOBAL_LIT_CAMERA: Self = Self::GLOBAL_LIT.union(Self::CAMERA_POSITION);

    /// Local flags of a component with a single texture
    pub const LOCAL_TEXTURED: Self = Self::MODEL_TRANSFORM.union(Self::TEXTURE);
    /// Local flags of a normal mapped component
    pub const LOCAL_BUMP_MAPPED: Self = Self::LOCAL_TEXTURED
        .union(Self::TANGENTS)
        .union(Self::NORMAL_MAP);
    /// Local flags of a parallax mapped component
    pub const LOCAL_PARALLAX: Self = Self::LOCAL_BUMP_MAPPED.union(Self::DEPTH_MAP);
}

/// Global and local flags a single shader stage reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageUsage {
    /// Variables read from descriptor set 0
    pub global: ShaderUsage,
    /// Variables read from descriptor set 1
    pub local: ShaderUsage,
}

impl StageUsage {
    /// Declare a stage's usage
    pub const fn new(global: ShaderUsage, local: ShaderUsage) -> Self {
        Self { global, local }
    }

    /// Union of the usage of several stages
    pub fn combine(stages: &[Self]) -> Self {
        stages.iter().fold(
            Self::new(ShaderUsage::empty(), ShaderUsage::empty()),
            |acc, stage| Self::new(acc.global | stage.global, acc.local | stage.local),
        )
    }
}
