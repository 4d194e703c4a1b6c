//! Pipeline configuration tables
//!
//! Pure data describing the seven descriptor set layouts, the five pipeline
//! layouts built from them and the configuration of each draw style. The
//! Vulkan objects are created from these tables by the registry.

use ash::vk;

use crate::render::capability::{ShaderUsage, StageUsage};
use crate::render::pipeline::PipelineType;
use crate::render::resources::ModelType;

/// One binding slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetBinding {
    /// Uniform buffer read by the vertex stage
    Uniform(u32),
    /// Combined image sampler read by the fragment stage
    Sampler(u32),
}

impl SetBinding {
    /// Binding number
    pub const fn binding(self) -> u32 {
        match self {
            Self::Uniform(binding) | Self::Sampler(binding) => binding,
        }
    }

    /// Native layout binding
    pub fn layout_binding(self) -> vk::DescriptorSetLayoutBinding {
        let (ty, stage) = match self {
            Self::Uniform(_) => (vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
            Self::Sampler(_) => (
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            ),
        };
        vk::DescriptorSetLayoutBinding::builder()
            .binding(self.binding())
            .descriptor_type(ty)
            .descriptor_count(1)
            .stage_flags(stage)
            .build()
    }
}

const GLOBAL_PV_BINDINGS: [SetBinding; 1] = [SetBinding::Uniform(0)];
const LOCAL_TEXTURED_BINDINGS: [SetBinding; 2] = [SetBinding::Uniform(0), SetBinding::Sampler(1)];
const GLOBAL_LIT_BINDINGS: [SetBinding; 2] = [SetBinding::Uniform(0), SetBinding::Uniform(1)];
const LOCAL_BUMP_MAPPED_BINDINGS: [SetBinding; 3] =
    [SetBinding::Uniform(0), SetBinding::Sampler(1), SetBinding::Sampler(2)];
const GLOBAL_LIT_CAMERA_BINDINGS: [SetBinding; 3] =
    [SetBinding::Uniform(0), SetBinding::Uniform(1), SetBinding::Uniform(2)];
const LOCAL_PARALLAX_BINDINGS: [SetBinding; 4] = [
    SetBinding::Uniform(0),
    SetBinding::Sampler(1),
    SetBinding::Sampler(2),
    SetBinding::Sampler(3),
];

/// Descriptor set layouts shared by all pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetLayoutKind {
    /// Global: projection-view
    GlobalPv,
    /// Local: model transform and one texture
    LocalTextured,
    /// Global: projection-view and light
    GlobalLit,
    /// Local: model transform, texture, normal map
    LocalBumpMapped,
    /// Global: projection-view, light and camera
    GlobalLitCamera,
    /// Local: model transform, texture, normal map, height map
    LocalParallax,
    /// No bindings
    Empty,
}

impl SetLayoutKind {
    /// Every layout, in creation order
    pub const ALL: [Self; 7] = [
        Self::GlobalPv,
        Self::LocalTextured,
        Self::GlobalLit,
        Self::LocalBumpMapped,
        Self::GlobalLitCamera,
        Self::LocalParallax,
        Self::Empty,
    ];

    /// Slot in the registry's layout table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bindings of this layout
    pub const fn bindings(self) -> &'static [SetBinding] {
        match self {
            Self::GlobalPv => &GLOBAL_PV_BINDINGS,
            Self::LocalTextured => &LOCAL_TEXTURED_BINDINGS,
            Self::GlobalLit => &GLOBAL_LIT_BINDINGS,
            Self::LocalBumpMapped => &LOCAL_BUMP_MAPPED_BINDINGS,
            Self::GlobalLitCamera => &GLOBAL_LIT_CAMERA_BINDINGS,
            Self::LocalParallax => &LOCAL_PARALLAX_BINDINGS,
            Self::Empty => &[],
        }
    }

    /// Flags of a descriptor set filled for this layout
    pub const fn usage(self) -> ShaderUsage {
        match self {
            Self::GlobalPv => ShaderUsage::GLOBAL_PV,
            Self::LocalTextured => ShaderUsage::LOCAL_TEXTURED,
            Self::GlobalLit => ShaderUsage::GLOBAL_LIT,
            Self::LocalBumpMapped => ShaderUsage::LOCAL_BUMP_MAPPED,
            Self::GlobalLitCamera => ShaderUsage::GLOBAL_LIT_CAMERA,
            Self::LocalParallax => ShaderUsage::LOCAL_PARALLAX,
            Self::Empty => ShaderUsage::empty(),
        }
    }
}

/// Pipeline layouts, each a (global, local) pair of set layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineLayoutKind {
    /// Projection-view + textured object
    Unlit,
    /// Lit global set + textured object
    Lit,
    /// Lit with camera + normal mapped object
    BumpMapped,
    /// Lit with camera + parallax mapped object
    Parallax,
    /// No global data + textured object
    Overlay,
}

impl PipelineLayoutKind {
    /// Every pipeline layout, in creation order
    pub const ALL: [Self; 5] = [
        Self::Unlit,
        Self::Lit,
        Self::BumpMapped,
        Self::Parallax,
        Self::Overlay,
    ];

    /// Slot in the registry's pipeline layout table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Layout bound at set 0
    pub const fn global(self) -> SetLayoutKind {
        match self {
            Self::Unlit => SetLayoutKind::GlobalPv,
            Self::Lit => SetLayoutKind::GlobalLit,
            Self::BumpMapped | Self::Parallax => SetLayoutKind::GlobalLitCamera,
            Self::Overlay => SetLayoutKind::Empty,
        }
    }

    /// Layout bound at set 1
    pub const fn local(self) -> SetLayoutKind {
        match self {
            Self::Unlit | Self::Lit | Self::Overlay => SetLayoutKind::LocalTextured,
            Self::BumpMapped => SetLayoutKind::LocalBumpMapped,
            Self::Parallax => SetLayoutKind::LocalParallax,
        }
    }
}

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

impl From<CullMode> for vk::CullModeFlags {
    fn from(mode: CullMode) -> Self {
        match mode {
            CullMode::None => Self::NONE,
            CullMode::Front => Self::FRONT,
            CullMode::Back => Self::BACK,
        }
    }
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    /// Solid triangles
    Fill,
    /// Triangle outlines
    Line,
}

impl From<PolygonMode> for vk::PolygonMode {
    fn from(mode: PolygonMode) -> Self {
        match mode {
            PolygonMode::Fill => Self::FILL,
            PolygonMode::Line => Self::LINE,
        }
    }
}

/// A shader stage: SPIR-V file name plus the variables it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    /// File name inside the shader directory
    pub file: &'static str,
    /// Global and local flags the stage reads
    pub usage: StageUsage,
}

impl ShaderStage {
    const fn new(file: &'static str, global: ShaderUsage, local: ShaderUsage) -> Self {
        Self {
            file,
            usage: StageUsage::new(global, local),
        }
    }
}

const SIMPLE_VERT: ShaderStage =
    ShaderStage::new("simple_vert.spv", ShaderUsage::GLOBAL_PV, ShaderUsage::MODEL_TRANSFORM);
const SIMPLE_TEXTURED_FRAG: ShaderStage =
    ShaderStage::new("simple_textured_frag.spv", ShaderUsage::empty(), ShaderUsage::TEXTURE);
const LIGHT_VERT: ShaderStage =
    ShaderStage::new("light_vert.spv", ShaderUsage::GLOBAL_LIT, ShaderUsage::MODEL_TRANSFORM);
const PHONG_FRAG: ShaderStage = ShaderStage::new("phong_frag.spv", ShaderUsage::empty(), ShaderUsage::TEXTURE);
const TOON_FRAG: ShaderStage = ShaderStage::new("toon_frag.spv", ShaderUsage::empty(), ShaderUsage::TEXTURE);
const TANGENT_SPACE_VERT: ShaderStage = ShaderStage::new(
    "tangent_space_vert.spv",
    ShaderUsage::GLOBAL_LIT_CAMERA,
    ShaderUsage::MODEL_TRANSFORM.union(ShaderUsage::TANGENTS),
);
const BUMP_MAP_FRAG: ShaderStage = ShaderStage::new(
    "bump_map_frag.spv",
    ShaderUsage::empty(),
    ShaderUsage::TEXTURE.union(ShaderUsage::NORMAL_MAP),
);
const PARALLAX_FRAG: ShaderStage = ShaderStage::new(
    "parallax_frag.spv",
    ShaderUsage::empty(),
    ShaderUsage::TEXTURE
        .union(ShaderUsage::NORMAL_MAP)
        .union(ShaderUsage::DEPTH_MAP),
);
const ORTHO_TEXTURED_VERT: ShaderStage =
    ShaderStage::new("ortho_textured_vert.spv", ShaderUsage::empty(), ShaderUsage::MODEL_TRANSFORM);

/// Configuration for a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Type of pipeline
    pub pipeline_type: PipelineType,
    /// Vertex stage
    pub vertex_shader: ShaderStage,
    /// Fragment stage
    pub fragment_shader: ShaderStage,
    /// Vertex input format
    pub model_type: ModelType,
    /// Descriptor layout pair
    pub layout: PipelineLayoutKind,
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writing
    pub depth_write: bool,
    /// Enable alpha blending
    pub alpha_blending: bool,
    /// Cull mode for backface culling
    pub cull_mode: CullMode,
    /// Fill or outline
    pub polygon_mode: PolygonMode,
}

impl PipelineConfig {
    /// Configuration of `pipeline_type`
    pub const fn for_type(pipeline_type: PipelineType) -> Self {
        let base = Self {
            pipeline_type,
            vertex_shader: SIMPLE_VERT,
            fragment_shader: SIMPLE_TEXTURED_FRAG,
            model_type: ModelType::Model3D,
            layout: PipelineLayoutKind::Unlit,
            depth_test: true,
            depth_write: true,
            alpha_blending: true,
            cull_mode: CullMode::Back,
            polygon_mode: PolygonMode::Fill,
        };

        match pipeline_type {
            PipelineType::NoLight => base,
            PipelineType::Skybox => Self {
                depth_write: false,
                ..base
            },
            PipelineType::Wireframe => Self {
                polygon_mode: PolygonMode::Line,
                ..base
            },
            PipelineType::Phong => Self {
                vertex_shader: LIGHT_VERT,
                fragment_shader: PHONG_FRAG,
                layout: PipelineLayoutKind::Lit,
                ..base
            },
            PipelineType::Toon => Self {
                vertex_shader: LIGHT_VERT,
                fragment_shader: TOON_FRAG,
                layout: PipelineLayoutKind::Lit,
                ..base
            },
            PipelineType::BumpMap => Self {
                vertex_shader: TANGENT_SPACE_VERT,
                fragment_shader: BUMP_MAP_FRAG,
                model_type: ModelType::Model3DTangent,
                layout: PipelineLayoutKind::BumpMapped,
                ..base
            },
            PipelineType::Parallax => Self {
                vertex_shader: TANGENT_SPACE_VERT,
                fragment_shader: PARALLAX_FRAG,
                model_type: ModelType::Model3DTangent,
                layout: PipelineLayoutKind::Parallax,
                ..base
            },
            PipelineType::OrthoTextured => Self {
                vertex_shader: ORTHO_TEXTURED_VERT,
                model_type: ModelType::Model2D,
                layout: PipelineLayoutKind::Overlay,
                ..base
            },
        }
    }

    /// Union of both stages' declared usage
    pub fn requirements(&self) -> StageUsage {
        StageUsage::combine(&[self.vertex_shader.usage, self.fragment_shader.usage])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_match_layout_sets() {
        for pipeline_type in PipelineType::ALL {
            let config = PipelineConfig::for_type(pipeline_type);
            let required = config.requirements();
            assert_eq!(required.global, config.layout.global().usage(), "{pipeline_type:?} global");
            assert_eq!(required.local, config.layout.local().usage(), "{pipeline_type:?} local");
        }
    }

    #[test]
    fn test_requirement_table() {
        let expect = [
            (PipelineType::NoLight, ShaderUsage::GLOBAL_PV, ShaderUsage::LOCAL_TEXTURED),
            (PipelineType::Skybox, ShaderUsage::GLOBAL_PV, ShaderUsage::LOCAL_TEXTURED),
            (PipelineType::Wireframe, ShaderUsage::GLOBAL_PV, ShaderUsage::LOCAL_TEXTURED),
            (PipelineType::Phong, ShaderUsage::GLOBAL_LIT, ShaderUsage::LOCAL_TEXTURED),
            (PipelineType::Toon, ShaderUsage::GLOBAL_LIT, ShaderUsage::LOCAL_TEXTURED),
            (PipelineType::BumpMap, ShaderUsage::GLOBAL_LIT_CAMERA, ShaderUsage::LOCAL_BUMP_MAPPED),
            (PipelineType::Parallax, ShaderUsage::GLOBAL_LIT_CAMERA, ShaderUsage::LOCAL_PARALLAX),
            (PipelineType::OrthoTextured, ShaderUsage::empty(), ShaderUsage::LOCAL_TEXTURED),
        ];
        for (pipeline_type, global, local) in expect {
            let required = PipelineConfig::for_type(pipeline_type).requirements();
            assert_eq!(required.global, global, "{pipeline_type:?}");
            assert_eq!(required.local, local, "{pipeline_type:?}");
        }
    }

    #[test]
    fn test_fixed_function_variants() {
        assert!(!PipelineConfig::for_type(PipelineType::Skybox).depth_write);
        assert_eq!(
            PipelineConfig::for_type(PipelineType::Wireframe).polygon_mode,
            PolygonMode::Line
        );
        assert_eq!(
            PipelineConfig::for_type(PipelineType::Phong).polygon_mode,
            PolygonMode::Fill
        );
        assert_eq!(
            PipelineConfig::for_type(PipelineType::OrthoTextured).model_type,
            ModelType::Model2D
        );
    }

    #[test]
    fn test_set_bindings_are_contiguous_from_zero() {
        for kind in SetLayoutKind::ALL {
            for (expected, binding) in (0u32..).zip(kind.bindings()) {
                assert_eq!(binding.binding(), expected, "{kind:?}");
            }
        }
    }
}
