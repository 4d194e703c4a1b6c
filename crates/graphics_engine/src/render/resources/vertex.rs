//! Vertex formats and their Vulkan input descriptions

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Which vertex format a model's vertex buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// [`Vertex3D`]: position, normal, uv
    Model3D,
    /// [`Vertex2D`]: screen-space position, uv
    Model2D,
    /// [`Vertex3DTangent`]: position, normal, uv, tangent, bitangent
    Model3DTangent,
}

impl ModelType {
    /// Size of one vertex in bytes
    pub const fn stride(self) -> u32 {
        match self {
            Self::Model3D => std::mem::size_of::<Vertex3D>() as u32,
            Self::Model2D => std::mem::size_of::<Vertex2D>() as u32,
            Self::Model3DTangent => std::mem::size_of::<Vertex3DTangent>() as u32,
        }
    }

    /// Binding 0, per-vertex rate
    pub const fn binding_description(self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride(),
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute locations in declaration order
    pub fn attribute_descriptions(self) -> Vec<vk::VertexInputAttributeDescription> {
        let formats: &[(vk::Format, u32)] = match self {
            Self::Model3D => &[
                (vk::Format::R32G32B32_SFLOAT, 0),
                (vk::Format::R32G32B32_SFLOAT, 12),
                (vk::Format::R32G32_SFLOAT, 24),
            ],
            Self::Model2D => &[(vk::Format::R32G32_SFLOAT, 0), (vk::Format::R32G32_SFLOAT, 8)],
            Self::Model3DTangent => &[
                (vk::Format::R32G32B32_SFLOAT, 0),
                (vk::Format::R32G32B32_SFLOAT, 12),
                (vk::Format::R32G32_SFLOAT, 24),
                (vk::Format::R32G32B32_SFLOAT, 32),
                (vk::Format::R32G32B32_SFLOAT, 44),
            ],
        };

        formats
            .iter()
            .zip(0u32..)
            .map(|(&(format, offset), location)| vk::VertexInputAttributeDescription {
                location,
                binding: 0,
                format,
                offset,
            })
            .collect()
    }
}

/// Lit, textured 3D vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex3D {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

/// 3D vertex with a tangent frame for normal and parallax mapping
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex3DTangent {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Tangent along +u
    pub tangent: [f32; 3],
    /// Bitangent along +v
    pub bitangent: [f32; 3],
}

/// Textured 2D vertex for orthographic overlays
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex2D {
    /// Screen-space position
    pub position: [f32; 2],
    /// Texture coordinates
    pub uv: [f32; 2],
}
