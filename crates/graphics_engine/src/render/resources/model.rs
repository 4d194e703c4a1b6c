//! GPU geometry: one vertex buffer and one index buffer

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::render::device::GpuDevice;
use crate::render::error::EngineResult;
use crate::render::resources::buffer::{Buffer, IndexBuffer};
use crate::render::resources::vertex::{ModelType, Vertex2D, Vertex3D, Vertex3DTangent};

/// Vertex struct with a known input layout
pub trait VertexFormat: Pod {
    /// Layout tag of this vertex type
    const MODEL_TYPE: ModelType;
}

impl VertexFormat for Vertex3D {
    const MODEL_TYPE: ModelType = ModelType::Model3D;
}

impl VertexFormat for Vertex3DTangent {
    const MODEL_TYPE: ModelType = ModelType::Model3DTangent;
}

impl VertexFormat for Vertex2D {
    const MODEL_TYPE: ModelType = ModelType::Model2D;
}

/// Vertex and index buffers of one loaded mesh
#[derive(Debug)]
pub struct Model {
    vertices: Buffer,
    indices: IndexBuffer,
    model_type: ModelType,
}

impl Model {
    /// Upload a mesh
    pub fn new<V: VertexFormat>(
        device: &Arc<dyn GpuDevice>,
        vertices: &[V],
        indices: &[u32],
        use_staging: bool,
    ) -> EngineResult<Self> {
        let vertex_buffer = Buffer::with_data(
            device,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            use_staging,
        )?;
        let index_buffer = IndexBuffer::new(device, indices, use_staging)?;
        Ok(Self::from_parts(vertex_buffer, index_buffer, V::MODEL_TYPE))
    }

    /// Assemble a model from buffers created elsewhere
    pub const fn from_parts(vertices: Buffer, indices: IndexBuffer, model_type: ModelType) -> Self {
        Self {
            vertices,
            indices,
            model_type,
        }
    }

    /// Native vertex buffer
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.handle()
    }

    /// Native index buffer
    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.handle()
    }

    /// Number of indices to draw
    pub const fn index_count(&self) -> u32 {
        self.indices.index_count()
    }

    /// Vertex layout of the vertex buffer
    pub const fn model_type(&self) -> ModelType {
        self.model_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{mock_device, Kind};

    #[test]
    fn test_quad_upload() {
        let (mock, device) = mock_device();
        let quad = [Vertex2D::default(); 4];
        let model = Model::new(&device, &quad, &[0, 1, 2, 2, 3, 0], true).unwrap();

        assert_eq!(model.model_type(), ModelType::Model2D);
        assert_eq!(model.index_count(), 6);
        assert_eq!(mock.live_of(Kind::Buffer), 2);

        drop(model);
        assert_eq!(mock.live_count(), 0);
    }
}
