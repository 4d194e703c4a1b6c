//! Draw pass planning
//!
//! A scene's ordered draw list is turned into a flat command stream that
//! binds a pipeline and its global set only when the draw style changes.
//! The Vulkan recorder encodes the stream once per framebuffer.

use ash::vk;

use crate::render::capability::ShaderUsage;
use crate::render::error::{ensure_capabilities, EngineError, EngineResult};
use crate::render::pipeline::{PipelineBinding, PipelineType};
use crate::render::scene::DrawItem;

/// Draw item that carries geometry and a local descriptor set
pub trait Drawable: DrawItem {
    /// Vertex buffer bound at binding 0
    fn vertex_buffer(&self) -> vk::Buffer;
    /// 32-bit index buffer
    fn index_buffer(&self) -> vk::Buffer;
    /// Indices drawn
    fn index_count(&self) -> u32;
    /// Descriptor set bound at set 1
    fn local_set(&self) -> vk::DescriptorSet;
    /// Flags of the local set
    fn local_usage(&self) -> ShaderUsage;
}

/// One step of a draw pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    /// Bind a graphics pipeline
    BindPipeline {
        /// Draw style being bound
        pipeline_type: PipelineType,
        /// Pipeline handle
        pipeline: vk::Pipeline,
    },
    /// Bind the scene's global set at set 0
    BindGlobalSet {
        /// Layout of the bound pipeline
        layout: vk::PipelineLayout,
        /// Global descriptor set
        set: vk::DescriptorSet,
    },
    /// Bind vertex and index buffers
    BindGeometry {
        /// Vertex buffer
        vertex: vk::Buffer,
        /// Index buffer
        index: vk::Buffer,
    },
    /// Bind an object's set at set 1
    BindLocalSet {
        /// Layout of the bound pipeline
        layout: vk::PipelineLayout,
        /// Local descriptor set
        set: vk::DescriptorSet,
    },
    /// Indexed draw of one instance
    DrawIndexed {
        /// Indices drawn
        index_count: u32,
    },
}

/// Plan the draw pass for `items`, which must already be in draw order
///
/// `globals` are the scene's global sets with their flags; the set bound for
/// a pipeline is the one whose flags equal the pipeline's global requirement.
/// The first pipeline must find a match; for later ones a missing match
/// leaves set 0 as it was. Every item's local set must match its pipeline's
/// local requirement exactly.
pub fn plan_scene_commands<T: Drawable>(
    items: &[T],
    globals: &[(ShaderUsage, vk::DescriptorSet)],
    lookup: impl Fn(PipelineType) -> EngineResult<PipelineBinding>,
) -> EngineResult<Vec<RenderCommand>> {
    let mut commands = Vec::with_capacity(items.len() * 3 + 2);
    let mut bound: Option<PipelineBinding> = None;

    for item in items {
        let binding = match bound {
            Some(binding) if binding.pipeline_type == item.pipeline_type() => binding,
            _ => {
                let binding = lookup(item.pipeline_type())?;
                commands.push(RenderCommand::BindPipeline {
                    pipeline_type: binding.pipeline_type,
                    pipeline: binding.pipeline,
                });
                match globals.iter().find(|(usage, _)| *usage == binding.global_req) {
                    Some(&(_, set)) => commands.push(RenderCommand::BindGlobalSet {
                        layout: binding.layout,
                        set,
                    }),
                    // The first pass has no set 0 to fall back on
                    None if bound.is_none() => {
                        log::error!(
                            "[CAPS] global set: no set with {:?} for {:?}",
                            binding.global_req,
                            binding.pipeline_type
                        );
                        return Err(EngineError::CapabilityMismatch {
                            what: "global set",
                            expected: binding.global_req,
                            actual: ShaderUsage::empty(),
                        });
                    }
                    None => log::warn!(
                        "[RECORD] No global set with {:?} for {:?}",
                        binding.global_req,
                        binding.pipeline_type
                    ),
                }
                bound = Some(binding);
                binding
            }
        };

        ensure_capabilities("local set", binding.local_req, item.local_usage())?;
        commands.push(RenderCommand::BindGeometry {
            vertex: item.vertex_buffer(),
            index: item.index_buffer(),
        });
        commands.push(RenderCommand::BindLocalSet {
            layout: binding.layout,
            set: item.local_set(),
        });
        commands.push(RenderCommand::DrawIndexed {
            index_count: item.index_count(),
        });
    }

    Ok(commands)
}
