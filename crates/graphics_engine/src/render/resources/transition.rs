//! Image layout transition rules
//!
//! Every supported transition maps to the access masks and pipeline stages of
//! a single image memory barrier. Anything missing from the table is a bug in
//! the caller, reported as [`EngineError::UnsupportedTransition`].

use ash::vk;

use crate::render::error::{EngineError, EngineResult};

/// Barrier parameters for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionBarrier {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage producing `src_access`
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming `dst_access`
    pub dst_stage: vk::PipelineStageFlags,
    /// Aspects of the image touched by the barrier
    pub aspect: vk::ImageAspectFlags,
}

impl TransitionBarrier {
    /// Build the native barrier for mip 0, layer 0 of `image`
    pub fn image_barrier(
        &self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> vk::ImageMemoryBarrier {
        vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .build()
    }
}

/// True when `format` carries a stencil component
pub fn has_stencil_component(format: vk::Format) -> bool {
    format == vk::Format::D32_SFLOAT_S8_UINT || format == vk::Format::D24_UNORM_S8_UINT
}

/// Look up the barrier for `old -> new` on an image of `format`
pub fn transition_barrier(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    format: vk::Format,
) -> EngineResult<TransitionBarrier> {
    use vk::AccessFlags as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags as S;

    let color = vk::ImageAspectFlags::COLOR;
    let barrier = match (old, new) {
        (L::PREINITIALIZED, L::TRANSFER_SRC_OPTIMAL) => TransitionBarrier {
            src_access: A::HOST_WRITE,
            dst_access: A::TRANSFER_READ,
            src_stage: S::HOST,
            dst_stage: S::TRANSFER,
            aspect: color,
        },
        (L::PREINITIALIZED, L::TRANSFER_DST_OPTIMAL) => TransitionBarrier {
            src_access: A::HOST_WRITE,
            dst_access: A::TRANSFER_WRITE,
            src_stage: S::HOST,
            dst_stage: S::TRANSFER,
            aspect: color,
        },
        (L::PREINITIALIZED, L::SHADER_READ_ONLY_OPTIMAL) => TransitionBarrier {
            src_access: A::HOST_WRITE,
            dst_access: A::SHADER_READ,
            src_stage: S::HOST,
            dst_stage: S::FRAGMENT_SHADER,
            aspect: color,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionBarrier {
            src_access: A::TRANSFER_WRITE,
            dst_access: A::SHADER_READ,
            src_stage: S::TRANSFER,
            dst_stage: S::FRAGMENT_SHADER,
            aspect: color,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            let mut aspect = vk::ImageAspectFlags::DEPTH;
            if has_stencil_component(format) {
                aspect |= vk::ImageAspectFlags::STENCIL;
            }
            TransitionBarrier {
                src_access: A::empty(),
                dst_access: A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
                src_stage: S::TOP_OF_PIPE,
                dst_stage: S::EARLY_FRAGMENT_TESTS,
                aspect,
            }
        }
        _ => return Err(EngineError::UnsupportedTransition { old, new }),
    };
    Ok(barrier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_source_transition() {
        let barrier = transition_barrier(
            vk::ImageLayout::PREINITIALIZED,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::Format::R8G8B8A8_UNORM,
        )
        .unwrap();
        assert_eq!(barrier.src_access, vk::AccessFlags::HOST_WRITE);
        assert_eq!(barrier.dst_access, vk::AccessFlags::TRANSFER_READ);
        assert_eq!(barrier.aspect, vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_shader_read_after_copy() {
        let barrier = transition_barrier(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::Format::R8G8B8A8_UNORM,
        )
        .unwrap();
        assert_eq!(barrier.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_access, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn test_depth_aspect_includes_stencil_only_when_present() {
        let undefined = vk::ImageLayout::UNDEFINED;
        let depth = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;

        let plain = transition_barrier(undefined, depth, vk::Format::D32_SFLOAT).unwrap();
        assert_eq!(plain.aspect, vk::ImageAspectFlags::DEPTH);

        let stencil = transition_barrier(undefined, depth, vk::Format::D24_UNORM_S8_UINT).unwrap();
        assert_eq!(
            stencil.aspect,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert!(stencil.src_access.is_empty());
    }

    #[test]
    fn test_unknown_transition_is_an_error() {
        let err = transition_barrier(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::Format::R8G8B8A8_UNORM,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTransition { .. }));
    }
}
