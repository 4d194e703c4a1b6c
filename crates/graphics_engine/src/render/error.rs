//! Renderer error taxonomy

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;
use crate::foundation::ObjectId;
use crate::render::capability::ShaderUsage;

/// Errors produced by the rendering core
#[derive(Error, Debug)]
pub enum EngineError {
    /// A native Vulkan call failed
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Descriptor flags differ from what the pipeline was built for
    #[error("Capability mismatch on {what}: pipeline expects {expected:?}, got {actual:?}")]
    CapabilityMismatch {
        /// Which binding slot disagreed ("global set", "local set")
        what: &'static str,
        /// Flags required by the pipeline
        expected: ShaderUsage,
        /// Flags carried by the descriptor set
        actual: ShaderUsage,
    },

    /// Object id is not present in the searched container
    #[error("Object {object_id} not found")]
    NotFound {
        /// Id that was looked up
        object_id: ObjectId,
    },

    /// Object is already owned by a scene
    #[error("Object {object_id} is already assigned to a scene")]
    AssignedElsewhere {
        /// Id that was moved
        object_id: ObjectId,
    },

    /// Scene id is unknown or was deregistered
    #[error("Scene not found")]
    SceneNotFound,

    /// Presentable surface is out of date and must be rebuilt
    #[error("Surface out of date")]
    SurfaceStale,

    /// No barrier rule exists for the requested layout change
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedTransition {
        /// Current image layout
        old: vk::ImageLayout,
        /// Requested image layout
        new: vk::ImageLayout,
    },

    /// Requested format has no handling rule or device support
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Operation attempted in the wrong state
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File system error (shader loading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vk::Result> for EngineError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for renderer operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// True for statuses a caller is expected to handle and continue
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::AssignedElsewhere { .. } | Self::SceneNotFound | Self::SurfaceStale
        )
    }
}

/// Verify a descriptor's flags exactly equal a pipeline's requirement
///
/// Partial binding is never allowed: a subset is as wrong as a disjoint set.
/// The mismatch is logged and returned so the current operation aborts.
pub fn ensure_capabilities(
    what: &'static str,
    expected: ShaderUsage,
    actual: ShaderUsage,
) -> EngineResult<()> {
    if expected == actual {
        return Ok(());
    }
    log::error!("[CAPS] {what}: pipeline expects {expected:?}, descriptor provides {actual:?}");
    Err(EngineError::CapabilityMismatch { what, expected, actual })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_flags_pass() {
        assert!(ensure_capabilities("local set", ShaderUsage::LOCAL_TEXTURED, ShaderUsage::LOCAL_TEXTURED).is_ok());
    }

    #[test]
    fn test_subset_and_superset_are_both_rejected() {
        let subset = ensure_capabilities("local set", ShaderUsage::LOCAL_BUMP_MAPPED, ShaderUsage::LOCAL_TEXTURED);
        let superset = ensure_capabilities("global set", ShaderUsage::GLOBAL_PV, ShaderUsage::GLOBAL_LIT);

        assert!(matches!(
            subset,
            Err(EngineError::CapabilityMismatch { what: "local set", expected, actual })
                if expected == ShaderUsage::LOCAL_BUMP_MAPPED && actual == ShaderUsage::LOCAL_TEXTURED
        ));
        assert!(matches!(superset, Err(EngineError::CapabilityMismatch { what: "global set", .. })));
    }

    #[test]
    fn test_lookup_statuses_are_recoverable() {
        assert!(EngineError::NotFound { object_id: 3 }.is_recoverable());
        assert!(EngineError::AssignedElsewhere { object_id: 3 }.is_recoverable());
        assert!(EngineError::SceneNotFound.is_recoverable());
        assert!(!EngineError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).is_recoverable());
        assert!(!EngineError::UnsupportedFormat("R8".to_string()).is_recoverable());
    }

    #[test]
    fn test_vk_result_converts() {
        let err: EngineError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, EngineError::Api(vk::Result::ERROR_DEVICE_LOST)));
    }
}
