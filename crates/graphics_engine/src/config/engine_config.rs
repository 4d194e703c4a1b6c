use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Which present mode the swapchain asks for first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Triple-buffered, no tearing; falls back to FIFO when unsupported
    Mailbox,
    /// Always available vsync mode
    Fifo,
}

/// Capacity of the shared descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPoolConfig {
    /// Maximum number of descriptor sets alive at once
    pub max_sets: u32,
    /// Uniform buffer descriptors across all sets
    pub uniform_buffers: u32,
    /// Combined image sampler descriptors across all sets
    pub combined_image_samplers: u32,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            max_sets: 128,
            uniform_buffers: 128,
            combined_image_samplers: 127,
        }
    }
}

/// Engine-wide settings for the Vulkan renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Whether to enable Vulkan validation layers
    pub enable_validation: bool,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Directory holding compiled SPIR-V shaders
    pub shader_dir: String,
    /// Color attachment clear value (RGBA)
    pub clear_color: [f32; 4],
    /// Depth attachment clear value
    pub clear_depth: f32,
    /// Shared descriptor pool sizing
    pub descriptor_pool: DescriptorPoolConfig,
    /// Maximum sampler anisotropy for textures
    pub max_anisotropy: f32,
    /// Preferred present mode
    pub present_mode: PresentModePreference,
}

impl EngineConfig {
    /// Create a configuration with defaults for the given application
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    /// Set the shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<String>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the color clear value
    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    /// Set the descriptor pool capacity
    pub fn with_descriptor_pool(mut self, pool: DescriptorPoolConfig) -> Self {
        self.descriptor_pool = pool;
        self
    }

    /// Set the preferred present mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Set the default log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.descriptor_pool.max_sets == 0 {
            return Err(ConfigError::Invalid("descriptor pool needs at least one set".to_string()));
        }
        if !(0.0..=1.0).contains(&self.clear_depth) {
            return Err(ConfigError::Invalid(format!(
                "clear depth {} outside [0, 1]",
                self.clear_depth
            )));
        }
        if self.max_anisotropy < 1.0 {
            return Err(ConfigError::Invalid("max anisotropy must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            application_name: "Graphics Engine Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            log_level: "info".to_string(),
            shader_dir: "target/shaders".to_string(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            clear_depth: 1.0,
            descriptor_pool: DescriptorPoolConfig::default(),
            max_anisotropy: 16.0,
            present_mode: PresentModePreference::Mailbox,
        }
    }
}

impl Config for EngineConfig {}
