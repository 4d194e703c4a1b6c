//! Registry of compiled pipelines indexed by draw style

use std::collections::HashMap;
use std::path::PathBuf;

use ash::{vk, Device};

use crate::render::error::{EngineError, EngineResult};
use crate::render::pipeline::{PipelineBinding, PipelineConfig, PipelineLayoutKind, PipelineType, SetLayoutKind};
use crate::render::vulkan::descriptor::DescriptorSetLayout;
use crate::render::vulkan::pipeline::{GraphicsPipeline, PipelineLayout, ShaderModule};

/// Every pipeline, its layout pair and requirement flags
///
/// Set layouts and pipeline layouts live as long as the registry. Pipelines
/// bake the viewport in and are rebuilt as a block when the surface changes.
pub struct PipelineRegistry {
    // Field order is drop order: pipelines before the layouts they use
    pipelines: Vec<(PipelineConfig, GraphicsPipeline)>,
    pipeline_layouts: Vec<PipelineLayout>,
    set_layouts: Vec<DescriptorSetLayout>,
    device: Device,
    shader_dir: PathBuf,
    extent: vk::Extent2D,
}

impl PipelineRegistry {
    /// Create all layouts and build every pipeline for `render_pass`
    pub fn new(
        device: &Device,
        shader_dir: impl Into<PathBuf>,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> EngineResult<Self> {
        let set_layouts = SetLayoutKind::ALL
            .iter()
            .map(|&kind| DescriptorSetLayout::new(device, kind))
            .collect::<EngineResult<Vec<_>>>()?;

        let pipeline_layouts = PipelineLayoutKind::ALL
            .iter()
            .map(|&kind| {
                PipelineLayout::new(
                    device,
                    set_layouts[kind.global().index()].handle(),
                    set_layouts[kind.local().index()].handle(),
                )
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let mut registry = Self {
            pipelines: Vec::new(),
            pipeline_layouts,
            set_layouts,
            device: device.clone(),
            shader_dir: shader_dir.into(),
            extent,
        };
        registry.build_pipelines(render_pass)?;
        Ok(registry)
    }

    /// Destroy every pipeline and build new ones for a new surface
    ///
    /// The device must be idle. On failure the registry is left empty and
    /// every lookup fails until the next successful rebuild.
    pub fn rebuild(&mut self, render_pass: vk::RenderPass, extent: vk::Extent2D) -> EngineResult<()> {
        self.pipelines.clear();
        self.extent = extent;
        self.build_pipelines(render_pass)
    }

    fn build_pipelines(&mut self, render_pass: vk::RenderPass) -> EngineResult<()> {
        let mut shaders: HashMap<&'static str, ShaderModule> = HashMap::new();
        let mut pipelines = Vec::with_capacity(PipelineType::ALL.len());

        for pipeline_type in PipelineType::ALL {
            let config = PipelineConfig::for_type(pipeline_type);
            for stage in [config.vertex_shader, config.fragment_shader] {
                if !shaders.contains_key(stage.file) {
                    let module = ShaderModule::from_file(&self.device, self.shader_dir.join(stage.file))?;
                    shaders.insert(stage.file, module);
                }
            }
            let (Some(vertex), Some(fragment)) = (
                shaders.get(config.vertex_shader.file),
                shaders.get(config.fragment_shader.file),
            ) else {
                return Err(EngineError::InitializationFailed(format!(
                    "shader modules missing for {pipeline_type:?}"
                )));
            };

            let layout = &self.pipeline_layouts[config.layout.index()];
            let pipeline = GraphicsPipeline::new(
                &self.device,
                &config,
                vertex,
                fragment,
                layout.handle(),
                render_pass,
                self.extent,
            )?;
            log::debug!("[PIPELINE] Built {pipeline_type:?} ({:?})", config.layout);
            pipelines.push((config, pipeline));
        }

        self.pipelines = pipelines;
        log::info!(
            "[PIPELINE] Registry built {} pipelines for {}x{}",
            self.pipelines.len(),
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    /// Native state and requirement flags of `pipeline_type`
    pub fn binding(&self, pipeline_type: PipelineType) -> EngineResult<PipelineBinding> {
        let (config, pipeline) = self
            .pipelines
            .get(pipeline_type.index())
            .ok_or_else(|| EngineError::InvalidOperation {
                reason: format!("pipeline {pipeline_type:?} is not built"),
            })?;
        let requirements = config.requirements();
        Ok(PipelineBinding {
            pipeline_type,
            pipeline: pipeline.handle(),
            layout: self.pipeline_layouts[config.layout.index()].handle(),
            global_req: requirements.global,
            local_req: requirements.local,
        })
    }

    /// Descriptor set layout of `kind`
    pub fn set_layout(&self, kind: SetLayoutKind) -> vk::DescriptorSetLayout {
        self.set_layouts[kind.index()].handle()
    }

    /// Extent the current pipelines were built for
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
