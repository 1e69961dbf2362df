use super::shader::ShaderDirectory;
use std::path::PathBuf;

/// Handle into a `PipelineManager`. Cheap to copy, stable across hot-reloads:
/// the pipeline object behind it is replaced in place, so code that stores a
/// handle never needs to re-fetch it after a reload.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct RenderPipelineHandle(usize);

pub struct RenderPipelineCreationDesc {
    pub label: &'static str,
    pub vertex_shader_relative_path: PathBuf,
    pub fragment_shader_relative_path: PathBuf,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub target_formats: Vec<wgpu::ColorTargetState>,
    pub primitive: wgpu::PrimitiveState,
}

impl RenderPipelineCreationDesc {
    fn load(&self, device: &wgpu::Device, shader_dir: &ShaderDirectory) -> Result<wgpu::RenderPipeline, ()> {
        let vertex_module = shader_dir.load_shader_module(device, &self.vertex_shader_relative_path)?;
        let fragment_module = shader_dir.load_shader_module(device, &self.fragment_shader_relative_path)?;

        Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: super::shader::SHADER_ENTRY_POINT_NAME,
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: super::shader::SHADER_ENTRY_POINT_NAME,
                targets: &self.target_formats,
            }),
            primitive: self.primitive,
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
        }))
    }
}

struct ManagedPipeline {
    desc: RenderPipelineCreationDesc,
    pipeline: wgpu::RenderPipeline,
}

/// Owns every fullscreen render pipeline used by the simulation passes and reloads
/// them when `ShaderDirectory` reports a change, the way `ShaderDirectory` itself
/// watches `shaders/` for edits. A pass that fails to recompile keeps running its
/// last good pipeline; the failure is logged once and the frame is not aborted.
pub struct PipelineManager {
    pipelines: Vec<ManagedPipeline>,
}

impl PipelineManager {
    pub fn new() -> Self {
        PipelineManager { pipelines: Vec::new() }
    }

    pub fn create_render_pipeline(
        &mut self,
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        desc: RenderPipelineCreationDesc,
    ) -> RenderPipelineHandle {
        let pipeline = desc
            .load(device, shader_dir)
            .unwrap_or_else(|()| panic!("initial shader compilation failed for pipeline {}", desc.label));
        let handle = RenderPipelineHandle(self.pipelines.len());
        self.pipelines.push(ManagedPipeline { desc, pipeline });
        handle
    }

    pub fn get_render(&self, handle: RenderPipelineHandle) -> &wgpu::RenderPipeline {
        &self.pipelines[handle.0].pipeline
    }

    /// Attempts to recompile every managed pipeline. Called after `ShaderDirectory::detected_change`
    /// returns true. Pipelines that fail to recompile are left untouched.
    pub fn reload_changed(&mut self, device: &wgpu::Device, shader_dir: &ShaderDirectory) {
        for managed in self.pipelines.iter_mut() {
            match managed.desc.load(device, shader_dir) {
                Ok(pipeline) => managed.pipeline = pipeline,
                Err(()) => log::error!("failed to reload pipeline {}, keeping previous version", managed.desc.label),
            }
        }
    }
}
