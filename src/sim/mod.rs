//! Simulation passes: Margolus transport, liquid-spread, Archimedes buoyancy,
//! particle and ambient heat, phase transitions, and emitter injection. Each
//! module pairs a GPU fragment-shader pass (grounded on the teacher's
//! fullscreen-triangle render passes) with a pure CPU reference function of the
//! same rule set, since the GPU passes themselves can't be exercised without a
//! device.
pub mod ambient_heat;
pub mod emitters;
pub mod heat_diffusion;
pub mod liquid_spread;
pub mod margolus;
pub mod phase_transition;

use crate::wgpu_utils::binding_builder::{BindGroupLayoutWithDesc, BindGroupBuilder};
use crate::wgpu_utils::pipelines::{PipelineManager, RenderPipelineCreationDesc, RenderPipelineHandle};
use crate::wgpu_utils::shader::ShaderDirectory;
use std::path::PathBuf;

/// A single fragment-shader pass drawn as a fullscreen triangle (`draw(0..3, 0..1)`),
/// the idiom the teacher uses for every screen-space render pass (cubemap render,
/// background, final composite). Every simulation pass in this crate is shaped this
/// way: no vertex buffers, one invocation per target pixel.
pub struct FullscreenPass {
    pub bind_group_layout: BindGroupLayoutWithDesc,
    pub pipeline: RenderPipelineHandle,
}

impl FullscreenPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        label: &'static str,
        bind_group_layout: BindGroupLayoutWithDesc,
        fragment_shader: &str,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout.layout],
            push_constant_ranges: &[],
        });

        let desc = RenderPipelineCreationDesc {
            label,
            vertex_shader_relative_path: PathBuf::from("screentri.vert"),
            fragment_shader_relative_path: PathBuf::from(fragment_shader),
            pipeline_layout,
            target_formats: vec![wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrite::ALL,
            }],
            primitive: wgpu::PrimitiveState::default(),
        };

        FullscreenPass {
            pipeline: pipeline_manager.create_render_pipeline(device, shader_dir, desc),
            bind_group_layout,
        }
    }

    pub fn begin_bind_group<'a>(&'a self) -> BindGroupBuilder<'a> {
        BindGroupBuilder::new(&self.bind_group_layout)
    }

    /// Records the draw call into an already-open render pass targeting the next
    /// pool slot; the caller owns the render-pass-begin/end and bind-group lifetime.
    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, pipeline_manager: &'a PipelineManager, bind_group: &'a wgpu::BindGroup) {
        rpass.set_pipeline(pipeline_manager.get_render(self.pipeline));
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

/// Cycles the Margolus block-origin offset by iteration index, per §4.2: iteration
/// `i` uses offset `(i mod 2, (i / 2) mod 2)`, cycling through all four 2x2 phases.
pub fn margolus_offset(iteration: u32) -> (u32, u32) {
    (iteration % 2, (iteration / 2) % 2)
}

/// Plain 2D grid used by the CPU reference implementations of each pass. The GPU
/// passes operate on textures; this is the host-testable stand-in for a single
/// fragment-shader invocation's read/write view of one of them.
#[derive(Clone)]
pub struct Grid<T> {
    size: u32,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn new(size: u32, fill: T) -> Self {
        Grid {
            size,
            cells: vec![fill; (size * size) as usize],
        }
    }

    pub fn from_cells(size: u32, cells: Vec<T>) -> Self {
        assert_eq!(cells.len(), (size * size) as usize);
        Grid { size, cells }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.size || y as u32 >= self.size {
            None
        } else {
            Some((y as u32 * self.size + x as u32) as usize)
        }
    }

    /// Out-of-bounds reads return `None`; callers treat that as STATIC per the
    /// edge-case rule ("out-of-bounds samples are treated as STATIC").
    pub fn get(&self, x: i32, y: i32) -> Option<T> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = value;
        }
    }

    pub fn iter_coords(&self) -> impl Iterator<Item = (i32, i32)> {
        let size = self.size as i32;
        (0..size).flat_map(move |y| (0..size).map(move |x| (x, y)))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margolus_offset_cycles_through_four_phases() {
        let offsets: Vec<_> = (0..4).map(margolus_offset).collect();
        assert_eq!(offsets, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        // iteration 4 repeats iteration 0's phase.
        assert_eq!(margolus_offset(4), margolus_offset(0));
    }
}
