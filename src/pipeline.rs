//! The pipeline driver: owns W/H's ping-pong pools, every fullscreen pass, and
//! runs one frame's worth of steps in the fixed order the config lays out.
//! Grounded on `HybridFluid::step`'s orchestration (build one encoder, wrap
//! each stage in a profiler scope, submit once), re-expressed over fullscreen
//! render passes instead of compute dispatches since every stage here is a
//! full-texture rewrite rather than a particle/grid compute kernel.
use crate::clock::FrameClock;
use crate::config::SimulationConfig;
use crate::emitter::EmitterTable;
use crate::profile_scope;
use crate::rigid_mask::RigidBodyMask;
use crate::wgpu_utils::binding_builder::{simple_sampler, BindGroupLayoutBuilder};
use crate::wgpu_utils::binding_glsl;
use crate::wgpu_utils::gpu_profiler::GpuProfiler;
use crate::wgpu_utils::pipelines::PipelineManager;
use crate::wgpu_utils::shader::ShaderDirectory;
use crate::wgpu_utils::uniformbuffer::UniformBuffer;
use crate::world::{TargetPool, WorldMirror, HEAT_CLEAR_COLOR, HEAT_FORMAT, WORLD_FORMAT};
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MargolusUniforms {
    iteration: u32,
    seed: u32,
    friction_amplifier: f32,
    archimedes: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SeedUniforms {
    iteration: u32,
    seed: u32,
    _pad0: u32,
    _pad1: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AmbientHeatUniforms {
    iteration: u32,
    equilibrium_interval: u32,
    emission_multiplier: f32,
    diffusion_multiplier: f32,
    equilibrium_strength: f32,
    equilibrium_temperature: f32,
    equilibrium_max_delta: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct EmitterUniforms {
    iteration: u32,
    seed: u32,
    emitter_count: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ForceBleedUniforms {
    bleed: f32,
    _pad: [f32; 3],
}

/// Capacity reserved for the emitter storage buffers; re-sized lazily if a session
/// ever places more emitters than this. Matches the teacher's pattern of sizing
/// particle buffers off a configured maximum rather than growing every frame.
const INITIAL_EMITTER_CAPACITY: usize = 64;

struct FullscreenStage {
    pass: crate::sim::FullscreenPass,
}

pub struct PipelineDriver {
    size: u32,
    world_pool: TargetPool,
    heat_pool: TargetPool,
    rigid_mask: RigidBodyMask,
    sampler: wgpu::Sampler,

    margolus: FullscreenStage,
    margolus_uniforms: UniformBuffer<MargolusUniforms>,
    liquid_spread: FullscreenStage,
    liquid_spread_uniforms: UniformBuffer<SeedUniforms>,
    heat_diffusion: FullscreenStage,
    ambient_heat: FullscreenStage,
    ambient_heat_uniforms: UniformBuffer<AmbientHeatUniforms>,
    phase_transition: FullscreenStage,
    emitter_to_world: FullscreenStage,
    emitter_to_world_uniforms: UniformBuffer<EmitterUniforms>,
    emitter_to_heat: FullscreenStage,
    emitter_to_heat_uniforms: UniformBuffer<EmitterUniforms>,
    emitter_to_force: FullscreenStage,
    emitter_to_force_uniforms: UniformBuffer<EmitterUniforms>,
    force_bleed: FullscreenStage,
    force_bleed_uniforms: UniformBuffer<ForceBleedUniforms>,

    emitter_position_buffer: wgpu::Buffer,
    emitter_param_buffer: wgpu::Buffer,
    emitter_capacity: usize,

    world_mirror: WorldMirror,
    emitters: EmitterTable,
    clock: FrameClock,
    profiler: GpuProfiler,
    iteration_counter: u32,
    frame_seed: u32,
}

impl PipelineDriver {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, shader_dir: &ShaderDirectory, pipeline_manager: &mut PipelineManager, config: &SimulationConfig) -> Self {
        let size = config.world_size;
        let world_pool = TargetPool::new(device, size, WORLD_FORMAT, 2, "world");
        let heat_pool = TargetPool::new(device, size, HEAT_FORMAT, 2, "heat");
        let rigid_mask = RigidBodyMask::new(device, size);
        let sampler = device.create_sampler(&simple_sampler(wgpu::AddressMode::ClampToEdge, wgpu::FilterMode::Nearest, "world sampler"));

        let margolus_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "margolus bind group layout");
        let margolus = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "margolus", margolus_layout, "margolus.frag", WORLD_FORMAT),
        };
        let margolus_uniforms = UniformBuffer::new(device);

        let liquid_spread_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "liquid spread bind group layout");
        let liquid_spread = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "liquid_spread", liquid_spread_layout, "liquid_spread.frag", WORLD_FORMAT),
        };
        let liquid_spread_uniforms = UniformBuffer::new(device);

        let heat_diffusion_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::texture2d())
            .create(device, "heat diffusion bind group layout");
        let heat_diffusion = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "heat_diffusion", heat_diffusion_layout, "heat_diffusion.frag", HEAT_FORMAT),
        };

        let ambient_heat_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "ambient heat bind group layout");
        let ambient_heat = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "ambient_heat", ambient_heat_layout, "ambient_heat.frag", HEAT_FORMAT),
        };
        let ambient_heat_uniforms = UniformBuffer::new(device);

        let phase_transition_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::texture2d())
            .create(device, "phase transition bind group layout");
        let phase_transition = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "phase_transition", phase_transition_layout, "phase_transition.frag", WORLD_FORMAT),
        };

        let emitter_position_buffer = Self::create_emitter_buffer(device, "emitter positions", INITIAL_EMITTER_CAPACITY, 16);
        let emitter_param_buffer = Self::create_emitter_buffer(device, "emitter params", INITIAL_EMITTER_CAPACITY, 16);

        let emitter_to_world_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "emitter to world bind group layout");
        let emitter_to_world = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "emitter_to_world", emitter_to_world_layout, "emitter_to_world.frag", WORLD_FORMAT),
        };
        let emitter_to_world_uniforms = UniformBuffer::new(device);

        let emitter_to_heat_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "emitter to heat bind group layout");
        let emitter_to_heat = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "emitter_to_heat", emitter_to_heat_layout, "emitter_to_heat.frag", HEAT_FORMAT),
        };
        let emitter_to_heat_uniforms = UniformBuffer::new(device);

        let emitter_to_force_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::buffer(true))
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "emitter to force bind group layout");
        let emitter_to_force = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "emitter_to_force", emitter_to_force_layout, "emitter_to_force.frag", HEAT_FORMAT),
        };
        let emitter_to_force_uniforms = UniformBuffer::new(device);

        let force_bleed_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_glsl::sampler(false))
            .next_binding_fragment(binding_glsl::texture2d())
            .next_binding_fragment(binding_glsl::uniform())
            .create(device, "force bleed bind group layout");
        let force_bleed = FullscreenStage {
            pass: crate::sim::FullscreenPass::new(device, shader_dir, pipeline_manager, "force_bleed", force_bleed_layout, "force_bleed.frag", HEAT_FORMAT),
        };
        let force_bleed_uniforms = UniformBuffer::new(device);

        // Neither pool's slot 0 is defined by its `create_texture` call alone: H needs
        // each cell's default temperature and neutral force, and W needs the mirror's
        // all-EMPTY state uploaded, before the first pass may read `front_view()`.
        let mut world_mirror = WorldMirror::new(size);
        let heat_seed_bytes = world_mirror.seed_heat_bytes();
        queue.write_texture(
            wgpu::TextureCopyView {
                texture: heat_pool.texture(heat_pool.front_index()),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &heat_seed_bytes,
            wgpu::TextureDataLayout {
                offset: 0,
                bytes_per_row: 4 * size,
                rows_per_image: size,
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
        world_mirror.mark_dirty(0, 0, size - 1, size - 1);

        PipelineDriver {
            size,
            world_pool,
            heat_pool,
            rigid_mask,
            sampler,
            margolus,
            margolus_uniforms,
            liquid_spread,
            liquid_spread_uniforms,
            heat_diffusion,
            ambient_heat,
            ambient_heat_uniforms,
            phase_transition,
            emitter_to_world,
            emitter_to_world_uniforms,
            emitter_to_heat,
            emitter_to_heat_uniforms,
            emitter_to_force,
            emitter_to_force_uniforms,
            force_bleed,
            force_bleed_uniforms,
            emitter_position_buffer,
            emitter_param_buffer,
            emitter_capacity: INITIAL_EMITTER_CAPACITY,
            world_mirror,
            emitters: EmitterTable::new(),
            clock: FrameClock::new(),
            profiler: GpuProfiler::new(4, queue.get_timestamp_period()),
            iteration_counter: 0,
            frame_seed: 0,
        }
    }

    fn create_emitter_buffer(device: &wgpu::Device, label: &str, capacity: usize, texel_size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64 * texel_size,
            usage: wgpu::BufferUsage::STORAGE | wgpu::BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn world_mirror(&self) -> &WorldMirror {
        &self.world_mirror
    }

    pub fn world_mirror_mut(&mut self) -> &mut WorldMirror {
        &mut self.world_mirror
    }

    pub fn emitters_mut(&mut self) -> &mut EmitterTable {
        &mut self.emitters
    }

    pub fn rigid_mask(&self) -> &RigidBodyMask {
        &self.rigid_mask
    }

    /// Runs one full frame: emitter bookkeeping, any pending mirror upload, every
    /// enabled step in config order, and a single W read-back at the end. Shader
    /// load failures for a given pass skip that pass for the frame rather than
    /// aborting it, per the pipeline's error-tolerance contract.
    pub fn step_frame(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        self.emitters.update();
        self.upload_dirty_mirror_region(queue);
        self.upload_emitters(device, queue);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });

        // Pass order follows the fixed pipeline: emitters first, then transport,
        // liquid-spread, buoyancy, particle heat, phase transitions, ambient heat.
        profile_scope!("frame", self.profiler, &mut encoder, device, {
            self.run_emitters(&mut encoder, device, queue, pipeline_manager, config);
            self.run_force_bleed(&mut encoder, device, queue, pipeline_manager, config);
            self.run_margolus(&mut encoder, device, queue, pipeline_manager, config, false);
            self.run_liquid_spread(&mut encoder, device, queue, pipeline_manager, config);
            self.run_margolus(&mut encoder, device, queue, pipeline_manager, config, true);
            self.run_heat_diffusion(&mut encoder, device, pipeline_manager, config);
            self.run_phase_transition(&mut encoder, device, pipeline_manager, config);
            self.run_ambient_heat(&mut encoder, device, queue, pipeline_manager, config);
        });

        self.profiler.resolve_queries(&mut encoder);
        queue.submit(Some(encoder.finish()));
        self.profiler.end_frame().ok();
        self.clock.on_frame_submitted();
    }

    /// Runs either the base transport step set or, with `archimedes` set, the
    /// buoyancy specialization that additionally lets solids sink through liquid.
    /// The two are configured and iterated independently (§3: transport N1 runs
    /// before liquid-spread, buoyancy N3 runs after).
    fn run_margolus(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, config: &SimulationConfig, archimedes: bool) {
        let step = if archimedes { &config.steps.archimedes } else { &config.steps.margolus_transport };
        for _ in 0..step.iterations() {
            self.margolus_uniforms.update_content(
                queue,
                MargolusUniforms {
                    iteration: self.iteration_counter,
                    seed: self.frame_seed,
                    friction_amplifier: config.friction_amplifier,
                    archimedes: archimedes as u32,
                },
            );
            let write_index = self.world_pool.next_free_index();
            {
                let bind_group = self
                    .margolus
                    .pass
                    .begin_bind_group()
                    .sampler(&self.sampler)
                    .texture(self.world_pool.front_view())
                    .texture(self.rigid_mask.view())
                    .buffer(self.margolus_uniforms.binding_resource())
                    .create(device, "margolus bind group");
                let mut rpass = begin_fullscreen_pass(encoder, self.world_pool.view(write_index), "margolus");
                self.margolus.pass.draw(&mut rpass, pipeline_manager, &bind_group);
            }
            self.world_pool.advance(write_index);
            self.iteration_counter += 1;
        }
    }

    fn run_liquid_spread(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        for _ in 0..config.steps.liquid_spread.iterations() {
            self.liquid_spread_uniforms.update_content(
                queue,
                SeedUniforms {
                    iteration: self.iteration_counter,
                    seed: self.frame_seed,
                    _pad0: 0,
                    _pad1: 0,
                },
            );
            let write_index = self.world_pool.next_free_index();
            {
                let bind_group = self
                    .liquid_spread
                    .pass
                    .begin_bind_group()
                    .sampler(&self.sampler)
                    .texture(self.world_pool.front_view())
                    .buffer(self.liquid_spread_uniforms.binding_resource())
                    .create(device, "liquid spread bind group");
                let mut rpass = begin_fullscreen_pass(encoder, self.world_pool.view(write_index), "liquid_spread");
                self.liquid_spread.pass.draw(&mut rpass, pipeline_manager, &bind_group);
            }
            self.world_pool.advance(write_index);
            self.iteration_counter += 1;
        }
    }

    fn run_heat_diffusion(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        for _ in 0..config.steps.particle_heat_diffusion.iterations() {
            let write_index = self.heat_pool.next_free_index();
            {
                let bind_group = self
                    .heat_diffusion
                    .pass
                    .begin_bind_group()
                    .sampler(&self.sampler)
                    .texture(self.world_pool.front_view())
                    .texture(self.heat_pool.front_view())
                    .create(device, "heat diffusion bind group");
                let mut rpass = begin_fullscreen_pass(encoder, self.heat_pool.view(write_index), "heat_diffusion");
                self.heat_diffusion.pass.draw(&mut rpass, pipeline_manager, &bind_group);
            }
            self.heat_pool.advance(write_index);
        }
    }

    fn run_ambient_heat(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        for _ in 0..config.steps.ambient_heat.iterations() {
            self.ambient_heat_uniforms.update_content(
                queue,
                AmbientHeatUniforms {
                    iteration: self.iteration_counter,
                    equilibrium_interval: config.ambient_heat.equilibrium_interval,
                    emission_multiplier: config.ambient_heat.emission_multiplier,
                    diffusion_multiplier: config.ambient_heat.diffusion_multiplier,
                    equilibrium_strength: config.ambient_heat.equilibrium_strength,
                    equilibrium_temperature: config.ambient_heat.equilibrium_temperature as f32,
                    equilibrium_max_delta: config.ambient_heat.equilibrium_max_delta,
                    _pad: 0.0,
                },
            );
            let write_index = self.heat_pool.next_free_index();
            {
                let bind_group = self
                    .ambient_heat
                    .pass
                    .begin_bind_group()
                    .sampler(&self.sampler)
                    .texture(self.world_pool.front_view())
                    .texture(self.heat_pool.front_view())
                    .buffer(self.ambient_heat_uniforms.binding_resource())
                    .create(device, "ambient heat bind group");
                let mut rpass = begin_fullscreen_pass(encoder, self.heat_pool.view(write_index), "ambient_heat");
                self.ambient_heat.pass.draw(&mut rpass, pipeline_manager, &bind_group);
            }
            self.heat_pool.advance(write_index);
            self.iteration_counter += 1;
        }
    }

    fn run_phase_transition(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        for _ in 0..config.steps.phase_transition.iterations() {
            let write_index = self.world_pool.next_free_index();
            {
                let bind_group = self
                    .phase_transition
                    .pass
                    .begin_bind_group()
                    .sampler(&self.sampler)
                    .texture(self.world_pool.front_view())
                    .texture(self.heat_pool.front_view())
                    .create(device, "phase transition bind group");
                let mut rpass = begin_fullscreen_pass(encoder, self.world_pool.view(write_index), "phase_transition");
                self.phase_transition.pass.draw(&mut rpass, pipeline_manager, &bind_group);
            }
            self.world_pool.advance(write_index);
        }
    }

    /// Emitter-to-world and emitter-to-heat always run once per frame, independent
    /// of the iteration counts configured for the other passes: emitters are a
    /// frame-rate injection, not an iterated relaxation.
    fn run_emitters(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, _config: &SimulationConfig) {
        if self.emitters.is_empty() {
            return;
        }
        let count = self.emitters.len() as u32;

        self.emitter_to_world_uniforms.update_content(
            queue,
            EmitterUniforms {
                iteration: self.iteration_counter,
                seed: self.frame_seed,
                emitter_count: count,
                _pad: 0,
            },
        );
        let write_index = self.world_pool.next_free_index();
        {
            let bind_group = self
                .emitter_to_world
                .pass
                .begin_bind_group()
                .sampler(&self.sampler)
                .texture(self.world_pool.front_view())
                .buffer(self.emitter_position_buffer.as_entire_binding())
                .buffer(self.emitter_param_buffer.as_entire_binding())
                .buffer(self.emitter_to_world_uniforms.binding_resource())
                .create(device, "emitter to world bind group");
            let mut rpass = begin_fullscreen_pass(encoder, self.world_pool.view(write_index), "emitter_to_world");
            self.emitter_to_world.pass.draw(&mut rpass, pipeline_manager, &bind_group);
        }
        self.world_pool.advance(write_index);

        self.emitter_to_heat_uniforms.update_content(
            queue,
            EmitterUniforms {
                iteration: self.iteration_counter,
                seed: self.frame_seed,
                emitter_count: count,
                _pad: 0,
            },
        );
        let write_index = self.heat_pool.next_free_index();
        {
            let bind_group = self
                .emitter_to_heat
                .pass
                .begin_bind_group()
                .sampler(&self.sampler)
                .texture(self.heat_pool.front_view())
                .buffer(self.emitter_position_buffer.as_entire_binding())
                .buffer(self.emitter_param_buffer.as_entire_binding())
                .buffer(self.emitter_to_heat_uniforms.binding_resource())
                .create(device, "emitter to heat bind group");
            let mut rpass = begin_fullscreen_pass(encoder, self.heat_pool.view(write_index), "emitter_to_heat");
            self.emitter_to_heat.pass.draw(&mut rpass, pipeline_manager, &bind_group);
        }
        self.heat_pool.advance(write_index);

        self.emitter_to_force_uniforms.update_content(
            queue,
            EmitterUniforms {
                iteration: self.iteration_counter,
                seed: self.frame_seed,
                emitter_count: count,
                _pad: 0,
            },
        );
        let write_index = self.heat_pool.next_free_index();
        {
            let bind_group = self
                .emitter_to_force
                .pass
                .begin_bind_group()
                .sampler(&self.sampler)
                .texture(self.heat_pool.front_view())
                .buffer(self.emitter_position_buffer.as_entire_binding())
                .buffer(self.emitter_param_buffer.as_entire_binding())
                .buffer(self.emitter_to_force_uniforms.binding_resource())
                .create(device, "emitter to force bind group");
            let mut rpass = begin_fullscreen_pass(encoder, self.heat_pool.view(write_index), "emitter_to_force");
            self.emitter_to_force.pass.draw(&mut rpass, pipeline_manager, &bind_group);
        }
        self.heat_pool.advance(write_index);
        self.iteration_counter += 1;
    }

    /// Relaxes H's force channels toward neutral every frame, emitters or not.
    fn run_force_bleed(&mut self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, queue: &wgpu::Queue, pipeline_manager: &PipelineManager, config: &SimulationConfig) {
        self.force_bleed_uniforms.update_content(queue, ForceBleedUniforms { bleed: config.force_bleed, _pad: [0.0; 3] });
        let write_index = self.heat_pool.next_free_index();
        {
            let bind_group = self
                .force_bleed
                .pass
                .begin_bind_group()
                .sampler(&self.sampler)
                .texture(self.heat_pool.front_view())
                .buffer(self.force_bleed_uniforms.binding_resource())
                .create(device, "force bleed bind group");
            let mut rpass = begin_fullscreen_pass(encoder, self.heat_pool.view(write_index), "force_bleed");
            self.force_bleed.pass.draw(&mut rpass, pipeline_manager, &bind_group);
        }
        self.heat_pool.advance(write_index);
    }

    fn upload_dirty_mirror_region(&mut self, queue: &wgpu::Queue) {
        if self.world_mirror.take_dirty_rect().is_some() {
            let bytes = self.world_mirror.as_rgba_bytes();
            queue.write_texture(
                wgpu::TextureCopyView {
                    texture: self.world_pool.texture(self.world_pool.front_index()),
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                &bytes,
                wgpu::TextureDataLayout {
                    offset: 0,
                    bytes_per_row: 4 * self.size,
                    rows_per_image: self.size,
                },
                wgpu::Extent3d {
                    width: self.size,
                    height: self.size,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    fn upload_emitters(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let (positions, params) = self.emitters.upload_texels();
        if positions.len() > self.emitter_capacity {
            self.emitter_capacity = positions.len().next_power_of_two();
            self.emitter_position_buffer = Self::create_emitter_buffer(device, "emitter positions", self.emitter_capacity, 16);
            self.emitter_param_buffer = Self::create_emitter_buffer(device, "emitter params", self.emitter_capacity, 16);
        }
        if !positions.is_empty() {
            queue.write_buffer(&self.emitter_position_buffer, 0, bytemuck::cast_slice(&positions));
            queue.write_buffer(&self.emitter_param_buffer, 0, bytemuck::cast_slice(&params));
        }
    }

    /// Blocking read-back of W into the mirror: the one CPU round-trip per frame
    /// the contract allows. Maps a staging copy rather than the live texture.
    pub fn read_back_world(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let bytes_per_row = align_to(4 * self.size, 256);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("world read-back staging"),
            size: (bytes_per_row * self.size) as u64,
            usage: wgpu::BufferUsage::COPY_DST | wgpu::BufferUsage::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("world read-back") });
        encoder.copy_texture_to_buffer(
            wgpu::TextureCopyView {
                texture: self.world_pool.front_texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::BufferCopyView {
                buffer: &staging,
                layout: wgpu::TextureDataLayout {
                    offset: 0,
                    bytes_per_row,
                    rows_per_image: self.size,
                },
            },
            wgpu::Extent3d {
                width: self.size,
                height: self.size,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let map_future = slice.map_async(wgpu::MapMode::Read);
        device.poll(wgpu::Maintain::Wait);
        if pollster::block_on(map_future).is_ok() {
            let data = slice.get_mapped_range();
            self.world_mirror.overwrite_from_padded_rgba(&data, bytes_per_row);
        }
        staging.unmap();
    }
}

fn begin_fullscreen_pass<'a>(encoder: &'a mut wgpu::CommandEncoder, target: &'a wgpu::TextureView, label: &'static str) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(HEAT_CLEAR_COLOR),
                store: true,
            },
        }],
        depth_stencil_attachment: None,
    })
}

fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}
