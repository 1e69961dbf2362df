//! Headless falling-sand material simulation: a GPU fragment-shader pipeline over
//! two ping-ponged textures (W: material/velocity/aux, H: temperature/force)
//! stepped one frame at a time by `pipeline::PipelineDriver`. Grounded on the
//! teacher's `HybridFluid` solver structure, re-expressed over fullscreen render
//! passes instead of particle compute dispatches.
pub mod clock;
pub mod config;
pub mod emitter;
pub mod encoding;
pub mod material;
pub mod pipeline;
pub mod rigid_mask;
pub mod rng;
pub mod sim;
pub mod wgpu_utils;
pub mod world;
