pub mod binding_builder;
pub mod binding_glsl;
pub mod gpu_profiler;
pub mod pipelines;
pub mod shader;
pub mod uniformbuffer;

/// Number of workgroups/tiles needed to cover a 2D extent of `tile`-sized squares,
/// used when laying out fullscreen draw calls or dispatches over a texture whose
/// side isn't necessarily a multiple of `tile`.
pub fn tile_count_2d(width: u32, height: u32, tile: u32) -> (u32, u32) {
    ((width + tile - 1) / tile, (height + tile - 1) / tile)
}
