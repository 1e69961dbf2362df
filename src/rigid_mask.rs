//! Rigid-body mask: a single-channel texture the size of W marking cells currently
//! occupied by an external rigid-body engine. Always structurally present, default
//! all-zero/unmasked, so Margolus/liquid-spread/Archimedes passes can bind it
//! unconditionally rather than branching on an `Option`. Grounded on the teacher's
//! `volume_debug`, which is the one resource in `HybridFluid` that's optional in
//! purpose but still always bound the same way once allocated.
pub struct RigidBodyMask {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: u32,
}

impl RigidBodyMask {
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rigid body mask"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsage::SAMPLED | wgpu::TextureUsage::COPY_DST,
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        RigidBodyMask { texture, view, size }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Uploads a full-texture mask; non-zero pixels are treated as STATIC by transport
    /// passes for that frame. Called by the rigid-body collaborator, never by the
    /// pipeline driver itself.
    pub fn upload(&self, queue: &wgpu::Queue, mask: &[u8]) {
        assert_eq!(mask.len(), (self.size * self.size) as usize, "mask buffer must cover the whole world");
        queue.write_texture(
            wgpu::TextureCopyView {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            mask,
            wgpu::TextureDataLayout {
                offset: 0,
                bytes_per_row: self.size,
                rows_per_image: self.size,
            },
            wgpu::Extent3d {
                width: self.size,
                height: self.size,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Restores the default all-zero/unmasked state, e.g. when the rigid-body
    /// subsystem is disabled or torn down mid-session.
    pub fn clear(&self, queue: &wgpu::Queue) {
        self.upload(queue, &vec![0u8; (self.size * self.size) as usize]);
    }
}
