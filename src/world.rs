//! GPU texture storage for W and H plus the CPU mirror of W. Ping-pong is modeled
//! as an arena of render targets with an integer "current front" per pool, the way
//! the design notes replace shared-mutable-reference ping-pong with an explicit
//! pool and exchanged indices rather than cyclic ownership between passes.
use crate::material::MATERIAL_TABLE;

pub const WORLD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const HEAT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// H's neutral clear color: B=A=128/255 so absence of force is never read back as a
/// strong negative force. R=G=0 means 0 Kelvin, overwritten by the initial seed pass.
pub const HEAT_CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 128.0 / 255.0,
    a: 128.0 / 255.0,
};

/// Arena of same-sized, same-format render targets used round-robin as pass write
/// targets. `front` is the current source; a pass reads `front_view()` and writes
/// `view(next_free_index())`, then calls `advance` with that index.
pub struct TargetPool {
    label: &'static str,
    textures: Vec<wgpu::Texture>,
    views: Vec<wgpu::TextureView>,
    front: usize,
}

impl TargetPool {
    pub fn new(device: &wgpu::Device, size: u32, format: wgpu::TextureFormat, count: usize, label: &'static str) -> Self {
        assert!(count >= 2, "a ping-pong pool needs at least two targets");
        let textures: Vec<wgpu::Texture> = (0..count)
            .map(|_| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: size,
                        height: size,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsage::SAMPLED | wgpu::TextureUsage::RENDER_ATTACHMENT | wgpu::TextureUsage::COPY_SRC | wgpu::TextureUsage::COPY_DST,
                })
            })
            .collect();
        let views = textures.iter().map(|t| t.create_view(&wgpu::TextureViewDescriptor::default())).collect();

        TargetPool {
            label,
            textures,
            views,
            front: 0,
        }
    }

    pub fn front_index(&self) -> usize {
        self.front
    }

    pub fn front_texture(&self) -> &wgpu::Texture {
        &self.textures[self.front]
    }

    pub fn front_view(&self) -> &wgpu::TextureView {
        &self.views[self.front]
    }

    /// The next slot distinct from the current front; a pass writes here.
    pub fn next_free_index(&self) -> usize {
        (self.front + 1) % self.textures.len()
    }

    pub fn view(&self, index: usize) -> &wgpu::TextureView {
        &self.views[index]
    }

    pub fn texture(&self, index: usize) -> &wgpu::Texture {
        &self.textures[index]
    }

    /// Commits a pass's write target as the new front. Panics if given the same
    /// index as the current front: source and target must never be equal.
    pub fn advance(&mut self, new_front: usize) {
        assert_ne!(new_front, self.front, "{}: a pass must not read and write the same texture", self.label);
        self.front = new_front;
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorldCell {
    pub material_id: u8,
    pub velocity_x: u8,
    pub velocity_y: u8,
    pub aux: u8,
}

impl WorldCell {
    pub const EMPTY: WorldCell = WorldCell {
        material_id: 0,
        velocity_x: 128,
        velocity_y: 128,
        aux: 255,
    };

    /// Per the drawing contract: setting a cell always resets velocity to neutral
    /// and aux to its default, regardless of what was there before.
    pub fn new(material_id: u8) -> Self {
        WorldCell {
            material_id,
            velocity_x: 128,
            velocity_y: 128,
            aux: 255,
        }
    }

    pub fn is_empty(&self) -> bool {
        crate::encoding::is_empty(self.material_id)
    }
}

pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// CPU-side mirror of W, re-uploaded whenever it's been marked dirty. This is the
/// only host-writable view of the world: drawing tools and level loads go through
/// here, never through the GPU textures directly.
pub struct WorldMirror {
    size: u32,
    cells: Vec<WorldCell>,
    dirty: Option<DirtyRect>,
}

impl WorldMirror {
    pub fn new(size: u32) -> Self {
        WorldMirror {
            size,
            cells: vec![WorldCell::EMPTY; (size * size) as usize],
            dirty: None,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.size + x) as usize
    }

    pub fn get(&self, x: u32, y: u32) -> WorldCell {
        self.cells[self.index(x, y)]
    }

    pub fn set_cell(&mut self, x: u32, y: u32, material_id: u8) {
        let idx = self.index(x, y);
        self.cells[idx] = WorldCell::new(material_id);
        self.mark_dirty(x, y, x, y);
    }

    pub fn mark_dirty(&mut self, min_x: u32, min_y: u32, max_x: u32, max_y: u32) {
        self.dirty = Some(match self.dirty.take() {
            Some(rect) => DirtyRect {
                min_x: rect.min_x.min(min_x),
                min_y: rect.min_y.min(min_y),
                max_x: rect.max_x.max(max_x),
                max_y: rect.max_y.max(max_y),
            },
            None => DirtyRect { min_x, min_y, max_x, max_y },
        });
    }

    /// Takes the accumulated dirty rect, if any. The driver calls this before the
    /// first pass of a frame and re-uploads the affected region.
    pub fn take_dirty_rect(&mut self) -> Option<DirtyRect> {
        self.dirty.take()
    }

    /// Replaces the mirror's contents by interpreting an RGBA image directly as W
    /// cells (R=material_id, G/B=velocity, A=aux), per the loading contract.
    pub fn load_level_image(&mut self, image: &image::RgbaImage) -> Result<(), String> {
        if image.width() != self.size || image.height() != self.size {
            return Err(format!(
                "level image is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                self.size,
                self.size
            ));
        }
        for (x, y, pixel) in image.enumerate_pixels() {
            let idx = self.index(x, y);
            self.cells[idx] = WorldCell {
                material_id: pixel[0],
                velocity_x: pixel[1],
                velocity_y: pixel[2],
                aux: pixel[3],
            };
        }
        self.mark_dirty(0, 0, self.size - 1, self.size - 1);
        Ok(())
    }

    pub fn save_level_image(&self) -> image::RgbaImage {
        let mut image = image::RgbaImage::new(self.size, self.size);
        for y in 0..self.size {
            for x in 0..self.size {
                let cell = self.get(x, y);
                image.put_pixel(x, y, image::Rgba([cell.material_id, cell.velocity_x, cell.velocity_y, cell.aux]));
            }
        }
        image
    }

    /// Initial H seed: one 16-bit temperature per cell, drawn from each material's
    /// default temperature (EMPTY cells default to the table's fallback).
    pub fn seed_temperatures(&self) -> Vec<u16> {
        self.cells.iter().map(|cell| MATERIAL_TABLE.default_temperature(cell.material_id)).collect()
    }

    /// `seed_temperatures()` packed into H's RGBA byte layout (R,G = temperature,
    /// B,A = neutral force), ready for `queue.write_texture` into a fresh heat pool
    /// slot before the first frame runs.
    pub fn seed_heat_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.cells.len() * 4);
        for temperature in self.seed_temperatures() {
            let (low, high) = crate::encoding::encode_temperature(temperature);
            bytes.extend_from_slice(&[low, high, crate::encoding::SIGNED_MIDPOINT, crate::encoding::SIGNED_MIDPOINT]);
        }
        bytes
    }

    /// Overwrites the mirror from a row-padded RGBA buffer (e.g. a mapped GPU
    /// staging buffer, whose `bytes_per_row` may exceed `4 * size` due to copy
    /// alignment requirements). Does not mark anything dirty: this is a read-back,
    /// not an edit that needs re-uploading.
    pub fn overwrite_from_padded_rgba(&mut self, padded: &[u8], bytes_per_row: u32) {
        for y in 0..self.size {
            let row_start = (y * bytes_per_row) as usize;
            for x in 0..self.size {
                let pixel_start = row_start + (x * 4) as usize;
                let idx = self.index(x, y);
                self.cells[idx] = WorldCell {
                    material_id: padded[pixel_start],
                    velocity_x: padded[pixel_start + 1],
                    velocity_y: padded[pixel_start + 2],
                    aux: padded[pixel_start + 3],
                };
            }
        }
    }

    pub fn as_rgba_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.cells.len() * 4);
        for cell in &self.cells {
            bytes.extend_from_slice(&[cell.material_id, cell.velocity_x, cell.velocity_y, cell.aux]);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mirror_is_all_empty() {
        let mirror = WorldMirror::new(4);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(mirror.get(x, y), WorldCell::EMPTY);
            }
        }
    }

    #[test]
    fn set_cell_resets_velocity_and_aux() {
        let mut mirror = WorldMirror::new(4);
        mirror.set_cell(1, 1, 65);
        let cell = mirror.get(1, 1);
        assert_eq!(cell.material_id, 65);
        assert_eq!(cell.velocity_x, 128);
        assert_eq!(cell.velocity_y, 128);
        assert_eq!(cell.aux, 255);
    }

    #[test]
    fn set_cell_marks_a_one_pixel_dirty_rect() {
        let mut mirror = WorldMirror::new(8);
        mirror.set_cell(3, 5, 35);
        let rect = mirror.take_dirty_rect().unwrap();
        assert_eq!((rect.min_x, rect.min_y, rect.max_x, rect.max_y), (3, 5, 3, 5));
        assert!(mirror.take_dirty_rect().is_none());
    }

    #[test]
    fn dirty_rect_accumulates_across_multiple_edits() {
        let mut mirror = WorldMirror::new(8);
        mirror.set_cell(1, 1, 35);
        mirror.set_cell(6, 2, 35);
        let rect = mirror.take_dirty_rect().unwrap();
        assert_eq!((rect.min_x, rect.min_y, rect.max_x, rect.max_y), (1, 1, 6, 2));
    }

    #[test]
    fn level_image_round_trips_through_the_mirror() {
        let mut mirror = WorldMirror::new(4);
        mirror.set_cell(0, 0, 35);
        mirror.set_cell(2, 3, 65);
        let image = mirror.save_level_image();

        let mut reloaded = WorldMirror::new(4);
        reloaded.load_level_image(&image).unwrap();
        assert_eq!(reloaded.get(0, 0).material_id, 35);
        assert_eq!(reloaded.get(2, 3).material_id, 65);
    }

    #[test]
    fn overwrite_from_padded_rgba_handles_row_padding() {
        let mut mirror = WorldMirror::new(2);
        // bytes_per_row padded to 16, double the tight 8-byte-per-row minimum.
        let bytes_per_row = 16;
        let mut padded = vec![0u8; (bytes_per_row * 2) as usize];
        padded[0..4].copy_from_slice(&[35, 128, 128, 255]);
        padded[4..8].copy_from_slice(&[65, 1, 2, 3]);
        padded[bytes_per_row as usize..bytes_per_row as usize + 4].copy_from_slice(&[0, 128, 128, 255]);

        mirror.overwrite_from_padded_rgba(&padded, bytes_per_row);
        assert_eq!(mirror.get(0, 0).material_id, 35);
        assert_eq!(mirror.get(1, 0).material_id, 65);
        assert_eq!(mirror.get(0, 1).material_id, 0);
    }

    #[test]
    fn wrong_sized_level_image_is_rejected() {
        let mut mirror = WorldMirror::new(4);
        let wrong_size = image::RgbaImage::new(8, 8);
        assert!(mirror.load_level_image(&wrong_size).is_err());
    }
}
