//! The emitter table: external sources/sinks of material, heat, cold and force.
//! Owned by the build-tool collaborator outside the pipeline driver and consumed
//! read-only each frame, the way the teacher's `HybridFluid::add_fluid_cube` takes
//! an externally authored placement and turns it into GPU-visible state.
use bytemuck::{Pod, Zeroable};

#[derive(Copy, Clone, Debug)]
pub enum EmitterKind {
    MaterialSource(u8),
    MaterialSink,
    HeatSource(f32),
    ColdSource(f32),
    ForceSource { dir_x: f32, dir_y: f32, magnitude: f32 },
}

#[derive(Copy, Clone, Debug)]
pub struct EmitterFlags {
    pub active: bool,
    pub growing: bool,
    pub shrinking: bool,
}

impl Default for EmitterFlags {
    fn default() -> Self {
        EmitterFlags {
            active: true,
            growing: false,
            shrinking: false,
        }
    }
}

/// Lifetime value meaning "never expires".
pub const PERMANENT: i32 = -1;

#[derive(Copy, Clone, Debug)]
pub struct Emitter {
    pub position: (i32, i32),
    pub radius: f32,
    pub lifetime: i32,
    pub kind: EmitterKind,
    pub rate: f32,
    pub flags: EmitterFlags,
}

impl Emitter {
    pub fn place(position: (i32, i32), radius: f32, kind: EmitterKind, rate: f32, lifetime: i32) -> Self {
        Emitter {
            position,
            radius,
            lifetime,
            kind,
            rate: rate.clamp(0.0, 1.0),
            flags: EmitterFlags::default(),
        }
    }

    fn is_expired(&self) -> bool {
        !self.flags.active || self.lifetime == 0 || self.radius <= 0.0
    }

    /// Encodes the emitter's kind and scalar parameters into a GPU-friendly payload:
    /// a discriminant and up to three f32 params, matching the two-texture upload
    /// (position texture + parameter texture) described for the emitter table.
    fn kind_payload(&self) -> (u32, [f32; 3]) {
        match self.kind {
            EmitterKind::MaterialSource(id) => (0, [id as f32, 0.0, 0.0]),
            EmitterKind::MaterialSink => (1, [0.0, 0.0, 0.0]),
            EmitterKind::HeatSource(intensity) => (2, [intensity, 0.0, 0.0]),
            EmitterKind::ColdSource(intensity) => (3, [intensity, 0.0, 0.0]),
            EmitterKind::ForceSource { dir_x, dir_y, magnitude } => (4, [dir_x, dir_y, magnitude]),
        }
    }
}

/// One row of the position texture uploaded each frame.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct EmitterPositionTexel {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub rate: f32,
}

/// One row of the parameter texture uploaded each frame.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct EmitterParamTexel {
    pub kind: u32,
    pub param0: f32,
    pub param1: f32,
    pub param2: f32,
}

/// Owns the live emitter list and produces the two small per-frame upload textures.
#[derive(Default)]
pub struct EmitterTable {
    emitters: Vec<Emitter>,
}

impl EmitterTable {
    pub fn new() -> Self {
        EmitterTable::default()
    }

    pub fn place(&mut self, emitter: Emitter) {
        self.emitters.push(emitter);
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Emitter> {
        self.emitters.iter()
    }

    /// Decrements lifetimes and drops expired entries. Called by the pipeline driver
    /// once per frame, before pass 1, per the emitter contract.
    pub fn update(&mut self) {
        for emitter in self.emitters.iter_mut() {
            if emitter.lifetime != PERMANENT && emitter.lifetime > 0 {
                emitter.lifetime -= 1;
            }
        }
        self.emitters.retain(|emitter| !emitter.is_expired());
    }

    /// Produces the two upload buffers consumed by the emitter-to-world and
    /// emitter-to-heat passes.
    pub fn upload_texels(&self) -> (Vec<EmitterPositionTexel>, Vec<EmitterParamTexel>) {
        let mut positions = Vec::with_capacity(self.emitters.len());
        let mut params = Vec::with_capacity(self.emitters.len());
        for emitter in &self.emitters {
            positions.push(EmitterPositionTexel {
                x: emitter.position.0 as f32,
                y: emitter.position.1 as f32,
                radius: emitter.radius,
                rate: emitter.rate,
            });
            let (kind, payload) = emitter.kind_payload();
            params.push(EmitterParamTexel {
                kind,
                param0: payload[0],
                param1: payload[1],
                param2: payload[2],
            });
        }
        (positions, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_decrements_and_removes_expired_emitters() {
        let mut table = EmitterTable::new();
        table.place(Emitter::place((0, 0), 2.0, EmitterKind::MaterialSink, 1.0, 1));
        table.place(Emitter::place((0, 0), 2.0, EmitterKind::MaterialSink, 1.0, PERMANENT));

        table.update();
        assert_eq!(table.len(), 2);
        table.update();
        // The first emitter's lifetime hit zero on the first update and should now be gone.
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn permanent_lifetime_never_decrements() {
        let mut table = EmitterTable::new();
        table.place(Emitter::place((0, 0), 2.0, EmitterKind::HeatSource(10.0), 1.0, PERMANENT));
        for _ in 0..1000 {
            table.update();
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn zero_radius_emitter_is_dropped() {
        let mut table = EmitterTable::new();
        table.place(Emitter::place((0, 0), 0.0, EmitterKind::MaterialSink, 1.0, PERMANENT));
        table.update();
        assert!(table.is_empty());
    }

    #[test]
    fn upload_texels_preserve_count_and_kind_discriminants() {
        let mut table = EmitterTable::new();
        table.place(Emitter::place((4, 5), 3.0, EmitterKind::MaterialSource(65), 0.5, PERMANENT));
        table.place(Emitter::place((1, 2), 1.0, EmitterKind::ForceSource { dir_x: 1.0, dir_y: 0.0, magnitude: 0.8 }, 1.0, 10));

        let (positions, params) = table.upload_texels();
        assert_eq!(positions.len(), 2);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].kind, 0);
        assert_eq!(params[0].param0, 65.0);
        assert_eq!(params[1].kind, 4);
        assert_eq!(params[1].param2, 0.8);
    }
}
