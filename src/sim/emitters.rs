//! Emitter passes: material source/sink injection into W, heat/cold injection
//! and directional force injection into H, plus the always-on force bleed that
//! relaxes H's force channels toward neutral even with no emitters placed.
//! Grounded on the teacher's `HybridFluid::add_fluid_cube`, which is likewise a
//! radius-stamped injection into a GPU grid driven by host-authored placements.
use super::Grid;
use crate::emitter::{EmitterKind, EmitterTable};
use crate::encoding::{is_empty, is_static};
use crate::rng::unit_float;
use crate::world::WorldCell;

fn for_each_cell_in_radius(size: i32, position: (i32, i32), radius: f32, mut visit: impl FnMut(i32, i32, f32)) {
    if radius <= 0.0 {
        return;
    }
    let reach = radius.ceil() as i32;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let x = position.0 + dx;
            let y = position.1 + dy;
            if x < 0 || y < 0 || x >= size || y >= size {
                continue;
            }
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            if dist <= radius {
                visit(x, y, dist);
            }
        }
    }
}

pub struct EmitterToWorldParams {
    pub iteration: u32,
    pub seed: u32,
}

/// Material sources stamp their material into EMPTY cells within radius; sinks
/// erase non-STATIC material back to EMPTY. Both roll per-cell against `rate`.
pub fn apply_to_world(world: &Grid<WorldCell>, emitters: &EmitterTable, params: &EmitterToWorldParams) -> Grid<WorldCell> {
    let mut out = world.clone();
    let size = world.size() as i32;

    for emitter in emitters.iter() {
        match emitter.kind {
            EmitterKind::MaterialSource(material_id) => {
                for_each_cell_in_radius(size, emitter.position, emitter.radius, |x, y, _dist| {
                    let cell = out.get(x, y).unwrap();
                    if is_empty(cell.material_id) && unit_float(x, y, params.iteration, params.seed) < emitter.rate {
                        out.set(x, y, WorldCell::new(material_id));
                    }
                });
            }
            EmitterKind::MaterialSink => {
                for_each_cell_in_radius(size, emitter.position, emitter.radius, |x, y, _dist| {
                    let cell = out.get(x, y).unwrap();
                    if !is_empty(cell.material_id) && !is_static(cell.material_id) && unit_float(x, y, params.iteration, params.seed) < emitter.rate {
                        out.set(x, y, WorldCell::EMPTY);
                    }
                });
            }
            _ => {}
        }
    }
    out
}

/// Quadratic falloff from 1.0 at the emitter center to 0.0 at its edge.
fn radial_falloff(dist: f32, radius: f32) -> f32 {
    (1.0 - (dist / radius).powi(2)).max(0.0)
}

/// Heat/cold sources raise or lower H's temperature channel within radius.
pub fn apply_to_heat(temperatures: &Grid<u16>, emitters: &EmitterTable) -> Grid<u16> {
    let mut out = temperatures.clone();
    let size = temperatures.size() as i32;

    for emitter in emitters.iter() {
        let intensity = match emitter.kind {
            EmitterKind::HeatSource(value) => value,
            EmitterKind::ColdSource(value) => -value,
            _ => continue,
        };
        for_each_cell_in_radius(size, emitter.position, emitter.radius, |x, y, dist| {
            let falloff = radial_falloff(dist, emitter.radius);
            let current = out.get(x, y).unwrap() as f32;
            let new_temp = (current + intensity * falloff).round().clamp(0.0, u16::MAX as f32) as u16;
            out.set(x, y, new_temp);
        });
    }
    out
}

/// Force sources add a directional, magnitude-scaled push within radius.
pub fn apply_to_force(force: &Grid<(f32, f32)>, emitters: &EmitterTable) -> Grid<(f32, f32)> {
    let mut out = force.clone();
    let size = force.size() as i32;

    for emitter in emitters.iter() {
        if let EmitterKind::ForceSource { dir_x, dir_y, magnitude } = emitter.kind {
            for_each_cell_in_radius(size, emitter.position, emitter.radius, |x, y, dist| {
                let falloff = radial_falloff(dist, emitter.radius);
                let (fx, fy) = out.get(x, y).unwrap();
                out.set(x, y, (fx + dir_x * magnitude * falloff, fy + dir_y * magnitude * falloff));
            });
        }
    }
    out
}

/// Always-on relaxation toward zero force, independent of whether any emitter
/// is currently placed: H's force channels must never accumulate indefinitely.
pub fn bleed_force(force: &Grid<(f32, f32)>, bleed: f32) -> Grid<(f32, f32)> {
    let bleed = bleed.clamp(0.0, 1.0);
    let mut out = force.clone();
    for (x, y) in force.iter_coords() {
        let (fx, fy) = force.get(x, y).unwrap();
        out.set(x, y, (fx * (1.0 - bleed), fy * (1.0 - bleed)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Emitter;
    use crate::material::{SAND_ID, STONE_ID, WATER_ID};

    fn params() -> EmitterToWorldParams {
        EmitterToWorldParams { iteration: 0, seed: 1 }
    }

    #[test]
    fn material_source_fills_empty_cells_within_radius_at_full_rate() {
        let world = Grid::new(8, WorldCell::EMPTY);
        let mut table = EmitterTable::new();
        table.place(Emitter::place((4, 4), 1.5, EmitterKind::MaterialSource(SAND_ID), 1.0, crate::emitter::PERMANENT));

        let result = apply_to_world(&world, &table, &params());
        assert_eq!(result.get(4, 4).unwrap().material_id, SAND_ID);
        assert_eq!(result.get(5, 4).unwrap().material_id, SAND_ID);
        assert_eq!(result.get(4, 5).unwrap().material_id, SAND_ID);
        // out of the 1.5-radius disc
        assert_eq!(result.get(7, 7).unwrap().material_id, WorldCell::EMPTY.material_id);
    }

    #[test]
    fn material_sink_clears_movable_cells_but_spares_static_ones() {
        let mut world = Grid::new(8, WorldCell::EMPTY);
        world.set(4, 4, WorldCell::new(WATER_ID));
        world.set(4, 5, WorldCell::new(STONE_ID));
        let mut table = EmitterTable::new();
        table.place(Emitter::place((4, 4), 2.0, EmitterKind::MaterialSink, 1.0, crate::emitter::PERMANENT));

        let result = apply_to_world(&world, &table, &params());
        assert!(result.get(4, 4).unwrap().is_empty());
        assert_eq!(result.get(4, 5).unwrap().material_id, STONE_ID);
    }

    #[test]
    fn heat_source_warms_the_center_more_than_the_edge() {
        let temps = Grid::new(9, 293u16);
        let mut table = EmitterTable::new();
        table.place(Emitter::place((4, 4), 4.0, EmitterKind::HeatSource(100.0), 1.0, crate::emitter::PERMANENT));

        let result = apply_to_heat(&temps, &table);
        let center = result.get(4, 4).unwrap();
        let edge = result.get(4, 0).unwrap();
        assert!(center > edge);
        assert!(center > 293);
    }

    #[test]
    fn cold_source_lowers_temperature() {
        let temps = Grid::new(8, 1000u16);
        let mut table = EmitterTable::new();
        table.place(Emitter::place((4, 4), 3.0, EmitterKind::ColdSource(50.0), 1.0, crate::emitter::PERMANENT));
        let result = apply_to_heat(&temps, &table);
        assert!(result.get(4, 4).unwrap() < 1000);
    }

    #[test]
    fn force_bleed_decays_magnitude_toward_zero_with_no_emitters() {
        let mut force = Grid::new(4, (0.0f32, 0.0f32));
        force.set(1, 1, (10.0, -4.0));
        for _ in 0..50 {
            force = bleed_force(&force, 0.1);
        }
        let (fx, fy) = force.get(1, 1).unwrap();
        assert!(fx.abs() < 0.1);
        assert!(fy.abs() < 0.1);
    }

    #[test]
    fn force_source_pushes_in_its_configured_direction() {
        let force = Grid::new(8, (0.0f32, 0.0f32));
        let mut table = EmitterTable::new();
        table.place(Emitter::place(
            (4, 4),
            2.0,
            EmitterKind::ForceSource { dir_x: 1.0, dir_y: 0.0, magnitude: 5.0 },
            1.0,
            crate::emitter::PERMANENT,
        ));
        let result = apply_to_force(&force, &table);
        let (fx, fy) = result.get(4, 4).unwrap();
        assert!(fx > 0.0);
        assert_eq!(fy, 0.0);
    }
}
