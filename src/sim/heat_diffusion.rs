//! Particle-to-particle heat diffusion: adjacent non-EMPTY cells exchange heat
//! weighted by their materials' thermal conductivity. Grounded on the same
//! alternating-pass structure as `margolus`/`liquid_spread`, but walking the
//! temperature grid (H) rather than the material grid (W).
use super::Grid;
use crate::encoding::is_empty;
use crate::material::MATERIAL_TABLE;
use crate::world::WorldCell;

/// Scales the raw conductivity average down so a single pass never moves more
/// heat than the full temperature gap between two cells (no overshoot/oscillation).
const EXCHANGE_SCALE: f32 = 0.25;

fn exchange_coefficient(a: u8, b: u8) -> f32 {
    let conductivity_a = MATERIAL_TABLE.thermal_conductivity(a);
    let conductivity_b = MATERIAL_TABLE.thermal_conductivity(b);
    (conductivity_a + conductivity_b) / 2.0 * EXCHANGE_SCALE
}

/// Runs one diffusion pass. `world` supplies material ids (for conductivity
/// lookup and the EMPTY/non-EMPTY test); `temperatures` is H's per-cell value.
pub fn step(world: &Grid<WorldCell>, temperatures: &Grid<u16>) -> Grid<u16> {
    let mut out = temperatures.clone();
    for (x, y) in world.iter_coords() {
        let cell = world.get(x, y).unwrap();
        if is_empty(cell.material_id) {
            continue;
        }
        let self_temp = temperatures.get(x, y).unwrap() as f32;
        let mut delta = 0.0f32;
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            let neighbor = match world.get(nx, ny) {
                Some(cell) if !is_empty(cell.material_id) => cell,
                _ => continue,
            };
            let neighbor_temp = temperatures.get(nx, ny).unwrap() as f32;
            let coefficient = exchange_coefficient(cell.material_id, neighbor.material_id);
            delta += coefficient * (neighbor_temp - self_temp);
        }
        let new_temp = (self_temp + delta).round().clamp(0.0, u16::MAX as f32) as u16;
        out.set(x, y, new_temp);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{LAVA_ID, STONE_ID};

    #[test]
    fn empty_cells_never_change_temperature() {
        let world = Grid::new(4, WorldCell::EMPTY);
        let mut temps = Grid::new(4, 100u16);
        temps.set(2, 2, 9000);
        let result = step(&world, &temps);
        assert_eq!(result.get(2, 2).unwrap(), 9000);
    }

    #[test]
    fn heat_flows_from_hot_to_cold_without_overshoot() {
        let mut world = Grid::new(4, WorldCell::EMPTY);
        world.set(1, 1, WorldCell::new(LAVA_ID));
        world.set(2, 1, WorldCell::new(STONE_ID));
        let mut temps = Grid::new(4, 0u16);
        temps.set(1, 1, 2000);
        temps.set(2, 1, 300);

        let result = step(&world, &temps);
        let hot_after = result.get(1, 1).unwrap();
        let cold_after = result.get(2, 1).unwrap();

        assert!(hot_after < 2000, "the hot cell should lose heat");
        assert!(cold_after > 300, "the cold cell should gain heat");
        assert!(hot_after >= cold_after, "heat must not overshoot past equilibrium in one pass");
    }

    #[test]
    fn isolated_particles_reach_no_equilibrium_alone() {
        let mut world = Grid::new(4, WorldCell::EMPTY);
        world.set(0, 0, WorldCell::new(STONE_ID));
        let mut temps = Grid::new(4, 0u16);
        temps.set(0, 0, 500);
        let result = step(&world, &temps);
        assert_eq!(result.get(0, 0).unwrap(), 500);
    }
}
