//! Phase-transition pass: rewrites a cell's material when its temperature
//! crosses a threshold, in boil > condense > melt > freeze precedence. The
//! threshold table and precedence logic live in `material::MaterialTable`;
//! this module is the per-cell pass that drives it over a whole grid and
//! resets the cell's velocity/aux the way any material rewrite does.
use super::Grid;
use crate::encoding::is_empty;
use crate::material::MATERIAL_TABLE;
use crate::world::WorldCell;

pub fn step(world: &Grid<WorldCell>, temperatures: &Grid<u16>) -> Grid<WorldCell> {
    let mut out = world.clone();
    for (x, y) in world.iter_coords() {
        let cell = world.get(x, y).unwrap();
        if is_empty(cell.material_id) {
            continue;
        }
        let temperature = temperatures.get(x, y).unwrap();
        if let Some(new_material) = MATERIAL_TABLE.phase_transition(cell.material_id, temperature) {
            out.set(x, y, WorldCell::new(new_material));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ICE_ID, STEAM_ID, WATER_ID};

    #[test]
    fn water_freezes_below_its_freeze_point_and_boils_above_its_boil_point() {
        let mut world = Grid::new(2, WorldCell::EMPTY);
        world.set(0, 0, WorldCell::new(WATER_ID));
        world.set(1, 0, WorldCell::new(WATER_ID));
        let mut temps = Grid::new(2, 0u16);
        temps.set(0, 0, 0);
        temps.set(1, 0, 5000);

        let result = step(&world, &temps);
        assert_eq!(result.get(0, 0).unwrap().material_id, ICE_ID);
        assert_eq!(result.get(1, 0).unwrap().material_id, STEAM_ID);
    }

    #[test]
    fn a_transitioned_cell_has_neutral_velocity_and_aux() {
        let mut world = Grid::new(2, WorldCell::EMPTY);
        world.set(0, 0, WorldCell::new(WATER_ID));
        let mut temps = Grid::new(2, 0u16);
        temps.set(0, 0, 5000);

        let result = step(&world, &temps);
        let cell = result.get(0, 0).unwrap();
        assert_eq!(cell.material_id, STEAM_ID);
        assert_eq!(cell, WorldCell::new(STEAM_ID));
    }

    #[test]
    fn empty_cells_are_never_transitioned() {
        let world = Grid::new(2, WorldCell::EMPTY);
        let mut temps = Grid::new(2, 0u16);
        temps.set(0, 0, 99999u16.min(u16::MAX as u32) as u16);
        let result = step(&world, &temps);
        assert!(result.get(0, 0).unwrap().is_empty());
    }

    #[test]
    fn materials_with_no_configured_transition_are_left_alone() {
        use crate::material::STONE_ID;
        let mut world = Grid::new(2, WorldCell::EMPTY);
        world.set(0, 0, WorldCell::new(STONE_ID));
        let mut temps = Grid::new(2, 0u16);
        temps.set(0, 0, 1);
        let result = step(&world, &temps);
        assert_eq!(result.get(0, 0).unwrap().material_id, STONE_ID);
    }
}
