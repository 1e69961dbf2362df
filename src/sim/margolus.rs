//! Margolus cellular automaton pass: gravity, falling, toppling, and (when the
//! Archimedes specialization is enabled) solid-sinks-through-liquid buoyancy.
//! Grounded on the staged move/disperse dispatch in the `other_examples`
//! falling-sand CA simulator, re-expressed over a 2x2 Margolus partition instead
//! of that simulator's row-by-row fall/rise/slide passes.
use super::Grid;
use crate::encoding::{classify, is_empty, is_static, MaterialClass};
use crate::material::MATERIAL_TABLE;
use crate::rng::unit_float;
use crate::world::WorldCell;

pub struct MargolusParams {
    pub iteration: u32,
    pub seed: u32,
    pub friction_amplifier: f32,
    /// Enables the buoyancy swap rule (solid directly above liquid sinks through
    /// it) in addition to the base transport rules.
    pub archimedes: bool,
}

/// Probability that a movable cell resting on another movable cell topples
/// diagonally, given the two materials' averaged friction and the global
/// amplifier. Exposed standalone so friction-amplifier monotonicity (spec
/// testable property #10) can be checked without rolling dice.
pub fn topple_probability(friction_avg: f32, friction_amplifier: f32) -> f32 {
    1.0 - (friction_avg * friction_amplifier).clamp(0.0, 1.0)
}

fn is_masked(mask: Option<&Grid<bool>>, x: i32, y: i32) -> bool {
    match mask {
        Some(mask) => mask.get(x, y).unwrap_or(true),
        None => false,
    }
}

/// A direct vertical swap: `top` falls into `bottom` when `bottom` is EMPTY, or
/// (with Archimedes enabled) when `top` is SOLID and `bottom` is LIQUID. Returns
/// `(new_bottom, new_top)` on success.
fn column_transport(top: WorldCell, bottom: WorldCell, archimedes: bool) -> Option<(WorldCell, WorldCell)> {
    if classify(top.material_id).is_movable() && is_empty(bottom.material_id) {
        return Some((top, bottom));
    }
    if archimedes && classify(top.material_id) == MaterialClass::Solid && classify(bottom.material_id) == MaterialClass::Liquid {
        return Some((top, bottom));
    }
    None
}

/// Runs one Margolus iteration over `world`, treating `rigid_mask` cells (when
/// given) as STATIC. Out-of-bounds and boundary-straddling blocks are left
/// untouched, satisfying the boundary-safety and no-duplication invariants by
/// construction: every branch either copies a cell through unchanged or swaps
/// two cells in place.
pub fn step(world: &Grid<WorldCell>, rigid_mask: Option<&Grid<bool>>, params: &MargolusParams) -> Grid<WorldCell> {
    let size = world.size() as i32;
    let mut out = world.clone();
    let (offset_x, offset_y) = super::margolus_offset(params.iteration);

    let mut by = offset_y as i32;
    while by + 1 < size {
        let mut bx = offset_x as i32;
        while bx + 1 < size {
            process_block(world, &mut out, rigid_mask, bx, by, params);
            bx += 2;
        }
        by += 2;
    }
    out
}

fn process_block(world: &Grid<WorldCell>, out: &mut Grid<WorldCell>, rigid_mask: Option<&Grid<bool>>, bx: i32, by: i32, params: &MargolusParams) {
    // bl/br are the "down" (smaller world-y) corners; tl/tr are "up".
    let bl = world.get(bx, by).unwrap();
    let br = world.get(bx + 1, by).unwrap();
    let tl = world.get(bx, by + 1).unwrap();
    let tr = world.get(bx + 1, by + 1).unwrap();

    if is_static(tl.material_id) || is_static(tr.material_id) || is_static(bl.material_id) || is_static(br.material_id) {
        return;
    }
    if is_masked(rigid_mask, bx, by) || is_masked(rigid_mask, bx + 1, by) || is_masked(rigid_mask, bx, by + 1) || is_masked(rigid_mask, bx + 1, by + 1) {
        return;
    }

    let left_fall = column_transport(tl, bl, params.archimedes);
    let right_fall = column_transport(tr, br, params.archimedes);
    if left_fall.is_some() || right_fall.is_some() {
        if let Some((new_bl, new_tl)) = left_fall {
            out.set(bx, by, new_bl);
            out.set(bx, by + 1, new_tl);
        }
        if let Some((new_br, new_tr)) = right_fall {
            out.set(bx + 1, by, new_br);
            out.set(bx + 1, by + 1, new_tr);
        }
        return;
    }

    // No straight fall was possible: both columns already failed `column_transport`,
    // which means neither bl nor br can simultaneously be EMPTY under a movable top
    // (otherwise that column would have fallen). Topple is safe to check unconditionally.
    if classify(tl.material_id).is_movable() && classify(bl.material_id).is_movable() && is_empty(br.material_id) {
        let friction_avg = (MATERIAL_TABLE.friction(tl.material_id) + MATERIAL_TABLE.friction(bl.material_id)) / 2.0;
        let probability = topple_probability(friction_avg, params.friction_amplifier);
        if unit_float(bx, by, params.iteration, params.seed) < probability {
            out.set(bx + 1, by, tl);
            out.set(bx, by + 1, WorldCell::EMPTY);
            return;
        }
    }
    if classify(tr.material_id).is_movable() && classify(br.material_id).is_movable() && is_empty(bl.material_id) {
        let friction_avg = (MATERIAL_TABLE.friction(tr.material_id) + MATERIAL_TABLE.friction(br.material_id)) / 2.0;
        let probability = topple_probability(friction_avg, params.friction_amplifier);
        if unit_float(bx + 1, by, params.iteration, params.seed) < probability {
            out.set(bx, by, tr);
            out.set(bx + 1, by + 1, WorldCell::EMPTY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{SAND_ID, STONE_ID, WATER_ID};
    use std::collections::HashMap;

    fn count_movables(grid: &Grid<WorldCell>) -> HashMap<u8, usize> {
        let mut counts = HashMap::new();
        for cell in grid.as_slice() {
            if classify(cell.material_id).is_movable() {
                *counts.entry(cell.material_id).or_insert(0) += 1;
            }
        }
        counts
    }

    fn params(iteration: u32) -> MargolusParams {
        MargolusParams {
            iteration,
            seed: 42,
            friction_amplifier: 1.0,
            archimedes: false,
        }
    }

    #[test]
    fn conservation_of_movables_over_many_passes() {
        let size = 16;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                if (x + y) % 3 == 0 {
                    grid.set(x, y, WorldCell::new(SAND_ID));
                }
            }
        }
        let before = count_movables(&grid);

        for i in 0..60 {
            grid = step(&grid, None, &params(i));
        }
        let after = count_movables(&grid);
        assert_eq!(before, after);
    }

    #[test]
    fn static_cells_are_never_rewritten() {
        let size = 8;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        for x in 0..size as i32 {
            grid.set(x, 0, WorldCell::new(STONE_ID));
        }
        grid.set(3, 5, WorldCell::new(SAND_ID));

        for i in 0..20 {
            grid = step(&grid, None, &params(i));
            for x in 0..size as i32 {
                assert_eq!(grid.get(x, 0).unwrap().material_id, STONE_ID);
            }
        }
    }

    #[test]
    fn a_border_straddling_block_is_left_untouched() {
        // Odd-sized world: the rightmost column never fits a full 2x2 block at
        // offset 0, so whatever sits there must survive every iteration unchanged.
        let size = 5;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        grid.set(4, 2, WorldCell::new(SAND_ID));
        let result = step(&grid, None, &params(0));
        assert_eq!(result.get(4, 2).unwrap().material_id, SAND_ID);
    }

    #[test]
    fn sand_falls_onto_stone_floor() {
        let size = 4;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        for x in 0..size as i32 {
            grid.set(x, 0, WorldCell::new(STONE_ID));
        }
        grid.set(1, 3, WorldCell::new(SAND_ID));

        for i in 0..10 {
            grid = step(&grid, None, &params(i));
        }
        assert_eq!(grid.get(1, 1).unwrap().material_id, SAND_ID);
    }

    #[test]
    fn archimedes_lets_solid_sink_through_liquid() {
        let size = 4;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        grid.set(1, 0, WorldCell::new(WATER_ID));
        grid.set(1, 1, WorldCell::new(SAND_ID));

        let archimedes_params = MargolusParams {
            iteration: 0,
            seed: 7,
            friction_amplifier: 1.0,
            archimedes: true,
        };
        let result = step(&grid, None, &archimedes_params);
        assert_eq!(result.get(1, 0).unwrap().material_id, SAND_ID);
        assert_eq!(result.get(1, 1).unwrap().material_id, WATER_ID);
    }

    #[test]
    fn topple_probability_is_non_increasing_in_friction_amplifier() {
        let friction_avg = 0.3;
        let mut previous = topple_probability(friction_avg, 0.0);
        for tenths in 1..=30 {
            let amplifier = tenths as f32 / 10.0;
            let probability = topple_probability(friction_avg, amplifier);
            assert!(probability <= previous + f32::EPSILON);
            previous = probability;
        }
    }

    #[test]
    fn rigid_mask_freezes_covered_blocks() {
        let size = 4;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        grid.set(1, 3, WorldCell::new(SAND_ID));
        let mut mask = Grid::new(size, false);
        mask.set(1, 3, true);
        mask.set(0, 3, true);
        mask.set(1, 2, true);
        mask.set(0, 2, true);

        let result = step(&grid, Some(&mask), &params(0));
        assert_eq!(result.get(1, 3).unwrap().material_id, SAND_ID);
    }
}
