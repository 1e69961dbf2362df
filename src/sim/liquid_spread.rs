//! Liquid-spread pass: flattens liquid surfaces horizontally faster than the
//! Margolus CA alone manages, plus a small diagonal cascade into open gaps.
//! Grounded on the same CA simulator's `disperse()` stage (alternating-direction
//! horizontal dispersion), adapted to the spec's column-height/friction rule.
use super::Grid;
use crate::encoding::is_empty;
use crate::material::MATERIAL_TABLE;
use crate::rng::unit_float;
use crate::world::WorldCell;
use std::collections::HashSet;

pub struct LiquidSpreadParams {
    pub iteration: u32,
    pub seed: u32,
}

/// Deterministic send direction from a cell's x-coordinate parity.
fn parity_direction(x: i32) -> i32 {
    if x.rem_euclid(2) == 0 {
        1
    } else {
        -1
    }
}

/// Out-of-bounds support is treated as present (the world floor is implicitly solid).
fn has_support_below(world: &Grid<WorldCell>, x: i32, y: i32) -> bool {
    match world.get(x, y - 1) {
        Some(cell) => !is_empty(cell.material_id),
        None => true,
    }
}

/// Height of the contiguous column of the same liquid material directly above
/// `(x, y)`, capped to bound the walk on pathological inputs.
fn column_height(world: &Grid<WorldCell>, x: i32, y: i32, material_id: u8) -> u32 {
    const CAP: u32 = 64;
    let mut height = 0;
    let mut cursor = y;
    while height < CAP {
        match world.get(x, cursor) {
            Some(cell) if cell.material_id == material_id => {
                height += 1;
                cursor += 1;
            }
            _ => break,
        }
    }
    height
}

pub fn step(world: &Grid<WorldCell>, params: &LiquidSpreadParams) -> Grid<WorldCell> {
    let size = world.size() as i32;
    let mut out = world.clone();
    let mut moved_from = HashSet::new();
    let mut moved_to = HashSet::new();

    for y in 0..size {
        for x in 0..size {
            if moved_from.contains(&(x, y)) {
                continue;
            }
            let cell = world.get(x, y).unwrap();
            if crate::encoding::is_empty(cell.material_id) || !crate::encoding::is_liquid(cell.material_id) {
                continue;
            }
            if !has_support_below(world, x, y) {
                continue;
            }

            if try_horizontal_spread(world, x, y, cell, params, size, &mut moved_from, &mut moved_to, &mut out) {
                continue;
            }
            try_diagonal_cascade(world, x, y, cell, params, size, &mut moved_from, &mut moved_to, &mut out);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn try_horizontal_spread(
    world: &Grid<WorldCell>,
    x: i32,
    y: i32,
    cell: WorldCell,
    params: &LiquidSpreadParams,
    size: i32,
    moved_from: &mut HashSet<(i32, i32)>,
    moved_to: &mut HashSet<(i32, i32)>,
    out: &mut Grid<WorldCell>,
) -> bool {
    let direction = parity_direction(x);
    let nx = x + direction;
    if nx < 0 || nx >= size {
        return false;
    }
    if moved_to.contains(&(nx, y)) || moved_from.contains(&(nx, y)) {
        return false;
    }
    let neighbor = world.get(nx, y).unwrap();
    if !is_empty(neighbor.material_id) || !has_support_below(world, nx, y) {
        return false;
    }

    let height_here = column_height(world, x, y, cell.material_id);
    if height_here < 2 {
        return false;
    }

    let friction = MATERIAL_TABLE.friction(cell.material_id);
    let roll = unit_float(x, y, params.iteration, params.seed);
    if roll >= 1.0 - friction {
        return false;
    }

    out.set(nx, y, cell);
    out.set(x, y, WorldCell::EMPTY);
    moved_from.insert((x, y));
    moved_to.insert((nx, y));
    true
}

/// Drops liquid diagonally into an open gap when the cell immediately beside it
/// is occupied but the diagonal cell below-beside is open: the `[L,.,.,L]`-style
/// pocket the spec calls out, simplified to a single-step diagonal probe.
#[allow(clippy::too_many_arguments)]
fn try_diagonal_cascade(
    world: &Grid<WorldCell>,
    x: i32,
    y: i32,
    cell: WorldCell,
    params: &LiquidSpreadParams,
    size: i32,
    moved_from: &mut HashSet<(i32, i32)>,
    moved_to: &mut HashSet<(i32, i32)>,
    out: &mut Grid<WorldCell>,
) -> bool {
    let direction = parity_direction(x);
    let nx = x + direction;
    if nx < 0 || nx >= size || y == 0 {
        return false;
    }
    if moved_to.contains(&(nx, y - 1)) || moved_from.contains(&(nx, y - 1)) {
        return false;
    }
    let beside = world.get(nx, y).unwrap();
    let diagonal = world.get(nx, y - 1).unwrap();
    if is_empty(beside.material_id) || !is_empty(diagonal.material_id) {
        return false;
    }
    let roll = unit_float(x, y, params.iteration.wrapping_add(1), params.seed);
    if roll >= 1.0 - MATERIAL_TABLE.friction(cell.material_id) {
        return false;
    }

    out.set(nx, y - 1, cell);
    out.set(x, y, WorldCell::EMPTY);
    moved_from.insert((x, y));
    moved_to.insert((nx, y - 1));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{STONE_ID, WATER_ID};

    fn params(iteration: u32) -> LiquidSpreadParams {
        LiquidSpreadParams { iteration, seed: 9 }
    }

    fn floored_world(size: u32) -> Grid<WorldCell> {
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        for x in 0..size as i32 {
            grid.set(x, 0, WorldCell::new(STONE_ID));
        }
        grid
    }

    #[test]
    fn liquid_count_is_preserved_across_many_passes() {
        let mut grid = floored_world(16);
        for i in 0..5 {
            grid.set(2 + i, 3, WorldCell::new(WATER_ID));
        }
        let count_before = grid.as_slice().iter().filter(|c| c.material_id == WATER_ID).count();

        for i in 0..40 {
            grid = step(&grid, &params(i));
        }
        let count_after = grid.as_slice().iter().filter(|c| c.material_id == WATER_ID).count();
        assert_eq!(count_before, count_after);
    }

    #[test]
    fn liquid_never_moves_without_support_below_the_target() {
        // A single floating column of water with nothing underneath the destination
        // column must never spread sideways into thin air.
        let size = 8;
        let mut grid = Grid::new(size, WorldCell::EMPTY);
        grid.set(3, 5, WorldCell::new(WATER_ID));
        grid.set(3, 4, WorldCell::new(WATER_ID));
        grid.set(3, 3, WorldCell::new(WATER_ID));

        let result = step(&grid, &params(0));
        // None of the water should have teleported over the unsupported gap.
        for x in 0..size as i32 {
            if x != 3 {
                for y in 0..size as i32 {
                    assert!(result.get(x, y).unwrap().material_id != WATER_ID);
                }
            }
        }
    }

    #[test]
    fn a_tall_resting_column_spreads_onto_an_empty_supported_neighbor() {
        let size = 8;
        let mut grid = floored_world(size);
        grid.set(2, 1, WorldCell::new(WATER_ID));
        grid.set(2, 2, WorldCell::new(WATER_ID));
        grid.set(2, 3, WorldCell::new(WATER_ID));

        let mut spread_happened = false;
        let mut current = grid;
        for i in 0..10 {
            current = step(&current, &params(i));
            if current.get(3, 1).map(|c| c.material_id) == Some(WATER_ID) || current.get(1, 1).map(|c| c.material_id) == Some(WATER_ID) {
                spread_happened = true;
            }
        }
        assert!(spread_happened, "a resting height-3 column should eventually spread sideways");
    }
}
