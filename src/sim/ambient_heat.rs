//! Ambient heat pass: EMPTY cells absorb heat emitted by adjacent particles and
//! diffuse it among themselves; every cell, EMPTY or not, additionally relaxes
//! toward a global equilibrium temperature on a configurable interval, so an
//! isolated particle with no neighbors still cools (or warms) toward ambient.
//! Particle-to-particle exchange is `heat_diffusion`'s job; this pass's
//! diffusion/emission term only ever touches EMPTY cells.
use super::Grid;
use crate::config::AmbientHeatConfig;
use crate::encoding::is_empty;
use crate::world::WorldCell;

/// Spreads a neighbor's diffusion contribution over up to 4 directions.
const DIFFUSION_NEIGHBOR_WEIGHT: f32 = 0.25;

pub struct AmbientHeatParams<'a> {
    pub config: &'a AmbientHeatConfig,
    pub iteration: u32,
}

pub fn step(world: &Grid<WorldCell>, temperatures: &Grid<u16>, params: &AmbientHeatParams) -> Grid<u16> {
    let mut out = temperatures.clone();
    let pull_active_this_frame = params.config.equilibrium_strength > 0.0 && params.iteration % params.config.equilibrium_interval.max(1) == 0;

    for (x, y) in world.iter_coords() {
        let cell = world.get(x, y).unwrap();
        let self_temp = temperatures.get(x, y).unwrap() as f32;
        let mut delta = 0.0f32;

        if is_empty(cell.material_id) {
            for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                let neighbor = match world.get(nx, ny) {
                    Some(cell) => cell,
                    None => continue,
                };
                let neighbor_temp = temperatures.get(nx, ny).unwrap() as f32;
                if is_empty(neighbor.material_id) {
                    delta += params.config.diffusion_multiplier * DIFFUSION_NEIGHBOR_WEIGHT * (neighbor_temp - self_temp);
                } else {
                    delta += params.config.emission_multiplier * (neighbor_temp - self_temp);
                }
            }
        }

        if pull_active_this_frame {
            let pull = (params.config.equilibrium_temperature as f32 - self_temp) * params.config.equilibrium_strength;
            delta += pull.clamp(-params.config.equilibrium_max_delta, params.config.equilibrium_max_delta);
        }

        if delta != 0.0 {
            let new_temp = (self_temp + delta).round().clamp(0.0, u16::MAX as f32) as u16;
            out.set(x, y, new_temp);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::LAVA_ID;

    fn config() -> AmbientHeatConfig {
        AmbientHeatConfig::default()
    }

    #[test]
    fn particle_cells_are_never_rewritten_by_the_ambient_pass() {
        let mut world = Grid::new(4, WorldCell::EMPTY);
        world.set(1, 1, WorldCell::new(LAVA_ID));
        let mut temps = Grid::new(4, 293u16);
        temps.set(1, 1, 5000);
        let params = AmbientHeatParams { config: &config(), iteration: 0 };
        let result = step(&world, &temps, &params);
        assert_eq!(result.get(1, 1).unwrap(), 5000);
    }

    #[test]
    fn empty_cells_warm_up_next_to_a_hot_particle() {
        let mut world = Grid::new(4, WorldCell::EMPTY);
        world.set(1, 1, WorldCell::new(LAVA_ID));
        let mut temps = Grid::new(4, 293u16);
        temps.set(1, 1, 5000);
        let mut config = config();
        config.equilibrium_strength = 0.0;
        let params = AmbientHeatParams { config: &config, iteration: 0 };
        let result = step(&world, &temps, &params);
        assert!(result.get(2, 1).unwrap() > 293, "the cell beside lava should warm");
    }

    #[test]
    fn equilibrium_pull_only_fires_on_its_configured_interval() {
        let world = Grid::new(4, WorldCell::EMPTY);
        let mut temps = Grid::new(4, 0u16);
        temps.set(0, 0, 0);
        let mut config = config();
        config.equilibrium_strength = 0.5;
        config.equilibrium_temperature = 300;
        config.equilibrium_max_delta = 1000.0;
        config.equilibrium_interval = 4;

        let params_off = AmbientHeatParams { config: &config, iteration: 1 };
        let unaffected = step(&world, &temps, &params_off);
        assert_eq!(unaffected.get(1, 1).unwrap(), 0);

        let params_on = AmbientHeatParams { config: &config, iteration: 4 };
        let affected = step(&world, &temps, &params_on);
        assert!(affected.get(1, 1).unwrap() > 0, "iteration 4 is a multiple of the configured interval");
        let _ = temps.get(0, 0);
    }

    #[test]
    fn an_isolated_particle_cell_relaxes_toward_equilibrium() {
        let mut world = Grid::new(4, WorldCell::EMPTY);
        world.set(0, 0, WorldCell::new(LAVA_ID));
        let mut temps = Grid::new(4, 293u16);
        temps.set(0, 0, 5000);
        let mut config = config();
        config.equilibrium_strength = 0.1;
        config.equilibrium_temperature = 293;
        config.equilibrium_max_delta = 50.0;
        config.equilibrium_interval = 1;
        let params = AmbientHeatParams { config: &config, iteration: 0 };

        let mut temperature = 5000u16;
        for _ in 0..10 {
            let result = step(&world, &temps, &params);
            let next = result.get(0, 0).unwrap();
            assert!(next < temperature, "an isolated hot particle must cool every step");
            temperature = next;
            temps.set(0, 0, temperature);
        }
    }

    #[test]
    fn equilibrium_pull_is_clamped_per_step() {
        let world = Grid::new(4, WorldCell::EMPTY);
        let temps = Grid::new(4, 0u16);
        let mut config = config();
        config.equilibrium_strength = 1.0;
        config.equilibrium_temperature = 10000;
        config.equilibrium_max_delta = 3.0;
        config.equilibrium_interval = 1;
        let params = AmbientHeatParams { config: &config, iteration: 0 };
        let result = step(&world, &temps, &params);
        assert_eq!(result.get(0, 0).unwrap(), 3);
    }
}
