//! Per-frame simulation configuration, serde-deserializable from JSON so a headless
//! runner can load it the way the teacher's solver settings are loaded from disk.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    WorldSizeNotPowerOfTwo(u32),
    NegativePassCount { pass: &'static str, count: i32 },
    InvalidFrictionAmplifier(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WorldSizeNotPowerOfTwo(size) => write!(f, "world_size {} is not a positive power of two", size),
            ConfigError::NegativePassCount { pass, count } => write!(f, "pass_count for {} is negative ({})", pass, count),
            ConfigError::InvalidFrictionAmplifier(value) => write!(f, "friction_amplifier {} must be finite and non-negative", value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Enable flag plus iteration count for one pass kind. `pass_count == 0` disables
/// the pass outright without needing a separate boolean.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct StepConfig {
    pub enabled: bool,
    pub pass_count: u32,
}

impl StepConfig {
    pub fn disabled() -> Self {
        StepConfig {
            enabled: false,
            pass_count: 0,
        }
    }

    pub fn iterations(&self) -> u32 {
        if self.enabled {
            self.pass_count
        } else {
            0
        }
    }
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct StepsConfig {
    pub margolus_transport: StepConfig,
    pub liquid_spread: StepConfig,
    pub archimedes: StepConfig,
    pub particle_heat_diffusion: StepConfig,
    pub phase_transition: StepConfig,
    pub ambient_heat: StepConfig,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct AmbientHeatConfig {
    pub emission_multiplier: f32,
    pub diffusion_multiplier: f32,
    pub equilibrium_strength: f32,
    pub equilibrium_temperature: u16,
    pub equilibrium_max_delta: f32,
    pub equilibrium_interval: u32,
}

impl Default for AmbientHeatConfig {
    fn default() -> Self {
        AmbientHeatConfig {
            emission_multiplier: 0.1,
            diffusion_multiplier: 0.2,
            equilibrium_strength: 0.0,
            equilibrium_temperature: 293,
            equilibrium_max_delta: 5.0,
            equilibrium_interval: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub world_size: u32,
    pub steps: StepsConfig,
    pub friction_amplifier: f32,
    pub ambient_heat: AmbientHeatConfig,
    /// Fraction of H's force channels relaxed toward neutral (128) each frame, in [0, 1].
    pub force_bleed: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            world_size: 256,
            steps: StepsConfig {
                margolus_transport: StepConfig { enabled: true, pass_count: 4 },
                liquid_spread: StepConfig { enabled: true, pass_count: 2 },
                archimedes: StepConfig { enabled: true, pass_count: 1 },
                particle_heat_diffusion: StepConfig { enabled: true, pass_count: 1 },
                phase_transition: StepConfig { enabled: true, pass_count: 1 },
                ambient_heat: StepConfig { enabled: true, pass_count: 1 },
            },
            friction_amplifier: 1.0,
            ambient_heat: AmbientHeatConfig::default(),
            force_bleed: 0.05,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Rejects configs that could never reach the pipeline safely: inconsistent
    /// config errors are surfaced here at ingest time, never at pass time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_size == 0 || !self.world_size.is_power_of_two() {
            return Err(ConfigError::WorldSizeNotPowerOfTwo(self.world_size));
        }
        if !self.friction_amplifier.is_finite() || self.friction_amplifier < 0.0 {
            return Err(ConfigError::InvalidFrictionAmplifier(self.friction_amplifier));
        }
        for (name, step) in [
            ("margolus_transport", &self.steps.margolus_transport),
            ("liquid_spread", &self.steps.liquid_spread),
            ("archimedes", &self.steps.archimedes),
            ("particle_heat_diffusion", &self.steps.particle_heat_diffusion),
            ("phase_transition", &self.steps.phase_transition),
            ("ambient_heat", &self.steps.ambient_heat),
        ] {
            if (step.pass_count as i64) < 0 {
                return Err(ConfigError::NegativePassCount {
                    pass: name,
                    count: step.pass_count as i32,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn non_power_of_two_world_size_is_rejected() {
        let mut config = SimulationConfig::default();
        config.world_size = 300;
        assert!(matches!(config.validate(), Err(ConfigError::WorldSizeNotPowerOfTwo(300))));
    }

    #[test]
    fn negative_friction_amplifier_is_rejected() {
        let mut config = SimulationConfig::default();
        config.friction_amplifier = -0.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFrictionAmplifier(_))));
    }

    #[test]
    fn disabled_step_has_zero_iterations_regardless_of_pass_count() {
        let step = StepConfig { enabled: false, pass_count: 10 };
        assert_eq!(step.iterations(), 0);
    }

    #[test]
    fn round_trips_through_json() {
        let config = SimulationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = SimulationConfig::from_json(&json).unwrap();
        assert_eq!(parsed.world_size, config.world_size);
        assert_eq!(parsed.steps.margolus_transport.pass_count, config.steps.margolus_transport.pass_count);
    }
}
