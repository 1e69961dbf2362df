//! Static material table: per-`material_id` physical parameters and phase-transition
//! targets. Mirrors the fixed id ranges from `encoding`, the way the matter tables in
//! CA-style sandboxes are laid out as flat per-id arrays rather than per-material structs
//! scattered across the codebase.
use crate::encoding::classify;

/// RGBA base color, 0-255 per channel.
#[derive(Copy, Clone, Debug)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

#[derive(Copy, Clone, Debug)]
pub struct Material {
    pub id: u8,
    pub name: &'static str,
    pub default_temperature: u16,
    pub density: f32,
    pub friction: f32,
    pub thermal_conductivity: f32,
    pub melting_point: u16,
    pub boiling_point: u16,
    pub condensation_point: Option<u16>,
    pub melt_target: Option<u8>,
    pub freeze_target: Option<u8>,
    pub boil_target: Option<u8>,
    pub condense_target: Option<u8>,
    pub color: Color,
}

pub const EMPTY_ID: u8 = 0;
pub const STONE_ID: u8 = 17;
pub const SAND_ID: u8 = 35;
pub const WATER_ID: u8 = 65;
pub const LAVA_ID: u8 = 66;
pub const ACID_ID: u8 = 67;
pub const STEAM_ID: u8 = 113;
pub const ICE_ID: u8 = 36;

/// Fixed, hand-authored table. Real content lives here rather than a loaded asset: the
/// ids, ranges and transition graph are part of the simulation's contract, not data the
/// frame config is allowed to vary.
pub struct MaterialTable {
    entries: [Option<Material>; 256],
}

impl MaterialTable {
    pub fn get(&self, id: u8) -> Option<&Material> {
        self.entries[id as usize].as_ref()
    }

    pub fn default_temperature(&self, id: u8) -> u16 {
        self.get(id).map(|m| m.default_temperature).unwrap_or(293)
    }

    pub fn friction(&self, id: u8) -> f32 {
        self.get(id).map(|m| m.friction).unwrap_or(0.0)
    }

    pub fn thermal_conductivity(&self, id: u8) -> f32 {
        self.get(id).map(|m| m.thermal_conductivity).unwrap_or(0.0)
    }

    pub fn density(&self, id: u8) -> f32 {
        self.get(id).map(|m| m.density).unwrap_or(0.0)
    }

    /// Applies the phase-transition precedence from the spec: boil > condense > melt > freeze.
    /// Returns `None` for EMPTY cells or when no threshold is crossed.
    pub fn phase_transition(&self, id: u8, temperature: u16) -> Option<u8> {
        if classify(id) == crate::encoding::MaterialClass::Empty {
            return None;
        }
        let material = self.get(id)?;

        if let Some(target) = material.boil_target {
            if temperature >= material.boiling_point {
                return Some(target);
            }
        }
        if let Some(target) = material.condense_target {
            if let Some(condensation_point) = material.condensation_point {
                if temperature < condensation_point {
                    return Some(target);
                }
            }
        }
        if let Some(target) = material.melt_target {
            if temperature >= material.melting_point {
                return Some(target);
            }
        }
        if let Some(target) = material.freeze_target {
            if temperature < material.melting_point {
                return Some(target);
            }
        }
        None
    }

    /// Validates the invariants from the data model: melting <= boiling, condensation <=
    /// boiling, and every transition target is either absent or a populated slot.
    pub fn validate(&self) -> Result<(), String> {
        for entry in self.entries.iter().flatten() {
            if entry.melting_point > entry.boiling_point {
                return Err(format!("{}: melting point above boiling point", entry.name));
            }
            if let Some(condensation_point) = entry.condensation_point {
                if condensation_point > entry.boiling_point {
                    return Err(format!("{}: condensation point above boiling point", entry.name));
                }
            }
            for target in [entry.melt_target, entry.freeze_target, entry.boil_target, entry.condense_target] {
                if let Some(target_id) = target {
                    if self.entries[target_id as usize].is_none() {
                        return Err(format!("{}: transition target {} is not a populated material", entry.name, target_id));
                    }
                }
            }
        }
        Ok(())
    }
}

fn build_table() -> MaterialTable {
    let mut entries: [Option<Material>; 256] = [None; 256];

    entries[STONE_ID as usize] = Some(Material {
        id: STONE_ID,
        name: "stone",
        default_temperature: 293,
        density: 2.7,
        friction: 1.0,
        thermal_conductivity: 0.1,
        melting_point: 1900,
        boiling_point: 3000,
        condensation_point: None,
        melt_target: Some(LAVA_ID),
        freeze_target: None,
        boil_target: None,
        condense_target: None,
        color: Color(120, 110, 100, 255),
    });

    entries[SAND_ID as usize] = Some(Material {
        id: SAND_ID,
        name: "sand",
        default_temperature: 293,
        density: 1.6,
        friction: 0.6,
        thermal_conductivity: 0.05,
        melting_point: 1986,
        boiling_point: 2503,
        condensation_point: None,
        melt_target: Some(LAVA_ID),
        freeze_target: None,
        boil_target: None,
        condense_target: None,
        color: Color(220, 200, 140, 255),
    });

    entries[ICE_ID as usize] = Some(Material {
        id: ICE_ID,
        name: "ice",
        default_temperature: 250,
        density: 0.92,
        friction: 0.1,
        thermal_conductivity: 0.3,
        melting_point: 273,
        boiling_point: 373,
        condensation_point: None,
        melt_target: Some(WATER_ID),
        freeze_target: None,
        boil_target: Some(STEAM_ID),
        condense_target: None,
        color: Color(200, 230, 255, 255),
    });

    entries[WATER_ID as usize] = Some(Material {
        id: WATER_ID,
        name: "water",
        default_temperature: 293,
        density: 1.0,
        friction: 0.02,
        thermal_conductivity: 0.4,
        melting_point: 273,
        boiling_point: 373,
        condensation_point: None,
        melt_target: None,
        freeze_target: Some(ICE_ID),
        boil_target: Some(STEAM_ID),
        condense_target: None,
        color: Color(60, 100, 220, 200),
    });

    entries[LAVA_ID as usize] = Some(Material {
        id: LAVA_ID,
        name: "lava",
        default_temperature: 1500,
        density: 3.1,
        friction: 0.3,
        thermal_conductivity: 0.2,
        melting_point: 1273,
        boiling_point: 3000,
        condensation_point: None,
        melt_target: None,
        freeze_target: Some(STONE_ID),
        boil_target: None,
        condense_target: None,
        color: Color(230, 80, 10, 255),
    });

    entries[ACID_ID as usize] = Some(Material {
        id: ACID_ID,
        name: "acid",
        default_temperature: 293,
        density: 1.2,
        friction: 0.01,
        thermal_conductivity: 0.35,
        melting_point: 250,
        boiling_point: 330,
        condensation_point: None,
        melt_target: None,
        freeze_target: None,
        boil_target: Some(STEAM_ID),
        condense_target: None,
        color: Color(140, 220, 40, 200),
    });

    entries[STEAM_ID as usize] = Some(Material {
        id: STEAM_ID,
        name: "steam",
        default_temperature: 400,
        density: 0.02,
        friction: 0.0,
        thermal_conductivity: 0.05,
        melting_point: 373,
        boiling_point: 5000,
        condensation_point: Some(373),
        melt_target: None,
        freeze_target: None,
        boil_target: None,
        condense_target: Some(WATER_ID),
        color: Color(220, 220, 230, 120),
    });

    MaterialTable { entries }
}

lazy_static::lazy_static! {
    pub static ref MATERIAL_TABLE: MaterialTable = build_table();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::MaterialClass;

    #[test]
    fn every_populated_id_falls_in_the_matching_class_range() {
        for (id, entry) in MATERIAL_TABLE.entries.iter().enumerate() {
            if entry.is_some() {
                let class = classify(id as u8);
                assert_ne!(class, MaterialClass::Empty);
            }
        }
    }

    #[test]
    fn table_validates_without_error() {
        MATERIAL_TABLE.validate().expect("material table should satisfy its own invariants");
    }

    #[test]
    fn boil_precedes_condense_precedes_melt_precedes_freeze() {
        // water: above boiling -> steam, even though below boiling is the default branch.
        assert_eq!(MATERIAL_TABLE.phase_transition(WATER_ID, 400), Some(STEAM_ID));
        // water: below freezing -> ice.
        assert_eq!(MATERIAL_TABLE.phase_transition(WATER_ID, 200), Some(ICE_ID));
        // steam: below condensation point -> water.
        assert_eq!(MATERIAL_TABLE.phase_transition(STEAM_ID, 200), Some(WATER_ID));
        // steam held above condensation and below its (absurdly high) boiling point: unchanged.
        assert_eq!(MATERIAL_TABLE.phase_transition(STEAM_ID, 400), None);
    }

    #[test]
    fn empty_cells_never_transition() {
        assert_eq!(MATERIAL_TABLE.phase_transition(EMPTY_ID, 10_000), None);
    }

    #[test]
    fn scenario_s6_water_and_steam_swap_under_precedence() {
        assert_eq!(MATERIAL_TABLE.phase_transition(WATER_ID, 500), Some(STEAM_ID));
        assert_eq!(MATERIAL_TABLE.phase_transition(STEAM_ID, 200), Some(WATER_ID));
    }
}
