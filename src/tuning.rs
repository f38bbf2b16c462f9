//! Rule constants for the indicator model, grouped by concern.
//!
//! Every section deserializes with per-field defaults so a scenario file only
//! needs to mention the values it changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::{IndicatorSet, MAX_INDICATOR_VALUE, MIN_INDICATOR_VALUE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub initial: IndicatorSet,
    pub bounds: Bounds,
    pub population: PopulationPressure,
    pub infrastructure: Infrastructure,
    pub buildings: BuildingEffects,
    pub reforestation: Reforestation,
    pub inertia: Inertia,
    pub critical: CriticalLows,
    pub progression: Progression,
    pub grid: Grid,
}

/// Deltas applied to the four capped indicators together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityBundle {
    pub air_quality: f64,
    pub water_quality: f64,
    pub community_happiness: f64,
    pub biodiversity: f64,
}

impl QualityBundle {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            air_quality: self.air_quality * factor,
            water_quality: self.water_quality * factor,
            community_happiness: self.community_happiness * factor,
            biodiversity: self.biodiversity * factor,
        }
    }

    pub fn apply_to(&self, indicators: &mut IndicatorSet) {
        indicators.air_quality += self.air_quality;
        indicators.water_quality += self.water_quality;
        indicators.community_happiness += self.community_happiness;
        indicators.biodiversity += self.biodiversity;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub energy_limit: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: MIN_INDICATOR_VALUE,
            max: MAX_INDICATOR_VALUE,
            energy_limit: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationPressure {
    pub per_house: u32,
    pub air_per_person: f64,
    pub water_per_person: f64,
    pub biodiversity_per_person: f64,
    pub food_per_person: f64,
    pub happiness_drag_threshold: u32,
    pub happiness_drag_per_person: f64,
}

impl Default for PopulationPressure {
    fn default() -> Self {
        Self {
            per_house: 4,
            air_per_person: -0.4,
            water_per_person: -0.4,
            biodiversity_per_person: -0.35,
            food_per_person: -0.45,
            happiness_drag_threshold: 15,
            happiness_drag_per_person: -0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Infrastructure {
    pub houses_per_school: u32,
    pub houses_per_health_post: u32,
    pub houses_per_water_treatment: u32,
    pub houses_per_waste_collection: u32,
    /// Happiness lost per missing school or health post. Water treatment
    /// deficits cost half of this on top of their water penalty.
    pub happiness_penalty_per_unit: f64,
    pub water_treatment_water_penalty_per_unit: f64,
    pub waste_collection_penalty_per_unit: QualityBundle,
}

impl Default for Infrastructure {
    fn default() -> Self {
        Self {
            houses_per_school: 10,
            houses_per_health_post: 10,
            houses_per_water_treatment: 20,
            houses_per_waste_collection: 15,
            happiness_penalty_per_unit: -8.0,
            water_treatment_water_penalty_per_unit: -10.0,
            waste_collection_penalty_per_unit: QualityBundle {
                air_quality: -7.0,
                water_quality: -7.0,
                community_happiness: -5.0,
                biodiversity: -4.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingEffects {
    /// Largest positive contribution the summed building effects may make to
    /// each capped indicator. Negative totals are never capped.
    pub positive_caps: QualityBundle,
    pub riparian_water_bonus: f64,
}

impl Default for BuildingEffects {
    fn default() -> Self {
        Self {
            positive_caps: QualityBundle {
                air_quality: 50.0,
                water_quality: 60.0,
                community_happiness: 50.0,
                biodiversity: 40.0,
            },
            riparian_water_bonus: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reforestation {
    pub milestone_count: u32,
    pub milestone_bonus: QualityBundle,
    pub recurring_interval: u32,
    pub recurring_bonus: QualityBundle,
}

impl Default for Reforestation {
    fn default() -> Self {
        Self {
            milestone_count: 20,
            milestone_bonus: QualityBundle {
                air_quality: 15.0,
                water_quality: 10.0,
                community_happiness: 8.0,
                biodiversity: 12.0,
            },
            recurring_interval: 5,
            recurring_bonus: QualityBundle {
                air_quality: 3.0,
                water_quality: 2.0,
                community_happiness: 2.0,
                biodiversity: 4.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inertia {
    pub low_months: usize,
    pub low_air_threshold: f64,
    pub low_water_threshold: f64,
    pub low_air_penalty: f64,
    pub low_air_biodiversity_penalty: f64,
    pub low_water_penalty: f64,
    pub low_water_biodiversity_penalty: f64,
    pub high_months: usize,
    pub high_air_level: f64,
    pub high_water_level: f64,
    pub high_air_biodiversity_bonus: f64,
    pub high_water_biodiversity_bonus: f64,
}

impl Default for Inertia {
    fn default() -> Self {
        Self {
            low_months: 3,
            low_air_threshold: 40.0,
            low_water_threshold: 40.0,
            low_air_penalty: -3.0,
            low_air_biodiversity_penalty: -2.0,
            low_water_penalty: -3.0,
            low_water_biodiversity_penalty: -2.0,
            high_months: 4,
            high_air_level: 75.0,
            high_water_level: 75.0,
            high_air_biodiversity_bonus: 1.0,
            high_water_biodiversity_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalLows {
    pub air_threshold: f64,
    pub air_happiness_penalty: f64,
    pub water_threshold: f64,
    pub water_happiness_penalty: f64,
    pub food_threshold: f64,
    pub food_happiness_penalty: f64,
}

impl Default for CriticalLows {
    fn default() -> Self {
        Self {
            air_threshold: 40.0,
            air_happiness_penalty: -10.0,
            water_threshold: 40.0,
            water_happiness_penalty: -10.0,
            food_threshold: 30.0,
            food_happiness_penalty: -15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progression {
    /// Houses plus community centres needed per unlocked terrain unit.
    pub terrain_unlock_threshold: u32,
    pub water_treatment_water_below: f64,
    pub water_treatment_population_houses: u32,
    pub waste_collection_houses: u32,
    pub reforestation_houses: u32,
    pub community_center_happiness_below: f64,
    pub community_center_houses: u32,
    pub school_population_houses: u32,
    pub health_post_population_houses: u32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            terrain_unlock_threshold: 2,
            water_treatment_water_below: 45.0,
            water_treatment_population_houses: 2,
            waste_collection_houses: 3,
            reforestation_houses: 2,
            community_center_happiness_below: 60.0,
            community_center_houses: 3,
            school_population_houses: 3,
            health_post_population_houses: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grid {
    /// Side of one grid cell in world units.
    pub cell_size: f64,
    /// Side of the buildable square, in cells, before any terrain unlock.
    pub initial_terrain_cells: u32,
    /// Largest distance from the river centre line, in world units, that
    /// still counts as riparian.
    pub river_proximity: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            cell_size: 2.0,
            initial_terrain_cells: 30,
            river_proximity: 6.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TuningError {
    #[error("tuning value '{0}' must be greater than zero")]
    NonPositive(&'static str),
    #[error("indicator bounds are inverted ({min} > {max})")]
    InvertedBounds { min: f64, max: f64 },
}

impl Tuning {
    /// Rejects values the resolver divides by or windows over.
    pub fn validate(&self) -> Result<(), TuningError> {
        let positive = [
            ("population.per_house", self.population.per_house),
            ("infrastructure.houses_per_school", self.infrastructure.houses_per_school),
            (
                "infrastructure.houses_per_health_post",
                self.infrastructure.houses_per_health_post,
            ),
            (
                "infrastructure.houses_per_water_treatment",
                self.infrastructure.houses_per_water_treatment,
            ),
            (
                "infrastructure.houses_per_waste_collection",
                self.infrastructure.houses_per_waste_collection,
            ),
            ("reforestation.recurring_interval", self.reforestation.recurring_interval),
            (
                "progression.terrain_unlock_threshold",
                self.progression.terrain_unlock_threshold,
            ),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(TuningError::NonPositive(name));
            }
        }
        if self.inertia.low_months == 0 {
            return Err(TuningError::NonPositive("inertia.low_months"));
        }
        if self.inertia.high_months == 0 {
            return Err(TuningError::NonPositive("inertia.high_months"));
        }
        if self.grid.cell_size <= 0.0 {
            return Err(TuningError::NonPositive("grid.cell_size"));
        }
        if self.bounds.min > self.bounds.max {
            return Err(TuningError::InvertedBounds {
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        Ok(())
    }
}
