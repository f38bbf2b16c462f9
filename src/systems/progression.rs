use serde::{Deserialize, Serialize};

use crate::catalog::BuildingKind;
use crate::indicators::IndicatorSet;
use crate::systems::census::Census;
use crate::tuning::Tuning;
use crate::world::PlacedBuilding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlocks {
    /// Previously available kinds followed by `newly_unlocked`, without duplicates.
    pub available: Vec<BuildingKind>,
    pub newly_unlocked: Vec<BuildingKind>,
    pub unlocked_terrain: u32,
}

/// Decides which building kinds and how much terrain a month opens up.
#[derive(Debug, Clone, Copy)]
pub struct ProgressionEvaluator<'a> {
    tuning: &'a Tuning,
}

impl<'a> ProgressionEvaluator<'a> {
    pub fn new(tuning: &'a Tuning) -> Self {
        Self { tuning }
    }

    /// Unlocks only ever grow: kinds already available stay available and the
    /// terrain count never drops below `previous_terrain`.
    pub fn evaluate(
        &self,
        previous_available: &[BuildingKind],
        previous_terrain: u32,
        buildings: &[PlacedBuilding],
        indicators: &IndicatorSet,
    ) -> Unlocks {
        let census = Census::of(buildings);
        let mut available: Vec<BuildingKind> = Vec::with_capacity(BuildingKind::ALL.len());
        for kind in previous_available {
            if !available.contains(kind) {
                available.push(*kind);
            }
        }

        let mut newly_unlocked = Vec::new();
        for kind in BuildingKind::ALL {
            if !available.contains(&kind) && self.qualifies(kind, &census, indicators) {
                available.push(kind);
                newly_unlocked.push(kind);
            }
        }

        let strategic = census.houses() + census.count(BuildingKind::CommunityCenter);
        let expected = strategic / self.tuning.progression.terrain_unlock_threshold;

        Unlocks {
            available,
            newly_unlocked,
            unlocked_terrain: previous_terrain.max(expected),
        }
    }

    fn qualifies(&self, kind: BuildingKind, census: &Census, indicators: &IndicatorSet) -> bool {
        let rules = &self.tuning.progression;
        let per_house = self.tuning.population.per_house;
        let houses = census.houses();
        let population = indicators.population;

        match kind {
            BuildingKind::WaterTreatment => {
                houses > 0
                    && (indicators.water_quality < rules.water_treatment_water_below
                        || population >= per_house * rules.water_treatment_population_houses)
            }
            BuildingKind::WasteCollection => houses >= rules.waste_collection_houses,
            BuildingKind::ReforestationArea => houses >= rules.reforestation_houses,
            BuildingKind::CommunityCenter => {
                indicators.community_happiness < rules.community_center_happiness_below
                    && houses >= rules.community_center_houses
            }
            BuildingKind::School => population >= per_house * rules.school_population_houses,
            BuildingKind::HealthPost => {
                population >= per_house * rules.health_post_population_houses
            }
            BuildingKind::SustainableHouse
            | BuildingKind::CommunityGarden
            | BuildingKind::SolarPanelArray => false,
        }
    }
}
