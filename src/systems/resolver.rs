//! Month indicator resolution.
//!
//! [`Resolver::resolve`] rebuilds the whole [`IndicatorSet`] from the placed
//! buildings and the history recorded so far. Stages run in a fixed order and
//! later stages read what earlier ones wrote:
//!
//! 1. census and population
//! 2. baseline reset
//! 3. population pressure
//! 4. infrastructure deficits (only with at least one house)
//! 5. building effects with asymmetric positive caps
//! 6. reforestation milestone and recurring bonuses
//! 7. sustained-condition inertia over the trailing history
//! 8. happiness penalties for critically low air, water and food
//! 9. clamping

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingKind;
use crate::indicators::{trailing, HistoricDataPoint, IndicatorSet};
use crate::systems::census::Census;
use crate::tuning::{QualityBundle, Tuning};
use crate::world::PlacedBuilding;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub indicators: IndicatorSet,
    /// True when this call applied the one-time reforestation bonus. The
    /// caller owns the persisted flag.
    pub milestone_just_reached: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    tuning: &'a Tuning,
}

impl<'a> Resolver<'a> {
    pub fn new(tuning: &'a Tuning) -> Self {
        Self { tuning }
    }

    /// `history` must not contain the month being computed.
    pub fn resolve(
        &self,
        buildings: &[PlacedBuilding],
        history: &[HistoricDataPoint],
        milestone_already_reached: bool,
    ) -> Resolution {
        let census = Census::of(buildings);
        let houses = census.houses();

        let mut next = self.baseline();
        next.population = houses * self.tuning.population.per_house;

        self.apply_population_pressure(&mut next);
        if houses > 0 {
            self.apply_infrastructure_deficits(&mut next, &census);
        }
        self.apply_building_effects(&mut next, buildings);
        let milestone_just_reached =
            self.apply_reforestation(&mut next, &census, milestone_already_reached);
        self.apply_inertia(&mut next, history);
        self.apply_critical_lows(&mut next);

        let bounds = &self.tuning.bounds;
        next.clamp(bounds.min, bounds.max, bounds.energy_limit);

        Resolution {
            indicators: next,
            milestone_just_reached,
        }
    }

    fn baseline(&self) -> IndicatorSet {
        let initial = &self.tuning.initial;
        IndicatorSet {
            air_quality: initial.air_quality,
            water_quality: initial.water_quality,
            community_happiness: initial.community_happiness,
            biodiversity: initial.biodiversity,
            energy_balance: 0.0,
            food_supply: initial.food_supply,
            population: 0,
        }
    }

    fn apply_population_pressure(&self, next: &mut IndicatorSet) {
        let rules = &self.tuning.population;
        let people = next.population as f64;
        next.air_quality += people * rules.air_per_person;
        next.water_quality += people * rules.water_per_person;
        next.biodiversity += people * rules.biodiversity_per_person;
        next.food_supply += people * rules.food_per_person;

        if next.population > rules.happiness_drag_threshold {
            let excess = (next.population - rules.happiness_drag_threshold) as f64;
            next.community_happiness += excess * rules.happiness_drag_per_person;
        }
    }

    fn apply_infrastructure_deficits(&self, next: &mut IndicatorSet, census: &Census) {
        let rules = &self.tuning.infrastructure;
        let houses = census.houses();
        let deficit = |kind: BuildingKind, houses_per_unit: u32| -> f64 {
            let required = houses.div_ceil(houses_per_unit);
            required.saturating_sub(census.count(kind)) as f64
        };

        let schools = deficit(BuildingKind::School, rules.houses_per_school);
        next.community_happiness += schools * rules.happiness_penalty_per_unit;

        let health_posts = deficit(BuildingKind::HealthPost, rules.houses_per_health_post);
        next.community_happiness += health_posts * rules.happiness_penalty_per_unit;

        let water_treatment =
            deficit(BuildingKind::WaterTreatment, rules.houses_per_water_treatment);
        if water_treatment > 0.0 {
            next.water_quality += water_treatment * rules.water_treatment_water_penalty_per_unit;
            next.community_happiness += water_treatment * (rules.happiness_penalty_per_unit / 2.0);
        }

        let waste = deficit(BuildingKind::WasteCollection, rules.houses_per_waste_collection);
        if waste > 0.0 {
            rules
                .waste_collection_penalty_per_unit
                .scaled(waste)
                .apply_to(next);
        }
    }

    fn apply_building_effects(&self, next: &mut IndicatorSet, buildings: &[PlacedBuilding]) {
        let riparian_bonus = self.tuning.buildings.riparian_water_bonus;
        let mut raw = QualityBundle::default();
        next.energy_balance = 0.0;

        for building in buildings {
            let effects = &building.effects;
            raw.air_quality += effects.air_quality.unwrap_or(0.0);
            raw.water_quality += effects.water_quality.unwrap_or(0.0);
            raw.community_happiness += effects.community_happiness.unwrap_or(0.0);
            raw.biodiversity += effects.biodiversity.unwrap_or(0.0);
            next.energy_balance += effects.energy.unwrap_or(0.0);
            next.food_supply += effects.food.unwrap_or(0.0);

            if building.kind == BuildingKind::ReforestationArea && building.riparian {
                raw.water_quality += riparian_bonus;
            }
        }

        let caps = &self.tuning.buildings.positive_caps;
        next.air_quality += capped(raw.air_quality, caps.air_quality);
        next.water_quality += capped(raw.water_quality, caps.water_quality);
        next.community_happiness += capped(raw.community_happiness, caps.community_happiness);
        next.biodiversity += capped(raw.biodiversity, caps.biodiversity);
    }

    fn apply_reforestation(
        &self,
        next: &mut IndicatorSet,
        census: &Census,
        milestone_already_reached: bool,
    ) -> bool {
        let rules = &self.tuning.reforestation;
        let areas = census.count(BuildingKind::ReforestationArea);

        let just_reached = areas >= rules.milestone_count && !milestone_already_reached;
        if just_reached {
            rules.milestone_bonus.apply_to(next);
        }

        if areas > rules.milestone_count {
            let sets = (areas - rules.milestone_count) / rules.recurring_interval;
            if sets >= 1 {
                rules.recurring_bonus.scaled(sets as f64).apply_to(next);
            }
        }
        just_reached
    }

    fn apply_inertia(&self, next: &mut IndicatorSet, history: &[HistoricDataPoint]) {
        let rules = &self.tuning.inertia;

        if let Some(window) = trailing(history, rules.low_months) {
            if window
                .iter()
                .all(|point| point.indicators.air_quality < rules.low_air_threshold)
            {
                next.air_quality += rules.low_air_penalty;
                next.biodiversity += rules.low_air_biodiversity_penalty;
            }
            if window
                .iter()
                .all(|point| point.indicators.water_quality < rules.low_water_threshold)
            {
                next.water_quality += rules.low_water_penalty;
                next.biodiversity += rules.low_water_biodiversity_penalty;
            }
        }

        if let Some(window) = trailing(history, rules.high_months) {
            if window
                .iter()
                .all(|point| point.indicators.air_quality >= rules.high_air_level)
            {
                next.biodiversity += rules.high_air_biodiversity_bonus;
            }
            if window
                .iter()
                .all(|point| point.indicators.water_quality >= rules.high_water_level)
            {
                next.biodiversity += rules.high_water_biodiversity_bonus;
            }
        }
    }

    fn apply_critical_lows(&self, next: &mut IndicatorSet) {
        let rules = &self.tuning.critical;
        if next.air_quality < rules.air_threshold {
            next.community_happiness += rules.air_happiness_penalty;
        }
        if next.water_quality < rules.water_threshold {
            next.community_happiness += rules.water_happiness_penalty;
        }
        if next.food_supply < rules.food_threshold {
            next.community_happiness += rules.food_happiness_penalty;
        }
    }
}

/// Positive totals are limited to `cap`; negative totals pass through.
fn capped(raw: f64, cap: f64) -> f64 {
    if raw > 0.0 {
        raw.min(cap)
    } else {
        raw
    }
}
