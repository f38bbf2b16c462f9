use greenvale::{
    catalog::{BuildingKind, Catalog},
    indicators::{HistoricDataPoint, IndicatorSet},
    spatial::GridCell,
    systems::Resolver,
    tuning::Tuning,
    world::{BuildingId, Command, PlacedBuilding, Ruleset, SimulationState},
};
use proptest::prelude::*;

fn kind() -> impl Strategy<Value = BuildingKind> {
    (0..BuildingKind::ALL.len()).prop_map(|index| BuildingKind::ALL[index])
}

fn layout(entries: Vec<(BuildingKind, bool)>) -> Vec<PlacedBuilding> {
    let catalog = Catalog::standard();
    entries
        .into_iter()
        .enumerate()
        .map(|(index, (kind, riparian))| PlacedBuilding {
            id: BuildingId::new(index as u64),
            kind,
            cell: GridCell::new(index as i32, 0),
            effects: catalog.effects(kind).unwrap(),
            riparian: riparian && kind == BuildingKind::ReforestationArea,
        })
        .collect()
}

fn buildings(max: usize) -> impl Strategy<Value = Vec<PlacedBuilding>> {
    prop::collection::vec((kind(), any::<bool>()), 0..max).prop_map(layout)
}

fn history() -> impl Strategy<Value = Vec<HistoricDataPoint>> {
    prop::collection::vec((0.0..100.0_f64, 0.0..100.0_f64), 0..8).prop_map(|levels| {
        levels
            .into_iter()
            .enumerate()
            .map(|(month, (air, water))| HistoricDataPoint {
                month: month as u64,
                indicators: IndicatorSet {
                    air_quality: air,
                    water_quality: water,
                    ..IndicatorSet::INITIAL
                },
            })
            .collect()
    })
}

fn houses(count: usize) -> Vec<(BuildingKind, bool)> {
    vec![(BuildingKind::SustainableHouse, false); count]
}

#[derive(Debug, Clone)]
enum Step {
    Place(BuildingKind, i32, i32),
    Tick,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (kind(), -16_i32..=16, -16_i32..=16).prop_map(|(kind, x, z)| Step::Place(kind, x, z)),
        1 => Just(Step::Tick),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn resolve_is_deterministic(
        buildings in buildings(80),
        history in history(),
        milestone in any::<bool>(),
    ) {
        let tuning = Tuning::default();
        let resolver = Resolver::new(&tuning);
        let first = resolver.resolve(&buildings, &history, milestone);
        let second = resolver.resolve(&buildings, &history, milestone);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn resolved_indicators_stay_in_range(
        buildings in buildings(160),
        history in history(),
        milestone in any::<bool>(),
    ) {
        let tuning = Tuning::default();
        let next = Resolver::new(&tuning).resolve(&buildings, &history, milestone).indicators;
        for value in [
            next.air_quality,
            next.water_quality,
            next.community_happiness,
            next.biodiversity,
            next.food_supply,
        ] {
            prop_assert!((0.0..=100.0).contains(&value));
        }
        prop_assert!((-1000.0..=1000.0).contains(&next.energy_balance));
    }

    #[test]
    fn population_is_four_per_house(buildings in buildings(80)) {
        let tuning = Tuning::default();
        let houses = buildings
            .iter()
            .filter(|building| building.kind == BuildingKind::SustainableHouse)
            .count() as u32;
        let next = Resolver::new(&tuning).resolve(&buildings, &[], false).indicators;
        prop_assert_eq!(next.population, houses * 4);
    }

    #[test]
    fn extra_houses_never_improve_pressured_indicators(
        others in prop::collection::vec((kind(), any::<bool>()), 0..20),
        count in 0_usize..60,
        history in history(),
    ) {
        let tuning = Tuning::default();
        let resolver = Resolver::new(&tuning);
        let mut fewer = others.clone();
        fewer.extend(houses(count));
        let mut more = others;
        more.extend(houses(count + 1));

        let before = resolver.resolve(&layout(fewer), &history, true).indicators;
        let after = resolver.resolve(&layout(more), &history, true).indicators;
        prop_assert!(after.air_quality <= before.air_quality);
        prop_assert!(after.water_quality <= before.water_quality);
        prop_assert!(after.biodiversity <= before.biodiversity);
        prop_assert!(after.food_supply <= before.food_supply);
    }

    #[test]
    fn transitions_keep_terrain_monotonic_and_rejections_inert(
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let rules = Ruleset::default();
        let mut state = SimulationState::new(&rules);
        for step in steps {
            let command = match step {
                Step::Place(kind, x, z) => Command::Place {
                    kind,
                    cell: GridCell::new(x, z),
                    riparian: rules.is_riparian(kind, GridCell::new(x, z)),
                },
                Step::Tick => Command::AdvanceMonth,
            };
            match state.apply(&rules, &command) {
                Ok(transition) => {
                    let next = transition.state;
                    prop_assert!(next.unlocked_terrain() >= state.unlocked_terrain());
                    prop_assert!(next.buildings().len() >= state.buildings().len());
                    for kind in state.available() {
                        prop_assert!(next.is_available(*kind));
                    }
                    if state.milestone_reached() {
                        prop_assert!(next.milestone_reached());
                    }
                    state = next;
                }
                Err(err) => prop_assert!(!err.is_fatal()),
            }
        }
        let months: Vec<u64> = state.history().iter().map(|point| point.month).collect();
        let expected: Vec<u64> = (0..=state.month()).collect();
        prop_assert_eq!(months, expected);
    }
}

#[test]
fn empty_settlement_stays_at_initial_values() {
    let tuning = Tuning::default();
    let resolution = Resolver::new(&tuning).resolve(&[], &[HistoricDataPoint::initial()], false);
    assert_eq!(resolution.indicators, IndicatorSet::INITIAL);
}

#[test]
fn recurring_bonus_ignores_the_milestone_flag() {
    let mut tuning = Tuning::default();
    tuning.initial = IndicatorSet {
        air_quality: 0.0,
        water_quality: 0.0,
        community_happiness: 0.0,
        biodiversity: 0.0,
        ..IndicatorSet::INITIAL
    };
    tuning.critical.air_happiness_penalty = 0.0;
    tuning.critical.water_happiness_penalty = 0.0;
    tuning.critical.food_happiness_penalty = 0.0;
    let resolver = Resolver::new(&tuning);
    let base = layout(vec![(BuildingKind::ReforestationArea, false); 20]);
    let stacked = layout(vec![(BuildingKind::ReforestationArea, false); 30]);

    // 20 areas already exceed every cap, so the extra ten only add the bonus.
    let at_threshold = resolver.resolve(&base, &[], true).indicators;
    let reached = resolver.resolve(&stacked, &[], true).indicators;
    let fresh = resolver.resolve(&stacked, &[], false).indicators;
    let bonus = tuning.reforestation.recurring_bonus;
    let milestone = tuning.reforestation.milestone_bonus;

    assert_eq!(
        reached.biodiversity - at_threshold.biodiversity,
        2.0 * bonus.biodiversity
    );
    assert_eq!(
        fresh.biodiversity - reached.biodiversity,
        milestone.biodiversity
    );
}
