use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{BuildingKind, Catalog, CatalogError, EffectBundle};
use crate::indicators::{HistoricDataPoint, IndicatorSet};
use crate::spatial::{GridCell, RiverPath, TerrainBounds};
use crate::systems::{
    Census, ChallengeBoard, ChallengeEvent, ChallengeId, ChallengeView, ProgressionEvaluator,
    Resolver,
};
use crate::tuning::{Tuning, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(u64);

impl BuildingId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A building as placed. `effects` is the catalog entry copied at placement
/// time and never follows later catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBuilding {
    pub id: BuildingId,
    pub kind: BuildingKind,
    pub cell: GridCell,
    pub effects: EffectBundle,
    pub riparian: bool,
}

/// Everything that stays fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub tuning: Tuning,
    pub catalog: Catalog,
    pub river: RiverPath,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RulesetError {
    #[error(transparent)]
    Tuning(#[from] TuningError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl Ruleset {
    pub fn new(tuning: Tuning, catalog: Catalog, river: RiverPath) -> Result<Self, RulesetError> {
        tuning.validate()?;
        catalog.validate()?;
        Ok(Self {
            tuning,
            catalog,
            river,
        })
    }

    pub fn terrain_bounds(&self, unlocked_terrain: u32) -> TerrainBounds {
        TerrainBounds::new(&self.tuning.grid, unlocked_terrain)
    }

    /// Whether a building of `kind` at `cell` would count as riparian.
    pub fn is_riparian(&self, kind: BuildingKind, cell: GridCell) -> bool {
        kind == BuildingKind::ReforestationArea && self.river.is_riparian(cell, &self.tuning.grid)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            catalog: Catalog::standard(),
            river: RiverPath::default(),
        }
    }
}

/// Recoverable placement failures. The state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PlacementRejection {
    #[error("'{kind}' is not unlocked yet")]
    Locked { kind: BuildingKind },
    #[error("cell {cell} is outside the unlocked terrain")]
    OutsideTerrain { cell: GridCell },
    #[error("cell {cell} is already occupied by building {by}")]
    Occupied { cell: GridCell, by: BuildingId },
    #[error("not enough energy: balance {balance} is below the cost of {cost}")]
    InsufficientEnergy { balance: f64, cost: f64 },
}

impl PlacementRejection {
    pub fn code(&self) -> &'static str {
        match self {
            PlacementRejection::Locked { .. } => "locked",
            PlacementRejection::OutsideTerrain { .. } => "outside_terrain",
            PlacementRejection::Occupied { .. } => "occupied",
            PlacementRejection::InsufficientEnergy { .. } => "insufficient_energy",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("placement rejected: {0}")]
    Rejected(#[from] PlacementRejection),
    #[error("building kind '{0}' has no catalog entry")]
    UnknownBuildingKind(BuildingKind),
    #[error("challenge '{0}' cannot be activated")]
    ChallengeUnavailable(ChallengeId),
}

impl SimError {
    /// Fatal errors mean the ruleset itself is broken.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::UnknownBuildingKind(_))
    }
}

impl From<CatalogError> for SimError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownBuildingKind(kind) => SimError::UnknownBuildingKind(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Place {
        kind: BuildingKind,
        cell: GridCell,
        #[serde(default)]
        riparian: bool,
    },
    AdvanceMonth,
    DismissChallenge,
    ActivateChallenge {
        challenge: ChallengeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    BuildingPlaced {
        id: BuildingId,
        kind: BuildingKind,
        cell: GridCell,
        riparian: bool,
    },
    MonthAdvanced {
        month: u64,
    },
    MilestoneReached,
    BuildingsUnlocked {
        kinds: Vec<BuildingKind>,
    },
    TerrainUnlocked {
        unlocked_terrain: u32,
    },
    Challenge(ChallengeEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SimulationState,
    pub events: Vec<Event>,
}

/// One immutable settlement state. Transitions never modify `self`; they
/// return a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub(crate) month: u64,
    pub(crate) buildings: Vec<PlacedBuilding>,
    pub(crate) indicators: IndicatorSet,
    pub(crate) history: Vec<HistoricDataPoint>,
    pub(crate) available: Vec<BuildingKind>,
    pub(crate) unlocked_terrain: u32,
    pub(crate) milestone_reached: bool,
    pub(crate) challenges: ChallengeBoard,
    next_building_id: u64,
}

impl SimulationState {
    pub fn new(rules: &Ruleset) -> Self {
        let initial = rules.tuning.initial;
        Self {
            month: 0,
            buildings: Vec::new(),
            indicators: initial,
            history: vec![HistoricDataPoint {
                month: 0,
                indicators: initial,
            }],
            available: BuildingKind::INITIALLY_AVAILABLE.to_vec(),
            unlocked_terrain: 0,
            milestone_reached: false,
            challenges: ChallengeBoard::default(),
            next_building_id: 0,
        }
    }

    pub fn month(&self) -> u64 {
        self.month
    }

    pub fn buildings(&self) -> &[PlacedBuilding] {
        &self.buildings
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn history(&self) -> &[HistoricDataPoint] {
        &self.history
    }

    pub fn available(&self) -> &[BuildingKind] {
        &self.available
    }

    pub fn is_available(&self, kind: BuildingKind) -> bool {
        self.available.contains(&kind)
    }

    pub fn unlocked_terrain(&self) -> u32 {
        self.unlocked_terrain
    }

    pub fn milestone_reached(&self) -> bool {
        self.milestone_reached
    }

    pub fn challenges(&self) -> &ChallengeBoard {
        &self.challenges
    }

    pub fn active_challenge(&self) -> Option<ChallengeId> {
        self.challenges.active
    }

    pub fn building_at(&self, cell: GridCell) -> Option<&PlacedBuilding> {
        self.buildings.iter().find(|building| building.cell == cell)
    }

    pub fn census(&self) -> Census {
        Census::of(&self.buildings)
    }

    pub fn apply(&self, rules: &Ruleset, command: &Command) -> Result<Transition, SimError> {
        let transition = match command {
            Command::Place {
                kind,
                cell,
                riparian,
            } => self.place(rules, *kind, *cell, *riparian)?,
            Command::AdvanceMonth => self.advance_month(rules),
            Command::DismissChallenge => self.dismiss_challenge(),
            Command::ActivateChallenge { challenge } => self.activate_challenge(*challenge)?,
        };
        Ok(transition.with_challenges_evaluated(rules))
    }

    fn place(
        &self,
        rules: &Ruleset,
        kind: BuildingKind,
        cell: GridCell,
        riparian: bool,
    ) -> Result<Transition, SimError> {
        if !self.is_available(kind) {
            return Err(PlacementRejection::Locked { kind }.into());
        }
        if !rules.terrain_bounds(self.unlocked_terrain).contains(cell) {
            return Err(PlacementRejection::OutsideTerrain { cell }.into());
        }
        if let Some(existing) = self.building_at(cell) {
            return Err(PlacementRejection::Occupied {
                cell,
                by: existing.id,
            }
            .into());
        }
        let effects = rules.catalog.effects(kind)?;
        let cost = effects.energy_cost();
        if cost > 0.0 && self.indicators.energy_balance < cost {
            return Err(PlacementRejection::InsufficientEnergy {
                balance: self.indicators.energy_balance,
                cost,
            }
            .into());
        }

        let building = PlacedBuilding {
            id: BuildingId::new(self.next_building_id),
            kind,
            cell,
            effects,
            riparian: riparian && kind == BuildingKind::ReforestationArea,
        };
        let mut events = vec![Event::BuildingPlaced {
            id: building.id,
            kind,
            cell,
            riparian: building.riparian,
        }];

        let mut next = self.clone();
        next.buildings.push(building);
        next.next_building_id += 1;

        let resolution =
            Resolver::new(&rules.tuning).resolve(&next.buildings, &next.history, self.milestone_reached);
        next.indicators = resolution.indicators;
        if resolution.milestone_just_reached {
            next.milestone_reached = true;
            events.push(Event::MilestoneReached);
        }

        Ok(Transition {
            state: next,
            events,
        })
    }

    fn advance_month(&self, rules: &Ruleset) -> Transition {
        let mut next = self.clone();
        next.month = self.month + 1;
        let mut events = vec![Event::MonthAdvanced { month: next.month }];

        let resolution =
            Resolver::new(&rules.tuning).resolve(&self.buildings, &self.history, self.milestone_reached);
        next.indicators = resolution.indicators;
        next.history.push(HistoricDataPoint {
            month: next.month,
            indicators: next.indicators,
        });
        if resolution.milestone_just_reached {
            next.milestone_reached = true;
            events.push(Event::MilestoneReached);
        }

        let unlocks = ProgressionEvaluator::new(&rules.tuning).evaluate(
            &self.available,
            self.unlocked_terrain,
            &self.buildings,
            &next.indicators,
        );
        if !unlocks.newly_unlocked.is_empty() {
            events.push(Event::BuildingsUnlocked {
                kinds: unlocks.newly_unlocked,
            });
        }
        if unlocks.unlocked_terrain > self.unlocked_terrain {
            events.push(Event::TerrainUnlocked {
                unlocked_terrain: unlocks.unlocked_terrain,
            });
        }
        next.available = unlocks.available;
        next.unlocked_terrain = unlocks.unlocked_terrain;
        next.challenges = self.challenges.month_advanced(next.month);

        Transition {
            state: next,
            events,
        }
    }

    fn dismiss_challenge(&self) -> Transition {
        match self.challenges.dismiss() {
            Some((board, id)) => {
                let mut next = self.clone();
                next.challenges = board;
                Transition {
                    state: next,
                    events: vec![Event::Challenge(ChallengeEvent::Dismissed(id))],
                }
            }
            None => Transition {
                state: self.clone(),
                events: Vec::new(),
            },
        }
    }

    fn activate_challenge(&self, id: ChallengeId) -> Result<Transition, SimError> {
        let board = self
            .challenges
            .activate(id)
            .ok_or(SimError::ChallengeUnavailable(id))?;
        let mut next = self.clone();
        next.challenges = board;
        Ok(Transition {
            state: next,
            events: vec![Event::Challenge(ChallengeEvent::Activated(id))],
        })
    }

    pub fn snapshot(&self, rules: &Ruleset) -> WorldSnapshot {
        let census = self.census();
        WorldSnapshot {
            month: self.month,
            indicators: self.indicators,
            buildings: self.buildings.clone(),
            available: self.available.clone(),
            unlocked_terrain: self.unlocked_terrain,
            max_cell: rules.terrain_bounds(self.unlocked_terrain).max_cell(),
            houses: census.houses(),
            milestone_reached: self.milestone_reached,
            active_challenge: self.challenges.active.map(ActiveChallenge::from_id),
            completed_challenges: self.challenges.completed.clone(),
        }
    }
}

impl Transition {
    fn with_challenges_evaluated(mut self, rules: &Ruleset) -> Self {
        let census = self.state.census();
        let view = ChallengeView {
            indicators: &self.state.indicators,
            census: &census,
            population_per_house: rules.tuning.population.per_house,
        };
        let (board, challenge_events) = self.state.challenges.evaluate(&view);
        self.state.challenges = board;
        self.events
            .extend(challenge_events.into_iter().map(Event::Challenge));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveChallenge {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub reward: String,
}

impl ActiveChallenge {
    fn from_id(id: ChallengeId) -> Self {
        let challenge = id.challenge();
        Self {
            id,
            title: challenge.title.to_string(),
            description: challenge.description.to_string(),
            reward: challenge.reward.to_string(),
        }
    }
}

/// Read-only view handed to renderers and the HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub month: u64,
    pub indicators: IndicatorSet,
    pub buildings: Vec<PlacedBuilding>,
    pub available: Vec<BuildingKind>,
    pub unlocked_terrain: u32,
    /// Largest absolute cell coordinate currently buildable.
    pub max_cell: i32,
    pub houses: u32,
    pub milestone_reached: bool,
    pub active_challenge: Option<ActiveChallenge>,
    pub completed_challenges: Vec<ChallengeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(kind: BuildingKind, x: i32, z: i32) -> Command {
        Command::Place {
            kind,
            cell: GridCell::new(x, z),
            riparian: false,
        }
    }

    fn apply_all(rules: &Ruleset, commands: &[Command]) -> SimulationState {
        let mut state = SimulationState::new(rules);
        for command in commands {
            state = state.apply(rules, command).unwrap().state;
        }
        state
    }

    #[test]
    fn new_state_starts_at_month_zero() {
        let rules = Ruleset::default();
        let state = SimulationState::new(&rules);
        assert_eq!(state.month(), 0);
        assert_eq!(state.history(), &[HistoricDataPoint::initial()]);
        assert_eq!(state.available(), &BuildingKind::INITIALLY_AVAILABLE);
        assert!(state.buildings().is_empty());
    }

    #[test]
    fn house_needs_energy_first() {
        let rules = Ruleset::default();
        let state = SimulationState::new(&rules);
        let err = state
            .apply(&rules, &place(BuildingKind::SustainableHouse, 0, 0))
            .unwrap_err();
        assert_eq!(
            err,
            SimError::Rejected(PlacementRejection::InsufficientEnergy {
                balance: 0.0,
                cost: 4.0
            })
        );

        let state = apply_all(
            &rules,
            &[
                place(BuildingKind::SolarPanelArray, 0, 0),
                place(BuildingKind::SustainableHouse, 1, 0),
            ],
        );
        assert_eq!(state.buildings().len(), 2);
        assert_eq!(state.indicators().energy_balance, 11.0);
        assert_eq!(state.indicators().population, 4);
    }

    #[test]
    fn placement_checks_run_in_order() {
        let rules = Ruleset::default();
        let state = apply_all(&rules, &[place(BuildingKind::SolarPanelArray, 0, 0)]);

        let locked = state.apply(&rules, &place(BuildingKind::School, 0, 0));
        assert_eq!(
            locked.unwrap_err(),
            SimError::Rejected(PlacementRejection::Locked {
                kind: BuildingKind::School
            })
        );

        let outside = state.apply(&rules, &place(BuildingKind::SolarPanelArray, 15, 0));
        assert!(matches!(
            outside.unwrap_err(),
            SimError::Rejected(PlacementRejection::OutsideTerrain { .. })
        ));

        let occupied = state.apply(&rules, &place(BuildingKind::CommunityGarden, 0, 0));
        assert_eq!(
            occupied.unwrap_err(),
            SimError::Rejected(PlacementRejection::Occupied {
                cell: GridCell::new(0, 0),
                by: BuildingId::new(0)
            })
        );
    }

    #[test]
    fn missing_catalog_entry_is_fatal() {
        let catalog = Catalog::from_entries(Vec::new());
        let rules = Ruleset {
            catalog,
            ..Ruleset::default()
        };
        let err = SimulationState::new(&rules)
            .apply(&rules, &place(BuildingKind::CommunityGarden, 0, 0))
            .unwrap_err();
        assert_eq!(err, SimError::UnknownBuildingKind(BuildingKind::CommunityGarden));
        assert!(err.is_fatal());
    }

    #[test]
    fn riparian_flag_is_dropped_for_other_kinds() {
        let rules = Ruleset::default();
        let state = SimulationState::new(&rules);
        let transition = state
            .apply(
                &rules,
                &Command::Place {
                    kind: BuildingKind::CommunityGarden,
                    cell: GridCell::new(-10, 0),
                    riparian: true,
                },
            )
            .unwrap();
        assert!(!transition.state.buildings()[0].riparian);
    }

    #[test]
    fn month_tick_appends_history_and_unlocks() {
        let rules = Ruleset::default();
        let state = apply_all(
            &rules,
            &[
                place(BuildingKind::SolarPanelArray, 0, 0),
                place(BuildingKind::SustainableHouse, 1, 0),
                place(BuildingKind::SustainableHouse, 2, 0),
            ],
        );
        let transition = state.apply(&rules, &Command::AdvanceMonth).unwrap();
        let next = transition.state;

        assert_eq!(next.month(), 1);
        assert_eq!(next.history().len(), 2);
        assert_eq!(next.history()[1].month, 1);
        assert_eq!(next.history()[1].indicators, *next.indicators());
        assert_eq!(next.unlocked_terrain(), 1);
        assert!(next.is_available(BuildingKind::ReforestationArea));
        assert!(transition
            .events
            .contains(&Event::TerrainUnlocked { unlocked_terrain: 1 }));
    }

    #[test]
    fn placement_keeps_month_and_history() {
        let rules = Ruleset::default();
        let before = SimulationState::new(&rules);
        let after = before
            .apply(&rules, &place(BuildingKind::SolarPanelArray, 3, 3))
            .unwrap()
            .state;
        assert_eq!(after.month(), before.month());
        assert_eq!(after.history(), before.history());
        assert_eq!(after.available(), before.available());
    }

    #[test]
    fn dismissing_with_nothing_active_is_a_no_op() {
        let rules = Ruleset::default();
        let state = SimulationState::new(&rules);
        let transition = state.apply(&rules, &Command::DismissChallenge).unwrap();
        assert_eq!(transition.state, state);
        assert!(transition.events.is_empty());
    }

    #[test]
    fn snapshot_reports_the_active_challenge_text() {
        let rules = Ruleset::default();
        let state = SimulationState::new(&rules)
            .apply(
                &rules,
                &Command::ActivateChallenge {
                    challenge: ChallengeId::Happiness,
                },
            )
            .unwrap()
            .state;
        let snapshot = state.snapshot(&rules);
        let active = snapshot.active_challenge.unwrap();
        assert_eq!(active.id, ChallengeId::Happiness);
        assert_eq!(active.title, "Happy Community!");
        assert_eq!(snapshot.max_cell, 14);
    }
}
