//! Challenge activation and completion.
//!
//! The roster is a fixed ordered list. Activation picks the first challenge
//! whose trigger holds; at most one challenge is active at a time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingKind;
use crate::indicators::IndicatorSet;
use crate::systems::census::Census;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeId {
    Energy,
    CleanWater,
    Happiness,
    WasteManagement,
}

impl ChallengeId {
    pub fn slug(self) -> &'static str {
        match self {
            ChallengeId::Energy => "energy",
            ChallengeId::CleanWater => "clean_water",
            ChallengeId::Happiness => "happiness",
            ChallengeId::WasteManagement => "waste_management",
        }
    }

    /// Roster position, which is also the activation order.
    pub fn index(self) -> usize {
        match self {
            ChallengeId::Energy => 0,
            ChallengeId::CleanWater => 1,
            ChallengeId::Happiness => 2,
            ChallengeId::WasteManagement => 3,
        }
    }

    pub fn challenge(self) -> &'static Challenge {
        &ROSTER[self.index()]
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Everything a challenge predicate may look at.
#[derive(Debug, Clone)]
pub struct ChallengeView<'a> {
    pub indicators: &'a IndicatorSet,
    pub census: &'a Census,
    pub population_per_house: u32,
}

pub type Predicate = fn(&ChallengeView<'_>) -> bool;

pub struct Challenge {
    pub id: ChallengeId,
    pub title: &'static str,
    pub description: &'static str,
    pub reward: &'static str,
    /// `None` for challenges that never trigger on their own.
    pub activation: Option<Predicate>,
    pub completion: Predicate,
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("id", &self.id)
            .field("title", &self.title)
            .finish()
    }
}

fn energy_triggered(view: &ChallengeView<'_>) -> bool {
    view.census.total() >= 3
        && view.indicators.energy_balance <= 5.0
        && !view.census.has(BuildingKind::SolarPanelArray)
}

fn energy_done(view: &ChallengeView<'_>) -> bool {
    view.indicators.energy_balance > 10.0
}

fn clean_water_triggered(view: &ChallengeView<'_>) -> bool {
    view.indicators.water_quality <= 45.0
        && view.indicators.population >= view.population_per_house * 2
        && !view.census.has(BuildingKind::WaterTreatment)
}

fn clean_water_done(view: &ChallengeView<'_>) -> bool {
    view.indicators.water_quality > 70.0 && view.census.has(BuildingKind::WaterTreatment)
}

fn happiness_done(view: &ChallengeView<'_>) -> bool {
    view.indicators.community_happiness > 75.0 && view.census.has(BuildingKind::CommunityCenter)
}

fn waste_triggered(view: &ChallengeView<'_>) -> bool {
    view.census.houses() >= 3
        && view.indicators.air_quality <= 60.0
        && !view.census.has(BuildingKind::WasteCollection)
}

fn waste_done(view: &ChallengeView<'_>) -> bool {
    view.census.has(BuildingKind::WasteCollection)
}

pub static ROSTER: [Challenge; 4] = [
    Challenge {
        id: ChallengeId::Energy,
        title: "Energy for Everyone!",
        description: "The community is growing and needs more energy. Consider renewable sources.",
        reward: "New leisure-focused building options.",
        activation: Some(energy_triggered),
        completion: energy_done,
    },
    Challenge {
        id: ChallengeId::CleanWater,
        title: "Clean Water, Healthy Life!",
        description: "River water quality needs urgent attention. A treatment station is essential.",
        reward: "Aquatic biodiversity recovers and the river runs clearer.",
        activation: Some(clean_water_triggered),
        completion: clean_water_done,
    },
    Challenge {
        id: ChallengeId::Happiness,
        title: "Happy Community!",
        description: "Invest in shared spaces and leisure for everyone.",
        reward: "The village becomes an example of well-being and social cohesion.",
        activation: None,
        completion: happiness_done,
    },
    Challenge {
        id: ChallengeId::WasteManagement,
        title: "Essential Waste Management!",
        description: "The village is growing. Build a recycling center to keep it clean.",
        reward: "Recycling in place; air and water improve.",
        activation: Some(waste_triggered),
        completion: waste_done,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "challenge", rename_all = "snake_case")]
pub enum ChallengeEvent {
    Activated(ChallengeId),
    Completed(ChallengeId),
    Dismissed(ChallengeId),
}

/// Active slot, completed ids, and the id acknowledged since the last month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeBoard {
    pub active: Option<ChallengeId>,
    pub completed: Vec<ChallengeId>,
    pub acknowledged: Option<ChallengeId>,
}

impl ChallengeBoard {
    pub fn is_completed(&self, id: ChallengeId) -> bool {
        self.completed.contains(&id)
    }

    /// Completion of the active challenge first, then activation if the slot
    /// is free.
    pub fn evaluate(&self, view: &ChallengeView<'_>) -> (ChallengeBoard, Vec<ChallengeEvent>) {
        let mut next = self.clone();
        let mut events = Vec::new();

        if let Some(active) = next.active {
            if !next.is_completed(active) && (active.challenge().completion)(view) {
                next.completed.push(active);
                next.active = None;
                next.acknowledged = Some(active);
                events.push(ChallengeEvent::Completed(active));
            }
        }

        if next.active.is_none() {
            let candidate = ROSTER.iter().find(|challenge| {
                !next.is_completed(challenge.id)
                    && next.acknowledged != Some(challenge.id)
                    && challenge.activation.is_some_and(|trigger| trigger(view))
            });
            if let Some(challenge) = candidate {
                next.active = Some(challenge.id);
                events.push(ChallengeEvent::Activated(challenge.id));
            }
        }

        (next, events)
    }

    /// Closes the active challenge without completing it.
    pub fn dismiss(&self) -> Option<(ChallengeBoard, ChallengeId)> {
        let active = self.active?;
        let mut next = self.clone();
        next.active = None;
        next.acknowledged = Some(active);
        Some((next, active))
    }

    /// Puts a challenge in the slot regardless of its trigger. Returns `None`
    /// when the slot is taken or the challenge is already completed.
    pub fn activate(&self, id: ChallengeId) -> Option<ChallengeBoard> {
        if self.active.is_some() || self.is_completed(id) {
            return None;
        }
        let mut next = self.clone();
        next.active = Some(id);
        Some(next)
    }

    /// Clears the acknowledgement once the month index has moved past zero.
    pub fn month_advanced(&self, month: u64) -> ChallengeBoard {
        let mut next = self.clone();
        if month > 0 {
            next.acknowledged = None;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::spatial::GridCell;
    use crate::world::{BuildingId, PlacedBuilding};

    fn census_of(kinds: &[BuildingKind]) -> Census {
        let catalog = Catalog::standard();
        let buildings: Vec<PlacedBuilding> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| PlacedBuilding {
                id: BuildingId::new(i as u64),
                kind: *kind,
                cell: GridCell::new(i as i32, 2),
                effects: catalog.effects(*kind).unwrap(),
                riparian: false,
            })
            .collect();
        Census::of(&buildings)
    }

    fn view<'a>(indicators: &'a IndicatorSet, census: &'a Census) -> ChallengeView<'a> {
        ChallengeView {
            indicators,
            census,
            population_per_house: 4,
        }
    }

    #[test]
    fn first_matching_challenge_wins() {
        let census = census_of(&[BuildingKind::SustainableHouse; 3]);
        let indicators = IndicatorSet {
            energy_balance: -12.0,
            water_quality: 40.0,
            air_quality: 55.0,
            population: 12,
            ..IndicatorSet::INITIAL
        };
        let (board, events) = ChallengeBoard::default().evaluate(&view(&indicators, &census));
        assert_eq!(board.active, Some(ChallengeId::Energy));
        assert_eq!(events, vec![ChallengeEvent::Activated(ChallengeId::Energy)]);
    }

    #[test]
    fn acknowledged_challenge_is_skipped_until_next_month() {
        let census = census_of(&[BuildingKind::SustainableHouse; 3]);
        let indicators = IndicatorSet {
            energy_balance: -12.0,
            population: 12,
            ..IndicatorSet::INITIAL
        };
        let (board, _) = ChallengeBoard::default().evaluate(&view(&indicators, &census));
        let (dismissed, id) = board.dismiss().unwrap();
        assert_eq!(id, ChallengeId::Energy);

        let (still_quiet, events) = dismissed.evaluate(&view(&indicators, &census));
        assert!(still_quiet.active.is_none());
        assert!(events.is_empty());

        let (again, _) = dismissed
            .month_advanced(1)
            .evaluate(&view(&indicators, &census));
        assert_eq!(again.active, Some(ChallengeId::Energy));
    }

    #[test]
    fn completion_records_id_once_and_frees_slot() {
        let census = census_of(&[BuildingKind::WasteCollection]);
        let indicators = IndicatorSet::INITIAL;
        let board = ChallengeBoard {
            active: Some(ChallengeId::WasteManagement),
            ..ChallengeBoard::default()
        };
        let (done, events) = board.evaluate(&view(&indicators, &census));
        assert_eq!(done.active, None);
        assert_eq!(done.completed, vec![ChallengeId::WasteManagement]);
        assert_eq!(
            events,
            vec![ChallengeEvent::Completed(ChallengeId::WasteManagement)]
        );
        assert!(done.activate(ChallengeId::WasteManagement).is_none());
    }

    #[test]
    fn happiness_never_triggers_by_itself() {
        let census = census_of(&[]);
        let indicators = IndicatorSet {
            community_happiness: 10.0,
            ..IndicatorSet::INITIAL
        };
        let (board, _) = ChallengeBoard::default().evaluate(&view(&indicators, &census));
        assert!(board.active.is_none());

        let forced = ChallengeBoard::default()
            .activate(ChallengeId::Happiness)
            .unwrap();
        assert_eq!(forced.active, Some(ChallengeId::Happiness));
    }

    #[test]
    fn every_id_maps_to_its_own_roster_entry() {
        for (position, challenge) in ROSTER.iter().enumerate() {
            assert_eq!(challenge.id.index(), position);
            assert_eq!(challenge.id.challenge().id, challenge.id);
        }
        assert_eq!(ChallengeId::WasteManagement.challenge().title, "Essential Waste Management!");
    }
}
