//! Serialized access to the simulation state.
//!
//! The engine holds the current [`SimulationState`] behind a single mutex as
//! an `Arc`. A transition locks, computes the next state from the current
//! one and swaps the pointer, so readers always see a whole month or a whole
//! placement and never a partial update.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::catalog::{BuildingKind, Catalog};
use crate::indicators::IndicatorSet;
use crate::spatial::{GridCell, RiverPath};
use crate::systems::ChallengeId;
use crate::tuning::Tuning;
use crate::world::{
    Command, Event, Ruleset, RulesetError, SimError, SimulationState, WorldSnapshot,
};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scenario_name: String,
    /// Whether an open challenge holds the clock the same way a blocking
    /// interaction does.
    pub challenges_block_clock: bool,
    pub report_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scenario_name: "unnamed".to_string(),
            challenges_block_clock: true,
            report_capacity: 256,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    tuning: Tuning,
    catalog: Catalog,
    river: RiverPath,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            tuning: Tuning::default(),
            catalog: Catalog::standard(),
            river: RiverPath::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_river(mut self, river: RiverPath) -> Self {
        self.river = river;
        self
    }

    pub fn build(self) -> Result<Engine, RulesetError> {
        let rules = Ruleset::new(self.tuning, self.catalog, self.river)?;
        Ok(Engine::new(self.settings, rules))
    }
}

/// Summary of one applied month, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthReport {
    pub scenario: String,
    pub month: u64,
    pub indicators: IndicatorSet,
    pub buildings: usize,
    pub available: Vec<BuildingKind>,
    pub unlocked_terrain: u32,
    pub active_challenge: Option<ChallengeId>,
    pub events: Vec<Event>,
}

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct Applied {
    pub state: Arc<SimulationState>,
    pub events: Vec<Event>,
}

pub struct Engine {
    settings: EngineSettings,
    rules: Ruleset,
    state: Mutex<Arc<SimulationState>>,
    blockers: AtomicUsize,
    paused: AtomicBool,
    reports: broadcast::Sender<MonthReport>,
}

impl Engine {
    pub fn new(settings: EngineSettings, rules: Ruleset) -> Self {
        let (reports, _) = broadcast::channel(settings.report_capacity.max(1));
        let initial = SimulationState::new(&rules);
        Self {
            settings,
            rules,
            state: Mutex::new(Arc::new(initial)),
            blockers: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            reports,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Current state. The returned value never changes underneath the caller.
    pub fn state(&self) -> Arc<SimulationState> {
        self.lock().clone()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.state().snapshot(&self.rules)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonthReport> {
        self.reports.subscribe()
    }

    /// Applies one command as a single serialized transition. Rejected
    /// commands leave the state untouched.
    pub fn apply(&self, command: Command) -> Result<Applied, SimError> {
        let mut guard = self.lock();
        self.apply_locked(&mut guard, &command)
    }

    /// Places a building, classifying it as riparian from the river path.
    pub fn place(&self, kind: BuildingKind, cell: GridCell) -> Result<Applied, SimError> {
        let riparian = self.rules.is_riparian(kind, cell);
        self.apply(Command::Place {
            kind,
            cell,
            riparian,
        })
    }

    pub fn dismiss_challenge(&self) -> Result<Applied, SimError> {
        self.apply(Command::DismissChallenge)
    }

    pub fn activate_challenge(&self, challenge: ChallengeId) -> Result<Applied, SimError> {
        self.apply(Command::ActivateChallenge { challenge })
    }

    /// Advances one month regardless of blocking interactions.
    pub fn advance_month(&self) -> Result<MonthReport, SimError> {
        let applied = self.apply(Command::AdvanceMonth)?;
        Ok(self.publish(&applied))
    }

    /// Clock entry point: advances one month unless something is blocking,
    /// in which case the tick is dropped.
    ///
    /// The open challenge is checked under the same lock as the month
    /// transition, so a placement that raises a challenge cannot slip in
    /// between the check and the advance.
    pub fn tick(&self) -> Result<Option<MonthReport>, SimError> {
        if self.is_held() {
            debug!("tick skipped while blocked");
            return Ok(None);
        }
        let mut guard = self.lock();
        if self.challenge_holds(&guard) {
            debug!("tick skipped while a challenge is open");
            return Ok(None);
        }
        let applied = self.apply_locked(&mut guard, &Command::AdvanceMonth)?;
        drop(guard);
        Ok(Some(self.publish(&applied)))
    }

    /// Runs `months` months back to back, ignoring blocking interactions.
    pub fn run(&self, months: u64) -> Result<Vec<MonthReport>, SimError> {
        (0..months).map(|_| self.advance_month()).collect()
    }

    /// Holds the clock until the returned guard is dropped.
    pub fn block(&self) -> BlockingGuard<'_> {
        self.blockers.fetch_add(1, Ordering::SeqCst);
        BlockingGuard { engine: self }
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("clock paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("clock resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_blocked(&self) -> bool {
        self.is_held() || self.challenge_holds(&self.state())
    }

    fn is_held(&self) -> bool {
        self.is_paused() || self.blockers.load(Ordering::SeqCst) > 0
    }

    fn challenge_holds(&self, state: &SimulationState) -> bool {
        self.settings.challenges_block_clock && state.active_challenge().is_some()
    }

    fn apply_locked(
        &self,
        guard: &mut MutexGuard<'_, Arc<SimulationState>>,
        command: &Command,
    ) -> Result<Applied, SimError> {
        let transition = match guard.apply(&self.rules, command) {
            Ok(transition) => transition,
            Err(err) if err.is_fatal() => {
                warn!(error = %err, ?command, "fatal simulation error");
                return Err(err);
            }
            Err(err) => {
                debug!(error = %err, ?command, "command rejected");
                return Err(err);
            }
        };
        let state = Arc::new(transition.state);
        **guard = state.clone();

        for event in &transition.events {
            debug!(?event, "simulation event");
        }
        Ok(Applied {
            state,
            events: transition.events,
        })
    }

    fn publish(&self, applied: &Applied) -> MonthReport {
        let report = self.report(applied);
        info!(
            month = report.month,
            population = report.indicators.population,
            air = report.indicators.air_quality,
            water = report.indicators.water_quality,
            happiness = report.indicators.community_happiness,
            "month resolved"
        );
        // No subscribers is fine.
        let _ = self.reports.send(report.clone());
        report
    }

    fn report(&self, applied: &Applied) -> MonthReport {
        let state = &applied.state;
        MonthReport {
            scenario: self.settings.scenario_name.clone(),
            month: state.month(),
            indicators: *state.indicators(),
            buildings: state.buildings().len(),
            available: state.available().to_vec(),
            unlocked_terrain: state.unlocked_terrain(),
            active_challenge: state.active_challenge(),
            events: applied.events.clone(),
        }
    }

    // The state behind the lock is always a complete value, so a panic
    // elsewhere cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, Arc<SimulationState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the clock from advancing while alive.
#[must_use = "the clock resumes as soon as the guard is dropped"]
pub struct BlockingGuard<'a> {
    engine: &'a Engine,
}

impl Drop for BlockingGuard<'_> {
    fn drop(&mut self) {
        self.engine.blockers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PlacementRejection;

    fn engine() -> Engine {
        EngineBuilder::new(EngineSettings::default()).build().unwrap()
    }

    #[test]
    fn guards_block_until_dropped() {
        let engine = engine();
        let outer = engine.block();
        let inner = engine.block();
        assert!(engine.is_blocked());
        drop(outer);
        assert!(engine.is_blocked());
        drop(inner);
        assert!(!engine.is_blocked());
    }

    #[test]
    fn blocked_tick_is_dropped_not_queued() {
        let engine = engine();
        {
            let _guard = engine.block();
            assert_eq!(engine.tick().unwrap(), None);
            assert_eq!(engine.tick().unwrap(), None);
        }
        let report = engine.tick().unwrap().unwrap();
        assert_eq!(report.month, 1);
        assert_eq!(engine.state().month(), 1);
    }

    #[test]
    fn tick_leaves_the_month_alone_once_a_placement_opens_a_challenge() {
        let engine = engine();
        for x in 0..3 {
            engine
                .place(BuildingKind::CommunityGarden, GridCell::new(x, 0))
                .unwrap();
        }
        let before = engine.state();
        assert_eq!(before.active_challenge(), Some(ChallengeId::Energy));

        assert_eq!(engine.tick().unwrap(), None);
        assert!(Arc::ptr_eq(&before, &engine.state()));

        engine.dismiss_challenge().unwrap();
        let report = engine.tick().unwrap().unwrap();
        assert_eq!(report.month, 1);
    }

    #[test]
    fn ticks_racing_placements_never_advance_past_an_open_challenge() {
        let engine = engine();
        let mut reports = engine.subscribe();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for x in 0..6 {
                    let _ = engine.place(BuildingKind::CommunityGarden, GridCell::new(x, 1));
                }
            });
            scope.spawn(|| {
                for _ in 0..50 {
                    let _ = engine.tick();
                }
            });
        });

        // Once a challenge opens nothing dismisses it here, so the clock
        // must not have moved after the first report that carried it.
        let mut opened = false;
        while let Ok(report) = reports.try_recv() {
            assert!(!opened, "month {} advanced over an open challenge", report.month);
            opened = report.active_challenge.is_some();
        }
        let state = engine.state();
        if state.active_challenge().is_some() {
            assert_eq!(engine.tick().unwrap(), None);
        }
    }

    #[test]
    fn pause_and_resume_toggle_blocking() {
        let engine = engine();
        engine.pause();
        assert!(engine.is_blocked());
        engine.resume();
        assert!(!engine.is_blocked());
    }

    #[test]
    fn active_challenge_blocks_only_when_configured() {
        let engine = engine();
        engine.activate_challenge(ChallengeId::Happiness).unwrap();
        assert!(engine.is_blocked());

        let settings = EngineSettings {
            challenges_block_clock: false,
            ..EngineSettings::default()
        };
        let relaxed = EngineBuilder::new(settings).build().unwrap();
        relaxed.activate_challenge(ChallengeId::Happiness).unwrap();
        assert!(!relaxed.is_blocked());
    }

    #[test]
    fn rejected_placement_keeps_the_same_state_pointer() {
        let engine = engine();
        let before = engine.state();
        let err = engine
            .place(BuildingKind::SustainableHouse, GridCell::new(0, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Rejected(PlacementRejection::InsufficientEnergy { .. })
        ));
        assert!(Arc::ptr_eq(&before, &engine.state()));
    }

    #[test]
    fn run_broadcasts_each_month() {
        let engine = engine();
        let mut reports = engine.subscribe();
        let months = engine.run(3).unwrap();
        assert_eq!(months.len(), 3);
        for expected in 1..=3 {
            assert_eq!(reports.try_recv().unwrap().month, expected);
        }
    }

    #[test]
    fn invalid_tuning_fails_the_build() {
        let mut tuning = Tuning::default();
        tuning.population.per_house = 0;
        let result = EngineBuilder::new(EngineSettings::default())
            .with_tuning(tuning)
            .build();
        assert!(result.is_err());
    }
}
