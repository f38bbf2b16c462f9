//! Headless player: a scripted build order followed by optional seeded
//! random placements.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::BuildingKind;
use crate::engine::{Engine, MonthReport};
use crate::spatial::GridCell;
use crate::world::{PlacementRejection, SimError};

/// One scripted placement. It is attempted once the month index reaches
/// `month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedBuilding {
    pub kind: BuildingKind,
    pub x: i32,
    pub z: i32,
    #[serde(default)]
    pub month: u64,
}

impl PlannedBuilding {
    pub fn cell(&self) -> GridCell {
        GridCell::new(self.x, self.z)
    }
}

/// Failed attempts after which a scripted placement is dropped so the rest
/// of the build order can go ahead.
pub const DEFAULT_MAX_DEFERRALS: u32 = 6;

fn default_placements_per_month() -> u32 {
    1
}

fn default_energy_reserve() -> f64 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autoplay {
    #[serde(default = "default_placements_per_month")]
    pub placements_per_month: u32,
    /// Below this balance the planner builds solar arrays first.
    #[serde(default = "default_energy_reserve")]
    pub energy_reserve: f64,
    /// Dismiss challenges as soon as they open.
    #[serde(default)]
    pub dismiss_challenges: bool,
}

impl Default for Autoplay {
    fn default() -> Self {
        Self {
            placements_per_month: default_placements_per_month(),
            energy_reserve: default_energy_reserve(),
            dismiss_challenges: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaySummary {
    pub months: u64,
    pub placed: usize,
    pub rejected: usize,
    /// Scripted placements given up on after too many deferrals.
    pub abandoned: usize,
    pub reports: Vec<MonthReport>,
}

pub struct Planner {
    queue: VecDeque<PlannedBuilding>,
    autoplay: Option<Autoplay>,
    rng: ChaCha8Rng,
    max_deferrals: u32,
    /// Failed attempts of the entry at the front of the queue.
    deferrals: u32,
}

impl Planner {
    pub fn new(seed: u64, build_order: Vec<PlannedBuilding>, autoplay: Option<Autoplay>) -> Self {
        Self {
            queue: build_order.into(),
            autoplay,
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_deferrals: DEFAULT_MAX_DEFERRALS,
            deferrals: 0,
        }
    }

    pub fn with_max_deferrals(mut self, max_deferrals: u32) -> Self {
        self.max_deferrals = max_deferrals.max(1);
        self
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Plays `months` months: placements for the current month first, then
    /// the month tick. Recoverable rejections are counted, fatal errors stop
    /// the run.
    pub fn play(&mut self, engine: &Engine, months: u64) -> Result<PlaySummary, SimError> {
        let mut summary = PlaySummary::default();
        for _ in 0..months {
            self.place_scripted(engine, &mut summary)?;
            if self.queue.is_empty() {
                self.place_random(engine, &mut summary)?;
            }
            if self
                .autoplay
                .as_ref()
                .is_some_and(|autoplay| autoplay.dismiss_challenges)
            {
                engine.dismiss_challenge()?;
            }
            summary.reports.push(engine.advance_month()?);
            summary.months += 1;
        }
        info!(
            months = summary.months,
            placed = summary.placed,
            rejected = summary.rejected,
            "planner finished"
        );
        Ok(summary)
    }

    fn place_scripted(&mut self, engine: &Engine, summary: &mut PlaySummary) -> Result<(), SimError> {
        let month = engine.state().month();
        while let Some(next) = self.queue.front() {
            if next.month > month {
                break;
            }
            match engine.place(next.kind, next.cell()) {
                Ok(_) => {
                    summary.placed += 1;
                    self.advance_queue();
                }
                Err(SimError::Rejected(PlacementRejection::Occupied { cell, .. })) => {
                    warn!(kind = %next.kind, %cell, "scripted cell already occupied, skipping");
                    summary.rejected += 1;
                    self.advance_queue();
                }
                Err(SimError::Rejected(reason)) => {
                    summary.rejected += 1;
                    self.deferrals += 1;
                    if self.deferrals >= self.max_deferrals {
                        warn!(
                            kind = %next.kind,
                            %reason,
                            attempts = self.deferrals,
                            "scripted placement abandoned"
                        );
                        summary.abandoned += 1;
                        self.advance_queue();
                        continue;
                    }
                    // Locked, out of bounds and short on energy can all clear
                    // up in a later month.
                    debug!(kind = %next.kind, %reason, "scripted placement deferred");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn advance_queue(&mut self) {
        self.queue.pop_front();
        self.deferrals = 0;
    }

    fn place_random(&mut self, engine: &Engine, summary: &mut PlaySummary) -> Result<(), SimError> {
        let Some(autoplay) = self.autoplay.clone() else {
            return Ok(());
        };
        for _ in 0..autoplay.placements_per_month {
            let state = engine.state();
            let kind = if state.indicators().energy_balance < autoplay.energy_reserve {
                BuildingKind::SolarPanelArray
            } else {
                match state.available().choose(&mut self.rng) {
                    Some(kind) => *kind,
                    None => return Ok(()),
                }
            };
            let free: Vec<GridCell> = engine
                .rules()
                .terrain_bounds(state.unlocked_terrain())
                .cells()
                .filter(|cell| state.building_at(*cell).is_none())
                .collect();
            let Some(cell) = free.choose(&mut self.rng).copied() else {
                debug!("no free cell left");
                return Ok(());
            };

            match engine.place(kind, cell) {
                Ok(_) => summary.placed += 1,
                Err(SimError::Rejected(reason)) => {
                    debug!(%kind, %cell, %reason, "random placement rejected");
                    summary.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
