pub mod catalog;
pub mod clock;
pub mod engine;
pub mod indicators;
pub mod planner;
pub mod scenario;
pub mod spatial;
pub mod systems;
pub mod tuning;
pub mod web;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, MonthReport};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{Command, SimError, SimulationState, WorldSnapshot};
