use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    catalog::{BuildingKind, Catalog, CatalogOverride},
    clock::DEFAULT_MONTH_DURATION,
    engine::{Engine, EngineBuilder, EngineSettings},
    planner::{Autoplay, Planner, PlannedBuilding},
    spatial::RiverPath,
    tuning::Tuning,
    world::{Ruleset, RulesetError},
};

fn default_month_duration_ms() -> u64 {
    DEFAULT_MONTH_DURATION.as_millis() as u64
}

fn default_challenges_block_clock() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_month_duration_ms")]
    pub month_duration_ms: u64,
    #[serde(default)]
    pub months: Option<u64>,
    #[serde(default = "default_challenges_block_clock")]
    pub challenges_block_clock: bool,
    #[serde(default)]
    pub tuning: Tuning,
    /// Per-kind replacements merged over the standard catalog.
    #[serde(default)]
    pub catalog: BTreeMap<BuildingKind, CatalogOverride>,
    #[serde(default)]
    pub river: RiverPath,
    #[serde(default)]
    pub build_order: Vec<PlannedBuilding>,
    #[serde(default)]
    pub autoplay: Option<Autoplay>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario name must not be empty")]
    EmptyName,
    #[error("month duration must be greater than zero")]
    ZeroMonthDuration,
    #[error("invalid rules: {0}")]
    Ruleset(#[from] RulesetError),
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        info!(scenario = %scenario.name, path = %path.display(), "scenario loaded");
        Ok(scenario)
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::EmptyName);
        }
        if self.month_duration_ms == 0 {
            return Err(ScenarioError::ZeroMonthDuration);
        }
        self.ruleset()?;
        Ok(())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::standard().with_overrides(
            self.catalog
                .iter()
                .map(|(kind, patch)| (*kind, patch.clone())),
        )
    }

    pub fn ruleset(&self) -> Result<Ruleset, RulesetError> {
        Ruleset::new(self.tuning.clone(), self.catalog(), self.river.clone())
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            challenges_block_clock: self.challenges_block_clock,
            ..EngineSettings::default()
        }
    }

    pub fn build_engine(&self) -> Result<Engine, ScenarioError> {
        let engine = EngineBuilder::new(self.settings())
            .with_tuning(self.tuning.clone())
            .with_catalog(self.catalog())
            .with_river(self.river.clone())
            .build()?;
        Ok(engine)
    }

    pub fn planner(&self, seed_override: Option<u64>) -> Planner {
        Planner::new(
            seed_override.unwrap_or(self.seed),
            self.build_order.clone(),
            self.autoplay.clone(),
        )
    }

    pub fn months(&self, override_months: Option<u64>) -> u64 {
        override_months.or(self.months).unwrap_or(24)
    }

    pub fn month_duration(&self, override_ms: Option<u64>) -> Duration {
        Duration::from_millis(override_ms.unwrap_or(self.month_duration_ms).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_takes_defaults() {
        let scenario: Scenario = serde_yaml::from_str("name: bare\n").unwrap();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.month_duration_ms, 7_000);
        assert_eq!(scenario.months(None), 24);
        assert_eq!(scenario.months(Some(3)), 3);
        assert!(scenario.challenges_block_clock);
        assert_eq!(scenario.catalog(), Catalog::standard());
    }

    #[test]
    fn catalog_overrides_replace_effects() {
        let yaml = r#"
name: windy
catalog:
  solar_panel_array:
    effects:
      energy: 25
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        let solar = scenario
            .catalog()
            .effects(BuildingKind::SolarPanelArray)
            .unwrap();
        assert_eq!(solar.energy, Some(25.0));
        assert_eq!(solar.air_quality, None);
    }

    #[test]
    fn broken_tuning_is_rejected() {
        let yaml = "name: broken\ntuning:\n  progression:\n    terrain_unlock_threshold: 0\n";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::Ruleset(RulesetError::Tuning(_)))
        ));
    }
}
