use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of structures a player can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    SustainableHouse,
    CommunityGarden,
    SolarPanelArray,
    WaterTreatment,
    WasteCollection,
    ReforestationArea,
    CommunityCenter,
    School,
    HealthPost,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 9] = [
        BuildingKind::SustainableHouse,
        BuildingKind::CommunityGarden,
        BuildingKind::SolarPanelArray,
        BuildingKind::WaterTreatment,
        BuildingKind::WasteCollection,
        BuildingKind::ReforestationArea,
        BuildingKind::CommunityCenter,
        BuildingKind::School,
        BuildingKind::HealthPost,
    ];

    /// Kinds offered before any progression unlock.
    pub const INITIALLY_AVAILABLE: [BuildingKind; 3] = [
        BuildingKind::SustainableHouse,
        BuildingKind::CommunityGarden,
        BuildingKind::SolarPanelArray,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            BuildingKind::SustainableHouse => "sustainable_house",
            BuildingKind::CommunityGarden => "community_garden",
            BuildingKind::SolarPanelArray => "solar_panel_array",
            BuildingKind::WaterTreatment => "water_treatment",
            BuildingKind::WasteCollection => "waste_collection",
            BuildingKind::ReforestationArea => "reforestation_area",
            BuildingKind::CommunityCenter => "community_center",
            BuildingKind::School => "school",
            BuildingKind::HealthPost => "health_post",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Per-building deltas. Missing fields contribute nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectBundle {
    pub air_quality: Option<f64>,
    pub water_quality: Option<f64>,
    pub community_happiness: Option<f64>,
    pub biodiversity: Option<f64>,
    /// Positive when the building generates energy, negative when it consumes.
    pub energy: Option<f64>,
    pub food: Option<f64>,
}

impl EffectBundle {
    /// Energy the building draws from the balance, zero for generators.
    pub fn energy_cost(&self) -> f64 {
        match self.energy {
            Some(energy) if energy < 0.0 => -energy,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub effects: EffectBundle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("building kind '{0}' has no catalog entry")]
    UnknownBuildingKind(BuildingKind),
}

struct StandardEntry {
    kind: BuildingKind,
    name: &'static str,
    description: &'static str,
    effects: EffectBundle,
}

const fn effects(
    air_quality: Option<f64>,
    water_quality: Option<f64>,
    community_happiness: Option<f64>,
    biodiversity: Option<f64>,
    energy: Option<f64>,
    food: Option<f64>,
) -> EffectBundle {
    EffectBundle {
        air_quality,
        water_quality,
        community_happiness,
        biodiversity,
        energy,
        food,
    }
}

const STANDARD_CATALOG: &[StandardEntry] = &[
    StandardEntry {
        kind: BuildingKind::SustainableHouse,
        name: "Sustainable House",
        description: "Low-impact housing for four residents.",
        effects: effects(None, None, Some(2.0), None, Some(-4.0), None),
    },
    StandardEntry {
        kind: BuildingKind::CommunityGarden,
        name: "Community Garden",
        description: "Grows fresh food locally and supports biodiversity.",
        effects: effects(None, Some(1.0), Some(3.0), Some(2.0), None, Some(10.0)),
    },
    StandardEntry {
        kind: BuildingKind::SolarPanelArray,
        name: "Solar Panel Array",
        description: "Clean energy generation.",
        effects: effects(Some(2.0), None, None, None, Some(15.0), None),
    },
    StandardEntry {
        kind: BuildingKind::WaterTreatment,
        name: "Water Treatment Station",
        description: "Purifies water for reuse and protects aquatic ecosystems.",
        effects: effects(None, Some(20.0), None, None, Some(-2.0), None),
    },
    StandardEntry {
        kind: BuildingKind::WasteCollection,
        name: "Recycling Center",
        description: "Handles waste, recycling and composting.",
        effects: effects(Some(4.0), Some(4.0), Some(2.0), None, Some(-2.0), None),
    },
    StandardEntry {
        kind: BuildingKind::ReforestationArea,
        name: "Reforestation Area",
        description: "Native trees; extra water benefit when planted along the river.",
        effects: effects(Some(7.0), Some(5.0), Some(3.0), Some(18.0), None, None),
    },
    StandardEntry {
        kind: BuildingKind::CommunityCenter,
        name: "Community Center",
        description: "Meeting space for learning and culture.",
        effects: effects(None, None, Some(10.0), None, Some(-1.0), None),
    },
    StandardEntry {
        kind: BuildingKind::School,
        name: "School",
        description: "Education for the settlement.",
        effects: effects(None, None, Some(8.0), None, Some(-2.0), None),
    },
    StandardEntry {
        kind: BuildingKind::HealthPost,
        name: "Health Post",
        description: "Basic health care for residents.",
        effects: effects(None, None, Some(10.0), None, Some(-2.0), None),
    },
];

/// Static mapping from building kind to its effects. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    entries: HashMap<BuildingKind, CatalogEntry>,
}

impl Catalog {
    pub fn standard() -> Self {
        let entries = STANDARD_CATALOG
            .iter()
            .map(|entry| {
                (
                    entry.kind,
                    CatalogEntry {
                        name: entry.name.to_string(),
                        description: entry.description.to_string(),
                        effects: entry.effects,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Builds a catalog from arbitrary entries. Kinds without an entry fail
    /// lookups with [`CatalogError::UnknownBuildingKind`].
    pub fn from_entries(entries: impl IntoIterator<Item = (BuildingKind, CatalogEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Replaces the effects (and optionally text) of individual kinds.
    pub fn with_overrides(
        mut self,
        overrides: impl IntoIterator<Item = (BuildingKind, CatalogOverride)>,
    ) -> Self {
        for (kind, patch) in overrides {
            let entry = self.entries.entry(kind).or_insert_with(|| CatalogEntry {
                name: kind.slug().to_string(),
                description: String::new(),
                effects: EffectBundle::default(),
            });
            if let Some(name) = patch.name {
                entry.name = name;
            }
            if let Some(description) = patch.description {
                entry.description = description;
            }
            if let Some(effects) = patch.effects {
                entry.effects = effects;
            }
        }
        self
    }

    pub fn entry(&self, kind: BuildingKind) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(&kind)
            .ok_or(CatalogError::UnknownBuildingKind(kind))
    }

    pub fn effects(&self, kind: BuildingKind) -> Result<EffectBundle, CatalogError> {
        self.entry(kind).map(|entry| entry.effects)
    }

    /// Fails on the first kind of the closed enumeration without an entry.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for kind in BuildingKind::ALL {
            self.entry(kind)?;
        }
        Ok(())
    }

    /// Entries in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (BuildingKind, &CatalogEntry)> {
        BuildingKind::ALL
            .into_iter()
            .filter_map(|kind| self.entries.get(&kind).map(|entry| (kind, entry)))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Partial catalog entry as written in a scenario file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogOverride {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub effects: Option<EffectBundle>,
}
