use std::collections::HashMap;

use crate::catalog::BuildingKind;
use crate::world::PlacedBuilding;

/// Count of placed buildings per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Census {
    counts: HashMap<BuildingKind, u32>,
    total: u32,
}

impl Census {
    pub fn of(buildings: &[PlacedBuilding]) -> Self {
        let mut census = Census::default();
        for building in buildings {
            *census.counts.entry(building.kind).or_insert(0) += 1;
            census.total += 1;
        }
        census
    }

    pub fn count(&self, kind: BuildingKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn has(&self, kind: BuildingKind) -> bool {
        self.count(kind) > 0
    }

    pub fn houses(&self) -> u32 {
        self.count(BuildingKind::SustainableHouse)
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}
