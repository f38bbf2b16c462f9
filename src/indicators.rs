//! Indicator levels tracked for the settlement and the month-by-month history.

use serde::{Deserialize, Serialize};

/// Lower bound for the bounded indicators.
pub const MIN_INDICATOR_VALUE: f64 = 0.0;
/// Upper bound for the bounded indicators.
pub const MAX_INDICATOR_VALUE: f64 = 100.0;

/// The seven sustainability metrics computed every resolution cycle.
///
/// Air, water, happiness, biodiversity and food live in
/// `[MIN_INDICATOR_VALUE, MAX_INDICATOR_VALUE]`. Energy balance has a wider
/// symmetric range and may be negative. Population is derived from the house
/// count and never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSet {
    pub air_quality: f64,
    pub water_quality: f64,
    pub community_happiness: f64,
    pub biodiversity: f64,
    pub energy_balance: f64,
    pub food_supply: f64,
    pub population: u32,
}

impl IndicatorSet {
    pub const INITIAL: IndicatorSet = IndicatorSet {
        air_quality: 70.0,
        water_quality: 70.0,
        community_happiness: 60.0,
        biodiversity: 50.0,
        energy_balance: 0.0,
        food_supply: 30.0,
        population: 0,
    };

    pub fn get(&self, indicator: Indicator) -> f64 {
        match indicator {
            Indicator::AirQuality => self.air_quality,
            Indicator::WaterQuality => self.water_quality,
            Indicator::CommunityHappiness => self.community_happiness,
            Indicator::Biodiversity => self.biodiversity,
            Indicator::EnergyBalance => self.energy_balance,
            Indicator::FoodSupply => self.food_supply,
            Indicator::Population => self.population as f64,
        }
    }

    /// Clamps the bounded indicators to `[min, max]` and energy to
    /// `[-energy_limit, energy_limit]`. Population is left alone.
    pub fn clamp(&mut self, min: f64, max: f64, energy_limit: f64) {
        self.air_quality = self.air_quality.clamp(min, max);
        self.water_quality = self.water_quality.clamp(min, max);
        self.community_happiness = self.community_happiness.clamp(min, max);
        self.biodiversity = self.biodiversity.clamp(min, max);
        self.food_supply = self.food_supply.clamp(min, max);
        self.energy_balance = self.energy_balance.clamp(-energy_limit, energy_limit);
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Key for one of the seven indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    AirQuality,
    WaterQuality,
    CommunityHappiness,
    Biodiversity,
    EnergyBalance,
    FoodSupply,
    Population,
}

impl Indicator {
    pub const ALL: [Indicator; 7] = [
        Indicator::AirQuality,
        Indicator::WaterQuality,
        Indicator::CommunityHappiness,
        Indicator::Biodiversity,
        Indicator::EnergyBalance,
        Indicator::FoodSupply,
        Indicator::Population,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Indicator::AirQuality => "air quality",
            Indicator::WaterQuality => "water quality",
            Indicator::CommunityHappiness => "community happiness",
            Indicator::Biodiversity => "biodiversity",
            Indicator::EnergyBalance => "energy balance",
            Indicator::FoodSupply => "food supply",
            Indicator::Population => "population",
        }
    }
}

/// Indicator levels recorded for one month. Month 0 is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricDataPoint {
    pub month: u64,
    pub indicators: IndicatorSet,
}

impl HistoricDataPoint {
    pub fn initial() -> Self {
        Self {
            month: 0,
            indicators: IndicatorSet::INITIAL,
        }
    }
}

/// Returns the last `window` points when the history is long enough.
pub fn trailing(history: &[HistoricDataPoint], window: usize) -> Option<&[HistoricDataPoint]> {
    if window == 0 || history.len() < window {
        None
    } else {
        Some(&history[history.len() - window..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_leaves_population_untouched() {
        let mut set = IndicatorSet {
            air_quality: -12.0,
            water_quality: 140.0,
            community_happiness: 50.0,
            biodiversity: 101.0,
            energy_balance: -2_500.0,
            food_supply: -0.5,
            population: 400,
        };
        set.clamp(MIN_INDICATOR_VALUE, MAX_INDICATOR_VALUE, 1_000.0);

        assert_eq!(set.air_quality, 0.0);
        assert_eq!(set.water_quality, 100.0);
        assert_eq!(set.community_happiness, 50.0);
        assert_eq!(set.biodiversity, 100.0);
        assert_eq!(set.energy_balance, -1_000.0);
        assert_eq!(set.food_supply, 0.0);
        assert_eq!(set.population, 400);
    }

    #[test]
    fn trailing_requires_full_window() {
        let history = vec![HistoricDataPoint::initial(); 2];
        assert!(trailing(&history, 3).is_none());
        assert_eq!(trailing(&history, 2).map(|w| w.len()), Some(2));
        assert!(trailing(&history, 0).is_none());
    }
}
