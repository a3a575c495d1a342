use serde::Serialize;

use crate::market_data::types::{ArbitrageOpportunity, PivotRow, ScaledFundingRate};

/// Headline numbers for the current snapshot at the selected horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub total_markets: usize,
    pub avg_rate: f64, // mean scaled rate over every record, 0.0 when empty
    pub max_spread: f64,
    pub positive: usize,
    pub negative: usize,
}

impl MarketStats {
    pub fn compute(
        scaled: &[ScaledFundingRate],
        pivot: &[PivotRow],
        arbitrage: &[ArbitrageOpportunity],
    ) -> Self {
        let sum: f64 = scaled.iter().map(|r| r.scaled).sum();
        let avg_rate = if scaled.is_empty() { 0.0 } else { sum / scaled.len() as f64 };

        Self {
            total_markets: pivot.len(),
            avg_rate,
            max_spread: arbitrage.first().map(|opp| opp.diff).unwrap_or(0.0),
            positive: scaled.iter().filter(|r| r.scaled > 0.0).count(),
            negative: scaled.iter().filter(|r| r.scaled < 0.0).count(),
        }
    }
}
