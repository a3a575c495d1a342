use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// Venues we know how to display. Declaration order is the cell order of a pivot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Bybit,
    Hyperliquid,
    Lighter,
    Okx,
}

impl Exchange {
    pub const ALL: [Exchange; 5] = [
        Exchange::Binance,
        Exchange::Bybit,
        Exchange::Hyperliquid,
        Exchange::Lighter,
        Exchange::Okx,
    ];

    /// Wire name, as used by the venues' APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Bybit => "bybit",
            Exchange::Hyperliquid => "hyperliquid",
            Exchange::Lighter => "lighter",
            Exchange::Okx => "okx",
        }
    }

    /// Human readable label for tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            Exchange::Binance => "Binance",
            Exchange::Bybit => "Bybit",
            Exchange::Hyperliquid => "Hyperliquid",
            Exchange::Lighter => "Lighter",
            Exchange::Okx => "OKX",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Exchange::ALL
            .into_iter()
            .find(|ex| ex.as_str() == lowered)
            .ok_or_else(|| ParseError::UnknownExchange(s.to_string()))
    }
}

// One venue's funding rate for one asset, native to the venue's funding interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingRate {
    pub exchange: Exchange,
    pub symbol: String,
    pub rate: f64,
    pub market_id: u64, // 0 when the venue exposes none
}

impl FundingRate {
    pub fn new(exchange: Exchange, symbol: impl Into<String>, rate: f64) -> Self {
        Self { exchange, symbol: symbol.into(), rate, market_id: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledFundingRate {
    #[serde(flatten)]
    pub rate: FundingRate,
    pub scaled: f64,
}

/// Scaled rates of one canonical symbol, keyed by reporting exchange.
///
/// Only exchanges that reported the symbol this cycle have a cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub symbol: String,
    pub cells: BTreeMap<Exchange, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub symbol: String,
    pub diff: f64,
    pub long: Exchange,  // lowest scaled rate
    pub short: Exchange, // highest scaled rate
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarryOpportunity {
    pub symbol: String,
    pub carry: f64,
    pub long_spot: &'static str,
    pub short_perp: Exchange,
    pub rank: usize,
}
