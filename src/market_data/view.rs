// Full pipeline from raw rates to what the presentation layer shows.

use serde::Serialize;
use tracing::instrument;

use crate::market_data::horizon::{scale, Horizon};
use crate::market_data::pivot::{build_pivot, filter_symbol, sort_by_column, ColumnSort};
use crate::market_data::ranking::{rank_carry, rank_spreads};
use crate::market_data::stats::MarketStats;
use crate::market_data::types::{ArbitrageOpportunity, CarryOpportunity, FundingRate, PivotRow};

/// Everything the view depends on, passed per call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    pub horizon: Horizon,
    pub symbol: Option<String>,
    pub sort: Option<ColumnSort>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub horizon: Horizon,
    pub rows: Vec<PivotRow>,
    pub arbitrage: Vec<ArbitrageOpportunity>,
    pub carry: Vec<CarryOpportunity>,
    pub stats: MarketStats,
}

/// Scale, pivot, rank and summarise `rates`.
///
/// Rankers and stats always see the full pivot; only `rows` honours the
/// symbol filter and column sort.
#[instrument(level = "debug", skip(rates), fields(records = rates.len()))]
pub fn build_view(rates: &[FundingRate], opts: &ViewOptions) -> DashboardView {
    let scaled = scale(rates, opts.horizon);
    let pivot = build_pivot(&scaled);
    let arbitrage = rank_spreads(&pivot);
    let carry = rank_carry(&pivot);
    let stats = MarketStats::compute(&scaled, &pivot, &arbitrage);

    let mut rows = match &opts.symbol {
        Some(symbol) => filter_symbol(pivot, symbol),
        None => pivot,
    };
    if let Some(sort) = opts.sort {
        rows = sort_by_column(rows, sort);
    }

    DashboardView { horizon: opts.horizon, rows, arbitrage, carry, stats }
}
