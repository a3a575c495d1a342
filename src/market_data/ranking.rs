// Spread and carry opportunity rankers over the pivot matrix.

use tracing::instrument;

use crate::market_data::types::{ArbitrageOpportunity, CarryOpportunity, Exchange, PivotRow};

/// Length of every opportunity list.
pub const TOP_N: usize = 10;

/// Label of the spot leg; no spot venue is modelled.
pub const SPOT_LEG: &str = "Spot";

// Ties keep the first-encountered cell.
fn min_cell(row: &PivotRow) -> Option<(Exchange, f64)> {
    row.cells
        .iter()
        .map(|(ex, v)| (*ex, *v))
        .reduce(|best, next| if next.1 < best.1 { next } else { best })
}

fn max_cell(row: &PivotRow) -> Option<(Exchange, f64)> {
    row.cells
        .iter()
        .map(|(ex, v)| (*ex, *v))
        .reduce(|best, next| if next.1 > best.1 { next } else { best })
}

/// Cross-exchange spreads: long the cheapest venue, short the richest.
///
/// Rows need at least two reporting exchanges. Sorted by `diff` descending
/// (stable, so equal spreads keep pivot order), ranked from 1, truncated to [`TOP_N`].
#[instrument(level = "debug", skip_all, fields(rows = rows.len()))]
pub fn rank_spreads(rows: &[PivotRow]) -> Vec<ArbitrageOpportunity> {
    let mut found: Vec<ArbitrageOpportunity> = rows
        .iter()
        .filter(|row| row.cells.len() >= 2)
        .filter_map(|row| {
            let (long, lo) = min_cell(row)?;
            let (short, hi) = max_cell(row)?;
            Some(ArbitrageOpportunity { symbol: row.symbol.clone(), diff: hi - lo, long, short, rank: 0 })
        })
        .collect();

    found.sort_by(|a, b| b.diff.total_cmp(&a.diff));
    found.truncate(TOP_N);
    for (i, opp) in found.iter_mut().enumerate() {
        opp.rank = i + 1;
    }
    found
}

/// Delta-neutral carry: buy spot, short the perp on the venue paying the most.
///
/// Emitted only when that venue's rate is strictly positive.
#[instrument(level = "debug", skip_all, fields(rows = rows.len()))]
pub fn rank_carry(rows: &[PivotRow]) -> Vec<CarryOpportunity> {
    let mut found: Vec<CarryOpportunity> = rows
        .iter()
        .filter_map(|row| {
            let (short_perp, carry) = max_cell(row)?;
            (carry > 0.0).then(|| CarryOpportunity {
                symbol: row.symbol.clone(),
                carry,
                long_spot: SPOT_LEG,
                short_perp,
                rank: 0,
            })
        })
        .collect();

    found.sort_by(|a, b| b.carry.total_cmp(&a.carry));
    found.truncate(TOP_N);
    for (i, opp) in found.iter_mut().enumerate() {
        opp.rank = i + 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(symbol: &str, cells: &[(Exchange, f64)]) -> PivotRow {
        PivotRow { symbol: symbol.to_string(), cells: cells.iter().copied().collect::<BTreeMap<_, _>>() }
    }

    #[test]
    fn spread_longs_min_and_shorts_max() {
        let rows = vec![row("BTC", &[(Exchange::Binance, 0.0002), (Exchange::Okx, -0.0001)])];
        let opps = rank_spreads(&rows);
        assert_eq!(opps.len(), 1);
        assert!((opps[0].diff - 0.0003).abs() < 1e-12);
        assert_eq!(opps[0].long, Exchange::Okx);
        assert_eq!(opps[0].short, Exchange::Binance);
        assert_eq!(opps[0].rank, 1);
    }

    #[test]
    fn single_cell_row_is_carry_only() {
        let rows = vec![row("SOL", &[(Exchange::Okx, 0.0004)])];
        assert!(rank_spreads(&rows).is_empty());
        let carry = rank_carry(&rows);
        assert_eq!(carry.len(), 1);
        assert_eq!(carry[0].short_perp, Exchange::Okx);
        assert_eq!(carry[0].long_spot, "Spot");
        assert_eq!(carry[0].carry, 0.0004);
    }

    #[test]
    fn carry_needs_strictly_positive_max() {
        let rows = vec![
            row("ZERO", &[(Exchange::Okx, 0.0), (Exchange::Bybit, -0.1)]),
            row("NEG", &[(Exchange::Binance, -0.0001)]),
            row("POS", &[(Exchange::Binance, -0.0001), (Exchange::Lighter, 0.0002)]),
        ];
        let carry = rank_carry(&rows);
        assert_eq!(carry.len(), 1);
        assert_eq!(carry[0].symbol, "POS");
        assert_eq!(carry[0].short_perp, Exchange::Lighter);
    }

    #[test]
    fn ties_keep_first_encountered_exchange() {
        let rows = vec![row(
            "FLAT",
            &[(Exchange::Binance, 0.1), (Exchange::Bybit, 0.1), (Exchange::Okx, 0.1)],
        )];
        let spread = rank_spreads(&rows);
        assert_eq!(spread[0].diff, 0.0);
        assert_eq!(spread[0].long, Exchange::Binance);
        assert_eq!(spread[0].short, Exchange::Binance);
        assert_eq!(rank_carry(&rows)[0].short_perp, Exchange::Binance);
    }

    #[test]
    fn sorted_ranked_and_truncated() {
        let rows: Vec<PivotRow> = (0..15)
            .map(|i| {
                let spread = i as f64 * 0.001;
                row(&format!("S{i:02}"), &[(Exchange::Binance, spread), (Exchange::Okx, 0.0)])
            })
            .collect();

        let spreads = rank_spreads(&rows);
        assert_eq!(spreads.len(), TOP_N);
        assert_eq!(spreads[0].symbol, "S14");
        assert_eq!(spreads[9].symbol, "S05");
        for (i, opp) in spreads.iter().enumerate() {
            assert_eq!(opp.rank, i + 1);
        }
        assert!(spreads.windows(2).all(|w| w[0].diff >= w[1].diff));

        let carry = rank_carry(&rows);
        // S00 has max 0.0 and is excluded; 14 remain before truncation.
        assert_eq!(carry.len(), TOP_N);
        assert_eq!(carry[0].symbol, "S14");
    }

    #[test]
    fn equal_diffs_keep_row_order() {
        let rows = vec![
            row("AAA", &[(Exchange::Binance, 0.5), (Exchange::Okx, 0.25)]),
            row("BBB", &[(Exchange::Binance, 0.75), (Exchange::Okx, 0.5)]),
        ];
        let spreads = rank_spreads(&rows);
        assert_eq!(spreads[0].symbol, "AAA");
        assert_eq!(spreads[1].symbol, "BBB");
    }

    #[test]
    fn empty_pivot_yields_nothing() {
        assert!(rank_spreads(&[]).is_empty());
        assert!(rank_carry(&[]).is_empty());
    }
}
