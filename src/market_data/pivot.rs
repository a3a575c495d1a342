// Reshape flat scaled rates into one row per canonical symbol.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::market_data::types::{Exchange, PivotRow, ScaledFundingRate};

/// Display order for symbols: case-insensitive, ties broken by raw bytes.
pub fn symbol_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Fold scaled rates into pivot rows sorted by [`symbol_order`].
///
/// Merge policy: if one `(symbol, exchange)` pair appears more than once,
/// the record processed last wins.
#[instrument(level = "debug", skip_all, fields(records = scaled.len()))]
pub fn build_pivot(scaled: &[ScaledFundingRate]) -> Vec<PivotRow> {
    let mut by_symbol: HashMap<&str, BTreeMap<Exchange, f64>> = HashMap::new();

    for r in scaled {
        let cells = by_symbol.entry(r.rate.symbol.as_str()).or_default();
        if let Some(prev) = cells.insert(r.rate.exchange, r.scaled) {
            debug!(symbol = %r.rate.symbol, exchange = %r.rate.exchange, prev, next = r.scaled, "duplicate rate overwritten");
        }
    }

    by_symbol
        .into_iter()
        .sorted_by(|(a, _), (b, _)| symbol_order(a, b))
        .map(|(symbol, cells)| PivotRow { symbol: symbol.to_string(), cells })
        .collect()
}

/// Keep only the row for `symbol`, if any.
pub fn filter_symbol(rows: Vec<PivotRow>, symbol: &str) -> Vec<PivotRow> {
    rows.into_iter().filter(|row| row.symbol == symbol).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort request on one exchange column of the pivot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSort {
    pub exchange: Exchange,
    pub direction: SortDirection,
}

impl ColumnSort {
    pub fn ascending(exchange: Exchange) -> Self {
        Self { exchange, direction: SortDirection::Ascending }
    }

    /// Next sort after clicking `exchange`: same column flips, new column starts ascending.
    pub fn toggle(current: Option<ColumnSort>, exchange: Exchange) -> ColumnSort {
        match current {
            Some(sort) if sort.exchange == exchange => ColumnSort {
                exchange,
                direction: match sort.direction {
                    SortDirection::Ascending => SortDirection::Descending,
                    SortDirection::Descending => SortDirection::Ascending,
                },
            },
            _ => ColumnSort::ascending(exchange),
        }
    }
}

/// Stable sort on one exchange's cell; rows without that cell rank as negative infinity.
pub fn sort_by_column(mut rows: Vec<PivotRow>, sort: ColumnSort) -> Vec<PivotRow> {
    let key = |row: &PivotRow| row.cells.get(&sort.exchange).copied().unwrap_or(f64::NEG_INFINITY);
    rows.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::horizon::{scale, Horizon};
    use crate::market_data::types::FundingRate;
    use proptest::prelude::*;

    fn scaled(ex: Exchange, symbol: &str, rate: f64) -> ScaledFundingRate {
        ScaledFundingRate { rate: FundingRate::new(ex, symbol, rate), scaled: rate }
    }

    #[test]
    fn one_row_per_symbol_sorted() {
        let rows = build_pivot(&[
            scaled(Exchange::Okx, "SOL", 0.3),
            scaled(Exchange::Binance, "BTC", 0.1),
            scaled(Exchange::Okx, "BTC", 0.2),
            scaled(Exchange::Lighter, "1000PEPE", 0.4),
        ]);
        let symbols: Vec<_> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["1000PEPE", "BTC", "SOL"]);
        assert_eq!(rows[1].cells.len(), 2);
        assert_eq!(rows[1].cells[&Exchange::Binance], 0.1);
        assert_eq!(rows[1].cells[&Exchange::Okx], 0.2);
    }

    #[test]
    fn no_zero_fill() {
        let rows = build_pivot(&[scaled(Exchange::Bybit, "ETH", 0.1)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells.len(), 1);
        assert!(!rows[0].cells.contains_key(&Exchange::Binance));
    }

    #[test]
    fn duplicate_pair_last_wins() {
        let rows = build_pivot(&[
            scaled(Exchange::Okx, "BTC", 0.1),
            scaled(Exchange::Binance, "BTC", 0.5),
            scaled(Exchange::Okx, "BTC", -0.2),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells[&Exchange::Okx], -0.2);
        assert_eq!(rows[0].cells[&Exchange::Binance], 0.5);
    }

    #[test]
    fn end_to_end_pivot_at_one_day() {
        let rates = vec![
            FundingRate::new(Exchange::Binance, "BTC", 0.0001),
            FundingRate::new(Exchange::Okx, "BTC", -0.0002),
        ];
        let rows = build_pivot(&scale(&rates, Horizon::OneDay));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells[&Exchange::Binance], 0.0001 * 3.0);
        assert_eq!(rows[0].cells[&Exchange::Okx], -0.0002 * 3.0);
    }

    #[test]
    fn symbol_order_ignores_case_first() {
        assert_eq!(symbol_order("abc", "ABD"), Ordering::Less);
        assert_eq!(symbol_order("BTC", "btc"), Ordering::Less);
        assert_eq!(symbol_order("1000PEPE", "AAVE"), Ordering::Less);
    }

    #[test]
    fn filter_keeps_selected_symbol() {
        let rows = build_pivot(&[
            scaled(Exchange::Okx, "SOL", 0.3),
            scaled(Exchange::Okx, "BTC", 0.2),
        ]);
        let only = filter_symbol(rows.clone(), "SOL");
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].symbol, "SOL");
        assert!(filter_symbol(rows, "DOGE").is_empty());
    }

    #[test]
    fn column_sort_puts_missing_cells_first_when_ascending() {
        let rows = build_pivot(&[
            scaled(Exchange::Okx, "AAA", 0.3),
            scaled(Exchange::Binance, "BBB", 0.1),
            scaled(Exchange::Okx, "CCC", -0.2),
        ]);
        let asc = sort_by_column(rows.clone(), ColumnSort::ascending(Exchange::Okx));
        let order: Vec<_> = asc.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["BBB", "CCC", "AAA"]);

        let desc = sort_by_column(
            rows,
            ColumnSort { exchange: Exchange::Okx, direction: SortDirection::Descending },
        );
        let order: Vec<_> = desc.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["AAA", "CCC", "BBB"]);
    }

    #[test]
    fn toggle_flips_same_column_and_resets_new_one() {
        let first = ColumnSort::toggle(None, Exchange::Okx);
        assert_eq!(first, ColumnSort::ascending(Exchange::Okx));
        let second = ColumnSort::toggle(Some(first), Exchange::Okx);
        assert_eq!(second.direction, SortDirection::Descending);
        let other = ColumnSort::toggle(Some(second), Exchange::Bybit);
        assert_eq!(other, ColumnSort::ascending(Exchange::Bybit));
    }

    fn arb_rate() -> impl Strategy<Value = ScaledFundingRate> {
        (0usize..5, "[A-E]{1,3}", -0.01f64..0.01)
            .prop_map(|(ex, sym, rate)| scaled(Exchange::ALL[ex], &sym, rate))
    }

    proptest! {
        #[test]
        fn pivot_is_injective_and_ordered(records in proptest::collection::vec(arb_rate(), 0..64)) {
            let rows = build_pivot(&records);
            for pair in rows.windows(2) {
                prop_assert_eq!(symbol_order(&pair[0].symbol, &pair[1].symbol), Ordering::Less);
            }
            let cells: usize = rows.iter().map(|r| r.cells.len()).sum();
            prop_assert!(cells <= records.len());
            for r in &records {
                let row = rows.iter().find(|row| row.symbol == r.rate.symbol);
                prop_assert!(row.is_some());
                prop_assert!(row.unwrap().cells.contains_key(&r.rate.exchange));
            }
        }
    }
}
