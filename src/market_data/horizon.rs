use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ParseError;
use crate::market_data::types::{FundingRate, ScaledFundingRate};

/// Window a per-interval funding rate is extrapolated over.
///
/// Venues settle every 8 hours, so each horizon is an integer number of
/// funding intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Horizon {
    #[default]
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "180d")]
    HalfYear,
    #[serde(rename = "1y")]
    OneYear,
}

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::EightHours,
        Horizon::OneDay,
        Horizon::SevenDays,
        Horizon::ThirtyDays,
        Horizon::HalfYear,
        Horizon::OneYear,
    ];

    /// Number of 8h funding intervals in the horizon.
    pub fn multiplier(&self) -> f64 {
        match self {
            Horizon::EightHours => 1.0,
            Horizon::OneDay => 3.0,
            Horizon::SevenDays => 21.0,
            Horizon::ThirtyDays => 90.0,
            Horizon::HalfYear => 540.0,
            Horizon::OneYear => 1095.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::EightHours => "8h",
            Horizon::OneDay => "1d",
            Horizon::SevenDays => "7d",
            Horizon::ThirtyDays => "30d",
            Horizon::HalfYear => "180d",
            Horizon::OneYear => "1y",
        }
    }

    pub fn apply(&self, rate: f64) -> f64 {
        rate * self.multiplier()
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Horizon {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Horizon::ALL
            .into_iter()
            .find(|h| h.label() == wanted)
            .ok_or_else(|| ParseError::UnknownHorizon(s.to_string()))
    }
}

/// Rescale every rate to `horizon`. Output has the same length and order as the input.
pub fn scale(rates: &[FundingRate], horizon: Horizon) -> Vec<ScaledFundingRate> {
    rates
        .iter()
        .map(|r| ScaledFundingRate { rate: r.clone(), scaled: horizon.apply(r.rate) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::Exchange;
    use proptest::prelude::*;

    #[test]
    fn multipliers_are_exact() {
        let expected = [1.0, 3.0, 21.0, 90.0, 540.0, 1095.0];
        for (h, m) in Horizon::ALL.iter().zip(expected) {
            assert_eq!(h.multiplier(), m, "{h}");
        }
    }

    #[test]
    fn labels_parse_back() {
        for h in Horizon::ALL {
            assert_eq!(h.label().parse::<Horizon>(), Ok(h));
        }
        assert_eq!("1Y".parse::<Horizon>(), Ok(Horizon::OneYear));
        assert!("2d".parse::<Horizon>().is_err());
    }

    #[test]
    fn scale_keeps_native_rate() {
        let rates = vec![
            FundingRate::new(Exchange::Binance, "BTC", 0.0001),
            FundingRate::new(Exchange::Okx, "BTC", -0.0002),
        ];
        let scaled = scale(&rates, Horizon::OneDay);
        assert_eq!(scaled.len(), 2);
        assert_eq!(scaled[0].rate.rate, 0.0001);
        assert_eq!(scaled[0].scaled, 0.0001 * 3.0);
        assert_eq!(scaled[1].scaled, -0.0002 * 3.0);
    }

    #[test]
    fn scale_of_nothing_is_nothing() {
        assert!(scale(&[], Horizon::OneYear).is_empty());
    }

    proptest! {
        #[test]
        fn scaled_is_rate_times_multiplier(rate in -1.0f64..1.0, idx in 0usize..6) {
            let h = Horizon::ALL[idx];
            let rates = vec![FundingRate::new(Exchange::Lighter, "ETH", rate)];
            let scaled = scale(&rates, h);
            prop_assert_eq!(scaled.len(), 1);
            prop_assert_eq!(scaled[0].scaled, rate * h.multiplier());
            prop_assert!(scaled[0].scaled.is_finite());
        }
    }
}
