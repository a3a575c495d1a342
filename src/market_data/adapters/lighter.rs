// Lighter adapter: one batch request relays rates for several venues.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::lighter_types::{FundingRatesResponse, LighterFundingRate};
use super::{get_text, RateSource};
use crate::error::SourceError;
use crate::market_data::types::{Exchange, FundingRate};

const SUCCESS_CODE: i64 = 200;

pub struct LighterAdapter {
    client: reqwest::Client,
    url: String, // "{base}/api/v1/funding-rates"
}

impl LighterAdapter {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self { client, url: format!("{}/api/v1/funding-rates", base_url.trim_end_matches('/')) }
    }
}

/// Decode one response. Symbols are already canonical and pass through.
pub fn decode_funding_rates(status: u16, body: &str) -> Result<Vec<FundingRate>, SourceError> {
    if !(200..300).contains(&status) {
        return Err(SourceError::Status(status));
    }
    let response: FundingRatesResponse = serde_json::from_str(body)?;
    if response.code != SUCCESS_CODE {
        debug!(code = response.code, message = ?response.message, "lighter rejected request");
        return Err(SourceError::ApiCode(response.code.to_string()));
    }

    Ok(response.funding_rates.unwrap_or_default().into_iter().filter_map(to_rate).collect())
}

fn to_rate(entry: serde_json::Value) -> Option<FundingRate> {
    let raw: LighterFundingRate = match serde_json::from_value(entry) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "dropping unparsable rate entry");
            return None;
        }
    };
    let exchange = match raw.exchange.parse::<Exchange>() {
        Ok(ex) => ex,
        Err(e) => {
            debug!(symbol = %raw.symbol, error = %e, "dropping rate");
            return None;
        }
    };
    if raw.symbol.is_empty() || !raw.rate.is_finite() {
        debug!(%exchange, symbol = %raw.symbol, rate = raw.rate, "dropping malformed rate");
        return None;
    }
    Some(FundingRate { exchange, symbol: raw.symbol, rate: raw.rate, market_id: raw.market_id })
}

#[async_trait::async_trait]
impl RateSource for LighterAdapter {
    fn name(&self) -> &'static str {
        "lighter"
    }

    #[instrument(name = "lighter_fetch", skip_all)]
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<FundingRate>, SourceError> {
        let (status, body) = get_text(self.client.get(&self.url), cancel).await?;
        let rates = decode_funding_rates(status, &body)?;
        info!(count = rates.len(), "fetched lighter funding rates");
        Ok(rates)
    }
}
