// OKX adapter: one request per perpetual swap instrument.

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::okx_types::FundingRateResponse;
use super::{get_text, RateSource};
use crate::error::SourceError;
use crate::market_data::normaliser::SymbolNormaliser;
use crate::market_data::types::{Exchange, FundingRate};

/// Assets polled by default, each as a `<ASSET>-USDT-SWAP` perpetual.
pub const DEFAULT_ASSETS: [&str; 46] = [
    "AAVE", "ADA", "AI", "APT", "AVAX", "BERA", "BNB", "BTC", "CRV", "DOGE", "DOT", "ENA",
    "ETH", "FARTCOIN", "HYPE", "IP", "JUP", "KAITO", "LINK", "LTC", "MKR", "NEAR", "ONDO",
    "PENDLE", "POL", "POPCAT", "PUMP", "S", "SEI", "SOL", "SPX", "SUI", "SYRUP", "TAO", "TON",
    "TRUMP", "TRX", "UNI", "VIRTUAL", "WIF", "WLD", "XRP", "BONK", "FLOKI", "PEPE", "SHIB",
];

const SUCCESS_CODE: &str = "0";

pub fn default_instruments() -> Vec<String> {
    DEFAULT_ASSETS.iter().map(|asset| format!("{asset}-USDT-SWAP")).collect()
}

pub struct OkxAdapter {
    client: reqwest::Client,
    endpoint: String, // "{base}/api/v5/public/funding-rate"
    instruments: Vec<String>,
    concurrency: usize,
    normaliser: SymbolNormaliser,
}

impl OkxAdapter {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        instruments: Vec<String>,
        concurrency: usize,
        normaliser: SymbolNormaliser,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/v5/public/funding-rate", base_url.trim_end_matches('/')),
            instruments,
            concurrency: concurrency.max(1),
            normaliser,
        }
    }

    fn request_for(&self, inst_id: &str) -> reqwest::RequestBuilder {
        self.client.get(&self.endpoint).query(&[("instId", inst_id)])
    }

    async fn fetch_instrument(
        &self,
        inst_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<FundingRate>, SourceError> {
        let (status, body) = get_text(self.request_for(inst_id), cancel).await?;
        decode_funding_rate(status, &body, &self.normaliser)
    }
}

/// Decode one instrument's response; only the first entry of `data` is used.
///
/// `Ok(None)` means the venue had nothing usable for this instrument.
pub fn decode_funding_rate(
    status: u16,
    body: &str,
    normaliser: &SymbolNormaliser,
) -> Result<Option<FundingRate>, SourceError> {
    if !(200..300).contains(&status) {
        return Err(SourceError::Status(status));
    }
    let response: FundingRateResponse = serde_json::from_str(body)?;
    if response.code != SUCCESS_CODE {
        debug!(code = %response.code, msg = %response.msg, "okx rejected request");
        return Err(SourceError::ApiCode(response.code));
    }

    let Some(entry) = response.data.and_then(|data| data.into_iter().next()) else {
        return Ok(None);
    };
    let rate = match entry.funding_rate.trim().parse::<f64>() {
        Ok(rate) if rate.is_finite() => rate,
        _ => {
            debug!(inst_id = %entry.inst_id, raw = %entry.funding_rate, "unparsable funding rate");
            return Ok(None);
        }
    };
    let Some(symbol) = normaliser.canonical(&entry.inst_id) else {
        debug!(inst_id = %entry.inst_id, "unrecognised instrument id");
        return Ok(None);
    };
    Ok(Some(FundingRate::new(Exchange::Okx, symbol, rate)))
}

#[async_trait::async_trait]
impl RateSource for OkxAdapter {
    fn name(&self) -> &'static str {
        "okx"
    }

    #[instrument(name = "okx_fetch", skip_all, fields(instruments = self.instruments.len()))]
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<FundingRate>, SourceError> {
        // `buffered` keeps configured order while requests overlap.
        let results: Vec<(String, Result<Option<FundingRate>, SourceError>)> =
            stream::iter(self.instruments.iter().cloned())
                .map(|inst_id| async move {
                    let result = self.fetch_instrument(&inst_id, cancel).await;
                    (inst_id, result)
                })
                .buffered(self.concurrency)
                .take_until(cancel.cancelled())
                .collect()
                .await;

        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let mut rates = Vec::with_capacity(results.len());
        let mut failed = 0usize;
        for (inst_id, result) in results {
            match result {
                Ok(Some(rate)) => rates.push(rate),
                Ok(None) => debug!(%inst_id, "no funding rate returned"),
                Err(e) => {
                    failed += 1;
                    warn!(%inst_id, error = %e, "okx instrument request failed");
                }
            }
        }

        if failed > 0 && failed == self.instruments.len() {
            return Err(SourceError::Exhausted { failed });
        }
        info!(count = rates.len(), failed, "fetched okx funding rates");
        Ok(rates)
    }
}
