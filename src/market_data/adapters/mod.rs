// Shared trait for funding-rate sources

use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::market_data::types::FundingRate;

/// One external funding-rate venue.
///
/// Implementations drop records they cannot parse and report whole-source
/// failures as `Err`; the aggregator turns those into an empty contribution.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the current rates. Must stop issuing requests once `cancel` fires.
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<FundingRate>, SourceError>;
}

/// HTTP client shared by the adapters, with the per-request timeout applied.
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("funding-board/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Send `request` and return the status and body, giving up as soon as `cancel` fires.
pub(crate) async fn get_text(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<(u16, String), SourceError> {
    if cancel.is_cancelled() {
        return Err(SourceError::Cancelled);
    }
    let request = request.header(reqwest::header::ACCEPT, "application/json").send();
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(SourceError::Cancelled),
        res = request => res?,
    };
    let status = response.status().as_u16();
    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(SourceError::Cancelled),
        body = response.text() => body?,
    };
    Ok((status, body))
}

pub mod lighter;
pub mod lighter_types;
pub mod okx;
pub mod okx_types;
