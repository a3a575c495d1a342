// Merge every source's rates for one cycle.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::error::{CycleError, SourceError};
use crate::market_data::adapters::lighter::LighterAdapter;
use crate::market_data::adapters::okx::OkxAdapter;
use crate::market_data::adapters::{http_client, RateSource};
use crate::market_data::normaliser::SymbolNormaliser;
use crate::market_data::types::FundingRate;

/// Rates gathered in one cycle plus the sources that contributed nothing.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub rates: Vec<FundingRate>,
    pub failed_sources: Vec<String>,
}

pub struct Aggregator {
    sources: Vec<Arc<dyn RateSource>>,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn RateSource>>) -> Self {
        Self { sources }
    }

    /// Build the enabled adapters, sharing one HTTP client.
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        let client = http_client(settings.http.timeout())?;
        let mut sources: Vec<Arc<dyn RateSource>> = Vec::new();

        let lighter = &settings.sources.lighter;
        if lighter.enabled {
            sources.push(Arc::new(LighterAdapter::new(client.clone(), &lighter.base_url)));
        }
        let okx = &settings.sources.okx;
        if okx.enabled {
            sources.push(Arc::new(OkxAdapter::new(
                client,
                &okx.base_url,
                okx.instruments.clone(),
                okx.concurrency,
                SymbolNormaliser::new(settings.normaliser.thousand_unit_assets.iter().cloned()),
            )));
        }
        Ok(Self::new(sources))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch every source concurrently and concatenate the results in source order.
    ///
    /// A failed source contributes nothing. Only when every source fails is
    /// the cycle an error.
    #[instrument(skip_all, fields(sources = self.sources.len()))]
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<Aggregate, CycleError> {
        if self.sources.is_empty() {
            return Err(CycleError::NoSources);
        }

        let outcomes = join_all(
            self.sources.iter().map(|source| async move { (source.name(), source.fetch(cancel).await) }),
        )
        .await;

        if cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }

        let mut aggregate = Aggregate::default();
        let mut failures = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(mut rates) => aggregate.rates.append(&mut rates),
                Err(e) => {
                    warn!(source = name, error = %e, "source unavailable this cycle");
                    metrics::counter!("funding_board_source_failures_total", "source" => name).increment(1);
                    aggregate.failed_sources.push(name.to_string());
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if failures.len() == self.sources.len() {
            return Err(CycleError::AllSourcesFailed { failures });
        }
        info!(
            records = aggregate.rates.len(),
            failed = aggregate.failed_sources.len(),
            "aggregated funding rates"
        );
        Ok(aggregate)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market_data::types::Exchange;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source for pipeline and scheduler tests.
    pub(crate) struct FakeSource {
        pub name: &'static str,
        pub rates: Vec<FundingRate>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn ok(name: &'static str, rates: Vec<FundingRate>) -> Arc<Self> {
            Arc::new(Self { name, rates, fail: false, calls: AtomicUsize::new(0) })
        }

        pub fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, rates: vec![], fail: true, calls: AtomicUsize::new(0) })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RateSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<FundingRate>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            if self.fail {
                return Err(SourceError::Status(502));
            }
            Ok(self.rates.clone())
        }
    }

    fn lighter_rates() -> Vec<FundingRate> {
        vec![
            FundingRate::new(Exchange::Binance, "BTC", 0.0001),
            FundingRate::new(Exchange::Bybit, "BTC", 0.00012),
        ]
    }

    fn okx_rates() -> Vec<FundingRate> {
        vec![FundingRate::new(Exchange::Okx, "BTC", -0.0002)]
    }

    #[tokio::test]
    async fn concatenates_in_source_order_without_dedup() {
        let agg = Aggregator::new(vec![
            FakeSource::ok("lighter", lighter_rates()),
            FakeSource::ok("okx", okx_rates()),
        ]);
        let out = agg.collect(&CancellationToken::new()).await.unwrap();
        let mut expected = lighter_rates();
        expected.extend(okx_rates());
        assert_eq!(out.rates, expected);
        assert!(out.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn partial_failure_keeps_remaining_sources() {
        let agg = Aggregator::new(vec![FakeSource::failing("lighter"), FakeSource::ok("okx", okx_rates())]);
        let out = agg.collect(&CancellationToken::new()).await.unwrap();
        assert_eq!(out.rates, okx_rates());
        assert_eq!(out.failed_sources, vec!["lighter"]);
    }

    #[tokio::test]
    async fn every_source_failing_fails_the_cycle() {
        let agg = Aggregator::new(vec![FakeSource::failing("lighter"), FakeSource::failing("okx")]);
        match agg.collect(&CancellationToken::new()).await {
            Err(CycleError::AllSourcesFailed { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_success_is_still_success() {
        let agg = Aggregator::new(vec![FakeSource::ok("okx", vec![])]);
        let out = agg.collect(&CancellationToken::new()).await.unwrap();
        assert!(out.rates.is_empty());
    }

    #[tokio::test]
    async fn no_sources_is_an_error() {
        let agg = Aggregator::new(vec![]);
        assert!(matches!(agg.collect(&CancellationToken::new()).await, Err(CycleError::NoSources)));
    }

    #[tokio::test]
    async fn cancellation_is_reported_as_such() {
        let agg = Aggregator::new(vec![FakeSource::ok("okx", okx_rates())]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(agg.collect(&cancel).await, Err(CycleError::Cancelled)));
    }

    #[test]
    fn settings_select_enabled_sources() {
        let mut settings = Settings::default();
        assert_eq!(Aggregator::from_settings(&settings).unwrap().source_names(), vec!["lighter", "okx"]);
        settings.sources.lighter.enabled = false;
        assert_eq!(Aggregator::from_settings(&settings).unwrap().source_names(), vec!["okx"]);
    }
}
