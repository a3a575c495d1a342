// Source: GET https://mainnet.zklighter.elliot.ai/api/v1/funding-rates
#[derive(Debug, serde::Deserialize)]
pub struct FundingRatesResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    // Entries stay raw so one malformed record only drops itself.
    #[serde(default)]
    pub funding_rates: Option<Vec<serde_json::Value>>,
}

// One venue's rate as relayed by Lighter; `exchange` is a lowercase venue name.
#[derive(Debug, serde::Deserialize)]
pub struct LighterFundingRate {
    #[serde(default)]
    pub market_id: u64,
    pub exchange: String,
    pub symbol: String,
    pub rate: f64,
}
