// Source: GET https://www.okx.com/api/v5/public/funding-rate?instId=<id>
#[derive(Debug, serde::Deserialize)]
pub struct FundingRateResponse {
    pub code: String, // "0" on success
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Vec<OkxFundingRate>>,
}

#[derive(Debug, serde::Deserialize)]
pub struct OkxFundingRate {
    #[serde(rename = "instId")]
    pub inst_id: String,
    #[serde(rename = "fundingRate")]
    pub funding_rate: String, // decimal string, e.g. "0.0001"
}
