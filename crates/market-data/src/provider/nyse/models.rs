//! NYSE API request/response models.

use serde::{Deserialize, Serialize};

/// Body of the quote listing filter request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NyseFilterRequest<'a> {
    pub instrument_type: &'a str,
    pub page_number: u32,
    pub sort_column: &'a str,
    pub sort_order: &'a str,
    pub max_results_per_page: u32,
    pub filter_token: &'a str,
}

/// One listing returned by the filter endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NyseListing {
    pub symbol_ticker: Option<String>,
    pub normalized_ticker: Option<String>,
    pub symbol_exchange_ticker: Option<String>,
}

/// Daily chart response
#[derive(Debug, Deserialize)]
pub struct NyseChartResponse {
    #[serde(default)]
    pub data: Option<Vec<NyseChartBar>>,
}

#[derive(Debug, Deserialize)]
pub struct NyseChartBar {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}
