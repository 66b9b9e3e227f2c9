//! Nasdaq API response models.

use serde::Deserialize;

/// `/api/quote/{symbol}/info` response
#[derive(Debug, Deserialize)]
pub struct NasdaqInfoResponse {
    pub data: Option<NasdaqInfoData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NasdaqInfoData {
    pub primary_data: Option<NasdaqTradeData>,
    /// After-hours or pre-market quote, when the session is closed.
    pub secondary_data: Option<NasdaqTradeData>,
}

/// One price block; all values are display strings such as `"$182.52"`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NasdaqTradeData {
    pub last_sale_price: Option<String>,
    pub net_change: Option<String>,
    pub percentage_change: Option<String>,
    pub last_trade_timestamp: Option<String>,
}

/// `/api/quote/{symbol}/historical` response
#[derive(Debug, Deserialize)]
pub struct NasdaqHistoricalResponse {
    pub data: Option<NasdaqHistoricalData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NasdaqHistoricalData {
    pub trades_table: Option<NasdaqTradesTable>,
}

#[derive(Debug, Deserialize)]
pub struct NasdaqTradesTable {
    pub rows: Option<Vec<NasdaqHistoricalRow>>,
}

#[derive(Debug, Deserialize)]
pub struct NasdaqHistoricalRow {
    pub date: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
}
