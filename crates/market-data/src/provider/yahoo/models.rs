//! Wire shapes of the Yahoo `quoteSummary` endpoint.
//!
//! Only the `price`, `summaryProfile` and `summaryDetail` modules are requested.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEnvelope {
    pub quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
pub struct SummaryBody {
    #[serde(default)]
    pub result: Option<Vec<SummaryModules>>,
    #[serde(default)]
    pub error: Option<SummaryError>,
}

impl SummaryBody {
    /// The first result, if Yahoo returned any.
    pub fn into_first(self) -> Option<SummaryModules> {
        self.result.and_then(|r| r.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryModules {
    pub price: Option<PriceModule>,
    pub summary_profile: Option<ProfileModule>,
    pub summary_detail: Option<DetailModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceModule {
    pub currency: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub exchange_name: Option<String>,
    pub market_cap: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileModule {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub long_business_summary: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub full_time_employees: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailModule {
    pub market_cap: Option<RawNumber>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<RawNumber>,
    pub dividend_yield: Option<RawNumber>,
    pub fifty_two_week_high: Option<RawNumber>,
    pub fifty_two_week_low: Option<RawNumber>,
}

/// `{"raw": 1.5, "fmt": "1.50"}`, or `{}` when Yahoo has no value.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RawNumber {
    raw: Option<f64>,
}

impl RawNumber {
    pub fn value(field: Option<&RawNumber>) -> Option<f64> {
        field.and_then(|n| n.raw).filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_number_null_and_empty() {
        let null: RawNumber = serde_json::from_str(r#"{"raw": null, "fmt": null}"#).unwrap();
        let empty: RawNumber = serde_json::from_str("{}").unwrap();
        assert_eq!(RawNumber::value(Some(&null)), None);
        assert_eq!(RawNumber::value(Some(&empty)), None);
        assert_eq!(RawNumber::value(None), None);
    }

    #[test]
    fn test_detail_module_with_gaps() {
        let json = r#"{
            "marketCap": {"raw": 15500000000000, "fmt": "15.5T"},
            "trailingPE": {"raw": 31.2, "fmt": "31.20"},
            "dividendYield": {},
            "fiftyTwoWeekHigh": {"raw": 4254.75, "fmt": "4,254.75"}
        }"#;
        let detail: DetailModule = serde_json::from_str(json).unwrap();
        assert_eq!(
            RawNumber::value(detail.market_cap.as_ref()),
            Some(15_500_000_000_000.0)
        );
        assert_eq!(RawNumber::value(detail.trailing_pe.as_ref()), Some(31.2));
        assert_eq!(RawNumber::value(detail.dividend_yield.as_ref()), None);
        assert!(detail.fifty_two_week_low.is_none());
    }

    #[test]
    fn test_not_found_body_has_no_result() {
        let json = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for symbol: XXXX"}}}"#;
        let envelope: SummaryEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(
            envelope.quote_summary.error.as_ref().and_then(|e| e.code.as_deref()),
            Some("Not Found")
        );
        assert!(envelope.quote_summary.into_first().is_none());
    }
}
