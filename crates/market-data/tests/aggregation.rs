mod common;

use rust_decimal_macros::dec;

use common::{bar, client, config, day, fixed_quote, MockAdapter, Reply};
use quotehub_market_data::errors::{FailureClass, MarketDataError};
use quotehub_market_data::{
    eligible_sources, ClientConfig, InstrumentInfo, Market, SkipReason, SourceId, SourceSelection,
};

#[test]
fn policy_orders_and_gates_sources() {
    let auto = SourceSelection::auto();
    assert_eq!(
        eligible_sources(Market::Usa, &auto),
        vec![
            SourceId::YFinance,
            SourceId::Nasdaq,
            SourceId::AlphaVantage,
            SourceId::Nyse
        ]
    );
    assert_eq!(
        eligible_sources(Market::India, &auto),
        vec![
            SourceId::YFinance,
            SourceId::Nse,
            SourceId::Bse,
            SourceId::AlphaVantage
        ]
    );

    let explicit = SourceSelection::parse(["nse", "yfinance"]).unwrap();
    assert_eq!(
        eligible_sources(Market::Usa, &explicit),
        vec![SourceId::YFinance]
    );
}

#[test]
fn unknown_market_or_source_fails_at_construction() {
    let err = ClientConfig::builder().market("uk").build().unwrap_err();
    assert_eq!(err.failure_class(), FailureClass::Configuration);

    let err = ClientConfig::builder()
        .market("usa")
        .sources(["reuters"])
        .build()
        .unwrap_err();
    assert!(matches!(err, MarketDataError::InvalidSource(_)));
}

#[tokio::test]
async fn falls_through_error_and_not_available_to_success() {
    let first = MockAdapter::new(SourceId::Nasdaq, Reply::Error);
    let second = MockAdapter::new(SourceId::Nyse, Reply::NotAvailable);
    let third = MockAdapter::new(SourceId::YFinance, Reply::Quote(fixed_quote(dec!(50), None)));
    let fourth = MockAdapter::new(
        SourceId::AlphaVantage,
        Reply::Quote(fixed_quote(dec!(99), None)),
    );
    let client = client(
        config("usa", &["nasdaq", "nyse", "yfinance", "alphavantage"]),
        &[first.clone(), second.clone(), third.clone(), fourth.clone()],
    );

    let (result, diagnostics) = client
        .get_live_price_with_diagnostics("AAPL")
        .await
        .unwrap();

    let sourced = result.unwrap();
    assert_eq!(sourced.source, SourceId::YFinance);
    assert_eq!(sourced.value.price, dec!(50));
    assert_eq!(
        (first.calls(), second.calls(), third.calls(), fourth.calls()),
        (1, 1, 1, 0)
    );
    assert_eq!(
        diagnostics.invoked(),
        vec![SourceId::Nasdaq, SourceId::Nyse, SourceId::YFinance]
    );
}

#[tokio::test]
async fn exhaustion_is_unavailable_not_an_error() {
    let yahoo = MockAdapter::new(SourceId::YFinance, Reply::Error);
    let nse = MockAdapter::new(SourceId::Nse, Reply::NotAvailable);
    let bse = MockAdapter::new(SourceId::Bse, Reply::Error);
    let client = client(config("india", &[]), &[yahoo, nse, bse]);

    assert_eq!(client.get_live_price("INFY").await.unwrap(), None);
    assert_eq!(
        client
            .get_historical_prices("INFY", "2024-01-01", "2024-01-31")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn repeated_calls_give_the_same_answer() {
    let nasdaq = MockAdapter::new(SourceId::Nasdaq, Reply::NotAvailable);
    let nyse = MockAdapter::new(
        SourceId::Nyse,
        Reply::Quote(fixed_quote(dec!(412.1), Some(dec!(-0.35)))),
    );
    let client = client(config("usa", &["nasdaq", "nyse"]), &[nasdaq, nyse]);

    let first = client.get_live_price("BRK.B").await.unwrap();
    let second = client.get_live_price("BRK.B").await.unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn historical_series_is_filtered_sorted_and_deduplicated() {
    let nse = MockAdapter::new(
        SourceId::Nse,
        Reply::Records(vec![
            bar(10, dec!(10)),
            bar(2, dec!(2)),
            bar(31, dec!(31)),
            bar(5, dec!(5)),
            bar(5, dec!(55)),
            bar(1, dec!(1)),
        ]),
    );
    let client = client(config("india", &["nse"]), &[nse]);

    // dates in reverse order on purpose
    let series = client
        .get_historical_prices("TCS", "2024-01-10", "2024-01-02")
        .await
        .unwrap()
        .unwrap();

    let dates: Vec<_> = series.records().iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![day(2), day(5), day(10)]);
    assert_eq!(series.records()[1].close, dec!(55));
}

#[tokio::test]
async fn historical_outside_range_falls_through() {
    let yahoo = MockAdapter::new(SourceId::YFinance, Reply::Records(vec![bar(20, dec!(1))]));
    let nse = MockAdapter::new(SourceId::Nse, Reply::Records(vec![bar(3, dec!(3))]));
    let client = client(config("india", &[]), &[yahoo.clone(), nse.clone()]);

    let (result, diagnostics) = client
        .get_historical_prices_with_diagnostics("TCS", "2024-01-01", "2024-01-05")
        .await
        .unwrap();

    assert_eq!(result.unwrap().source, SourceId::Nse);
    assert_eq!(yahoo.calls(), 1);
    assert!(diagnostics.summary().contains("yfinance: NOT_AVAILABLE"));
}

#[tokio::test]
async fn credential_gated_source_is_never_invoked_without_key() {
    let alpha = MockAdapter::gated(
        SourceId::AlphaVantage,
        "QUOTEHUB_IT_ALPHA_KEY_NEVER_SET",
        Reply::Quote(fixed_quote(dec!(10), None)),
    );
    let client = client(config("usa", &["alphavantage"]), &[alpha.clone()]);

    let (result, diagnostics) = client
        .get_live_price_with_diagnostics("IBM")
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(alpha.calls(), 0);
    assert_eq!(
        diagnostics.skip_reasons(),
        vec![(SourceId::AlphaVantage, &SkipReason::MissingCredential)]
    );
}

#[tokio::test]
async fn explicit_key_reaches_the_adapter() {
    let alpha = MockAdapter::gated(
        SourceId::AlphaVantage,
        "QUOTEHUB_IT_ALPHA_KEY_NEVER_SET",
        Reply::Quote(fixed_quote(dec!(10), None)),
    );
    let config = ClientConfig::builder()
        .market("usa")
        .sources(["alphavantage"])
        .alpha_vantage_api_key("demo-key")
        .build()
        .unwrap();
    let client = client(config, &[alpha.clone()]);

    assert!(client.get_live_price("IBM").await.unwrap().is_some());
    assert_eq!(alpha.calls(), 1);
    assert_eq!(alpha.seen_credential().as_deref(), Some("demo-key"));
}

#[tokio::test]
async fn sources_outside_the_market_are_never_invoked() {
    let quote = Reply::Quote(fixed_quote(dec!(1), None));
    let nasdaq = MockAdapter::new(SourceId::Nasdaq, quote.clone());
    let nyse = MockAdapter::new(SourceId::Nyse, quote.clone());
    let nse = MockAdapter::new(SourceId::Nse, quote.clone());
    let bse = MockAdapter::new(SourceId::Bse, quote);
    let adapters = [nasdaq.clone(), nyse.clone(), nse.clone(), bse.clone()];

    let india = client(config("india", &["nasdaq", "nyse", "bse"]), &adapters);
    let (result, _) = india.get_live_price_with_diagnostics("SBIN").await.unwrap();
    assert_eq!(result.unwrap().source, SourceId::Bse);
    assert_eq!((nasdaq.calls(), nyse.calls(), bse.calls()), (0, 0, 1));

    let usa = client(config("usa", &["nse", "bse"]), &adapters);
    assert_eq!(usa.get_live_price("SBIN").await.unwrap(), None);
    assert_eq!((nse.calls(), bse.calls()), (0, 1));
}

#[tokio::test]
async fn explicit_foreign_source_is_dropped_before_the_local_one() {
    let nse = MockAdapter::new(SourceId::Nse, Reply::Quote(fixed_quote(dec!(7), None)));
    let yahoo = MockAdapter::new(SourceId::YFinance, Reply::Quote(fixed_quote(dec!(190), None)));
    let client = client(config("usa", &["nse", "yfinance"]), &[nse.clone(), yahoo.clone()]);

    let (result, diagnostics) = client
        .get_live_price_with_diagnostics("AAPL")
        .await
        .unwrap();

    let sourced = result.unwrap();
    assert_eq!(sourced.source, SourceId::YFinance);
    assert_eq!(sourced.value.price, dec!(190));
    assert_eq!((nse.calls(), yahoo.calls()), (0, 1));
    assert_eq!(diagnostics.invoked(), vec![SourceId::YFinance]);
}

#[tokio::test]
async fn live_quote_is_returned_unmodified() {
    let quote = fixed_quote(dec!(2874.35), Some(dec!(1.27)));
    let yahoo = MockAdapter::new(SourceId::YFinance, Reply::Quote(quote.clone()));
    let client = client(config("india", &[]), &[yahoo]);

    assert_eq!(client.get_live_price("RELIANCE").await.unwrap(), Some(quote));
}

#[tokio::test]
async fn unknown_change_stays_unknown() {
    let yahoo = MockAdapter::new(SourceId::YFinance, Reply::Quote(fixed_quote(dec!(5), None)));
    let client = client(config("usa", &[]), &[yahoo]);

    let quote = client.get_live_price("XYZ").await.unwrap().unwrap();
    assert_eq!(quote.change_percent, None);
}

#[tokio::test]
async fn instrument_info_comes_from_first_capable_source() {
    let yahoo = MockAdapter::new(
        SourceId::YFinance,
        Reply::Info(InstrumentInfo::new("AAPL").name("Apple Inc.")),
    );
    let client = client(config("usa", &[]), &[yahoo]);

    let info = client.get_instrument_info("aapl").await.unwrap().unwrap();
    assert_eq!(info.name.as_deref(), Some("Apple Inc."));
    assert_eq!(info.source.as_deref(), Some("yfinance"));
}

#[tokio::test]
async fn malformed_arguments_are_errors() {
    let client = client(config("usa", &[]), &[]);

    let err = client.get_live_price("  ").await.unwrap_err();
    assert_eq!(err.failure_class(), FailureClass::Validation);

    let err = client
        .get_historical_prices("AAPL", "yesterday", "2024-01-01")
        .await
        .unwrap_err();
    assert_eq!(err.failure_class(), FailureClass::Validation);
}
