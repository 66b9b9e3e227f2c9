mod cli;
mod config;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quotehub_market_data::{ClientConfig, FetchDiagnostics, Sourced, StockPriceClient};

use cli::{Cli, Command};
use config::Config;

/// Exit status when no source had an answer.
const EXIT_UNAVAILABLE: u8 = 2;

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the JSON result
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn build_client(cli: &Cli, config: &Config) -> anyhow::Result<StockPriceClient> {
    let mut builder = ClientConfig::builder()
        .market(cli.market.as_str())
        .sources(cli.sources.iter().map(String::as_str))
        .adapter_timeout(
            cli.timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(config.adapter_timeout),
        );

    if let Some(deadline) = cli.resolve_deadline(config.resolve_timeout) {
        builder = builder.resolve_timeout(deadline);
    }
    if let Some(key) = &cli.api_key {
        builder = builder.alpha_vantage_api_key(key.as_str());
    }

    let client_config = builder.build().context("invalid configuration")?;
    Ok(StockPriceClient::new(client_config))
}

/// Print the result and report whether anything was found.
fn emit<T: Serialize>(
    result: Option<Sourced<T>>,
    diagnostics: FetchDiagnostics,
    with_diagnostics: bool,
) -> anyhow::Result<bool> {
    let found = result.is_some();
    let output = if with_diagnostics {
        json!({
            "source": result.as_ref().map(|r| r.source),
            "result": result.as_ref().map(|r| &r.value),
            "diagnostics": diagnostics,
            "summary": diagnostics.summary(),
        })
    } else {
        serde_json::to_value(result.map(|r| r.value))?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(found)
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<bool> {
    let client = build_client(&cli, &config)?;
    tracing::debug!("Running {:?} against {}", cli.command, client.market());

    match &cli.command {
        Command::Live { symbol } => {
            let (result, diagnostics) = client.get_live_price_with_diagnostics(symbol).await?;
            emit(result, diagnostics, cli.diagnostics)
        }
        Command::History { symbol, start, end } => {
            let (result, diagnostics) = client
                .get_historical_prices_with_diagnostics(symbol, start, end)
                .await?;
            emit(result, diagnostics, cli.diagnostics)
        }
        Command::Info { symbol } => {
            let (result, diagnostics) = client
                .get_instrument_info_with_diagnostics(symbol)
                .await?;
            emit(result, diagnostics, cli.diagnostics)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::from_env();
    init_tracing(&config.log_format);
    let cli = Cli::parse();

    if run(cli, config).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_UNAVAILABLE))
    }
}
