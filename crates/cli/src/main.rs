mod log;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use skyx_rates_core::models::response::ApiResponse;
use skyx_rates_core::models::settings::Settings;
use skyx_rates_core::RateEngine;

use crate::log::init_logging;

#[derive(Parser)]
#[command(version, about = "Crypto prices and fiat exchange rates with provider fallback")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a JSON settings file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spot price of a crypto asset
    Price {
        symbol: String,
        #[arg(short, long, default_value = "USDT")]
        quote: String,
    },
    /// Exchange rate between two fiat currencies
    Rate { from: String, to: String },
    /// Convert an amount between any two codes (crypto or fiat)
    Convert { from: String, to: String, amount: f64 },
    /// Price history of a crypto asset
    History {
        symbol: String,
        #[arg(short, long, default_value = "USDT")]
        quote: String,
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },
    /// Supported fiat currencies
    Currencies,
    /// Supported crypto assets
    Cryptos,
    /// Fiat and crypto 24h movements, volatility and the top crypto
    Pulse,
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {path}"))?,
        None => Settings::default(),
    };
    Ok(settings.apply_env())
}

fn print<T: Serialize>(response: &ApiResponse<T>) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    let engine = RateEngine::from_settings(settings).context("Failed to start rate engine")?;

    let code = match cli.command {
        Commands::Price { symbol, quote } => {
            print(&ApiResponse::from_quote(engine.get_price(&symbol, &quote).await))?
        }
        Commands::Rate { from, to } => {
            print(&ApiResponse::from_quote(engine.get_fiat_rate(&from, &to).await))?
        }
        Commands::Convert { from, to, amount } => {
            let result = engine.convert(&from, &to, amount).await;
            match result {
                Ok(conversion) if conversion.stale => print(&ApiResponse::ok_stale(conversion))?,
                other => print(&ApiResponse::from_result(other))?,
            }
        }
        Commands::History {
            symbol,
            quote,
            days,
        } => print(&ApiResponse::from_quote(
            engine.get_historical_data(&symbol, &quote, days).await,
        ))?,
        Commands::Currencies => {
            print(&ApiResponse::from_quote(engine.get_supported_currencies().await))?
        }
        Commands::Cryptos => print(&ApiResponse::from_quote(engine.get_supported_cryptos().await))?,
        Commands::Pulse => match engine.market_pulse().await {
            Ok(pulse) if pulse.stale => print(&ApiResponse::ok_stale(pulse))?,
            other => print(&ApiResponse::from_result(other))?,
        },
    };

    engine.shutdown().await;
    Ok(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
