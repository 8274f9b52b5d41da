//! NEPSE command-line interface
//!
//! Thin front end over `nepse-rest` for checking the market from a terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use nepse_auth::WasmTransform;
use nepse_rest::{ClientConfig, Decimal, IndexSnapshot, MarketStatus, NepseRestClient, TopMover};

/// NEPSE data command-line interface.
#[derive(Parser)]
#[command(name = "nepse")]
#[command(about = "Nepal Stock Exchange data from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Limit number of rows in listings
    #[arg(long, default_value_t = 5, global = true)]
    limit: usize,

    /// Emit raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    /// Disable the response cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Portal base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to the transform wasm module. Defaults to $NEPSE_WASM_PATH
    #[arg(long, global = true)]
    wasm: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show market open/close status
    Status,
    /// Show the top gainers
    Gainers,
    /// Show the top losers
    Losers,
    /// Show the NEPSE index
    Index,
    /// Show the market summary
    Summary,
    /// Show status, index and top movers in one shot
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let transform = match &cli.wasm {
        Some(path) => WasmTransform::from_file(path),
        None => WasmTransform::from_env(),
    }
    .context("loading the transform module")?;

    let mut config = ClientConfig::new().with_cache(!cli.no_cache);
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    let client = NepseRestClient::with_config(transform, config);

    match cli.command {
        Commands::Status => {
            let status = client.get_market_status().await?;
            emit(&cli, &status, display_status)?;
        }
        Commands::Gainers => {
            let rows = client.get_top_gainers(Some(cli.limit)).await?;
            emit(&cli, &rows, |rows| {
                display_movers(&format!("Top {} Gainers:", rows.len()), rows, true)
            })?;
        }
        Commands::Losers => {
            let rows = client.get_top_losers(Some(cli.limit)).await?;
            emit(&cli, &rows, |rows| {
                display_movers(&format!("Top {} Losers:", rows.len()), rows, false)
            })?;
        }
        Commands::Index => {
            let indices = client.get_nepse_index().await?;
            emit(&cli, &indices, display_index)?;
        }
        Commands::Summary => {
            let summary = client.get_market_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::All => {
            let status = client.get_market_status().await?;
            let indices = client.get_nepse_index().await?;
            let gainers = client.get_top_gainers(Some(cli.limit)).await?;
            let losers = client.get_top_losers(Some(cli.limit)).await?;

            if cli.json {
                let all = serde_json::json!({
                    "status": status,
                    "index": indices,
                    "gainers": gainers,
                    "losers": losers,
                });
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                display_status(&status);
                display_index(&indices);
                display_movers(&format!("Top {} Gainers:", gainers.len()), &gainers, true);
                display_movers(&format!("Top {} Losers:", losers.len()), &losers, false);
            }
        }
    }

    Ok(())
}

/// Print `value` as JSON in `--json` mode, otherwise via `display`
fn emit<T: Serialize>(cli: &Cli, value: &T, display: impl Fn(&T)) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        display(value);
    }
    Ok(())
}

fn display_status(status: &MarketStatus) {
    let state = status.is_open.as_deref().unwrap_or("UNKNOWN");
    let line = format!("Market Status: {}", state);
    if status.open() {
        println!("{}", line.green());
    } else {
        println!("{}", line.red());
    }
    if let Some(as_of) = &status.as_of {
        println!("As of: {}", as_of);
    }
}

fn display_index(indices: &Vec<IndexSnapshot>) {
    let snapshot = indices
        .iter()
        .find(|row| row.index.as_deref() == Some("NEPSE Index"))
        .or_else(|| indices.first());
    let Some(snapshot) = snapshot else {
        println!("no index data");
        return;
    };

    let value = decimal_cell(&snapshot.current_value);
    println!("\n{}", format!("NEPSE Index: {}", value).bold());

    let change = decimal_cell(&snapshot.change);
    let per_change = decimal_cell(&snapshot.per_change);
    let line = format!("Change: {} ({}%)", change, per_change);
    if snapshot.change.map(|c| c.is_sign_negative()).unwrap_or(false) {
        println!("{}", line.red());
    } else {
        println!("{}", line.green());
    }
}

fn display_movers(title: &str, rows: &[TopMover], gainers: bool) {
    let heading = if gainers {
        title.green()
    } else {
        title.red()
    };
    println!("\n{}", heading);
    println!("{:<12} {:<10} {:<10}", "Symbol", "LTP", "Change %");
    println!("{}", "-".repeat(40));

    for row in rows {
        let sign = if gainers { "+" } else { "" };
        println!(
            "{:<12} {:<10} {}{}%",
            row.symbol.as_deref().unwrap_or("-"),
            decimal_cell(&row.ltp),
            sign,
            decimal_cell(&row.percentage_change),
        );
    }
}

fn decimal_cell(value: &Option<Decimal>) -> String {
    value.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}
