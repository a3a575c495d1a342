use std::io::{self, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::anyhow;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use funding_board::config::{Settings, DEFAULT_CONFIG_PATH};
use funding_board::market_data::aggregator::Aggregator;
use funding_board::market_data::funding_clock::until_next_funding;
use funding_board::market_data::horizon::Horizon;
use funding_board::market_data::pivot::ColumnSort;
use funding_board::market_data::scheduler::{BoardState, CycleStatus, RefreshScheduler, SchedulerHandle};
use funding_board::market_data::types::Exchange;
use funding_board::market_data::view::{build_view, DashboardView, ViewOptions};
use funding_board::telemetry;

#[derive(Parser, Debug)]
#[command(name = "funding-board", version, about = "Cross-exchange perpetual funding rate board")]
struct Args {
    /// TOML settings file; missing is fine
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Horizon to scale rates to (8h, 1d, 7d, 30d, 180d, 1y)
    #[arg(long, default_value = "8h", value_parser = parse_horizon)]
    horizon: Horizon,
    /// Only show this canonical symbol in the rates table
    #[arg(long)]
    symbol: Option<String>,
    /// Fetch once, print, exit
    #[arg(long)]
    once: bool,
    /// Print the view as JSON instead of tables
    #[arg(long)]
    json: bool,
    #[arg(long)]
    no_auto_refresh: bool,
}

fn parse_horizon(s: &str) -> Result<Horizon, String> {
    s.parse().map_err(|e: funding_board::error::ParseError| e.to_string())
}

// Canonical symbols are upper case; accept any case from the user.
fn symbol_filter(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn pct(rate: f64) -> String {
    format!("{:+.4}%", rate * 100.0)
}

fn print_rates(view: &DashboardView) {
    print!("{:<12}", "Asset");
    for ex in Exchange::ALL {
        print!("{:>14}", ex.display_name());
    }
    println!();
    for row in &view.rows {
        print!("{:<12}", row.symbol);
        for ex in Exchange::ALL {
            match row.cells.get(&ex) {
                Some(rate) => print!("{:>14}", pct(*rate)),
                None => print!("{:>14}", "-"),
            }
        }
        println!();
    }
    if view.rows.is_empty() {
        println!("(no rates)");
    }
}

fn print_arbitrage(view: &DashboardView) {
    println!("Top funding spreads ({}):", view.horizon);
    for opp in &view.arbitrage {
        println!(
            "  #{:<2} {:<10} {:>10}  long {:<12} short {}",
            opp.rank,
            opp.symbol,
            pct(opp.diff),
            opp.long.display_name(),
            opp.short.display_name()
        );
    }
    if view.arbitrage.is_empty() {
        println!("  none");
    }
}

fn print_carry(view: &DashboardView) {
    println!("Top delta-neutral carry ({}):", view.horizon);
    for opp in &view.carry {
        println!(
            "  #{:<2} {:<10} {:>10}  buy {} / short {}",
            opp.rank,
            opp.symbol,
            pct(opp.carry),
            opp.long_spot,
            opp.short_perp.display_name()
        );
    }
    if view.carry.is_empty() {
        println!("  none");
    }
}

fn print_stats(view: &DashboardView) {
    let s = &view.stats;
    println!(
        "Markets: {} | Avg rate: {} | Max spread: {} | Positive: {} | Negative: {}",
        s.total_markets,
        pct(s.avg_rate),
        pct(s.max_spread),
        s.positive,
        s.negative
    );
}

fn print_status(state: &BoardState) {
    let now = SystemTime::now();
    println!("Status: {:?} (cycle {}, auto-refresh {})", state.status, state.cycle, state.auto_refresh);
    match state.last_updated().and_then(|t| now.duration_since(t).ok()) {
        Some(age) => println!("Last updated: {}s ago", age.as_secs()),
        None => println!("Last updated: never"),
    }
    if let Some(snapshot) = &state.snapshot {
        if !snapshot.failed_sources.is_empty() {
            println!("Unavailable last cycle: {}", snapshot.failed_sources.join(", "));
        }
    }
    if let Some(err) = &state.last_error {
        println!("⚠️  {err}");
    }
    println!("Next funding in {} min", until_next_funding(now).as_secs() / 60);
}

fn print_board(state: &BoardState, opts: &ViewOptions, json: bool) -> anyhow::Result<()> {
    let view = build_view(state.rates(), opts);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    print_status(state);
    println!();
    print_stats(&view);
    println!();
    print_arbitrage(&view);
    println!();
    print_carry(&view);
    println!();
    print_rates(&view);
    Ok(())
}

fn current_view(handle: &SchedulerHandle, opts: &ViewOptions) -> DashboardView {
    build_view(handle.state().rates(), opts)
}

fn print_help() {
    println!("Available commands:");
    println!("  refresh, r            - Fetch now (cancels a fetch in flight)");
    println!("  auto                  - Toggle auto-refresh");
    println!("  horizon <h>           - Scale to 8h, 1d, 7d, 30d, 180d or 1y");
    println!("  filter <symbol>       - Only show one symbol in the rates table");
    println!("  clear                 - Remove the symbol filter");
    println!("  sort <exchange>       - Sort rates by an exchange column (again to flip)");
    println!("  show                  - Print the whole board");
    println!("  rates | arb | carry | stats | status");
    println!("  quit, q               - Exit");
}

async fn run_prompt(handle: &SchedulerHandle, opts: &mut ViewOptions, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();

    loop {
        print!("\nfunding> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();

        match command.as_str() {
            "help" | "h" => print_help(),
            "refresh" | "r" => {
                let id = handle.trigger().await?;
                println!("Started cycle {id}");
            }
            "auto" => {
                let enabled = !handle.state().auto_refresh;
                handle.set_auto_refresh(enabled).await?;
                println!("Auto-refresh {}", if enabled { "on" } else { "off" });
            }
            "horizon" => match arg.map(str::parse::<Horizon>) {
                Some(Ok(h)) => {
                    opts.horizon = h;
                    println!("Horizon set to {h}");
                }
                Some(Err(e)) => println!("{e}"),
                None => println!("Usage: horizon <8h|1d|7d|30d|180d|1y>"),
            },
            "filter" => match arg {
                Some(symbol) => {
                    opts.symbol = Some(symbol_filter(symbol));
                    print_rates(&current_view(handle, opts));
                }
                None => println!("Usage: filter <symbol>"),
            },
            "clear" => {
                opts.symbol = None;
                println!("Filter cleared");
            }
            "sort" => match arg.map(str::parse::<Exchange>) {
                Some(Ok(ex)) => {
                    opts.sort = Some(ColumnSort::toggle(opts.sort, ex));
                    print_rates(&current_view(handle, opts));
                }
                Some(Err(e)) => println!("{e}"),
                None => println!("Usage: sort <binance|bybit|hyperliquid|lighter|okx>"),
            },
            "show" => print_board(&handle.state(), opts, json)?,
            "rates" => print_rates(&current_view(handle, opts)),
            "arb" => print_arbitrage(&current_view(handle, opts)),
            "carry" => print_carry(&current_view(handle, opts)),
            "stats" => print_stats(&current_view(handle, opts)),
            "status" => print_status(&handle.state()),
            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "" => continue,
            _ => println!("Unknown command. Type 'help' for available commands."),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let args = Args::parse();
    let mut settings = Settings::load(&args.config)?;
    if args.once || args.no_auto_refresh {
        settings.refresh.auto_refresh = false;
    }

    telemetry::init_tracing(&settings.log_filter);
    telemetry::init_metrics(&settings.metrics.listen)?;

    let aggregator = Aggregator::from_settings(&settings)?;
    info!(sources = ?aggregator.source_names(), horizon = %args.horizon, "starting funding board");
    let (handle, task) = RefreshScheduler::new(aggregator, &settings.refresh).spawn();

    let mut opts = ViewOptions { horizon: args.horizon, symbol: args.symbol.as_deref().map(symbol_filter), sort: None };

    if args.once {
        let id = handle.trigger().await?;
        let state = handle.wait_settled(id).await?;
        print_board(&state, &opts, args.json)?;
        handle.shutdown().await?;
        task.await?;
        if state.status == CycleStatus::Failed {
            return Err(anyhow!(state.last_error.clone().unwrap_or_else(|| "fetch failed".into())));
        }
        return Ok(());
    }

    // With auto-refresh on the scheduler fetches immediately by itself.
    if !settings.refresh.auto_refresh {
        handle.trigger().await?;
    }
    run_prompt(&handle, &mut opts, args.json).await?;

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_flag_and_filter_command_agree() {
        let args = Args::parse_from(["funding-board", "--symbol", "btc", "--horizon", "1d"]);
        assert_eq!(args.horizon, Horizon::OneDay);
        assert_eq!(args.symbol.as_deref().map(symbol_filter).as_deref(), Some("BTC"));
        assert_eq!(symbol_filter("1000pepe"), "1000PEPE");
    }

    #[test]
    fn unknown_horizon_is_rejected() {
        assert!(Args::try_parse_from(["funding-board", "--horizon", "2w"]).is_err());
    }
}
