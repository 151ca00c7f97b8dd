/// Main entry point for the pivot monitor
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use pivot_monitor::{
    chart::summarize,
    client::PredictionClient,
    config::load_config,
    logging::init_logging,
    scheduler::{RefreshScheduler, RefreshSnapshot, RefreshTrigger},
    time::{SystemClock, TradingCalendar},
    Config,
};

/// Print the latest result; absent data is reported, never the previous result
fn render(snapshot: &RefreshSnapshot, config: &Config, calendar: Option<&TradingCalendar>) {
    match &snapshot.result {
        Some(response) => {
            info!("{} update #{}", snapshot.symbol, snapshot.applied_seq);
            for line in summarize(response, &config.intervals, calendar) {
                info!("  {}", line);
            }
        }
        None => warn!(
            "{}: no data ({})",
            snapshot.symbol,
            snapshot.last_error.as_deref().unwrap_or("no response yet")
        ),
    }
}

/// Empty line or `r` refreshes; anything else is a new ticker
async fn handle_input(scheduler: &RefreshScheduler, line: &str) {
    let input = line.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("r") {
        scheduler.refresh(RefreshTrigger::UserInitiated).await;
        return;
    }

    if let Err(e) = scheduler.set_symbol(input).await {
        warn!("Ignoring input {:?}: {}", input, e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "config.toml".to_string());

    let config = Arc::new(load_config(&config_path)?);
    init_logging(&config)?;

    info!("Starting pivot monitor for {} via {}", config.symbol, config.endpoint);

    let calendar = config.skip_non_trading_days.then(TradingCalendar::nyse);
    let client = Arc::new(PredictionClient::from_config(&config)?);
    let mut scheduler = RefreshScheduler::new(client, Arc::new(SystemClock), Arc::clone(&config));
    let mut updates = scheduler.subscribe();

    scheduler.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_applied = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl+C received - shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_input(&scheduler, &line).await,
                Ok(None) => {
                    info!("stdin closed - background refresh continues");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = scheduler.snapshot().await;
                if snapshot.applied_seq != last_applied {
                    last_applied = snapshot.applied_seq;
                    render(&snapshot, &config, calendar.as_ref());
                }
            }
        }
    }

    scheduler.stop();
    info!("Pivot monitor stopped");
    Ok(())
}
