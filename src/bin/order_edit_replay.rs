use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use order_edit_inventory::{
    config::{self, ShipmentsConfig, UpdateMode},
    metrics,
    scenario::Scenario,
};
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "order-edit-replay",
    about = "Replay an order edit against in-memory stock and shipments",
    version
)]
struct Cli {
    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Shipment update mode: rebuild, add or nothing. Overrides config and scenario.
    #[arg(long)]
    mode: Option<UpdateMode>,

    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    #[arg(long, action = ArgAction::SetTrue, help = "Pretty-print the JSON report")]
    pretty: bool,

    #[arg(long, action = ArgAction::SetTrue, help = "Print Prometheus counters after the report")]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config =
        config::load_config_from(&cli.config_dir).context("failed to load application config")?;
    config::init_tracing(&app_config.log_level, app_config.log_json);

    let scenario = Scenario::from_path(&cli.scenario)
        .with_context(|| format!("failed to load scenario {}", cli.scenario.display()))?;

    let update_mode = cli
        .mode
        .or(scenario.update_mode)
        .unwrap_or(app_config.shipments.update_mode);
    debug!(%update_mode, "resolved shipment update mode");
    let settings = ShipmentsConfig {
        update_mode,
        default_source_code: app_config.shipments.default_source_code.clone(),
    };

    let report = scenario
        .run(Arc::new(settings))
        .await
        .context("order edit failed")?;

    print_json(&report, cli.pretty)?;
    if cli.metrics {
        print!("{}", metrics::gather_text());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}
