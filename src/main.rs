use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenvale::{
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Greenvale settlement sustainability simulator")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "greenvale=info")]
    log_level: String,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play a scenario headlessly and print the final state
    Run(RunArgs),
    /// Run the month clock and serve the settlement API
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/green_valley.yaml")]
    scenario: PathBuf,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Override month count (uses scenario default when omitted)
    #[arg(long)]
    months: Option<u64>,

    /// Override the planner seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Override the wall-clock length of one month in milliseconds
    #[arg(long)]
    month_ms: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Mode::Run(args) => run_headless(args),
        Mode::Serve(args) => serve(args),
    }
}

fn run_headless(args: RunArgs) -> Result<()> {
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&args.scenario.scenario)?;
    let months = scenario.months(args.months);
    let engine = scenario.build_engine()?;
    let mut planner = scenario.planner(args.seed);

    let summary = planner
        .play(&engine, months)
        .with_context(|| format!("Scenario '{}' stopped early", scenario.name))?;
    let snapshot = engine.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let indicators = snapshot.indicators;
    println!(
        "Scenario '{}' completed for {} months ({} placed, {} rejected, {} abandoned).",
        scenario.name, summary.months, summary.placed, summary.rejected, summary.abandoned
    );
    println!(
        "Population {} | air {:.1} | water {:.1} | happiness {:.1} | biodiversity {:.1} | food {:.1} | energy {:.1}",
        indicators.population,
        indicators.air_quality,
        indicators.water_quality,
        indicators.community_happiness,
        indicators.biodiversity,
        indicators.food_supply,
        indicators.energy_balance,
    );
    println!(
        "Buildings {} | terrain +{} | completed challenges {:?}",
        snapshot.buildings.len(),
        snapshot.unlocked_terrain,
        snapshot.completed_challenges
    );
    Ok(())
}

fn serve(args: ServeArgs) -> Result<()> {
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&args.scenario.scenario)?;
    let month_duration = scenario.month_duration(args.month_ms);
    info!(
        scenario = %scenario.name,
        month_ms = month_duration.as_millis() as u64,
        "starting server"
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(web::run(WebServerConfig {
        scenario,
        month_duration,
        host: args.host,
        port: args.port,
    }))
}
