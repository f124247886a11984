use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use healthcast_forecasting::{HealthCastConfig, HealthCastEngine, RegionOutlook, RiskRanking};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "healthcast",
    version,
    about = "Seven-day case forecasts and hospital stress ranking"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, default_value = "healthcast.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forecasts one region and scores its day-7 stress.
    Forecast {
        #[arg(long)]
        region: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Ranks every configured region by day-7 stress.
    Rank {
        #[arg(long)]
        json: bool,
    },
    /// Lists configured regions and bed capacities.
    Regions,
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("healthcast: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = HealthCastConfig::load(&cli.config)?;
    if let Commands::Regions = cli.command {
        for (region, capacity) in config.capacities.iter() {
            println!("{region} | beds={capacity}");
        }
        return Ok(());
    }
    let engine = HealthCastEngine::from_config(&config).context("initialising engine")?;
    match cli.command {
        Commands::Forecast { region, json } => {
            let outlook = engine.outlook(&region)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outlook)?);
            } else {
                print_outlook(&outlook);
            }
        }
        Commands::Rank { json } => {
            let ranking = engine.rank();
            if json {
                println!("{}", serde_json::to_string_pretty(&ranking)?);
            } else {
                print_ranking(&ranking);
            }
            for failure in &ranking.failures {
                eprintln!(
                    "{}",
                    json!({ "region": failure.region, "error": failure.reason })
                );
            }
        }
        Commands::Regions => {}
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn whole_cases(cases: f64) -> i64 {
    cases as i64
}

fn print_outlook(outlook: &RegionOutlook) {
    println!("7-Day Forecast for {}:", outlook.region);
    for (day, value) in outlook.forecast.values().iter().enumerate() {
        println!("  Day {}: {value:.2}", day + 1);
    }
    println!();
    println!("Healthcare Stress (Day 7):");
    println!("  Cases: {}", whole_cases(outlook.assessment.case_count));
    println!("  Stress Index: {:.6}", outlook.assessment.stress_ratio);
    println!("  Risk Level: {}", outlook.assessment.risk_level);
    println!("Trend: {}", outlook.trend);
}

fn print_ranking(ranking: &RiskRanking) {
    println!("Risk ranking {} ({})", ranking.run_id, ranking.generated_at);
    for (position, entry) in ranking.positions() {
        println!(
            "{position}. {} | Cases={} | Stress={:.6} | {}",
            entry.region,
            whole_cases(entry.final_cases),
            entry.stress_ratio,
            entry.risk_level
        );
    }
}
