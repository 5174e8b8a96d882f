//! Swarm Information Market
//!
//! Runs one seeded swarm from a TOML configuration and writes the run
//! report as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use swarm_core::config::SeedSetting;
use swarm_core::{RunError, SimConfig, Simulation};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "swarm_market")]
#[command(about = "A swarm of foragers trading beliefs about food and nest")]
struct Args {
    /// TOML configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate, overriding the configuration
    #[arg(long)]
    ticks: Option<u64>,

    /// Where to write the run report
    #[arg(long, default_value = "output/report.json")]
    output: PathBuf,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = SeedSetting::Fixed(seed);
    }
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let mut sim = Simulation::new(config)?;

    println!("Swarm Information Market");
    println!("========================");
    println!("Seed: {}", sim.seed());
    println!("Ticks: {}", sim.config().simulation.ticks);
    println!("Payment system: {}", sim.ledger().policy_name());
    print!("{}", sim.spawn_summary());
    println!();

    let report = sim.run()?;
    report.write_to(&args.output)?;

    println!();
    println!("Simulation complete. Ran {} ticks.", report.ticks);
    println!("Items delivered: {}", report.total_items());
    println!("Total holdings: {:.4}", report.total_holdings);
    let mut classes: Vec<&str> = report.agents.iter().map(|agent| agent.behavior.as_str()).collect();
    classes.sort_unstable();
    classes.dedup();
    for class in classes {
        if let Some(mean) = report.mean_reward_of(class) {
            println!("  {}: mean reward {:.4}", class, mean);
        }
    }
    println!("Wrote {}", args.output.display());
    Ok(())
}
