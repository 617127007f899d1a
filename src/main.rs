mod binning;
mod catalog;
mod config;
mod ephemeris;
mod error;
mod fold;
mod manager;
mod reducer;
mod series;
mod stats;
mod time;

use crate::manager::Manager;
use crate::reducer::PeriodOverride;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Reduce {
        #[arg(long)]
        source_id: u64,

        /// Period in days, overriding the catalog.
        #[arg(long)]
        period: Option<f64>,

        /// Period derivative in days per day.
        #[arg(long, allow_negative_numbers = true)]
        period_derivative: Option<f64>,

        /// Reference epoch in corrected days, overriding the catalog.
        #[arg(long)]
        epoch: Option<f64>,
    },

    Sweep,

    Correct {
        #[arg(long)]
        source_id: u64,
    },

    Lookup {
        #[arg(long)]
        source_id: u64,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.work_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Reduce {
            source_id,
            period,
            period_derivative,
            epoch,
        } => {
            let period_override = PeriodOverride {
                period,
                period_derivative,
                reference_epoch: epoch,
            };
            if !mgr.reduce_source(source_id, period_override)? {
                log::warn!("no result for source {source_id}");
            }
        }
        Command::Sweep => mgr.sweep()?,
        Command::Correct { source_id } => {
            if !mgr.correct_source(source_id)? {
                log::warn!("no result for source {source_id}");
            }
        }
        Command::Lookup { source_id } => mgr.lookup_source(source_id)?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
