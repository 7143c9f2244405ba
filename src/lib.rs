pub mod amount;
pub mod cli;
pub mod columns;
pub mod dataset;
pub mod derive;
pub mod error;
pub mod fill;
pub mod io_utils;
pub mod patch;
pub mod pipeline;
pub mod rules;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("cardset", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("{:?}", cli.command);
    match cli.command {
        Commands::Patch(args) => patch::execute(&args),
        Commands::Fill(args) => fill::execute(&args),
        Commands::Derive(args) => derive::execute(&args),
        Commands::AddColumn(args) => columns::execute_add(&args),
        Commands::RemoveColumn(args) => columns::execute_remove(&args),
        Commands::Validate(args) => validate::execute(&args),
    }
}
