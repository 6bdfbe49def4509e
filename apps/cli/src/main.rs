// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! csmap - building footprints to Hammer maps.
//!
//! ```text
//! csmap generate --bbox 9.99,53.55,10.0,53.56 --gpkg buildings.gpkg --out maps/hamburg.map --wad cstrike.wad
//! csmap generate --bbox 9.99,53.55,10.0,53.56 --out maps/empty.map --stub
//! ```
//!
//! Exit status: 0 on success, 1 on failure, 2 when there is nothing to generate.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use csmap_processing::{generate, GenerateConfig, GenerateRequest, GenerateSummary};

mod args;

use args::{Cli, Command, GenerateArgs};

const EXIT_NOTHING_TO_GENERATE: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("csmap {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Generate(args) => match run_generate(&args) {
            Ok(summary) => {
                if summary.stub {
                    println!("Empty map created -> {}", summary.out.display());
                } else {
                    println!(
                        "Map with {} box solids created -> {}",
                        summary.boxes,
                        summary.out.display()
                    );
                }
                ExitCode::SUCCESS
            }
            Err(e) => exit_for(&e),
        },
    }
}

fn run_generate(args: &GenerateArgs) -> Result<GenerateSummary> {
    let mut config = GenerateConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("Invalid settings")?;

    let request = GenerateRequest {
        bbox: args.bbox,
        out: args.out.clone(),
        input: args.input.clone(),
        layer: config.layer.clone(),
        stub: args.stub,
        extract: config.extract_options()?,
        style: config.map_style(),
    };

    tracing::debug!(?config, "Resolved settings");

    if !args.progress {
        return Ok(generate(&request, &mut |_| {})?);
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {pos} buildings [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    let result = generate(&request, &mut |n| bar.set_position(n as u64));
    bar.finish_and_clear();
    Ok(result?)
}

fn exit_for(error: &anyhow::Error) -> ExitCode {
    if let Some(csmap_processing::Error::NothingToGenerate) = error.downcast_ref::<csmap_processing::Error>() {
        eprintln!("Nothing to generate: provide --gpkg/--input or use --stub.");
        return ExitCode::from(EXIT_NOTHING_TO_GENERATE);
    }
    eprintln!("Error: {:#}", error);
    ExitCode::FAILURE
}
