// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! `zhtk`, command line access to sequence generation and a virtual
//! experiment.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use toolkit_common::DeviceKind;

#[derive(Parser, Debug)]
#[command(name = "zhtk", about = "Zurich Instruments toolkit", version)]
struct Cli {
    /// Log debug records, every node write and every status poll.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sequencer program for a JSON file of sequence settings.
    Seqc {
        /// Sequence settings as JSON.
        settings: PathBuf,
        /// Device the program is generated for.
        #[arg(long, default_value = "hdawg")]
        device: DeviceKind,
        /// Write the program to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the sequence types a device supports.
    Types {
        /// Only this device, all AWG devices otherwise.
        #[arg(long)]
        device: Option<DeviceKind>,
    },

    /// Run a Rabi amplitude sweep with an HDAWG and a UHFQA on the virtual
    /// data server.
    Demo {
        /// Toolkit configuration as JSON.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of sweep points.
        #[arg(long, default_value_t = 5)]
        points: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    toolkit_log::init_logging(cli.verbose);
    env_logger::Builder::new()
        .filter_level(toolkit_log::max_level())
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Seqc {
            settings,
            device,
            output,
        } => {
            let program = commands::seqc(&settings, device)?;
            match output {
                Some(path) => commands::write_program(&path, &program)?,
                None => print!("{program}"),
            }
        }
        Commands::Types { device } => print!("{}", commands::types(device)),
        Commands::Demo { config, points } => {
            let config = commands::load_config(config.as_deref())?;
            for point in commands::demo(&config, points)? {
                println!("{:.3}\t{:.6}", point.value, point.result);
            }
        }
    }
    Ok(())
}
