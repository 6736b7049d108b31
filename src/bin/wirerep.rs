// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Wirerep CLI
//!
//! Compile layout grammars and transcode messages from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Show what a grammar expects on the wire
//! wirerep describe "list 2 int32 * vector float64 *"
//!
//! # Decode external bytes
//! wirerep decode "list 2 int32 * vector int32 *" --hex "07000000 02000000 0a000000 14000000"
//!
//! # Encode a value
//! wirerep encode "list 2 int32 * vector int32 *" --value "7 (10 20)"
//!
//! # Use a named layout from a registry
//! wirerep --config layouts.toml decode --layout std_msgs/Int32 --hex 2a000000
//!
//! # Derive a grammar from a sample value
//! wirerep template --value '7 (1 2 3) "name"'
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use cmd::{DecodeCmd, DescribeCmd, EncodeCmd, TemplateCmd};
use common::{init_logging, Context, LogConfig, Result};

/// Wirerep - tagged-list wire transcoder
///
/// Describe binary layouts with a short grammar and convert messages between
/// them and the tagged-list format.
#[derive(Parser, Clone)]
#[command(name = "wirerep")]
#[command(about = "Grammar-driven transcoder between tagged-list messages and binary layouts", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Layout registry (TOML) for --layout lookups
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace); overrides WIREREP_LOG
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Show how a grammar compiles and what it expects on the wire
    Describe(DescribeCmd),

    /// Decode external bytes into tagged values
    Decode(DecodeCmd),

    /// Encode a tagged value into external bytes
    Encode(EncodeCmd),

    /// Derive a grammar from a sample value
    Template(TemplateCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env(cli.verbose))?;
    let ctx = Context { config: cli.config };

    match cli.command {
        Commands::Describe(cmd) => cmd.run(&ctx),
        Commands::Decode(cmd) => cmd.run(&ctx),
        Commands::Encode(cmd) => cmd.run(&ctx),
        Commands::Template(cmd) => cmd.run(&ctx),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
