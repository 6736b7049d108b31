// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use clap::Args;
use tracing_subscriber::EnvFilter;

use wirerep::{Layout, LayoutRegistry};

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Environment variable holding a default log filter.
pub const LOG_ENV: &str = "WIREREP_LOG";

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Layout registry file, if one was given
    pub config: Option<PathBuf>,
}

impl Context {
    /// Load the registry named by `--config`.
    pub fn registry(&self) -> Result<LayoutRegistry> {
        let path = self
            .config
            .as_deref()
            .ok_or_else(|| anyhow!("--layout needs a registry file (--config FILE)"))?;
        LayoutRegistry::load(path)
            .with_context(|| format!("Failed to load layouts from {}", path.display()))
    }
}

/// Where a command gets its layout from.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Layout grammar, e.g. "list 2 int32 * vector float64 *"
    #[arg(value_name = "GRAMMAR", required_unless_present = "layout")]
    pub grammar: Option<String>,

    /// Name of a layout in the registry file
    #[arg(short, long, value_name = "NAME", conflicts_with = "grammar")]
    pub layout: Option<String>,

    /// Use the reply section of a request/reply layout
    #[arg(long)]
    pub reply: bool,
}

impl LayoutArgs {
    /// Compile the inline grammar or look up the named layout.
    pub fn resolve(&self, ctx: &Context) -> Result<Arc<Layout>> {
        match (&self.grammar, &self.layout) {
            (Some(grammar), _) => {
                let mut sections = Layout::compile_sections(grammar)?;
                let index = usize::from(self.reply);
                if index >= sections.len() {
                    bail!("grammar has no reply section (separate it with ---)");
                }
                Ok(Arc::new(sections.swap_remove(index)))
            }
            (None, Some(name)) => {
                let registry = ctx.registry()?;
                let found = if self.reply {
                    registry.reply_layout(name)
                } else {
                    registry.layout(name)
                };
                found.ok_or_else(|| {
                    let known = registry.names().collect::<Vec<_>>().join(", ");
                    anyhow!("Unknown layout '{name}' (known: {known})")
                })
            }
            (None, None) => bail!("Give a grammar or --layout NAME"),
        }
    }
}

/// Logging setup for one CLI run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `-v` count from the command line
    pub verbosity: u8,
    /// Filter from the environment
    pub env_filter: Option<String>,
    /// Colored output
    pub ansi: bool,
}

impl LogConfig {
    /// Seed from the environment; the command-line verbosity is applied on top.
    pub fn from_env(verbosity: u8) -> Self {
        Self {
            verbosity,
            env_filter: std::env::var(LOG_ENV).ok().filter(|s| !s.trim().is_empty()),
            ansi: std::io::stderr().is_terminal(),
        }
    }

    /// Filter directive to install. An explicit `-v` wins over the environment.
    pub fn directive(&self) -> String {
        match (self.verbosity, &self.env_filter) {
            (0, Some(filter)) => filter.clone(),
            (0, None) => "warn".to_string(),
            (1, _) => "info".to_string(),
            (2, _) => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

/// Install a stderr subscriber for `config`.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directive())
        .with_context(|| format!("Invalid log filter '{}'", config.directive()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logger: {e}"))
}

/// Parse hex text, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits).with_context(|| format!("Invalid hex input: {text}"))
}

/// Read hex text from a file, or `-` for stdin.
pub fn read_hex_file(path: &Path) -> Result<Vec<u8>> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    parse_hex(&text)
}

/// Format bytes as space-separated groups of four.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(4)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}
