// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Transcode commands - external bytes to values and back.

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::common::{format_hex, parse_hex, read_hex_file, Context, LayoutArgs, Result};
use wirerep::tagged::parse_text;
use wirerep::{Value, WireTwiddler};

/// Decode external bytes into tagged values.
#[derive(Args, Clone, Debug)]
pub struct DecodeCmd {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Message bytes as hex
    #[arg(long, value_name = "HEX", conflicts_with = "input")]
    pub hex: Option<String>,

    /// File holding hex text ('-' for stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Decode back-to-back messages until the input ends
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DecodedJson<'a> {
    index: usize,
    value: &'a Value,
}

impl DecodeCmd {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let layout = self.layout.resolve(ctx)?;
        let bytes = match (&self.hex, &self.input) {
            (Some(text), _) => parse_hex(text)?,
            (None, Some(path)) => read_hex_file(path)?,
            (None, None) => bail!("Give the message with --hex HEX or --input FILE"),
        };
        let twiddler = WireTwiddler::new(layout);

        let values = if self.all {
            let mut rest = &bytes[..];
            let mut values = Vec::new();
            while !rest.is_empty() {
                let before = rest.len();
                let value = twiddler
                    .read_from(&mut rest)
                    .with_context(|| format!("Failed to decode message #{}", values.len()))?;
                if rest.len() == before {
                    bail!(
                        "Layout reads no external bytes, so --all cannot split {before} \
                         remaining bytes into messages"
                    );
                }
                values.push(value);
            }
            values
        } else {
            vec![twiddler.read(&bytes)?]
        };
        info!(
            context = "decode",
            messages = values.len(),
            bytes = bytes.len(),
            "decoded input"
        );

        for (index, value) in values.iter().enumerate() {
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string(&DecodedJson { index, value })?
                );
            } else {
                println!("{}", message_text(value));
            }
        }
        Ok(())
    }
}

/// Encode a tagged value into external bytes.
#[derive(Args, Clone, Debug)]
pub struct EncodeCmd {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Message in text form, e.g. '7 (1 2 3)'
    #[arg(long, value_name = "TEXT")]
    pub value: String,

    /// Write raw bytes to this file instead of printing hex
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl EncodeCmd {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let layout = self.layout.resolve(ctx)?;
        let value = parse_text(&self.value)?;
        let bytes = WireTwiddler::new(layout).write(&value)?;
        info!(context = "encode", bytes = bytes.len(), "encoded message");
        match self.output {
            Some(path) => std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{}", format_hex(&bytes)),
        }
        Ok(())
    }
}

/// Items of a message in the text form `encode` accepts.
fn message_text(value: &Value) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
