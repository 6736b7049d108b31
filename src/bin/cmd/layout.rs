// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Layout commands - describe compiled grammars and derive grammars from values.

use clap::Args;

use crate::common::{Context, LayoutArgs, Result};
use wirerep::tagged::parse_text;
use wirerep::template_grammar;

/// Show how a grammar compiles.
#[derive(Args, Clone, Debug)]
pub struct DescribeCmd {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl DescribeCmd {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let layout = self.layout.resolve(ctx)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&*layout)?);
            return Ok(());
        }
        println!("Grammar: {}", layout.grammar());
        println!("Wire:    {}", layout.describe());
        println!("Template bytes: {}", layout.template().len());
        print!("{layout}");
        Ok(())
    }
}

/// Derive the grammar a sample value would need.
#[derive(Args, Clone, Debug)]
pub struct TemplateCmd {
    /// Sample message in text form, e.g. '7 (1 2 3) "name"'
    #[arg(long, value_name = "TEXT")]
    pub value: String,
}

impl TemplateCmd {
    pub fn run(self, _ctx: &Context) -> Result<()> {
        let value = parse_text(&self.value)?;
        println!("{}", template_grammar(&value));
        Ok(())
    }
}
