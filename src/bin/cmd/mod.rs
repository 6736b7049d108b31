// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod layout;
mod transcode;

pub use layout::{DescribeCmd, TemplateCmd};
pub use transcode::{DecodeCmd, EncodeCmd};
