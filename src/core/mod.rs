// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout wirerep.
//!
//! - [`TwiddleError`] - error taxonomy for compiling and transcoding
//! - [`Value`] - in-memory tagged-list value

pub mod error;
pub mod value;

pub use error::{GrammarIssue, Result, TwiddleError};
pub use value::Value;
