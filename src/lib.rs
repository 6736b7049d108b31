// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Wirerep
//!
//! Grammar-driven transcoding between the tagged-list ("Bottle") wire format
//! and externally specified binary layouts.
//!
//! A peer that speaks a fixed binary layout (a ROS message, a device frame)
//! carries no tag words. A short grammar describes that layout once; the
//! compiled [`Layout`] then lets messages flow in both directions without
//! building an intermediate value:
//!
//! - **Decode**: [`twiddle::TwiddleReader`] wraps a byte source and yields the
//!   tagged-list stream, so an ordinary [`tagged::TaggedReader`] can parse it
//! - **Encode**: [`twiddle::TwiddleWriter`] strips tag words from a buffered
//!   tagged-list message and lists the payload ranges to flush
//!
//! ## Architecture
//!
//! - `core/` - [`Value`] and the [`TwiddleError`] taxonomy
//! - `tagged/` - tag constants, block serializer, stream parser, text form
//! - `layout/` - grammar compiler, gap descriptors, layout description
//! - `twiddle/` - reader, writer, property bag, [`WireTwiddler`] facade
//! - `config` - TOML registry of named layouts
//!
//! ## Example
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use wirerep::{Value, WireTwiddler};
//!
//! let twiddler = WireTwiddler::from_grammar("list 2 string * vector float64 *")?;
//! let value = Value::List(vec![
//!     Value::string("odom"),
//!     Value::float64_list(&[1.0, 2.0, 3.0]),
//! ]);
//!
//! let wire = twiddler.write(&value)?;
//! assert_eq!(wire.len(), 4 + 4 + 4 + 3 * 8);
//! assert_eq!(twiddler.read(&wire)?, value);
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use core::{GrammarIssue, Result, TwiddleError, Value};

// Tagged-list format
pub mod tagged;

// Grammar compiler and layouts
pub mod layout;

pub use layout::{template_grammar, Flavor, Gap, Layout};

// Transcoders
pub mod twiddle;

pub use twiddle::{PropValue, PropertyBag, TwiddleReader, TwiddleWriter, WireTwiddler};

// Layout registry
pub mod config;

pub use config::LayoutRegistry;
