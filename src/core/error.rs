// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for wirerep.
//!
//! Errors fall into two groups:
//! - Compile-time: grammar problems and unsupported conversions, reported once
//!   when a layout is compiled
//! - Per-message: structural mismatches, exhausted streams and unsupported
//!   image encodings, which abort only the message being transcoded

use std::fmt;
use std::io;

use crate::tagged::describe_code;

/// A single problem found while compiling a layout grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarIssue {
    /// Byte offset of the offending token in the grammar text
    pub position: usize,
    /// The offending token (empty when the grammar ended early)
    pub token: String,
    /// What is wrong with it
    pub message: String,
}

impl GrammarIssue {
    /// Create a new grammar issue.
    pub fn new(position: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            position,
            token: token.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for GrammarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token.is_empty() {
            write!(f, "at {}: {}", self.position, self.message)
        } else {
            write!(f, "at {} ('{}'): {}", self.position, self.token, self.message)
        }
    }
}

/// Errors that can occur while compiling layouts or transcoding messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TwiddleError {
    /// Malformed layout grammar (all problems found in one pass)
    #[error("Grammar error: {}", join_issues(.issues))]
    Grammar {
        /// Every problem found, in grammar order
        issues: Vec<GrammarIssue>,
    },

    /// Tagged-list bytes do not have the shape the layout expects
    #[error("Structure of message is unexpected in '{origin}': expected '{expected}', got '{received}'")]
    StructuralMismatch {
        /// Human-readable expected tag
        expected: String,
        /// Human-readable received tag
        received: String,
        /// Grammar fragment being processed
        origin: String,
    },

    /// The byte source ended before a length prefix or payload was complete
    #[error("Stream exhausted while reading {context}: {missing} more bytes needed")]
    StreamExhausted {
        /// What was being read
        context: String,
        /// Bytes still missing
        missing: usize,
    },

    /// Tagged and wire element sizes differ in a way no conversion covers
    #[error("Unsupported conversion in '{origin}': {flavor} of {unit_size} bytes carried as {wire_size} bytes")]
    UnsupportedConversion {
        /// Grammar fragment declaring the field
        origin: String,
        /// Primitive kind of the field
        flavor: String,
        /// Size of one element in the tagged representation
        unit_size: usize,
        /// Size of one element on the external wire
        wire_size: usize,
    },

    /// A derivation met an encoding name it cannot translate
    #[error("Unsupported encoding '{encoding}': {reason}")]
    UnsupportedEncoding {
        /// Encoding name as found on the wire
        encoding: String,
        /// Why it is not supported
        reason: String,
    },

    /// A derivation or load directive needs a property nobody saved
    #[error("Missing property '{name}' needed by {context}")]
    MissingProperty {
        /// Property name
        name: String,
        /// Directive that needed it
        context: String,
    },

    /// Malformed data (text literals, wire lengths, tag words)
    #[error("Parse error in {context}: {message}")]
    Parse {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Bad layout registry entry
    #[error("Configuration error in '{entry}': {message}")]
    Config {
        /// Registry entry (or file) at fault
        entry: String,
        /// Error message
        message: String,
    },

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(String),
}

fn join_issues(issues: &[GrammarIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl TwiddleError {
    /// Create a grammar error from collected issues.
    pub fn grammar(issues: Vec<GrammarIssue>) -> Self {
        TwiddleError::Grammar { issues }
    }

    /// Create a structural mismatch error from raw tag words.
    pub fn structural_mismatch(expected: i32, received: i32, origin: impl Into<String>) -> Self {
        TwiddleError::StructuralMismatch {
            expected: describe_code(expected),
            received: describe_code(received),
            origin: origin.into(),
        }
    }

    /// Create a stream exhausted error.
    pub fn stream_exhausted(context: impl Into<String>, missing: usize) -> Self {
        TwiddleError::StreamExhausted {
            context: context.into(),
            missing,
        }
    }

    /// Create an unsupported conversion error.
    pub fn unsupported_conversion(
        origin: impl Into<String>,
        flavor: impl Into<String>,
        unit_size: usize,
        wire_size: usize,
    ) -> Self {
        TwiddleError::UnsupportedConversion {
            origin: origin.into(),
            flavor: flavor.into(),
            unit_size,
            wire_size,
        }
    }

    /// Create an unsupported encoding error.
    pub fn unsupported_encoding(encoding: impl Into<String>, reason: impl Into<String>) -> Self {
        TwiddleError::UnsupportedEncoding {
            encoding: encoding.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing property error.
    pub fn missing_property(name: impl Into<String>, context: impl Into<String>) -> Self {
        TwiddleError::MissingProperty {
            name: name.into(),
            context: context.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        TwiddleError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(entry: impl Into<String>, message: impl Into<String>) -> Self {
        TwiddleError::Config {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Grammar issues, if this is a grammar error.
    pub fn issues(&self) -> &[GrammarIssue] {
        match self {
            TwiddleError::Grammar { issues } => issues,
            _ => &[],
        }
    }

    /// Wrap this error so it can travel through `std::io::Read`.
    ///
    /// Exhausted streams map to `UnexpectedEof`, everything else to `InvalidData`.
    pub fn into_io(self) -> io::Error {
        let kind = match self {
            TwiddleError::StreamExhausted { .. } => io::ErrorKind::UnexpectedEof,
            TwiddleError::Io(_) => io::ErrorKind::Other,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, self)
    }

    /// Recover a `TwiddleError` from an I/O error produced by [`into_io`](Self::into_io).
    ///
    /// Plain end-of-file errors become [`TwiddleError::StreamExhausted`].
    pub fn from_io(err: io::Error, context: &str) -> Self {
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<TwiddleError>()) {
            return inner.clone();
        }
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return TwiddleError::stream_exhausted(context, 0);
        }
        TwiddleError::Io(err.to_string())
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TwiddleError::Grammar { issues } => vec![
                ("issues", issues.len().to_string()),
                ("first", issues.first().map(ToString::to_string).unwrap_or_default()),
            ],
            TwiddleError::StructuralMismatch {
                expected,
                received,
                origin,
            } => vec![
                ("expected", expected.clone()),
                ("received", received.clone()),
                ("origin", origin.clone()),
            ],
            TwiddleError::StreamExhausted { context, missing } => {
                vec![("context", context.clone()), ("missing", missing.to_string())]
            }
            TwiddleError::UnsupportedConversion {
                origin,
                flavor,
                unit_size,
                wire_size,
            } => vec![
                ("origin", origin.clone()),
                ("flavor", flavor.clone()),
                ("unit_size", unit_size.to_string()),
                ("wire_size", wire_size.to_string()),
            ],
            TwiddleError::UnsupportedEncoding { encoding, reason } => {
                vec![("encoding", encoding.clone()), ("reason", reason.clone())]
            }
            TwiddleError::MissingProperty { name, context } => {
                vec![("name", name.clone()), ("context", context.clone())]
            }
            TwiddleError::Parse { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            TwiddleError::Config { entry, message } => {
                vec![("entry", entry.clone()), ("message", message.clone())]
            }
            TwiddleError::Io(msg) => vec![("message", msg.clone())],
        }
    }
}

impl From<io::Error> for TwiddleError {
    fn from(err: io::Error) -> Self {
        TwiddleError::from_io(err, "stream")
    }
}

/// Result type for wirerep operations.
pub type Result<T> = std::result::Result<T, TwiddleError>;
