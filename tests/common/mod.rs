// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::io::{self, Read};

// ============================================================================
// Wire Builders
// ============================================================================

/// Little-endian builder for hand-written external messages.
#[derive(Debug, Default, Clone)]
pub struct Wire {
    bytes: Vec<u8>,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i8(mut self, v: i8) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f64(mut self, v: f64) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Length-prefixed bytes.
    pub fn text(mut self, v: &str) -> Self {
        self = self.i32(v.len() as i32);
        self.bytes.extend_from_slice(v.as_bytes());
        self
    }

    pub fn raw(mut self, v: &[u8]) -> Self {
        self.bytes.extend_from_slice(v);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Little-endian bytes of a sequence of i32 words.
pub fn words(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|w| w.to_le_bytes()).collect()
}

// ============================================================================
// Readers
// ============================================================================

/// A source that never returns more than `chunk` bytes per read.
pub struct ChunkedReader<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl<'a> ChunkedReader<'a> {
    pub fn new(data: &'a [u8], chunk: usize) -> Self {
        Self {
            data,
            chunk: chunk.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Read everything from `reader` one byte per call.
pub fn read_bytewise<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte)? {
            0 => return Ok(out),
            _ => out.push(byte[0]),
        }
    }
}
