// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Encode path: buffered tagged-list bytes in, external bytes out.
//!
//! [`TwiddleWriter`] walks a [`BlockBuffer`] produced by the tagged
//! serializer once per message. Tag words are checked against the layout
//! template and dropped; payload is described as [`Segment`]s that point
//! back into the source blocks, or into a scratch buffer for converted and
//! padded values. Adjacent segments are merged so a typical message flushes
//! in a handful of writes.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, error};

use crate::core::{Result, TwiddleError};
use crate::layout::{Conversion, Count, Gap, Layout, UnitSize};
use crate::tagged::{BlockBuffer, TAG_LIST};
use crate::twiddle::pad_byte;

/// One output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Bytes of a source block
    Source {
        block: usize,
        start: usize,
        len: usize,
    },
    /// Bytes of the writer's scratch buffer
    Scratch { start: usize, len: usize },
}

impl Segment {
    pub fn len(&self) -> usize {
        match *self {
            Segment::Source { len, .. } | Segment::Scratch { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tag words of a list whose check waits for its length.
#[derive(Debug, Clone, Copy)]
struct Deferred {
    expected: i32,
    received: i32,
}

/// Re-chunking transcoder from a buffered tagged-list message to an external
/// layout.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::layout::Layout;
/// use wirerep::tagged::TaggedWriter;
/// use wirerep::twiddle::TwiddleWriter;
/// use wirerep::Value;
///
/// let layout = Layout::compile("list 2 int32 * vector int32 *")?;
/// let mut tagged = TaggedWriter::new();
/// tagged.write(&Value::List(vec![Value::Int32(7), Value::int32_list(&[10, 20])]))?;
/// let blocks = tagged.finish();
///
/// let mut writer = TwiddleWriter::new(&layout, &blocks);
/// assert!(writer.update());
/// let expected: Vec<u8> = [7i32, 2, 10, 20].iter().flat_map(|w| w.to_le_bytes()).collect();
/// assert_eq!(writer.to_vec(), expected);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TwiddleWriter<'a> {
    layout: &'a Layout,
    source: &'a BlockBuffer,
    block: usize,
    offset: usize,
    last_byte: u8,
    segments: Vec<Segment>,
    scratch: Vec<u8>,
    deferred: Option<Deferred>,
    error: Option<TwiddleError>,
}

impl<'a> TwiddleWriter<'a> {
    /// Prepare to transcode the message held in `source`.
    pub fn new(layout: &'a Layout, source: &'a BlockBuffer) -> Self {
        Self {
            layout,
            source,
            block: source.header_len(),
            offset: 0,
            last_byte: 0,
            segments: Vec::new(),
            scratch: Vec::new(),
            deferred: None,
            error: None,
        }
    }

    /// Walk every gap once, building the output segments.
    ///
    /// Returns `false` if the message does not match the layout; see
    /// [`error`](Self::error). Mismatches do not stop the walk, only running
    /// out of source bytes does.
    pub fn update(&mut self) -> bool {
        self.block = self.source.header_len();
        self.offset = 0;
        self.last_byte = 0;
        self.segments.clear();
        self.scratch.clear();
        self.deferred = None;
        self.error = None;

        let layout = self.layout;
        for gap in layout.gaps() {
            if let Err(err) = self.walk(gap) {
                self.record(err);
                break;
            }
        }
        if self.error.is_none() {
            let left = self.remaining_source();
            if left > 0 {
                self.record(TwiddleError::StructuralMismatch {
                    expected: "end of message".to_string(),
                    received: format!("{left} more bytes"),
                    origin: layout.grammar().to_string(),
                });
            }
        }
        debug!(
            context = "twiddle_writer",
            segments = self.segments.len(),
            bytes = self.output_len(),
            ok = self.error.is_none(),
            "encode pass finished"
        );
        self.error.is_none()
    }

    /// The first problem found by the last [`update`](Self::update).
    pub fn error(&self) -> Option<&TwiddleError> {
        self.error.as_ref()
    }

    /// Output ranges in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Bytes of one output range.
    pub fn segment_bytes(&self, segment: &Segment) -> &[u8] {
        match *segment {
            Segment::Source { block, start, len } => &self.source.block(block)[start..start + len],
            Segment::Scratch { start, len } => &self.scratch[start..start + len],
        }
    }

    /// Total output size in bytes.
    pub fn output_len(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Flush every output range to `out`.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        for segment in &self.segments {
            out.write_all(self.segment_bytes(segment))?;
        }
        Ok(())
    }

    /// Output as one contiguous buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.output_len());
        for segment in &self.segments {
            out.extend_from_slice(self.segment_bytes(segment));
        }
        out
    }

    fn record(&mut self, err: TwiddleError) {
        if self.error.is_some() {
            debug!(context = "twiddle_writer", error = %err, "further problem suppressed");
            return;
        }
        let fields = err.log_fields();
        error!(
            context = "twiddle_writer",
            grammar = self.layout.grammar(),
            fields = ?fields,
            "{err}"
        );
        self.error = Some(err);
    }

    fn mismatch(&mut self, expected: i32, received: i32, gap: &Gap) {
        let origin = self.origin_of(gap);
        self.record(TwiddleError::structural_mismatch(expected, received, origin));
    }

    fn origin_of(&self, gap: &Gap) -> String {
        if gap.origin().is_empty() {
            self.layout.grammar().to_string()
        } else {
            gap.origin().to_string()
        }
    }

    fn walk(&mut self, gap: &Gap) -> Result<()> {
        let layout = self.layout;
        let template = layout.gap_template(gap);
        if !template.is_empty() {
            self.check_template(template, gap)?;
        }
        if !gap.has_payload() || gap.ignores_external() {
            return Ok(());
        }
        if gap.loads_external() {
            // Injected on decode, so it has no external bytes
            if let UnitSize::Fixed(unit) = gap.unit() {
                self.skip(unit)?;
            }
            return Ok(());
        }

        let count = match gap.count() {
            Count::Fixed(n) => n,
            Count::FromWire => self.read_length(gap)?,
        };
        match (gap.unit(), gap.conversion()) {
            (UnitSize::Variable, _) => {
                for _ in 0..count {
                    let len = self.read_length(gap)?;
                    self.pass(len)?;
                }
            }
            (UnitSize::Fixed(unit), Conversion::Identity) => {
                let total = count.checked_mul(unit).ok_or_else(|| {
                    TwiddleError::parse(gap.origin(), "payload size overflows")
                })?;
                self.pass(total)?;
            }
            (UnitSize::Fixed(_), Conversion::NarrowFloat64) => {
                for _ in 0..count {
                    let wide = LittleEndian::read_f64(&self.read_array::<8>()?);
                    self.emit_scratch(&(wide as f32).to_le_bytes());
                }
            }
            (UnitSize::Fixed(unit), Conversion::Pad { wire, signed }) => {
                for _ in 0..count {
                    self.pass(unit)?;
                    let fill = pad_byte(&[self.last_byte], signed);
                    self.pad(wire.saturating_sub(unit), fill);
                }
            }
        }
        Ok(())
    }

    /// Consume the tag words of a template, comparing each with the source.
    ///
    /// A list tag that differs from the expected one is tolerated until the
    /// list's length is known: an empty list is written with a bare `LIST`
    /// tag whatever its declared element type.
    fn check_template(&mut self, template: &[u8], gap: &Gap) -> Result<()> {
        let mut after_list_tag = false;
        for chunk in template.chunks_exact(4) {
            let expected = LittleEndian::read_i32(chunk);
            let received = LittleEndian::read_i32(&self.take_array::<4>(false)?);
            if after_list_tag {
                after_list_tag = false;
                self.settle_deferred(received, gap);
                if expected != received {
                    self.record(TwiddleError::StructuralMismatch {
                        expected: format!("length {expected}"),
                        received: format!("length {received}"),
                        origin: self.origin_of(gap),
                    });
                }
                continue;
            }
            after_list_tag = expected & TAG_LIST != 0;
            if expected == received {
                continue;
            }
            if expected & TAG_LIST != 0 && received & TAG_LIST != 0 {
                self.deferred = Some(Deferred { expected, received });
            } else {
                self.mismatch(expected, received, gap);
            }
        }
        Ok(())
    }

    fn settle_deferred(&mut self, length: i32, gap: &Gap) {
        if let Some(Deferred { expected, received }) = self.deferred.take() {
            if length != 0 {
                self.mismatch(expected, received, gap);
            }
        }
    }

    /// Pass a 4-byte length prefix through and return its value.
    fn read_length(&mut self, gap: &Gap) -> Result<usize> {
        let len = LittleEndian::read_i32(&self.take_array::<4>(true)?);
        self.settle_deferred(len, gap);
        usize::try_from(len).map_err(|_| {
            TwiddleError::parse(
                format!("length prefix of '{}'", gap.origin()),
                format!("negative length {len}"),
            )
        })
    }

    /// Next contiguous piece of at most `max` source bytes.
    fn next_piece(&mut self, max: usize) -> Result<(usize, usize, usize)> {
        loop {
            if self.block >= self.source.block_count() {
                return Err(TwiddleError::stream_exhausted("buffered message", max));
            }
            let available = self.source.block(self.block).len() - self.offset;
            if available == 0 {
                self.block += 1;
                self.offset = 0;
                continue;
            }
            let n = available.min(max);
            let start = self.offset;
            self.offset += n;
            return Ok((self.block, start, n));
        }
    }

    fn advance(&mut self, mut len: usize, emit: bool) -> Result<()> {
        while len > 0 {
            let (block, start, n) = self.next_piece(len)?;
            self.last_byte = self.source.block(block)[start + n - 1];
            if emit {
                self.emit_source(block, start, n);
            }
            len -= n;
        }
        Ok(())
    }

    fn pass(&mut self, len: usize) -> Result<()> {
        self.advance(len, true)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.advance(len, false)
    }

    fn take_array<const N: usize>(&mut self, emit: bool) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        let mut got = 0;
        while got < N {
            let (block, start, n) = self.next_piece(N - got)?;
            out[got..got + n].copy_from_slice(&self.source.block(block)[start..start + n]);
            if emit {
                self.emit_source(block, start, n);
            }
            got += n;
        }
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take_array::<N>(false)
    }

    fn emit_source(&mut self, block: usize, start: usize, len: usize) {
        if let Some(Segment::Source {
            block: last_block,
            start: last_start,
            len: last_len,
        }) = self.segments.last_mut()
        {
            if *last_block == block && *last_start + *last_len == start {
                *last_len += len;
                return;
            }
        }
        self.segments.push(Segment::Source { block, start, len });
    }

    fn emit_scratch(&mut self, bytes: &[u8]) {
        let start = self.scratch.len();
        self.scratch.extend_from_slice(bytes);
        self.extend_scratch(start, bytes.len());
    }

    fn pad(&mut self, len: usize, fill: u8) {
        if len == 0 {
            return;
        }
        let start = self.scratch.len();
        self.scratch.resize(start + len, fill);
        self.extend_scratch(start, len);
    }

    fn extend_scratch(&mut self, start: usize, len: usize) {
        if let Some(Segment::Scratch {
            start: last_start,
            len: last_len,
        }) = self.segments.last_mut()
        {
            if *last_start + *last_len == start {
                *last_len += len;
                return;
            }
        }
        self.segments.push(Segment::Scratch { start, len });
    }

    fn remaining_source(&self) -> usize {
        if self.block >= self.source.block_count() {
            return 0;
        }
        let current = self.source.block(self.block).len() - self.offset;
        let later: usize = (self.block + 1..self.source.block_count())
            .map(|i| self.source.block(i).len())
            .sum();
        current + later
    }
}
