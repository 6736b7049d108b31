// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decode path: external bytes in, tagged-list bytes out.
//!
//! [`TwiddleReader`] is a `std::io::Read` that interleaves the layout's
//! template tag words with payload pulled from the external source, so a
//! plain [`TaggedReader`] can parse the result as if the message had been
//! sent in the tagged format. Reads may return fewer bytes than requested;
//! callers use `read_exact` as with any other stream.

use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::core::{Result, TwiddleError, Value};
use crate::layout::{Conversion, Count, Gap, Layout, UnitSize};
use crate::tagged::TaggedReader;
use crate::twiddle::pad_byte;
use crate::twiddle::props::{PropValue, PropertyBag};

/// Where the reader is within the current gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Gap not entered yet; runs any derivation
    Start,
    /// Sending template bytes
    Template { sent: usize },
    /// Template done, payload not resolved yet
    Payload,
    /// Forwarding unconverted payload bytes
    Bytes { remaining: usize },
    /// Converting fixed-size elements one at a time
    Elements { remaining: usize },
    /// Variable-size elements left to start
    Strings { remaining: usize },
    /// Forwarding the body of one variable-size element
    StringBody { remaining: usize, strings: usize },
    /// Gap finished
    Done,
}

/// Streaming transcoder from an external layout to the tagged-list format.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::layout::Layout;
/// use wirerep::twiddle::TwiddleReader;
/// use wirerep::Value;
///
/// let layout = Layout::compile("list 2 int32 * vector int32 *")?;
/// let mut external = Vec::new();
/// for word in [7i32, 2, 10, 20] {
///     external.extend_from_slice(&word.to_le_bytes());
/// }
/// let mut reader = TwiddleReader::new(&layout, external.as_slice());
/// let value = reader.read_value()?;
/// assert_eq!(value, Value::List(vec![Value::Int32(7), Value::int32_list(&[10, 20])]));
/// # Ok(())
/// # }
/// ```
pub struct TwiddleReader<'a, R> {
    layout: &'a Layout,
    inner: R,
    props: PropertyBag,
    index: usize,
    phase: Phase,
    staged: Vec<u8>,
    staged_pos: usize,
    failed: Option<TwiddleError>,
}

impl<'a, R: Read> TwiddleReader<'a, R> {
    /// Create a reader for one message from `inner`.
    pub fn new(layout: &'a Layout, inner: R) -> Self {
        Self {
            layout,
            inner,
            props: PropertyBag::new(),
            index: 0,
            phase: Phase::Start,
            staged: Vec::with_capacity(8),
            staged_pos: 0,
            failed: None,
        }
    }

    /// Properties saved or computed so far.
    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }

    /// Mutable access, e.g. to seed properties before decoding.
    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.props
    }

    /// Whether no error has occurred.
    pub fn is_ok(&self) -> bool {
        self.failed.is_none()
    }

    /// The error that stopped this reader, if any.
    pub fn error(&self) -> Option<&TwiddleError> {
        self.failed.as_ref()
    }

    /// Whether every gap of the layout has been delivered.
    pub fn is_finished(&self) -> bool {
        self.index >= self.layout.gaps().len() && self.staged_pos >= self.staged.len()
    }

    /// Start over for the next message on the same source.
    pub fn reset(&mut self) {
        self.props.clear();
        self.index = 0;
        self.phase = Phase::Start;
        self.staged.clear();
        self.staged_pos = 0;
        self.failed = None;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decode one message into a value.
    pub fn read_value(&mut self) -> Result<Value> {
        let value = TaggedReader::new(&mut *self).read_value();
        let value = match (value, self.failed.clone()) {
            (_, Some(err)) => return Err(err),
            (value, None) => value?,
        };
        self.finish()?;
        Ok(value)
    }

    /// Run the remaining gaps (trailing skipped or computed fields).
    ///
    /// Fails if the layout still has tagged bytes to deliver.
    pub fn finish(&mut self) -> Result<()> {
        let left = io::copy(self, &mut io::sink())
            .map_err(|e| TwiddleError::from_io(e, "trailing fields"))?;
        if left != 0 {
            return Err(TwiddleError::parse(
                "twiddled stream",
                format!("{left} bytes left after the message"),
            ));
        }
        Ok(())
    }

    fn pump(&mut self, buf: &mut [u8]) -> Result<usize> {
        let layout = self.layout;
        loop {
            if self.staged_pos < self.staged.len() {
                let n = buf.len().min(self.staged.len() - self.staged_pos);
                buf[..n].copy_from_slice(&self.staged[self.staged_pos..self.staged_pos + n]);
                self.staged_pos += n;
                if self.staged_pos == self.staged.len() {
                    self.staged.clear();
                    self.staged_pos = 0;
                }
                return Ok(n);
            }

            let Some(gap) = layout.gaps().get(self.index) else {
                return Ok(0);
            };
            match self.phase {
                Phase::Start => {
                    if let Some(derivation) = gap.derivation() {
                        self.props.compute(derivation)?;
                    }
                    self.phase = Phase::Template { sent: 0 };
                }
                Phase::Template { sent } => {
                    let template = layout.gap_template(gap);
                    if sent < template.len() {
                        let n = buf.len().min(template.len() - sent);
                        buf[..n].copy_from_slice(&template[sent..sent + n]);
                        self.phase = Phase::Template { sent: sent + n };
                        return Ok(n);
                    }
                    self.phase = Phase::Payload;
                }
                Phase::Payload => self.phase = self.begin_payload(gap)?,
                Phase::Bytes { remaining } => {
                    if remaining == 0 {
                        self.phase = Phase::Done;
                        continue;
                    }
                    let want = buf.len().min(remaining);
                    let n = self.read_some(&mut buf[..want], remaining, gap)?;
                    self.phase = Phase::Bytes {
                        remaining: remaining - n,
                    };
                    return Ok(n);
                }
                Phase::Elements { remaining } => {
                    if remaining == 0 {
                        self.phase = Phase::Done;
                        continue;
                    }
                    self.stage_element(gap)?;
                    self.phase = Phase::Elements {
                        remaining: remaining - 1,
                    };
                }
                Phase::Strings { remaining } => {
                    if remaining == 0 {
                        self.phase = Phase::Done;
                        continue;
                    }
                    let len = self.read_length(gap)?;
                    self.stage_length(len);
                    self.phase = Phase::StringBody {
                        remaining: len,
                        strings: remaining - 1,
                    };
                }
                Phase::StringBody { remaining, strings } => {
                    if remaining == 0 {
                        self.phase = Phase::Strings { remaining: strings };
                        continue;
                    }
                    let want = buf.len().min(remaining);
                    let n = self.read_some(&mut buf[..want], remaining, gap)?;
                    self.phase = Phase::StringBody {
                        remaining: remaining - n,
                        strings,
                    };
                    return Ok(n);
                }
                Phase::Done => {
                    self.index += 1;
                    self.phase = Phase::Start;
                }
            }
        }
    }

    fn begin_payload(&mut self, gap: &Gap) -> Result<Phase> {
        if !gap.has_payload() {
            return Ok(Phase::Done);
        }
        if gap.ignores_external() {
            self.consume_ignored(gap)?;
            return Ok(Phase::Done);
        }
        if gap.loads_external() {
            self.stage_loaded(gap)?;
            return Ok(Phase::Done);
        }

        let count = match gap.count() {
            Count::Fixed(n) => n,
            Count::FromWire => {
                let n = self.read_length(gap)?;
                self.stage_length(n);
                n
            }
        };
        Ok(match (gap.unit(), gap.conversion()) {
            (UnitSize::Variable, _) => Phase::Strings { remaining: count },
            (UnitSize::Fixed(unit), Conversion::Identity) => Phase::Bytes {
                remaining: checked_size(count, unit, gap)?,
            },
            (UnitSize::Fixed(_), _) => Phase::Elements { remaining: count },
        })
    }

    /// Read and drop an external-only field, saving it if asked to.
    fn consume_ignored(&mut self, gap: &Gap) -> Result<()> {
        let count = match gap.count() {
            Count::Fixed(n) => n,
            Count::FromWire => self.read_length(gap)?,
        };
        let mut data = Vec::new();
        match gap.wire_unit() {
            UnitSize::Fixed(unit) => {
                let total = checked_size(count, unit, gap)?;
                self.read_into(&mut data, total, gap)?;
            }
            UnitSize::Variable => {
                for _ in 0..count {
                    let len = self.read_length(gap)?;
                    self.read_into(&mut data, len, gap)?;
                }
            }
        }

        if let (true, Some(name)) = (gap.saves_external(), gap.bound_name()) {
            let value = match (gap.count(), gap.wire_unit(), gap.flavor()) {
                (Count::Fixed(1), UnitSize::Fixed(_), Some(flavor)) if flavor.is_integer() => {
                    PropValue::Int(sign_extend(&data))
                }
                _ => PropValue::Bytes(data),
            };
            debug!(context = "twiddle_reader", name, value = ?value, "saved property");
            self.props.put(name, value);
        } else {
            debug!(
                context = "twiddle_reader",
                origin = gap.origin(),
                bytes = data.len(),
                "skipped external field"
            );
        }
        Ok(())
    }

    fn stage_loaded(&mut self, gap: &Gap) -> Result<()> {
        let name = gap.bound_name().unwrap_or_default();
        let value = match gap.literal() {
            Some(v) => v,
            None => self
                .props
                .get_int(name)
                .ok_or_else(|| TwiddleError::missing_property(name, gap.origin()))?,
        };
        let UnitSize::Fixed(unit) = gap.unit() else {
            return Err(TwiddleError::parse(gap.origin(), "load into a variable-size field"));
        };
        debug!(context = "twiddle_reader", name, value, "loaded property");
        self.staged.extend_from_slice(&value.to_le_bytes()[..unit.min(8)]);
        Ok(())
    }

    fn stage_element(&mut self, gap: &Gap) -> Result<()> {
        match (gap.conversion(), gap.unit()) {
            (Conversion::NarrowFloat64, _) => {
                let mut wire = [0u8; 4];
                self.fill(&mut wire, gap)?;
                let value = f64::from(LittleEndian::read_f32(&wire));
                self.staged.extend_from_slice(&value.to_le_bytes());
            }
            (Conversion::Pad { wire, signed }, UnitSize::Fixed(unit)) => {
                let mut bytes = [0u8; 8];
                self.fill(&mut bytes[..wire], gap)?;
                let (kept, dropped) = bytes[..wire].split_at(unit);
                let fill = pad_byte(kept, signed);
                if dropped.iter().any(|&b| b != fill) {
                    return Err(TwiddleError::parse(
                        gap.origin(),
                        format!("external value does not fit in {unit} bytes"),
                    ));
                }
                self.staged.extend_from_slice(kept);
            }
            (_, UnitSize::Fixed(unit)) => {
                let mut bytes = [0u8; 8];
                self.fill(&mut bytes[..unit], gap)?;
                self.staged.extend_from_slice(&bytes[..unit]);
            }
            (_, UnitSize::Variable) => {
                return Err(TwiddleError::unsupported_conversion(
                    gap.origin(),
                    gap.flavor().map_or("data", |f| f.name()),
                    0,
                    0,
                ))
            }
        }
        Ok(())
    }

    fn stage_length(&mut self, len: usize) {
        // read_length only yields values that came from an i32
        self.staged.extend_from_slice(&(len as i32).to_le_bytes());
    }

    fn read_length(&mut self, gap: &Gap) -> Result<usize> {
        let mut word = [0u8; 4];
        self.fill(&mut word, gap)?;
        let len = LittleEndian::read_i32(&word);
        usize::try_from(len).map_err(|_| {
            TwiddleError::parse(
                format!("length prefix of '{}'", gap.origin()),
                format!("negative length {len}"),
            )
        })
    }

    /// Fill `bytes` completely from the source.
    fn fill(&mut self, bytes: &mut [u8], gap: &Gap) -> Result<()> {
        let mut got = 0;
        while got < bytes.len() {
            match self.inner.read(&mut bytes[got..]) {
                Ok(0) => {
                    return Err(TwiddleError::stream_exhausted(
                        gap.origin(),
                        bytes.len() - got,
                    ))
                }
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TwiddleError::from_io(e, gap.origin())),
            }
        }
        Ok(())
    }

    /// One read of at most `buf.len()` payload bytes.
    fn read_some(&mut self, buf: &mut [u8], remaining: usize, gap: &Gap) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(0) => return Err(TwiddleError::stream_exhausted(gap.origin(), remaining)),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TwiddleError::from_io(e, gap.origin())),
            }
        }
    }

    fn read_into(&mut self, data: &mut Vec<u8>, len: usize, gap: &Gap) -> Result<()> {
        let got = (&mut self.inner)
            .take(len as u64)
            .read_to_end(data)
            .map_err(|e| TwiddleError::from_io(e, gap.origin()))?;
        if got < len {
            return Err(TwiddleError::stream_exhausted(gap.origin(), len - got));
        }
        Ok(())
    }
}

impl<R: Read> Read for TwiddleReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.failed {
            return Err(err.clone().into_io());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.pump(buf).map_err(|err| {
            self.failed = Some(err.clone());
            err.into_io()
        })
    }
}

fn checked_size(count: usize, unit: usize, gap: &Gap) -> Result<usize> {
    count.checked_mul(unit).ok_or_else(|| {
        TwiddleError::parse(gap.origin(), format!("{count} elements of {unit} bytes overflow"))
    })
}

/// Little-endian two's complement value of up to eight bytes.
fn sign_extend(bytes: &[u8]) -> i64 {
    let n = bytes.len().min(8);
    if n == 0 {
        return 0;
    }
    let mut buf = [0u8; 8];
    buf[..n].copy_from_slice(&bytes[..n]);
    let shift = 64 - 8 * n as u32;
    (LittleEndian::read_i64(&buf) << shift) >> shift
}
