use log::debug;
use thiserror::Error;

use crate::instruction::Instruction;

pub mod common;
pub mod prefix;

pub use self::prefix::XS1Decoder;

/// Why a step produced a marker instead of an instruction. A marker never
/// stops the stream; `TruncatedInput` covers the rest of the input, so it is
/// always the last record.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown encoding {word:#06x}")]
    UnmatchedEncoding { word: u16 },
    #[error("truncated instruction: need {needed} bytes, have {available}")]
    TruncatedInput { needed: usize, available: usize },
}

impl DecodeError {
    /// Bytes covered by the marker record.
    pub fn width(&self) -> usize {
        match *self {
            DecodeError::UnmatchedEncoding { .. } => 2,
            DecodeError::TruncatedInput { available, .. } => available,
        }
    }
}

pub type DecodeResult<E> = Result<(Instruction, usize), E>;

/// Decodes the instruction at the start of `bytes`, giving it and its width
/// in bytes.
pub trait Decoder<E> {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<E>;
}

/// One step of a decode: an instruction or a marker, and the bytes it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub offset: usize,
    pub width: usize,
    pub result: Result<Instruction, DecodeError>,
}

impl Record {
    pub fn instruction(&self) -> Option<&Instruction> { self.result.as_ref().ok() }
}

/// The records of a byte buffer, decoded lazily from the front.
pub struct Records<'a, D> {
    decoder: D,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a, D: Decoder<DecodeError>> Records<'a, D> {
    pub fn new(decoder: D, bytes: &'a [u8]) -> Records<'a, D> {
        Records { decoder: decoder, bytes: bytes, offset: 0 }
    }
}

impl<'a, D: Decoder<DecodeError>> Iterator for Records<'a, D> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.bytes[offset..];
        let (result, width) = match self.decoder.decode(rest) {
            Ok((insn, width)) => (Ok(insn), width),
            Err(e) => {
                debug!("{:#x}: {}", offset, e);
                let width = e.width().min(rest.len());
                (Err(e), width)
            }
        };

        // a truncated step consumes everything that is left
        self.offset = if let Err(DecodeError::TruncatedInput { .. }) = result {
            self.bytes.len()
        } else {
            offset + width
        };

        Some(Record { offset: offset, width: width, result: result })
    }
}

/// Decodes every instruction in `bytes` with the XS1 table.
pub fn decode_all(bytes: &[u8]) -> Records<'_, XS1Decoder> {
    Records::new(XS1Decoder::new(), bytes)
}
