//! Decoder for the XMOS XS1(b) instruction set.
//!
//! `decode::decode_all` turns a byte buffer into a sequence of records, each
//! an instruction or a marker for bytes that could not be decoded. The `line`
//! module wraps that for hex and `xobjdump -d` text.

pub mod decode;
pub mod instruction;
pub mod line;
pub mod table;
