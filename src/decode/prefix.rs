//! XS1 instructions are one or two halfwords. The first halfword alone tells
//! us which: it is a complete instruction, a PFIX carrying high immediate
//! bits for whatever follows, or an escape into the long formats. PFIX may
//! repeat, each one adding 10 more bits above the last.

use log::trace;

pub use crate::decode::{Decoder, DecodeError, DecodeResult};
use crate::decode::common::read_half;
use crate::instruction::Instruction;
use crate::table::{Kind, Table, Width, PFIX_BITS};

/// Immediate bits from PFIX units that precede the pair being decoded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Accumulator {
    value: u32,
    count: usize,
}

impl Accumulator {
    /// Bits past the top of the register fall off.
    fn push(self, pfix: u16) -> Accumulator {
        let imm = pfix as u32 & ((1 << PFIX_BITS) - 1);
        Accumulator {
            value: (self.value << PFIX_BITS) | imm,
            count: self.count + 1,
        }
    }
}

pub struct XS1Decoder {
    table: &'static Table,
}

impl XS1Decoder {
    pub fn new() -> XS1Decoder {
        XS1Decoder { table: Table::get() }
    }

    fn is_prefix(&self, h: u16) -> bool {
        match self.table.lookup(h as u32, Width::Short) {
            Some(e) => e.kind == Kind::Prefix,
            None => false,
        }
    }

    /// Decodes the long word starting at byte `at`, whose first halfword is
    /// `low`. Earlier prefixes are in `acc`; `first` is reported if nothing
    /// matches.
    fn long(&self, bytes: &[u8], at: usize, low: u16, acc: Accumulator, first: u16) -> DecodeResult<DecodeError> {
        let high = read_half(bytes, at + 2)?;
        let word = low as u32 | (high as u32) << 16;
        match self.table.lookup(word, Width::Long) {
            Some(e) => Ok((Instruction::decode(e, word, acc.value), at + 4)),
            None => Err(DecodeError::UnmatchedEncoding { word: first }),
        }
    }
}

impl Default for XS1Decoder {
    fn default() -> XS1Decoder { XS1Decoder::new() }
}

impl Decoder<DecodeError> for XS1Decoder {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<DecodeError> {
        let first = read_half(bytes, 0)?;
        let e = match self.table.lookup(first as u32, Width::Short) {
            Some(e) => e,
            None => return Err(DecodeError::UnmatchedEncoding { word: first }),
        };

        match e.kind {
            Kind::Terminal => Ok((Instruction::decode(e, first as u32, 0), 2)),
            Kind::Escape => self.long(bytes, 0, first, Accumulator::default(), first),
            Kind::Prefix => {
                let mut acc = Accumulator::default();
                let mut at = 0;
                let mut low = first;
                loop {
                    let next = read_half(bytes, at + 2)?;
                    if !self.is_prefix(next) {
                        return self.long(bytes, at, low, acc, first);
                    }
                    acc = acc.push(low);
                    trace!("pfix {:#05x}, {} accumulated: {:#x}", low & 0x3ff, acc.count, acc.value);
                    low = next;
                    at += 2;
                }
            }
        }
    }
}

#[cfg(test)]
use crate::decode::{decode_all, Record};

#[cfg(test)]
use crate::instruction::Mode;

#[cfg(test)]
fn records(bytes: &[u8]) -> Vec<Record> {
    decode_all(bytes).collect()
}

#[cfg(test)]
fn names(bytes: &[u8]) -> Vec<String> {
    decode_all(bytes)
        .map(|r| match r.result {
            Ok(i) => i.architectural(),
            Err(e) => e.to_string(),
        })
        .collect()
}

#[test]
fn test_accumulator() {
    let acc = Accumulator::default().push(0xf001).push(0xf3ff);
    assert_eq!(acc.value, 0x7ff);
    assert_eq!(acc.count, 2);

    let acc = (0..4).fold(Accumulator::default(), |a, _| a.push(0xf3ff));
    assert_eq!(acc.value, 0xffff_ffff);
}

#[test]
fn test_short_and_escape() {
    let bytes = [
        0xdd, 0xa6,             // mkmsk r3, 1
        0x9d, 0x5d,             // ldw r6, sp[0x1d]
        0x1b, 0xf8, 0xec, 0x07, // stw r1, r2[r3]
        0x1c, 0x14,             // add r5, r11, r4
    ];
    assert_eq!(names(&bytes), vec!["MKMSK_rus", "LDWSP_ru6", "STW_l3r", "ADD_3r"]);

    let rs = records(&bytes);
    let offsets: Vec<usize> = rs.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4, 8]);
    assert_eq!(rs[2].width, 4);
}

#[test]
fn test_ru6_high_registers() {
    assert_eq!(names(&[0x00, 0x53]), vec!["STWDP_ru6"]);
    assert_eq!(names(&[0xc0, 0x5f]), vec!["LDWSP_ru6"]);

    let rs = records(&[0x00, 0xf0, 0x00, 0x53]);
    assert_eq!(rs.len(), 1);
    assert_eq!(rs[0].width, 4);
    let i = rs[0].instruction().unwrap();
    assert_eq!(i.architectural(), "STWDP_lru6");
    assert_eq!(i.values(), vec![12, 0]);
}

#[test]
fn test_restartable() {
    let bytes = [0x01, 0xf0, 0x83, 0x68, 0xff, 0xff, 0xdd, 0xa6, 0x1b];
    let a = records(&bytes);
    let b = records(&bytes);
    assert_eq!(a, b);
    assert_eq!(a.iter().map(|r| r.width).sum::<usize>(), bytes.len());
}

#[test]
fn test_prefix_chain() {
    let rs = records(&[0x01, 0xf0, 0x02, 0xf0, 0x83, 0x68]);
    assert_eq!(rs.len(), 1);
    assert_eq!(rs[0].width, 6);
    let i = rs[0].instruction().unwrap();
    assert_eq!(i.architectural(), "LDC_lru6");
    assert_eq!(i.operand("op1"), Some(2));
    assert_eq!(i.operand("op2"), Some(0x10083));

    let rs = records(&[0xff, 0xf3, 0xbf, 0x68]);
    assert_eq!(rs[0].width, 4);
    assert_eq!(rs[0].instruction().unwrap().operand("op2"), Some(0xffff));
}

#[test]
fn test_unmatched() {
    let rs = records(&[0xff, 0xff]);
    assert_eq!(rs, vec![Record {
        offset: 0,
        width: 2,
        result: Err(DecodeError::UnmatchedEncoding { word: 0xffff }),
    }]);

    // PFIX before something that has no long form resyncs after the PFIX
    let rs = records(&[0x01, 0xf0, 0x1c, 0x14]);
    assert_eq!(rs.len(), 2);
    assert_eq!(rs[0].result, Err(DecodeError::UnmatchedEncoding { word: 0xf001 }));
    assert_eq!(rs[0].width, 2);
    assert_eq!(rs[1].instruction().unwrap().architectural(), "ADD_3r");
}

#[test]
fn test_truncated() {
    let rs = records(&[0x00]);
    assert_eq!(rs, vec![Record {
        offset: 0,
        width: 1,
        result: Err(DecodeError::TruncatedInput { needed: 2, available: 1 }),
    }]);

    let rs = records(&[0xdd, 0xa6, 0x01, 0xf0, 0x02, 0xf0]);
    assert_eq!(rs.len(), 2);
    assert_eq!(rs[1].offset, 2);
    assert_eq!(rs[1].width, 4);
    assert_eq!(rs[1].result, Err(DecodeError::TruncatedInput { needed: 6, available: 4 }));

    assert!(records(&[]).is_empty());
}

#[test]
fn test_modes() {
    let rs = records(&[0x9d, 0x5d]);
    let i = rs[0].instruction().unwrap();
    assert_eq!(i.render(&Mode::Default), "ldw (ru6)");
    assert_eq!(i.render(&Mode::Substitute), "LDWSP_ru6");
}

#[cfg(test)]
fn sample_values(e: &crate::table::Encoding) -> Vec<u32> {
    use crate::instruction::OperandKind;
    use crate::table::Field;

    let regs = [3, 7, 10, 1, 5, 11];
    e.fields().iter().enumerate()
        .map(|(n, spec)| match (e.operand_kind(spec), spec.field) {
            (OperandKind::Register, _) => regs[n],
            (OperandKind::BitPosition, _) => 8,
            (_, Field::Packed { .. }) => 7,
            (_, Field::Slice { width, .. }) => 0x2a5 & ((1 << width) - 1),
            (_, Field::Extended { hi, lo }) => 0x1234 & ((1 << (hi.1 + lo.1)) - 1),
        })
        .collect()
}

#[test]
fn test_round_trip() {
    for e in Table::get().iter().filter(|e| e.kind == Kind::Terminal) {
        let values = sample_values(e);
        let word = match e.encode(&values) {
            Some(w) => w,
            None => panic!("cannot encode {} with {:?}", e, values),
        };
        let bytes = word.to_le_bytes();
        let bytes = &bytes[..e.width().bytes()];

        let rs = records(bytes);
        assert_eq!(rs.len(), 1, "{}", e);
        let i = match rs[0].instruction() {
            Some(i) => i,
            None => panic!("{} encoded as {:#x} did not decode", e, word),
        };
        assert_eq!(i.architectural(), e.architectural());
        assert_eq!(i.values(), values, "{}", e);
        assert_eq!(rs[0].width, e.width().bytes());
    }
}
