//! The XS1 instruction table. Each known encoding is described by a fixed-bit
//! mask and match value over the instruction word, plus a shape for each
//! halfword that constrains the bits used to pack operands. A word matches an
//! encoding when its fixed bits agree and every halfword admits the shape.
//!
//! XS1 packs up to three register operands into the low 11 bits of a
//! halfword, and uses the *value range* of those bits to tell the operand
//! count apart. That is not expressible as a mask, which is why shapes exist
//! at all.
//!
//! Short encodings are one halfword. Long encodings are two: the first in
//! memory is the low 16 bits of the word, and is either a PFIX prefix or an
//! escape into the operand-rich long formats.
//!
//! The table is checked when built: two encodings of the same width whose
//! fixed bits agree must have disjoint shapes on some halfword, so at most
//! one encoding ever matches a word. Buckets are still ordered most fixed
//! bits first.

use std::fmt;
use std::sync::OnceLock;

use thiserror::Error;

use crate::decode::common::{
    bitp_index, bits, combined2, half, mask, pack2, pack3, unpack2, unpack3, REGISTERS,
};
use crate::instruction::OperandKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    Short,
    Long,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Short => 2,
            Width::Long  => 4,
        }
    }

    pub fn bits(self) -> u32 { self.bytes() as u32 * 8 }

    fn halves(self) -> u8 { self.bytes() as u8 / 2 }
}

/// What the decoder does with a matched encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// PFIX: carries immediate bits for the instruction that follows.
    Prefix,
    /// First halfword of a long instruction; the next halfword is needed.
    Escape,
    /// A complete instruction.
    Terminal,
}

/// Constraint on the operand bits of one halfword.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Any,
    /// Three packed operands: bits 10:6 below 27.
    Packed3,
    /// Two packed operands in the values above 27, extended by bit 5.
    Packed2,
    /// Either of the packed forms.
    Packed,
    /// One register in bits 3:0, bits 10:5 all set.
    Single,
    /// No operands: bits 10:5 all set and bits 3:0 above the registers.
    Bare,
    /// Register in bits 9:6 with a 6 bit immediate.
    RegImm6,
    /// Bits 9:6 above the registers; a 6 bit immediate alone.
    Imm6,
}

impl Shape {
    pub fn admits(self, h: u16) -> bool {
        let w = h as u32;
        match self {
            Shape::Any     => true,
            Shape::Packed3 => bits(w, 10, 6) < 27,
            Shape::Packed2 => combined2(h).is_some(),
            Shape::Packed  => Shape::Packed3.admits(h) || Shape::Packed2.admits(h),
            Shape::Single  => bits(w, 10, 5) == 0x3f && bits(w, 3, 0) < REGISTERS,
            Shape::Bare    => bits(w, 10, 5) == 0x3f && bits(w, 3, 0) >= REGISTERS,
            Shape::RegImm6 => bits(w, 9, 6) < REGISTERS,
            Shape::Imm6    => bits(w, 9, 6) >= REGISTERS,
        }
    }

    /// Bits a halfword of this shape always has set.
    fn marker(self) -> u16 {
        match self {
            Shape::Single | Shape::Bare => 0x07e0,
            _ => 0,
        }
    }

    /// True when no halfword can satisfy both shapes.
    pub fn disjoint(self, other: Shape) -> bool {
        use self::Shape::*;
        match (self, other) {
            (Packed3, Packed2) | (Packed2, Packed3) => true,
            (Packed3, Single) | (Packed3, Bare) | (Packed2, Single) | (Packed2, Bare)
            | (Packed, Single) | (Packed, Bare) => true,
            (Single, Packed3) | (Bare, Packed3) | (Single, Packed2) | (Bare, Packed2)
            | (Single, Packed) | (Bare, Packed) => true,
            (Single, Bare) | (Bare, Single) => true,
            (RegImm6, Imm6) | (Imm6, RegImm6) => true,
            _ => false,
        }
    }
}

/// Where an operand's bits live in the instruction word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field {
    /// A plain bit range.
    Slice { shift: u8, width: u8 },
    /// Operand `slot` of the `of`-way packed group in halfword `half`.
    Packed { half: u8, slot: u8, of: u8 },
    /// An immediate split across a prefix and the instruction proper; `hi`
    /// supplies the upper bits. Earlier prefixes extend it further.
    Extended { hi: (u8, u8), lo: (u8, u8) },
}

impl Field {
    fn extract(self, word: u32, prefix: u32) -> u32 {
        match self {
            Field::Slice { shift, width } => bits_at(word, shift, width),
            Field::Packed { half: n, slot, of } => {
                let h = half(word, n);
                if of == 3 {
                    unpack3(h, slot)
                } else {
                    unpack2(h, slot)
                }
            }
            Field::Extended { hi, lo } => {
                let upper = (prefix << hi.1) | bits_at(word, hi.0, hi.1);
                (upper << lo.1) | bits_at(word, lo.0, lo.1)
            }
        }
    }

    /// Highest bit position used, plus one.
    fn end(self) -> u32 {
        match self {
            Field::Slice { shift, width } => shift as u32 + width as u32,
            Field::Packed { half, .. } => 16 * (half as u32 + 1),
            Field::Extended { hi, lo } => {
                (hi.0 as u32 + hi.1 as u32).max(lo.0 as u32 + lo.1 as u32)
            }
        }
    }
}

#[inline]
fn bits_at(word: u32, shift: u8, width: u8) -> u32 {
    (word >> shift) & mask(width as u32)
}

/// A named operand of a format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: OperandKind,
    pub field: Field,
}

const fn reg(name: &'static str, field: Field) -> FieldSpec {
    FieldSpec { name: name, kind: OperandKind::Register, field: field }
}

const fn imm(name: &'static str, field: Field) -> FieldSpec {
    FieldSpec { name: name, kind: OperandKind::Immediate, field: field }
}

const fn p(half: u8, slot: u8, of: u8) -> Field { Field::Packed { half: half, slot: slot, of: of } }

const fn s(shift: u8, width: u8) -> Field { Field::Slice { shift: shift, width: width } }

const fn x(hi: (u8, u8), lo: (u8, u8)) -> Field { Field::Extended { hi: hi, lo: lo } }

static F_3R: [FieldSpec; 3] = [reg("op1", p(0, 0, 3)), reg("op2", p(0, 1, 3)), reg("op3", p(0, 2, 3))];
static F_2RUS: [FieldSpec; 3] = [reg("op1", p(0, 0, 3)), reg("op2", p(0, 1, 3)), imm("op3", p(0, 2, 3))];
static F_2R: [FieldSpec; 2] = [reg("op1", p(0, 0, 2)), reg("op2", p(0, 1, 2))];
static F_RUS: [FieldSpec; 2] = [reg("op1", p(0, 0, 2)), imm("op2", p(0, 1, 2))];
static F_1R: [FieldSpec; 1] = [reg("op1", s(0, 4))];
static F_RU6: [FieldSpec; 2] = [reg("op1", s(6, 4)), imm("op2", s(0, 6))];
static F_U6: [FieldSpec; 1] = [imm("op1", s(0, 6))];
static F_U10: [FieldSpec; 1] = [imm("op1", s(0, 10))];
static F_LRU6: [FieldSpec; 2] = [reg("op1", s(22, 4)), imm("op2", x((0, 10), (16, 6)))];
static F_LU6: [FieldSpec; 1] = [imm("op1", x((0, 10), (16, 6)))];
static F_LU10: [FieldSpec; 1] = [imm("op1", x((0, 10), (16, 10)))];
static F_L4R: [FieldSpec; 4] = [
    reg("op1", p(0, 0, 3)), reg("op2", p(0, 1, 3)), reg("op3", p(0, 2, 3)),
    reg("op4", s(16, 4)),
];
static F_L5R: [FieldSpec; 5] = [
    reg("op1", p(0, 0, 3)), reg("op2", p(0, 1, 3)), reg("op3", p(0, 2, 3)),
    reg("op4", p(1, 0, 2)), reg("op5", p(1, 1, 2)),
];
static F_L6R: [FieldSpec; 6] = [
    reg("op1", p(0, 0, 3)), reg("op2", p(0, 1, 3)), reg("op3", p(0, 2, 3)),
    reg("op4", p(1, 0, 3)), reg("op5", p(1, 1, 3)), reg("op6", p(1, 2, 3)),
];

/// Instruction formats, named as in the XS1 architecture manual.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    R3, R2us, R2, Rus, R1, R0, Ru6, U6, U10,
    Lru6, Lu6, Lu10,
    L2r, L3r, L2rus, L4r, L5r, L6r,
    Pfix, Eopr,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::R3    => "3r",
            Format::R2us  => "2rus",
            Format::R2    => "2r",
            Format::Rus   => "rus",
            Format::R1    => "1r",
            Format::R0    => "0r",
            Format::Ru6   => "ru6",
            Format::U6    => "u6",
            Format::U10   => "u10",
            Format::Lru6  => "lru6",
            Format::Lu6   => "lu6",
            Format::Lu10  => "lu10",
            Format::L2r   => "l2r",
            Format::L3r   => "l3r",
            Format::L2rus => "l2rus",
            Format::L4r   => "l4r",
            Format::L5r   => "l5r",
            Format::L6r   => "l6r",
            Format::Pfix  => "u10",
            Format::Eopr  => "u10",
        }
    }

    pub fn width(self) -> Width {
        match self {
            Format::R3 | Format::R2us | Format::R2 | Format::Rus | Format::R1
            | Format::R0 | Format::Ru6 | Format::U6 | Format::U10
            | Format::Pfix | Format::Eopr => Width::Short,
            _ => Width::Long,
        }
    }

    /// Shapes of the first and second halfword.
    pub fn shapes(self) -> [Shape; 2] {
        use self::Shape::*;
        match self {
            Format::R3 | Format::R2us => [Packed3, Any],
            Format::R2 | Format::Rus  => [Packed2, Any],
            Format::R1    => [Single, Any],
            Format::R0    => [Bare, Any],
            Format::Ru6   => [RegImm6, Any],
            Format::U6    => [Imm6, Any],
            Format::U10   => [Any, Any],
            Format::Pfix  => [Any, Any],
            Format::Eopr  => [Packed, Any],
            Format::Lru6  => [Any, RegImm6],
            Format::Lu6   => [Any, Imm6],
            Format::Lu10  => [Any, Any],
            Format::L2r   => [Packed2, Bare],
            Format::L3r | Format::L2rus => [Packed3, Bare],
            Format::L4r   => [Packed3, Single],
            Format::L5r   => [Packed3, Packed2],
            Format::L6r   => [Packed3, Packed3],
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Format::R3 | Format::L3r     => &F_3R[..],
            Format::R2us | Format::L2rus => &F_2RUS[..],
            Format::R2 | Format::L2r     => &F_2R[..],
            Format::Rus   => &F_RUS[..],
            Format::R1    => &F_1R[..],
            Format::Ru6   => &F_RU6[..],
            Format::U6    => &F_U6[..],
            Format::U10 | Format::Pfix => &F_U10[..],
            Format::Lru6  => &F_LRU6[..],
            Format::Lu6   => &F_LU6[..],
            Format::Lu10  => &F_LU10[..],
            Format::L4r   => &F_L4R[..],
            Format::L5r   => &F_L5R[..],
            Format::L6r   => &F_L6R[..],
            Format::R0 | Format::Eopr => &[],
        }
    }

    /// The long form of a short immediate format once a PFIX precedes it.
    fn prefixed(self) -> Option<Format> {
        match self {
            Format::Ru6 => Some(Format::Lru6),
            Format::U6  => Some(Format::Lu6),
            Format::U10 => Some(Format::Lu10),
            _ => None,
        }
    }
}

/// One known instruction encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub mask: u32,
    pub value: u32,
    pub kind: Kind,
    pub format: Format,
    /// Architectural name, e.g. `LDWSP`.
    pub name: &'static str,
    /// Toolchain mnemonic, e.g. `ldw`.
    pub mnemonic: &'static str,
    /// Immediates use the bit-position encoding.
    pub bitp: bool,
    /// Constraints on the first and second halfword.
    pub shapes: [Shape; 2],
}

impl Encoding {
    pub fn width(&self) -> Width { self.format.width() }

    /// Number of fixed bits.
    pub fn specificity(&self) -> u32 { self.mask.count_ones() }

    pub fn admits(&self, word: u32) -> bool {
        if (word & self.mask) != self.value {
            return false;
        }
        (0..self.width().halves()).all(|n| self.shapes[n as usize].admits(half(word, n)))
    }

    /// True when some word could match both encodings.
    pub fn overlaps(&self, other: &Encoding) -> bool {
        if self.width() != other.width() {
            return false;
        }
        if ((self.value ^ other.value) & self.mask & other.mask) != 0 {
            return false;
        }
        let (a, b) = (self.shapes, other.shapes);
        (0..self.width().halves()).all(|n| !a[n as usize].disjoint(b[n as usize]))
    }

    pub fn fields(&self) -> &'static [FieldSpec] { self.format.fields() }

    pub fn operand_kind(&self, spec: &FieldSpec) -> OperandKind {
        match spec.kind {
            OperandKind::Immediate if self.bitp => OperandKind::BitPosition,
            kind => kind,
        }
    }

    /// Raw value of every operand field. `prefix` holds the bits of any
    /// PFIX units before the one that is part of this word.
    pub fn extract(&self, word: u32, prefix: u32) -> Vec<u32> {
        self.fields().iter().map(|f| f.field.extract(word, prefix)).collect()
    }

    /// Synthesizes a word for this encoding from operand values, as they
    /// would be decoded (so bit positions are given as e.g. 24, not 10).
    /// Returns `None` if a value cannot be encoded.
    pub fn encode(&self, values: &[u32]) -> Option<u32> {
        let fields = self.fields();
        if fields.len() != values.len() {
            return None;
        }

        let mut word = self.value;
        let mut groups = [[0u32; 3]; 2];
        let mut ways = [0u8; 2];

        for (spec, &v) in fields.iter().zip(values) {
            let raw = match self.operand_kind(spec) {
                OperandKind::BitPosition => bitp_index(v)?,
                OperandKind::Register if v >= REGISTERS => return None,
                _ => v,
            };
            match spec.field {
                Field::Slice { shift, width } => {
                    if raw & !mask(width as u32) != 0 {
                        return None;
                    }
                    word |= raw << shift;
                }
                Field::Packed { half, slot, of } => {
                    if raw >= REGISTERS {
                        return None;
                    }
                    groups[half as usize][slot as usize] = raw;
                    ways[half as usize] = of;
                }
                Field::Extended { hi, lo } => {
                    if raw & !mask(hi.1 as u32 + lo.1 as u32) != 0 {
                        return None;
                    }
                    word |= (raw >> lo.1) << hi.0;
                    word |= (raw & mask(lo.1 as u32)) << lo.0;
                }
            }
        }

        for n in 0..self.width().halves() as usize {
            word |= (self.shapes[n].marker() as u32) << (16 * n);
        }

        for n in 0..2 {
            let h = match ways[n] {
                3 => pack3(groups[n]),
                2 => pack2([groups[n][0], groups[n][1]]),
                _ => continue,
            };
            word |= (h as u32) << (16 * n);
        }

        if self.admits(word) { Some(word) } else { None }
    }

    /// Architectural form, e.g. `LDWSP_ru6`.
    pub fn architectural(&self) -> String {
        format!("{}_{}", self.name, self.format.name())
    }

    /// Toolchain form, e.g. `ldw (ru6)`.
    pub fn literal(&self) -> String {
        format!("{} ({})", self.mnemonic, self.format.name())
    }

    /// The architectural form, when the toolchain mnemonic is a
    /// non-architectural shorthand for it.
    pub fn alias(&self) -> Option<String> {
        if self.name.eq_ignore_ascii_case(self.mnemonic) {
            None
        } else {
            Some(self.architectural())
        }
    }

    /// The long encoding formed by a PFIX followed by this one.
    fn prefixed(&self) -> Option<Encoding> {
        let format = self.format.prefixed()?;
        Some(Encoding {
            mask: PFIX_MASK | (self.mask << 16),
            value: PFIX_VALUE | (self.value << 16),
            format: format,
            shapes: [Shape::Any, self.shapes[0]],
            .. *self
        })
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{:08x}/{:08x}]", self.architectural(), self.value, self.mask)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedTable {
    #[error("encodings {0} and {1} can match the same word")]
    Overlap(String, String),
    #[error("operand {field} of {encoding} lies outside a {bits} bit word")]
    FieldOutOfRange { encoding: String, field: &'static str, bits: u32 },
}

/// Number of immediate bits a PFIX carries.
pub const PFIX_BITS: u32 = 10;
const PFIX_MASK: u32 = 0xfc00;
const PFIX_VALUE: u32 = 0xf000;

const OPC: u32 = 0xf800;
const SEL: u32 = 0x0010;
const SEL10: u32 = 0x0400;

/// Helpers for listing encodings. `sel` is the selector bit that splits an
/// opcode between two instructions of the same format.
fn short(mask: u32, value: u32, format: Format, name: &'static str, mnemonic: &'static str) -> Encoding {
    Encoding {
        mask: mask,
        value: value,
        kind: Kind::Terminal,
        format: format,
        name: name,
        mnemonic: mnemonic,
        bitp: false,
        shapes: format.shapes(),
    }
}

fn op3(opc: u32, format: Format, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(OPC, opc << 11, format, name, mnemonic)
}

fn op2(opc: u32, sel: u32, format: Format, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(OPC | SEL, (opc << 11) | (sel << 4), format, name, mnemonic)
}

fn op0(word: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(0xffff, word, Format::R0, name, mnemonic)
}

fn ru6(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(OPC | SEL10, (opc << 11) | (sel << 10), Format::Ru6, name, mnemonic)
}

/// ru6 on an opcode with no u6 forms: bits 9:6 are the register whatever
/// their value.
fn ru6_only(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    Encoding { shapes: [Shape::Any, Shape::Any], .. ru6(opc, sel, name, mnemonic) }
}

fn u6(opc: u32, sub: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(0xffc0, (opc << 11) | (sub << 6), Format::U6, name, mnemonic)
}

fn u10(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    short(OPC | SEL10, (opc << 11) | (sel << 10), Format::U10, name, mnemonic)
}

fn bitp(e: Encoding) -> Encoding { Encoding { bitp: true, .. e } }

fn long(low: (u32, u32), high: (u32, u32), format: Format, name: &'static str, mnemonic: &'static str) -> Encoding {
    Encoding {
        mask: low.0 | (high.0 << 16),
        value: low.1 | (high.1 << 16),
        kind: Kind::Terminal,
        format: format,
        name: name,
        mnemonic: mnemonic,
        bitp: false,
        shapes: format.shapes(),
    }
}

const ESCAPE: (u32, u32) = (OPC, 0xf800);

/// l3r and l2rus: bits 10:4 of the second halfword are 0x7e and bits 3:0
/// pick the instruction.
fn l3r(opc: u32, sub: u32, format: Format, name: &'static str, mnemonic: &'static str) -> Encoding {
    long(ESCAPE, (0xffff, (opc << 11) | 0x7e0 | sub), format, name, mnemonic)
}

fn l2r(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    long((OPC | SEL, 0xf800 | (sel << 4)), (0xffff, (opc << 11) | 0x7ec), Format::L2r, name, mnemonic)
}

fn l4r(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    long(ESCAPE, (0xfff0, (opc << 11) | 0x7e0 | (sel << 4)), Format::L4r, name, mnemonic)
}

fn l5r(opc: u32, sel: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    long(ESCAPE, (OPC | SEL, (opc << 11) | (sel << 4)), Format::L5r, name, mnemonic)
}

fn l6r(opc: u32, name: &'static str, mnemonic: &'static str) -> Encoding {
    long(ESCAPE, (OPC, opc << 11), Format::L6r, name, mnemonic)
}

/// Every single-halfword encoding, prefix and escape included.
fn short_encodings() -> Vec<Encoding> {
    use self::Format::*;
    vec![
        op3(0x00, R2us, "STW", "stw"),
        op2(0x00, 0, R2, "TINITPC", "init"),
        op2(0x00, 1, R2, "GETST", "getst"),
        op2(0x00, 0, R1, "EDU", "edu"),
        op2(0x00, 1, R1, "EEU", "eeu"),
        op0(0x07ec, "WAITEU", "waiteu"),
        op0(0x07ed, "CLRE", "clre"),
        op0(0x07ee, "SSYNC", "ssync"),
        op0(0x07ef, "FREET", "freet"),
        op0(0x07fc, "DCALL", "dcall"),
        op0(0x07fd, "KRET", "kret"),
        op0(0x07fe, "DRET", "dret"),
        op0(0x07ff, "SETKEP", "set"),

        op3(0x01, R2us, "LDW", "ldw"),
        op2(0x01, 0, R2, "TINITDP", "init"),
        op2(0x01, 1, R2, "OUTT", "outt"),
        op2(0x01, 0, R1, "WAITET", "waitet"),
        op2(0x01, 1, R1, "WAITEF", "waitef"),
        op0(0x0fec, "LDSPC", "ldw"),
        op0(0x0fed, "STSPC", "stw"),
        op0(0x0fee, "LDSSR", "ldw"),
        op0(0x0fef, "STSSR", "stw"),
        op0(0x0ffc, "STSED", "stw"),
        op0(0x0ffd, "STET", "stw"),
        op0(0x0ffe, "GETED", "get"),
        op0(0x0fff, "GETET", "get"),

        op3(0x02, R3, "ADD", "add"),
        op2(0x02, 0, R2, "TINITSP", "init"),
        op2(0x02, 1, R2, "SETD", "setd"),
        op2(0x02, 0, R1, "FREER", "freer"),
        op2(0x02, 1, R1, "MJOIN", "mjoin"),
        op0(0x17ec, "DENTSP", "dentsp"),
        op0(0x17ed, "DRESTSP", "drestsp"),
        op0(0x17ee, "GETID", "get"),
        op0(0x17ef, "GETKEP", "get"),
        op0(0x17fc, "GETKSP", "get"),
        op0(0x17fd, "LDSED", "ldw"),
        op0(0x17fe, "LDET", "ldw"),

        op3(0x03, R3, "SUB", "sub"),
        op2(0x03, 0, R2, "TINITCP", "init"),
        op2(0x03, 1, R2, "TSETMR", "set"),
        op2(0x03, 0, R1, "TSTART", "start"),
        op2(0x03, 1, R1, "MSYNC", "msync"),

        op3(0x04, R3, "SHL", "shl"),
        op2(0x04, 1, R2, "EET", "eet"),
        op2(0x04, 0, R1, "BLA", "bla"),
        op2(0x04, 1, R1, "BAU", "bau"),

        op3(0x05, R3, "SHR", "shr"),
        op2(0x05, 0, R2, "ANDNOT", "andnot"),
        op2(0x05, 1, R2, "EEF", "eef"),
        op2(0x05, 0, R1, "BRU", "bru"),
        op2(0x05, 1, R1, "SETSP", "set"),

        op3(0x06, R3, "EQ", "eq"),
        op2(0x06, 0, R2, "SEXT", "sext"),
        bitp(op2(0x06, 1, Rus, "SEXT", "sext")),
        op2(0x06, 0, R1, "SETDP", "set"),
        op2(0x06, 1, R1, "SETCP", "set"),

        op3(0x07, R3, "AND", "and"),
        op2(0x07, 0, R2, "GETTS", "getts"),
        op2(0x07, 1, Rus, "SETPT", "setpt"),
        op2(0x07, 0, R1, "DGETREG", "dgetreg"),
        op2(0x07, 1, R1, "SETEV", "setev"),

        op3(0x08, R3, "OR", "or"),
        op2(0x08, 0, R2, "ZEXT", "zext"),
        bitp(op2(0x08, 1, Rus, "ZEXT", "zext")),
        op2(0x08, 0, R1, "KCALL", "kcall"),
        op2(0x08, 1, R1, "SETV", "setv"),

        op3(0x09, R3, "LDW", "ldw"),
        op2(0x09, 0, R2, "OUTCT", "outct"),
        op2(0x09, 1, Rus, "OUTCT", "outct"),
        op2(0x09, 0, R1, "ECALLF", "ecallf"),
        op2(0x09, 1, R1, "ECALLT", "ecallt"),

        ru6_only(0x0a, 0, "STWDP", "stw"),
        ru6_only(0x0a, 1, "STWSP", "stw"),
        ru6_only(0x0b, 0, "LDWDP", "ldw"),
        ru6_only(0x0b, 1, "LDWSP", "ldw"),
        ru6_only(0x0c, 0, "LDAWDP", "ldaw"),
        ru6_only(0x0c, 1, "LDAWSP", "ldaw"),
        ru6_only(0x0d, 0, "LDC", "ldc"),
        ru6_only(0x0d, 1, "LDWCP", "ldw"),

        ru6(0x0e, 0, "BRFT", "bt"),
        ru6(0x0e, 1, "BRBT", "bt"),
        u6(0x0e, 0x0c, "BRFU", "bu"),
        u6(0x0e, 0x0d, "BLAT", "blat"),
        u6(0x0e, 0x0e, "EXTDP", "extdp"),
        u6(0x0e, 0x0f, "KCALL", "kcall"),
        u6(0x0e, 0x1c, "BRBU", "bu"),
        u6(0x0e, 0x1d, "ENTSP", "entsp"),
        u6(0x0e, 0x1e, "EXTSP", "extsp"),
        u6(0x0e, 0x1f, "RETSP", "retsp"),

        ru6(0x0f, 0, "BRFF", "bf"),
        ru6(0x0f, 1, "BRBF", "bf"),
        u6(0x0f, 0x0c, "CLRSR", "clrsr"),
        u6(0x0f, 0x0d, "SETSR", "setsr"),
        u6(0x0f, 0x0e, "KENTSP", "kentsp"),
        u6(0x0f, 0x0f, "KRESTSP", "krestsp"),
        u6(0x0f, 0x1c, "GETSR", "getsr"),
        u6(0x0f, 0x1d, "LDAWCP", "ldaw"),

        op3(0x10, R3, "LD16S", "ld16s"),
        op2(0x10, 0, R2, "NOT", "not"),
        op2(0x10, 1, R2, "INCT", "inct"),
        op2(0x10, 0, R1, "CLRPT", "clrpt"),
        op2(0x10, 1, R1, "SYNCR", "syncr"),

        op3(0x11, R3, "LD8U", "ld8u"),
        op2(0x11, 0, R2, "NOT", "not"),
        op2(0x11, 1, R2, "INT", "int"),

        op3(0x12, R2us, "ADD", "add"),
        op2(0x12, 0, R2, "NEG", "neg"),
        op2(0x12, 1, R2, "ENDIN", "endin"),

        op3(0x13, R2us, "SUB", "sub"),

        bitp(op3(0x14, R2us, "SHL", "shl")),
        op2(0x14, 0, R2, "MKMSK", "mkmsk"),
        bitp(op2(0x14, 1, Rus, "MKMSK", "mkmsk")),

        bitp(op3(0x15, R2us, "SHR", "shr")),
        op2(0x15, 0, R2, "OUT", "out"),
        op2(0x15, 1, R2, "OUTSHR", "outshr"),

        op3(0x16, R2us, "EQ", "eq"),
        op2(0x16, 0, R2, "IN", "in"),
        op2(0x16, 1, R2, "INSHR", "inshr"),

        op3(0x17, R3, "TSETR", "set"),
        op2(0x17, 0, R2, "PEEK", "peek"),
        op2(0x17, 1, R2, "TESTCT", "testct"),

        op3(0x18, R3, "LSS", "lss"),
        op2(0x18, 0, R2, "SETPSC", "setpsc"),
        op2(0x18, 1, R2, "TESTWCT", "testwct"),

        op3(0x19, R3, "LSU", "lsu"),
        op2(0x19, 0, R2, "CHKCT", "chkct"),
        op2(0x19, 1, Rus, "CHKCT", "chkct"),

        u10(0x1a, 0, "BLRF", "bl"),
        u10(0x1a, 1, "BLRB", "bl"),
        u10(0x1b, 0, "LDAPF", "ldap"),
        u10(0x1b, 1, "LDAPB", "ldap"),
        u10(0x1c, 0, "BLACP", "bla"),
        u10(0x1c, 1, "LDWCPL", "ldw"),

        ru6(0x1d, 0, "SETC", "setc"),

        Encoding {
            kind: Kind::Prefix,
            .. short(PFIX_MASK, PFIX_VALUE, Pfix, "PFIX", "pfix")
        },
        Encoding {
            kind: Kind::Escape,
            .. short(OPC, 0xf800, Eopr, "EOPR", "eopr")
        },
    ]
}

/// Every two-halfword encoding reached through the escape.
fn escape_encodings() -> Vec<Encoding> {
    use self::Format::*;
    vec![
        l6r(0x00, "LMUL", "lmul"),
        l5r(0x00, 1, "LADD", "ladd"),
        l5r(0x00, 0, "LDIVU", "ldivu"),
        l4r(0x00, 0, "CRC8", "crc8"),
        l4r(0x00, 1, "MACCU", "maccu"),
        l3r(0x00, 0xc, L3r, "STW", "stw"),
        l2r(0x00, 0, "BITREV", "bitrev"),
        l2r(0x00, 1, "BYTEREV", "byterev"),

        l5r(0x01, 1, "LSUB", "lsub"),
        l4r(0x01, 0, "MACCS", "maccs"),
        l3r(0x01, 0xc, L3r, "XOR", "xor"),
        l2r(0x01, 0, "CLZ", "clz"),
        l2r(0x01, 1, "SETCLK", "setclk"),

        l3r(0x02, 0xc, L3r, "ASHR", "ashr"),
        l2r(0x02, 0, "TINITLR", "init"),
        l2r(0x02, 1, "GETPS", "get"),

        l3r(0x03, 0xc, L3r, "LDAWF", "ldaw"),
        l2r(0x03, 0, "SETPS", "set"),
        l2r(0x03, 1, "GETD", "getd"),

        l3r(0x04, 0xc, L3r, "LDAWB", "ldaw"),
        l2r(0x04, 0, "TESTLCL", "testlcl"),
        l2r(0x04, 1, "SETTW", "settw"),

        l3r(0x05, 0xc, L3r, "LDA16F", "lda16"),
        l2r(0x05, 0, "SETRDY", "setrdy"),
        l2r(0x05, 1, "SETC", "setc"),

        l3r(0x06, 0xc, L3r, "LDA16B", "lda16"),
        l2r(0x06, 0, "SETN", "setn"),
        l2r(0x06, 1, "GETN", "getn"),

        l3r(0x07, 0xc, L3r, "MUL", "mul"),
        l3r(0x08, 0xc, L3r, "DIVS", "divs"),
        l3r(0x09, 0xc, L3r, "DIVU", "divu"),
        l3r(0x10, 0xc, L3r, "ST16", "st16"),
        l3r(0x11, 0xc, L3r, "ST8", "st8"),

        bitp(l3r(0x12, 0xc, L2rus, "ASHR", "ashr")),
        bitp(l3r(0x12, 0xd, L2rus, "OUTPW", "outpw")),
        bitp(l3r(0x12, 0xe, L2rus, "INPW", "inpw")),

        l3r(0x13, 0xc, L2rus, "LDAWF", "ldaw"),
        l3r(0x14, 0xc, L2rus, "LDAWB", "ldaw"),
        l3r(0x15, 0xc, L3r, "CRC", "crc32"),
        l3r(0x18, 0xc, L3r, "REMS", "rems"),
        l3r(0x19, 0xc, L3r, "REMU", "remu"),
    ]
}

/// All XS1 encodings: the short ones, their PFIX-extended forms, and the
/// escaped long ones.
pub fn encodings() -> Vec<Encoding> {
    let short = short_encodings();
    let prefixed: Vec<Encoding> = short.iter().filter_map(Encoding::prefixed).collect();
    let mut all = short;
    all.extend(prefixed);
    all.extend(escape_encodings());
    all
}

const BUCKETS: usize = 32;

/// Encodings bucketed by the opcode of their last halfword.
pub struct Table {
    short: Vec<Vec<Encoding>>,
    long: Vec<Vec<Encoding>>,
}

fn bucket(word: u32, width: Width) -> usize {
    let shift = width.bits() - 5;
    ((word >> shift) & 0x1f) as usize
}

impl Table {
    /// The table of all XS1 encodings, built and checked on first use.
    pub fn get() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| match Table::build(encodings()) {
            Ok(table) => table,
            Err(e) => panic!("instruction table is malformed: {}", e),
        })
    }

    pub fn build(encodings: Vec<Encoding>) -> Result<Table, MalformedTable> {
        for e in encodings.iter() {
            let limit = e.width().bits();
            for spec in e.fields() {
                if spec.field.end() > limit {
                    return Err(MalformedTable::FieldOutOfRange {
                        encoding: e.to_string(),
                        field: spec.name,
                        bits: limit,
                    });
                }
            }
        }

        for (i, a) in encodings.iter().enumerate() {
            for b in encodings[i + 1..].iter() {
                if a.overlaps(b) {
                    return Err(MalformedTable::Overlap(a.to_string(), b.to_string()));
                }
            }
        }

        let mut table = Table {
            short: vec![Vec::new(); BUCKETS],
            long: vec![Vec::new(); BUCKETS],
        };
        for e in encodings {
            let width = e.width();
            let buckets = match width {
                Width::Short => &mut table.short,
                Width::Long  => &mut table.long,
            };
            buckets[bucket(e.value, width)].push(e);
        }
        for b in table.short.iter_mut().chain(table.long.iter_mut()) {
            b.sort_by(|x, y| y.specificity().cmp(&x.specificity()));
        }

        Ok(table)
    }

    /// The encoding matching `word`, if any. Short words are the low 16 bits.
    pub fn lookup(&self, word: u32, width: Width) -> Option<&Encoding> {
        let (buckets, word) = match width {
            Width::Short => (&self.short, word & 0xffff),
            Width::Long  => (&self.long, word),
        };
        buckets[bucket(word, width)].iter().find(|e| e.admits(word))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Encoding> {
        self.short.iter().chain(self.long.iter()).flat_map(|b| b.iter())
    }
}

#[cfg(test)]
fn lookup_name(word: u32, width: Width) -> Option<String> {
    Table::get().lookup(word, width).map(|e| e.architectural())
}

#[test]
fn test_table_is_well_formed() {
    let all = encodings();
    let table = Table::build(all.clone()).unwrap();
    assert_eq!(table.iter().count(), all.len());
}

#[test]
fn test_shapes() {
    assert!( Shape::Packed3.admits(0x141c));
    assert!(!Shape::Packed2.admits(0x141c));
    assert!( Shape::Packed2.admits(0xa6dd));
    assert!( Shape::Single.admits(0x07e5));
    assert!(!Shape::Single.admits(0x07ec));
    assert!( Shape::Bare.admits(0x07ec));
    assert!( Shape::RegImm6.admits(0x5d9d));
    assert!(!Shape::RegImm6.admits(0x7300));
    assert!( Shape::Imm6.admits(0x7300));
    assert!(!Shape::Packed.admits(0xffff));

    assert!( Shape::Packed3.disjoint(Shape::Bare));
    assert!( Shape::Imm6.disjoint(Shape::RegImm6));
    assert!(!Shape::Packed.disjoint(Shape::Packed2));
    assert!(!Shape::Any.disjoint(Shape::Single));
}

#[test]
fn test_lookup_short() {
    assert_eq!(lookup_name(0x141c, Width::Short), Some("ADD_3r".to_string()));
    assert_eq!(lookup_name(0xa6dd, Width::Short), Some("MKMSK_rus".to_string()));
    assert_eq!(lookup_name(0x5d9d, Width::Short), Some("LDWSP_ru6".to_string()));
    assert_eq!(lookup_name(0x07ed, Width::Short), Some("CLRE_0r".to_string()));
    assert_eq!(lookup_name(0x07e5, Width::Short), Some("EDU_1r".to_string()));
    // bits 10:6 = 0x0c: first u6 sub-opcode
    assert_eq!(lookup_name(0x7300, Width::Short), Some("BRFU_u6".to_string()));
    assert_eq!(lookup_name(0xd7ff, Width::Short), Some("BLRB_u10".to_string()));
    assert_eq!(lookup_name(0xffff, Width::Short), None);
}

#[test]
fn test_lookup_kinds() {
    let table = Table::get();
    assert_eq!(table.lookup(0xf3ff, Width::Short).map(|e| e.kind), Some(Kind::Prefix));
    assert_eq!(table.lookup(0xf81b, Width::Short).map(|e| e.kind), Some(Kind::Escape));
    assert_eq!(table.lookup(0x141c, Width::Short).map(|e| e.kind), Some(Kind::Terminal));
}

#[test]
fn test_lookup_long() {
    assert_eq!(lookup_name(0x07ec_f81b, Width::Long), Some("STW_l3r".to_string()));
    assert_eq!(lookup_name(0x68bf_f3ff, Width::Long), Some("LDC_lru6".to_string()));
    // short opcode 0x0e with sub-opcode 0x1d is ENTSP
    assert_eq!(lookup_name(0x7740_f001, Width::Long), Some("ENTSP_lu6".to_string()));
    assert_eq!(lookup_name(0x141c_f3ff, Width::Long), None);
}

#[test]
fn test_ru6_without_u6_siblings() {
    // bits 9:6 = 12, which on opcodes 0x0e, 0x0f and 0x1d would be a u6 form
    assert_eq!(lookup_name(0x5300, Width::Short), Some("STWDP_ru6".to_string()));
    assert_eq!(lookup_name(0x5fc0, Width::Short), Some("LDWSP_ru6".to_string()));
    assert_eq!(lookup_name(0x5300_f000, Width::Long), Some("STWDP_lru6".to_string()));
    assert_eq!(lookup_name(0x7300, Width::Short), Some("BRFU_u6".to_string()));
    assert_eq!(lookup_name(0xeb00, Width::Short), None);

    let ldwsp = Table::get().lookup(0x5fc0, Width::Short).unwrap();
    assert_eq!(ldwsp.extract(0x5fc0, 0), vec![15, 0]);
}

#[test]
fn test_aliases() {
    let table = Table::get();
    let ldwsp = table.lookup(0x5d9d, Width::Short).unwrap();
    assert_eq!(ldwsp.literal(), "ldw (ru6)");
    assert_eq!(ldwsp.alias(), Some("LDWSP_ru6".to_string()));

    let add = table.lookup(0x141c, Width::Short).unwrap();
    assert_eq!(add.literal(), "add (3r)");
    assert_eq!(add.alias(), None);
}

#[test]
fn test_overlap_rejected() {
    let mut all = encodings();
    all.push(op2(0x02, 1, Format::R2, "GETR", "getr"));
    match Table::build(all) {
        Err(MalformedTable::Overlap(a, b)) => {
            assert!(a.starts_with("SETD_2r"));
            assert!(b.starts_with("GETR_2r"));
        }
        _ => panic!("overlapping encodings accepted"),
    }
}

#[test]
fn test_encode() {
    let table = Table::get();
    let ldwsp = table.lookup(0x5d9d, Width::Short).unwrap();
    assert_eq!(ldwsp.encode(&[6, 0x1d]), Some(0x5d9d));
    assert_eq!(ldwsp.encode(&[12, 0x1d]), None);
    assert_eq!(ldwsp.encode(&[6, 0x40]), None);
    assert_eq!(ldwsp.encode(&[6]), None);

    let mkmsk = table.lookup(0xa6dd, Width::Short).unwrap();
    assert_eq!(mkmsk.encode(&[3, 1]), Some(0xa6dd));
    assert_eq!(mkmsk.encode(&[3, 9]), None);

    let ldc = table.lookup(0x68bf_f3ff, Width::Long).unwrap();
    assert_eq!(ldc.extract(0x68bf_f3ff, 0), vec![2, 0xffff]);
    assert_eq!(ldc.encode(&[2, 0xffff]), Some(0x68bf_f3ff));
}
