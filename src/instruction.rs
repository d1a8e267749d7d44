use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::decode::common::BITP;
use crate::table::Encoding;

/// How a decoded instruction's mnemonic is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The form as matched, e.g. `ldw (ru6)`.
    Default,
    /// The architectural form, e.g. `LDWSP_ru6` or `ADD_3r`.
    Substitute,
    /// Matched form, the separator, then the architectural form.
    Merge(String),
}

pub const MERGE_SEPARATOR: &str = " ; ";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown rendering mode `{0}`, expected default, substitute or merge[=SEP]")]
pub struct ModeError(pub String);

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Mode, ModeError> {
        match s {
            "default" => Ok(Mode::Default),
            "substitute" | "sub" => Ok(Mode::Substitute),
            "merge" => Ok(Mode::Merge(MERGE_SEPARATOR.to_string())),
            _ => match s.strip_prefix("merge=") {
                Some(sep) => Ok(Mode::Merge(sep.to_string())),
                None => Err(ModeError(s.to_string())),
            },
        }
    }
}

impl Default for Mode {
    fn default() -> Mode { Mode::Default }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// Register index, r0 to r11.
    Register,
    /// Unsigned immediate.
    Immediate,
    /// Bit-position immediate, already mapped through the bitp table.
    BitPosition,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Operand {
    pub name: &'static str,
    pub kind: OperandKind,
    pub value: u32,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            OperandKind::Register    => write!(f, "r{}", self.value),
            OperandKind::Immediate   => write!(f, "{:#x}", self.value),
            OperandKind::BitPosition => write!(f, "{}", self.value),
        }
    }
}

/// A decoded instruction: the encoding that matched and its operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    encoding: Encoding,
    operands: Vec<Operand>,
}

impl Instruction {
    /// Decodes the operands of `word`, which must match `encoding`. `prefix`
    /// holds the immediate bits of PFIX units preceding the word.
    pub fn decode(encoding: &Encoding, word: u32, prefix: u32) -> Instruction {
        let operands = encoding.fields().iter()
            .zip(encoding.extract(word, prefix))
            .map(|(spec, raw)| {
                let kind = encoding.operand_kind(spec);
                let value = match kind {
                    OperandKind::BitPosition => BITP.get(raw as usize).cloned().unwrap_or(raw),
                    _ => raw,
                };
                Operand { name: spec.name, kind: kind, value: value }
            })
            .collect();

        Instruction {
            encoding: *encoding,
            operands: operands,
        }
    }

    pub fn encoding(&self) -> &Encoding { &self.encoding }

    pub fn operands(&self) -> &[Operand] { &self.operands }

    pub fn operand(&self, name: &str) -> Option<u32> {
        self.operands.iter().find(|o| o.name == name).map(|o| o.value)
    }

    pub fn values(&self) -> Vec<u32> {
        self.operands.iter().map(|o| o.value).collect()
    }

    /// The toolchain mnemonic and format, e.g. `ldw (ru6)`.
    pub fn literal(&self) -> String { self.encoding.literal() }

    /// The architectural name and format, e.g. `LDWSP_ru6`.
    pub fn architectural(&self) -> String { self.encoding.architectural() }

    /// The architectural form, if the literal mnemonic is a shorthand for it.
    pub fn alias(&self) -> Option<String> { self.encoding.alias() }

    /// Mnemonic text for the given output mode.
    pub fn render(&self, mode: &Mode) -> String {
        match *mode {
            Mode::Default => self.literal(),
            Mode::Substitute => self.architectural(),
            Mode::Merge(ref sep) => format!("{}{}{}", self.literal(), sep, self.architectural()),
        }
    }

    pub fn operands_text(&self) -> String {
        self.operands.iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.literal())
        } else {
            write!(f, "{} {}", self.literal(), self.operands_text())
        }
    }
}

#[cfg(test)]
fn short(word: u16) -> Instruction {
    use crate::table::{Table, Width};
    let e = Table::get().lookup(word as u32, Width::Short).unwrap();
    Instruction::decode(e, word as u32, 0)
}

#[test]
fn test_operands() {
    let i = short(0x5d9d);
    assert_eq!(i.architectural(), "LDWSP_ru6");
    assert_eq!(i.operand("op1"), Some(6));
    assert_eq!(i.operand("op2"), Some(0x1d));
    assert_eq!(i.operand("op3"), None);
    assert_eq!(i.to_string(), "ldw (ru6) r6, 0x1d");

    let i = short(0x141c);
    assert_eq!(i.values(), vec![5, 11, 4]);
    assert_eq!(i.to_string(), "add (3r) r5, r11, r4");

    assert_eq!(short(0x07ed).to_string(), "clre (0r)");
}

#[test]
fn test_bit_position_operand() {
    let i = short(0xa6dd);
    assert_eq!(i.architectural(), "MKMSK_rus");
    assert_eq!(i.operands()[1].kind, OperandKind::BitPosition);
    assert_eq!(i.values(), vec![3, 1]);
    assert_eq!(i.to_string(), "mkmsk (rus) r3, 1");
}

#[test]
fn test_render_modes() {
    let ldw = short(0x5d9d);
    assert_eq!(ldw.render(&Mode::Default), "ldw (ru6)");
    assert_eq!(ldw.render(&Mode::Substitute), "LDWSP_ru6");
    assert_eq!(ldw.render(&Mode::Merge(" // ".to_string())), "ldw (ru6) // LDWSP_ru6");

    let add = short(0x141c);
    assert_eq!(add.render(&Mode::Default), "add (3r)");
    assert_eq!(add.alias(), None);
    assert_eq!(add.render(&Mode::Substitute), "ADD_3r");
}

#[test]
fn test_parse_mode() {
    assert_eq!("default".parse::<Mode>(), Ok(Mode::Default));
    assert_eq!("sub".parse::<Mode>(), Ok(Mode::Substitute));
    assert_eq!("substitute".parse::<Mode>(), Ok(Mode::Substitute));
    assert_eq!("merge".parse::<Mode>(), Ok(Mode::Merge(" ; ".to_string())));
    assert_eq!("merge=\t# ".parse::<Mode>(), Ok(Mode::Merge("\t# ".to_string())));
    assert_eq!("replace".parse::<Mode>(), Err(ModeError("replace".to_string())));
}
