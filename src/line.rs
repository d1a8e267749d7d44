//! A line is either bare hex, `dd a6`, or a line of `xobjdump -d` output:
//!
//! ```text
//! .text 0x00010000: dd a6: mkmsk (rus) r3, 0x1
//! ```
//!
//! Only the leading 2 or 4 bytes are decoded. On xobjdump lines the
//! `mnemonic (format)` text after the bytes is what substitution replaces.

use std::ops::Range;

use crate::decode::decode_all;
use crate::instruction::Mode;

/// The parts of a line that hold an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub address: Option<u64>,
    bytes: Vec<u8>,
    /// Byte range of the `mnemonic (format)` text and the whitespace after it.
    pub span: Option<Range<usize>>,
}

impl Line {
    pub fn bytes(&self) -> &[u8] { &self.bytes }
}

struct Cursor<'a> {
    s: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> { self.s.get(self.at).cloned() }

    fn skip_space(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_whitespace()) {
            self.at += 1;
        }
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `[0-9A-Za-z_]*`, returning its range.
    fn word(&mut self) -> Range<usize> {
        let start = self.at;
        while self.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == b'_') {
            self.at += 1;
        }
        start..self.at
    }

    fn hex_pair(&mut self) -> Option<u8> {
        let hi = hex_digit(*self.s.get(self.at)?)?;
        let lo = hex_digit(*self.s.get(self.at + 1)?)?;
        self.at += 2;
        Some((hi << 4) | lo)
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// `[.section] 0xADDR:` followed by whitespace, or nothing at all.
fn address(c: &mut Cursor) -> Option<u64> {
    let start = c.at;
    if c.eat(b'.') {
        c.word();
    }
    c.skip_space();

    if c.eat(b'0') && (c.eat(b'x') || c.eat(b'X')) {
        let digits = c.at;
        while c.peek().and_then(hex_digit).is_some() {
            c.at += 1;
        }
        let text = std::str::from_utf8(&c.s[digits..c.at]).ok()?;
        if let Ok(addr) = u64::from_str_radix(text, 16) {
            if c.eat(b':') {
                c.skip_space();
                return Some(addr);
            }
        }
    }

    c.at = start;
    None
}

/// `mnemonic (format)` and any whitespace after it.
fn instruction_span(c: &mut Cursor) -> Option<Range<usize>> {
    let start = c.at;
    if c.word().is_empty() {
        return None;
    }
    c.skip_space();
    if !c.eat(b'(') || c.word().is_empty() || !c.eat(b')') {
        return None;
    }
    c.skip_space();
    Some(start..c.at)
}

/// Recognises an instruction line. Lines with any byte count other than 2
/// or 4 are not instruction lines.
pub fn parse_line(line: &str) -> Option<Line> {
    let mut c = Cursor { s: line.as_bytes(), at: 0 };
    let address = address(&mut c);

    let mut bytes = Vec::with_capacity(4);
    while bytes.len() < 4 {
        match c.hex_pair() {
            Some(b) => bytes.push(b),
            None => break,
        }
        c.skip_space();
    }
    if bytes.len() != 2 && bytes.len() != 4 {
        return None;
    }

    let span = if address.is_some() && c.eat(b':') {
        c.skip_space();
        instruction_span(&mut c)
    } else {
        None
    };

    Some(Line { address: address, bytes: bytes, span: span })
}

/// Decodes the instruction on `line` and renders it per `mode`.
///
/// In `Default` mode the result is the decoded instruction alone, and lines
/// without one give `None`. The other modes always give a line back, with
/// unrecognised lines passed through.
pub fn decode_line(line: &str, mode: &Mode) -> Option<String> {
    let parsed = match parse_line(line) {
        Some(p) => p,
        None => return match *mode {
            Mode::Default => None,
            _ => Some(line.trim_end().to_string()),
        },
    };

    let first = decode_all(parsed.bytes()).next()?;
    let insn = first.result.as_ref();

    match *mode {
        Mode::Default => Some(match insn {
            Ok(i) => i.to_string(),
            Err(e) => e.to_string(),
        }),

        Mode::Substitute => {
            let span = match parsed.span {
                Some(span) => span,
                None => return Some(line.trim_end().to_string()),
            };
            let text = match insn {
                Ok(i) => i.render(mode),
                Err(e) => e.to_string(),
            };
            let width = span.end - span.start;
            let mut out = String::with_capacity(line.len());
            out.push_str(&line[..span.start]);
            out.push_str(&format!("{:<1$}", text, width));
            out.push_str(&line[span.end..]);
            Some(out.trim_end().to_string())
        }

        Mode::Merge(ref sep) => {
            let text = match insn {
                Ok(i) => i.architectural(),
                Err(e) => e.to_string(),
            };
            Some(format!("{}{}{}", line.trim_end(), sep, text))
        }
    }
}

#[test]
fn test_parse_hex() {
    let l = parse_line("dd a6").unwrap();
    assert_eq!(l.bytes(), &[0xdd, 0xa6]);
    assert_eq!(l.address, None);
    assert_eq!(l.span, None);

    assert_eq!(parse_line("1bf8ec07\n").unwrap().bytes(), &[0x1b, 0xf8, 0xec, 0x07]);
    assert_eq!(parse_line("DD A6").unwrap().bytes(), &[0xdd, 0xa6]);

    assert_eq!(parse_line("dd a6 01"), None);
    assert_eq!(parse_line("dd"), None);
    assert_eq!(parse_line(""), None);
    assert_eq!(parse_line("Disassembly of section .text:"), None);
}

#[test]
fn test_parse_xobjdump() {
    let line = ".text 0x00010000: 9d 5d: ldw (ru6)   r6, sp[0x1d]";
    let l = parse_line(line).unwrap();
    assert_eq!(l.address, Some(0x10000));
    assert_eq!(l.bytes(), &[0x9d, 0x5d]);
    assert_eq!(&line[l.span.clone().unwrap()], "ldw (ru6)   ");

    let l = parse_line("0x00010004: ff f3 bf 68: ldc (lru6) r2, 0xffff").unwrap();
    assert_eq!(l.address, Some(0x10004));
    assert_eq!(l.bytes().len(), 4);
}

#[test]
fn test_decode_line_default() {
    assert_eq!(decode_line("dd a6", &Mode::Default), Some("mkmsk (rus) r3, 1".to_string()));
    assert_eq!(decode_line("ff ff", &Mode::Default), Some("unknown encoding 0xffff".to_string()));
    assert_eq!(decode_line("hello", &Mode::Default), None);
}

#[test]
fn test_decode_line_substitute() {
    let mode = Mode::Substitute;
    assert_eq!(
        decode_line(".text 0x00010000: 9d 5d: ldw (ru6)   r6, sp[0x1d]\n", &mode),
        Some(".text 0x00010000: 9d 5d: LDWSP_ru6   r6, sp[0x1d]".to_string())
    );
    // architectural names are used even where the mnemonic is the same word
    assert_eq!(
        decode_line("0x00010002: 1c 14: add (3r)    r5, r11, r4", &mode),
        Some("0x00010002: 1c 14: ADD_3r      r5, r11, r4".to_string())
    );
    // the replacement is padded out to the old column
    assert_eq!(
        decode_line("0x00010006: 01 70: bt (ru6)          r0, 0x1", &mode),
        Some("0x00010006: 01 70: BRFT_ru6          r0, 0x1".to_string())
    );
    assert_eq!(decode_line("dd a6", &mode), Some("dd a6".to_string()));
    assert_eq!(decode_line("Disassembly:   \n", &mode), Some("Disassembly:".to_string()));
}

#[test]
fn test_decode_line_merge() {
    let mode = Mode::Merge(" // ".to_string());
    assert_eq!(
        decode_line("0x00010000: 9d 5d: ldw (ru6) r6, sp[0x1d]\n", &mode),
        Some("0x00010000: 9d 5d: ldw (ru6) r6, sp[0x1d] // LDWSP_ru6".to_string())
    );
    assert_eq!(decode_line("\n", &mode), Some("".to_string()));
}
