// decode/common.rs -- Common decoding operations
// Copyright (C) 2015 Alex Iadicicco

use crate::decode::DecodeError;

/// Values of the XS1 bit-position immediate, indexed by its 4 bit encoding.
pub const BITP: [u32; 12] = [32, 1, 2, 3, 4, 5, 6, 7, 8, 16, 24, 32];

/// Registers reachable through a packed operand field.
pub const REGISTERS: u32 = 12;

#[inline]
pub fn bits(w: u32, hi: u32, lo: u32) -> u32 { (w >> lo) & ((1 << (hi - lo + 1)) - 1) }

#[inline]
pub fn bit(w: u32, n: u32) -> u32 { (w >> n) & 0b1 }

#[inline]
pub fn mask(width: u32) -> u32 {
    if width >= 32 { !0 } else { (1 << width) - 1 }
}

/// Halfword `n` (0 = first in memory) of an instruction word.
#[inline]
pub fn half(w: u32, n: u8) -> u16 { (w >> (16 * n as u32)) as u16 }

/// Reads the little-endian halfword at byte offset `at`.
#[inline]
pub fn read_half(bytes: &[u8], at: usize) -> Result<u16, DecodeError> {
    match bytes.get(at..at + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(DecodeError::TruncatedInput {
            needed: at + 2,
            available: bytes.len(),
        }),
    }
}

/// The combined field of a three operand halfword, if it holds one.
#[inline]
pub fn combined3(h: u16) -> Option<u32> {
    let c = bits(h as u32, 10, 6);
    if c < 27 { Some(c) } else { None }
}

/// The combined field of a two operand halfword, if it holds one. Bit 5
/// extends the five values left over above 27 to the nine needed.
#[inline]
pub fn combined2(h: u16) -> Option<u32> {
    let c = bits(h as u32, 10, 6);
    if c < 27 {
        return None;
    }
    let v = c - 27 + bit(h as u32, 5) * 5;
    if v < 9 { Some(v) } else { None }
}

/// Operand `slot` of a three operand halfword. Each operand keeps its low
/// two bits in place and its high part as a base 3 digit of the combined
/// field.
#[inline]
pub fn unpack3(h: u16, slot: u8) -> u32 {
    let c = combined3(h).unwrap_or(0);
    let w = h as u32;
    match slot {
        0 => ((c % 3) << 2) | bits(w, 5, 4),
        1 => (((c / 3) % 3) << 2) | bits(w, 3, 2),
        _ => ((c / 9) << 2) | bits(w, 1, 0),
    }
}

#[inline]
pub fn unpack2(h: u16, slot: u8) -> u32 {
    let c = combined2(h).unwrap_or(0);
    let w = h as u32;
    match slot {
        0 => ((c % 3) << 2) | bits(w, 3, 2),
        _ => ((c / 3) << 2) | bits(w, 1, 0),
    }
}

/// Inverse of `unpack3`. Operands must be below `REGISTERS`.
pub fn pack3(ops: [u32; 3]) -> u16 {
    let c = (ops[0] >> 2) + 3 * (ops[1] >> 2) + 9 * (ops[2] >> 2);
    ((c << 6) | ((ops[0] & 3) << 4) | ((ops[1] & 3) << 2) | (ops[2] & 3)) as u16
}

/// Inverse of `unpack2`. Leaves bit 4 clear.
pub fn pack2(ops: [u32; 2]) -> u16 {
    let v = (ops[0] >> 2) + 3 * (ops[1] >> 2);
    let (c, ext) = if v < 5 { (27 + v, 0) } else { (22 + v, 1) };
    ((c << 6) | (ext << 5) | ((ops[0] & 3) << 2) | (ops[1] & 3)) as u16
}

/// Encoding of a bit-position value, the first index that yields it.
pub fn bitp_index(value: u32) -> Option<u32> {
    BITP.iter().position(|&b| b == value).map(|i| i as u32)
}

#[test]
fn test_bits() {
    assert_eq!(bits(0xa6dd, 15, 11), 0x14);
    assert_eq!(bits(0xa6dd, 10, 6), 27);
    assert_eq!(bit(0xa6dd, 4), 1);
    assert_eq!(bit(0xa6dd, 5), 0);
    assert_eq!(mask(6), 0x3f);
    assert_eq!(mask(32), 0xffff_ffff);
    assert_eq!(half(0x07ec_f81b, 0), 0xf81b);
    assert_eq!(half(0x07ec_f81b, 1), 0x07ec);
}

#[test]
fn test_read_half() {
    assert_eq!(read_half(&[0xdd, 0xa6], 0), Ok(0xa6dd));
    assert_eq!(read_half(&[0xdd, 0xa6, 0x01], 1), Ok(0x01a6));
    assert_eq!(
        read_half(&[0xdd, 0xa6, 0x01], 2),
        Err(DecodeError::TruncatedInput { needed: 4, available: 3 })
    );
}

#[test]
fn test_packed_operands() {
    // 9*1 + 3*2 + 1 = 16
    let h = 0x1000 | pack3([5, 11, 4]);
    assert_eq!(h, 0x141c);
    assert_eq!(combined3(h), Some(16));
    assert_eq!(unpack3(h, 0), 5);
    assert_eq!(unpack3(h, 1), 11);
    assert_eq!(unpack3(h, 2), 4);

    for a in 0..REGISTERS {
        for b in 0..REGISTERS {
            let h = pack2([a, b]);
            assert!(combined3(h).is_none());
            assert!(combined2(h).is_some());
            assert_eq!((unpack2(h, 0), unpack2(h, 1)), (a, b));
        }
    }
}

#[test]
fn test_combined2_rejects_single_operand_marker() {
    // bits 10:5 all set is where the one operand forms live
    assert_eq!(combined2(0x07e0), None);
    assert_eq!(combined2(0x07c0), Some(4));
}

#[test]
fn test_bitp() {
    assert_eq!(bitp_index(32), Some(0));
    assert_eq!(bitp_index(24), Some(10));
    assert_eq!(bitp_index(9), None);
}
