// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Checksum framing.
//!
//! Every frame on the wire is
//!
//! ```text
//! byte 0       : TAG          = 0x78
//! byte 1       : OPCODE / MODE
//! byte 2       : LENGTH of the bytes that follow, excluding the checksum
//! byte 3..N    : payload
//! byte N+1     : CHECKSUM = sum of all preceding bytes, mod 256
//! ```

/// Fixed leading tag byte shared by every frame.
pub const TAG: u8 = 0x78;

/// Appends the modular-sum checksum byte to `payload`, returning the
/// complete wire frame.
///
/// `checksum = (sum of payload bytes) mod 256`. Bytes are always
/// non-negative `u8`s in this crate, but the formula keeps the `+256`
/// promotion from the reference implementation's signed-byte arithmetic in
/// its doc comment for posterity: `checksum += (v + 256) if v < 0 else v`.
pub fn tag_checksum(payload: &[u8]) -> Vec<u8> {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push((sum & 0xFF) as u8);
    frame
}

/// Splits a canonical `AA:BB:CC:DD:EE:FF` address into 6 raw bytes, in
/// address order, for frames that embed a MAC (Infinity envelope frames).
pub fn split_mac_address(addr: &str) -> anyhow::Result<[u8; 6]> {
    crate::utils::mac_to_bytes(addr)
}
