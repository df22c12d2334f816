// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLV parameter list codec.
//!
//! Records are `{pid: u16, length: u16, value}` with `length` rounded up
//! to a 4-byte boundary, closed by `PID_SENTINEL` with length 0. The
//! endianness of every multi-byte field, including the record headers,
//! follows the encapsulation chosen by the caller.

use crate::core::guid::GUID;
use crate::core::locator::Locator;
use crate::protocol::constants::{PID_SENTINEL, PL_CDR_BE, PL_CDR_LE};
use crate::protocol::ParseError;
use crate::qos::RtpsDuration;

/// Byte order of an encoded parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    /// Encapsulation identifier for this byte order.
    pub fn encapsulation(self) -> u16 {
        match self {
            Endianness::Big => PL_CDR_BE,
            Endianness::Little => PL_CDR_LE,
        }
    }
}

/// One tag-length-value record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub pid: u16,
    pub value: Vec<u8>,
}

/// Ordered sequence of parameter records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterList {
    parameters: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pid: u16, value: Vec<u8>) {
        self.parameters.push(Parameter { pid, value });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// First record with the given pid, if any.
    pub fn find(&self, pid: u16) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.pid == pid)
    }

    /// Emit records in insertion order and append the sentinel.
    ///
    /// # Errors
    /// `ParseError::BufferTooSmall` when a value padded to 4 bytes no
    /// longer fits the u16 length field.
    pub fn encode(&self, endianness: Endianness) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::with_capacity(64);
        for param in &self.parameters {
            let padded = (param.value.len() + 3) & !3;
            let length = u16::try_from(padded).map_err(|_| ParseError::BufferTooSmall)?;
            write_u16(&mut out, param.pid, endianness);
            write_u16(&mut out, length, endianness);
            out.extend_from_slice(&param.value);
            out.resize(out.len() + (padded - param.value.len()), 0);
        }
        write_u16(&mut out, PID_SENTINEL, endianness);
        write_u16(&mut out, 0, endianness);
        Ok(out)
    }

    /// Iterate records until the sentinel.
    ///
    /// # Errors
    /// - `ParseError::TruncatedData` when a record header or value runs
    ///   past the end of the buffer.
    /// - `ParseError::MissingSentinel` when the buffer ends cleanly but
    ///   no sentinel was seen.
    pub fn decode(buf: &[u8], endianness: Endianness) -> Result<Self, ParseError> {
        let mut parameters = Vec::new();
        let mut offset = 0usize;
        loop {
            if offset + 4 > buf.len() {
                return if offset == buf.len() {
                    Err(ParseError::MissingSentinel)
                } else {
                    Err(ParseError::TruncatedData)
                };
            }
            let pid = read_u16(buf, offset, endianness);
            let length = read_u16(buf, offset + 2, endianness) as usize;
            offset += 4;
            if pid == PID_SENTINEL {
                return Ok(Self { parameters });
            }
            if offset + length > buf.len() {
                return Err(ParseError::TruncatedData);
            }
            parameters.push(Parameter {
                pid,
                value: buf[offset..offset + length].to_vec(),
            });
            offset += length;
        }
    }
}

/// Prefix an encoded parameter list with the encapsulation header.
pub fn encapsulate(list: &ParameterList, endianness: Endianness) -> Result<Vec<u8>, ParseError> {
    let body = list.encode(endianness)?;
    let mut out = Vec::with_capacity(4 + body.len());
    // Encapsulation identifier is always big-endian per CDR.
    out.extend_from_slice(&endianness.encapsulation().to_be_bytes());
    out.extend_from_slice(&[0x00, 0x00]); // options
    out.extend_from_slice(&body);
    Ok(out)
}

/// Strip the encapsulation header and decode the parameter list.
pub fn decapsulate(buf: &[u8]) -> Result<(ParameterList, Endianness), ParseError> {
    if buf.len() < 4 {
        return Err(ParseError::TruncatedData);
    }
    let encapsulation = u16::from_be_bytes([buf[0], buf[1]]);
    let endianness = match encapsulation {
        PL_CDR_BE => Endianness::Big,
        PL_CDR_LE => Endianness::Little,
        _ => return Err(ParseError::InvalidEncapsulation),
    };
    let list = ParameterList::decode(&buf[4..], endianness)?;
    Ok((list, endianness))
}

// =========================================================================
// Endianness-aware primitive readers/writers
// =========================================================================
// Shared by the record codecs so the LE/BE dispatch lives in one place.

pub(crate) fn read_u16(buf: &[u8], offset: usize, e: Endianness) -> u16 {
    let bytes = [buf[offset], buf[offset + 1]];
    match e {
        Endianness::Big => u16::from_be_bytes(bytes),
        Endianness::Little => u16::from_le_bytes(bytes),
    }
}

pub(crate) fn read_u32(buf: &[u8], offset: usize, e: Endianness) -> u32 {
    let bytes = [
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ];
    match e {
        Endianness::Big => u32::from_be_bytes(bytes),
        Endianness::Little => u32::from_le_bytes(bytes),
    }
}

pub(crate) fn read_i32(buf: &[u8], offset: usize, e: Endianness) -> i32 {
    read_u32(buf, offset, e) as i32
}

pub(crate) fn write_u16(out: &mut Vec<u8>, value: u16, e: Endianness) {
    match e {
        Endianness::Big => out.extend_from_slice(&value.to_be_bytes()),
        Endianness::Little => out.extend_from_slice(&value.to_le_bytes()),
    }
}

pub(crate) fn write_u32(out: &mut Vec<u8>, value: u32, e: Endianness) {
    match e {
        Endianness::Big => out.extend_from_slice(&value.to_be_bytes()),
        Endianness::Little => out.extend_from_slice(&value.to_le_bytes()),
    }
}

pub(crate) fn write_i32(out: &mut Vec<u8>, value: i32, e: Endianness) {
    write_u32(out, value as u32, e);
}

// =========================================================================
// Common value layouts
// =========================================================================

/// CDR string: length (u32, includes NUL) + bytes + NUL, padded to 4.
pub(crate) fn string_value(s: &str, e: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + s.len() + 1);
    write_u32(&mut out, (s.len() + 1) as u32, e);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

pub(crate) fn parse_string(value: &[u8], e: Endianness) -> Option<String> {
    if value.len() < 4 {
        return None;
    }
    let len = read_u32(value, 0, e) as usize;
    if len == 0 || 4 + len > value.len() {
        return None;
    }
    let bytes = &value[4..4 + len - 1]; // drop NUL terminator
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

/// Locator: kind (4) + port (4) + address (16).
pub(crate) fn locator_value(loc: &Locator, e: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(Locator::WIRE_SIZE);
    write_i32(&mut out, loc.kind, e);
    write_u32(&mut out, loc.port, e);
    out.extend_from_slice(&loc.address);
    out
}

pub(crate) fn parse_locator(value: &[u8], e: Endianness) -> Option<Locator> {
    if value.len() < Locator::WIRE_SIZE {
        return None;
    }
    let mut address = [0u8; 16];
    address.copy_from_slice(&value[8..24]);
    Some(Locator {
        kind: read_i32(value, 0, e),
        port: read_u32(value, 4, e),
        address,
    })
}

pub(crate) fn guid_value(guid: &GUID) -> Vec<u8> {
    guid.as_bytes().to_vec()
}

pub(crate) fn parse_guid(value: &[u8]) -> Option<GUID> {
    if value.len() < 16 {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&value[0..16]);
    Some(GUID::from_bytes(bytes))
}

/// Duration: seconds (i32) + nanoseconds (u32).
pub(crate) fn duration_value(d: &RtpsDuration, e: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    write_i32(&mut out, d.seconds, e);
    write_u32(&mut out, d.nanos, e);
    out
}

pub(crate) fn parse_duration(value: &[u8], e: Endianness) -> Option<RtpsDuration> {
    if value.len() < 8 {
        return None;
    }
    Some(RtpsDuration {
        seconds: read_i32(value, 0, e),
        nanos: read_u32(value, 4, e),
    })
}
