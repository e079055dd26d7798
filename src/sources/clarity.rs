//! Clarity value codec for the read-only contract call API.
//!
//! Results come back as the consensus serialization of a Clarity value,
//! hex encoded with a `0x` prefix. Only the parts the pool scanner needs are
//! interpreted beyond decoding: integers, strings, principals and tuples.

use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const MAX_DEPTH: usize = 64;

mod type_id {
    pub const INT: u8 = 0x00;
    pub const UINT: u8 = 0x01;
    pub const BUFFER: u8 = 0x02;
    pub const BOOL_TRUE: u8 = 0x03;
    pub const BOOL_FALSE: u8 = 0x04;
    pub const STANDARD_PRINCIPAL: u8 = 0x05;
    pub const CONTRACT_PRINCIPAL: u8 = 0x06;
    pub const RESPONSE_OK: u8 = 0x07;
    pub const RESPONSE_ERR: u8 = 0x08;
    pub const OPTIONAL_NONE: u8 = 0x09;
    pub const OPTIONAL_SOME: u8 = 0x0a;
    pub const LIST: u8 = 0x0b;
    pub const TUPLE: u8 = 0x0c;
    pub const STRING_ASCII: u8 = 0x0d;
    pub const STRING_UTF8: u8 = 0x0e;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClarityError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("unexpected end of input at byte {0}")]
    Truncated(usize),

    #[error("unknown type id 0x{0:02x}")]
    UnknownType(u8),

    #[error("invalid string content")]
    InvalidString,

    #[error("value nested deeper than {MAX_DEPTH}")]
    TooDeep,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("contract returned an error: {0}")]
    ErrResponse(String),

    #[error("contract returned none")]
    NoneValue,
}

/// A standard (`SP…`) or contract (`SP….name`) principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub version: u8,
    pub hash160: [u8; 20],
    pub contract_name: Option<String>,
}

impl Principal {
    /// c32check encoded Stacks address of the principal's account.
    pub fn address(&self) -> String {
        let mut payload = Vec::with_capacity(25);
        payload.push(self.version);
        payload.extend_from_slice(&self.hash160);
        let checksum = Sha256::digest(Sha256::digest(&payload));

        let mut data = self.hash160.to_vec();
        data.extend_from_slice(&checksum[..4]);

        let mut address = String::from("S");
        address.push(C32_ALPHABET[(self.version & 0x1f) as usize] as char);
        address.push_str(&c32_encode(&data));
        address
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract_name {
            Some(name) => write!(f, "{}.{}", self.address(), name),
            None => f.write_str(&self.address()),
        }
    }
}

/// Crockford-style base32 used by Stacks addresses. Each leading zero byte
/// becomes a leading `0` digit.
fn c32_encode(bytes: &[u8]) -> String {
    let mut digits = Vec::with_capacity(bytes.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in bytes.iter().rev() {
        acc |= u32::from(byte) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
    }

    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    for _ in bytes.iter().take_while(|b| **b == 0) {
        digits.push(b'0');
    }

    digits.iter().rev().map(|&d| d as char).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    Principal(Principal),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(Vec<(String, ClarityValue)>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    pub fn from_hex(input: &str) -> Result<Self, ClarityError> {
        let trimmed = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(trimmed).map_err(|e| ClarityError::Hex(e.to_string()))?;
        Self::deserialize(&bytes)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ClarityError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.value(0)?;
        let rest = bytes.len() - reader.pos;
        if rest > 0 {
            return Err(ClarityError::TrailingBytes(rest));
        }
        Ok(value)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.serialize()))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            ClarityValue::Int(v) => {
                out.push(type_id::INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::UInt(v) => {
                out.push(type_id::UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::Buffer(data) => {
                out.push(type_id::BUFFER);
                write_len_prefixed(out, data);
            }
            ClarityValue::Bool(true) => out.push(type_id::BOOL_TRUE),
            ClarityValue::Bool(false) => out.push(type_id::BOOL_FALSE),
            ClarityValue::Principal(p) => {
                match &p.contract_name {
                    Some(_) => out.push(type_id::CONTRACT_PRINCIPAL),
                    None => out.push(type_id::STANDARD_PRINCIPAL),
                }
                out.push(p.version);
                out.extend_from_slice(&p.hash160);
                if let Some(name) = &p.contract_name {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                }
            }
            ClarityValue::ResponseOk(inner) => {
                out.push(type_id::RESPONSE_OK);
                inner.write_to(out);
            }
            ClarityValue::ResponseErr(inner) => {
                out.push(type_id::RESPONSE_ERR);
                inner.write_to(out);
            }
            ClarityValue::OptionalNone => out.push(type_id::OPTIONAL_NONE),
            ClarityValue::OptionalSome(inner) => {
                out.push(type_id::OPTIONAL_SOME);
                inner.write_to(out);
            }
            ClarityValue::List(items) => {
                out.push(type_id::LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            ClarityValue::Tuple(fields) => {
                out.push(type_id::TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                for (name, value) in fields {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_to(out);
                }
            }
            ClarityValue::StringAscii(s) => {
                out.push(type_id::STRING_ASCII);
                write_len_prefixed(out, s.as_bytes());
            }
            ClarityValue::StringUtf8(s) => {
                out.push(type_id::STRING_UTF8);
                write_len_prefixed(out, s.as_bytes());
            }
        }
    }

    /// Strips `(ok …)` and `(some …)` wrappers.
    pub fn unwrap_result(self) -> Result<ClarityValue, ClarityError> {
        match self {
            ClarityValue::ResponseOk(inner) | ClarityValue::OptionalSome(inner) => {
                inner.unwrap_result()
            }
            ClarityValue::ResponseErr(inner) => Err(ClarityError::ErrResponse(
                inner.display_value().unwrap_or_else(|| format!("{inner:?}")),
            )),
            ClarityValue::OptionalNone => Err(ClarityError::NoneValue),
            other => Ok(other),
        }
    }

    pub fn tuple_field(&self, name: &str) -> Option<&ClarityValue> {
        match self {
            ClarityValue::Tuple(fields) => {
                fields.iter().find(|(key, _)| key == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Unsigned view of integer values. Negative ints have none.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            ClarityValue::UInt(v) => Some(*v),
            ClarityValue::Int(v) => u128::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Plain string form of a scalar value: integers in decimal, principals
    /// as addresses, buffers as `0x` hex. Containers have none, except
    /// `(some v)` which renders `v`.
    pub fn display_value(&self) -> Option<String> {
        match self {
            ClarityValue::Int(v) => Some(v.to_string()),
            ClarityValue::UInt(v) => Some(v.to_string()),
            ClarityValue::Buffer(data) => Some(format!("0x{}", hex::encode(data))),
            ClarityValue::Bool(b) => Some(b.to_string()),
            ClarityValue::Principal(p) => Some(p.to_string()),
            ClarityValue::StringAscii(s) | ClarityValue::StringUtf8(s) => Some(s.clone()),
            ClarityValue::OptionalSome(inner) => inner.display_value(),
            _ => None,
        }
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClarityError> {
        let end = self.pos.checked_add(n).ok_or(ClarityError::Truncated(self.pos))?;
        let slice = self.bytes.get(self.pos..end).ok_or(ClarityError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClarityError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ClarityError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn u128_bytes(&mut self) -> Result<[u8; 16], ClarityError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(buf)
    }

    fn len_prefixed(&mut self) -> Result<&'a [u8], ClarityError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn name(&mut self) -> Result<String, ClarityError> {
        let len = self.u8()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ClarityError::InvalidString)
    }

    fn principal(&mut self, with_contract: bool) -> Result<Principal, ClarityError> {
        let version = self.u8()?;
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(self.take(20)?);
        let contract_name = if with_contract { Some(self.name()?) } else { None };
        Ok(Principal { version, hash160, contract_name })
    }

    fn value(&mut self, depth: usize) -> Result<ClarityValue, ClarityError> {
        if depth > MAX_DEPTH {
            return Err(ClarityError::TooDeep);
        }

        let id = self.u8()?;
        let value = match id {
            type_id::INT => ClarityValue::Int(i128::from_be_bytes(self.u128_bytes()?)),
            type_id::UINT => ClarityValue::UInt(u128::from_be_bytes(self.u128_bytes()?)),
            type_id::BUFFER => ClarityValue::Buffer(self.len_prefixed()?.to_vec()),
            type_id::BOOL_TRUE => ClarityValue::Bool(true),
            type_id::BOOL_FALSE => ClarityValue::Bool(false),
            type_id::STANDARD_PRINCIPAL => ClarityValue::Principal(self.principal(false)?),
            type_id::CONTRACT_PRINCIPAL => ClarityValue::Principal(self.principal(true)?),
            type_id::RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.value(depth + 1)?)),
            type_id::RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.value(depth + 1)?)),
            type_id::OPTIONAL_NONE => ClarityValue::OptionalNone,
            type_id::OPTIONAL_SOME => ClarityValue::OptionalSome(Box::new(self.value(depth + 1)?)),
            type_id::LIST => {
                let count = self.u32()? as usize;
                // Every item takes at least one byte.
                let mut items = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            type_id::TUPLE => {
                let count = self.u32()? as usize;
                let mut fields = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
                for _ in 0..count {
                    let name = self.name()?;
                    let value = self.value(depth + 1)?;
                    fields.push((name, value));
                }
                ClarityValue::Tuple(fields)
            }
            type_id::STRING_ASCII => {
                let raw = self.len_prefixed()?;
                if !raw.is_ascii() {
                    return Err(ClarityError::InvalidString);
                }
                ClarityValue::StringAscii(String::from_utf8_lossy(raw).into_owned())
            }
            type_id::STRING_UTF8 => {
                let raw = self.len_prefixed()?;
                let s = std::str::from_utf8(raw).map_err(|_| ClarityError::InvalidString)?;
                ClarityValue::StringUtf8(s.to_string())
            }
            other => return Err(ClarityError::UnknownType(other)),
        };
        Ok(value)
    }
}
