use std::{fmt, str::FromStr};

use super::CaError;

/// Width of allocated serial numbers. RFC 5280 caps serials at 20 octets;
/// 16 random octets leave room for the DER sign byte.
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// A positive certificate serial number held as minimal big-endian bytes.
///
/// The canonical text form is lowercase hex of those bytes. It is the key
/// certificate records are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    /// Build a serial from big-endian bytes. Leading zero bytes are dropped;
    /// returns `None` for zero.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let start = bytes.iter().position(|b| *b != 0)?;
        Some(Self(bytes[start..].to_vec()))
    }

    /// Parse user supplied hex, accepting surrounding whitespace, any case,
    /// an optional `0x` prefix, colon separators and leading zeros.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let digits: String = trimmed
            .chars()
            .filter(|c| *c != ':')
            .collect::<String>()
            .to_ascii_lowercase();
        let digits = digits.trim_start_matches('0');

        if digits.is_empty() {
            return None;
        }

        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };

        hex::decode(padded).ok().and_then(|b| Self::from_bytes(&b))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid serial number: {0:?}")]
pub struct InvalidSerialNumber(String);

impl FromStr for SerialNumber {
    type Err = InvalidSerialNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidSerialNumber(s.to_string()))
    }
}

impl From<&SerialNumber> for rcgen::SerialNumber {
    fn from(value: &SerialNumber) -> Self {
        rcgen::SerialNumber::from_slice(value.as_bytes())
    }
}

/// Source of serial numbers for new certificates.
pub trait SerialAllocator: Send + Sync {
    fn allocate(&self) -> Result<SerialNumber, CaError>;
}

/// Draws serials uniformly from [1, 2^128) using the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSerialAllocator;

impl SerialAllocator for RandomSerialAllocator {
    fn allocate(&self) -> Result<SerialNumber, CaError> {
        loop {
            let mut buf = [0u8; SERIAL_NUMBER_BYTES];
            getrandom::getrandom(&mut buf).map_err(CaError::Randomness)?;

            if let Some(serial) = SerialNumber::from_bytes(&buf) {
                return Ok(serial);
            }
        }
    }
}
