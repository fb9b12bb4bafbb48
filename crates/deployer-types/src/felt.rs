//! Field elements and contract addresses.
//!
//! Every value the ledger sees is a field element: calldata, event fields,
//! class hashes, transaction hashes and contract addresses. [`Felt`] stores the
//! element as 32 big-endian bytes and enforces the field modulus on parse.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Field modulus `2^251 + 17 * 2^192 + 1`, big-endian.
const PRIME: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// A ledger field element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Felt([u8; 32]);

impl Felt {
    pub const ZERO: Felt = Felt([0; 32]);
    pub const ONE: Felt = Felt::from_u128(1);

    pub const fn from_u128(value: u128) -> Self {
        let src = value.to_be_bytes();
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < 16 {
            bytes[16 + i] = src[i];
            i += 1;
        }
        Felt(bytes)
    }

    /// Parse a hex literal at compile time; invalid input fails the build.
    pub const fn from_hex_const(value: &str) -> Self {
        let bytes = value.as_bytes();
        let mut start = 0;
        if bytes.len() >= 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
            start = 2;
        }
        let digits = bytes.len() - start;
        assert!(digits > 0 && digits <= 64, "hex literal must be 1..=64 digits");
        let mut out = [0u8; 32];
        let mut i = 0;
        while i < digits {
            let c = bytes[bytes.len() - 1 - i];
            let nibble = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => panic!("invalid hex digit"),
            };
            let index = 31 - i / 2;
            if i % 2 == 0 {
                out[index] |= nibble;
            } else {
                out[index] |= nibble << 4;
            }
            i += 1;
        }
        assert!(out[0] <= 0x07, "hex literal exceeds 251 bits");
        Felt(out)
    }

    /// Build from raw big-endian bytes, rejecting values outside the field.
    pub fn from_bytes_be(bytes: [u8; 32]) -> Result<Self> {
        if bytes >= PRIME {
            return Err(anyhow!(
                "value 0x{} exceeds the field modulus",
                hex::encode(bytes)
            ));
        }
        Ok(Felt(bytes))
    }

    /// Truncate a 256-bit digest to 251 bits so it always fits in the field.
    pub fn from_digest(mut bytes: [u8; 32]) -> Self {
        bytes[0] &= 0x07;
        Felt(bytes)
    }

    /// SHA-256 over the concatenated parts, truncated to the field.
    pub fn hash_of(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self::from_digest(hasher.finalize().into())
    }

    /// Parse a hex string with or without `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 64 {
            return Err(anyhow!("Invalid field element hex '{}'", value));
        }
        let padded = format!("{:0>64}", digits);
        let decoded =
            hex::decode(&padded).map_err(|e| anyhow!("Invalid field element hex '{}': {}", value, e))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Self::from_bytes_be(bytes)
    }

    /// Parse a base-10 string.
    pub fn from_dec_str(value: &str) -> Result<Self> {
        let digits = value.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow!("Invalid decimal field element '{}'", value));
        }
        let mut bytes = [0u8; 32];
        for digit in digits.bytes() {
            let mut carry = u16::from(digit - b'0');
            for byte in bytes.iter_mut().rev() {
                let acc = u16::from(*byte) * 10 + carry;
                *byte = (acc & 0xff) as u8;
                carry = acc >> 8;
            }
            if carry != 0 {
                return Err(anyhow!("Decimal field element '{}' overflows", value));
            }
        }
        Self::from_bytes_be(bytes)
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        self.0
    }

    /// `Some` when the element fits in 128 bits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Minimal lowercase hex, e.g. `0x2`.
    pub fn to_hex(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }

    /// Zero-padded lowercase hex, always 66 characters.
    pub fn to_hex_full(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt::from_u128(value)
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt::from_u128(u128::from(value))
    }
}

impl From<u32> for Felt {
    fn from(value: u32) -> Self {
        Felt::from_u128(u128::from(value))
    }
}

impl From<u8> for Felt {
    fn from(value: u8) -> Self {
        Felt::from_u128(u128::from(value))
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        if value {
            Felt::ONE
        } else {
            Felt::ZERO
        }
    }
}

impl From<usize> for Felt {
    fn from(value: usize) -> Self {
        Felt::from_u128(value as u128)
    }
}

impl FromStr for Felt {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            Self::from_hex(trimmed)
        } else {
            Self::from_dec_str(trimmed)
        }
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Number(n) => Ok(Felt::from(n)),
        }
    }
}

/// Address of a deployed contract or account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Felt);

impl Address {
    pub const ZERO: Address = Address(Felt::ZERO);

    pub const fn new(felt: Felt) -> Self {
        Address(felt)
    }

    pub fn felt(&self) -> Felt {
        self.0
    }

    /// Parse an address with a context label for error messages.
    pub fn parse(value: &str, context: &str) -> Result<Self> {
        Felt::from_hex(value)
            .map(Address)
            .map_err(|e| anyhow!("Invalid {} address '{}': {}", context, value, e))
    }

    pub fn to_hex_full(&self) -> String {
        self.0.to_hex_full()
    }
}

impl From<Felt> for Address {
    fn from(felt: Felt) -> Self {
        Address(felt)
    }
}

impl From<Address> for Felt {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s, "contract")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip_and_short_form() {
        let felt = Felt::from_hex("0x00ABC").unwrap();
        assert_eq!(felt.to_hex(), "0xabc");
        assert_eq!(felt.to_hex_full().len(), 66);
        assert_eq!(Felt::ZERO.to_hex(), "0x0");
    }

    #[test]
    fn test_const_hex_matches_runtime_parse() {
        const VALUE: Felt = Felt::from_hex_const("0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf");
        assert_eq!(
            VALUE,
            Felt::from_hex("0x41a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf").unwrap()
        );
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(Felt::from_dec_str("255").unwrap(), Felt::from(255u64));
        assert_eq!(
            "1000000000000000000".parse::<Felt>().unwrap().to_u128(),
            Some(1_000_000_000_000_000_000)
        );
        assert!(Felt::from_dec_str("12a").is_err());
    }

    #[test]
    fn test_field_modulus_enforced() {
        let prime = "0x800000000000011000000000000000000000000000000000000000000000001";
        assert!(Felt::from_hex(prime).is_err());
        let max = "0x800000000000011000000000000000000000000000000000000000000000000";
        assert!(Felt::from_hex(max).is_ok());
    }

    #[test]
    fn test_digest_always_fits() {
        let felt = Felt::from_digest([0xff; 32]);
        assert!(Felt::from_bytes_be(felt.to_bytes_be()).is_ok());
    }

    #[test]
    fn test_serde_accepts_numbers_and_strings() {
        let from_num: Felt = serde_json::from_str("42").unwrap();
        let from_hex: Felt = serde_json::from_str("\"0x2a\"").unwrap();
        assert_eq!(from_num, from_hex);
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"0x2a\"");
    }

    #[test]
    fn test_address_parse_reports_context() {
        let err = Address::parse("0xzz", "oracle").unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }
}
