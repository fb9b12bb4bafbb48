//! Calldata encoding and address helpers.
//!
//! Contract entrypoints take a flat list of field elements. Composite values
//! are flattened in declaration order:
//!
//! - integers, addresses and bools take one element
//! - [`U256`] takes two (`low`, `high`)
//! - [`I257`] takes three (`abs.low`, `abs.high`, `is_negative`)
//! - `Vec<T>` is length-prefixed
//! - `Option<T>` is `[0, payload]` for `Some` and `[1]` for `None`
//! - [`ShortString`] packs up to 31 ASCII bytes into one element
//! - [`ByteArray`] is `[full_words, words.., pending_word, pending_len]`

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::felt::{Address, Felt};

/// Bytes packed into one field element by [`ShortString`] and [`ByteArray`].
const WORD_BYTES: usize = 31;

/// Types that flatten into entrypoint calldata.
pub trait CalldataEncode {
    fn encode(&self, out: &mut Vec<Felt>);

    fn to_calldata(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

impl CalldataEncode for Felt {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(*self);
    }
}

impl CalldataEncode for Address {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(self.felt());
    }
}

impl CalldataEncode for bool {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl CalldataEncode for u8 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl CalldataEncode for u32 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl CalldataEncode for u64 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl CalldataEncode for u128 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl<T: CalldataEncode> CalldataEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.as_slice().encode(out);
    }
}

impl<T: CalldataEncode> CalldataEncode for [T] {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.len()));
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: CalldataEncode> CalldataEncode for Option<T> {
    fn encode(&self, out: &mut Vec<Felt>) {
        match self {
            Some(value) => {
                out.push(Felt::ZERO);
                value.encode(out);
            }
            None => out.push(Felt::ONE),
        }
    }
}

impl<T: CalldataEncode + ?Sized> CalldataEncode for &T {
    fn encode(&self, out: &mut Vec<Felt>) {
        (**self).encode(out);
    }
}

/// Unsigned 256-bit integer as carried by the ledger (two 128-bit limbs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct U256 {
    pub low: u128,
    pub high: u128,
}

impl U256 {
    pub const ZERO: U256 = U256 { low: 0, high: 0 };

    /// Rebuild from the two limbs returned by a state read.
    pub fn from_felts(low: Felt, high: Felt) -> Result<Self> {
        let low = low
            .to_u128()
            .ok_or_else(|| anyhow!("u256 low limb {} exceeds 128 bits", low))?;
        let high = high
            .to_u128()
            .ok_or_else(|| anyhow!("u256 high limb {} exceeds 128 bits", high))?;
        Ok(U256 { low, high })
    }
}

impl From<u128> for U256 {
    fn from(low: u128) -> Self {
        U256 { low, high: 0 }
    }
}

impl CalldataEncode for U256 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.low));
        out.push(Felt::from(self.high));
    }
}

/// Signed 257-bit integer: a `U256` magnitude plus a sign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct I257 {
    pub abs: U256,
    pub is_negative: bool,
}

impl I257 {
    pub fn new(value: i128) -> Self {
        I257 {
            abs: U256::from(value.unsigned_abs()),
            // zero is never negative
            is_negative: value < 0,
        }
    }
}

impl CalldataEncode for I257 {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.abs.encode(out);
        self.is_negative.encode(out);
    }
}

/// ASCII string of at most 31 bytes packed into a single element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortString(String);

impl ShortString {
    pub fn new(value: &str) -> Result<Self> {
        if !value.is_ascii() {
            return Err(anyhow!("Short string '{}' must be ASCII", value));
        }
        if value.len() > WORD_BYTES {
            return Err(anyhow!(
                "Short string '{}' is {} bytes, limit is {}",
                value,
                value.len(),
                WORD_BYTES
            ));
        }
        Ok(ShortString(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_felt(&self) -> Felt {
        pack_word(self.0.as_bytes())
    }

    /// Decode a packed element back into text, dropping leading zero bytes.
    pub fn decode(felt: Felt) -> Result<Self> {
        let bytes = felt.to_bytes_be();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let text = std::str::from_utf8(&bytes[start..])
            .map_err(|e| anyhow!("Element {} is not a short string: {}", felt, e))?;
        ShortString::new(text)
    }
}

impl TryFrom<String> for ShortString {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        ShortString::new(&value)
    }
}

impl From<ShortString> for String {
    fn from(value: ShortString) -> Self {
        value.0
    }
}

impl CalldataEncode for ShortString {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(self.to_felt());
    }
}

/// Arbitrary-length UTF-8 string split into 31-byte words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteArray(pub String);

impl ByteArray {
    pub fn new(value: impl Into<String>) -> Self {
        ByteArray(value.into())
    }
}

impl CalldataEncode for ByteArray {
    fn encode(&self, out: &mut Vec<Felt>) {
        let bytes = self.0.as_bytes();
        let full_words = bytes.len() / WORD_BYTES;
        out.push(Felt::from(full_words));
        for chunk in bytes.chunks_exact(WORD_BYTES) {
            out.push(pack_word(chunk));
        }
        let pending = &bytes[full_words * WORD_BYTES..];
        out.push(pack_word(pending));
        out.push(Felt::from(pending.len()));
    }
}

fn pack_word(bytes: &[u8]) -> Felt {
    debug_assert!(bytes.len() <= WORD_BYTES);
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    // 31 bytes leave the top byte zero, which is always inside the field
    Felt::from_digest(word)
}

/// Builder for entrypoint calldata assembled from heterogeneous arguments.
#[derive(Debug, Default, Clone)]
pub struct Calldata(Vec<Felt>);

impl Calldata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl CalldataEncode) -> Self {
        value.encode(&mut self.0);
        self
    }

    pub fn build(self) -> Vec<Felt> {
        self.0
    }
}

/// Normalize an address string to lowercase with 0x prefix and full 64 hex characters.
///
/// ```
/// use deployer_types::encoding::normalize_address;
///
/// assert_eq!(
///     normalize_address("0xABC"),
///     "0x0000000000000000000000000000000000000000000000000000000000000abc"
/// );
/// ```
pub fn normalize_address(addr: &str) -> String {
    let addr = addr.trim();
    let hex = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr)
        .to_lowercase();
    if hex.len() < 64 {
        format!("0x{:0>64}", hex)
    } else {
        format!("0x{}", &hex[..64])
    }
}

/// Compare two address strings regardless of case, prefix or zero padding.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_and_i257_layout() {
        let value = U256::from(7u128);
        assert_eq!(value.to_calldata(), vec![Felt::from(7u64), Felt::ZERO]);

        let negative = I257::new(-5);
        assert_eq!(
            negative.to_calldata(),
            vec![Felt::from(5u64), Felt::ZERO, Felt::ONE]
        );
        assert!(!I257::new(0).is_negative);
    }

    #[test]
    fn test_vec_is_length_prefixed() {
        let values = vec![1u64, 2, 3];
        let encoded = values.to_calldata();
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded[0], Felt::from(3u64));
    }

    #[test]
    fn test_option_variants() {
        assert_eq!(None::<Felt>.to_calldata(), vec![Felt::ONE]);
        assert_eq!(
            Some(Felt::from(9u64)).to_calldata(),
            vec![Felt::ZERO, Felt::from(9u64)]
        );
    }

    #[test]
    fn test_short_string_roundtrip() {
        let s = ShortString::new("ETH/USD").unwrap();
        assert_eq!(s.to_felt(), Felt::from_hex("0x4554482f555344").unwrap());
        assert_eq!(ShortString::decode(s.to_felt()).unwrap(), s);
        assert!(ShortString::new(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_byte_array_splits_words() {
        let text = "a".repeat(33);
        let encoded = ByteArray::new(text).to_calldata();
        // one full word, the word itself, pending word, pending length
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded[0], Felt::ONE);
        assert_eq!(encoded[3], Felt::from(2u64));
    }

    #[test]
    fn test_calldata_builder_order() {
        let data = Calldata::new()
            .arg(Felt::from(1u64))
            .arg(U256::from(2u128))
            .arg(true)
            .build();
        assert_eq!(
            data,
            vec![Felt::from(1u64), Felt::from(2u64), Felt::ZERO, Felt::ONE]
        );
    }

    #[test]
    fn test_addresses_equal() {
        assert!(addresses_equal("0xABC", "0x0000abc"));
        assert!(!addresses_equal("0xabc", "0xabd"));
    }
}
