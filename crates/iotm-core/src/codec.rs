//! Typed-string codec.
//!
//! The configuration store holds only strings. Adapters speak in typed
//! fields. This module converts between the two so rule-time data flows as
//! strings through the keyed multimap and is decoded only at the point an
//! adapter actually needs a typed value.

use thiserror::Error;

/// The set of types the codec knows how to encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    U8,
    U16,
    I32,
    I64,
    ByteArray,
    Text,
}

/// A decoded, typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    U8(u8),
    U16(u16),
    I32(i32),
    I64(i64),
    ByteArray(Vec<u8>),
    Text(String),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::U8(_) => ValueType::U8,
            TypedValue::U16(_) => ValueType::U16,
            TypedValue::I32(_) => ValueType::I32,
            TypedValue::I64(_) => ValueType::I64,
            TypedValue::ByteArray(_) => ValueType::ByteArray,
            TypedValue::Text(_) => ValueType::Text,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("input `{0}` would overflow the target type")]
    Overflow(String),
    #[error("input `{0}` is not valid hex")]
    MalformedHex(String),
    #[error("input `{0}` is not a valid base-10 integer")]
    MalformedInteger(String),
}

/// Encode a typed value into its textual store representation.
///
/// `u8` and `u16` encode as uppercase hex, zero-padded to their natural
/// width (two and four nibbles respectively). `i32`/`i64` use base-10
/// signed text. A byte array encodes as uppercase hex with no separator.
/// Text is the identity.
pub fn encode(value: &TypedValue) -> String {
    match value {
        TypedValue::U8(v) => format!("{:02X}", v),
        TypedValue::U16(v) => format!("{:04X}", v),
        TypedValue::I32(v) => v.to_string(),
        TypedValue::I64(v) => v.to_string(),
        TypedValue::ByteArray(bytes) => bytes_to_hex(bytes),
        TypedValue::Text(s) => s.clone(),
    }
}

/// Decode a textual store representation into a typed value.
///
/// Hex decoding tolerates an optional leading `0x`. Fails with
/// [`CodecError`] on overflow-length inputs, malformed hex, or an
/// unparsable integer; there is no partial decode.
pub fn decode(input: &str, ty: ValueType) -> Result<TypedValue, CodecError> {
    match ty {
        ValueType::U8 => decode_u8(input).map(TypedValue::U8),
        ValueType::U16 => decode_u16(input).map(TypedValue::U16),
        ValueType::I32 => decode_i32(input).map(TypedValue::I32),
        ValueType::I64 => decode_i64(input).map(TypedValue::I64),
        ValueType::ByteArray => decode_hex(input).map(TypedValue::ByteArray),
        ValueType::Text => Ok(TypedValue::Text(input.to_string())),
    }
}

/// Returns the default (zeroed) value for a type, mirroring the C source's
/// caller-provided output buffer pattern for typed getters that want to
/// receive a decoded value via an out-parameter. In Rust this is simply a
/// default value the caller can overwrite by assignment.
pub fn allocate_buffer(ty: ValueType) -> TypedValue {
    match ty {
        ValueType::U8 => TypedValue::U8(0),
        ValueType::U16 => TypedValue::U16(0),
        ValueType::I32 => TypedValue::I32(0),
        ValueType::I64 => TypedValue::I64(0),
        ValueType::ByteArray => TypedValue::ByteArray(Vec::new()),
        ValueType::Text => TypedValue::Text(String::new()),
    }
}

fn strip_0x(input: &str) -> &str {
    input.strip_prefix("0x").unwrap_or(input)
}

fn decode_u8(input: &str) -> Result<u8, CodecError> {
    let too_long = if input.contains("0x") {
        input.len() > 4
    } else {
        input.len() > 2
    };
    if too_long {
        return Err(CodecError::Overflow(input.to_string()));
    }
    let bytes = decode_hex(input)?;
    bytes
        .first()
        .copied()
        .ok_or_else(|| CodecError::MalformedHex(input.to_string()))
}

fn decode_u16(input: &str) -> Result<u16, CodecError> {
    let too_long = if input.contains("0x") {
        input.len() > 6
    } else {
        input.len() > 4
    };
    if too_long {
        return Err(CodecError::Overflow(input.to_string()));
    }
    u16::from_str_radix(strip_0x(input), 16)
        .map_err(|_| CodecError::MalformedHex(input.to_string()))
}

fn decode_i32(input: &str) -> Result<i32, CodecError> {
    input
        .parse::<i32>()
        .map_err(|_| CodecError::MalformedInteger(input.to_string()))
}

fn decode_i64(input: &str) -> Result<i64, CodecError> {
    input
        .parse::<i64>()
        .map_err(|_| CodecError::MalformedInteger(input.to_string()))
}

fn decode_hex(input: &str) -> Result<Vec<u8>, CodecError> {
    let input = strip_0x(input);
    let mut out = Vec::with_capacity(input.len() / 2);
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i + 2 <= chars.len() {
        let pair: String = chars[i..i + 2].iter().collect();
        let byte = u8::from_str_radix(&pair, 16)
            .map_err(|_| CodecError::MalformedHex(input.to_string()))?;
        out.push(byte);
        i += 2;
    }
    Ok(out)
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_round_trip() {
        let v = TypedValue::U8(0xab);
        let encoded = encode(&v);
        assert_eq!(encoded, "AB");
        assert_eq!(decode(&encoded, ValueType::U8).unwrap(), v);
    }

    #[test]
    fn u16_round_trip() {
        let v = TypedValue::U16(0xbeef);
        let encoded = encode(&v);
        assert_eq!(encoded, "BEEF");
        assert_eq!(decode(&encoded, ValueType::U16).unwrap(), v);
    }

    #[test]
    fn byte_array_round_trip() {
        let v = TypedValue::ByteArray(vec![0xde, 0xad, 0xbe, 0xef]);
        let encoded = encode(&v);
        assert_eq!(encoded, "DEADBEEF");
        match decode(&encoded, ValueType::ByteArray).unwrap() {
            TypedValue::ByteArray(b) => assert_eq!(b, vec![0xde, 0xad, 0xbe, 0xef]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn i32_and_i64_round_trip() {
        let v = TypedValue::I32(-42);
        assert_eq!(decode(&encode(&v), ValueType::I32).unwrap(), v);
        let v = TypedValue::I64(-9_000_000_000);
        assert_eq!(decode(&encode(&v), ValueType::I64).unwrap(), v);
    }

    #[test]
    fn u8_overflow_length_fails() {
        assert_eq!(
            decode("AABB", ValueType::U8),
            Err(CodecError::Overflow("AABB".to_string()))
        );
        assert_eq!(
            decode("0xAABB", ValueType::U8),
            Err(CodecError::Overflow("0xAABB".to_string()))
        );
    }

    #[test]
    fn u16_overflow_length_fails() {
        assert!(decode("AABBC", ValueType::U16).is_err());
        assert!(decode("0xAABBCC", ValueType::U16).is_err());
    }

    #[test]
    fn hex_with_0x_prefix_tolerated() {
        assert_eq!(decode("0xAB", ValueType::U8).unwrap(), TypedValue::U8(0xab));
    }

    #[test]
    fn malformed_hex_fails() {
        assert!(decode("ZZ", ValueType::U8).is_err());
    }

    #[test]
    fn malformed_integer_fails() {
        assert!(decode("not-a-number", ValueType::I32).is_err());
    }
}
