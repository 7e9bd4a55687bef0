//! Shared plumbing for the 256-bit value types.
//!
//! Every word is stored as 32 big-endian bytes. The textual form is `0x`
//! followed by 64 lowercase hex digits; parsing also accepts shorter hex
//! strings and plain decimal integers, both left-padded with zeros.

use crate::{TypesError, WORD_BYTES};

/// Parse a 256-bit word from `0x`-prefixed hex, bare hex, or decimal text.
pub(crate) fn parse_word(s: &str) -> Result<[u8; WORD_BYTES], TypesError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TypesError::Empty);
    }
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return parse_hex(hex_digits);
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_decimal(s);
    }
    parse_hex(s)
}

fn parse_hex(digits: &str) -> Result<[u8; WORD_BYTES], TypesError> {
    if digits.is_empty() {
        return Err(TypesError::Empty);
    }
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };
    let raw = hex::decode(digits).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    if raw.len() > WORD_BYTES {
        return Err(TypesError::Overflow(raw.len()));
    }
    let mut out = [0u8; WORD_BYTES];
    out[WORD_BYTES - raw.len()..].copy_from_slice(&raw);
    Ok(out)
}

fn parse_decimal(digits: &str) -> Result<[u8; WORD_BYTES], TypesError> {
    let mut out = [0u8; WORD_BYTES];
    for ch in digits.bytes() {
        if !ch.is_ascii_digit() {
            return Err(TypesError::InvalidDecimal(digits.to_string()));
        }
        let mut carry = u32::from(ch - b'0');
        for byte in out.iter_mut().rev() {
            let v = u32::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(TypesError::Overflow(WORD_BYTES + 1));
        }
    }
    Ok(out)
}

/// Define a 32-byte newtype with hex display, flexible parsing and
/// string-based serde.
macro_rules! word_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $crate::WORD_BYTES]);

        impl $name {
            pub const ZERO: Self = Self([0u8; $crate::WORD_BYTES]);

            pub fn new(bytes: [u8; $crate::WORD_BYTES]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $crate::WORD_BYTES] {
                &self.0
            }

            pub fn into_bytes(self) -> [u8; $crate::WORD_BYTES] {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $crate::WORD_BYTES]
            }

            /// Full `0x`-prefixed, zero-padded hex form.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $crate::word::parse_word(s).map(Self)
            }
        }

        impl From<[u8; $crate::WORD_BYTES]> for $name {
            fn from(bytes: [u8; $crate::WORD_BYTES]) -> Self {
                Self(bytes)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}(0x{}\u{2026})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use word_type;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hex_is_left_padded() {
        let w = parse_word("0xab01").unwrap();
        assert_eq!(&w[30..], &[0xab, 0x01]);
        assert!(w[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn odd_length_hex_gets_leading_nibble() {
        let w = parse_word("0xabc").unwrap();
        assert_eq!(&w[30..], &[0x0a, 0xbc]);
    }

    #[test]
    fn decimal_matches_hex() {
        assert_eq!(parse_word("4660").unwrap(), parse_word("0x1234").unwrap());
        assert_eq!(parse_word("0").unwrap(), [0u8; WORD_BYTES]);
    }

    #[test]
    fn bare_hex_with_letters_is_hex() {
        assert_eq!(parse_word("ff").unwrap(), parse_word("0xff").unwrap());
    }

    #[test]
    fn max_decimal_fits() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(parse_word(max).unwrap(), [0xff; WORD_BYTES]);
        let over = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(matches!(parse_word(over), Err(TypesError::Overflow(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_word(""), Err(TypesError::Empty));
        assert_eq!(parse_word("0x"), Err(TypesError::Empty));
        assert!(matches!(parse_word("0xzz"), Err(TypesError::InvalidHex(_))));
        let too_long = format!("0x{}", "11".repeat(33));
        assert_eq!(parse_word(&too_long), Err(TypesError::Overflow(33)));
    }
}
