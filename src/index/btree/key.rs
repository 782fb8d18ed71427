use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key synthesis from a decimal integer, used by the file-driven test
/// helpers (`insert_from_file` / `remove_from_file`).
pub trait FromInteger {
    fn from_integer(value: i64) -> Self;
}

impl FromInteger for i32 {
    fn from_integer(value: i64) -> Self {
        value as i32
    }
}

impl FromInteger for i64 {
    fn from_integer(value: i64) -> Self {
        value
    }
}

impl FromInteger for u32 {
    fn from_integer(value: i64) -> Self {
        value as u32
    }
}

impl FromInteger for u64 {
    fn from_integer(value: i64) -> Self {
        value as u64
    }
}

/// Fixed-width byte-comparable index key of `N` bytes (4, 8, 16, 32 or 64
/// in the stock instantiations). Ordering is plain lexicographic byte
/// comparison, so encoders must write order-preserving big-endian forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericKey<const N: usize>(pub [u8; N]);

impl<const N: usize> GenericKey<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> FromInteger for GenericKey<N> {
    /// Encode the integer so that byte comparison matches integer order:
    /// big-endian with the sign bit flipped. Keys narrower than 8 bytes
    /// carry the value as a sign-flipped `i32`; `N` must be at least 4.
    fn from_integer(value: i64) -> Self {
        let mut data = [0u8; N];
        if N >= 8 {
            let encoded = (value as u64) ^ (1 << 63);
            data[..8].copy_from_slice(&encoded.to_be_bytes());
        } else {
            let encoded = (value as i32 as u32) ^ (1 << 31);
            data[..4].copy_from_slice(&encoded.to_be_bytes());
        }
        Self(data)
    }
}

impl<const N: usize> Serialize for GenericKey<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de, const N: usize> Deserialize<'de> for GenericKey<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for KeyVisitor<N> {
            type Value = GenericKey<N>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "{} key bytes", N)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                if v.len() != N {
                    return Err(E::invalid_length(v.len(), &self));
                }
                let mut data = [0u8; N];
                data.copy_from_slice(v);
                Ok(GenericKey(data))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut data = [0u8; N];
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(GenericKey(data))
            }
        }

        deserializer.deserialize_bytes(KeyVisitor::<N>)
    }
}
