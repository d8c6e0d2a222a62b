//! Lenient deserializers for numbers that off-chain services send as JSON
//! numbers, decimal strings or hex strings.

use std::str::FromStr;

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Float(f64),
    Str(String),
}

impl Number {
    fn into_u256<E: Error>(self) -> Result<U256, E> {
        match self {
            Number::Int(v) => Ok(U256::from(v)),
            Number::Float(v) => Err(E::custom(format!("expected an integer, got {v}"))),
            Number::Str(s) => U256::from_str(s.trim())
                .map_err(|e| E::custom(format!("invalid number {s:?}: {e}"))),
        }
    }

    fn into_string(self) -> String {
        match self {
            Number::Int(v) => v.to_string(),
            Number::Float(v) => v.to_string(),
            Number::Str(s) => s,
        }
    }
}

pub fn u256<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    Number::deserialize(deserializer)?.into_u256()
}

pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = u256(deserializer)?;
    u64::try_from(value).map_err(|_| D::Error::custom(format!("{value} overflows u64")))
}

pub fn u64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
    Vec::<Number>::deserialize(deserializer)?
        .into_iter()
        .map(|n| {
            let value = n.into_u256::<D::Error>()?;
            u64::try_from(value).map_err(|_| D::Error::custom(format!("{value} overflows u64")))
        })
        .collect()
}

/// Keeps the textual form of a number as sent.
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Number::deserialize(deserializer)?.into_string())
}
