// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::expect_used)]
#![deny(clippy::manual_assert)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

//! Serde helpers encoding big integers as decimal strings.
//!
//! JSON has no arbitrary-precision integer type, so every `BigUint` crossing a
//! serialization boundary is written as its base-10 rendering. The same applies
//! to 128-bit proof-of-work values, which exceed what common JSON consumers
//! parse losslessly.
//!
//! Usable with `#[serde(with = "util::biguint_serde")]`.

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(u: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    u.to_str_radix(10).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let s = String::deserialize(deserializer)?;
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| D::Error::custom(format!("not a decimal integer: {s:?}")))
}

/// Decimal-string serde for `u128` fields, e.g. `#[serde(with = "util::biguint_serde::u128_dec")]`.
pub mod u128_dec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(u: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u.to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map_err(|e| D::Error::custom(format!("not a u128: {s:?}: {e}")))
    }
}
