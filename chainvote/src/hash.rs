// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! SHA-256 hashing helpers and the canonical JSON form used for block
//! hashes.

use serde::Serialize;

use crate::errors::CoreResult;

/// SHA-256 of `data`, as lowercase hex.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(data.as_ref());
    faster_hex::hex_string(&digest)
}

/// Serializes `value` to canonical JSON: object keys sorted
/// lexicographically, compact separators, UTF-8.
///
/// Hashes must not depend on declaration order of struct fields, so the value
/// is round-tripped through [`serde_json::Value`], whose object map is
/// ordered by key.
pub fn canonical_json<T: Serialize>(value: &T) -> CoreResult<String> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}
