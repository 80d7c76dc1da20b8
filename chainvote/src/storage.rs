// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Persistence of chains, keys and decryption tables.
//!
//! - An election chain is the JSON array `[genesis, block1, ...]`.
//! - The key file holds one JSON object `{p, g, y, x?}` per line; appends are
//!   a single write so concurrent writers cannot interleave inside a line.
//!   Entries with `x` are key pairs; entries without are public keys only.
//! - The decryption-table file maps `str(y)` to the list of powers of `g`,
//!   deduplicating tables across elections that share a key.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    block::Block,
    chain::Chain,
    elgamal::{PublicKey, SecretKey},
    errors::{CoreError, CoreResult},
    tally::DecryptionTable,
};

use util::algebra::FieldElement;

/// Writes the chain's blocks as a JSON array.
pub fn save_chain(path: &Path, chain: &Chain) -> CoreResult<()> {
    let json = serde_json::to_string(chain.blocks())?;
    fs::write(path, json)?;
    Ok(())
}

/// Loads and validates a chain from a JSON block array.
pub fn load_chain(path: &Path, difficulty: u32) -> CoreResult<Chain> {
    let bytes = fs::read(path)?;
    let blocks: Vec<Block> = serde_json::from_slice(&bytes)?;
    Chain::from_blocks(blocks, difficulty)
}

mod biguint_opt {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(u: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u.as_ref().map(|u| u.to_str_radix(10)).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| {
            BigUint::parse_bytes(s.as_bytes(), 10)
                .ok_or_else(|| D::Error::custom(format!("not a decimal integer: {s:?}")))
        })
        .transpose()
    }
}

/// One line of the key file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyFileEntry {
    #[serde(with = "util::biguint_serde")]
    pub p: BigUint,
    #[serde(with = "util::biguint_serde")]
    pub g: BigUint,
    #[serde(with = "util::biguint_serde")]
    pub y: BigUint,

    /// The secret exponent. Should be absent anywhere the file leaves the
    /// trustee's machine.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "biguint_opt")]
    pub x: Option<BigUint>,
}

impl KeyFileEntry {
    pub fn from_public(pk: &PublicKey) -> Self {
        KeyFileEntry {
            p: pk.domain().group().modulus().clone(),
            g: pk.domain().group().generator().value().clone(),
            y: pk.y().value().clone(),
            x: None,
        }
    }

    pub fn from_secret(sk: &SecretKey) -> Self {
        let mut entry = Self::from_public(sk.public_key());
        entry.x = Some(sk.x().value().clone());
        entry
    }

    /// The public part of the entry.
    pub fn public_key(&self) -> PublicKey {
        let domain = crate::domain_parameters::DomainParameters::from_modulus_and_generator(
            self.p.clone(),
            self.g.clone(),
        );
        PublicKey::new(
            domain,
            util::algebra::GroupElement::from_biguint_unchecked(self.y.clone()),
        )
    }

    /// The full key pair. Fails with `NotPrivate` when the line carries no
    /// secret exponent, and refuses an exponent that contradicts `y`.
    pub fn secret_key(&self) -> CoreResult<SecretKey> {
        let x = self.x.as_ref().ok_or(CoreError::NotPrivate)?;
        let domain = crate::domain_parameters::DomainParameters::from_modulus_and_generator(
            self.p.clone(),
            self.g.clone(),
        );
        let x = FieldElement::from(x.clone(), domain.field());
        let sk = SecretKey::from_exponent(domain, x);
        if sk.public_key().y().value() != &self.y {
            return Err(CoreError::InvalidInput(
                "secret exponent does not match y".into(),
            ));
        }
        Ok(sk)
    }
}

/// Appends one key entry as a single line. The line is written in one call,
/// so a reader never observes a torn entry.
pub fn append_key(path: &Path, entry: &KeyFileEntry) -> CoreResult<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Reads every key entry in the file, skipping blank lines.
pub fn load_keys(path: &Path) -> CoreResult<Vec<KeyFileEntry>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Writes decryption tables as a JSON map `str(y) -> [powers of g]`.
pub fn save_tables<'a>(
    path: &Path,
    tables: impl IntoIterator<Item = &'a DecryptionTable>,
) -> CoreResult<()> {
    let map: BTreeMap<String, Vec<String>> = tables
        .into_iter()
        .map(|t| {
            let powers = t.powers().iter().map(|p| p.to_str_radix(10)).collect();
            (t.y().to_str_radix(10), powers)
        })
        .collect();
    fs::write(path, serde_json::to_string(&map)?)?;
    Ok(())
}

/// Loads decryption tables from the JSON map form.
pub fn load_tables(path: &Path) -> CoreResult<Vec<DecryptionTable>> {
    let bytes = fs::read(path)?;
    let map: BTreeMap<String, Vec<String>> = serde_json::from_slice(&bytes)?;

    let parse = |s: &str| {
        BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| {
            CoreError::InvalidInput(format!("not a decimal integer in table file: {s:?}"))
        })
    };

    map.iter()
        .map(|(y, powers)| {
            let y = parse(y)?;
            let powers = powers.iter().map(|p| parse(p)).collect::<CoreResult<Vec<_>>>()?;
            Ok(DecryptionTable::from_powers(y, powers))
        })
        .collect()
}
