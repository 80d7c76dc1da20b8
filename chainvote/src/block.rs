// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Ledger blocks.
//!
//! A chain starts with one [`GenesisBlock`] carrying the election definition
//! and continues with [`DataBlock`]s carrying sealed votes. Serializers
//! discriminate on the `kind` tag.
//!
//! A block's hash is the SHA-256 of its canonical JSON form (keys sorted,
//! compact, UTF-8) as lowercase hex. The genesis public key hashes in its
//! `{p, g, y}` wire form; the secret exponent never appears in a block.

use serde::{Deserialize, Serialize};

use crate::{
    ballot::Vote,
    elgamal::PublicKey,
    errors::CoreResult,
    hash::{canonical_json, sha256_hex},
};

/// Block 0 of an election chain: the election definition itself.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisBlock {
    /// Always 0.
    pub index: u64,

    /// Random 128-bit value anchoring the first proof-of-work.
    #[serde(with = "util::biguint_serde::u128_dec")]
    pub proof: u128,

    /// When voting opens.
    pub start_time: u64,

    /// When the block was created.
    pub timestamp: u64,

    /// When voting closes; after this the election is only tallied.
    pub end_time: u64,

    /// The election's encryption key, in `{p, g, y}` wire form.
    pub public_key: PublicKey,

    /// Hex-encoded public keys of the eligible voters.
    pub voter_list: Vec<String>,

    /// Display names of the options, in ballot order.
    pub option_list: Vec<String>,

    /// Human-readable election name.
    pub name: String,
}

/// A sealed block of votes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataBlock {
    pub index: u64,
    pub timestamp: u64,

    /// Proof-of-work relative to the previous block.
    #[serde(with = "util::biguint_serde::u128_dec")]
    pub proof: u128,

    /// Hash of the previous block, lowercase hex.
    pub previous_hash: String,

    /// The votes sealed into this block, in ingress order.
    pub transactions: Vec<Vote>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Genesis(GenesisBlock),
    Data(DataBlock),
}

impl Block {
    pub fn index(&self) -> u64 {
        match self {
            Block::Genesis(b) => b.index,
            Block::Data(b) => b.index,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Block::Genesis(b) => b.timestamp,
            Block::Data(b) => b.timestamp,
        }
    }

    pub fn proof(&self) -> u128 {
        match self {
            Block::Genesis(b) => b.proof,
            Block::Data(b) => b.proof,
        }
    }

    pub fn as_genesis(&self) -> Option<&GenesisBlock> {
        match self {
            Block::Genesis(b) => Some(b),
            Block::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataBlock> {
        match self {
            Block::Genesis(_) => None,
            Block::Data(b) => Some(b),
        }
    }

    /// The block hash: SHA-256 of the canonical JSON form, lowercase hex.
    pub fn hash(&self) -> CoreResult<String> {
        Ok(sha256_hex(canonical_json(self)?))
    }
}
