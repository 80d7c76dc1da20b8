// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The error type shared by the voting core.
//!
//! Cryptographic rejections (`ProofInvalid`, `SignatureInvalid`,
//! `ChainInvalid`) abort the surrounding operation and surface to the caller
//! without poisoning shared state. `NotPrivate` and `BadParams` indicate
//! caller mistakes and are fatal to the operation, never to the process. IO
//! failures are wrapped so workers can log and retry them.

use crate::ballot_proof::ProofError;

/// The main [`std::error::Error`] type returned by functions of this crate.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Malformed ballot shape, out-of-range scalars, or otherwise unusable
    /// input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A zero-knowledge proof failed verification; the whole vote is
    /// rejected.
    #[error("ballot proof rejected: {0}")]
    ProofInvalid(#[from] ProofError),

    /// The eligibility signature does not verify against the voter list.
    #[error("eligibility signature rejected")]
    SignatureInvalid,

    /// A structural or proof-of-work check failed during validation or merge.
    #[error("chain invalid: {0}")]
    ChainInvalid(String),

    /// Decryption was requested without a private-key component.
    #[error("operation requires a private-key component")]
    NotPrivate,

    /// Unusable parameters, e.g. a Shamir threshold outside `2..=n` or a
    /// count beyond the decryption table.
    #[error("bad parameters: {0}")]
    BadParams(String),

    /// The referenced election does not exist.
    #[error("unknown election: {0}")]
    NotFound(String),

    /// Persistence or transport failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// [`Result`](std::result::Result) type with a [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
