// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(name = "chainvote-node", about = "Verifiable ballot-tallying node")]
pub(crate) struct Clargs {
    /// Path to the node config file. Defaults apply when omitted.
    #[arg(long, env = "CHAINVOTE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Subcommands,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Subcommands {
    /// Generates an ElGamal key pair and appends it to the key file.
    Keygen {
        /// Bit length of the safe prime. Key-strength sizes take minutes.
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },

    /// Opens a new election from a template file, persists its chain and
    /// extends the decryption-table file for its key.
    CreateElection {
        /// JSON election template: name, end_time, public_key, voter_list,
        /// option_list.
        #[arg(long)]
        template: PathBuf,
    },

    /// Runs the ingress, miner and publisher workers.
    Run {
        /// Stop after this many seconds; 0 runs until the process is killed.
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,
    },

    /// Tallies a finished election.
    Tally {
        /// Hex election id.
        #[arg(long)]
        election_id: String,
    },
}
