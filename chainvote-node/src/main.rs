// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

mod clargs;
mod config;
mod core_ctx;
mod ingress;
mod miner;
mod peers;
mod publisher;
mod subcommands;
mod transport;

use anyhow::Result;
use clap::Parser;

use crate::clargs::{Clargs, Subcommands};
use crate::config::NodeConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let clargs = Clargs::parse();
    let config = NodeConfig::load(clargs.config.as_deref())?;

    match &clargs.subcommand {
        Subcommands::Keygen { bits } => subcommands::keygen(&config, *bits),
        Subcommands::CreateElection { template } => {
            subcommands::create_election(&config, template)
        }
        Subcommands::Run { duration_secs } => subcommands::run(&config, *duration_secs),
        Subcommands::Tally { election_id } => subcommands::tally(&config, election_id),
    }
}
