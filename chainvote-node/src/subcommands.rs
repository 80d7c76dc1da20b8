// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Implementations of the CLI subcommands.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_io::Timer;
use tracing::info;

use chainvote::{
    chain::unix_now,
    elgamal::SecretKey,
    registry::ElectionId,
    signature::EcdsaEligibility,
    storage::{self, KeyFileEntry},
    tally::{self, DecryptionTable},
};
use util::csprng::Csprng;

use crate::{
    config::NodeConfig,
    core_ctx::Core,
    ingress, miner, publisher,
    transport::LoopbackTransport,
};

/// Generates a key pair and appends it to the key file. The key ceremony
/// output (shares) is produced separately by trustees; this writes the full
/// pair for single-operator setups.
pub fn keygen(config: &NodeConfig, bits: usize) -> Result<()> {
    let bits = NonZeroUsize::new(bits).context("key size must be nonzero")?;
    let mut csprng = Csprng::new(b"chainvote keygen");

    info!(bits, "generating safe-prime parameters; this can take a while");
    let sk = SecretKey::generate(bits, &mut csprng);

    std::fs::create_dir_all(&config.data_dir)?;
    storage::append_key(&config.key_file(), &KeyFileEntry::from_secret(&sk))?;

    println!("{}", serde_json::to_string_pretty(sk.public_key())?);
    Ok(())
}

/// Opens an election from a JSON template, persists its chain, and extends
/// the decryption-table file for its key.
pub fn create_election(config: &NodeConfig, template_path: &std::path::Path) -> Result<()> {
    let template: chainvote::chain::ElectionTemplate =
        serde_json::from_str(&std::fs::read_to_string(template_path)?)
            .context("reading election template")?;
    let public_key = template.public_key.clone();
    let voter_count = template.voter_list.len() as u64;

    let core = Core::new(config.clone());
    async_global_executor::block_on(async {
        core.restore().await?;

        let id = {
            let mut csprng = core.csprng.lock().await;
            let mut registry = core.registry.write().await;
            registry.create_election(template, unix_now(), &mut csprng)?
        };
        core.flush().await?;
        Ok::<ElectionId, anyhow::Error>(id)
    })
    .map(|id| println!("{id}"))?;

    // Extend the table file so the tally never has to grind discrete logs.
    let tables_file = config.tables_file();
    let mut tables = if tables_file.is_file() {
        storage::load_tables(&tables_file)?
    } else {
        Vec::new()
    };
    if !tables.iter().any(|t| t.y() == public_key.y().value()) {
        let max_count = config.table_max_count.max(voter_count);
        tables.push(DecryptionTable::build(&public_key, max_count));
        storage::save_tables(&tables_file, tables.iter())?;
    }
    Ok(())
}

/// Runs the three workers until the duration elapses (0 = forever).
///
/// The in-process loopback transport stands in for the gossip layer; a real
/// deployment plugs its socket transport into the same seam.
pub fn run(config: &NodeConfig, duration_secs: u64) -> Result<()> {
    let core = Core::new(config.clone());
    let transport = Arc::new(LoopbackTransport::new());

    async_global_executor::block_on(async {
        core.restore().await?;

        let ingress_task = async_global_executor::spawn(ingress::run(
            core.clone(),
            transport.clone(),
            Arc::new(EcdsaEligibility),
        ));
        let miner_task = async_global_executor::spawn(miner::run(core.clone()));
        let publisher_task =
            async_global_executor::spawn(publisher::run(core.clone(), transport.clone()));

        if duration_secs == 0 {
            futures_lite::future::pending::<()>().await;
        } else {
            Timer::after(std::time::Duration::from_secs(duration_secs)).await;
        }

        core.shutdown();
        ingress_task.await;
        miner_task.await;
        publisher_task.await;

        core.flush().await?;
        Ok(())
    })
}

/// Tallies a finished election using the key file and the table file.
pub fn tally(config: &NodeConfig, election_id: &str) -> Result<()> {
    let id = ElectionId::from_hex(election_id)?;

    let core = Core::new(config.clone());
    let (chain, votes_len) = async_global_executor::block_on(async {
        core.restore().await?;
        let registry = core.registry.read().await;
        let chain = registry.finished_chain(&id)?.clone();
        let votes_len = chain.votes().count();
        Ok::<_, anyhow::Error>((chain, votes_len))
    })?;

    let pk = chain.public_key();

    // Find the matching private key in the key file.
    let entries = storage::load_keys(&config.key_file())?;
    let Some(sk) = entries
        .iter()
        .filter(|e| &e.y == pk.y().value())
        .find_map(|e| e.secret_key().ok())
    else {
        bail!("no private key for this election in {:?}", config.key_file());
    };

    // Load the table for this key, or build it on the spot.
    let tables_file = config.tables_file();
    let table = if tables_file.is_file() {
        storage::load_tables(&tables_file)?
            .into_iter()
            .find(|t| t.y() == pk.y().value())
    } else {
        None
    };
    let table = table.unwrap_or_else(|| {
        DecryptionTable::build(pk, config.table_max_count.max(votes_len as u64))
    });

    let counts = tally::tally_direct(
        &sk,
        chain.votes().collect::<Vec<_>>(),
        chain.option_list().len(),
        &table,
    )?;
    tally::verify_ballot_sums(&sk, chain.votes())?;

    let result: serde_json::Map<String, serde_json::Value> = chain
        .option_list()
        .iter()
        .cloned()
        .zip(counts.into_iter().map(|c| serde_json::Value::from(c)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
