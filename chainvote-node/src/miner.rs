// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Miner worker: sweeps the active chains and seals pending votes.
//!
//! One proof-of-work attempt per chain per sweep keeps one busy election
//! from starving the rest. The proof is computed against a snapshot taken
//! under the read lock; the seal itself revalidates against the live tip, so
//! a chain that moved in between simply rejects the stale proof and the
//! votes stay pending for the next sweep.

use std::sync::Arc;

use async_io::Timer;
use tracing::{debug, info, warn};

use chainvote::{chain::unix_now, pow, registry::ElectionId};

use crate::core_ctx::Core;

pub async fn run(core: Arc<Core>) {
    info!("miner worker started");
    while core.running() {
        sweep(&core).await;
        // Mandatory yield so ingress makes progress between sweeps.
        Timer::after(core.config.mine_interval()).await;
    }
    info!("miner worker stopped");
}

/// One pass: retire finished elections, then try to seal each active chain.
pub async fn sweep(core: &Core) {
    let now = unix_now();

    {
        let mut registry = core.registry.write().await;
        registry.sweep_finished(now);
    }

    let ids = { core.registry.read().await.active_ids() };
    for id in ids {
        if !core.running() {
            break;
        }
        if let Err(e) = try_seal(core, &id).await {
            warn!(election = %id, error = %e, "mining attempt failed");
        }
    }
}

/// Attempts one proof-of-work and seal for `id`. A chain with an empty
/// mempool is skipped.
pub async fn try_seal(core: &Core, id: &ElectionId) -> chainvote::CoreResult<()> {
    // Snapshot the tip without holding the lock during the search.
    let snapshot = {
        let registry = core.registry.read().await;
        let Some(chain) = registry.chain(id) else {
            return Ok(());
        };
        if chain.pending().is_empty() {
            return Ok(());
        }
        let tip = &chain.blocks()[chain.blocks().len() - 1];
        Some((tip.proof(), tip.hash()?, chain.difficulty()))
    };
    let Some((tip_proof, tip_hash, difficulty)) = snapshot else {
        return Ok(());
    };

    let proof = {
        let mut csprng = core.csprng.lock().await;
        pow::find_proof(tip_proof, &tip_hash, difficulty, &mut csprng)
    };

    let mut registry = core.registry.write().await;
    let Some(chain) = registry.active_chain_mut(id) else {
        // Finished while we were searching; the votes expire with it.
        return Ok(());
    };
    match chain.seal_block(proof, unix_now()) {
        Ok(block) => {
            info!(election = %id, index = block.index(), "sealed block");
            Ok(())
        }
        Err(e) => {
            // Tip moved under us or the mempool drained; not fatal.
            debug!(election = %id, error = %e, "stale mining attempt discarded");
            Ok(())
        }
    }
}
