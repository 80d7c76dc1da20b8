// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Peer-list bookkeeping and its file form: a JSON array of
//! `{ip_address, rep_port, sub_port}`.

use std::path::Path;

use chainvote::{
    errors::CoreResult,
    message::PeerInfo,
};

/// Sanitizes `info` and appends it unless it is already known. Returns
/// whether the list changed.
pub fn ingest_peer(peers: &mut Vec<PeerInfo>, info: PeerInfo) -> CoreResult<bool> {
    let info = info.sanitized()?;
    if peers.contains(&info) {
        return Ok(false);
    }
    peers.push(info);
    Ok(true)
}

pub fn save_peers(path: &Path, peers: &[PeerInfo]) -> CoreResult<()> {
    std::fs::write(path, serde_json::to_string(peers).map_err(chainvote::CoreError::from)?)?;
    Ok(())
}

/// Loads the peers file, dropping entries that fail sanitization.
pub fn load_peers(path: &Path) -> CoreResult<Vec<PeerInfo>> {
    let contents = std::fs::read_to_string(path)?;
    let raw: Vec<PeerInfo> = serde_json::from_str(&contents).map_err(chainvote::CoreError::from)?;

    let mut peers = Vec::new();
    for info in raw {
        if let Ok(info) = info.sanitized() {
            if !peers.contains(&info) {
                peers.push(info);
            }
        }
    }
    Ok(peers)
}
