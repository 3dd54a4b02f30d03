// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The reconnect loop: periodically retries joining peers the transport has declared failed,
//! since a SWIM transport does not re-dial peers it has given up on.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;

use crate::peer::PeerTable;
use crate::transport::GossipTransport;

/// Runs until `stop` closes (signals `true`). Ticks at `interval`; on each tick, snapshots the
/// failed list, releases the table lock, then attempts a transport-level join to each failed
/// peer's address one at a time (the table must never be held across I/O).
pub(crate) async fn run(
    table: PeerTable,
    transport: Arc<dyn GossipTransport>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => {
                if *stop.borrow() {
                    return;
                }
                continue;
            }
        }
        if *stop.borrow() {
            return;
        }

        let failed = table.snapshot_failed();
        for record in failed {
            let addr = record.descriptor().address;
            match transport.join(&[addr]).await {
                Ok(_) => {
                    table.record_reconnect_success();
                    debug!("reconnected to {addr}");
                }
                Err(err) => {
                    table.record_reconnect_failure();
                    warn!("reconnect to {addr} failed: {err}");
                }
            }
        }
    }
}
