// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The eviction loop: forgets peers that have stayed failed for longer than `reconnect_timeout`,
//! so long-dead peers don't leak memory forever.

use std::time::Duration;

use log::debug;
use tokio::sync::watch;

use crate::peer::PeerTable;

/// Fixed cadence independent of `reconnect_interval`, since evictions are rare and there is no
/// reason to couple this loop's tick rate to the much more frequent reconnect attempts.
const EVICTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Runs until `stop` closes (signals `true`). Ticks every [`EVICTION_INTERVAL`]; each tick
/// removes peers whose `leave_time + reconnect_timeout <= now` from both the peer table and the
/// failed list.
pub(crate) async fn run(table: PeerTable, reconnect_timeout: Duration, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(EVICTION_INTERVAL) => {}
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

        let evicted = table.remove_failed_peers(reconnect_timeout);
        if evicted > 0 {
            debug!("evicted {evicted} long-failed peer(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDescriptor, PeerName};

    #[tokio::test(start_paused = true)]
    async fn evicts_peers_past_the_reconnect_timeout_on_its_own_cadence() {
        let table = PeerTable::default();
        let node = NodeDescriptor::new(PeerName::new("R"), "127.0.0.1:9401".parse().unwrap());
        table.peer_join(node.clone());
        table.peer_leave(node);
        assert_eq!(table.failed_len(), 1);

        let (stop_tx, stop_rx) = watch::channel(false);
        let table_clone = table.clone();
        let handle = tokio::spawn(run(table_clone, Duration::from_secs(0), stop_rx));

        tokio::time::advance(EVICTION_INTERVAL + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(table.failed_len(), 0);
    }
}
