// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The peer table and failed list, guarded by a single reader-writer lock, keyed by
//! address-string instead of ring-buffer position, since this layer never evicts the
//! newest/oldest by recency alone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
#[cfg(test)]
use std::sync::RwLockReadGuard;
use std::time::Duration;

use crate::node::NodeDescriptor;
use crate::peer::record::{NodeStatus, RemotePeerRecord};
use crate::time;

struct Inner {
    /// Keyed by address-string.
    peers: HashMap<String, RemotePeerRecord>,
    /// Address-strings currently considered failed, in insertion order.
    failed: Vec<String>,
}

/// Snapshot counters, incremented on every corresponding event regardless of whether the event
/// changed the peer's recorded status (this is deliberate event-counting, not peer-counting).
#[derive(Default)]
pub struct Counters {
    joined: AtomicU64,
    left: AtomicU64,
    updated: AtomicU64,
    reconnected: AtomicU64,
    reconnect_failed: AtomicU64,
}

impl Counters {
    /// Number of `peerJoin` events processed.
    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }
    /// Number of `peerLeave` events processed.
    pub fn left(&self) -> u64 {
        self.left.load(Ordering::Relaxed)
    }
    /// Number of `peerUpdate` events processed.
    pub fn updated(&self) -> u64 {
        self.updated.load(Ordering::Relaxed)
    }
    /// Number of successful reconnect attempts.
    pub fn reconnected(&self) -> u64 {
        self.reconnected.load(Ordering::Relaxed)
    }
    /// Number of failed reconnect attempts.
    pub fn reconnect_failed(&self) -> u64 {
        self.reconnect_failed.load(Ordering::Relaxed)
    }
}

/// The shared, thread-safe table of everything this `Peer` knows about remote peers.
#[derive(Clone)]
pub struct PeerTable {
    inner: Arc<RwLock<Inner>>,
    counters: Arc<Counters>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                peers: HashMap::new(),
                failed: Vec::new(),
            })),
            counters: Arc::new(Counters::default()),
        }
    }
}

impl PeerTable {
    /// Returns a handle to the monotonic event counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Current size of the failed list; exposed as the `cluster_failed_peers` gauge.
    pub fn failed_len(&self) -> usize {
        self.inner.read().expect("peer table lock poisoned").failed.len()
    }

    /// Number of entries in the peer table (alive, failed, and unconfirmed seeds).
    pub fn len(&self) -> usize {
        self.inner.read().expect("peer table lock poisoned").peers.len()
    }

    /// Whether the peer table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a single record by address.
    pub fn get(&self, addr: &SocketAddr) -> Option<RemotePeerRecord> {
        self.inner
            .read()
            .expect("peer table lock poisoned")
            .peers
            .get(&addr.to_string())
            .cloned()
    }

    /// Takes a snapshot of the currently failed records, releasing the lock before returning,
    /// since reconnect must not hold the lock across network operations.
    pub fn snapshot_failed(&self) -> Vec<RemotePeerRecord> {
        let inner = self.inner.read().expect("peer table lock poisoned");
        inner
            .failed
            .iter()
            .filter_map(|addr| inner.peers.get(addr).cloned())
            .collect()
    }

    /// Handles a transport join event.
    pub fn peer_join(&self, node: NodeDescriptor) {
        let addr = node.addr_key();
        let mut inner = self.inner.write().expect("peer table lock poisoned");

        match inner.peers.get_mut(&addr) {
            None => {
                inner.peers.insert(addr, RemotePeerRecord::new(node, NodeStatus::Alive));
            }
            Some(rec) => {
                rec.descriptor = node;
                rec.status = NodeStatus::Alive;
                rec.leave_time = 0;
            }
        }
        if let Some(pos) = inner.failed.iter().position(|a| a == &addr) {
            inner.failed.remove(pos);
        }

        self.counters.joined.fetch_add(1, Ordering::Relaxed);
    }

    /// Handles a transport leave event. A leave for an address we never saw is a gossip
    /// anomaly, not an error, and is silently ignored.
    pub fn peer_leave(&self, node: NodeDescriptor) {
        let addr = node.addr_key();
        let mut inner = self.inner.write().expect("peer table lock poisoned");

        if !inner.peers.contains_key(&addr) {
            return;
        }

        let now = time::unix_now();
        if let Some(rec) = inner.peers.get_mut(&addr) {
            rec.descriptor = node;
            rec.status = NodeStatus::Failed;
            rec.leave_time = now;
        }
        if !inner.failed.iter().any(|a| a == &addr) {
            inner.failed.push(addr);
        }

        self.counters.left.fetch_add(1, Ordering::Relaxed);
    }

    /// Handles a transport update event: refreshes the descriptor without changing status.
    /// Unknown addresses are silently ignored.
    pub fn peer_update(&self, node: NodeDescriptor) {
        let addr = node.addr_key();
        let mut inner = self.inner.write().expect("peer table lock poisoned");

        if let Some(rec) = inner.peers.get_mut(&addr) {
            rec.descriptor = node;
        } else {
            return;
        }

        self.counters.updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Pre-populates the failed list with the given seed addresses.
    ///
    /// The seeded record's `status` is left at `NodeStatus::None` (not `Failed`) even though the
    /// address is appended to the failed list. The reconnect loop only cares that the address is
    /// in the failed list, not its `status`, so this discrepancy is harmless in practice.
    pub fn set_initial_failed(&self, seeds: &[SocketAddr]) {
        let now = time::unix_now();
        let mut inner = self.inner.write().expect("peer table lock poisoned");

        for addr in seeds {
            let key = addr.to_string();
            let placeholder = NodeDescriptor::new(key.as_str(), *addr);
            let mut rec = RemotePeerRecord::new(placeholder, NodeStatus::None);
            rec.leave_time = now;
            inner.peers.insert(key.clone(), rec);
            if !inner.failed.iter().any(|a| a == &key) {
                inner.failed.push(key);
            }
        }
    }

    /// Removes failed records whose `leaveTime + timeout <= now` from both the failed list and
    /// the peer table. Returns the number of records evicted.
    pub fn remove_failed_peers(&self, timeout: Duration) -> usize {
        let now = time::unix_now();
        let timeout_secs = timeout.as_secs();
        let mut inner = self.inner.write().expect("peer table lock poisoned");

        let (stale, fresh): (Vec<String>, Vec<String>) = inner.failed.drain(..).partition(|addr| {
            inner
                .peers
                .get(addr)
                .map(|rec| rec.leave_time.saturating_add(timeout_secs) <= now)
                .unwrap_or(true)
        });
        inner.failed = fresh;
        let evicted = stale.len();
        for addr in stale {
            inner.peers.remove(&addr);
        }
        evicted
    }

    pub(crate) fn record_reconnect_success(&self) {
        self.counters.reconnected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect_failure(&self) {
        self.counters.reconnect_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn read_for_test(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("peer table lock poisoned")
    }
}

#[cfg(test)]
impl Inner {
    pub(crate) fn failed_keys(&self) -> &[String] {
        &self.failed
    }
    pub(crate) fn peer_keys(&self) -> impl Iterator<Item = &String> {
        self.peers.keys()
    }
}
