// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Metric name constants. Registry plumbing is an external collaborator: this crate only exposes
//! the counters to read ([`crate::peer::Counters`]) and the names callers should register them
//! under with whatever metrics crate they use.

/// Gauge: current length of the failed-peer list.
pub const CLUSTER_FAILED_PEERS: &str = "cluster_failed_peers";
/// Counter: successful reconnect attempts.
pub const CLUSTER_RECONNECTIONS_TOTAL: &str = "cluster_reconnections_total";
/// Counter: failed reconnect attempts.
pub const CLUSTER_RECONNECTIONS_FAILED_TOTAL: &str = "cluster_reconnections_failed_total";
/// Counter: `peerJoin` events processed.
pub const CLUSTER_PEERS_JOINED_TOTAL: &str = "cluster_peers_joined_total";
/// Counter: `peerLeave` events processed.
pub const CLUSTER_PEERS_LEFT_TOTAL: &str = "cluster_peers_left_total";
/// Counter: `peerUpdate` events processed.
pub const CLUSTER_PEERS_UPDATE_TOTAL: &str = "cluster_peers_update_total";
