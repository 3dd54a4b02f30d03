// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Cluster configuration.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// # Example
// ```json
// "cluster": {
//     "bindAddress": "0.0.0.0:9094",
//     "seedPeers": ["alertmanager-0.alertmanager:9094", "alertmanager-1.alertmanager:9094"],
//     "waitIfEmpty": true
// }
// ```

/// Configuration for [`crate::Peer::join`].
///
/// Every duration has the default listed in the design document; callers only need to override
/// the ones that matter to them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename = "cluster")]
pub struct Config {
    /// The local bind address, e.g. `"0.0.0.0:9094"`.
    #[serde(rename = "bindAddress")]
    pub bind_addr: SocketAddr,

    /// The address advertised to peers, if different from `bind_addr` (e.g. behind NAT).
    #[serde(rename = "advertiseAddress", default)]
    pub advertise_addr: Option<SocketAddr>,

    /// Seed peers in `host:port` form; DNS names are expanded by [`crate::resolver`].
    #[serde(rename = "seedPeers", default)]
    pub seed_peers: Vec<String>,

    /// Block in the resolver until at least one non-self seed peer resolves.
    #[serde(rename = "waitIfEmpty", default)]
    pub wait_if_empty: bool,

    /// Interval between push/pull anti-entropy rounds.
    #[serde(rename = "pushPullInterval", with = "humantime_secs", default = "default_push_pull_interval")]
    pub push_pull_interval: Duration,

    /// Interval between gossip ticks.
    #[serde(rename = "gossipInterval", with = "humantime_millis", default = "default_gossip_interval")]
    pub gossip_interval: Duration,

    /// Timeout for a single TCP push/pull exchange.
    #[serde(rename = "tcpTimeout", with = "humantime_secs", default = "default_tcp_timeout")]
    pub tcp_timeout: Duration,

    /// Timeout for a single SWIM probe.
    #[serde(rename = "probeTimeout", with = "humantime_millis", default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Interval between SWIM probes.
    #[serde(rename = "probeInterval", with = "humantime_secs", default = "default_probe_interval")]
    pub probe_interval: Duration,

    /// Interval between reconnect-loop ticks. `Duration::ZERO` disables the loop.
    #[serde(rename = "reconnectInterval", with = "humantime_secs", default = "default_reconnect_interval")]
    pub reconnect_interval: Duration,

    /// Grace period after which a still-failed peer is evicted.
    #[serde(rename = "reconnectTimeout", with = "humantime_secs", default = "default_reconnect_timeout")]
    pub reconnect_timeout: Duration,

    /// Poll interval for the settle barrier. Caller-chosen; `Duration::ZERO` settles immediately
    /// once three consecutive polls agree (which happens instantly).
    #[serde(rename = "settlePollInterval", with = "humantime_secs", default = "default_settle_poll_interval")]
    pub settle_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9094".parse().expect("valid default bind address"),
            advertise_addr: None,
            seed_peers: Vec::new(),
            wait_if_empty: false,
            push_pull_interval: default_push_pull_interval(),
            gossip_interval: default_gossip_interval(),
            tcp_timeout: default_tcp_timeout(),
            probe_timeout: default_probe_timeout(),
            probe_interval: default_probe_interval(),
            reconnect_interval: default_reconnect_interval(),
            reconnect_timeout: default_reconnect_timeout(),
            settle_poll_interval: default_settle_poll_interval(),
        }
    }
}

fn default_push_pull_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_gossip_interval() -> Duration {
    Duration::from_millis(200)
}
fn default_tcp_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_probe_timeout() -> Duration {
    Duration::from_millis(500)
}
fn default_probe_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_reconnect_interval() -> Duration {
    Duration::from_secs(10)
}
fn default_reconnect_timeout() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}
fn default_settle_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// (De)serializes a [`Duration`] as whole seconds, the way a JSON/TOML config file would spell it.
mod humantime_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// (De)serializes a [`Duration`] as whole milliseconds, for the sub-second intervals.
mod humantime_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
