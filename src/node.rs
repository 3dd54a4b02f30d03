// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The transport-agnostic notion of "a peer": a sortable name, an address, and an opaque
//! metadata blob. Service discovery and peer authentication are out of scope here.

use std::cmp::Ordering;
use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A unique, sortable identifier assigned to a peer at join time.
///
/// Names are compared lexicographically; [`crate::Peer::position`] relies on that ordering being
/// total and stable for the lifetime of a cluster view.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PeerName(pub String);

impl PeerName {
    /// Wraps an arbitrary string as a peer name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Everything the transport tells us about a remote member: who it is, where it is, and whatever
/// opaque metadata it announced, uninterpreted here since service semantics are an application
/// concern.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// The peer's self-reported, sortable name.
    pub name: PeerName,
    /// The address the transport observed this peer at.
    pub address: SocketAddr,
    /// Opaque metadata blob, e.g. service-port announcements. Never interpreted by this crate.
    #[serde(with = "serde_bytes_compat")]
    pub metadata: Bytes,
}

impl NodeDescriptor {
    /// Creates a descriptor with empty metadata.
    pub fn new(name: impl Into<PeerName>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            address,
            metadata: Bytes::new(),
        }
    }

    /// The peer-table key: the address-string of this descriptor.
    pub(crate) fn addr_key(&self) -> String {
        self.address.to_string()
    }
}

impl PartialEq for NodeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.address == other.address
    }
}
impl Eq for NodeDescriptor {}

impl PartialOrd for NodeDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for NodeDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// serde support for `bytes::Bytes` without pulling in the `serde` feature of the `bytes` crate.
mod serde_bytes_compat {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(b: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(b)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        Ok(Bytes::from(Vec::<u8>::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_sort_lexicographically() {
        let mut names = vec![PeerName::new("N3"), PeerName::new("N1"), PeerName::new("N2")];
        names.sort();
        assert_eq!(names, vec![PeerName::new("N1"), PeerName::new("N2"), PeerName::new("N3")]);
    }
}
