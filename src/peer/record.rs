// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The per-address bookkeeping record: a node descriptor plus the tri-state status the
//! transport has reported and, when failed, the time it was last seen leaving.

use crate::node::NodeDescriptor;
use crate::time::Timestamp;

/// The lifecycle state of a remote peer record.
///
/// `None` is the zero value: a seed address that has been pre-populated by
/// `set_initial_failed` but has not yet been confirmed by a transport event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeStatus {
    /// Never confirmed by the transport.
    None,
    /// The transport currently considers this peer reachable.
    Alive,
    /// The transport has declared this peer unreachable.
    Failed,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::None
    }
}

/// An entry in the peer table.
#[derive(Clone, Debug)]
pub struct RemotePeerRecord {
    pub(crate) descriptor: NodeDescriptor,
    pub(crate) status: NodeStatus,
    /// Zero while `status != Failed`.
    pub(crate) leave_time: Timestamp,
}

impl RemotePeerRecord {
    pub(crate) fn new(descriptor: NodeDescriptor, status: NodeStatus) -> Self {
        Self {
            descriptor,
            status,
            leave_time: 0,
        }
    }

    /// The descriptor (name, address, metadata) the transport most recently reported.
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    /// The current status.
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// The timestamp this record was last marked `Failed`, or `0` if it never has been.
    pub fn leave_time(&self) -> Timestamp {
        self.leave_time
    }
}
