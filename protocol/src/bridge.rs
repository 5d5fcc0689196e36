//! Expose the host node's peer set, admin API, and sync status to the protocol.
//!
//! The [Bridge] caches nothing. Every query is forwarded to the injected collaborators, so results
//! always reflect the host's current state.

use crate::{types::enode_url, Error, NodeRecord, PeerAdmin, PeerDirectory, SyncStatus};
use tracing::{debug, warn};

/// Handles to the host node used to connect to (and check connectivity with) registered nodes.
pub struct Bridge<P: PeerDirectory, A: PeerAdmin, S: SyncStatus> {
    peers: P,
    admin: A,
    sync: S,
}

impl<P: PeerDirectory, A: PeerAdmin, S: SyncStatus> Bridge<P, A, S> {
    /// Create a new [Bridge].
    pub fn new(peers: P, admin: A, sync: S) -> Self {
        Self { peers, admin, sync }
    }

    /// Returns true while the host is syncing.
    ///
    /// If the status cannot be determined, the host is assumed to be syncing.
    pub fn syncing(&self) -> bool {
        match self.sync.syncing() {
            Ok(syncing) => syncing,
            Err(err) => {
                warn!(?err, "unable to determine sync status");
                true
            }
        }
    }

    /// Returns the number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if a peer with identifier `id` is connected from `ip`.
    pub fn has_peer(&self, id: &str, ip: &str) -> bool {
        self.peers
            .peers()
            .iter()
            .filter(|peer| peer.as_str() == id)
            .any(|peer| self.peers.ip_of(peer).as_deref() == Some(ip))
    }

    /// Request a connection to the node with identifier `id` at `ip:port`.
    pub fn connect(&self, id: &str, ip: &str, port: &str) -> Result<bool, Error> {
        let url = enode_url(id, ip, port);
        let added = self
            .admin
            .add_peer(&url)
            .map_err(|err| Error::PeerAdmin(Box::new(err)))?;
        debug!(%url, added, "requested peer");
        Ok(added)
    }

    /// Request a connection to the node described by `record`.
    pub fn connect_record(&self, record: &NodeRecord) -> Result<bool, Error> {
        self.connect(&record.identifier, &record.network_address, &record.port)
    }

    /// Returns true if the node described by `record` is connected.
    pub fn is_record_connected(&self, record: &NodeRecord) -> bool {
        self.has_peer(&record.identifier, &record.network_address)
    }
}
