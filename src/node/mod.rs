//! Node Table and Liveness Tracking
//!
//! A fixed-capacity table of peer nodes, keyed by address. The table is
//! refreshed on every inbound frame and periodically swept for heartbeat
//! timeouts; an entry is online exactly while its last-seen timestamp is
//! within the configured timeout.
//!
//! The table itself is not synchronized. The manager wraps it in a single
//! guard and keeps critical sections short: the timeout sweep only collects
//! the addresses that transitioned, and user callbacks are invoked after
//! the guard is released.

/// Default table capacity.
pub const MAX_NODES: usize = 64;

/// A peer node as tracked by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeInfo {
    /// Node address.
    pub addr: u16,
    /// Timestamp of the last frame from this node, in milliseconds.
    pub last_seen_ms: u64,
    /// Signal strength of the last reception, in dBm.
    pub rssi: i8,
    /// Online state.
    pub online: bool,
    /// Number of objects hosted by the node, when known.
    pub object_count: u8,
}

/// Fixed-capacity node table.
#[derive(Debug)]
pub struct NodeTable {
    entries: Vec<NodeInfo>,
    capacity: usize,
}

impl NodeTable {
    /// Create a table with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Refresh a node entry from an inbound frame.
    ///
    /// Updates the last-seen timestamp and RSSI and marks the node online.
    /// Returns `true` when the node came online with this update, either
    /// because it is new or because it had timed out. When the table is
    /// full the least recently seen offline entry is evicted; if every
    /// entry is online the update is dropped and `false` is returned.
    pub fn update(&mut self, addr: u16, rssi: i8, now_ms: u64) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.addr == addr) {
            entry.last_seen_ms = now_ms;
            entry.rssi = rssi;
            let was_offline = !entry.online;
            entry.online = true;
            return was_offline;
        }

        if self.entries.len() >= self.capacity {
            let victim = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.online)
                .min_by_key(|(_, e)| e.last_seen_ms)
                .map(|(i, _)| i);

            match victim {
                Some(i) => {
                    self.entries[i] = NodeInfo {
                        addr,
                        last_seen_ms: now_ms,
                        rssi,
                        online: true,
                        object_count: 0,
                    };
                    return true;
                }
                None => return false,
            }
        }

        self.entries.push(NodeInfo {
            addr,
            last_seen_ms: now_ms,
            rssi,
            online: true,
            object_count: 0,
        });
        true
    }

    /// Sweep the table for heartbeat timeouts.
    ///
    /// Every online entry whose last-seen timestamp is older than
    /// `timeout_ms` is marked offline. The addresses that transitioned are
    /// returned so the caller can fire notifications outside the table
    /// guard; each transition is reported exactly once.
    pub fn check_timeout(&mut self, timeout_ms: u64, now_ms: u64) -> Vec<u16> {
        let mut newly_offline = Vec::new();

        for entry in &mut self.entries {
            if entry.online && now_ms.saturating_sub(entry.last_seen_ms) > timeout_ms {
                entry.online = false;
                newly_offline.push(entry.addr);
            }
        }

        newly_offline
    }

    /// Look up a node by address.
    pub fn get(&self, addr: u16) -> Option<NodeInfo> {
        self.entries.iter().find(|e| e.addr == addr).copied()
    }

    /// Snapshot of all entries.
    pub fn get_all(&self) -> Vec<NodeInfo> {
        self.entries.clone()
    }

    /// Online state of a node; unknown addresses are offline.
    pub fn is_online(&self, addr: u16) -> bool {
        self.get(addr).map(|e| e.online).unwrap_or(false)
    }

    /// Number of online nodes.
    pub fn online_count(&self) -> usize {
        self.entries.iter().filter(|e| e.online).count()
    }

    /// Total number of tracked nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no nodes are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove a node from the table.
    pub fn remove(&mut self, addr: u16) {
        self.entries.retain(|e| e.addr != addr);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new(MAX_NODES)
    }
}
