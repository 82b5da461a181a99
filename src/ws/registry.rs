//! Connection registry and snapshot broadcaster
//!
//! Owns every live client connection. Each connection gets its own
//! latest-only outbound slot (a watch channel): when a new snapshot arrives
//! before the previous one was written to the socket, it replaces the pending
//! one. A stalled client therefore costs one slot, never a growing queue, and
//! never delays delivery to anyone else.

use crate::content::ShowSummary;
use crate::state::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Client role, chosen at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Controller,
    Viewer,
}

/// Connected-client summary for the API
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: Uuid,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
}

/// Connect rejected because every slot is taken
#[derive(Debug, Error)]
#[error("client registry full ({0} clients)")]
pub struct RegistryFull(pub usize);

struct ClientSlot {
    role: Role,
    connected_at: DateTime<Utc>,
    tx: watch::Sender<Snapshot>,
    catalog_tx: watch::Sender<Vec<ShowSummary>>,
}

/// Registry of live connections with per-connection coalescing slots.
pub struct ClientRegistry {
    clients: Mutex<HashMap<Uuid, ClientSlot>>,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_clients,
        }
    }

    /// Register a connection, seeding its slot with the current state so a
    /// late joiner is caught up without polling.
    ///
    /// The seed closure runs while the clients lock is held. `broadcast`
    /// holds the same lock, so any broadcast that completed before this
    /// insert is necessarily reflected in the seed; a commit cannot fall
    /// into the gap between reading the seed and becoming reachable.
    pub fn add(
        &self,
        role: Role,
        seed: impl FnOnce() -> Snapshot,
    ) -> Result<(Uuid, watch::Receiver<Snapshot>, watch::Receiver<Vec<ShowSummary>>), RegistryFull>
    {
        let mut clients = self.clients.lock().unwrap();
        if clients.len() >= self.max_clients {
            return Err(RegistryFull(clients.len()));
        }

        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(seed());
        let (catalog_tx, catalog_rx) = watch::channel(Vec::new());
        clients.insert(
            id,
            ClientSlot {
                role,
                connected_at: Utc::now(),
                tx,
                catalog_tx,
            },
        );
        info!(client = %id, ?role, total = clients.len(), "client connected");
        Ok((id, rx, catalog_rx))
    }

    /// Drop a connection. Pruning one client never affects the others.
    pub fn remove(&self, id: Uuid) {
        let mut clients = self.clients.lock().unwrap();
        if clients.remove(&id).is_some() {
            info!(client = %id, total = clients.len(), "client disconnected");
        }
    }

    /// Fan one immutable snapshot out to every live slot. Connections whose
    /// session task is gone are pruned on the way.
    pub fn broadcast(&self, snapshot: &Snapshot) {
        let mut clients = self.clients.lock().unwrap();
        let before = clients.len();
        clients.retain(|id, slot| {
            let alive = slot.tx.send(snapshot.clone()).is_ok();
            if !alive {
                debug!(client = %id, "pruning dead connection");
            }
            alive
        });
        debug!(
            version = snapshot.version,
            clients = clients.len(),
            pruned = before - clients.len(),
            "snapshot broadcast"
        );
    }

    /// Push an updated catalog listing into every live slot, latest-wins
    /// like snapshots.
    pub fn broadcast_catalog(&self, shows: &[ShowSummary]) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|id, slot| {
            let alive = slot.catalog_tx.send(shows.to_vec()).is_ok();
            if !alive {
                debug!(client = %id, "pruning dead connection");
            }
            alive
        });
        debug!(
            shows = shows.len(),
            clients = clients.len(),
            "catalog broadcast"
        );
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_full(&self) -> bool {
        let clients = self.clients.lock().unwrap();
        clients.len() >= self.max_clients
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .map(|(id, slot)| ClientInfo {
                id: *id,
                role: slot.role,
                connected_at: slot.connected_at,
            })
            .collect()
    }
}

/// Spawn the delivery loop: committed snapshots arriving through the bridge
/// are fanned out to every connection's slot. Runs until the bridge sender is
/// dropped.
pub fn spawn_broadcast_loop(
    registry: Arc<ClientRegistry>,
    mut rx: watch::Receiver<Snapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            registry.broadcast(&snapshot);
        }
        debug!("broadcast loop stopped");
    })
}
