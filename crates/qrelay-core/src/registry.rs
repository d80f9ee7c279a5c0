//! Concurrent channel membership registry.
//!
//! A single [`Registry`] is shared (via `Arc`) between the listener and every
//! connection handler. Mutations are serialized behind one coarse lock: the
//! critical sections are tiny (hash map inserts/removes over a handful of
//! entries) and low in cardinality, so a single lock is simpler and just as
//! fast as anything more elaborate would be here.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    client::RtcClient,
    types::{ChannelId, ClientId, QUARANTINE_CHANNEL},
};

struct State<C: RtcClient> {
    /// Each client is in at most one channel.
    channel_of: HashMap<ClientId, ChannelId>,
    /// Inverse of `channel_of`. A channel key is removed the instant its set
    /// becomes empty, so `members_of.len()` is always the number of
    /// *populated* channels.
    members_of: HashMap<ChannelId, HashSet<ClientId>>,
    clients: HashMap<ClientId, Arc<C>>,
}

impl<C: RtcClient> Default for State<C> {
    fn default() -> Self {
        Self {
            channel_of: HashMap::new(),
            members_of: HashMap::new(),
            clients: HashMap::new(),
        }
    }
}

/// Concurrent `client <-> channel` membership map.
///
/// A client only exists in the registry between successful authentication
/// and teardown; the connection handler is responsible for calling
/// [`Registry::add`] once it authenticates and [`Registry::remove`] on every
/// exit path.
pub struct Registry<C: RtcClient> {
    state: RwLock<State<C>>,
    next_id: AtomicU32,
    created_at: Instant,
}

impl<C: RtcClient> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RtcClient> Registry<C> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_id: AtomicU32::new(0),
            created_at: Instant::now(),
        }
    }

    /// Allocates the next client id. Ids wrap on overflow, which is fine:
    /// by the time a `u32` counter wraps the original holder is long gone.
    pub fn next_client_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Assigns `client` to `channel_id`, moving it out of whatever channel it
    /// was previously in. Returns `false` if this is a no-op (the client is
    /// already in `channel_id`), `true` if anything changed.
    pub async fn add(&self, client: Arc<C>, channel_id: ChannelId) -> bool {
        let id = client.id();
        let mut state = self.state.write().await;

        if state.channel_of.get(&id) == Some(&channel_id) {
            return false;
        }

        if let Some(previous) = state.channel_of.remove(&id)
            && let Some(members) = state.members_of.get_mut(&previous)
        {
            members.remove(&id);
            if members.is_empty() {
                state.members_of.remove(&previous);
            }
        }

        state.channel_of.insert(id, channel_id);
        state.members_of.entry(channel_id).or_default().insert(id);
        state.clients.insert(id, client);

        true
    }

    /// Removes `client_id` from the registry entirely. Returns `false` if it
    /// was not registered.
    pub async fn remove(&self, client_id: ClientId) -> bool {
        let mut state = self.state.write().await;

        let Some(channel_id) = state.channel_of.remove(&client_id) else {
            return false;
        };
        state.clients.remove(&client_id);

        if let Some(members) = state.members_of.get_mut(&channel_id) {
            members.remove(&client_id);
            if members.is_empty() {
                state.members_of.remove(&channel_id);
            }
        }

        true
    }

    /// Empties both maps.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.channel_of.clear();
        state.members_of.clear();
        state.clients.clear();
    }

    /// Returns a snapshot of every other client sharing `client_id`'s
    /// channel. The snapshot is taken under the lock but handed back as an
    /// owned `Vec` so the caller (the fan-out loop) never holds the registry
    /// lock while writing to peer queues.
    pub async fn peers_on_same_channel(&self, client_id: ClientId, ignore_channel_zero: bool) -> Vec<Arc<C>> {
        let state = self.state.read().await;

        let Some(&channel_id) = state.channel_of.get(&client_id) else {
            return Vec::new();
        };
        if ignore_channel_zero && channel_id == QUARANTINE_CHANNEL {
            return Vec::new();
        }

        let Some(members) = state.members_of.get(&channel_id) else {
            return Vec::new();
        };

        members
            .iter()
            .filter(|&&id| id != client_id)
            .filter_map(|id| state.clients.get(id).cloned())
            .collect()
    }

    pub async fn store_info(&self) -> StoreInfo {
        let state = self.state.read().await;
        StoreInfo {
            channel_count: state.members_of.len(),
            client_count: state.channel_of.len(),
            next_client_id: self.next_id.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
        }
    }

    pub async fn client_infos(&self) -> HashMap<ClientId, ClientInfo> {
        let state = self.state.read().await;
        state
            .clients
            .iter()
            .map(|(id, client)| {
                (
                    *id,
                    ClientInfo {
                        alias: client.alias().map(str::to_owned),
                        channel: state.channel_of.get(id).copied().unwrap_or(QUARANTINE_CHANNEL),
                        remote: client.remote_addr().to_owned(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub channel_count: usize,
    pub client_count: usize,
    pub next_client_id: ClientId,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub alias: Option<String>,
    pub channel: ChannelId,
    pub remote: String,
}
