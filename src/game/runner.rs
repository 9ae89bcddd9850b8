//! Authoritative tick loop, world handles and the world registry

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{encode, ClientMsg, PlayerId};

use super::broadcast::Outbox;
use super::error::SyncError;
use super::world::World;

/// Capacity of each connection's outbound queue, in messages
pub const OUTBOUND_QUEUE: usize = 32;

/// Capacity of a world's inbound event queue
pub const INBOUND_QUEUE: usize = 1024;

/// Events crossing from connection tasks into a world
#[derive(Debug)]
pub enum InboundEvent {
    /// A connection opened; payloads for it go to `outbound`
    Connected {
        player_id: PlayerId,
        outbound: mpsc::Sender<String>,
    },
    /// A decoded client message
    Message { player_id: PlayerId, msg: ClientMsg },
    /// The connection closed
    Disconnected { player_id: PlayerId },
}

/// Per-connection bounded queues. Never waits: a full or closed queue drops
/// the payload and reports a transport failure.
#[derive(Default)]
pub struct ChannelOutbox {
    connections: HashMap<PlayerId, mpsc::Sender<String>>,
}

impl ChannelOutbox {
    pub fn attach(&mut self, player_id: PlayerId, outbound: mpsc::Sender<String>) {
        self.connections.insert(player_id, outbound);
    }

    pub fn detach(&mut self, player_id: &PlayerId) {
        self.connections.remove(player_id);
    }
}

impl Outbox for ChannelOutbox {
    fn send_to(&mut self, player_id: PlayerId, payload: String) -> Result<(), SyncError> {
        let sender = self
            .connections
            .get(&player_id)
            .ok_or(SyncError::UnknownConnection(player_id))?;
        sender.try_send(payload).map_err(|e| SyncError::Transport {
            player_id,
            reason: match e {
                TrySendError::Full(_) => "outbound queue full".to_string(),
                TrySendError::Closed(_) => "connection closed".to_string(),
            },
        })
    }
}

/// Handle to a running world
#[derive(Clone)]
pub struct WorldHandle {
    pub id: Uuid,
    pub inbound_tx: mpsc::Sender<InboundEvent>,
    pub player_count: Arc<AtomicUsize>,
}

impl WorldHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all running worlds
pub struct WorldRegistry {
    worlds: DashMap<Uuid, WorldHandle>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self {
            worlds: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: WorldHandle) {
        self.worlds.insert(handle.id, handle);
    }

    pub fn active_worlds(&self) -> usize {
        self.worlds.len()
    }

    pub fn total_players(&self) -> usize {
        self.worlds.iter().map(|w| w.value().player_count()).sum()
    }

    /// The world with the fewest players
    pub fn least_populated(&self) -> Option<WorldHandle> {
        self.worlds
            .iter()
            .min_by_key(|w| w.value().player_count())
            .map(|w| w.value().clone())
    }
}

impl Default for WorldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one [`World`] from a fixed-rate timer
pub struct WorldRunner {
    world: World,
    inbound_rx: mpsc::Receiver<InboundEvent>,
    outbox: ChannelOutbox,
    player_count: Arc<AtomicUsize>,
}

impl WorldRunner {
    pub fn new(id: Uuid, seed: u64, config: SimConfig) -> (Self, WorldHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = WorldHandle {
            id,
            inbound_tx,
            player_count: player_count.clone(),
        };

        let runner = Self {
            world: World::new(id, seed, config, unix_millis()),
            inbound_rx,
            outbox: ChannelOutbox::default(),
            player_count,
        };

        (runner, handle)
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(world_id = %self.world.id(), "World started");

        let mut tick_interval = interval(tick_duration(self.world.config().tick_rate_hz));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            let open = self.drain_inbound();

            self.world.tick(unix_millis(), &mut self.outbox);

            if !open && self.world.player_count() == 0 {
                break;
            }
        }

        info!(world_id = %self.world.id(), ticks = self.world.tick_count(), "World stopped");
    }

    /// Apply everything queued since the last tick. Returns false once all
    /// senders are gone.
    fn drain_inbound(&mut self) -> bool {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Connected {
                player_id,
                outbound,
            } => {
                self.outbox.attach(player_id, outbound);
                self.world.connect(player_id);
            }
            InboundEvent::Message { player_id, msg } => {
                match self.world.handle_message(player_id, msg) {
                    Ok(Some(reply)) => {
                        if let Err(e) = encode(&reply).and_then(|p| self.outbox.send_to(player_id, p)) {
                            debug!(player_id = %player_id, error = %e, "Reply dropped");
                        }
                    }
                    Ok(None) => {}
                    Err(SyncError::UnknownConnection(id)) => {
                        debug!(player_id = %id, "Message for unknown connection ignored");
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Rejected client message");
                    }
                }
            }
            InboundEvent::Disconnected { player_id } => {
                self.outbox.detach(&player_id);
                self.world.disconnect(&player_id);
            }
        }
        self.player_count
            .store(self.world.player_count(), Ordering::Relaxed);
    }
}

/// Start `count` worlds and register them
pub fn spawn_worlds(registry: &WorldRegistry, count: usize, config: &SimConfig) -> Vec<WorldHandle> {
    (0..count)
        .map(|_| {
            let (runner, handle) = WorldRunner::new(Uuid::new_v4(), rand::random(), config.clone());
            registry.insert(handle.clone());
            tokio::spawn(runner.run());
            handle
        })
        .collect()
}
