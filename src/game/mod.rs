//! Server-side simulation and replication
//!
//! Per tick: [`input`] turns intents into motion, [`motion`] integrates it,
//! and on broadcast ticks [`interest`] builds the per-player views that
//! [`broadcast`] hands to each observer.

pub mod broadcast;
pub mod clock;
pub mod error;
pub mod input;
pub mod interest;
pub mod motion;
pub mod player;
pub mod runner;
pub mod world;

pub use broadcast::{BroadcastReport, Outbox};
pub use error::SyncError;
pub use player::{Intent, Persistence, Player, PlayerRegistry};
pub use runner::{spawn_worlds, InboundEvent, WorldHandle, WorldRegistry, WorldRunner};
pub use world::World;
