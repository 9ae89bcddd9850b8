//! Tick Sync - authoritative state synchronization
//!
//! The server half simulates every connected player at a fixed tick rate and
//! replicates a proximity-filtered view of the world to each of them. The
//! client half buffers the timestamped snapshots and plays them back with a
//! fixed render delay so motion stays smooth under jitter.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;

pub use game::error::SyncError;
