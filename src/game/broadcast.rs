//! Per-observer snapshot assembly and delivery

use tracing::{debug, warn};

use crate::ws::protocol::{encode, PlayerId, PlayerView, ServerMsg, TickSnapshot};

use super::error::SyncError;
use super::interest::ViewCache;
use super::player::PlayerRegistry;

/// Best-effort, per-connection delivery of encoded messages.
///
/// Implementations must not block: a slow or broken connection reports an
/// error and the broadcaster moves on to the next observer.
pub trait Outbox {
    fn send_to(&mut self, player_id: PlayerId, payload: String) -> Result<(), SyncError>;
}

/// Outcome of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    pub bytes: usize,
}

/// Snapshot for one observer: peers in registry order, then the observer's
/// own detailed view. `None` if the observer itself could not be encoded.
pub fn build_snapshot(
    cache: &ViewCache,
    registry: &PlayerRegistry,
    observer_id: PlayerId,
    t: u64,
) -> Option<TickSnapshot> {
    let observer = registry.get(&observer_id)?;
    let own = cache.get(&observer_id)?.detailed.clone();

    let mut all: Vec<PlayerView> = Vec::with_capacity(cache.len());
    for peer in registry.iter() {
        if peer.id == observer_id {
            continue;
        }
        if let Some(view) = cache.select(observer, peer) {
            all.push(view.clone());
        }
    }
    all.push(own);

    Some(TickSnapshot { t, all })
}

/// Send every observer its snapshot, then clear transient fields.
///
/// Clearing happens only after every observer has been attempted, so a field
/// marked this tick reaches each connected observer once. Failed sends are
/// not retried.
pub fn broadcast<O: Outbox>(
    registry: &mut PlayerRegistry,
    outbox: &mut O,
    range_sq: f64,
    t: u64,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let cache = ViewCache::build(registry, range_sq);

    for observer in registry.iter() {
        let Some(snapshot) = build_snapshot(&cache, registry, observer.id, t) else {
            report.failed += 1;
            continue;
        };

        match encode(&ServerMsg::Tick(snapshot)) {
            Ok(payload) => {
                let len = payload.len();
                match outbox.send_to(observer.id, payload) {
                    Ok(()) => {
                        report.sent += 1;
                        report.bytes += len;
                    }
                    Err(e) => {
                        debug!(player_id = %observer.id, error = %e, "Snapshot dropped");
                        report.failed += 1;
                    }
                }
            }
            Err(e) => {
                warn!(player_id = %observer.id, error = %e, "Failed to encode snapshot");
                report.failed += 1;
            }
        }
    }

    for player in registry.iter_mut() {
        player.transient.clear_all();
    }

    report
}
