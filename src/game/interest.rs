//! Proximity-based interest filtering
//!
//! Every player is rendered into two views once per broadcast: a detailed one
//! (pose, echoed input id, all pending fields) and a summary (identity and
//! persistent fields). Each observer then gets, for every peer, whichever of
//! the two the squared distance between them selects.
//!
//! Cost: building the cache is O(n); selection is O(n^2) distance checks per
//! broadcast with no view reconstruction. Fine for room-sized worlds; a
//! spatial index would be needed for thousands of players per world.

use std::collections::HashMap;
use tracing::warn;

use crate::util::angle::normalize;
use crate::ws::protocol::{DetailedView, PlayerId, PlayerView, SummaryView};

use super::error::SyncError;
use super::player::{Player, PlayerRegistry};

/// Squared Euclidean distance between two players
pub fn squared_distance(a: &Player, b: &Player) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Whether `peer` is close enough to `observer` to be seen in detail
pub fn is_nearby(observer: &Player, peer: &Player, range_sq: f64) -> bool {
    squared_distance(observer, peer) <= range_sq
}

/// Build a player's detailed view, rejecting poses the wire cannot carry
pub fn detailed_view(player: &Player) -> Result<DetailedView, SyncError> {
    Ok(DetailedView {
        player_id: player.id,
        // Rounding can land on -180; wrap back into (-180, 180]
        angle: normalize(f64::from(finite_round(player, "angle", player.angle)?)) as i32,
        x: finite_round(player, "x", player.x)?,
        y: finite_round(player, "y", player.y)?,
        op_id: player.op_id,
        fields: player.persistent.overlaid_with(&player.transient),
    })
}

/// Build a player's summary view
pub fn summary_view(player: &Player) -> SummaryView {
    SummaryView {
        player_id: player.id,
        fields: player.persistent.clone(),
    }
}

fn finite_round(player: &Player, field: &'static str, value: f64) -> Result<i32, SyncError> {
    if !value.is_finite() {
        return Err(SyncError::NonFinite {
            player_id: player.id,
            field,
        });
    }
    let rounded = value.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return Err(SyncError::OutOfRange {
            player_id: player.id,
            field,
        });
    }
    Ok(rounded as i32)
}

/// Both views of one player, kept for the duration of one broadcast
#[derive(Debug, Clone)]
pub struct CachedViews {
    pub detailed: PlayerView,
    pub summary: PlayerView,
}

/// Views of every broadcastable player
#[derive(Debug, Default)]
pub struct ViewCache {
    views: HashMap<PlayerId, CachedViews>,
    range_sq: f64,
}

impl ViewCache {
    /// Compute each player's views exactly once. Players whose state cannot
    /// be encoded are logged and left out of this broadcast.
    pub fn build(registry: &PlayerRegistry, range_sq: f64) -> Self {
        let mut views = HashMap::with_capacity(registry.len());
        for player in registry.iter() {
            match detailed_view(player) {
                Ok(detailed) => {
                    views.insert(
                        player.id,
                        CachedViews {
                            detailed: PlayerView::Detailed(detailed),
                            summary: PlayerView::Summary(summary_view(player)),
                        },
                    );
                }
                Err(e) => {
                    warn!(player_id = %player.id, error = %e, "Player omitted from broadcast");
                }
            }
        }
        Self { views, range_sq }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&CachedViews> {
        self.views.get(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The view of `peer` that `observer` should receive
    pub fn select(&self, observer: &Player, peer: &Player) -> Option<&PlayerView> {
        let cached = self.views.get(&peer.id)?;
        if is_nearby(observer, peer, self.range_sq) {
            Some(&cached.detailed)
        } else {
            Some(&cached.summary)
        }
    }
}
