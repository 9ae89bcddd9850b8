//! Timestamped snapshot buffer and render-time mapping

use tracing::debug;

use crate::ws::protocol::TickSnapshot;

/// Correlates the first server timestamp with the local instant it arrived
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAnchor {
    pub first_server_t: u64,
    pub local_ms: u64,
}

/// Ordered snapshots awaiting playback
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    entries: Vec<TickSnapshot>,
    anchor: Option<TimeAnchor>,
    render_delay_ms: f64,
}

impl SnapshotBuffer {
    pub fn new(render_delay_ms: f64) -> Self {
        Self {
            entries: Vec::new(),
            anchor: None,
            render_delay_ms,
        }
    }

    /// Accept a snapshot received at local time `now_ms`. Snapshots older
    /// than the newest buffered one are dropped. Returns whether it was kept.
    pub fn push(&mut self, snapshot: TickSnapshot, now_ms: u64) -> bool {
        if let Some(newest) = self.entries.last() {
            if snapshot.t < newest.t {
                debug!(t = snapshot.t, newest = newest.t, "Dropping out-of-order snapshot");
                return false;
            }
        }

        if self.anchor.is_none() {
            self.anchor = Some(TimeAnchor {
                first_server_t: snapshot.t,
                local_ms: now_ms,
            });
        }

        self.entries.push(snapshot);
        self.prune(now_ms);
        true
    }

    /// Point in server time to display at local time `now_ms`
    pub fn render_time(&self, now_ms: u64) -> Option<f64> {
        let anchor = self.anchor?;
        let elapsed = now_ms as f64 - anchor.local_ms as f64;
        Some(anchor.first_server_t as f64 + elapsed - self.render_delay_ms)
    }

    /// Index of the newest snapshot at or before `render_time`
    pub fn find_base(&self, render_time: f64) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|s| s.t as f64 <= render_time)
    }

    /// Drop history older than the current base, keeping at least two
    /// entries for interpolation
    fn prune(&mut self, now_ms: u64) {
        let Some(render_time) = self.render_time(now_ms) else {
            return;
        };
        if let Some(base) = self.find_base(render_time) {
            let removable = base.min(self.entries.len().saturating_sub(2));
            if removable > 0 {
                self.entries.drain(..removable);
            }
        }
    }

    pub fn entries(&self) -> &[TickSnapshot] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&TickSnapshot> {
        self.entries.last()
    }

    pub fn anchor(&self) -> Option<TimeAnchor> {
        self.anchor
    }

    pub fn render_delay_ms(&self) -> f64 {
        self.render_delay_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything, including the time anchor
    pub fn reset(&mut self) {
        self.entries.clear();
        self.anchor = None;
    }
}
