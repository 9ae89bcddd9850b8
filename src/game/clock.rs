//! Tick timing and broadcast cadence

/// Measures elapsed time between ticks
#[derive(Debug, Clone)]
pub struct TickTimer {
    last_tick_ms: u64,
}

impl TickTimer {
    pub fn new(now_ms: u64) -> Self {
        Self { last_tick_ms: now_ms }
    }

    /// Seconds since the previous call. Always moves the reference point,
    /// so a world that sat empty does not see a huge dt on its next
    /// non-empty tick. A clock that stepped backwards yields zero.
    pub fn advance(&mut self, now_ms: u64) -> f64 {
        let dt = now_ms.saturating_sub(self.last_tick_ms) as f64 / 1000.0;
        self.last_tick_ms = now_ms;
        dt
    }

    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }
}

/// Decides which simulation ticks also broadcast
#[derive(Debug, Clone)]
pub struct BroadcastCadence {
    /// Ticks since the last broadcast
    ticks_since_broadcast: u32,
    /// Broadcast every n-th tick
    every: u32,
}

impl BroadcastCadence {
    pub fn new(every: u32) -> Self {
        Self {
            ticks_since_broadcast: 0,
            every: every.max(1),
        }
    }

    /// Count a tick; true if it should broadcast. With `every = 2` the first
    /// tick does not broadcast, so n ticks broadcast `n / 2` times.
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_broadcast += 1;
        if self.ticks_since_broadcast >= self.every {
            self.ticks_since_broadcast = 0;
            true
        } else {
            false
        }
    }
}
