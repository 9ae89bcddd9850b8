//! Rate-gated input sampling and round-trip correlation

use std::collections::HashMap;
use tracing::debug;

use crate::config::ClientConfig;
use crate::ws::protocol::{ClientMsg, InputId, PlayerOp};

/// One measured input round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub action_id: u32,
    pub round_trip_ms: u64,
}

/// Samples local intent on its own cadence and tracks unacknowledged ids
#[derive(Debug, Clone)]
pub struct InputSampler {
    min_interval_ms: u64,
    pending_timeout_ms: u64,
    next_action_id: u32,
    last_sent_ms: Option<u64>,
    /// action id -> send time
    pending: HashMap<u32, u64>,
}

impl InputSampler {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            min_interval_ms: config.input_interval_ms,
            pending_timeout_ms: config.pending_timeout_ms,
            next_action_id: 0,
            last_sent_ms: None,
            pending: HashMap::new(),
        }
    }

    /// Produce an input message if the interval has elapsed. The joystick
    /// angle is rounded to whole degrees; non-finite angles are omitted.
    pub fn sample(&mut self, now_ms: u64, joystick_angle: Option<f64>) -> Option<ClientMsg> {
        if let Some(last) = self.last_sent_ms {
            if now_ms.saturating_sub(last) < self.min_interval_ms {
                return None;
            }
        }
        self.last_sent_ms = Some(now_ms);
        self.evict_expired(now_ms);

        let id = InputId {
            action_id: self.next_action_id,
            ts: now_ms,
        };
        self.next_action_id = self.next_action_id.wrapping_add(1);
        self.pending.insert(id.action_id, now_ms);

        Some(ClientMsg::Input {
            player_op: PlayerOp {
                joystick_angle: joystick_angle.filter(|a| a.is_finite()).map(f64::round),
            },
            id,
        })
    }

    /// Resolve an echoed id. Yields a sample only the first time.
    pub fn acknowledge(&mut self, op_id: InputId, now_ms: u64) -> Option<LatencySample> {
        let sent_at = self.pending.remove(&op_id.action_id)?;
        Some(LatencySample {
            action_id: op_id.action_id,
            round_trip_ms: now_ms.saturating_sub(sent_at),
        })
    }

    /// Forget inputs that were never acknowledged in time
    pub fn evict_expired(&mut self, now_ms: u64) -> usize {
        let before = self.pending.len();
        let timeout = self.pending_timeout_ms;
        self.pending
            .retain(|_, sent_at| now_ms.saturating_sub(*sent_at) <= timeout);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            debug!(evicted, "Evicted unacknowledged inputs");
        }
        evicted
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, action_id: u32) -> bool {
        self.pending.contains_key(&action_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> InputSampler {
        InputSampler::new(&ClientConfig::default())
    }

    fn id_of(msg: &ClientMsg) -> InputId {
        match msg {
            ClientMsg::Input { id, .. } => *id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn respects_minimum_interval() {
        let mut s = sampler();
        assert!(s.sample(1_000, None).is_some());
        assert!(s.sample(1_010, None).is_none());
        assert!(s.sample(1_019, None).is_none());
        assert!(s.sample(1_020, None).is_some());
        assert_eq!(s.pending_len(), 2);
    }

    #[test]
    fn ids_increase_monotonically() {
        let mut s = sampler();
        let ids: Vec<u32> = (0..5)
            .filter_map(|i| s.sample(i * 20, Some(1.0)))
            .map(|m| id_of(&m).action_id)
            .collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn angle_is_rounded_and_sanitized() {
        let mut s = sampler();
        let msg = s.sample(0, Some(44.6)).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::Input {
                player_op: PlayerOp { joystick_angle: Some(a) },
                ..
            } if a == 45.0
        ));
        let msg = s.sample(20, Some(f64::NAN)).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::Input {
                player_op: PlayerOp { joystick_angle: None },
                ..
            }
        ));
    }

    #[test]
    fn acknowledgement_yields_one_sample() {
        let mut s = sampler();
        let id = id_of(&s.sample(1_000, Some(90.0)).unwrap());

        let sample = s.acknowledge(id, 1_085).unwrap();
        assert_eq!(
            sample,
            LatencySample {
                action_id: id.action_id,
                round_trip_ms: 85
            }
        );
        assert!(!s.is_pending(id.action_id));
        assert_eq!(s.acknowledge(id, 1_120), None);
    }

    #[test]
    fn stale_entries_are_evicted() {
        let mut s = sampler();
        s.sample(0, None);
        s.sample(20, None);
        assert_eq!(s.pending_len(), 2);

        // Next sample evicts both (timeout 5 s)
        s.sample(5_021, None);
        assert_eq!(s.pending_len(), 1);
        assert!(s.is_pending(2));
        assert_eq!(s.evict_expired(20_000), 1);
    }
}
