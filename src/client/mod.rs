//! Client-side snapshot playback
//!
//! [`SyncClient`] is the piece a game embeds: feed it every text message from
//! the server, call [`SyncClient::frame`] once per render frame and
//! [`SyncClient::sample_input`] as often as convenient (it rate-gates itself).

pub mod buffer;
pub mod input;
pub mod interpolation;

use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::game::error::SyncError;
use crate::ws::protocol::{encode, PlayerId, ServerMsg};

pub use buffer::{SnapshotBuffer, TimeAnchor};
pub use input::{InputSampler, LatencySample};
pub use interpolation::{InterpolationEngine, Playback, Pose, RenderedPlayer};

/// What an incoming message changed
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The server assigned our player id
    Welcome { player_id: PlayerId, server_time: u64 },
    /// A snapshot was buffered; carries a latency sample if it acknowledged
    /// one of our inputs
    Snapshot { latency: Option<LatencySample> },
    /// A snapshot arrived out of order and was dropped
    Stale,
    /// Reply to a ping, with the round trip in ms
    Pong { round_trip_ms: u64 },
}

/// Buffer, input sampler and playback for one connection
#[derive(Debug, Clone)]
pub struct SyncClient {
    player_id: Option<PlayerId>,
    buffer: SnapshotBuffer,
    sampler: InputSampler,
    engine: InterpolationEngine,
}

impl SyncClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            player_id: None,
            buffer: SnapshotBuffer::new(config.render_delay_ms),
            sampler: InputSampler::new(config),
            engine: InterpolationEngine::new(),
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn sampler(&self) -> &InputSampler {
        &self.sampler
    }

    /// Decode and apply one server message received at local time `now_ms`
    pub fn on_message(&mut self, text: &str, now_ms: u64) -> Result<ClientEvent, SyncError> {
        let msg: ServerMsg =
            serde_json::from_str(text).map_err(|e| SyncError::MalformedInput(e.to_string()))?;

        match msg {
            ServerMsg::Welcome {
                player_id,
                server_time,
            } => {
                debug!(player_id = %player_id, "Joined");
                // A new session has its own time base
                if self.player_id.is_some_and(|id| id != player_id) {
                    self.buffer.reset();
                }
                self.player_id = Some(player_id);
                Ok(ClientEvent::Welcome {
                    player_id,
                    server_time,
                })
            }
            ServerMsg::Tick(snapshot) => {
                let echoed = self
                    .player_id
                    .and_then(|id| snapshot.view_of(id))
                    .and_then(|v| v.as_detailed())
                    .and_then(|v| v.op_id);

                if !self.buffer.push(snapshot, now_ms) {
                    return Ok(ClientEvent::Stale);
                }

                let latency = echoed.and_then(|op_id| self.sampler.acknowledge(op_id, now_ms));
                if let Some(sample) = latency {
                    trace!(action_id = sample.action_id, rtt_ms = sample.round_trip_ms, "Input acknowledged");
                }
                Ok(ClientEvent::Snapshot { latency })
            }
            ServerMsg::Pong { t } => Ok(ClientEvent::Pong {
                round_trip_ms: now_ms.saturating_sub(t),
            }),
        }
    }

    /// Encoded input message, if the sampling interval has elapsed
    pub fn sample_input(
        &mut self,
        now_ms: u64,
        joystick_angle: Option<f64>,
    ) -> Result<Option<String>, SyncError> {
        self.sampler
            .sample(now_ms, joystick_angle)
            .map(|msg| encode(&msg))
            .transpose()
    }

    /// What to draw at local time `now_ms`
    pub fn frame(&self, now_ms: u64) -> Option<Playback<'_>> {
        self.engine.sample(&self.buffer, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{ClientMsg, DetailedView, FieldSet, InputId, PlayerView, TickSnapshot};
    use uuid::Uuid;

    fn tick_json(t: u64, id: PlayerId, x: i32, op_id: Option<InputId>) -> String {
        serde_json::to_string(&ServerMsg::Tick(TickSnapshot {
            t,
            all: vec![PlayerView::Detailed(DetailedView {
                player_id: id,
                angle: 0,
                x,
                y: 0,
                op_id,
                fields: FieldSet::default(),
            })],
        }))
        .unwrap()
    }

    fn welcomed(id: PlayerId) -> SyncClient {
        let mut client = SyncClient::new(&ClientConfig::default());
        let welcome = serde_json::to_string(&ServerMsg::Welcome {
            player_id: id,
            server_time: 0,
        })
        .unwrap();
        client.on_message(&welcome, 0).unwrap();
        client
    }

    #[test]
    fn echoed_id_produces_exactly_one_latency_sample() {
        let id = Uuid::new_v4();
        let mut client = welcomed(id);

        let payload = client.sample_input(1_000, Some(90.0)).unwrap().unwrap();
        let sent: ClientMsg = serde_json::from_str(&payload).unwrap();
        let ClientMsg::Input { id: input_id, .. } = sent else {
            panic!("expected input");
        };

        let first = client
            .on_message(&tick_json(50_000, id, 0, Some(input_id)), 1_070)
            .unwrap();
        assert_eq!(
            first,
            ClientEvent::Snapshot {
                latency: Some(LatencySample {
                    action_id: input_id.action_id,
                    round_trip_ms: 70
                })
            }
        );

        // Level-state echo repeats the same id; no second sample
        let second = client
            .on_message(&tick_json(50_066, id, 1, Some(input_id)), 1_136)
            .unwrap();
        assert_eq!(second, ClientEvent::Snapshot { latency: None });
        assert_eq!(client.sampler().pending_len(), 0);
    }

    #[test]
    fn malformed_message_is_reported() {
        let mut client = SyncClient::new(&ClientConfig::default());
        assert!(matches!(
            client.on_message("{\"type\":\"onTick\"}", 0),
            Err(SyncError::MalformedInput(_))
        ));
        assert!(client.buffer().is_empty());
    }

    #[test]
    fn stale_snapshot_is_flagged() {
        let id = Uuid::new_v4();
        let mut client = welcomed(id);
        client.on_message(&tick_json(200, id, 0, None), 10).unwrap();
        assert_eq!(
            client.on_message(&tick_json(100, id, 0, None), 20).unwrap(),
            ClientEvent::Stale
        );
    }

    #[test]
    fn frame_plays_back_with_delay() {
        let id = Uuid::new_v4();
        let mut client = welcomed(id);
        assert!(client.frame(0).is_none());

        client.on_message(&tick_json(10_000, id, 0, None), 1_000).unwrap();
        client.on_message(&tick_json(10_100, id, 100, None), 1_100).unwrap();

        // 1_250 local -> 10_250 server - 100 delay = 10_150: past the newest
        let playback = client.frame(1_250).unwrap();
        assert!(matches!(playback, Playback::Latest(_)));
        // 1_150 local -> 10_050
        let pose = client.frame(1_150).unwrap().player(id).unwrap().pose.unwrap();
        assert_eq!(pose.x, 50.0);
    }

    #[test]
    fn rejoin_discards_previous_session() {
        let old = Uuid::new_v4();
        let mut client = welcomed(old);
        client.on_message(&tick_json(80_000, old, 0, None), 1_000).unwrap();
        assert_eq!(client.buffer().len(), 1);

        let new = Uuid::new_v4();
        let welcome = serde_json::to_string(&ServerMsg::Welcome {
            player_id: new,
            server_time: 5_000,
        })
        .unwrap();
        client.on_message(&welcome, 2_000).unwrap();
        assert_eq!(client.player_id(), Some(new));
        assert!(client.buffer().is_empty());
        assert_eq!(client.buffer().anchor(), None);

        // Earlier server times are accepted again after the reset
        assert_eq!(
            client.on_message(&tick_json(5_033, new, 0, None), 2_033).unwrap(),
            ClientEvent::Snapshot { latency: None }
        );
        assert_eq!(client.buffer().anchor().unwrap().first_server_t, 5_033);
    }

    #[test]
    fn repeated_welcome_keeps_buffer() {
        let id = Uuid::new_v4();
        let mut client = welcomed(id);
        client.on_message(&tick_json(100, id, 0, None), 10).unwrap();
        let welcome = serde_json::to_string(&ServerMsg::Welcome {
            player_id: id,
            server_time: 0,
        })
        .unwrap();
        client.on_message(&welcome, 20).unwrap();
        assert_eq!(client.buffer().len(), 1);
    }

    #[test]
    fn pong_reports_round_trip() {
        let mut client = SyncClient::new(&ClientConfig::default());
        let pong = serde_json::to_string(&ServerMsg::Pong { t: 400 }).unwrap();
        assert_eq!(
            client.on_message(&pong, 460).unwrap(),
            ClientEvent::Pong { round_trip_ms: 60 }
        );
    }
}
