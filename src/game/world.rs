//! World state and the per-tick pipeline

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::ws::protocol::{ClientMsg, PlayerField, PlayerId, ServerMsg};

use super::broadcast::{broadcast, BroadcastReport, Outbox};
use super::clock::{BroadcastCadence, TickTimer};
use super::error::SyncError;
use super::input::InputApplicator;
use super::motion::integrate_all;
use super::player::{Intent, Persistence, Player, PlayerRegistry};

/// One simulated world. Owns every piece of mutable simulation state and is
/// driven by exactly one caller, so ticks never overlap.
pub struct World {
    id: Uuid,
    config: SimConfig,
    players: PlayerRegistry,
    rng: ChaCha8Rng,
    timer: TickTimer,
    cadence: BroadcastCadence,
    applicator: InputApplicator,
    tick: u64,
    last_snapshot_t: u64,
}

impl World {
    pub fn new(id: Uuid, seed: u64, config: SimConfig, now_ms: u64) -> Self {
        Self {
            id,
            players: PlayerRegistry::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            timer: TickTimer::new(now_ms),
            cadence: BroadcastCadence::new(config.broadcast_every),
            applicator: InputApplicator::from_config(&config),
            tick: 0,
            last_snapshot_t: 0,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Register a new connection and spawn its player
    pub fn connect(&mut self, id: PlayerId) -> &Player {
        let player = self.players.spawn(id, &mut self.rng, &self.config);
        info!(world_id = %self.id, player_id = %id, "Player connected");
        player
    }

    /// Drop a connection's player. Unknown ids are ignored.
    pub fn disconnect(&mut self, id: &PlayerId) {
        if self.players.remove(id).is_some() {
            info!(
                world_id = %self.id,
                player_id = %id,
                player_count = self.players.len(),
                "Player disconnected"
            );
        }
    }

    /// Apply an inbound client message. Returns a direct reply, if any.
    pub fn handle_message(
        &mut self,
        id: PlayerId,
        msg: ClientMsg,
    ) -> Result<Option<ServerMsg>, SyncError> {
        match msg {
            ClientMsg::Input { player_op, id: input_id } => {
                let intent = Intent::from_op(player_op, input_id)?;
                let player = self.players.require_mut(&id)?;
                player.intent = Some(intent);
                Ok(None)
            }
            ClientMsg::Ping { t } => Ok(Some(ServerMsg::Pong { t })),
        }
    }

    /// Attach a field to the player's upcoming broadcasts
    pub fn mark(
        &mut self,
        id: PlayerId,
        field: PlayerField,
        persistence: Persistence,
    ) -> Result<(), SyncError> {
        self.players.require_mut(&id)?.mark(field, persistence);
        Ok(())
    }

    /// Flip a player's dead flag and tell everyone
    pub fn set_dead(&mut self, id: PlayerId, dead: bool) -> Result<(), SyncError> {
        let player = self.players.require_mut(&id)?;
        player.dead = dead;
        player.mark(PlayerField::Dead(dead), Persistence::Persistent);
        Ok(())
    }

    /// Run one tick at wall time `now_ms`. Returns the broadcast report on
    /// ticks that broadcast.
    pub fn tick<O: Outbox>(&mut self, now_ms: u64, outbox: &mut O) -> Option<BroadcastReport> {
        let dt = self.timer.advance(now_ms);
        self.tick += 1;

        if self.players.is_empty() {
            return None;
        }

        self.applicator.apply_all(&mut self.players);
        integrate_all(&mut self.players, dt);

        if !self.cadence.should_send() {
            return None;
        }

        // Snapshot times never go backwards, even if the wall clock does
        let t = now_ms.max(self.last_snapshot_t);
        self.last_snapshot_t = t;

        let report = broadcast(&mut self.players, outbox, self.config.nearby_range_sq(), t);
        debug!(
            world_id = %self.id,
            tick = self.tick,
            sent = report.sent,
            failed = report.failed,
            bytes = report.bytes,
            "Broadcast"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{InputId, PlayerOp, TickSnapshot};

    #[derive(Default)]
    struct VecOutbox(Vec<(PlayerId, String)>);

    impl Outbox for VecOutbox {
        fn send_to(&mut self, player_id: PlayerId, payload: String) -> Result<(), SyncError> {
            self.0.push((player_id, payload));
            Ok(())
        }
    }

    fn input(angle: Option<f64>, action_id: u32) -> ClientMsg {
        ClientMsg::Input {
            player_op: PlayerOp {
                joystick_angle: angle,
            },
            id: InputId { action_id, ts: 0 },
        }
    }

    fn world_with_player(now: u64) -> (World, PlayerId) {
        let mut world = World::new(Uuid::new_v4(), 42, SimConfig::default(), now);
        let id = Uuid::new_v4();
        world.connect(id);
        (world, id)
    }

    #[test]
    fn end_to_end_turn_towards_target() {
        let (mut world, id) = world_with_player(0);
        {
            let player = world.players_mut().get_mut(&id).unwrap();
            player.angle = 0.0;
            player.x = 0.0;
            player.y = 0.0;
        }
        world.handle_message(id, input(Some(90.0), 1)).unwrap();

        let mut outbox = VecOutbox::default();
        world.tick(100, &mut outbox);

        let player = world.players().get(&id).unwrap();
        assert!((player.angle - 45.0).abs() < 1e-9, "angle {}", player.angle);
        // Moved along the pre-turn heading: 180 units/s * 0.1 s on +x
        assert!((player.x - 18.0).abs() < 1e-9);
        assert!(player.y.abs() < 1e-9);
        // Motion is single-tick
        assert_eq!(player.angular_velocity, 0.0);
        assert_eq!(player.op_id, Some(InputId { action_id: 1, ts: 0 }));
    }

    #[test]
    fn intent_persists_until_replaced() {
        let (mut world, id) = world_with_player(0);
        world.players_mut().get_mut(&id).unwrap().angle = 0.0;
        world.handle_message(id, input(Some(170.0), 1)).unwrap();

        let mut outbox = VecOutbox::default();
        let mut now = 0;
        for _ in 0..10 {
            now += 100;
            world.tick(now, &mut outbox);
        }
        let angle = world.players().get(&id).unwrap().angle;
        assert_eq!(angle, 170.0);
    }

    #[test]
    fn empty_world_still_consumes_dt() {
        let mut world = World::new(Uuid::new_v4(), 1, SimConfig::default(), 0);
        let mut outbox = VecOutbox::default();
        assert!(world.tick(60_000, &mut outbox).is_none());

        let id = Uuid::new_v4();
        world.connect(id);
        let (x0, y0) = {
            let p = world.players().get(&id).unwrap();
            (p.x, p.y)
        };
        world.tick(60_100, &mut outbox);
        let p = world.players().get(&id).unwrap();
        let moved = (p.x - x0).hypot(p.y - y0);
        assert!((moved - 18.0).abs() < 1e-6, "moved {moved}");
    }

    #[test]
    fn broadcasts_every_other_non_empty_tick() {
        let (mut world, _) = world_with_player(0);
        let mut outbox = VecOutbox::default();
        let broadcasts = (1..=9u64)
            .filter(|i| world.tick(i * 33, &mut outbox).is_some())
            .count();
        assert_eq!(broadcasts, 4);
        assert_eq!(outbox.0.len(), 4);
    }

    #[test]
    fn snapshot_time_never_decreases() {
        let (mut world, _) = world_with_player(0);
        let mut outbox = VecOutbox::default();
        for now in [100, 200, 300, 400, 150, 160, 500, 600] {
            world.tick(now, &mut outbox);
        }
        let times: Vec<u64> = outbox
            .0
            .iter()
            .map(|(_, payload)| match serde_json::from_str(payload).unwrap() {
                ServerMsg::Tick(TickSnapshot { t, .. }) => t,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(times, [200, 400, 400, 600]);
    }

    #[test]
    fn unknown_connection_is_a_no_op_error() {
        let (mut world, _) = world_with_player(0);
        let stranger = Uuid::new_v4();
        assert_eq!(
            world.handle_message(stranger, input(Some(1.0), 0)),
            Err(SyncError::UnknownConnection(stranger))
        );
        world.disconnect(&stranger);
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn malformed_input_keeps_previous_intent() {
        let (mut world, id) = world_with_player(0);
        world.handle_message(id, input(Some(30.0), 1)).unwrap();
        let result = world.handle_message(id, input(Some(f64::INFINITY), 2));
        assert!(matches!(result, Err(SyncError::MalformedInput(_))));
        let intent = world.players().get(&id).unwrap().intent.clone().unwrap();
        assert_eq!(intent.joystick_angle, Some(30.0));
    }

    #[test]
    fn ping_gets_pong() {
        let (mut world, id) = world_with_player(0);
        assert_eq!(
            world.handle_message(id, ClientMsg::Ping { t: 9 }),
            Ok(Some(ServerMsg::Pong { t: 9 }))
        );
    }

    #[test]
    fn dead_flag_is_marked_persistent() {
        let (mut world, id) = world_with_player(0);
        world.set_dead(id, true).unwrap();
        let player = world.players().get(&id).unwrap();
        assert!(player.dead);
        assert_eq!(player.persistent.dead, Some(true));
    }
}
