//! Player records and the per-world registry

use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::SimConfig;
use crate::util::angle::normalize;
use crate::ws::protocol::{FieldKind, FieldSet, InputId, PlayerField, PlayerId, PlayerOp};

use super::error::SyncError;

/// Latest input intent for a player. Level state: applied every tick until
/// replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    /// Desired heading in degrees
    pub joystick_angle: Option<f64>,
    pub id: InputId,
}

impl Intent {
    /// Validate a decoded operation
    pub fn from_op(op: PlayerOp, id: InputId) -> Result<Self, SyncError> {
        if let Some(angle) = op.joystick_angle {
            if !angle.is_finite() {
                return Err(SyncError::MalformedInput(format!(
                    "joystickAngle {angle} is not finite"
                )));
            }
        }
        Ok(Self {
            joystick_angle: op.joystick_angle,
            id,
        })
    }
}

/// How long a marked field stays attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Next broadcast only, detailed view only
    #[default]
    Transient,
    /// Every broadcast until overwritten, detailed and summary views
    Persistent,
}

/// Player state in a world (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,

    // Pose
    pub x: f64,
    pub y: f64,
    /// Heading in degrees, always in (-180, 180]
    pub angle: f64,

    // Per-tick motion, reset after integration
    /// Degrees per second
    pub angular_velocity: f64,
    pub move_x: f64,
    pub move_y: f64,

    // Input tracking
    pub intent: Option<Intent>,
    /// Correlation id echoed back in the detailed view
    pub op_id: Option<InputId>,

    // Marked fields
    pub transient: FieldSet,
    pub persistent: FieldSet,

    pub active: bool,
    pub dead: bool,
}

impl Player {
    pub fn new(id: PlayerId, x: f64, y: f64, angle: f64) -> Self {
        Self {
            id,
            x,
            y,
            angle: normalize(angle),
            angular_velocity: 0.0,
            move_x: 0.0,
            move_y: 0.0,
            intent: None,
            op_id: None,
            transient: FieldSet::default(),
            persistent: FieldSet::default(),
            active: true,
            dead: false,
        }
    }

    /// Attach a field to upcoming broadcasts
    pub fn mark(&mut self, field: PlayerField, persistence: Persistence) {
        match persistence {
            Persistence::Transient => self.transient.set(field),
            Persistence::Persistent => self.persistent.set(field),
        }
    }

    /// Stop sending a persistent field
    pub fn clear_persistent(&mut self, kind: FieldKind) {
        self.persistent.clear(kind);
    }

    /// Zero the single-tick motion impulses
    pub fn reset_motion(&mut self) {
        self.move_x = 0.0;
        self.move_y = 0.0;
        self.angular_velocity = 0.0;
    }

    /// Short display name derived from the id
    pub fn default_name(id: PlayerId) -> String {
        format!("Player_{}", &id.simple().to_string()[..8])
    }
}

/// Connected players of one world, keyed by connection id.
/// Iteration order is stable (ordered by id).
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a player at a random spawn point. An existing record for the
    /// same id is kept as-is.
    pub fn spawn<R: Rng>(&mut self, id: PlayerId, rng: &mut R, config: &SimConfig) -> &mut Player {
        self.players.entry(id).or_insert_with(|| {
            let (x, y, angle) = spawn_point(rng, config.spawn_radius);
            let mut player = Player::new(id, x, y, angle);
            player.mark(PlayerField::Name(Player::default_name(id)), Persistence::Persistent);
            player.mark(PlayerField::Active(true), Persistence::Persistent);
            debug!(player_id = %id, x, y, angle = player.angle, "Player spawned");
            player
        })
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Remove a player. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn require_mut(&mut self, id: &PlayerId) -> Result<&mut Player, SyncError> {
        self.players
            .get_mut(id)
            .ok_or(SyncError::UnknownConnection(*id))
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }
}

/// Uniform point in a disc plus a heading in (-180, 180]
fn spawn_point<R: Rng>(rng: &mut R, radius: f64) -> (f64, f64, f64) {
    let theta = rng.gen_range(0.0..std::f64::consts::TAU);
    let distance = radius * rng.gen::<f64>().sqrt();
    let angle = normalize(rng.gen_range(-180.0..180.0));
    (theta.cos() * distance, theta.sin() * distance, angle)
}
