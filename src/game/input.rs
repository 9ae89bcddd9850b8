//! Turns each player's latest intent into per-tick motion

use crate::config::SimConfig;
use crate::util::angle::{normalize, shortest_diff};

use super::player::{Player, PlayerRegistry};

/// Input applicator constants, copied out of [`SimConfig`]
#[derive(Debug, Clone, Copy)]
pub struct InputApplicator {
    /// Degrees within which the heading snaps to the target
    pub angular_tolerance: f64,
    /// Degrees per second
    pub turn_speed: f64,
    /// Units per second
    pub move_speed: f64,
}

impl InputApplicator {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            angular_tolerance: config.angular_tolerance,
            turn_speed: config.turn_speed,
            move_speed: config.move_speed,
        }
    }

    /// Apply every active player's intent
    pub fn apply_all(&self, registry: &mut PlayerRegistry) {
        for player in registry.iter_mut() {
            if !player.active {
                continue;
            }
            self.apply(player);
        }
    }

    /// Resolve heading and accumulate the movement vector for one player
    pub fn apply(&self, player: &mut Player) {
        if let Some(intent) = &player.intent {
            player.op_id = Some(intent.id);

            if let Some(target) = intent.joystick_angle {
                let diff = shortest_diff(player.angle, target);
                if diff.abs() <= self.angular_tolerance {
                    // Snap to avoid oscillating around the target
                    player.angle = normalize(target);
                    player.angular_velocity = 0.0;
                } else if diff > 0.0 {
                    player.angular_velocity = self.turn_speed;
                } else {
                    player.angular_velocity = -self.turn_speed;
                }
            }
        }

        // Always moves along the current heading, not the target
        let rad = player.angle.to_radians();
        player.move_x += rad.cos() * self.move_speed;
        player.move_y += rad.sin() * self.move_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::Intent;
    use crate::ws::protocol::InputId;
    use uuid::Uuid;

    fn player_facing(angle: f64, target: Option<f64>) -> Player {
        let mut player = Player::new(Uuid::new_v4(), 0.0, 0.0, angle);
        player.intent = Some(Intent {
            joystick_angle: target,
            id: InputId { action_id: 3, ts: 99 },
        });
        player
    }

    fn applicator() -> InputApplicator {
        InputApplicator::from_config(&SimConfig::default())
    }

    #[test]
    fn within_tolerance_snaps_to_target() {
        let mut player = player_facing(10.0, Some(60.0));
        player.angular_velocity = 123.0;
        applicator().apply(&mut player);
        assert_eq!(player.angle, 60.0);
        assert_eq!(player.angular_velocity, 0.0);
    }

    #[test]
    fn snap_works_across_the_seam() {
        let mut player = player_facing(170.0, Some(-170.0));
        applicator().apply(&mut player);
        assert_eq!(player.angle, -170.0);
        assert_eq!(player.angular_velocity, 0.0);
    }

    #[test]
    fn outside_tolerance_turns_at_constant_rate() {
        let mut player = player_facing(0.0, Some(90.0));
        applicator().apply(&mut player);
        assert_eq!(player.angular_velocity, 450.0);
        assert_eq!(player.angle, 0.0);

        let mut player = player_facing(0.0, Some(-150.0));
        applicator().apply(&mut player);
        assert_eq!(player.angular_velocity, -450.0);
    }

    #[test]
    fn turns_the_short_way_across_the_seam() {
        // 100 -> -100 is 160 degrees clockwise through 180
        let mut player = player_facing(100.0, Some(-100.0));
        applicator().apply(&mut player);
        assert_eq!(player.angular_velocity, 450.0);

        let mut player = player_facing(-100.0, Some(100.0));
        applicator().apply(&mut player);
        assert_eq!(player.angular_velocity, -450.0);
    }

    #[test]
    fn movement_follows_current_heading() {
        let mut player = player_facing(90.0, None);
        applicator().apply(&mut player);
        assert!(player.move_x.abs() < 1e-9);
        assert!((player.move_y - 180.0).abs() < 1e-9);

        // Accumulates until integrated
        applicator().apply(&mut player);
        assert!((player.move_y - 360.0).abs() < 1e-9);
    }

    #[test]
    fn records_correlation_id() {
        let mut player = player_facing(0.0, None);
        applicator().apply(&mut player);
        assert_eq!(player.op_id, Some(InputId { action_id: 3, ts: 99 }));
    }

    #[test]
    fn inactive_players_are_skipped() {
        let mut registry = PlayerRegistry::new();
        let mut player = player_facing(0.0, Some(90.0));
        player.active = false;
        let id = player.id;
        registry.insert(player);

        applicator().apply_all(&mut registry);
        let player = registry.get(&id).unwrap();
        assert_eq!(player.angular_velocity, 0.0);
        assert_eq!(player.move_x, 0.0);
        assert_eq!(player.op_id, None);
    }
}
