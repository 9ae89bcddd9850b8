//! Position and heading integration

use tracing::warn;

use crate::util::angle::normalize;

use super::player::{Player, PlayerRegistry};

/// Integrate every live player over `dt` seconds, then drain all per-tick
/// motion (including that of dead or inactive players).
pub fn integrate_all(registry: &mut PlayerRegistry, dt: f64) {
    for player in registry.iter_mut() {
        if player.active && !player.dead {
            integrate(player, dt);
        }
        player.reset_motion();
    }
}

/// Advance one player's pose. A step that would produce a non-finite pose is
/// discarded and the previous pose kept.
pub fn integrate(player: &mut Player, dt: f64) {
    let x = player.x + player.move_x * dt;
    let y = player.y + player.move_y * dt;
    let angle = player.angle + player.angular_velocity * dt;

    if !(x.is_finite() && y.is_finite() && angle.is_finite()) {
        warn!(player_id = %player.id, "Discarding non-finite integration step");
        return;
    }

    player.x = x;
    player.y = y;
    player.angle = normalize(angle);
}
