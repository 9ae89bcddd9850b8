//! Playback of buffered snapshots at the render time
//!
//! Stateless: every frame is recomputed from the buffer and the wall clock.

use std::collections::HashMap;

use crate::util::angle::lerp_angle;
use crate::ws::protocol::{DetailedView, FieldSet, InputId, PlayerId, PlayerView, TickSnapshot};

use super::buffer::SnapshotBuffer;

/// Position and heading of a player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Degrees in (-180, 180]
    pub angle: f64,
}

impl Pose {
    fn of(view: &DetailedView) -> Self {
        Self {
            x: f64::from(view.x),
            y: f64::from(view.y),
            angle: f64::from(view.angle),
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angle.is_finite()
    }

    /// Linear position, shortest-arc heading
    pub fn lerp(&self, to: &Pose, t: f64) -> Pose {
        Pose {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            angle: lerp_angle(self.angle, to.angle, t),
        }
    }
}

/// A player as it should be drawn this frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPlayer {
    pub player_id: PlayerId,
    /// `None` for summary views (too far away to carry a pose)
    pub pose: Option<Pose>,
    pub op_id: Option<InputId>,
    pub fields: FieldSet,
}

impl RenderedPlayer {
    pub fn from_view(view: &PlayerView) -> Self {
        match view {
            PlayerView::Detailed(v) => Self {
                player_id: v.player_id,
                pose: Some(Pose::of(v)),
                op_id: v.op_id,
                fields: v.fields.clone(),
            },
            PlayerView::Summary(v) => Self {
                player_id: v.player_id,
                pose: None,
                op_id: None,
                fields: v.fields.clone(),
            },
        }
    }
}

/// State blended between two buffered snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedState {
    pub render_time: f64,
    /// Blend factor in [0, 1] from base towards the next snapshot
    pub ratio: f64,
    pub players: Vec<RenderedPlayer>,
}

/// What to show this frame
#[derive(Debug, Clone, PartialEq)]
pub enum Playback<'a> {
    /// Render time is before every buffered snapshot; holding the newest
    Hold(&'a TickSnapshot),
    /// Render time is at or past the newest snapshot
    Latest(&'a TickSnapshot),
    /// Render time falls between two snapshots
    Interpolated(InterpolatedState),
}

impl Playback<'_> {
    pub fn players(&self) -> Vec<RenderedPlayer> {
        match self {
            Playback::Hold(s) | Playback::Latest(s) => {
                s.all.iter().map(RenderedPlayer::from_view).collect()
            }
            Playback::Interpolated(state) => state.players.clone(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<RenderedPlayer> {
        self.players().into_iter().find(|p| p.player_id == id)
    }
}

/// Chooses between holding, showing the newest, and blending
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolationEngine;

impl InterpolationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Playback for local time `now_ms`; `None` before the first snapshot
    pub fn sample<'a>(&self, buffer: &'a SnapshotBuffer, now_ms: u64) -> Option<Playback<'a>> {
        let render_time = buffer.render_time(now_ms)?;
        self.sample_at(buffer, render_time)
    }

    /// Playback for an explicit server-time render point
    pub fn sample_at<'a>(&self, buffer: &'a SnapshotBuffer, render_time: f64) -> Option<Playback<'a>> {
        let entries = buffer.entries();
        let newest = entries.last()?;

        let Some(base) = buffer.find_base(render_time) else {
            return Some(Playback::Hold(newest));
        };
        if base == entries.len() - 1 {
            return Some(Playback::Latest(newest));
        }

        let from = &entries[base];
        let to = &entries[base + 1];
        let span = to.t as f64 - from.t as f64;
        let ratio = if span > 0.0 {
            ((render_time - from.t as f64) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(Playback::Interpolated(InterpolatedState {
            render_time,
            ratio,
            players: blend(from, to, ratio),
        }))
    }
}

/// Blend matching players; players only in one snapshot are taken as-is
fn blend(from: &TickSnapshot, to: &TickSnapshot, ratio: f64) -> Vec<RenderedPlayer> {
    let next: HashMap<PlayerId, &PlayerView> = to.all.iter().map(|v| (v.player_id(), v)).collect();

    let mut players: Vec<RenderedPlayer> = from
        .all
        .iter()
        .map(|view| {
            let mut rendered = RenderedPlayer::from_view(view);
            let target = next
                .get(&view.player_id())
                .and_then(|v| v.as_detailed())
                .map(Pose::of);
            match (rendered.pose, target) {
                (Some(pose), Some(target)) => {
                    let blended = pose.lerp(&target, ratio);
                    // Keep the base pose if either side is unusable
                    if blended.is_finite() {
                        rendered.pose = Some(blended);
                    }
                }
                // Came into detail range: nothing to blend from yet
                (None, Some(target)) => rendered.pose = Some(target),
                _ => {}
            }
            rendered
        })
        .collect();

    for view in &to.all {
        if !players.iter().any(|p| p.player_id == view.player_id()) {
            players.push(RenderedPlayer::from_view(view));
        }
    }

    players
}
