//! Types shared by the Novaglide server and client: court geometry, the ball
//! and player simulation, match statistics and the wire protocol.
//!
//! The simulation types live here rather than in the server so that tests and
//! tools can drive a `Player` or `Ball` without a network stack, but only the
//! server ever advances them during a match. Clients treat everything they
//! receive as authoritative.

pub mod ball;
pub mod framing;
pub mod math;
pub mod player;
pub mod protocol;
pub mod stats;

use serde::{Deserialize, Serialize};

pub use ball::Ball;
pub use math::{Rect, Vector2};
pub use player::{ControlScheme, KeySet, Player, PlayerUpdateResult};
pub use protocol::{Envelope, InputFrame, Packet, Sender, ShareState, Side};
pub use stats::{MatchStats, PlayerStats, StatsSnapshot};

pub const WORLD_WIDTH: f32 = 1280.0;
pub const WORLD_HEIGHT: f32 = 720.0;
pub const BORDER_WIDTH: f32 = 5.0;
pub const GOAL_WIDTH: f32 = 20.0;
pub const GOAL_HEIGHT: f32 = 100.0;

pub const PLAYER_RADIUS: f32 = 40.0;
pub const BALL_RADIUS: f32 = 20.0;

/// Pixels per second along each pressed axis.
pub const PLAYER_SPEED: f32 = 500.0;
/// Pixels per second for both the hook tip and the pull.
pub const HOOK_SPEED: f32 = 1200.0;
pub const DASH_SPEED: f32 = 1600.0;
pub const DASH_TICKS: u32 = 8;

/// Seconds.
pub const HOOK_COOLDOWN: f32 = 20.0;
/// Seconds.
pub const DASH_COOLDOWN: f32 = 10.0;

/// Ball velocity is divided by this every tick.
pub const BALL_DAMPING: f32 = 1.003;
/// Ball speed in pixels per tick right after a player touches it.
pub const KICK_SPEED: f32 = 20.0;

/// Seconds of regulation time.
pub const MATCH_DURATION: f32 = 30.0;
pub const TICK_RATE: u32 = 60;
pub const STARTING_ELO: i32 = 1000;

pub const LEFT_SPAWN: Vector2 = Vector2 { x: 100.0, y: 360.0 };
pub const RIGHT_SPAWN: Vector2 = Vector2 {
    x: 1180.0,
    y: 360.0,
};

/// Court geometry. Both goals sit on the side walls, vertically centred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    pub border_width: f32,
    pub goal_width: f32,
    pub goal_height: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            border_width: BORDER_WIDTH,
            goal_width: GOAL_WIDTH,
            goal_height: GOAL_HEIGHT,
        }
    }
}

impl Arena {
    /// The full court rectangle the ball rebounds from.
    pub fn border(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new((self.width / 2.0).floor(), (self.height / 2.0).floor())
    }

    /// Returns `(left_goal, right_goal)`.
    pub fn goals(&self) -> (Rect, Rect) {
        let top = ((self.height - self.goal_height) / 2.0).floor();
        let left = Rect::new(0.0, top, self.goal_width, self.goal_height);
        let right = Rect::new(
            self.width - self.goal_width,
            top,
            self.goal_width,
            self.goal_height,
        );
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_defaults() {
        let arena = Arena::default();
        assert_eq!(arena.border(), Rect::new(0.0, 0.0, 1280.0, 720.0));
        assert_eq!(arena.center(), Vector2::new(640.0, 360.0));
    }

    #[test]
    fn test_goals_are_centred_on_side_walls() {
        let arena = Arena::default();
        let (left, right) = arena.goals();

        assert_eq!(left, Rect::new(0.0, 310.0, 20.0, 100.0));
        assert_eq!(right, Rect::new(1260.0, 310.0, 20.0, 100.0));
        assert_eq!(left.center().y, arena.center().y);
    }

    #[test]
    fn test_spawns_inside_court() {
        let border = Arena::default().border();
        assert!(border.contains(LEFT_SPAWN));
        assert!(border.contains(RIGHT_SPAWN));
    }
}
