//! Headless input policy: chase the ball and push it toward the opposing goal.

use crate::game::ClientGameState;
use log::debug;
use shared::{ControlScheme, InputFrame, KeySet, Side, Vector2, BALL_RADIUS, PLAYER_RADIUS};

/// Per-axis slack before the policy stops pressing a direction.
const DEAD_ZONE: f32 = 6.0;
/// Hook toward the ball when it is at least this far away.
const HOOK_RANGE: f32 = 450.0;
/// Dash into the ball when it is at most this far away.
const DASH_RANGE: f32 = 180.0;

/// Turns the latest snapshot into the next [`InputFrame`].
pub struct InputManager {
    controls: ControlScheme,
    frames: u64,
}

impl InputManager {
    pub fn new(controls: ControlScheme) -> Self {
        Self {
            controls,
            frames: 0,
        }
    }

    pub fn controls(&self) -> ControlScheme {
        self.controls
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns an idle frame when there is no match to play.
    pub fn next_frame(&mut self, game: &ClientGameState) -> InputFrame {
        self.frames += 1;

        let (Some(side), Some(own), Some(ball)) =
            (game.side(), game.own_position(), game.ball_position())
        else {
            return self.frame(KeySet::default(), (0, 0));
        };

        let target = approach_point(side, ball);
        let mut keys = self.steer(own, target);

        let distance = own.distance(&ball);
        let (hook_cd, dash_cd) = game.own_cooldowns().unwrap_or((0.0, 0.0));
        if !game.is_hooking() {
            if distance <= DASH_RANGE && dash_cd == 0.0 {
                debug!("Dashing at the ball from {:.0}px", distance);
                keys.dash = true;
            } else if distance >= HOOK_RANGE && hook_cd == 0.0 {
                debug!("Hooking toward the ball from {:.0}px", distance);
                keys.hook = true;
            }
        }

        self.frame(keys, (ball.x.round() as i32, ball.y.round() as i32))
    }

    fn frame(&self, keys: KeySet, mouse: (i32, i32)) -> InputFrame {
        InputFrame {
            mouse,
            keys,
            controls: self.controls,
        }
    }

    fn steer(&self, from: Vector2, to: Vector2) -> KeySet {
        let up = to.y < from.y - DEAD_ZONE;
        let down = to.y > from.y + DEAD_ZONE;
        let left = to.x < from.x - DEAD_ZONE;
        let right = to.x > from.x + DEAD_ZONE;

        let mut keys = KeySet::default();
        match self.controls {
            ControlScheme::Wasd => {
                keys.w = up;
                keys.s = down;
                keys.a = left;
                keys.d = right;
            }
            ControlScheme::Arrows => {
                keys.up = up;
                keys.down = down;
                keys.left = left;
                keys.right = right;
            }
        }
        keys
    }
}

/// The spot behind the ball, seen from the goal `side` attacks.
fn approach_point(side: Side, ball: Vector2) -> Vector2 {
    let offset = PLAYER_RADIUS + BALL_RADIUS;
    match side {
        Side::Left => Vector2::new(ball.x - offset, ball.y),
        Side::Right => Vector2::new(ball.x + offset, ball.y),
    }
}
