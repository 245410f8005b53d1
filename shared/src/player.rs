//! Player movement plus the hook and dash mechanics.
//!
//! All three mechanics mutate `position` and then run [`Player::enforce_bounds`].
//! Its return value is the only thing that ends a pull or cuts a dash short.

use crate::math::Vector2;
use crate::protocol::ProtocolError;
use crate::{
    Arena, DASH_COOLDOWN, DASH_SPEED, DASH_TICKS, HOOK_COOLDOWN, HOOK_SPEED, PLAYER_RADIUS,
    PLAYER_SPEED,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which set of movement keys the player steers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControlScheme {
    #[default]
    Wasd,
    Arrows,
}

impl FromStr for ControlScheme {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wsad" | "wasd" => Ok(ControlScheme::Wasd),
            "arrows" => Ok(ControlScheme::Arrows),
            other => Err(ProtocolError::InvalidControlScheme(other.to_string())),
        }
    }
}

impl TryFrom<u8> for ControlScheme {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlScheme::Wasd),
            1 => Ok(ControlScheme::Arrows),
            other => Err(ProtocolError::InvalidControlScheme(other.to_string())),
        }
    }
}

impl fmt::Display for ControlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlScheme::Wasd => write!(f, "wsad"),
            ControlScheme::Arrows => write!(f, "arrows"),
        }
    }
}

/// Keys held down by a client during one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeySet {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Space.
    pub hook: bool,
    /// Left shift.
    pub dash: bool,
}

impl KeySet {
    /// Returns `(up, down, left, right)` for the given scheme.
    pub fn axes(&self, controls: ControlScheme) -> (bool, bool, bool, bool) {
        match controls {
            ControlScheme::Wasd => (self.w, self.s, self.a, self.d),
            ControlScheme::Arrows => (self.up, self.down, self.left, self.right),
        }
    }
}

/// What happened during a single [`Player::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerUpdateResult {
    pub hook_fired: bool,
    pub dash_fired: bool,
    pub pull_finished: bool,
    /// The player was pushed back inside the court at least once.
    pub clamped: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    /// Centre of the player's circle.
    pub position: Vector2,
    pub radius: f32,
    /// Rating snapshot taken when the match was created.
    pub elo: i32,
    arena: Arena,

    pub hooking: bool,
    pub pulling: bool,
    /// Current tip of the hook.
    pub hook_coords: Vector2,
    /// Border point the hook travels to.
    pub hook_target: Vector2,
    hook_on_cooldown: bool,
    hook_cooldown_started: Option<f32>,

    pub dashing: bool,
    dash_direction: Vector2,
    dash_ticks_done: u32,
    dash_on_cooldown: bool,
    dash_cooldown_started: Option<f32>,
}

impl Player {
    pub fn new(name: impl Into<String>, position: Vector2, elo: i32, arena: Arena) -> Self {
        Self {
            name: name.into(),
            position,
            radius: PLAYER_RADIUS,
            elo,
            arena,
            hooking: false,
            pulling: false,
            hook_coords: position,
            hook_target: position,
            hook_on_cooldown: false,
            hook_cooldown_started: None,
            dashing: false,
            dash_direction: Vector2::ZERO,
            dash_ticks_done: 0,
            dash_on_cooldown: false,
            dash_cooldown_started: None,
        }
    }

    /// Advances the player by one tick.
    ///
    /// `sim_time` is the match clock in seconds and is used for both cooldown
    /// windows. Axis inputs are applied independently, so holding two
    /// directions moves `PLAYER_SPEED * dt` along each axis.
    pub fn update(
        &mut self,
        dt: f32,
        mouse_pos: Vector2,
        sim_time: f32,
        keys: &KeySet,
        controls: ControlScheme,
    ) -> PlayerUpdateResult {
        let mut result = PlayerUpdateResult::default();

        if !self.pulling && !self.dashing {
            self.apply_movement(dt, keys, controls, &mut result);
        }

        if keys.hook && !self.hooking && !self.pulling && !self.hook_on_cooldown {
            result.hook_fired = self.fire_hook(mouse_pos, sim_time);
        }
        if self.hooking {
            self.extend_hook(dt);
        }
        if self.pulling {
            self.pull(dt, &mut result);
        }

        if keys.dash && !self.dash_on_cooldown && !self.dashing {
            self.dash_cooldown_started = Some(sim_time);
            self.dash_on_cooldown = true;
            self.dashing = true;
            self.dash_ticks_done = 0;
            self.dash_direction = mouse_pos.sub(&self.position).normalize();
            result.dash_fired = true;
        }
        if self.dashing {
            self.dash(dt, &mut result);
        }

        self.check_cooldowns(sim_time);
        result
    }

    fn apply_movement(
        &mut self,
        dt: f32,
        keys: &KeySet,
        controls: ControlScheme,
        result: &mut PlayerUpdateResult,
    ) {
        let (up, down, left, right) = keys.axes(controls);
        let step = PLAYER_SPEED * dt;
        let mut delta = Vector2::ZERO;

        if up {
            delta.y -= step;
        }
        if down {
            delta.y += step;
        }
        if left {
            delta.x -= step;
        }
        if right {
            delta.x += step;
        }

        if delta != Vector2::ZERO {
            self.position = self.position.add(&delta);
            if !self.enforce_bounds() {
                result.clamped = true;
            }
        }
    }

    fn fire_hook(&mut self, mouse_pos: Vector2, sim_time: f32) -> bool {
        let Some(target) = self.arena.border().ray_exit(self.position, mouse_pos) else {
            return false;
        };

        self.hook_cooldown_started = Some(sim_time);
        self.hook_on_cooldown = true;
        self.hooking = true;
        self.hook_coords = self.position;
        self.hook_target = target;
        true
    }

    fn extend_hook(&mut self, dt: f32) {
        let step = HOOK_SPEED * dt;
        let remaining = self.hook_target.sub(&self.hook_coords);

        let reached = if remaining.magnitude() <= step {
            self.hook_coords = self.hook_target;
            true
        } else {
            self.hook_coords = self.hook_coords.add(&remaining.normalize().scale(step));
            !self.arena.border().contains(self.hook_coords)
        };

        if reached {
            self.hooking = false;
            self.pulling = true;
        }
    }

    fn pull(&mut self, dt: f32, result: &mut PlayerUpdateResult) {
        let direction = self.hook_target.sub(&self.position).normalize();
        if direction == Vector2::ZERO {
            self.pulling = false;
            result.pull_finished = true;
            return;
        }

        self.position = self
            .position
            .add(&direction.scale(HOOK_SPEED * dt));

        if !self.enforce_bounds() {
            self.pulling = false;
            result.pull_finished = true;
            result.clamped = true;
        }
    }

    fn dash(&mut self, dt: f32, result: &mut PlayerUpdateResult) {
        self.hooking = false;
        self.pulling = false;

        self.position = self
            .position
            .add(&self.dash_direction.scale(DASH_SPEED * dt));
        self.dash_ticks_done += 1;

        if !self.enforce_bounds() {
            self.dashing = false;
            result.clamped = true;
        } else if self.dash_ticks_done >= DASH_TICKS {
            self.dashing = false;
        }
    }

    fn check_cooldowns(&mut self, sim_time: f32) {
        if let Some(started) = self.dash_cooldown_started {
            if sim_time - started > DASH_COOLDOWN {
                self.dash_on_cooldown = false;
            }
        }
        if let Some(started) = self.hook_cooldown_started {
            if sim_time - started > HOOK_COOLDOWN {
                self.hook_on_cooldown = false;
            }
        }
    }

    /// Keeps the circle inside the court.
    ///
    /// Returns `false` when the player had crossed an edge; in that case the
    /// position has been moved onto the inner edge, `radius + border_width`
    /// away from the wall.
    pub fn enforce_bounds(&mut self) -> bool {
        let border = self.arena.border();
        let inset = self.radius + self.arena.border_width;
        let mut inside = true;

        if self.position.x - self.radius < border.left() {
            self.position.x = border.left() + inset;
            inside = false;
        } else if self.position.x + self.radius > border.right() {
            self.position.x = border.right() - inset;
            inside = false;
        }

        if self.position.y - self.radius < border.top() {
            self.position.y = border.top() + inset;
            inside = false;
        } else if self.position.y + self.radius > border.bottom() {
            self.position.y = border.bottom() - inset;
            inside = false;
        }

        inside
    }

    pub fn hook_cooldown_remaining(&self, sim_time: f32) -> f32 {
        cooldown_remaining(self.hook_cooldown_started, HOOK_COOLDOWN, sim_time)
    }

    pub fn dash_cooldown_remaining(&self, sim_time: f32) -> f32 {
        cooldown_remaining(self.dash_cooldown_started, DASH_COOLDOWN, sim_time)
    }

    pub fn hook_on_cooldown(&self) -> bool {
        self.hook_on_cooldown
    }

    pub fn dash_on_cooldown(&self) -> bool {
        self.dash_on_cooldown
    }
}

fn cooldown_remaining(started: Option<f32>, window: f32, now: f32) -> f32 {
    match started {
        Some(started) => (window - (now - started).abs()).clamp(0.0, window),
        None => 0.0,
    }
}
