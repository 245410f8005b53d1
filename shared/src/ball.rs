use crate::math::{Rect, Vector2};
use crate::{BALL_DAMPING, BALL_RADIUS};

/// The match ball. Velocity is in pixels per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub position: Vector2,
    pub velocity: Vector2,
    pub radius: f32,
}

impl Ball {
    pub fn new(position: Vector2) -> Self {
        Self {
            position,
            velocity: Vector2::ZERO,
            radius: BALL_RADIUS,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::around(self.position, self.radius)
    }

    /// Integrates one tick, applies damping and rebounds off `border`.
    pub fn update(&mut self, border: &Rect) {
        self.position = self.position.add(&self.velocity);
        self.velocity = self.velocity.scale(1.0 / BALL_DAMPING);
        self.rebound(border);
    }

    /// Recentres the ball with zero velocity.
    pub fn reset(&mut self, center: Vector2) {
        self.position = center;
        self.velocity = Vector2::ZERO;
    }

    // Position is snapped onto the edge rather than mirrored so repeated
    // contacts cannot accumulate past the wall.
    fn rebound(&mut self, border: &Rect) {
        if self.position.x - self.radius <= border.left() {
            self.velocity.x = -self.velocity.x;
            self.position.x = border.left() + self.radius;
        } else if self.position.x + self.radius >= border.right() {
            self.velocity.x = -self.velocity.x;
            self.position.x = border.right() - self.radius;
        }

        if self.position.y - self.radius <= border.top() {
            self.velocity.y = -self.velocity.y;
            self.position.y = border.top() + self.radius;
        } else if self.position.y + self.radius >= border.bottom() {
            self.velocity.y = -self.velocity.y;
            self.position.y = border.bottom() - self.radius;
        }
    }
}
