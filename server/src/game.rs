use log::{debug, info};
use shared::math::circles_overlap;
use shared::{
    Arena, Ball, InputFrame, MatchStats, Player, Rect, ShareState, Side, StatsSnapshot, Vector2,
    KICK_SPEED, LEFT_SPAWN, RIGHT_SPAWN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Running,
    /// Regulation time ran out with equal score; the next goal wins.
    Tiebreak,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Decided,
    /// `side` left the match.
    Forfeit { side: Side },
    NoContest,
}

/// Final state of an ended match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub names: (String, String),
    /// Ratings at kick-off.
    pub elos: (i32, i32),
    pub score: (u32, u32),
    pub result: MatchResult,
    pub winner: Option<Side>,
    pub stats: StatsSnapshot,
}

impl MatchOutcome {
    /// Outcome for a match whose simulation was lost before it could end.
    pub fn no_contest(names: (String, String), elos: (i32, i32)) -> Self {
        let stats =
            MatchStats::new(&[names.0.as_str(), names.1.as_str()], &[elos.0, elos.1]).snapshot();
        Self {
            names,
            elos,
            score: (0, 0),
            result: MatchResult::NoContest,
            winner: None,
            stats,
        }
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|side| match side {
            Side::Left => self.names.0.as_str(),
            Side::Right => self.names.1.as_str(),
        })
    }
}

/// Authoritative state of one 1v1 match.
///
/// The match is advanced in fixed steps by [`Match::advance_tick`]. Each side
/// has a mailbox holding its latest [`InputFrame`], which is re-applied on
/// every tick until the client sends a new one.
#[derive(Debug)]
pub struct Match {
    players: [Player; 2],
    ball: Ball,
    arena: Arena,
    goals: (Rect, Rect),
    duration: f32,
    elapsed: f32,
    score: (u32, u32),
    phase: MatchPhase,
    inputs: [InputFrame; 2],
    /// `(dash, hook)` remaining seconds per side, refreshed every tick.
    cooldowns: [(f32, f32); 2],
    result: Option<MatchResult>,
    winner: Option<Side>,
    stats: MatchStats,
}

impl Match {
    pub fn new(left: (&str, i32), right: (&str, i32), duration: f32) -> Self {
        let arena = Arena::default();
        let players = [
            Player::new(left.0, LEFT_SPAWN, left.1, arena),
            Player::new(right.0, RIGHT_SPAWN, right.1, arena),
        ];
        let stats = MatchStats::new(&[left.0, right.0], &[left.1, right.1]);

        Self {
            players,
            ball: Ball::new(arena.center()),
            arena,
            goals: arena.goals(),
            duration,
            elapsed: 0.0,
            score: (0, 0),
            phase: MatchPhase::Running,
            inputs: [InputFrame::default(); 2],
            cooldowns: [(0.0, 0.0); 2],
            result: None,
            winner: None,
            stats,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn score(&self) -> (u32, u32) {
        self.score
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn player(&self, side: Side) -> &Player {
        &self.players[side.index()]
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn set_input(&mut self, side: Side, frame: InputFrame) {
        self.inputs[side.index()] = frame;
    }

    /// Advances the match by `dt` seconds and returns the resulting phase.
    pub fn advance_tick(&mut self, dt: f32) -> MatchPhase {
        if self.phase == MatchPhase::Ended {
            return MatchPhase::Ended;
        }

        if let Some(scorer) = self.check_goal() {
            self.score_goal(scorer);
            if self.phase == MatchPhase::Tiebreak {
                self.finish(MatchResult::Decided, Some(scorer));
                return MatchPhase::Ended;
            }
        }

        self.kick_ball();

        let sim_time = self.elapsed;
        for side in [Side::Left, Side::Right] {
            let input = self.inputs[side.index()];
            let player = &mut self.players[side.index()];
            let result =
                player.update(dt, input.mouse_pos(), sim_time, &input.keys, input.controls);
            if result.hook_fired {
                debug!("{} fired hook toward {:?}", player.name, player.hook_target);
            }
            if result.dash_fired {
                debug!("{} dashed", player.name);
            }
        }

        self.ball.update(&self.arena.border());

        for (slot, player) in self.cooldowns.iter_mut().zip(self.players.iter()) {
            *slot = (
                player.dash_cooldown_remaining(sim_time),
                player.hook_cooldown_remaining(sim_time),
            );
        }

        self.elapsed += dt;
        if self.phase == MatchPhase::Running && self.elapsed >= self.duration {
            match self.score.0.cmp(&self.score.1) {
                std::cmp::Ordering::Equal => {
                    info!(
                        "{} vs {} tied at {}-{}, entering tiebreak",
                        self.players[0].name, self.players[1].name, self.score.0, self.score.1
                    );
                    self.phase = MatchPhase::Tiebreak;
                }
                std::cmp::Ordering::Greater => self.finish(MatchResult::Decided, Some(Side::Left)),
                std::cmp::Ordering::Less => self.finish(MatchResult::Decided, Some(Side::Right)),
            }
        }

        self.phase
    }

    /// Side credited with a goal if the ball overlaps either goal mouth.
    fn check_goal(&self) -> Option<Side> {
        let ball = self.ball.rect();
        if ball.collides(&self.goals.0) {
            Some(Side::Right)
        } else if ball.collides(&self.goals.1) {
            Some(Side::Left)
        } else {
            None
        }
    }

    fn score_goal(&mut self, scorer: Side) {
        match scorer {
            Side::Left => self.score.0 += 1,
            Side::Right => self.score.1 += 1,
        }
        let name = &self.players[scorer.index()].name;
        self.stats.add_goal(name);
        debug!("Goal for {}, score {}-{}", name, self.score.0, self.score.1);
        self.ball.reset(self.arena.center());
    }

    fn kick_ball(&mut self) {
        for side in [Side::Left, Side::Right] {
            let player = &self.players[side.index()];
            let ball = &self.ball;
            if !circles_overlap(player.position, player.radius, ball.position, ball.radius) {
                continue;
            }

            let mut normal = self.ball.position.sub(&player.position).normalize();
            if normal == Vector2::ZERO {
                // Push toward the opponent's goal.
                normal = match side {
                    Side::Left => Vector2::new(1.0, 0.0),
                    Side::Right => Vector2::new(-1.0, 0.0),
                };
            }
            self.ball.velocity = normal.scale(KICK_SPEED);
            self.stats.add_touch(&player.name);
            break;
        }
    }

    /// Ends the match with `side` losing. Has no effect once the match ended.
    pub fn forfeit(&mut self, side: Side) {
        if self.phase != MatchPhase::Ended {
            self.finish(MatchResult::Forfeit { side }, Some(side.opponent()));
        }
    }

    /// Ends the match without a winner. Has no effect once the match ended.
    pub fn abandon(&mut self) {
        if self.phase != MatchPhase::Ended {
            self.finish(MatchResult::NoContest, None);
        }
    }

    fn finish(&mut self, result: MatchResult, winner: Option<Side>) {
        self.phase = MatchPhase::Ended;
        self.result = Some(result);
        self.winner = winner;

        let winner_name = winner.map(|side| self.players[side.index()].name.clone());
        info!(
            "Match {} vs {} ended {}-{} ({:?}), winner: {}",
            self.players[0].name,
            self.players[1].name,
            self.score.0,
            self.score.1,
            result,
            winner_name.as_deref().unwrap_or("none")
        );
        self.stats.set_winner(winner_name);
    }

    pub fn share_state(&self) -> ShareState {
        let [p1, p2] = &self.players;
        let [(dash_1, hook_1), (dash_2, hook_2)] = self.cooldowns;

        ShareState {
            remaining_time: (self.duration - self.elapsed).max(0.0),
            score_1: self.score.0,
            score_2: self.score.1,
            name_1: p1.name.clone(),
            name_2: p2.name.clone(),
            position_1: p1.position,
            position_2: p2.position,
            hook_tip_1: p1.hook_coords,
            hook_tip_2: p2.hook_coords,
            dash_cooldown_1: dash_1,
            hook_cooldown_1: hook_1,
            dash_cooldown_2: dash_2,
            hook_cooldown_2: hook_2,
            ball_position: self.ball.position,
            hooking_1: p1.hooking,
            hooking_2: p2.hooking,
            tiebreak: self.phase == MatchPhase::Tiebreak,
        }
    }

    /// `Some` once the match has ended.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        let result = self.result?;
        let [p1, p2] = &self.players;

        Some(MatchOutcome {
            names: (p1.name.clone(), p2.name.clone()),
            elos: (p1.elo, p2.elo),
            score: self.score,
            result,
            winner: self.winner,
            stats: self.stats.snapshot(),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_score(&mut self, score: (u32, u32)) {
        self.score = score;
    }

    #[cfg(test)]
    pub(crate) fn place_ball(&mut self, position: Vector2, velocity: Vector2) {
        self.ball.position = position;
        self.ball.velocity = velocity;
    }
}
