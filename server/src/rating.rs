//! Rating updates applied after a decided 1v1 match.

/// Computes new ratings for both players of a finished match.
pub trait RatingSystem: Send + Sync {
    ///Returns the new `(player_1, player_2)` ratings.
    fn rate(&self, player_1: i32, player_2: i32, player_1_won: bool) -> (i32, i32);
}

/// Zero-sum Elo variant: the winner gains exactly what the loser drops.
///
/// The exchanged amount is `40 + |diff| / 50 + ln(|diff| + 1e-5)`, truncated
/// toward zero, so an upset is rewarded the same as an expected win.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultElo;

impl DefaultElo {
    const BASELINE: f64 = 40.0;
    const SCALING: f64 = 1.0 / 50.0;
    const STABILITY: f64 = 0.00001;

    pub fn delta(player_1: i32, player_2: i32) -> i32 {
        let diff = (player_1 as f64 - player_2 as f64).abs();
        (Self::BASELINE + diff * Self::SCALING + (diff + Self::STABILITY).ln()).trunc() as i32
    }
}

impl RatingSystem for DefaultElo {
    fn rate(&self, player_1: i32, player_2: i32, player_1_won: bool) -> (i32, i32) {
        let delta = Self::delta(player_1, player_2);
        if player_1_won {
            (player_1 + delta, player_2 - delta)
        } else {
            (player_1 - delta, player_2 + delta)
        }
    }
}
