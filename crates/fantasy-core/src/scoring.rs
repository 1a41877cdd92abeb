// Fantasy points calculator.
//
// Points are a pure function of a performance snapshot. Every stat
// correction recomputes from scratch; nothing is accumulated incrementally.

use crate::model::{FantasyStats, PerformanceStats};

/// Per-event weights in half points, so saves (0.5 each) stay integral.
const APPEARANCE: i64 = 2;
const GOAL: i64 = 8;
const ASSIST: i64 = 6;
const CLEAN_SHEET: i64 = 8;
const SAVE: i64 = 1;
const PENALTY_SAVED: i64 = 10;
const PENALTY_MISSED: i64 = -4;
const YELLOW_CARD: i64 = -2;
const RED_CARD: i64 = -6;
const OWN_GOAL: i64 = -4;
const FULL_MATCH_BONUS: i64 = 4;
const PART_MATCH_BONUS: i64 = 2;

/// Minutes needed for the full playing-time bonus.
pub const FULL_MATCH_MINUTES: u32 = 60;

/// Total fantasy points for a snapshot, floored at zero.
///
/// Goals score a flat 4 regardless of position.
pub fn compute_points(p: &PerformanceStats) -> f64 {
    let minutes_bonus = if p.minutes_played >= FULL_MATCH_MINUTES {
        FULL_MATCH_BONUS
    } else if p.minutes_played >= 1 {
        PART_MATCH_BONUS
    } else {
        0
    };

    let half_points = i64::from(p.appearances) * APPEARANCE
        + i64::from(p.goals) * GOAL
        + i64::from(p.assists) * ASSIST
        + i64::from(p.clean_sheets) * CLEAN_SHEET
        + i64::from(p.saves) * SAVE
        + i64::from(p.penalties_saved) * PENALTY_SAVED
        + i64::from(p.penalties_missed) * PENALTY_MISSED
        + i64::from(p.yellow_cards) * YELLOW_CARD
        + i64::from(p.red_cards) * RED_CARD
        + i64::from(p.own_goals) * OWN_GOAL
        + minutes_bonus;

    half_points.max(0) as f64 / 2.0
}

/// Recompute the derived fields of `fantasy` from `performance`. Transfer
/// counters and price are left alone.
pub fn refresh(performance: &PerformanceStats, fantasy: &mut FantasyStats) {
    let points = compute_points(performance);
    fantasy.fantasy_points = points;
    fantasy.average_points = if performance.appearances > 0 {
        points / f64::from(performance.appearances)
    } else {
        0.0
    };
    fantasy.points_per_minute = if performance.minutes_played > 0 {
        points / f64::from(performance.minutes_played)
    } else {
        0.0
    };
}
