// Per-(player, season) statistics. `fantasy` is always derived from
// `performance` on save and is never edited directly.

use serde::{Deserialize, Serialize};

use super::{finalize, Entity};
use crate::lifecycle::Lifecycle;
use crate::scoring;
use crate::types::{DbId, Price, Timestamp};
use crate::validation::ValidationErrors;

/// Raw counting stats for a season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceStats {
    pub appearances: u32,
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub clean_sheets: u32,
    pub goals_conceded: u32,
    pub saves: u32,
    pub penalties_saved: u32,
    pub penalties_missed: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub own_goals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FantasyStats {
    pub fantasy_points: f64,
    pub average_points: f64,
    pub points_per_minute: f64,
    pub current_price: Price,
    pub transfers_in: u32,
    pub transfers_out: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    #[serde(default)]
    pub id: DbId,
    pub player_id: DbId,
    pub season_id: DbId,
    #[serde(default)]
    pub performance: PerformanceStats,
    #[serde(default)]
    pub fantasy: FantasyStats,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl PlayerStats {
    pub fn new(
        player_id: DbId,
        season_id: DbId,
        performance: PerformanceStats,
        now: Timestamp,
    ) -> Result<Self, ValidationErrors> {
        let stats = PlayerStats {
            id: 0,
            player_id,
            season_id,
            performance,
            fantasy: FantasyStats::default(),
            lifecycle: Lifecycle::new(now),
        };
        finalize(stats, now)
    }
}

impl Entity for PlayerStats {
    const NAME: &'static str = "PlayerStats";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        scoring::refresh(&self.performance, &mut self.fantasy);
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.player_id <= 0 {
            errors.push("playerId", "Player reference is required");
        }
        if self.season_id <= 0 {
            errors.push("seasonId", "Season reference is required");
        }
        let p = &self.performance;
        if p.appearances == 0 && p.minutes_played > 0 {
            errors.push(
                "performance.minutesPlayed",
                "Minutes played requires at least one appearance",
            );
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn fantasy_block_is_derived_on_creation() {
        let perf = PerformanceStats {
            appearances: 1,
            minutes_played: 90,
            goals: 1,
            ..Default::default()
        };
        let stats = PlayerStats::new(7, 1, perf, Utc::now()).unwrap();
        assert_eq!(stats.fantasy.fantasy_points, 7.0);
    }

    #[test]
    fn stale_fantasy_points_are_overwritten() {
        let now = Utc::now();
        let mut stats = PlayerStats::new(7, 1, PerformanceStats::default(), now).unwrap();
        stats.fantasy.fantasy_points = 999.0;
        stats.normalize(now);
        assert_eq!(stats.fantasy.fantasy_points, 0.0);
    }

    #[test]
    fn missing_references_are_reported() {
        let err = PlayerStats::new(0, 0, PerformanceStats::default(), Utc::now()).unwrap_err();
        assert!(err.has_field("playerId"));
        assert!(err.has_field("seasonId"));
    }
}
