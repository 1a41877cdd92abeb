// Match entity: two clubs, an embedded score per side, and a status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::error::BusinessRuleError;
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Halftime,
    Finished,
    Postponed,
    Cancelled,
    Suspended,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Halftime => "halftime",
            MatchStatus::Finished => "finished",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
            MatchStatus::Suspended => "suspended",
        }
    }

    /// Whether `self -> to` is a legal edge.
    pub fn can_transition_to(self, to: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!(
            (self, to),
            (Scheduled, Live | Postponed | Cancelled)
                | (Live, Halftime | Finished | Suspended | Cancelled)
                | (Halftime, Live | Finished | Suspended | Cancelled)
                | (Suspended, Live | Cancelled)
                | (Postponed, Scheduled | Cancelled)
        )
    }

    /// Statuses in which the score may still change.
    pub fn is_in_play(self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::Halftime | MatchStatus::Suspended)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    HomeWin,
    AwayWin,
    Draw,
}

/// One side's score line. Counting fields are unsigned, so only possession
/// needs a range check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamScore {
    pub goals: u32,
    pub shots: Option<u32>,
    pub shots_on_target: Option<u32>,
    pub corners: Option<u32>,
    pub yellow_cards: Option<u32>,
    pub red_cards: Option<u32>,
    pub possession: Option<f64>,
}

impl TeamScore {
    pub fn goals(goals: u32) -> Self {
        TeamScore {
            goals,
            ..Default::default()
        }
    }

    fn validate_into(&self, side: &str, errors: &mut ValidationErrors) {
        errors.require_range_opt(
            &format!("{side}.possession"),
            self.possession,
            0.0,
            100.0,
            "Possession must be between 0 and 100",
        );
        if let (Some(shots), Some(on_target)) = (self.shots, self.shots_on_target) {
            if on_target > shots {
                errors.push(
                    &format!("{side}.shotsOnTarget"),
                    "Shots on target cannot exceed total shots",
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(default)]
    pub id: DbId,
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub season_id: DbId,
    pub league_id: DbId,
    pub home_team_id: DbId,
    pub away_team_id: DbId,
    pub gameweek: u32,
    pub kickoff_at: Timestamp,
    pub status: MatchStatus,
    #[serde(default)]
    pub home_score: TeamScore,
    #[serde(default)]
    pub away_score: TeamScore,
    #[serde(default)]
    pub result: Option<MatchResult>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatch {
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub season_id: DbId,
    pub league_id: DbId,
    pub home_team_id: DbId,
    pub away_team_id: DbId,
    pub gameweek: u32,
    pub kickoff_at: Timestamp,
    #[serde(default)]
    pub venue: Option<String>,
}

/// Scheduling fields only; status and score have their own operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPatch {
    pub gameweek: Option<u32>,
    pub kickoff_at: Option<Timestamp>,
    pub venue: Option<String>,
}

impl Match {
    pub fn new(input: NewMatch, now: Timestamp) -> Result<Self, ValidationErrors> {
        let m = Match {
            id: 0,
            sportmonks_id: input.sportmonks_id,
            season_id: input.season_id,
            league_id: input.league_id,
            home_team_id: input.home_team_id,
            away_team_id: input.away_team_id,
            gameweek: input.gameweek,
            kickoff_at: input.kickoff_at,
            status: MatchStatus::Scheduled,
            home_score: TeamScore::default(),
            away_score: TeamScore::default(),
            result: None,
            venue: input.venue,
            lifecycle: Lifecycle::new(now),
        };
        finalize(m, now)
    }

    pub fn transition(&mut self, to: MatchStatus) -> Result<(), BusinessRuleError> {
        if !self.status.can_transition_to(to) {
            return Err(BusinessRuleError::IllegalTransition {
                entity: "match",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Replace both score lines. Only allowed while the match is in play or
    /// as a correction once finished.
    pub fn update_score(&mut self, home: TeamScore, away: TeamScore) -> Result<(), BusinessRuleError> {
        if !(self.status.is_in_play() || self.status == MatchStatus::Finished) {
            return Err(BusinessRuleError::IllegalTransition {
                entity: "match",
                from: self.status.to_string(),
                to: "scored".to_string(),
            });
        }
        self.home_score = home;
        self.away_score = away;
        Ok(())
    }

    /// Result implied by the current goals.
    pub fn score_result(&self) -> MatchResult {
        use std::cmp::Ordering;
        match self.home_score.goals.cmp(&self.away_score.goals) {
            Ordering::Greater => MatchResult::HomeWin,
            Ordering::Less => MatchResult::AwayWin,
            Ordering::Equal => MatchResult::Draw,
        }
    }
}

impl Entity for Match {
    const NAME: &'static str = "Match";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.result = (self.status == MatchStatus::Finished).then(|| self.score_result());
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.home_team_id == self.away_team_id {
            errors.push("awayTeamId", "Home and away teams must be different");
        }
        if self.gameweek == 0 {
            errors.push("gameweek", "Gameweek must be at least 1");
        }
        self.home_score.validate_into("homeScore", &mut errors);
        self.away_score.validate_into("awayScore", &mut errors);
        errors.into_result()
    }
}

impl Patch<Match> for MatchPatch {
    fn apply(self, m: &mut Match) {
        if let Some(v) = self.gameweek {
            m.gameweek = v;
        }
        if let Some(v) = self.kickoff_at {
            m.kickoff_at = v;
        }
        if self.venue.is_some() {
            m.venue = self.venue;
        }
    }
}
