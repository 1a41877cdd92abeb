// Season entity and its status/gameweek state machine.
//
// upcoming -> active -> completed, with cancelled reachable from either
// non-terminal state. Saves also apply date-driven transitions, which never
// override an explicit cancellation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{finalize, Entity, Patch};
use crate::error::BusinessRuleError;
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

pub const DEFAULT_TOTAL_GAMEWEEKS: u32 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonStatus {
    #[default]
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl SeasonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonStatus::Upcoming => "upcoming",
            SeasonStatus::Active => "active",
            SeasonStatus::Completed => "completed",
            SeasonStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SeasonStatus::Completed | SeasonStatus::Cancelled)
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    #[serde(default)]
    pub id: DbId,
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub league_id: DbId,
    pub name: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub total_gameweeks: u32,
    pub current_gameweek: u32,
    pub status: SeasonStatus,
    #[serde(default)]
    pub transfer_deadline: Option<Timestamp>,
    pub is_fantasy_active: bool,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeason {
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub league_id: DbId,
    pub name: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    #[serde(default = "default_total_gameweeks")]
    pub total_gameweeks: u32,
    #[serde(default)]
    pub transfer_deadline: Option<Timestamp>,
    #[serde(default)]
    pub is_fantasy_active: bool,
}

/// Editable season fields. Status and gameweek only move through the
/// transition methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPatch {
    pub name: Option<String>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub total_gameweeks: Option<u32>,
    pub is_fantasy_active: Option<bool>,
}

fn default_total_gameweeks() -> u32 {
    DEFAULT_TOTAL_GAMEWEEKS
}

impl Season {
    pub fn new(input: NewSeason, now: Timestamp) -> Result<Self, ValidationErrors> {
        let season = Season {
            id: 0,
            sportmonks_id: input.sportmonks_id,
            league_id: input.league_id,
            name: input.name,
            start_date: input.start_date,
            end_date: input.end_date,
            total_gameweeks: input.total_gameweeks,
            current_gameweek: 1,
            status: SeasonStatus::Upcoming,
            transfer_deadline: input.transfer_deadline,
            is_fantasy_active: input.is_fantasy_active,
            lifecycle: Lifecycle::new(now),
        };
        finalize(season, now)
    }

    fn illegal(&self, to: SeasonStatus) -> BusinessRuleError {
        BusinessRuleError::IllegalTransition {
            entity: "season",
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// upcoming -> active. Opens fantasy play.
    pub fn activate(&mut self) -> Result<(), BusinessRuleError> {
        if self.status != SeasonStatus::Upcoming {
            return Err(self.illegal(SeasonStatus::Active));
        }
        self.status = SeasonStatus::Active;
        self.is_fantasy_active = true;
        Ok(())
    }

    pub fn advance_gameweek(&mut self) -> Result<u32, BusinessRuleError> {
        if self.current_gameweek >= self.total_gameweeks {
            return Err(BusinessRuleError::GameweekOverflow {
                total: self.total_gameweeks,
            });
        }
        self.current_gameweek += 1;
        Ok(self.current_gameweek)
    }

    /// active -> completed. Closes fantasy play.
    pub fn complete(&mut self) -> Result<(), BusinessRuleError> {
        if self.status != SeasonStatus::Active {
            return Err(self.illegal(SeasonStatus::Completed));
        }
        self.status = SeasonStatus::Completed;
        self.is_fantasy_active = false;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), BusinessRuleError> {
        if self.status.is_terminal() {
            return Err(self.illegal(SeasonStatus::Cancelled));
        }
        self.status = SeasonStatus::Cancelled;
        self.is_fantasy_active = false;
        Ok(())
    }

    pub fn set_transfer_deadline(&mut self, deadline: Timestamp) -> Result<(), BusinessRuleError> {
        if deadline < self.start_date || deadline > self.end_date {
            return Err(BusinessRuleError::TransferDeadlineOutOfRange);
        }
        self.transfer_deadline = Some(deadline);
        Ok(())
    }

    /// Whether fantasy squads in this season may change at `now`.
    pub fn squad_changes_open(&self, now: Timestamp) -> bool {
        self.is_fantasy_active && self.transfer_deadline.is_none_or(|deadline| now <= deadline)
    }
}

impl Entity for Season {
    const NAME: &'static str = "Season";

    entity_accessors!();

    fn normalize(&mut self, now: Timestamp) {
        self.name = self.name.trim().to_string();
        match self.status {
            SeasonStatus::Upcoming if self.start_date <= now && now <= self.end_date => {
                debug!("season {} auto-activated", self.id);
                self.status = SeasonStatus::Active;
                self.is_fantasy_active = true;
            }
            SeasonStatus::Active if now > self.end_date => {
                debug!("season {} auto-completed", self.id);
                self.status = SeasonStatus::Completed;
                self.is_fantasy_active = false;
            }
            _ => {}
        }
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(id) = self.sportmonks_id {
            if id <= 0 {
                errors.push("sportmonksId", "Sportmonks ID must be a positive integer");
            }
        }
        errors.require_non_empty("name", &self.name, "Season name is required");
        if self.start_date >= self.end_date {
            errors.push("endDate", "End date must be after start date");
        }
        if self.total_gameweeks == 0 {
            errors.push("totalGameweeks", "Total gameweeks must be at least 1");
        } else {
            errors.require_range(
                "currentGameweek",
                self.current_gameweek,
                1,
                self.total_gameweeks,
                "Current gameweek must be between 1 and the total number of gameweeks",
            );
        }
        if let Some(deadline) = self.transfer_deadline {
            if deadline < self.start_date || deadline > self.end_date {
                errors.push(
                    "transferDeadline",
                    BusinessRuleError::TransferDeadlineOutOfRange.to_string(),
                );
            }
        }

        errors.into_result()
    }
}

impl Patch<Season> for SeasonPatch {
    fn apply(self, s: &mut Season) {
        if let Some(v) = self.name {
            s.name = v;
        }
        if let Some(v) = self.start_date {
            s.start_date = v;
        }
        if let Some(v) = self.end_date {
            s.end_date = v;
        }
        if let Some(v) = self.total_gameweeks {
            s.total_gameweeks = v;
        }
        if let Some(v) = self.is_fantasy_active {
            s.is_fantasy_active = v;
        }
    }
}
