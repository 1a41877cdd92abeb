// A manager's fantasy squad for one season. The selection list is owned
// exclusively by this aggregate; squad operations live in `crate::squad`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::lifecycle::Lifecycle;
use crate::squad::SQUAD_MAX;
use crate::types::{DbId, Price, Timestamp};
use crate::validation::ValidationErrors;

pub const NAME_MAX_LEN: usize = 50;

/// A player held in a fantasy squad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSelection {
    pub player_id: DbId,
    pub purchase_price: Price,
    pub is_captain: bool,
    pub is_vice_captain: bool,
    pub is_starting: bool,
    pub added_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FantasyTeam {
    #[serde(default)]
    pub id: DbId,
    pub user_id: DbId,
    pub season_id: DbId,
    pub name: String,
    pub budget: Price,
    pub remaining_budget: Price,
    pub total_value: Price,
    #[serde(default)]
    pub players: Vec<PlayerSelection>,
    pub total_points: f64,
    pub gameweek_points: f64,
    pub transfers_made: u32,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFantasyTeam {
    pub user_id: DbId,
    pub season_id: DbId,
    pub name: String,
    /// Falls back to the configured initial budget when omitted.
    #[serde(default)]
    pub budget: Option<Price>,
}

/// Only the name is editable; the squad changes through `crate::squad`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FantasyTeamPatch {
    pub name: Option<String>,
}

impl Patch<FantasyTeam> for FantasyTeamPatch {
    fn apply(self, t: &mut FantasyTeam) {
        if let Some(v) = self.name {
            t.name = v;
        }
    }
}

impl FantasyTeam {
    pub fn new(
        input: NewFantasyTeam,
        default_budget: Price,
        now: Timestamp,
    ) -> Result<Self, ValidationErrors> {
        let budget = input.budget.unwrap_or(default_budget);
        let team = FantasyTeam {
            id: 0,
            user_id: input.user_id,
            season_id: input.season_id,
            name: input.name,
            budget,
            remaining_budget: budget,
            total_value: Price::ZERO,
            players: Vec::new(),
            total_points: 0.0,
            gameweek_points: 0.0,
            transfers_made: 0,
            lifecycle: Lifecycle::new(now),
        };
        finalize(team, now)
    }

    pub fn selection(&self, player_id: DbId) -> Option<&PlayerSelection> {
        self.players.iter().find(|s| s.player_id == player_id)
    }

    pub fn contains(&self, player_id: DbId) -> bool {
        self.selection(player_id).is_some()
    }

    pub fn captain(&self) -> Option<&PlayerSelection> {
        self.players.iter().find(|s| s.is_captain)
    }

    pub fn vice_captain(&self) -> Option<&PlayerSelection> {
        self.players.iter().find(|s| s.is_vice_captain)
    }

    pub fn starters(&self) -> impl Iterator<Item = &PlayerSelection> {
        self.players.iter().filter(|s| s.is_starting)
    }

    pub fn bench(&self) -> impl Iterator<Item = &PlayerSelection> {
        self.players.iter().filter(|s| !s.is_starting)
    }

    /// Sum of purchase prices of the current selections.
    pub fn squad_value(&self) -> Price {
        self.players.iter().map(|s| s.purchase_price).sum()
    }
}

impl Entity for FantasyTeam {
    const NAME: &'static str = "FantasyTeam";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.name = self.name.trim().to_string();
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require_non_empty("name", &self.name, "Team name is required");
        errors.require_max_len(
            "name",
            &self.name,
            NAME_MAX_LEN,
            "Team name cannot exceed 50 characters",
        );

        if self.players.len() > SQUAD_MAX {
            errors.push("players", "Squad cannot exceed 15 players");
        }

        let value = self.squad_value();
        if self.total_value != value {
            errors.push("totalValue", "Total value must equal the sum of purchase prices");
        }
        if self.budget.checked_sub(value) != Some(self.remaining_budget) {
            errors.push(
                "remainingBudget",
                "Remaining budget must equal budget minus the squad value and cannot be negative",
            );
        }

        if self.players.iter().filter(|s| s.is_captain).count() > 1 {
            errors.push("players", "Only one captain is allowed");
        }
        if self.players.iter().filter(|s| s.is_vice_captain).count() > 1 {
            errors.push("players", "Only one vice-captain is allowed");
        }
        if self.players.iter().any(|s| s.is_captain && s.is_vice_captain) {
            errors.push("players", "A player cannot be both captain and vice-captain");
        }

        let mut seen = HashSet::new();
        if !self.players.iter().all(|s| seen.insert(s.player_id)) {
            errors.push("players", "Squad cannot contain the same player twice");
        }

        if self.total_points < 0.0 {
            errors.push("totalPoints", "Total points cannot be negative");
        }

        errors.into_result()
    }
}
