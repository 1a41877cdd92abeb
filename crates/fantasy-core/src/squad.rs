// Fantasy squad manager: budget, size and captaincy rules.
//
// Every operation either succeeds with all invariants holding or fails with
// the team untouched. Checks run before any field is written.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BusinessRuleError;
use crate::model::{FantasyTeam, PlayerSelection, Position};
use crate::types::{DbId, Price, Timestamp};

pub const SQUAD_MAX: usize = 15;
pub const SQUAD_MIN: usize = 11;

/// Advisory per-position bounds `(position, min, max)`.
pub const POSITION_LIMITS: [(Position, usize, usize); 4] = [
    (Position::Goalkeeper, 1, 2),
    (Position::Defender, 3, 5),
    (Position::Midfielder, 3, 5),
    (Position::Forward, 1, 3),
];

impl FantasyTeam {
    /// Buy a player at `price`.
    ///
    /// Fails with `SquadFull`, then `InsufficientBudget`, then
    /// `DuplicatePlayer`, in that order.
    pub fn add_player(
        &mut self,
        player_id: DbId,
        price: Price,
        is_starting: bool,
        now: Timestamp,
    ) -> Result<(), BusinessRuleError> {
        if self.players.len() >= SQUAD_MAX {
            return Err(BusinessRuleError::SquadFull { max: SQUAD_MAX });
        }
        let remaining = self.remaining_budget.checked_sub(price).ok_or(
            BusinessRuleError::InsufficientBudget {
                price,
                remaining: self.remaining_budget,
            },
        )?;
        if self.contains(player_id) {
            return Err(BusinessRuleError::DuplicatePlayer { player_id });
        }

        self.players.push(PlayerSelection {
            player_id,
            purchase_price: price,
            is_captain: false,
            is_vice_captain: false,
            is_starting,
            added_at: now,
        });
        self.remaining_budget = remaining;
        self.total_value = self.total_value + price;
        debug!(
            "fantasy team {}: added player {} for {} ({} left)",
            self.id, player_id, price, self.remaining_budget
        );
        Ok(())
    }

    /// Sell a player, refunding the purchase price.
    pub fn remove_player(&mut self, player_id: DbId) -> Result<PlayerSelection, BusinessRuleError> {
        let idx = self
            .players
            .iter()
            .position(|s| s.player_id == player_id)
            .ok_or(BusinessRuleError::PlayerNotInSquad { player_id })?;

        let selection = self.players.remove(idx);
        self.remaining_budget = self.remaining_budget + selection.purchase_price;
        self.total_value = self.total_value.saturating_sub(selection.purchase_price);
        debug!(
            "fantasy team {}: removed player {} refunding {}",
            self.id, player_id, selection.purchase_price
        );
        Ok(selection)
    }

    /// Make `player_id` the only captain. A player absent from the squad is
    /// rejected rather than leaving the team without a captain.
    pub fn set_captain(&mut self, player_id: DbId) -> Result<(), BusinessRuleError> {
        if !self.contains(player_id) {
            return Err(BusinessRuleError::PlayerNotInSquad { player_id });
        }
        for s in &mut self.players {
            s.is_captain = s.player_id == player_id;
            if s.is_captain {
                s.is_vice_captain = false;
            }
        }
        Ok(())
    }

    /// Mirror of [`set_captain`](Self::set_captain) for the vice-captaincy.
    pub fn set_vice_captain(&mut self, player_id: DbId) -> Result<(), BusinessRuleError> {
        if !self.contains(player_id) {
            return Err(BusinessRuleError::PlayerNotInSquad { player_id });
        }
        for s in &mut self.players {
            s.is_vice_captain = s.player_id == player_id;
            if s.is_vice_captain {
                s.is_captain = false;
            }
        }
        Ok(())
    }
}

/// Per-position head count of a squad plus any advisory bound it breaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadComposition {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
    pub total: usize,
    pub violations: Vec<String>,
}

impl SquadComposition {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => self.goalkeepers,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }
}

/// Check squad shape against the advisory bounds. Never enforced on write;
/// callers decide what to do with the report.
pub fn check_composition(positions: &[Position]) -> SquadComposition {
    let tally = |pos: Position| positions.iter().filter(|&&p| p == pos).count();
    let mut report = SquadComposition {
        goalkeepers: tally(Position::Goalkeeper),
        defenders: tally(Position::Defender),
        midfielders: tally(Position::Midfielder),
        forwards: tally(Position::Forward),
        total: positions.len(),
        violations: Vec::new(),
    };

    for (pos, min, max) in POSITION_LIMITS {
        let n = report.count(pos);
        if n < min || n > max {
            report.violations.push(format!(
                "Squad must have between {min} and {max} {}s (has {n})",
                pos.as_str()
            ));
        }
    }
    if report.total < SQUAD_MIN || report.total > SQUAD_MAX {
        report.violations.push(format!(
            "Squad must have between {SQUAD_MIN} and {SQUAD_MAX} players (has {})",
            report.total
        ));
    }
    report
}
