// Error taxonomy shared by the validators, rule engines and the store.

use thiserror::Error;

use crate::types::{DbId, Price};
use crate::validation::ValidationErrors;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A unique key (sportmonks id, email, user+season, ...) is already taken,
    /// including by a soft-deleted row.
    #[error("Duplicate key: {entity} with the same {field} already exists")]
    Conflict { entity: &'static str, field: String },

    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Violations of squad, season and match rules. These never leave partial
/// state behind: the aggregate is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessRuleError {
    #[error("Squad is full (maximum {max} players)")]
    SquadFull { max: usize },

    #[error("Insufficient budget: {price} exceeds remaining budget of {remaining}")]
    InsufficientBudget { price: Price, remaining: Price },

    #[error("Player {player_id} is already in the squad")]
    DuplicatePlayer { player_id: DbId },

    #[error("Player {player_id} not found in squad")]
    PlayerNotInSquad { player_id: DbId },

    #[error("Illegal {entity} status transition from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Cannot advance beyond the final gameweek ({total})")]
    GameweekOverflow { total: u32 },

    #[error("Transfer deadline must be between the season start and end dates")]
    TransferDeadlineOutOfRange,

    #[error("Transfer window is closed for season {season_id}")]
    TransferWindowClosed { season_id: DbId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_messages_are_stable() {
        assert_eq!(
            BusinessRuleError::SquadFull { max: 15 }.to_string(),
            "Squad is full (maximum 15 players)"
        );
        assert_eq!(
            BusinessRuleError::InsufficientBudget {
                price: Price(95),
                remaining: Price(40)
            }
            .to_string(),
            "Insufficient budget: £9.5m exceeds remaining budget of £4.0m"
        );
        assert_eq!(
            BusinessRuleError::GameweekOverflow { total: 38 }.to_string(),
            "Cannot advance beyond the final gameweek (38)"
        );
    }

    #[test]
    fn business_rule_converts_transparently() {
        let err: Error = BusinessRuleError::PlayerNotInSquad { player_id: 7 }.into();
        assert_eq!(err.to_string(), "Player 7 not found in squad");
    }

    #[test]
    fn not_found_formats_entity_and_id() {
        assert_eq!(Error::not_found("Player", 42).to_string(), "Player not found: 42");
    }
}
