// Domain entities. Each aggregate root is stored as one document; embedded
// value types (scores, selections, stat blocks) live inside their parent.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

/// Id and lifecycle accessors shared by every `Entity` impl.
macro_rules! entity_accessors {
    () => {
        fn id(&self) -> $crate::types::DbId {
            self.id
        }

        fn set_id(&mut self, id: $crate::types::DbId) {
            self.id = id;
        }

        fn lifecycle(&self) -> &$crate::lifecycle::Lifecycle {
            &self.lifecycle
        }

        fn lifecycle_mut(&mut self) -> &mut $crate::lifecycle::Lifecycle {
            &mut self.lifecycle
        }
    };
}

pub mod fantasy_team;
pub mod fixture;
pub mod league;
pub mod player;
pub mod player_stats;
pub mod season;
pub mod team;
pub mod user;

pub use fantasy_team::{FantasyTeam, FantasyTeamPatch, NewFantasyTeam, PlayerSelection};
pub use fixture::{Match, MatchPatch, MatchResult, MatchStatus, NewMatch, TeamScore};
pub use league::{League, LeaguePatch, LeagueType, NewLeague};
pub use player::{NewPlayer, Player, PlayerPatch, Position};
pub use player_stats::{FantasyStats, PerformanceStats, PlayerStats};
pub use season::{NewSeason, Season, SeasonPatch, SeasonStatus};
pub use team::{NewTeam, Team, TeamPatch};
pub use user::{NewUser, SubscriptionTier, User, UserPatch, UserRole};

/// A stored aggregate root.
///
/// The save path always runs `normalize` then `validate`, on creation and on
/// every update, so defaults and automatic transitions are applied before the
/// rules are checked.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send {
    /// Human-readable entity name used in errors and logs.
    const NAME: &'static str;

    fn id(&self) -> DbId;
    fn set_id(&mut self, id: DbId);
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Derive defaults and apply automatic transitions.
    fn normalize(&mut self, _now: Timestamp) {}

    /// Check every field rule, reporting all violations.
    fn validate(&self, now: Timestamp) -> Result<(), ValidationErrors>;

    /// Extra state changes that accompany a soft delete.
    fn on_soft_delete(&mut self) {}
}

/// A partial update. Applied to a copy of the stored entity, which is then
/// normalized and re-validated as a whole.
pub trait Patch<T> {
    /// Rules on the incoming values themselves, checked before the merge.
    fn check(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        Ok(())
    }

    fn apply(self, target: &mut T);
}

/// Build an entity through the same normalize/validate path the store uses.
pub(crate) fn finalize<T: Entity>(mut entity: T, now: Timestamp) -> Result<T, ValidationErrors> {
    entity.normalize(now);
    entity.validate(now)?;
    Ok(entity)
}
