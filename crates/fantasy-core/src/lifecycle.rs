// Audit timestamps, soft-delete state, and the read visibility mode.
//
// An entity is Active while `deleted_at` is unset and SoftDeleted once it is
// stamped. Purging (hard delete) removes the row, so it has no in-memory
// representation.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Audit fields embedded in every stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Active,
    SoftDeleted,
}

impl Lifecycle {
    pub fn new(now: Timestamp) -> Self {
        Lifecycle {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    pub fn mark_deleted(&mut self, now: Timestamp) {
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    pub fn clear_deleted(&mut self, now: Timestamp) {
        self.deleted_at = None;
        self.updated_at = now;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_deleted() {
            LifecycleState::SoftDeleted
        } else {
            LifecycleState::Active
        }
    }
}

/// Which rows a read may return. Every read API takes one of these
/// explicitly; `Active` is the default everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only rows whose `deleted_at` is unset.
    #[default]
    Active,
    /// Active and soft-deleted rows.
    IncludeDeleted,
    /// Only soft-deleted rows.
    OnlyDeleted,
}

impl Visibility {
    /// SQL predicate on the `deleted_at` column, if any.
    pub(crate) fn predicate(self) -> Option<&'static str> {
        match self {
            Visibility::Active => Some("deleted_at IS NULL"),
            Visibility::IncludeDeleted => None,
            Visibility::OnlyDeleted => Some("deleted_at IS NOT NULL"),
        }
    }

    /// Whether a row in `state` is visible under this mode.
    pub fn admits(self, state: LifecycleState) -> bool {
        match self {
            Visibility::Active => state == LifecycleState::Active,
            Visibility::IncludeDeleted => true,
            Visibility::OnlyDeleted => state == LifecycleState::SoftDeleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn new_lifecycle_is_active() {
        let now = Utc::now();
        let lc = Lifecycle::new(now);
        assert_eq!(lc.state(), LifecycleState::Active);
        assert_eq!(lc.created_at, lc.updated_at);
    }

    #[test]
    fn mark_and_clear_deleted() {
        let now = Utc::now();
        let mut lc = Lifecycle::new(now);
        let later = now + Duration::minutes(5);

        lc.mark_deleted(later);
        assert_eq!(lc.state(), LifecycleState::SoftDeleted);
        assert_eq!(lc.deleted_at, Some(later));
        assert_eq!(lc.updated_at, later);

        lc.clear_deleted(later + Duration::minutes(1));
        assert_eq!(lc.state(), LifecycleState::Active);
    }

    #[test]
    fn visibility_admits() {
        use LifecycleState::*;
        assert!(Visibility::Active.admits(Active));
        assert!(!Visibility::Active.admits(SoftDeleted));
        assert!(Visibility::IncludeDeleted.admits(SoftDeleted));
        assert!(Visibility::OnlyDeleted.admits(SoftDeleted));
        assert!(!Visibility::OnlyDeleted.admits(Active));
    }

    #[test]
    fn visibility_defaults_to_active() {
        assert_eq!(Visibility::default(), Visibility::Active);
        assert_eq!(Visibility::Active.predicate(), Some("deleted_at IS NULL"));
        assert_eq!(Visibility::IncludeDeleted.predicate(), None);
    }
}
