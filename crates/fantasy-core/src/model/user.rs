use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::{is_valid_email, is_valid_username, ValidationErrors};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: DbId,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: UserRole,
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub subscription_expires_at: Option<Timestamp>,
    #[serde(default)]
    pub favorite_team_id: Option<DbId>,
    pub total_points: i64,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub subscription_expires_at: Option<Timestamp>,
    #[serde(default)]
    pub favorite_team_id: Option<DbId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub subscription_tier: Option<SubscriptionTier>,
    /// `null` clears the expiry.
    #[serde(default, deserialize_with = "crate::types::double_option")]
    pub subscription_expires_at: Option<Option<Timestamp>>,
    pub favorite_team_id: Option<DbId>,
    pub total_points: Option<i64>,
}

impl User {
    pub fn new(input: NewUser, now: Timestamp) -> Result<Self, ValidationErrors> {
        let user = User {
            id: 0,
            email: input.email,
            username: input.username,
            display_name: input.display_name,
            role: input.role,
            subscription_tier: input.subscription_tier,
            subscription_expires_at: input.subscription_expires_at,
            favorite_team_id: input.favorite_team_id,
            total_points: 0,
            lifecycle: Lifecycle::new(now),
        };
        let mut errors = ValidationErrors::new();
        check_expiry(user.subscription_expires_at, now, &mut errors);
        match finalize(user, now) {
            Ok(user) => errors.into_result().map(|()| user),
            Err(rest) => {
                errors.merge(rest);
                Err(errors)
            }
        }
    }
}

/// A newly set expiry must be in the future. A stored expiry is allowed to
/// lapse, so this runs on create and on patches that set the field.
fn check_expiry(expires: Option<Timestamp>, now: Timestamp, errors: &mut ValidationErrors) {
    if let Some(expires) = expires {
        if expires <= now {
            errors.push(
                "subscriptionExpiresAt",
                "Subscription expiry date must be in the future",
            );
        }
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_string();
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !is_valid_email(&self.email) {
            errors.push("email", "Please provide a valid email address");
        }
        errors.require_range(
            "username",
            self.username.chars().count(),
            USERNAME_MIN_LEN,
            USERNAME_MAX_LEN,
            "Username must be between 3 and 30 characters",
        );
        if !is_valid_username(&self.username) {
            errors.push(
                "username",
                "Username can only contain letters, numbers, and underscores",
            );
        }
        if self.total_points < 0 {
            errors.push("totalPoints", "Total points cannot be negative");
        }

        errors.into_result()
    }
}

impl Patch<User> for UserPatch {
    fn check(&self, now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_expiry(self.subscription_expires_at.flatten(), now, &mut errors);
        errors.into_result()
    }

    fn apply(self, u: &mut User) {
        if let Some(v) = self.email {
            u.email = v;
        }
        if let Some(v) = self.username {
            u.username = v;
        }
        if self.display_name.is_some() {
            u.display_name = self.display_name;
        }
        if let Some(v) = self.role {
            u.role = v;
        }
        if let Some(v) = self.subscription_tier {
            u.subscription_tier = v;
        }
        if let Some(v) = self.subscription_expires_at {
            u.subscription_expires_at = v;
        }
        if self.favorite_team_id.is_some() {
            u.favorite_team_id = self.favorite_team_id;
        }
        if let Some(v) = self.total_points {
            u.total_points = v;
        }
    }
}
