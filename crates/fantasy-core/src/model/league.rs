use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

pub const MIN_TIER: u8 = 1;
pub const MAX_TIER: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeagueType {
    Domestic,
    International,
    Cup,
    Friendly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    #[serde(default)]
    pub id: DbId,
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub league_type: LeagueType,
    pub tier: u8,
    pub is_active: bool,
    pub has_standings: bool,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLeague {
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub league_type: LeagueType,
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub has_standings: bool,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaguePatch {
    pub name: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub league_type: Option<LeagueType>,
    pub tier: Option<u8>,
    pub is_active: Option<bool>,
    pub has_standings: Option<bool>,
    pub logo_url: Option<String>,
}

fn default_tier() -> u8 {
    MIN_TIER
}

fn default_true() -> bool {
    true
}

impl League {
    pub fn new(input: NewLeague, now: Timestamp) -> Result<Self, ValidationErrors> {
        let league = League {
            id: 0,
            sportmonks_id: input.sportmonks_id,
            name: input.name,
            country: input.country,
            league_type: input.league_type,
            tier: input.tier,
            is_active: input.is_active,
            has_standings: input.has_standings,
            logo_url: input.logo_url,
            lifecycle: Lifecycle::new(now),
        };
        finalize(league, now)
    }
}

impl Entity for League {
    const NAME: &'static str = "League";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.name = self.name.trim().to_string();
    }

    fn validate(&self, _now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(id) = self.sportmonks_id {
            if id <= 0 {
                errors.push("sportmonksId", "Sportmonks ID must be a positive integer");
            }
        }
        errors.require_non_empty("name", &self.name, "League name is required");
        errors.require_range(
            "tier",
            self.tier,
            MIN_TIER,
            MAX_TIER,
            "Tier must be between 1 and 10",
        );
        errors.require_http_url(
            "logoUrl",
            self.logo_url.as_deref(),
            "Logo URL must be a valid http or https URL",
        );
        errors.into_result()
    }
}

impl Patch<League> for LeaguePatch {
    fn apply(self, l: &mut League) {
        if let Some(v) = self.name {
            l.name = v;
        }
        if self.country.is_some() {
            l.country = self.country;
        }
        if let Some(v) = self.league_type {
            l.league_type = v;
        }
        if let Some(v) = self.tier {
            l.tier = v;
        }
        if let Some(v) = self.is_active {
            l.is_active = v;
        }
        if let Some(v) = self.has_standings {
            l.has_standings = v;
        }
        if self.logo_url.is_some() {
            l.logo_url = self.logo_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn type_enum_uses_lowercase_names() {
        let input: NewLeague =
            serde_json::from_str(r#"{"name":"Premier League","type":"domestic"}"#).unwrap();
        let league = League::new(input, Utc::now()).unwrap();
        assert_eq!(league.league_type, LeagueType::Domestic);
        assert_eq!(league.tier, 1);
        assert!(league.is_active && league.has_standings);

        let bad = serde_json::from_str::<NewLeague>(r#"{"name":"X","type":"regional"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn tier_bounds() {
        let input: NewLeague =
            serde_json::from_str(r#"{"name":"Sunday League","type":"friendly","tier":11}"#)
                .unwrap();
        let err = League::new(input, Utc::now()).unwrap_err();
        assert!(err.has_message("Tier must be between 1 and 10"));
    }
}
