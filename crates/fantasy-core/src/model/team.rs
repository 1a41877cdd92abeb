// Club entity. `is_active` is a visibility flag independent of soft delete;
// a soft delete always clears it, but an inactive team is not deleted.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::{is_upper_alphanumeric, ValidationErrors};

pub const SHORT_CODE_MAX_LEN: usize = 10;
pub const EARLIEST_FOUNDED_YEAR: i32 = 1800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: DbId,
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub name: String,
    pub short_code: String,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub league_id: Option<DbId>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub is_active: bool,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    #[serde(default)]
    pub sportmonks_id: Option<i64>,
    pub name: String,
    pub short_code: String,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub league_id: Option<DbId>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPatch {
    pub sportmonks_id: Option<i64>,
    pub name: Option<String>,
    pub short_code: Option<String>,
    pub founded_year: Option<i32>,
    pub league_id: Option<DbId>,
    pub country: Option<String>,
    pub venue: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: Option<bool>,
}

impl Team {
    pub fn new(input: NewTeam, now: Timestamp) -> Result<Self, ValidationErrors> {
        let team = Team {
            id: 0,
            sportmonks_id: input.sportmonks_id,
            name: input.name,
            short_code: input.short_code,
            founded_year: input.founded_year,
            league_id: input.league_id,
            country: input.country,
            venue: input.venue,
            logo_url: input.logo_url,
            is_active: true,
            lifecycle: Lifecycle::new(now),
        };
        finalize(team, now)
    }

    /// Restore a soft-deleted team and mark it active again.
    pub fn activate(&mut self, now: Timestamp) {
        self.lifecycle.clear_deleted(now);
        self.is_active = true;
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.name = self.name.trim().to_string();
        self.short_code = self.short_code.trim().to_uppercase();
    }

    fn validate(&self, now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(id) = self.sportmonks_id {
            if id <= 0 {
                errors.push("sportmonksId", "Sportmonks ID must be a positive integer");
            }
        }
        errors.require_non_empty("name", &self.name, "Team name is required");

        if self.short_code.is_empty() {
            errors.push("shortCode", "Short code is required");
        } else {
            errors.require_max_len(
                "shortCode",
                &self.short_code,
                SHORT_CODE_MAX_LEN,
                "Short code cannot exceed 10 characters",
            );
            if !is_upper_alphanumeric(&self.short_code) {
                errors.push(
                    "shortCode",
                    "Short code must contain only uppercase letters and numbers",
                );
            }
        }

        errors.require_range_opt(
            "foundedYear",
            self.founded_year,
            EARLIEST_FOUNDED_YEAR,
            now.year(),
            "Founded year must be between 1800 and the current year",
        );
        errors.require_http_url(
            "logoUrl",
            self.logo_url.as_deref(),
            "Logo URL must be a valid http or https URL",
        );

        errors.into_result()
    }

    fn on_soft_delete(&mut self) {
        self.is_active = false;
    }
}

impl Patch<Team> for TeamPatch {
    fn apply(self, t: &mut Team) {
        if self.sportmonks_id.is_some() {
            t.sportmonks_id = self.sportmonks_id;
        }
        if let Some(v) = self.name {
            t.name = v;
        }
        if let Some(v) = self.short_code {
            t.short_code = v;
        }
        if self.founded_year.is_some() {
            t.founded_year = self.founded_year;
        }
        if self.league_id.is_some() {
            t.league_id = self.league_id;
        }
        if self.country.is_some() {
            t.country = self.country;
        }
        if self.venue.is_some() {
            t.venue = self.venue;
        }
        if self.logo_url.is_some() {
            t.logo_url = self.logo_url;
        }
        if let Some(v) = self.is_active {
            t.is_active = v;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn new_team(sportmonks_id: i64, short_code: &str) -> NewTeam {
        NewTeam {
            sportmonks_id: Some(sportmonks_id),
            name: "Manchester United".into(),
            short_code: short_code.into(),
            founded_year: Some(1878),
            league_id: None,
            country: Some("England".into()),
            venue: Some("Old Trafford".into()),
            logo_url: None,
        }
    }

    #[test]
    fn short_code_is_uppercased() {
        let team = Team::new(new_team(1, " mun "), Utc::now()).unwrap();
        assert_eq!(team.short_code, "MUN");
        assert!(team.is_active);
    }

    #[test]
    fn short_code_rules() {
        let err = Team::new(new_team(1, "ABCDEFGHIJK"), Utc::now()).unwrap_err();
        assert!(err.has_message("Short code cannot exceed 10 characters"));

        let err = Team::new(new_team(1, "MU-N"), Utc::now()).unwrap_err();
        assert!(err.has_message("Short code must contain only uppercase letters and numbers"));
    }

    #[test]
    fn founded_year_bounds() {
        let now = Utc::now();
        let ok = NewTeam {
            founded_year: Some(now.year()),
            ..new_team(1, "MUN")
        };
        assert!(Team::new(ok, now).is_ok());

        for year in [1799, now.year() + 1] {
            let bad = NewTeam {
                founded_year: Some(year),
                ..new_team(1, "MUN")
            };
            assert!(Team::new(bad, now).unwrap_err().has_field("foundedYear"));
        }
    }

    #[test]
    fn soft_delete_hook_and_activate() {
        let now = Utc::now();
        let mut team = Team::new(new_team(1, "MUN"), now).unwrap();
        team.lifecycle.mark_deleted(now);
        team.on_soft_delete();
        assert!(!team.is_active);

        team.activate(now);
        assert!(team.is_active);
        assert!(!team.lifecycle.is_deleted());
    }

    #[test]
    fn inactive_does_not_imply_deleted() {
        let now = Utc::now();
        let mut team = Team::new(new_team(1, "MUN"), now).unwrap();
        TeamPatch {
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut team);
        assert!(!team.is_active);
        assert!(!team.lifecycle.is_deleted());
    }
}
