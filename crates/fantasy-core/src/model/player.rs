// Player entity and its validation rules.

use std::fmt;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{finalize, Entity, Patch};
use crate::lifecycle::Lifecycle;
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

pub const MIN_PLAYER_AGE_YEARS: u32 = 15;
pub const MIN_HEIGHT_CM: i32 = 100;
pub const MAX_HEIGHT_CM: i32 = 250;
pub const MIN_WEIGHT_KG: i32 = 30;
pub const MAX_WEIGHT_KG: i32 = 200;

/// Playing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(alias = "GK", alias = "goalkeeper")]
    Goalkeeper,
    #[serde(alias = "DEF", alias = "defender")]
    Defender,
    #[serde(alias = "MID", alias = "midfielder")]
    Midfielder,
    #[serde(alias = "FWD", alias = "forward")]
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse a position name or abbreviation, case-insensitively.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GOALKEEPER" | "GK" | "G" => Some(Position::Goalkeeper),
            "DEFENDER" | "DEF" | "D" => Some(Position::Defender),
            "MIDFIELDER" | "MID" | "M" => Some(Position::Midfielder),
            "FORWARD" | "FWD" | "F" | "ATTACKER" => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "Goalkeeper",
            Position::Defender => "Defender",
            Position::Midfielder => "Midfielder",
            Position::Forward => "Forward",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub id: DbId,
    /// External sports-data key. Unique across live and soft-deleted rows.
    pub sportmonks_id: i64,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub date_of_birth: NaiveDate,
    pub position: Position,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub weight: Option<i32>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Current club, by reference only.
    #[serde(default)]
    pub team_id: Option<DbId>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

/// Creation payload. `name` and `displayName` are derived when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub sportmonks_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub position: Position,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub weight: Option<i32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub team_id: Option<DbId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub sportmonks_id: Option<i64>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub position: Option<Position>,
    pub nationality: Option<String>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
    pub image_url: Option<String>,
    pub team_id: Option<DbId>,
}

impl Player {
    /// Validated constructor: derives defaults, stamps timestamps, and
    /// rejects the payload with every violated rule.
    pub fn new(input: NewPlayer, now: Timestamp) -> Result<Self, ValidationErrors> {
        let player = Player {
            id: 0,
            sportmonks_id: input.sportmonks_id,
            name: input.name.unwrap_or_default(),
            first_name: input.first_name,
            last_name: input.last_name,
            display_name: input.display_name.unwrap_or_default(),
            date_of_birth: input.date_of_birth,
            position: input.position,
            nationality: input.nationality,
            height: input.height,
            weight: input.weight,
            image_url: input.image_url,
            team_id: input.team_id,
            lifecycle: Lifecycle::new(now),
        };
        finalize(player, now)
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.date_of_birth).unwrap_or(0)
    }
}

/// `"{firstInitial}. {lastName}"`, or just the last name when there is no
/// first name to take an initial from.
pub fn derive_display_name(first_name: &str, last_name: &str) -> String {
    match first_name.trim().chars().next() {
        Some(initial) => format!("{initial}. {}", last_name.trim()),
        None => last_name.trim().to_string(),
    }
}

fn earliest_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Whether someone born on `dob` has turned `MIN_PLAYER_AGE_YEARS` by `today`.
fn is_old_enough(dob: NaiveDate, today: NaiveDate) -> bool {
    dob.checked_add_months(Months::new(MIN_PLAYER_AGE_YEARS * 12))
        .is_some_and(|birthday| birthday <= today)
}

impl Entity for Player {
    const NAME: &'static str = "Player";

    entity_accessors!();

    fn normalize(&mut self, _now: Timestamp) {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            self.name = format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string();
        }
        if self.display_name.trim().is_empty() {
            self.display_name = derive_display_name(&self.first_name, &self.last_name);
        }
    }

    fn validate(&self, now: Timestamp) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let today = now.date_naive();

        if self.sportmonks_id <= 0 {
            errors.push("sportmonksId", "Sportmonks ID must be a positive integer");
        }
        errors.require_non_empty("name", &self.name, "Player name is required");
        errors.require_non_empty("firstName", &self.first_name, "First name is required");
        errors.require_non_empty("lastName", &self.last_name, "Last name is required");

        if self.date_of_birth < earliest_birth_date() {
            errors.push("dateOfBirth", "Date of birth cannot be before 1950-01-01");
        }
        if !is_old_enough(self.date_of_birth, today) {
            errors.push("dateOfBirth", "Player must be at least 15 years old");
        }

        errors.require_range_opt(
            "height",
            self.height,
            MIN_HEIGHT_CM,
            MAX_HEIGHT_CM,
            "Height must be between 100cm and 250cm",
        );
        errors.require_range_opt(
            "weight",
            self.weight,
            MIN_WEIGHT_KG,
            MAX_WEIGHT_KG,
            "Weight must be between 30kg and 200kg",
        );
        errors.require_http_url(
            "imageUrl",
            self.image_url.as_deref(),
            "Image URL must be a valid http or https URL",
        );

        errors.into_result()
    }
}

impl Patch<Player> for PlayerPatch {
    fn apply(self, p: &mut Player) {
        if let Some(v) = self.sportmonks_id {
            p.sportmonks_id = v;
        }
        if let Some(v) = self.name {
            p.name = v;
        }
        if let Some(v) = self.first_name {
            p.first_name = v;
        }
        if let Some(v) = self.last_name {
            p.last_name = v;
        }
        if let Some(v) = self.display_name {
            p.display_name = v;
        }
        if let Some(v) = self.date_of_birth {
            p.date_of_birth = v;
        }
        if let Some(v) = self.position {
            p.position = v;
        }
        if self.nationality.is_some() {
            p.nationality = self.nationality;
        }
        if self.height.is_some() {
            p.height = self.height;
        }
        if self.weight.is_some() {
            p.weight = self.weight;
        }
        if self.image_url.is_some() {
            p.image_url = self.image_url;
        }
        if self.team_id.is_some() {
            p.team_id = self.team_id;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn new_player(sportmonks_id: i64) -> NewPlayer {
        NewPlayer {
            sportmonks_id,
            name: None,
            first_name: "Cristiano".into(),
            last_name: "Ronaldo".into(),
            display_name: None,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 2, 5).unwrap(),
            position: Position::Forward,
            nationality: Some("Portugal".into()),
            height: Some(187),
            weight: Some(83),
            image_url: None,
            team_id: None,
        }
    }

    fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn derives_display_name_and_full_name() {
        let player = Player::new(new_player(1), fixed_now()).unwrap();
        assert_eq!(player.display_name, "C. Ronaldo");
        assert_eq!(player.name, "Cristiano Ronaldo");
    }

    #[test]
    fn keeps_explicit_display_name() {
        let input = NewPlayer {
            display_name: Some("CR7".into()),
            ..new_player(1)
        };
        let player = Player::new(input, fixed_now()).unwrap();
        assert_eq!(player.display_name, "CR7");
    }

    #[test]
    fn height_boundaries() {
        for (height, ok) in [(100, true), (99, false), (250, true), (251, false)] {
            let input = NewPlayer {
                height: Some(height),
                ..new_player(1)
            };
            match Player::new(input, fixed_now()) {
                Ok(_) => assert!(ok, "height {height} should be rejected"),
                Err(e) => {
                    assert!(!ok, "height {height} should be accepted");
                    assert!(e.has_message("Height must be between 100cm and 250cm"));
                }
            }
        }
    }

    #[test]
    fn weight_boundaries() {
        let ok = NewPlayer {
            weight: Some(30),
            ..new_player(1)
        };
        assert!(Player::new(ok, fixed_now()).is_ok());
        let bad = NewPlayer {
            weight: Some(201),
            ..new_player(1)
        };
        let err = Player::new(bad, fixed_now()).unwrap_err();
        assert!(err.has_message("Weight must be between 30kg and 200kg"));
    }

    #[test]
    fn age_boundary_exactly_fifteen_is_accepted() {
        let now = fixed_now();
        let today = now.date_naive();
        let dob = today.checked_sub_months(Months::new(15 * 12)).unwrap();

        let input = NewPlayer {
            date_of_birth: dob,
            ..new_player(1)
        };
        assert!(Player::new(input, now).is_ok());

        let younger = NewPlayer {
            date_of_birth: dob + Duration::days(1),
            ..new_player(1)
        };
        let err = Player::new(younger, now).unwrap_err();
        assert!(err.has_message("Player must be at least 15 years old"));
    }

    #[test]
    fn rejects_birth_before_1950() {
        let input = NewPlayer {
            date_of_birth: NaiveDate::from_ymd_opt(1949, 12, 31).unwrap(),
            ..new_player(1)
        };
        let err = Player::new(input, fixed_now()).unwrap_err();
        assert!(err.has_message("Date of birth cannot be before 1950-01-01"));
    }

    #[test]
    fn reports_every_violation() {
        let input = NewPlayer {
            sportmonks_id: 0,
            first_name: " ".into(),
            height: Some(40),
            weight: Some(500),
            image_url: Some("ftp://x/y.png".into()),
            ..new_player(1)
        };
        let err = Player::new(input, fixed_now()).unwrap_err();
        for field in ["sportmonksId", "firstName", "height", "weight", "imageUrl"] {
            assert!(err.has_field(field), "missing violation for {field}: {err}");
        }
    }

    #[test]
    fn patch_is_revalidated_after_merge() {
        let now = fixed_now();
        let mut player = Player::new(new_player(1), now).unwrap();
        PlayerPatch {
            height: Some(99),
            ..Default::default()
        }
        .apply(&mut player);
        player.normalize(now);
        let err = player.validate(now).unwrap_err();
        assert!(err.has_message("Height must be between 100cm and 250cm"));
    }

    #[test]
    fn position_parsing() {
        assert_eq!(Position::from_str_pos("gk"), Some(Position::Goalkeeper));
        assert_eq!(Position::from_str_pos("Defender"), Some(Position::Defender));
        assert_eq!(Position::from_str_pos(" MID "), Some(Position::Midfielder));
        assert_eq!(Position::from_str_pos("fwd"), Some(Position::Forward));
        assert_eq!(Position::from_str_pos("sweeper"), None);

        let p: Position = serde_json::from_str("\"GK\"").unwrap();
        assert_eq!(p, Position::Goalkeeper);
        assert_eq!(serde_json::to_string(&Position::Forward).unwrap(), "\"Forward\"");
    }

    #[test]
    fn age_on_counts_whole_years() {
        let player = Player::new(new_player(1), fixed_now()).unwrap();
        assert_eq!(player.age_on(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap()), 40);
        assert_eq!(player.age_on(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()), 41);
    }
}
