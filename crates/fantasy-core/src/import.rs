// Bulk player import from sports-data CSV exports.
//
// The whole file is parsed and validated before anything is stored, and the
// rows are then written in one transaction: an import either stores every
// player or none of them.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::db::Database;
use crate::error::Error;
use crate::model::{NewPlayer, Player, Position};
use crate::types::{DbId, Timestamp};
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error on line {line}: {source}")]
    Csv { line: usize, source: csv::Error },

    #[error("unknown position '{value}' on line {line}")]
    InvalidPosition { line: usize, value: String },

    #[error("invalid player on line {line}: {errors}")]
    Invalid {
        line: usize,
        errors: ValidationErrors,
    },

    #[error(transparent)]
    Store(#[from] Error),
}

/// One CSV row. Unknown extra columns are ignored.
#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    sportmonks_id: i64,
    first_name: String,
    last_name: String,
    #[serde(default)]
    display_name: Option<String>,
    date_of_birth: NaiveDate,
    position: String,
    #[serde(default)]
    nationality: Option<String>,
    #[serde(default)]
    height: Option<i32>,
    #[serde(default)]
    weight: Option<i32>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    team_id: Option<DbId>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse and validate every row. Line numbers count the header as line 1.
pub fn parse_players<R: Read>(rdr: R, now: Timestamp) -> Result<Vec<Player>, ImportError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();

    for (idx, result) in reader.deserialize::<RawPlayerRow>().enumerate() {
        let line = idx + 2;
        let raw = result.map_err(|source| ImportError::Csv { line, source })?;
        let position =
            Position::from_str_pos(&raw.position).ok_or_else(|| ImportError::InvalidPosition {
                line,
                value: raw.position.clone(),
            })?;

        let input = NewPlayer {
            sportmonks_id: raw.sportmonks_id,
            name: None,
            first_name: raw.first_name,
            last_name: raw.last_name,
            display_name: non_blank(raw.display_name),
            date_of_birth: raw.date_of_birth,
            position,
            nationality: non_blank(raw.nationality),
            height: raw.height,
            weight: raw.weight,
            image_url: non_blank(raw.image_url),
            team_id: raw.team_id,
        };
        let player = Player::new(input, now).map_err(|errors| ImportError::Invalid { line, errors })?;
        players.push(player);
    }

    Ok(players)
}

/// Parse, validate and store players from any reader.
pub fn import_players_from_reader<R: Read>(
    db: &Database,
    rdr: R,
    now: Timestamp,
) -> Result<Vec<Player>, ImportError> {
    let players = parse_players(rdr, now)?;
    let stored = db.insert_many(players, now)?;
    info!("imported {} players", stored.len());
    Ok(stored)
}

/// Import players from a CSV file.
pub fn import_players(db: &Database, path: &Path, now: Timestamp) -> Result<Vec<Player>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    import_players_from_reader(db, file, now)
}
