// SQLite document store for every entity.
//
// Each entity is kept as a JSON document plus a few extracted columns that
// carry the unique keys, the soft-delete marker, and whatever the queries
// filter, sort or group on. Unique keys are enforced by SQLite indexes, so
// concurrent creates with the same key cannot both succeed.

use std::sync::{Mutex, MutexGuard};

use chrono::SecondsFormat;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BusinessRuleError, Error, Result};
use crate::lifecycle::Visibility;
use crate::model::{
    Entity, FantasyTeam, League, Match, Patch, PerformanceStats, Player, PlayerStats, Season,
    Team, User,
};
use crate::types::{DbId, Price, Timestamp};

/// Columns every table has besides `id`.
const BASE_COLUMNS: [&str; 4] = ["doc", "created_at", "updated_at", "deleted_at"];

/// Columns usable in filters and sorts on every table.
const COMMON_QUERY_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Column value used in filters.
pub use rusqlite::types::Value as SqlValue;

// ---------------------------------------------------------------------------
// Document mapping
// ---------------------------------------------------------------------------

/// An entity that has its own table.
pub trait Document: Entity {
    const TABLE: &'static str;
    /// Extracted columns, in the order `index_values` returns them.
    const COLUMNS: &'static [&'static str];

    fn index_values(&self) -> Vec<Value>;
}

/// Serialized enum tag (`"Forward"`, `"active"`, ...) as a column value.
fn tag<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Value::Text(s),
        _ => Value::Null,
    }
}

fn ts(t: Timestamp) -> Value {
    Value::Text(t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

impl Document for Player {
    const TABLE: &'static str = "players";
    const COLUMNS: &'static [&'static str] = &[
        "sportmonks_id",
        "name",
        "display_name",
        "position",
        "team_id",
        "nationality",
    ];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.sportmonks_id.into(),
            self.name.clone().into(),
            self.display_name.clone().into(),
            tag(&self.position),
            self.team_id.into(),
            self.nationality.clone().into(),
        ]
    }
}

impl Document for Team {
    const TABLE: &'static str = "teams";
    const COLUMNS: &'static [&'static str] =
        &["sportmonks_id", "name", "short_code", "league_id", "is_active"];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.sportmonks_id.into(),
            self.name.clone().into(),
            self.short_code.clone().into(),
            self.league_id.into(),
            self.is_active.into(),
        ]
    }
}

impl Document for League {
    const TABLE: &'static str = "leagues";
    const COLUMNS: &'static [&'static str] =
        &["sportmonks_id", "name", "type", "tier", "is_active"];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.sportmonks_id.into(),
            self.name.clone().into(),
            tag(&self.league_type),
            i64::from(self.tier).into(),
            self.is_active.into(),
        ]
    }
}

impl Document for Season {
    const TABLE: &'static str = "seasons";
    const COLUMNS: &'static [&'static str] = &[
        "sportmonks_id",
        "league_id",
        "name",
        "status",
        "is_fantasy_active",
        "start_date",
    ];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.sportmonks_id.into(),
            self.league_id.into(),
            self.name.clone().into(),
            tag(&self.status),
            self.is_fantasy_active.into(),
            ts(self.start_date),
        ]
    }
}

impl Document for Match {
    const TABLE: &'static str = "matches";
    const COLUMNS: &'static [&'static str] = &[
        "sportmonks_id",
        "season_id",
        "league_id",
        "home_team_id",
        "away_team_id",
        "gameweek",
        "status",
        "kickoff_at",
    ];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.sportmonks_id.into(),
            self.season_id.into(),
            self.league_id.into(),
            self.home_team_id.into(),
            self.away_team_id.into(),
            i64::from(self.gameweek).into(),
            tag(&self.status),
            ts(self.kickoff_at),
        ]
    }
}

impl Document for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["email", "username", "role", "subscription_tier", "total_points"];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.email.clone().into(),
            self.username.clone().into(),
            tag(&self.role),
            tag(&self.subscription_tier),
            self.total_points.into(),
        ]
    }
}

impl Document for FantasyTeam {
    const TABLE: &'static str = "fantasy_teams";
    const COLUMNS: &'static [&'static str] = &["user_id", "season_id", "name", "total_points"];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.user_id.into(),
            self.season_id.into(),
            self.name.clone().into(),
            self.total_points.into(),
        ]
    }
}

impl Document for PlayerStats {
    const TABLE: &'static str = "player_stats";
    const COLUMNS: &'static [&'static str] = &["player_id", "season_id", "fantasy_points"];

    fn index_values(&self) -> Vec<Value> {
        vec![
            self.player_id.into(),
            self.season_id.into(),
            self.fantasy.fantasy_points.into(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// A predicate on an extracted column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Inclusive on both ends; either end may be open.
    Range {
        column: String,
        min: Option<Value>,
        max: Option<Value>,
    },
    In(String, Vec<Value>),
    /// Case-insensitive substring match.
    Like(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn range(column: &str, min: Option<Value>, max: Option<Value>) -> Self {
        Filter::Range {
            column: column.to_string(),
            min,
            max,
        }
    }

    pub fn one_of<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn like(column: &str, text: &str) -> Self {
        Filter::Like(column.to_string(), text.to_string())
    }

    fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::In(c, _) | Filter::Like(c, _) => c,
            Filter::Range { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(column: &str) -> Self {
        Sort {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Sort {
            column: column.to_string(),
            descending: true,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Sort::asc("id")
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub visibility: Visibility,
    pub sort: Sort,
    pub page: Page,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }

    pub fn visibility(mut self, v: Visibility) -> Self {
        self.visibility = v;
        self
    }

    pub fn sort(mut self, s: Sort) -> Self {
        self.sort = s;
        self
    }

    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = Page { page, limit };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// One bucket of a group-by count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: Option<String>,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite-backed store for all entities.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                doc           TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                deleted_at    TEXT,
                sportmonks_id INTEGER NOT NULL UNIQUE,
                name          TEXT NOT NULL,
                display_name  TEXT NOT NULL,
                position      TEXT NOT NULL,
                team_id       INTEGER,
                nationality   TEXT
            );

            CREATE TABLE IF NOT EXISTS teams (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                doc           TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                deleted_at    TEXT,
                sportmonks_id INTEGER UNIQUE,
                name          TEXT NOT NULL,
                short_code    TEXT NOT NULL,
                league_id     INTEGER,
                is_active     INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leagues (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                doc           TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                deleted_at    TEXT,
                sportmonks_id INTEGER UNIQUE,
                name          TEXT NOT NULL,
                type          TEXT NOT NULL,
                tier          INTEGER NOT NULL,
                is_active     INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                doc               TEXT NOT NULL,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                deleted_at        TEXT,
                sportmonks_id     INTEGER UNIQUE,
                league_id         INTEGER NOT NULL,
                name              TEXT NOT NULL,
                status            TEXT NOT NULL,
                is_fantasy_active INTEGER NOT NULL,
                start_date        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                doc           TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                deleted_at    TEXT,
                sportmonks_id INTEGER UNIQUE,
                season_id     INTEGER NOT NULL,
                league_id     INTEGER NOT NULL,
                home_team_id  INTEGER NOT NULL,
                away_team_id  INTEGER NOT NULL,
                gameweek      INTEGER NOT NULL,
                status        TEXT NOT NULL,
                kickoff_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                doc               TEXT NOT NULL,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                deleted_at        TEXT,
                email             TEXT NOT NULL UNIQUE,
                username          TEXT NOT NULL UNIQUE,
                role              TEXT NOT NULL,
                subscription_tier TEXT NOT NULL,
                total_points      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fantasy_teams (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                doc          TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                deleted_at   TEXT,
                user_id      INTEGER NOT NULL,
                season_id    INTEGER NOT NULL,
                name         TEXT NOT NULL,
                total_points REAL NOT NULL,
                UNIQUE(user_id, season_id)
            );

            CREATE TABLE IF NOT EXISTS player_stats (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                doc            TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL,
                deleted_at     TEXT,
                player_id      INTEGER NOT NULL,
                season_id      INTEGER NOT NULL,
                fantasy_points REAL NOT NULL,
                UNIQUE(player_id, season_id)
            );

            CREATE INDEX IF NOT EXISTS idx_players_name ON players(name COLLATE NOCASE);
            CREATE INDEX IF NOT EXISTS idx_players_position ON players(position);
            CREATE INDEX IF NOT EXISTS idx_matches_season_gameweek ON matches(season_id, gameweek);
            CREATE INDEX IF NOT EXISTS idx_users_total_points ON users(total_points);
            CREATE INDEX IF NOT EXISTS idx_player_stats_points ON player_stats(season_id, fantasy_points);
            ",
        )?;

        info!("opened database at {}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // -- generic CRUD -------------------------------------------------------

    /// Normalize, validate and store a new entity. Returns it with its id.
    pub fn insert<T: Document>(&self, mut entity: T, now: Timestamp) -> Result<T> {
        let conn = self.conn();
        insert_row(&conn, &mut entity, now)?;
        info!("created {} {}", T::NAME, entity.id());
        Ok(entity)
    }

    /// Store several entities in one transaction. Any failure stores none.
    pub fn insert_many<T: Document>(&self, entities: Vec<T>, now: Timestamp) -> Result<Vec<T>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(entities.len());
        for mut entity in entities {
            insert_row(&tx, &mut entity, now)?;
            stored.push(entity);
        }
        tx.commit()?;
        info!("created {} {} records", stored.len(), T::NAME);
        Ok(stored)
    }

    pub fn get<T: Document>(&self, id: DbId, visibility: Visibility) -> Result<T> {
        load_row(&self.conn(), id, visibility)
    }

    pub fn find<T: Document>(&self, query: &Query) -> Result<Paginated<T>> {
        let Page { page, limit } = query.page;
        if page == 0 || limit == 0 {
            return Err(Error::InvalidQuery(
                "page and limit must be at least 1".to_string(),
            ));
        }

        let conn = self.conn();
        let total = count_rows::<T>(&conn, &query.filters, query.visibility)?;
        let offset = u64::from(page - 1) * u64::from(limit);
        let data = find_rows::<T>(
            &conn,
            &query.filters,
            query.visibility,
            &query.sort,
            Some(limit),
            offset,
        )?;

        Ok(Paginated {
            data,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(u64::from(limit)),
            },
        })
    }

    /// Every matching row, unpaginated.
    pub fn find_all<T: Document>(
        &self,
        filters: &[Filter],
        visibility: Visibility,
    ) -> Result<Vec<T>> {
        find_rows(&self.conn(), filters, visibility, &Sort::default(), None, 0)
    }

    /// Soft-deleted rows only.
    pub fn find_deleted<T: Document>(&self, page: Page) -> Result<Paginated<T>> {
        self.find(&Query {
            visibility: Visibility::OnlyDeleted,
            page,
            ..Query::default()
        })
    }

    pub fn count<T: Document>(&self, filters: &[Filter], visibility: Visibility) -> Result<u64> {
        count_rows::<T>(&self.conn(), filters, visibility)
    }

    /// Load an active entity, apply `f`, then normalize, validate and write
    /// it back, all in one transaction. Nothing is written if `f` or
    /// validation fails.
    pub fn update<T, F>(&self, id: DbId, now: Timestamp, f: F) -> Result<T>
    where
        T: Document,
        F: FnOnce(&mut T) -> Result<()>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut entity: T = load_row(&tx, id, Visibility::Active)?;
        f(&mut entity)?;
        save_row(&tx, &mut entity, now)?;
        tx.commit()?;
        debug!("updated {} {}", T::NAME, id);
        Ok(entity)
    }

    /// Merge a partial update and re-validate the whole entity.
    pub fn patch<T, P>(&self, id: DbId, patch: P, now: Timestamp) -> Result<T>
    where
        T: Document,
        P: Patch<T>,
    {
        patch.check(now)?;
        self.update(id, now, |entity: &mut T| {
            patch.apply(entity);
            Ok(())
        })
    }

    /// Stamp `deleted_at`. Already-deleted rows report NotFound.
    pub fn soft_delete<T: Document>(&self, id: DbId, now: Timestamp) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut entity: T = load_row(&tx, id, Visibility::Active)?;
        entity.lifecycle_mut().mark_deleted(now);
        entity.on_soft_delete();
        write_row(&tx, &entity)?;
        tx.commit()?;
        info!("soft-deleted {} {}", T::NAME, id);
        Ok(entity)
    }

    /// Physically remove a row, deleted or not.
    pub fn hard_delete<T: Document>(&self, id: DbId) -> Result<()> {
        let conn = self.conn();
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", T::TABLE),
            params![id],
        )?;
        if removed == 0 {
            return Err(Error::not_found(T::NAME, id));
        }
        info!("hard-deleted {} {}", T::NAME, id);
        Ok(())
    }

    /// Restore a team, soft-deleted or merely inactive.
    pub fn activate_team(&self, id: DbId, now: Timestamp) -> Result<Team> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut team: Team = load_row(&tx, id, Visibility::IncludeDeleted)?;
        team.activate(now);
        save_row(&tx, &mut team, now)?;
        tx.commit()?;
        info!("activated team {}", id);
        Ok(team)
    }

    /// Row counts grouped by an extracted column, largest group first.
    pub fn count_by<T: Document>(
        &self,
        column: &str,
        visibility: Visibility,
    ) -> Result<Vec<GroupCount>> {
        let column = check_column::<T>(column)?;
        let (where_sql, values) = where_clause::<T>(&[], visibility)?;
        let sql = format!(
            "SELECT CAST({column} AS TEXT), COUNT(*) FROM {}{where_sql}
             GROUP BY {column} ORDER BY COUNT(*) DESC, {column}",
            T::TABLE
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(GroupCount {
                    key: row.get(0)?,
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Highest values of `column` first, ties broken by id.
    pub fn top_by<T: Document>(
        &self,
        column: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<T>> {
        find_rows(
            &self.conn(),
            filters,
            Visibility::Active,
            &Sort::desc(column),
            Some(limit),
            0,
        )
    }

    // -- queries ------------------------------------------------------------

    pub fn user_leaderboard(&self, limit: u32) -> Result<Vec<User>> {
        self.top_by("total_points", &[], limit)
    }

    pub fn top_performers(&self, season_id: DbId, limit: u32) -> Result<Vec<PlayerStats>> {
        self.top_by("fantasy_points", &[Filter::eq("season_id", season_id)], limit)
    }

    pub fn search_players(&self, text: &str, page: Page) -> Result<Paginated<Player>> {
        self.find(&Query {
            filters: vec![Filter::like("name", text)],
            sort: Sort::asc("name"),
            page,
            ..Query::default()
        })
    }

    pub fn matches_in_gameweek(&self, season_id: DbId, gameweek: u32) -> Result<Vec<Match>> {
        find_rows(
            &self.conn(),
            &[
                Filter::eq("season_id", season_id),
                Filter::eq("gameweek", i64::from(gameweek)),
            ],
            Visibility::Active,
            &Sort::asc("kickoff_at"),
            None,
            0,
        )
    }

    pub fn stats_for(&self, player_id: DbId, season_id: DbId) -> Result<PlayerStats> {
        stats_row(&self.conn(), player_id, season_id)?.ok_or_else(|| {
            Error::not_found(PlayerStats::NAME, format!("player {player_id} season {season_id}"))
        })
    }

    /// Upsert the (player, season) stats row and recompute its fantasy block.
    pub fn record_stats(
        &self,
        player_id: DbId,
        season_id: DbId,
        performance: PerformanceStats,
        now: Timestamp,
    ) -> Result<PlayerStats> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        load_row::<Player>(&tx, player_id, Visibility::Active)?;
        load_row::<Season>(&tx, season_id, Visibility::Active)?;

        let stats = match stats_row(&tx, player_id, season_id)? {
            Some(mut stats) => {
                stats.performance = performance;
                save_row(&tx, &mut stats, now)?;
                stats
            }
            None => {
                let mut stats = PlayerStats::new(player_id, season_id, performance, now)?;
                insert_row(&tx, &mut stats, now)?;
                stats
            }
        };
        tx.commit()?;
        debug!(
            "recorded stats for player {} season {}: {} pts",
            player_id, season_id, stats.fantasy.fantasy_points
        );
        Ok(stats)
    }

    // -- squad mutations ----------------------------------------------------

    pub fn add_squad_player(
        &self,
        team_id: DbId,
        player_id: DbId,
        price: Price,
        is_starting: bool,
        now: Timestamp,
    ) -> Result<FantasyTeam> {
        self.mutate_squad(team_id, now, |conn, team| {
            load_row::<Player>(conn, player_id, Visibility::Active)?;
            team.add_player(player_id, price, is_starting, now)?;
            bump_transfers(conn, player_id, team.season_id, Transfer::In, now)
        })
    }

    pub fn remove_squad_player(
        &self,
        team_id: DbId,
        player_id: DbId,
        now: Timestamp,
    ) -> Result<FantasyTeam> {
        self.mutate_squad(team_id, now, |conn, team| {
            team.remove_player(player_id)?;
            bump_transfers(conn, player_id, team.season_id, Transfer::Out, now)
        })
    }

    pub fn set_captain(&self, team_id: DbId, player_id: DbId, now: Timestamp) -> Result<FantasyTeam> {
        self.mutate_squad(team_id, now, |_, team| Ok(team.set_captain(player_id)?))
    }

    pub fn set_vice_captain(
        &self,
        team_id: DbId,
        player_id: DbId,
        now: Timestamp,
    ) -> Result<FantasyTeam> {
        self.mutate_squad(team_id, now, |_, team| Ok(team.set_vice_captain(player_id)?))
    }

    /// Run a squad operation in one transaction, gated on the owning
    /// season's transfer window.
    pub fn mutate_squad<F>(&self, team_id: DbId, now: Timestamp, op: F) -> Result<FantasyTeam>
    where
        F: FnOnce(&Connection, &mut FantasyTeam) -> Result<()>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut team: FantasyTeam = load_row(&tx, team_id, Visibility::Active)?;
        let season: Season = load_row(&tx, team.season_id, Visibility::Active)?;
        if !season.squad_changes_open(now) {
            warn!(
                "squad change on fantasy team {} rejected: season {} window closed",
                team_id, season.id
            );
            return Err(BusinessRuleError::TransferWindowClosed {
                season_id: season.id,
            }
            .into());
        }

        op(&*tx, &mut team)?;
        save_row(&tx, &mut team, now)?;
        tx.commit()?;
        Ok(team)
    }
}

// ---------------------------------------------------------------------------
// Row helpers (usable inside or outside a transaction)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Transfer {
    In,
    Out,
}

fn decode<T: Document>(id: DbId, doc: &str) -> Result<T> {
    let mut entity: T = serde_json::from_str(doc)?;
    entity.set_id(id);
    Ok(entity)
}

fn row_values<T: Document>(entity: &T) -> Result<Vec<Value>> {
    let lifecycle = entity.lifecycle();
    let mut values = vec![
        Value::Text(serde_json::to_string(entity)?),
        ts(lifecycle.created_at),
        ts(lifecycle.updated_at),
        lifecycle.deleted_at.map_or(Value::Null, ts),
    ];
    values.extend(entity.index_values());
    Ok(values)
}

fn insert_row<T: Document>(conn: &Connection, entity: &mut T, now: Timestamp) -> Result<()> {
    entity.normalize(now);
    entity.validate(now)?;

    let columns: Vec<&str> = BASE_COLUMNS.iter().chain(T::COLUMNS).copied().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    );

    let values = row_values(entity)?;
    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| conflict_or_storage(T::NAME, e))?;
    entity.set_id(conn.last_insert_rowid());
    Ok(())
}

fn write_row<T: Document>(conn: &Connection, entity: &T) -> Result<()> {
    let columns: Vec<&str> = BASE_COLUMNS.iter().chain(T::COLUMNS).copied().collect();
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        T::TABLE,
        assignments.join(", "),
        columns.len() + 1
    );

    let mut values = row_values(entity)?;
    values.push(Value::Integer(entity.id()));
    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| conflict_or_storage(T::NAME, e))?;
    Ok(())
}

/// The update path: normalize, touch, validate, write.
fn save_row<T: Document>(conn: &Connection, entity: &mut T, now: Timestamp) -> Result<()> {
    entity.normalize(now);
    entity.lifecycle_mut().touch(now);
    entity.validate(now)?;
    write_row(conn, entity)
}

fn load_row<T: Document>(conn: &Connection, id: DbId, visibility: Visibility) -> Result<T> {
    let rows = find_rows::<T>(
        conn,
        &[Filter::eq("id", id)],
        visibility,
        &Sort::default(),
        Some(1),
        0,
    )?;
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::not_found(T::NAME, id))
}

fn find_rows<T: Document>(
    conn: &Connection,
    filters: &[Filter],
    visibility: Visibility,
    sort: &Sort,
    limit: Option<u32>,
    offset: u64,
) -> Result<Vec<T>> {
    let (where_sql, mut values) = where_clause::<T>(filters, visibility)?;
    let sort_column = check_column::<T>(&sort.column)?;
    let direction = if sort.descending { "DESC" } else { "ASC" };

    let mut sql = format!(
        "SELECT id, doc FROM {}{where_sql} ORDER BY {sort_column} {direction}, id ASC",
        T::TABLE
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(
            " LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.iter().map(|(id, doc)| decode(*id, doc)).collect()
}

fn count_rows<T: Document>(
    conn: &Connection,
    filters: &[Filter],
    visibility: Visibility,
) -> Result<u64> {
    let (where_sql, values) = where_clause::<T>(filters, visibility)?;
    let sql = format!("SELECT COUNT(*) FROM {}{where_sql}", T::TABLE);
    let n: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

fn stats_row(conn: &Connection, player_id: DbId, season_id: DbId) -> Result<Option<PlayerStats>> {
    let rows = find_rows::<PlayerStats>(
        conn,
        &[
            Filter::eq("player_id", player_id),
            Filter::eq("season_id", season_id),
        ],
        Visibility::Active,
        &Sort::default(),
        Some(1),
        0,
    )?;
    Ok(rows.into_iter().next())
}

/// Count a transfer on the player's stats for the season, if it has any.
fn bump_transfers(
    conn: &Connection,
    player_id: DbId,
    season_id: DbId,
    direction: Transfer,
    now: Timestamp,
) -> Result<()> {
    if let Some(mut stats) = stats_row(conn, player_id, season_id)? {
        match direction {
            Transfer::In => stats.fantasy.transfers_in += 1,
            Transfer::Out => stats.fantasy.transfers_out += 1,
        }
        save_row(conn, &mut stats, now)?;
    }
    Ok(())
}

/// Only extracted columns may appear in generated SQL.
fn check_column<T: Document>(column: &str) -> Result<&str> {
    if T::COLUMNS.contains(&column) || COMMON_QUERY_COLUMNS.contains(&column) {
        Ok(column)
    } else {
        Err(Error::InvalidQuery(format!(
            "unknown column '{column}' for {}",
            T::NAME
        )))
    }
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn where_clause<T: Document>(
    filters: &[Filter],
    visibility: Visibility,
) -> Result<(String, Vec<Value>)> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(predicate) = visibility.predicate() {
        clauses.push(predicate.to_string());
    }

    for filter in filters {
        let column = check_column::<T>(filter.column())?;
        match filter {
            Filter::Eq(_, v) => {
                values.push(v.clone());
                clauses.push(format!("{column} = ?{}", values.len()));
            }
            Filter::Range { min, max, .. } => {
                if let Some(v) = min {
                    values.push(v.clone());
                    clauses.push(format!("{column} >= ?{}", values.len()));
                }
                if let Some(v) = max {
                    values.push(v.clone());
                    clauses.push(format!("{column} <= ?{}", values.len()));
                }
            }
            Filter::In(_, vs) if vs.is_empty() => clauses.push("0".to_string()),
            Filter::In(_, vs) => {
                let mut slots = Vec::with_capacity(vs.len());
                for v in vs {
                    values.push(v.clone());
                    slots.push(format!("?{}", values.len()));
                }
                clauses.push(format!("{column} IN ({})", slots.join(", ")));
            }
            Filter::Like(_, text) => {
                values.push(Value::Text(escape_like(text)));
                clauses.push(format!("{column} LIKE ?{} ESCAPE '\\'", values.len()));
            }
        }
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok((sql, values))
}

/// Turn SQLite unique violations into `Error::Conflict`, naming the key.
fn conflict_or_storage(entity: &'static str, err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            // "UNIQUE constraint failed: users.email" or
            // "UNIQUE constraint failed: fantasy_teams.user_id, fantasy_teams.season_id"
            let field = msg
                .rsplit(": ")
                .next()
                .unwrap_or_default()
                .split(", ")
                .map(|qualified| camel_case(qualified.rsplit('.').next().unwrap_or(qualified)))
                .collect::<Vec<_>>()
                .join(" and ");
            warn!("duplicate key on {}: {}", entity, field);
            return Error::Conflict { entity, field };
        }
    }
    Error::Storage(err)
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
