// Request dispatch: decode a frame, run it against the store, encode the
// reply. Everything here is synchronous; the WebSocket layer runs it on the
// blocking pool.

use chrono::Utc;
use fantasy_core::config::{Config, PaginationConfig};
use fantasy_core::db::{Database, Document, Page, Query};
use fantasy_core::import::{import_players_from_reader, ImportError};
use fantasy_core::lifecycle::Visibility;
use fantasy_core::model::{
    FantasyTeam, League, Match, Patch, Player, PlayerStats, Season, Team, User,
};
use fantasy_core::squad::check_composition;
use fantasy_core::validation::ValidationErrors;
use fantasy_core::{BusinessRuleError, DbId, Error, Price, Timestamp};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::protocol::{
    ApiError, DeleteParams, GetParams, ListParams, Request, Response, UpdateParams,
};

/// Leaderboard and top-performer size when the client gives none.
const DEFAULT_TOP_LIMIT: u32 = 10;

type ApiResult = Result<serde_json::Value, ApiError>;

/// Shared state for every connection.
pub struct ApiContext {
    pub db: Database,
    pub initial_budget: Price,
    pub pagination: PaginationConfig,
}

impl ApiContext {
    pub fn new(db: Database, config: &Config) -> Self {
        ApiContext {
            db,
            initial_budget: config.game.initial_budget(),
            pagination: config.pagination.clone(),
        }
    }

    fn page(&self, page: Option<u32>, limit: Option<u32>) -> Page {
        Page {
            page: page.unwrap_or(1),
            limit: limit
                .unwrap_or(self.pagination.default_limit)
                .min(self.pagination.max_limit),
        }
    }

    fn top_limit(&self, limit: Option<u32>) -> u32 {
        limit
            .unwrap_or(DEFAULT_TOP_LIMIT)
            .min(self.pagination.max_limit)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Validation(violations) => ApiError::new("validation_error", 422, message)
                .with_details(json!({ "violations": violations })),
            Error::Conflict { field, .. } => ApiError::new("duplicate_key", 409, message)
                .with_details(json!({ "field": field })),
            Error::BusinessRule(_) => ApiError::new("business_rule_violation", 422, message),
            Error::NotFound { .. } => ApiError::not_found(message),
            Error::InvalidQuery(_) => ApiError::bad_request(message),
            Error::Storage(_) | Error::Serialization(_) => {
                error!("request failed: {message}");
                ApiError::internal(message)
            }
        }
    }
}

impl From<BusinessRuleError> for ApiError {
    fn from(err: BusinessRuleError) -> Self {
        Error::from(err).into()
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = err.to_string();
        match err {
            ImportError::Store(e) => e.into(),
            ImportError::Invalid { line, errors } => {
                ApiError::new("validation_error", 422, message)
                    .with_details(json!({ "line": line, "violations": errors }))
            }
            ImportError::Io { .. } | ImportError::Csv { .. } | ImportError::InvalidPosition { .. } => {
                ApiError::bad_request(message)
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        error!("failed to encode response: {err}");
        ApiError::internal(err.to_string())
    }
}

/// Handle one raw text frame and return the reply frame.
pub fn handle_message(ctx: &ApiContext, text: &str) -> String {
    let response = match serde_json::from_str::<Request>(text) {
        Ok(request) => match handle_request(ctx, request) {
            Ok(data) => Response::success(data),
            Err(e) => Response::failure(e),
        },
        Err(e) => {
            warn!("rejected malformed request: {e}");
            Response::failure(ApiError::bad_request(format!("invalid request: {e}")))
        }
    };
    encode(&response)
}

/// Serialize a reply. A reply that cannot be encoded becomes a bare 500.
pub fn encode(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        error!("failed to encode response: {e}");
        r#"{"ok":false,"error":{"code":"internal_error","status":500,"message":"response encoding failed"}}"#
            .to_string()
    })
}

fn ok<T: Serialize>(value: T) -> ApiResult {
    Ok(serde_json::to_value(value)?)
}

pub fn handle_request(ctx: &ApiContext, request: Request) -> ApiResult {
    let now = Utc::now();
    let db = &ctx.db;
    debug!("dispatching {request:?}");

    match request {
        // -- players --
        Request::CreatePlayer(input) => create(db, Player::new(input, now), now),
        Request::GetPlayer(p) => get::<Player>(db, p),
        Request::ListPlayers(p) => list::<Player>(ctx, p),
        Request::UpdatePlayer(p) => update::<Player, _>(db, p, now),
        Request::DeletePlayer(p) => delete::<Player>(db, p, now),
        Request::ListDeletedPlayers(p) => ok(db.find_deleted::<Player>(ctx.page(p.page, p.limit))?),
        Request::SearchPlayers(p) => {
            ok(db.search_players(&p.query, ctx.page(p.page, p.limit))?)
        }
        Request::CountPlayersByPosition => {
            ok(db.count_by::<Player>("position", Visibility::Active)?)
        }
        Request::ImportPlayers(p) => ok(import_players_from_reader(db, p.csv.as_bytes(), now)?),

        // -- teams --
        Request::CreateTeam(input) => create(db, Team::new(input, now), now),
        Request::GetTeam(p) => get::<Team>(db, p),
        Request::ListTeams(p) => list::<Team>(ctx, p),
        Request::UpdateTeam(p) => update::<Team, _>(db, p, now),
        Request::DeleteTeam(p) => delete::<Team>(db, p, now),
        Request::ActivateTeam(p) => ok(db.activate_team(p.id, now)?),

        // -- leagues --
        Request::CreateLeague(input) => create(db, League::new(input, now), now),
        Request::GetLeague(p) => get::<League>(db, p),
        Request::ListLeagues(p) => list::<League>(ctx, p),
        Request::UpdateLeague(p) => update::<League, _>(db, p, now),
        Request::DeleteLeague(p) => delete::<League>(db, p, now),

        // -- seasons --
        Request::CreateSeason(input) => create(db, Season::new(input, now), now),
        Request::GetSeason(p) => get::<Season>(db, p),
        Request::ListSeasons(p) => list::<Season>(ctx, p),
        Request::UpdateSeason(p) => update::<Season, _>(db, p, now),
        Request::DeleteSeason(p) => delete::<Season>(db, p, now),
        Request::ActivateSeason(p) => season_op(db, p.id, now, Season::activate),
        Request::AdvanceGameweek(p) => {
            season_op(db, p.id, now, |s| s.advance_gameweek().map(|_| ()))
        }
        Request::CompleteSeason(p) => season_op(db, p.id, now, Season::complete),
        Request::CancelSeason(p) => season_op(db, p.id, now, Season::cancel),
        Request::SetTransferDeadline(p) => {
            season_op(db, p.id, now, |s| s.set_transfer_deadline(p.deadline))
        }

        // -- matches --
        Request::CreateMatch(input) => create(db, Match::new(input, now), now),
        Request::GetMatch(p) => get::<Match>(db, p),
        Request::ListMatches(p) => list::<Match>(ctx, p),
        Request::UpdateMatch(p) => update::<Match, _>(db, p, now),
        Request::DeleteMatch(p) => delete::<Match>(db, p, now),
        Request::TransitionMatch(p) => ok(db.update::<Match, _>(p.id, now, |m| {
            Ok(m.transition(p.status)?)
        })?),
        Request::UpdateScore(p) => ok(db.update::<Match, _>(p.id, now, |m| {
            Ok(m.update_score(p.home, p.away)?)
        })?),
        Request::GameweekMatches(p) => ok(db.matches_in_gameweek(p.season_id, p.gameweek)?),

        // -- users --
        Request::CreateUser(input) => create(db, User::new(input, now), now),
        Request::GetUser(p) => get::<User>(db, p),
        Request::ListUsers(p) => list::<User>(ctx, p),
        Request::UpdateUser(p) => update::<User, _>(db, p, now),
        Request::DeleteUser(p) => delete::<User>(db, p, now),
        Request::Leaderboard(p) => ok(db.user_leaderboard(ctx.top_limit(p.limit))?),

        // -- fantasy teams --
        Request::CreateFantasyTeam(input) => {
            db.get::<User>(input.user_id, Visibility::Active)?;
            db.get::<Season>(input.season_id, Visibility::Active)?;
            create(db, FantasyTeam::new(input, ctx.initial_budget, now), now)
        }
        Request::GetFantasyTeam(p) => get::<FantasyTeam>(db, p),
        Request::ListFantasyTeams(p) => list::<FantasyTeam>(ctx, p),
        Request::UpdateFantasyTeam(p) => update::<FantasyTeam, _>(db, p, now),
        Request::DeleteFantasyTeam(p) => delete::<FantasyTeam>(db, p, now),

        // -- squad --
        Request::AddSquadPlayer(p) => ok(db.add_squad_player(
            p.team_id,
            p.player_id,
            p.price,
            p.is_starting,
            now,
        )?),
        Request::RemoveSquadPlayer(p) => ok(db.remove_squad_player(p.team_id, p.player_id, now)?),
        Request::SetCaptain(p) => ok(db.set_captain(p.team_id, p.player_id, now)?),
        Request::SetViceCaptain(p) => ok(db.set_vice_captain(p.team_id, p.player_id, now)?),
        Request::SquadComposition(p) => {
            let team: FantasyTeam = db.get(p.team_id, Visibility::Active)?;
            let positions = team
                .players
                .iter()
                .map(|s| {
                    db.get::<Player>(s.player_id, Visibility::IncludeDeleted)
                        .map(|player| player.position)
                })
                .collect::<Result<Vec<_>, _>>()?;
            ok(check_composition(&positions))
        }

        // -- player stats --
        Request::RecordStats(p) => {
            ok(db.record_stats(p.player_id, p.season_id, p.performance, now)?)
        }
        Request::GetStats(p) => ok(db.stats_for(p.player_id, p.season_id)?),
        Request::ListStats(p) => list::<PlayerStats>(ctx, p),
        Request::DeleteStats(p) => delete::<PlayerStats>(db, p, now),
        Request::TopPerformers(p) => {
            ok(db.top_performers(p.season_id, ctx.top_limit(p.limit))?)
        }
    }
}

// ---------------------------------------------------------------------------
// Generic handlers
// ---------------------------------------------------------------------------

fn create<T: Document>(
    db: &Database,
    candidate: Result<T, ValidationErrors>,
    now: Timestamp,
) -> ApiResult {
    let entity = candidate.map_err(Error::from)?;
    ok(db.insert(entity, now)?)
}

fn get<T: Document>(db: &Database, p: GetParams) -> ApiResult {
    ok(db.get::<T>(p.id, p.visibility)?)
}

fn list<T: Document>(ctx: &ApiContext, p: ListParams) -> ApiResult {
    let mut query = Query::new()
        .visibility(p.visibility)
        .sort(p.sort_order());
    query.page = ctx.page(p.page, p.limit);
    for f in &p.filters {
        query = query.filter(f.to_filter().map_err(ApiError::bad_request)?);
    }
    ok(ctx.db.find::<T>(&query)?)
}

fn update<T, P>(db: &Database, p: UpdateParams<P>, now: Timestamp) -> ApiResult
where
    T: Document,
    P: Patch<T>,
{
    ok(db.patch::<T, P>(p.id, p.patch, now)?)
}

fn delete<T: Document>(db: &Database, p: DeleteParams, now: Timestamp) -> ApiResult {
    if p.hard {
        db.hard_delete::<T>(p.id)?;
        ok(json!({ "id": p.id, "deleted": "hard" }))
    } else {
        ok(db.soft_delete::<T>(p.id, now)?)
    }
}

fn season_op<F>(db: &Database, id: DbId, now: Timestamp, op: F) -> ApiResult
where
    F: FnOnce(&mut Season) -> Result<(), BusinessRuleError>,
{
    ok(db.update::<Season, _>(id, now, |s| Ok(op(s)?))?)
}
