// Wire types for the JSON-over-WebSocket API.
//
// A request frame is `{"op": "<entity>.<action>", "params": {...}}`. Every
// request gets exactly one reply frame, either
// `{"ok": true, "data": ...}` or `{"ok": false, "error": {...}}`.

use fantasy_core::db::{Filter, SqlValue, Sort};
use fantasy_core::lifecycle::Visibility;
use fantasy_core::model::{
    FantasyTeamPatch, LeaguePatch, MatchPatch, MatchStatus, NewFantasyTeam, NewLeague, NewMatch,
    NewPlayer, NewSeason, NewTeam, NewUser, PerformanceStats, PlayerPatch, SeasonPatch,
    TeamPatch, TeamScore, UserPatch,
};
use fantasy_core::{DbId, Price, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "op", content = "params")]
pub enum Request {
    // -- players --
    #[serde(rename = "player.create")]
    CreatePlayer(NewPlayer),
    #[serde(rename = "player.get")]
    GetPlayer(GetParams),
    #[serde(rename = "player.list")]
    ListPlayers(ListParams),
    #[serde(rename = "player.update")]
    UpdatePlayer(UpdateParams<PlayerPatch>),
    #[serde(rename = "player.delete")]
    DeletePlayer(DeleteParams),
    #[serde(rename = "player.deleted")]
    ListDeletedPlayers(PageParams),
    #[serde(rename = "player.search")]
    SearchPlayers(SearchParams),
    #[serde(rename = "player.count_by_position")]
    CountPlayersByPosition,
    #[serde(rename = "player.import")]
    ImportPlayers(ImportParams),

    // -- teams --
    #[serde(rename = "team.create")]
    CreateTeam(NewTeam),
    #[serde(rename = "team.get")]
    GetTeam(GetParams),
    #[serde(rename = "team.list")]
    ListTeams(ListParams),
    #[serde(rename = "team.update")]
    UpdateTeam(UpdateParams<TeamPatch>),
    #[serde(rename = "team.delete")]
    DeleteTeam(DeleteParams),
    #[serde(rename = "team.activate")]
    ActivateTeam(IdParams),

    // -- leagues --
    #[serde(rename = "league.create")]
    CreateLeague(NewLeague),
    #[serde(rename = "league.get")]
    GetLeague(GetParams),
    #[serde(rename = "league.list")]
    ListLeagues(ListParams),
    #[serde(rename = "league.update")]
    UpdateLeague(UpdateParams<LeaguePatch>),
    #[serde(rename = "league.delete")]
    DeleteLeague(DeleteParams),

    // -- seasons --
    #[serde(rename = "season.create")]
    CreateSeason(NewSeason),
    #[serde(rename = "season.get")]
    GetSeason(GetParams),
    #[serde(rename = "season.list")]
    ListSeasons(ListParams),
    #[serde(rename = "season.update")]
    UpdateSeason(UpdateParams<SeasonPatch>),
    #[serde(rename = "season.delete")]
    DeleteSeason(DeleteParams),
    #[serde(rename = "season.activate")]
    ActivateSeason(IdParams),
    #[serde(rename = "season.advance_gameweek")]
    AdvanceGameweek(IdParams),
    #[serde(rename = "season.complete")]
    CompleteSeason(IdParams),
    #[serde(rename = "season.cancel")]
    CancelSeason(IdParams),
    #[serde(rename = "season.set_transfer_deadline")]
    SetTransferDeadline(DeadlineParams),

    // -- matches --
    #[serde(rename = "match.create")]
    CreateMatch(NewMatch),
    #[serde(rename = "match.get")]
    GetMatch(GetParams),
    #[serde(rename = "match.list")]
    ListMatches(ListParams),
    #[serde(rename = "match.update")]
    UpdateMatch(UpdateParams<MatchPatch>),
    #[serde(rename = "match.delete")]
    DeleteMatch(DeleteParams),
    #[serde(rename = "match.transition")]
    TransitionMatch(TransitionParams),
    #[serde(rename = "match.update_score")]
    UpdateScore(ScoreParams),
    #[serde(rename = "match.gameweek")]
    GameweekMatches(GameweekParams),

    // -- users --
    #[serde(rename = "user.create")]
    CreateUser(NewUser),
    #[serde(rename = "user.get")]
    GetUser(GetParams),
    #[serde(rename = "user.list")]
    ListUsers(ListParams),
    #[serde(rename = "user.update")]
    UpdateUser(UpdateParams<UserPatch>),
    #[serde(rename = "user.delete")]
    DeleteUser(DeleteParams),
    #[serde(rename = "user.leaderboard")]
    Leaderboard(LimitParams),

    // -- fantasy teams --
    #[serde(rename = "fantasy_team.create")]
    CreateFantasyTeam(NewFantasyTeam),
    #[serde(rename = "fantasy_team.get")]
    GetFantasyTeam(GetParams),
    #[serde(rename = "fantasy_team.list")]
    ListFantasyTeams(ListParams),
    #[serde(rename = "fantasy_team.update")]
    UpdateFantasyTeam(UpdateParams<FantasyTeamPatch>),
    #[serde(rename = "fantasy_team.delete")]
    DeleteFantasyTeam(DeleteParams),

    // -- squad --
    #[serde(rename = "squad.add_player")]
    AddSquadPlayer(AddPlayerParams),
    #[serde(rename = "squad.remove_player")]
    RemoveSquadPlayer(SquadPlayerParams),
    #[serde(rename = "squad.set_captain")]
    SetCaptain(SquadPlayerParams),
    #[serde(rename = "squad.set_vice_captain")]
    SetViceCaptain(SquadPlayerParams),
    #[serde(rename = "squad.composition")]
    SquadComposition(TeamIdParams),

    // -- player stats --
    #[serde(rename = "stats.record")]
    RecordStats(RecordStatsParams),
    #[serde(rename = "stats.get")]
    GetStats(StatsKeyParams),
    #[serde(rename = "stats.list")]
    ListStats(ListParams),
    #[serde(rename = "stats.delete")]
    DeleteStats(DeleteParams),
    #[serde(rename = "stats.top_performers")]
    TopPerformers(TopPerformersParams),
}

#[derive(Debug, Deserialize)]
pub struct IdParams {
    pub id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub id: DbId,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: DbId,
    /// Physically remove the row instead of stamping `deletedAt`.
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParams<P> {
    pub id: DbId,
    pub patch: P,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub filters: Vec<FilterParam>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Field to sort on, in the same camelCase form as the documents.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A list filter as sent by clients. Field names are camelCase.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterParam {
    Eq {
        field: String,
        value: serde_json::Value,
    },
    Range {
        field: String,
        #[serde(default)]
        min: Option<serde_json::Value>,
        #[serde(default)]
        max: Option<serde_json::Value>,
    },
    In {
        field: String,
        values: Vec<serde_json::Value>,
    },
    Like {
        field: String,
        text: String,
    },
}

impl FilterParam {
    pub fn to_filter(&self) -> Result<Filter, String> {
        Ok(match self {
            FilterParam::Eq { field, value } => Filter::eq(&column_name(field), to_sql_value(value)?),
            FilterParam::Range { field, min, max } => Filter::range(
                &column_name(field),
                min.as_ref().map(to_sql_value).transpose()?,
                max.as_ref().map(to_sql_value).transpose()?,
            ),
            FilterParam::In { field, values } => Filter::one_of(
                &column_name(field),
                values.iter().map(to_sql_value).collect::<Result<Vec<_>, _>>()?,
            ),
            FilterParam::Like { field, text } => Filter::like(&column_name(field), text),
        })
    }
}

impl ListParams {
    pub fn sort_order(&self) -> Sort {
        match &self.sort {
            Some(field) if self.descending => Sort::desc(&column_name(field)),
            Some(field) => Sort::asc(&column_name(field)),
            None => Sort::default(),
        }
    }
}

/// `sportmonksId` -> `sportmonks_id`.
pub fn column_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Scalar JSON values only; arrays and objects are not filterable.
fn to_sql_value(value: &serde_json::Value) -> Result<SqlValue, String> {
    match value {
        serde_json::Value::Null => Ok(SqlValue::Null),
        serde_json::Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| format!("unsupported number {n}")),
        },
        serde_json::Value::String(s) => Ok(SqlValue::Text(s.clone())),
        other => Err(format!("filter values must be scalars, got {other}")),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Raw CSV text, header row first.
#[derive(Debug, Deserialize)]
pub struct ImportParams {
    pub csv: String,
}

#[derive(Debug, Deserialize)]
pub struct DeadlineParams {
    pub id: DbId,
    pub deadline: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct TransitionParams {
    pub id: DbId,
    pub status: MatchStatus,
}

#[derive(Debug, Deserialize)]
pub struct ScoreParams {
    pub id: DbId,
    pub home: TeamScore,
    pub away: TeamScore,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameweekParams {
    pub season_id: DbId,
    pub gameweek: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayerParams {
    pub team_id: DbId,
    pub player_id: DbId,
    pub price: Price,
    #[serde(default = "starting_by_default")]
    pub is_starting: bool,
}

fn starting_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadPlayerParams {
    pub team_id: DbId,
    pub player_id: DbId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamIdParams {
    pub team_id: DbId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatsParams {
    pub player_id: DbId,
    pub season_id: DbId,
    #[serde(default)]
    pub performance: PerformanceStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsKeyParams {
    pub player_id: DbId,
    pub season_id: DbId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformersParams {
    pub season_id: DbId,
    #[serde(default)]
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    pub fn success(data: serde_json::Value) -> Self {
        Response {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Response {
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error payload. `status` follows HTTP semantics so clients can branch on
/// it the same way they would on a REST API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &'static str, status: u16, message: impl Into<String>) -> Self {
        ApiError {
            code,
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new("bad_request", 400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new("not_found", 404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new("internal_error", 500, message)
    }
}
