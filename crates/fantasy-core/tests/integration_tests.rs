// Integration tests for the fantasy data layer.
//
// These go through the public `Database` API only: entity lifecycles,
// squad rules across many operations, and unique keys under concurrent
// writers.

use chrono::{Duration, NaiveDate, Utc};
use fantasy_core::db::{Database, Filter, Query};
use fantasy_core::lifecycle::Visibility;
use fantasy_core::model::{
    FantasyTeam, NewFantasyTeam, NewPlayer, NewSeason, NewUser, PerformanceStats, Player,
    PlayerPatch, Position, Season, SeasonStatus, User,
};
use fantasy_core::squad::SQUAD_MAX;
use fantasy_core::{BusinessRuleError, DbId, Error, Price};

// ===========================================================================
// Test helpers
// ===========================================================================

fn new_player(sportmonks_id: i64, position: Position) -> NewPlayer {
    NewPlayer {
        sportmonks_id,
        name: None,
        first_name: "Test".into(),
        last_name: format!("Player{sportmonks_id}"),
        display_name: None,
        date_of_birth: NaiveDate::from_ymd_opt(1996, 6, 1).unwrap(),
        position,
        nationality: Some("England".into()),
        height: Some(180),
        weight: Some(75),
        image_url: None,
        team_id: None,
    }
}

fn insert_player(db: &Database, sportmonks_id: i64, position: Position) -> Player {
    let now = Utc::now();
    db.insert(Player::new(new_player(sportmonks_id, position), now).unwrap(), now)
        .unwrap()
}

fn insert_running_season(db: &Database) -> Season {
    let now = Utc::now();
    let input = NewSeason {
        sportmonks_id: None,
        league_id: 1,
        name: "2026/27".into(),
        start_date: now - Duration::days(10),
        end_date: now + Duration::days(200),
        total_gameweeks: 38,
        transfer_deadline: None,
        is_fantasy_active: false,
    };
    db.insert(Season::new(input, now).unwrap(), now).unwrap()
}

fn insert_user(db: &Database, username: &str) -> User {
    let now = Utc::now();
    let input = NewUser {
        email: format!("{username}@example.com"),
        username: username.into(),
        display_name: None,
        role: Default::default(),
        subscription_tier: Default::default(),
        subscription_expires_at: None,
        favorite_team_id: None,
    };
    db.insert(User::new(input, now).unwrap(), now).unwrap()
}

fn insert_fantasy_team(db: &Database) -> (FantasyTeam, Season) {
    let now = Utc::now();
    let season = insert_running_season(db);
    let user = insert_user(db, "manager");
    let input = NewFantasyTeam {
        user_id: user.id,
        season_id: season.id,
        name: "Galacticos".into(),
        budget: None,
    };
    let team = db
        .insert(FantasyTeam::new(input, Price(1000), now).unwrap(), now)
        .unwrap();
    (team, season)
}

fn assert_budget_balanced(team: &FantasyTeam) {
    let value: Price = team.players.iter().map(|s| s.purchase_price).sum();
    assert_eq!(team.total_value, value);
    assert_eq!(team.remaining_budget + team.total_value, team.budget);
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[test]
fn lifecycle_active_soft_deleted_purged() {
    let db = Database::open(":memory:").unwrap();
    let player = insert_player(&db, 1, Position::Forward);
    assert!(player.lifecycle.deleted_at.is_none());

    let deleted: Player = db.soft_delete(player.id, Utc::now()).unwrap();
    assert!(deleted.lifecycle.is_deleted());
    assert!(matches!(
        db.get::<Player>(player.id, Visibility::Active),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(
        db.get::<Player>(player.id, Visibility::OnlyDeleted).unwrap().id,
        player.id
    );

    // soft-deleted rows cannot be edited
    let patch = PlayerPatch {
        height: Some(181),
        ..Default::default()
    };
    assert!(matches!(
        db.patch::<Player, _>(player.id, patch, Utc::now()),
        Err(Error::NotFound { .. })
    ));

    db.hard_delete::<Player>(player.id).unwrap();
    assert!(matches!(
        db.get::<Player>(player.id, Visibility::IncludeDeleted),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        db.hard_delete::<Player>(player.id),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn updated_at_moves_forward_created_at_does_not() {
    let db = Database::open(":memory:").unwrap();
    let player = insert_player(&db, 2, Position::Defender);
    let later = Utc::now() + Duration::seconds(5);
    let patch = PlayerPatch {
        nationality: Some("Wales".into()),
        ..Default::default()
    };
    let updated: Player = db.patch(player.id, patch, later).unwrap();
    assert_eq!(updated.lifecycle.created_at, player.lifecycle.created_at);
    assert_eq!(updated.lifecycle.updated_at, later);
}

#[test]
fn season_lifecycle_through_the_store() {
    let db = Database::open(":memory:").unwrap();
    let season = insert_running_season(&db);
    assert_eq!(season.status, SeasonStatus::Active);

    let now = Utc::now();
    let done: Season = db
        .update(season.id, now, |s: &mut Season| Ok(s.complete()?))
        .unwrap();
    assert_eq!(done.status, SeasonStatus::Completed);
    assert!(!done.is_fantasy_active);

    let err = db
        .update(season.id, now, |s: &mut Season| Ok(s.cancel()?))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BusinessRule(BusinessRuleError::IllegalTransition { .. })
    ));
    let reloaded: Season = db.get(season.id, Visibility::Active).unwrap();
    assert_eq!(reloaded.status, SeasonStatus::Completed);
}

// ===========================================================================
// Squad rules across many operations
// ===========================================================================

#[test]
fn budget_stays_balanced_through_adds_and_removes() {
    let db = Database::open(":memory:").unwrap();
    let (team, _) = insert_fantasy_team(&db);
    let now = Utc::now();

    let positions = [Position::Goalkeeper, Position::Defender, Position::Midfielder, Position::Forward];
    let players: Vec<Player> = (0..8)
        .map(|i| insert_player(&db, 100 + i, positions[i as usize % 4]))
        .collect();

    for (i, p) in players.iter().enumerate() {
        let price = Price(40 + 5 * i as u32);
        let after = db.add_squad_player(team.id, p.id, price, i < 6, now).unwrap();
        assert_budget_balanced(&after);
    }
    for p in players.iter().step_by(3) {
        let after = db.remove_squad_player(team.id, p.id, now).unwrap();
        assert_budget_balanced(&after);
        assert!(!after.contains(p.id));
    }

    let stored: FantasyTeam = db.get(team.id, Visibility::Active).unwrap();
    assert_budget_balanced(&stored);
    assert_eq!(stored.players.len(), 5);
}

#[test]
fn sixteenth_player_is_rejected_and_nothing_changes() {
    let db = Database::open(":memory:").unwrap();
    let (team, _) = insert_fantasy_team(&db);
    let now = Utc::now();

    for i in 0..SQUAD_MAX as i64 {
        let p = insert_player(&db, 200 + i, Position::Midfielder);
        db.add_squad_player(team.id, p.id, Price(50), true, now).unwrap();
    }
    let extra = insert_player(&db, 299, Position::Forward);
    let err = db
        .add_squad_player(team.id, extra.id, Price(10), false, now)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BusinessRule(BusinessRuleError::SquadFull { max: 15 })
    ));

    let stored: FantasyTeam = db.get(team.id, Visibility::Active).unwrap();
    assert_eq!(stored.players.len(), SQUAD_MAX);
    assert_eq!(stored.remaining_budget, Price(250));
    assert_budget_balanced(&stored);
}

#[test]
fn captaincy_is_exclusive() {
    let db = Database::open(":memory:").unwrap();
    let (team, _) = insert_fantasy_team(&db);
    let now = Utc::now();
    let a = insert_player(&db, 301, Position::Forward);
    let b = insert_player(&db, 302, Position::Midfielder);
    db.add_squad_player(team.id, a.id, Price(100), true, now).unwrap();
    db.add_squad_player(team.id, b.id, Price(90), true, now).unwrap();

    db.set_captain(team.id, a.id, now).unwrap();
    db.set_vice_captain(team.id, b.id, now).unwrap();
    let swapped = db.set_captain(team.id, b.id, now).unwrap();

    let captains: Vec<DbId> = swapped.players.iter().filter(|s| s.is_captain).map(|s| s.player_id).collect();
    assert_eq!(captains, vec![b.id]);
    assert!(swapped.vice_captain().is_none());
    assert!(swapped.players.iter().all(|s| !(s.is_captain && s.is_vice_captain)));

    let err = db.set_captain(team.id, 9_999, now).unwrap_err();
    assert!(matches!(
        err,
        Error::BusinessRule(BusinessRuleError::PlayerNotInSquad { player_id: 9_999 })
    ));
    let stored: FantasyTeam = db.get(team.id, Visibility::Active).unwrap();
    assert_eq!(stored.captain().map(|s| s.player_id), Some(b.id));
}

#[test]
fn stats_snapshot_is_replaced_not_accumulated() {
    let db = Database::open(":memory:").unwrap();
    let season = insert_running_season(&db);
    let player = insert_player(&db, 401, Position::Forward);
    let now = Utc::now();

    let perf = PerformanceStats {
        appearances: 2,
        minutes_played: 170,
        goals: 3,
        ..Default::default()
    };
    let first = db.record_stats(player.id, season.id, perf.clone(), now).unwrap();
    let second = db.record_stats(player.id, season.id, perf, now).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.fantasy.fantasy_points, second.fantasy.fantasy_points);
    assert_eq!(
        db.count::<fantasy_core::model::PlayerStats>(
            &[Filter::eq("player_id", player.id)],
            Visibility::Active
        )
        .unwrap(),
        1
    );
}

// ===========================================================================
// Concurrent writers
// ===========================================================================

#[test]
fn concurrent_creates_with_one_key_yield_one_winner() {
    let db = Database::open(":memory:").unwrap();
    let now = Utc::now();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let db = &db;
                s.spawn(move || {
                    let player = Player::new(new_player(777, Position::Forward), now).unwrap();
                    db.insert(player, now)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict { .. })))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 4);
    assert_eq!(
        db.find::<Player>(&Query::new().visibility(Visibility::IncludeDeleted))
            .unwrap()
            .pagination
            .total,
        1
    );
}

#[test]
fn separate_connections_share_unique_keys() {
    let path = std::env::temp_dir().join(format!(
        "fantasy-core-test-{}-{}.db",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let path_str = path.to_string_lossy().to_string();
    let first = Database::open(&path_str).unwrap();
    let second = Database::open(&path_str).unwrap();
    let now = Utc::now();

    let results: Vec<_> = std::thread::scope(|s| {
        let a = s.spawn(|| first.insert(insert_user_input("racer"), now));
        let b = s.spawn(|| second.insert(insert_user_input("racer"), now));
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::Conflict { entity: "User", .. }))));

    drop(first);
    drop(second);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}

fn insert_user_input(username: &str) -> User {
    let input = NewUser {
        email: format!("{username}@example.com"),
        username: username.into(),
        display_name: None,
        role: Default::default(),
        subscription_tier: Default::default(),
        subscription_expires_at: None,
        favorite_team_id: None,
    };
    User::new(input, Utc::now()).unwrap()
}
