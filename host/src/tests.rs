use crate::*;
use hexrule_agents::{make_agent, Agent, AgentKind, AgentView};
use hexrule_engine::config::RulesConfig;
use hexrule_engine::error::ActionError;
use hexrule_engine::setup::GameSetup;
use hexrule_engine::types::*;
use std::sync::Arc;
use std::time::Duration;

const HUMAN: ParticipantId = ParticipantId(0);
const BOT: ParticipantId = ParticipantId(1);

/// Thinks for `delay`, then passes.
struct SlowAgent {
    participant: ParticipantId,
    delay: Duration,
}

impl Agent for SlowAgent {
    fn name(&self) -> &str { "Slow" }
    fn participant(&self) -> ParticipantId { self.participant }

    fn decide(&mut self, _view: &AgentView) -> Option<Command> {
        std::thread::sleep(self.delay);
        None
    }

    fn choose_city_action(&mut self, _view: &AgentView, _city: CityId) -> Option<Command> { None }
    fn choose_unit_action(&mut self, _view: &AgentView, _unit: UnitId) -> Option<Command> { None }
}

fn host_with(rules: RulesConfig) -> GameHost {
    GameHost::new(Arc::new(rules))
}

fn host() -> GameHost {
    host_with((*RulesConfig::builtin()).clone())
}

fn setup(seed: u64) -> GameSetup {
    let mut setup = GameSetup::human_vs_ai(seed, 1);
    setup.starting_stock = ResourceKind::ALL.iter().map(|k| (*k, 50)).collect();
    setup
}

fn bot(kind: AgentKind, seed: u64) -> Vec<Box<dyn Agent>> {
    vec![make_agent(kind, BOT, seed)]
}

fn slow_bot(delay: Duration) -> Vec<Box<dyn Agent>> {
    vec![Box::new(SlowAgent { participant: BOT, delay })]
}

fn home_city(host: &GameHost, game: GameId) -> CityId {
    host.snapshot(game).unwrap().cities_of(HUMAN).next().unwrap().id
}

fn spawn(city_id: CityId) -> Command {
    Command::SpawnUnit { city_id, unit_type: "warrior".into() }
}

// ── Basics ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_publishes_snapshot() {
    let host = host();
    let game = host.create_game(&setup(1), bot(AgentKind::Heuristic, 1)).unwrap();
    let city = home_city(&host, game);
    let before = host.snapshot(game).unwrap().units.len();

    let response = host.submit(game, HUMAN, spawn(city), None).await.unwrap();
    assert_eq!(response.snapshot().units.len(), before + 1);
    assert_eq!(*host.snapshot(game).unwrap(), *response.snapshot());
}

#[tokio::test]
async fn test_unknown_game() {
    let host = host();
    assert!(matches!(host.snapshot(GameId(404)), Err(HostError::GameNotFound(GameId(404)))));
    assert!(matches!(
        host.end_turn(GameId(404), HUMAN, None).await,
        Err(HostError::GameNotFound(_))
    ));
}

#[tokio::test]
async fn test_ai_seat_requires_agent() {
    let host = host();
    let err = host.create_game(&setup(1), Vec::new()).unwrap_err();
    assert!(matches!(err.action(), Some(ActionError::InvalidInput(_))));
    assert!(host.games().is_empty());
}

#[tokio::test]
async fn test_end_turn_runs_ai_and_returns_to_human() {
    let host = host();
    let game = host.create_game(&setup(2), bot(AgentKind::Heuristic, 2)).unwrap();

    let response = host.end_turn(game, HUMAN, None).await.unwrap();
    let summary = response.summary().unwrap();
    assert_eq!(summary.turn, 1);
    assert_eq!(summary.ended_by, HUMAN);
    assert_eq!(summary.next_active, HUMAN);
    assert!(summary.ai_ran);
    assert!(!summary.ai_timed_out);
    assert!(summary.ai_actions >= 1);

    let snap = host.snapshot(game).unwrap();
    assert_eq!(snap.game.turn, 2);
    assert_eq!(snap.game.active, HUMAN);
    assert!(!snap.game.turn_in_progress);
}

#[tokio::test]
async fn test_end_turn_via_submit() {
    let host = host();
    let game = host.create_game(&setup(3), bot(AgentKind::Random, 3)).unwrap();
    let response = host.submit(game, HUMAN, Command::EndTurn, None).await.unwrap();
    assert!(response.summary().is_some());
    assert_eq!(host.snapshot(game).unwrap().game.turn, 2);
}

#[tokio::test]
async fn test_wrong_caller_cannot_end_turn() {
    let host = host();
    let game = host.create_game(&setup(4), bot(AgentKind::Random, 4)).unwrap();
    let err = host.end_turn(game, BOT, None).await.unwrap_err();
    assert_eq!(err.action(), Some(&ActionError::NotPlayerTurn));
    // The flag was released on the error path.
    host.end_turn(game, HUMAN, None).await.unwrap();
}

// ── Concurrency ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_commands_rejected_during_ai_turn() {
    let host = Arc::new(host());
    let game = host.create_game(&setup(5), slow_bot(Duration::from_millis(400))).unwrap();
    let city = home_city(&host, game);

    let ending = {
        let host = host.clone();
        tokio::spawn(async move { host.end_turn(game, HUMAN, None).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = host.submit(game, HUMAN, spawn(city), None).await.unwrap_err();
    assert_eq!(err.action(), Some(&ActionError::TurnInProgress));
    let err = host.end_turn(game, HUMAN, None).await.unwrap_err();
    assert_eq!(err.action(), Some(&ActionError::TurnInProgress));

    // Reads still answer, from the last committed state.
    assert_eq!(host.snapshot(game).unwrap().game.turn, 1);

    let response = ending.await.unwrap().unwrap();
    assert_eq!(response.summary().unwrap().next_active, HUMAN);
    host.submit(game, HUMAN, spawn(city), None).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ai_timeout_still_advances_turn() {
    let mut rules = (*RulesConfig::builtin()).clone();
    rules.ai_turn_budget_ms = 50;
    let host = host_with(rules);
    let game = host.create_game(&setup(6), slow_bot(Duration::from_millis(300))).unwrap();

    let response = host.end_turn(game, HUMAN, None).await.unwrap();
    let summary = response.summary().unwrap();
    assert!(summary.ai_ran);
    assert!(summary.ai_timed_out);
    assert_eq!(summary.next_active, HUMAN);

    let snap = host.snapshot(game).unwrap();
    assert_eq!(snap.game.turn, 2);
    assert!(!snap.game.turn_in_progress);

    let city = home_city(&host, game);
    host.submit(game, HUMAN, spawn(city), None).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_games_run_in_parallel() {
    let host = Arc::new(host());
    let games: Vec<GameId> = (0..8)
        .map(|seed| host.create_game(&setup(seed), bot(AgentKind::Heuristic, seed)).unwrap())
        .collect();

    let mut tasks = tokio::task::JoinSet::new();
    for game in games.clone() {
        let host = host.clone();
        tasks.spawn(async move {
            for _ in 0..3 {
                host.end_turn(game, HUMAN, None).await?;
            }
            Ok::<_, HostError>(game)
        });
    }
    while let Some(done) = tasks.join_next().await {
        done.unwrap().unwrap();
    }

    assert_eq!(host.games(), games);
    for game in games {
        assert_eq!(host.snapshot(game).unwrap().game.turn, 4);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_end_turn_leaves_game_untouched() {
    let host = host();
    let game = host.create_game(&setup(11), slow_bot(Duration::from_millis(400))).unwrap();
    let handle = host.handle(game).unwrap();
    let before = handle.state().await;

    // The caller gives up while the AI seat is still thinking.
    let cut = tokio::time::timeout(Duration::from_millis(100), host.end_turn(game, HUMAN, None)).await;
    assert!(cut.is_err());

    assert_eq!(handle.state().await, before);
    assert!(!handle.guard.is_held());
    assert_eq!(host.snapshot(game).unwrap().game.active, HUMAN);

    let city = home_city(&host, game);
    host.submit(game, HUMAN, spawn(city), None).await.unwrap();
    let response = host.end_turn(game, HUMAN, None).await.unwrap();
    assert_eq!(response.summary().unwrap().turn, 1);
    assert_eq!(response.summary().unwrap().next_active, HUMAN);
    assert_eq!(host.snapshot(game).unwrap().game.turn, 2);
}

// ── Idempotency ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_replayed_command_counts_once() {
    let host = host();
    // A passive bot keeps the ledger to the human's own production.
    let game = host.create_game(&setup(7), slow_bot(Duration::ZERO)).unwrap();
    let city = home_city(&host, game);
    let key = Some("spawn-1".to_string());

    let first = host.submit(game, HUMAN, spawn(city), key.clone()).await.unwrap();
    let second = host.submit(game, HUMAN, spawn(city), key.clone()).await.unwrap();
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());

    let conflict = host
        .submit(game, HUMAN, Command::BuildBuilding { city_id: city, building: "walls".into() }, key)
        .await
        .unwrap_err();
    assert_eq!(conflict.action(), Some(&ActionError::IdempotencyConflict));

    let response = host.end_turn(game, HUMAN, None).await.unwrap();
    assert_eq!(response.summary().unwrap().produced_units, vec!["warrior".to_string()]);
}

#[tokio::test]
async fn test_replayed_end_turn_does_not_advance_twice() {
    let host = host();
    let game = host.create_game(&setup(8), bot(AgentKind::Random, 8)).unwrap();
    let key = Some("end-1".to_string());

    let first = host.end_turn(game, HUMAN, key.clone()).await.unwrap();
    let second = host.end_turn(game, HUMAN, key).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(host.snapshot(game).unwrap().game.turn, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_answered_during_ai_turn() {
    let host = Arc::new(host());
    let game = host.create_game(&setup(12), slow_bot(Duration::from_millis(400))).unwrap();
    let city = home_city(&host, game);
    let first = host.submit(game, HUMAN, spawn(city), Some("k1".into())).await.unwrap();

    let ending = {
        let host = host.clone();
        tokio::spawn(async move { host.end_turn(game, HUMAN, None).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let retry = host.submit(game, HUMAN, spawn(city), Some("k1".into())).await.unwrap();
    assert_eq!(retry, first);
    // Fresh keys still wait for the turn.
    let err = host
        .submit(game, HUMAN, Command::BuildBuilding { city_id: city, building: "walls".into() }, Some("k2".into()))
        .await
        .unwrap_err();
    assert_eq!(err.action(), Some(&ActionError::TurnInProgress));

    ending.await.unwrap().unwrap();
}

// ── Persistence ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let store = SqliteStore::in_memory().unwrap();
    let host = host();
    let game = host.create_game(&setup(9), bot(AgentKind::Heuristic, 9)).unwrap();
    host.end_turn(game, HUMAN, None).await.unwrap();
    host.save(game, &store).await.unwrap();

    let restored = self::host();
    let id = restored.load(&store, game, bot(AgentKind::Heuristic, 9)).unwrap();
    assert_eq!(id, game);
    assert_eq!(*restored.snapshot(id).unwrap(), *host.snapshot(game).unwrap());

    // New games never reuse a loaded id.
    let next = restored.create_game(&setup(10), bot(AgentKind::Random, 10)).unwrap();
    assert!(next > game);

    assert!(matches!(
        restored.load(&store, GameId(999), Vec::new()),
        Err(HostError::GameNotFound(GameId(999)))
    ));
}
