//! Integration tests for exactly-once point awards and leaderboards.

mod common;

use common::Fixture;
use gamehub_ledger::ledger::{LedgerError, PageRequest, Role};
use gamehub_ledger::rewards::PointActionType;

#[tokio::test]
async fn test_award_is_exactly_once() {
    let fx = Fixture::new().await;
    let dev = fx.user("studio@gamehub.test", Role::Developer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;

    let first = fx
        .ledger
        .rewards()
        .award(player.id, game.id, PointActionType::DownloadGame, None)
        .await
        .expect("First award should succeed");
    assert_eq!(first.points, 10);

    let second = fx
        .ledger
        .rewards()
        .award(player.id, game.id, PointActionType::DownloadGame, None)
        .await;
    assert!(matches!(second, Err(LedgerError::AlreadyAwarded { .. })));

    assert_eq!(fx.store.point_transaction_count().await, 1);
    let total = fx
        .ledger
        .rewards()
        .points_for_developer(player.id, dev.id)
        .await
        .unwrap();
    assert_eq!(total, 10);
}

#[tokio::test]
async fn test_award_amounts() {
    let fx = Fixture::new().await;
    let dev = fx.user("studio@gamehub.test", Role::Developer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;
    let other = fx.store.insert_game(dev.id, "Drift", true).await;

    fx.ledger
        .rewards()
        .award(player.id, game.id, PointActionType::WriteReview, None)
        .await
        .unwrap();
    fx.ledger
        .rewards()
        .award(player.id, other.id, PointActionType::DownloadGame, Some(35))
        .await
        .unwrap();

    let total = fx
        .ledger
        .rewards()
        .points_for_developer(player.id, dev.id)
        .await
        .unwrap();
    assert_eq!(total, 55);

    let history = fx
        .ledger
        .rewards()
        .point_history(player.id, PageRequest::default())
        .await
        .unwrap();
    let points: Vec<_> = history.items.iter().map(|t| t.points).collect();
    assert_eq!(points, vec![35, 20], "Newest first");
}

#[tokio::test]
async fn test_award_preconditions() {
    let fx = Fixture::new().await;
    let dev = fx.user("studio@gamehub.test", Role::Developer, 0).await;
    let designer = fx.user("artist@gamehub.test", Role::Designer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let no_points = fx.store.insert_game(dev.id, "Quiet", false).await;
    let not_dev = fx.store.insert_game(designer.id, "Odd", true).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;

    let rewards = fx.ledger.rewards();
    assert!(matches!(
        rewards
            .award(player.id, no_points.id, PointActionType::DownloadGame, None)
            .await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        rewards
            .award(player.id, not_dev.id, PointActionType::DownloadGame, None)
            .await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        rewards
            .award(player.id, game.id, PointActionType::DownloadGame, Some(-5))
            .await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        rewards
            .award(player.id, 9999, PointActionType::DownloadGame, None)
            .await,
        Err(LedgerError::NotFound { entity: "Game", .. })
    ));
    assert!(matches!(
        rewards
            .award(9999, game.id, PointActionType::DownloadGame, None)
            .await,
        Err(LedgerError::NotFound { entity: "User", .. })
    ));

    assert_eq!(fx.store.point_transaction_count().await, 0);
}

#[tokio::test]
async fn test_best_effort_award_swallows_duplicates() {
    let fx = Fixture::new().await;
    let dev = fx.user("studio@gamehub.test", Role::Developer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;
    let quiet = fx.store.insert_game(dev.id, "Quiet", false).await;

    let rewards = fx.ledger.rewards();
    let first = rewards
        .award_best_effort(player.id, game.id, PointActionType::DownloadGame)
        .await
        .unwrap();
    assert!(first.is_some());

    let repeat = rewards
        .award_best_effort(player.id, game.id, PointActionType::DownloadGame)
        .await
        .unwrap();
    assert!(repeat.is_none());

    let unsupported = rewards
        .award_best_effort(player.id, quiet.id, PointActionType::DownloadGame)
        .await
        .unwrap();
    assert!(unsupported.is_none());

    assert_eq!(
        rewards
            .points_for_developer(player.id, dev.id)
            .await
            .unwrap(),
        10
    );
}

#[tokio::test]
async fn test_best_effort_award_surfaces_bad_catalog_data() {
    let fx = Fixture::new().await;
    let designer = fx.user("designer@gamehub.test", Role::Designer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let orphan = fx.store.insert_game(designer.id, "Orphan", true).await;

    let result = fx
        .ledger
        .rewards()
        .award_best_effort(player.id, orphan.id, PointActionType::DownloadGame)
        .await;
    match result {
        Err(LedgerError::Validation(msg)) => assert!(msg.contains("not owned by a developer")),
        other => panic!("Expected validation error, got {other:?}"),
    }

    let missing = fx
        .ledger
        .rewards()
        .award_best_effort(player.id, 9999, PointActionType::DownloadGame)
        .await;
    assert!(matches!(missing, Err(LedgerError::NotFound { .. })));
    assert_eq!(fx.store.point_transaction_count().await, 0);
}

#[tokio::test]
async fn test_points_are_per_developer() {
    let fx = Fixture::new().await;
    let dev_a = fx.user("a@gamehub.test", Role::Developer, 0).await;
    let dev_b = fx.user("b@gamehub.test", Role::Developer, 0).await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let game_a = fx.store.insert_game(dev_a.id, "Alpha", true).await;
    let game_b = fx.store.insert_game(dev_b.id, "Beta", true).await;

    let rewards = fx.ledger.rewards();
    rewards
        .award(player.id, game_a.id, PointActionType::DownloadGame, None)
        .await
        .unwrap();
    rewards
        .award(player.id, game_b.id, PointActionType::WriteReview, None)
        .await
        .unwrap();

    let totals = rewards.points_by_developer(player.id).await.unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].developer_id, dev_b.id);
    assert_eq!(totals[0].total_points, 20);
    assert_eq!(totals[1].developer_id, dev_a.id);
    assert_eq!(totals[1].total_points, 10);

    let stranger = fx.user("stranger@gamehub.test", Role::Developer, 0).await;
    assert_eq!(
        rewards
            .points_for_developer(player.id, stranger.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_leaderboard_ties_break_by_recency() {
    let fx = Fixture::new().await;
    let dev = fx.user("studio@gamehub.test", Role::Developer, 0).await;
    let early = fx.user("early@gamehub.test", Role::Player, 0).await;
    let late = fx.user("late@gamehub.test", Role::Player, 0).await;
    let top = fx.user("top@gamehub.test", Role::Player, 0).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;

    let rewards = fx.ledger.rewards();
    rewards
        .award(early.id, game.id, PointActionType::DownloadGame, Some(50))
        .await
        .unwrap();
    rewards
        .award(late.id, game.id, PointActionType::DownloadGame, Some(50))
        .await
        .unwrap();
    rewards
        .award(top.id, game.id, PointActionType::DownloadGame, Some(90))
        .await
        .unwrap();

    let board = rewards.leaderboard(dev.id, None).await.unwrap();
    let order: Vec<_> = board.iter().map(|e| e.player_id).collect();
    assert_eq!(order, vec![top.id, late.id, early.id]);
    let ranks: Vec<_> = board.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(board[0].player_email, "top@gamehub.test");

    let podium = rewards.leaderboard(dev.id, Some(2)).await.unwrap();
    assert_eq!(podium.len(), 2);
}
