//! Integration tests for gift redemption.

mod common;

use common::Fixture;
use gamehub_ledger::ledger::{LedgerError, PageRequest, Role, User};
use gamehub_ledger::rewards::{Game, PointActionType};

/// Developer with one points-enabled game
async fn studio(fx: &Fixture, email: &str) -> (User, Game) {
    let dev = fx.user(email, Role::Developer, 0).await;
    let game = fx.store.insert_game(dev.id, "Orbit", true).await;
    (dev, game)
}

async fn grant(fx: &Fixture, player: &User, game: &Game, points: i64) {
    fx.ledger
        .rewards()
        .award(player.id, game.id, PointActionType::DownloadGame, Some(points))
        .await
        .expect("Award should succeed");
}

#[tokio::test]
async fn test_redemption_scenario() {
    let fx = Fixture::new().await;
    let (dev, game) = studio(&fx, "studio@gamehub.test").await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let gift = fx.store.insert_gift(dev.id, "Sticker pack", 30, 2).await;
    grant(&fx, &player, &game, 50).await;

    let record = fx
        .ledger
        .gifts()
        .redeem(&player.email, gift.id)
        .await
        .expect("Redemption should succeed");
    assert_eq!(record.points_spent, 30);

    let rewards = fx.ledger.rewards();
    assert_eq!(
        rewards.points_for_developer(player.id, dev.id).await.unwrap(),
        20
    );
    assert_eq!(fx.store.gift(gift.id).await.unwrap().quantity, 1);

    let again = fx.ledger.gifts().redeem(&player.email, gift.id).await;
    assert!(matches!(
        again,
        Err(LedgerError::InsufficientPoints {
            available: 20,
            required: 30
        })
    ));
    assert_eq!(fx.store.gift(gift.id).await.unwrap().quantity, 1);
    assert_eq!(
        rewards.points_for_developer(player.id, dev.id).await.unwrap(),
        20
    );
    assert_eq!(fx.store.gift_transaction_count().await, 1);
}

#[tokio::test]
async fn test_out_of_stock_spends_nothing() {
    let fx = Fixture::new().await;
    let (dev, game) = studio(&fx, "studio@gamehub.test").await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let gift = fx.store.insert_gift(dev.id, "Poster", 10, 0).await;
    grant(&fx, &player, &game, 50).await;

    let result = fx.ledger.gifts().redeem(&player.email, gift.id).await;
    assert!(matches!(result, Err(LedgerError::OutOfStock(id)) if id == gift.id));
    assert_eq!(
        fx.ledger
            .rewards()
            .points_for_developer(player.id, dev.id)
            .await
            .unwrap(),
        50
    );
    assert_eq!(fx.store.gift_transaction_count().await, 0);
}

#[tokio::test]
async fn test_points_from_other_developer_do_not_count() {
    let fx = Fixture::new().await;
    let (dev, _) = studio(&fx, "studio@gamehub.test").await;
    let (_, other_game) = studio(&fx, "other@gamehub.test").await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let gift = fx.store.insert_gift(dev.id, "Keychain", 30, 5).await;
    grant(&fx, &player, &other_game, 100).await;

    let result = fx.ledger.gifts().redeem(&player.email, gift.id).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientPoints {
            available: 0,
            required: 30
        })
    ));
    assert_eq!(fx.store.gift(gift.id).await.unwrap().quantity, 5);
}

#[tokio::test]
async fn test_unknown_gift_not_found() {
    let fx = Fixture::new().await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;

    let result = fx.ledger.gifts().redeem(&player.email, 777).await;
    assert!(matches!(
        result,
        Err(LedgerError::NotFound { entity: "Gift", .. })
    ));
}

#[tokio::test]
async fn test_history_newest_first() {
    let fx = Fixture::new().await;
    let (dev, game) = studio(&fx, "studio@gamehub.test").await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let cheap = fx.store.insert_gift(dev.id, "Badge", 5, 10).await;
    let pricey = fx.store.insert_gift(dev.id, "Hoodie", 40, 10).await;
    grant(&fx, &player, &game, 100).await;

    fx.ledger.gifts().redeem(&player.email, cheap.id).await.unwrap();
    fx.ledger
        .gifts()
        .redeem(&player.email, pricey.id)
        .await
        .unwrap();

    let history = fx
        .ledger
        .gifts()
        .history(&player.email, PageRequest::default())
        .await
        .unwrap();
    let gifts: Vec<_> = history.items.iter().map(|t| t.gift_id).collect();
    assert_eq!(gifts, vec![pricey.id, cheap.id]);
    assert_eq!(history.items[0].points_spent, 40);
}

#[tokio::test]
async fn test_cost_change_after_redemption_keeps_points_spent() {
    let fx = Fixture::new().await;
    let (dev, game) = studio(&fx, "studio@gamehub.test").await;
    let player = fx.user("player@gamehub.test", Role::Player, 0).await;
    let gift = fx.store.insert_gift(dev.id, "Sticker pack", 30, 3).await;
    grant(&fx, &player, &game, 100).await;

    fx.ledger.gifts().redeem(&player.email, gift.id).await.unwrap();
    fx.store.update_gift_cost(gift.id, 45).await.unwrap();
    fx.ledger.gifts().redeem(&player.email, gift.id).await.unwrap();

    let history = fx
        .ledger
        .gifts()
        .history(&player.email, PageRequest::default())
        .await
        .unwrap();
    let spent: Vec<_> = history.items.iter().map(|t| t.points_spent).collect();
    assert_eq!(spent, vec![45, 30], "Newest first, each at its own price");
    assert_eq!(
        fx.ledger
            .rewards()
            .points_for_developer(player.id, dev.id)
            .await
            .unwrap(),
        25
    );
}
