/// Property-based tests for ledger invariants using proptest
///
/// These tests drive random operation sequences through every engine and
/// check that money is conserved and no balance, point total or gift stock
/// ever goes negative.
mod common;

use common::{ADMIN, Fixture, bank_details};
use gamehub_ledger::escrow::FeeSplit;
use gamehub_ledger::ledger::{LedgerError, PageRequest, Role, User};
use gamehub_ledger::rewards::PointActionType;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Purchase { buyer: usize, asset: usize },
    Approve(usize),
    Reject(usize),
    Deposit { user: usize, amount: i64 },
    ApproveDeposit(usize),
    Withdraw { user: usize, amount: i64 },
    ApproveWithdraw(usize),
    Award { player: usize, review: bool, points: i64 },
    Redeem { player: usize, gift: usize },
}

// Strategy to generate one engine operation over small index ranges
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 0usize..4).prop_map(|(buyer, asset)| Op::Purchase { buyer, asset }),
        (0usize..8).prop_map(Op::Approve),
        (0usize..8).prop_map(Op::Reject),
        (0usize..3, 1i64..500).prop_map(|(user, amount)| Op::Deposit { user, amount }),
        (0usize..8).prop_map(Op::ApproveDeposit),
        (0usize..3, 1i64..800).prop_map(|(user, amount)| Op::Withdraw { user, amount }),
        (0usize..8).prop_map(Op::ApproveWithdraw),
        (0usize..3, any::<bool>(), 0i64..60)
            .prop_map(|(player, review, points)| Op::Award { player, review, points }),
        (0usize..3, 0usize..2).prop_map(|(player, gift)| Op::Redeem { player, gift }),
    ]
}

/// Errors any random sequence may legitimately produce
fn expected(err: &LedgerError) -> bool {
    matches!(
        err,
        LedgerError::Validation(_)
            | LedgerError::InvalidState { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientPoints { .. }
            | LedgerError::OutOfStock(_)
            | LedgerError::AlreadyAwarded { .. }
    )
}

fn check(result: Result<(), LedgerError>) {
    if let Err(e) = result {
        assert!(expected(&e), "Unexpected error: {e:?}");
    }
}

async fn run(balances: Vec<i64>, prices: Vec<i64>, ops: Vec<Op>) {
    let fx = Fixture::new().await;

    let mut users: Vec<User> = Vec::new();
    for (i, balance) in balances.iter().enumerate() {
        let user = fx
            .user(&format!("user{i}@gamehub.test"), Role::Developer, *balance)
            .await;
        fx.ledger
            .payments()
            .upsert_payment_info(&user.email, bank_details(), None)
            .await
            .unwrap();
        users.push(user);
    }
    let designer = fx.user("designer@gamehub.test", Role::Designer, 0).await;
    let studio = fx.user("studio@gamehub.test", Role::Developer, 0).await;

    let mut assets = Vec::new();
    for price in &prices {
        assets.push(fx.store.insert_asset(designer.id, "Pack", *price).await);
    }
    let games = [
        fx.store.insert_game(studio.id, "Orbit", true).await,
        fx.store.insert_game(studio.id, "Drift", true).await,
    ];
    let gifts = [
        fx.store.insert_gift(studio.id, "Badge", 15, 2).await,
        fx.store.insert_gift(studio.id, "Hoodie", 40, 1).await,
    ];

    let initial: i64 = balances.iter().sum();
    let mut escrows = Vec::new();
    let mut deposits = Vec::new();
    let mut withdraws = Vec::new();
    let mut deposited = 0i64;
    let mut withdrawn = 0i64;
    let mut redeemed = [0i64; 2];

    for (step, op) in ops.into_iter().enumerate() {
        match op {
            Op::Purchase { buyer, asset } => check(
                fx.ledger
                    .escrow()
                    .purchase_asset(&users[buyer].email, assets[asset].id)
                    .await
                    .map(|tx| escrows.push(tx.id)),
            ),
            Op::Approve(i) => {
                if let Some(id) = escrows.get(i) {
                    check(fx.ledger.escrow().approve(*id, ADMIN).await.map(|_| ()));
                }
            }
            Op::Reject(i) => {
                if let Some(id) = escrows.get(i) {
                    check(fx.ledger.escrow().reject(*id, ADMIN, None).await.map(|_| ()));
                }
            }
            Op::Deposit { user, amount } => check(
                fx.ledger
                    .payments()
                    .create_deposit(&users[user].email, amount, None)
                    .await
                    .map(|r| deposits.push((r.id, r.amount))),
            ),
            Op::ApproveDeposit(i) => {
                if let Some((id, amount)) = deposits.get(i).copied() {
                    check(
                        fx.ledger
                            .payments()
                            .approve_deposit(id, ADMIN, None)
                            .await
                            .map(|_| deposited += amount),
                    );
                }
            }
            Op::Withdraw { user, amount } => check(
                fx.ledger
                    .payments()
                    .create_withdraw(&users[user].email, amount, None)
                    .await
                    .map(|r| withdraws.push((r.id, r.amount))),
            ),
            Op::ApproveWithdraw(i) => {
                if let Some((id, amount)) = withdraws.get(i).copied() {
                    check(
                        fx.ledger
                            .payments()
                            .approve_withdraw(id, ADMIN, None)
                            .await
                            .map(|_| withdrawn += amount),
                    );
                }
            }
            Op::Award {
                player,
                review,
                points,
            } => {
                let action = if review {
                    PointActionType::WriteReview
                } else {
                    PointActionType::DownloadGame
                };
                check(
                    fx.ledger
                        .rewards()
                        .award(users[player].id, games[step % 2].id, action, Some(points))
                        .await
                        .map(|_| ()),
                );
            }
            Op::Redeem { player, gift } => check(
                fx.ledger
                    .gifts()
                    .redeem(&users[player].email, gifts[gift].id)
                    .await
                    .map(|_| redeemed[gift] += 1),
            ),
        }

        for user in users.iter().chain([&designer, &fx.admin]) {
            assert!(fx.balance(user).await >= 0, "Balance went negative");
        }
    }

    // Money is conserved: every unit is either on an account or held in escrow
    let held: i64 = fx
        .ledger
        .escrow()
        .pending(PageRequest::new(0, 100))
        .await
        .unwrap()
        .items
        .iter()
        .map(|tx| tx.amount)
        .sum();
    let mut on_accounts = 0;
    for user in users.iter().chain([&designer, &studio, &fx.admin]) {
        on_accounts += fx.balance(user).await;
    }
    assert_eq!(on_accounts + held, initial + deposited - withdrawn);

    for user in &users {
        let totals = fx.ledger.rewards().points_by_developer(user.id).await.unwrap();
        assert!(totals.iter().all(|p| p.total_points >= 0));
    }

    for (gift, count) in gifts.iter().zip(redeemed) {
        let quantity = fx.store.gift(gift.id).await.unwrap().quantity;
        assert!(quantity >= 0);
        assert_eq!(quantity, gift.quantity - count);
    }
}

proptest! {
    #[test]
    fn test_fee_split_conserves_amount(amount in 1i64..=i64::MAX / 100) {
        let split = FeeSplit::compute(amount).unwrap();
        prop_assert_eq!(split.platform_fee + split.seller_amount, amount);
        prop_assert!(split.platform_fee >= 0);
        prop_assert!(split.seller_amount >= 0);

        // Half-up rounding of 10%: the fee is within half a unit of amount / 10
        let doubled_error = (split.platform_fee * 20 - amount * 2).abs();
        prop_assert!(doubled_error <= 10);
    }

    #[test]
    fn test_fee_split_rejects_non_positive(amount in i64::MIN..=0) {
        prop_assert!(matches!(FeeSplit::compute(amount), Err(LedgerError::Validation(_))));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_random_sequences_keep_invariants(
        balances in prop::collection::vec(0i64..2000, 3),
        prices in prop::collection::vec(1i64..700, 4),
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(balances, prices, ops));
    }
}
