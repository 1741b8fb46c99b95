//! Side pot and chip conservation tests
//!
//! These tests drive the rules engine against the in-memory ledger and check
//! that every settled hand:
//! - Pays out exactly the pot
//! - Returns the unmatched excess to the larger contributor
//! - Leaves the sum of both balances unchanged

use holdem_arena::auth::{AuthManager, RegisterRequest};
use holdem_arena::db::MemoryStore;
use holdem_arena::game::{
    Action, ActionKind, RulesEngine,
    entities::{Card, Deck},
    functional::compute_pot,
};
use holdem_arena::wallet::{EntryDirection, Ledger};
use proptest::prelude::*;
use std::sync::Arc;

async fn funded(alice: i64, bob: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthManager::new(store.clone());
    for (agent_id, balance) in [("alice", alice), ("bob", bob)] {
        auth.register_agent(RegisterRequest {
            agent_id: agent_id.to_string(),
            display_name: None,
            api_key: "secret-key-0001".to_string(),
            initial_balance: balance,
        })
        .await
        .unwrap();
    }
    store
}

fn c(code: &str) -> Card {
    code.parse().unwrap()
}

/// Deck dealing `seat0` and `seat1` as hole cards (seat 0 deals first) and
/// then `board`.
fn stacked(seat0: [&str; 2], seat1: [&str; 2], board: [&str; 5]) -> Deck {
    let mut cards = vec![c(seat1[0]), c(seat0[0]), c(seat1[1]), c(seat0[1])];
    cards.extend(board.iter().map(|code| c(code)));
    Deck::from_cards(cards)
}

async fn balances(store: &MemoryStore) -> (i64, i64) {
    (
        store.balance("alice").await.unwrap(),
        store.balance("bob").await.unwrap(),
    )
}

/// Seat 0 shoves, seat 1 calls, the board runs out and the hand settles.
async fn all_in_hand(store: &MemoryStore, deck: Option<Deck>) -> holdem_arena::Settlement {
    let mut engine = RulesEngine::new("side-pot", 30);
    match deck {
        Some(deck) => engine
            .start_hand_with_deck("alice", "bob", 10, 20, deck, store)
            .await
            .unwrap(),
        None => engine.start_hand("alice", "bob", 10, 20, store).await.unwrap(),
    }
    engine
        .apply_action(&Action::new(0, ActionKind::AllIn), store)
        .await
        .unwrap();
    let complete = engine
        .apply_action(&Action::new(1, ActionKind::Call), store)
        .await
        .unwrap();
    assert!(complete);
    engine.fast_forward_to_showdown().unwrap();
    engine.settle(store).await.unwrap()
}

#[tokio::test]
async fn test_short_stack_wins_main_pot_only() {
    let store = funded(1_000, 300).await;
    // Bob (seat 1) holds aces
    let deck = stacked(["2c", "7d"], ["As", "Ah"], ["Kc", "9s", "4h", "3d", "Jc"]);
    let settlement = all_in_hand(&store, Some(deck)).await;

    assert_eq!(settlement.winner, "bob");
    assert_eq!(settlement.main_pot, 600);
    assert_eq!(settlement.side_pot, 700);
    assert_eq!(settlement.payouts, [700, 600]);
    assert_eq!(balances(&store).await, (700, 600));
}

#[tokio::test]
async fn test_big_stack_wins_everything() {
    let store = funded(1_000, 300).await;
    // Alice (seat 0) holds aces
    let deck = stacked(["As", "Ah"], ["2c", "7d"], ["Kc", "9s", "4h", "3d", "Jc"]);
    let settlement = all_in_hand(&store, Some(deck)).await;

    assert_eq!(settlement.winner, "alice");
    assert_eq!(settlement.pot, 1_300);
    assert_eq!(settlement.payouts, [1_300, 0]);
    assert_eq!(balances(&store).await, (1_300, 0));
}

#[tokio::test]
async fn test_split_main_pot_still_returns_side_pot() {
    let store = funded(500, 200).await;
    // Royal flush on board, both play the board
    let deck = stacked(["2c", "3d"], ["2h", "3s"], ["As", "Ks", "Qs", "Js", "Ts"]);
    let settlement = all_in_hand(&store, Some(deck)).await;

    assert_eq!(settlement.main_pot, 400);
    assert_eq!(settlement.side_pot, 300);
    assert_eq!(settlement.payouts, [500, 200]);
    assert_eq!(balances(&store).await, (500, 200));
}

#[tokio::test]
async fn test_ledger_records_every_transfer() {
    let store = funded(1_000, 300).await;
    let deck = stacked(["2c", "7d"], ["As", "Ah"], ["Kc", "9s", "4h", "3d", "Jc"]);
    all_in_hand(&store, Some(deck)).await;

    let debited: i64 = store
        .ledger_entries("alice")
        .iter()
        .filter(|entry| entry.direction == EntryDirection::Debit)
        .map(|entry| -entry.amount)
        .sum();
    assert_eq!(debited, 1_000);
}

#[test]
fn test_compute_pot_shapes() {
    let split = compute_pot(300, 1_000);
    assert_eq!(split.main, 600);
    assert_eq!(split.side, 700);
    assert_eq!(split.side_owner, Some(1));

    let even = compute_pot(250, 250);
    assert!(!even.has_side);
    assert_eq!(even.side_owner, None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_all_in_hands_conserve_chips(alice in 100i64..5_000, bob in 100i64..5_000) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (settlement, after) = runtime.block_on(async {
            let store = funded(alice, bob).await;
            let settlement = all_in_hand(&store, None).await;
            (settlement, balances(&store).await)
        });

        prop_assert_eq!(after.0 + after.1, alice + bob);
        prop_assert_eq!(settlement.payouts[0] + settlement.payouts[1], settlement.pot);
        // Seat 0 shoves everything; seat 1 can only match up to its stack
        prop_assert_eq!(settlement.pot, alice + alice.min(bob));
        prop_assert_eq!(settlement.side_pot, (alice - bob).max(0));

        // The unmatched excess always goes back to the shover
        prop_assert!(settlement.payouts[0] >= (alice - bob).max(0));
    }

    #[test]
    fn test_compute_pot_conserves(a in 0i64..100_000, b in 0i64..100_000) {
        let split = compute_pot(a, b);
        prop_assert_eq!(split.main + split.side, a + b);
        prop_assert_eq!(split.has_side, a != b);
    }
}
