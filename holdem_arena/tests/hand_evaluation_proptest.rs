/// Property-based tests for hand evaluation using proptest
///
/// These tests check the evaluator's ordering laws across randomly
/// generated card combinations.
use holdem_arena::game::{
    entities::{Card, Rank, Suit},
    functional::{compare_hands, eval_five, evaluate},
};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;

// Strategy to generate a valid card (values 2-14, aces high)
fn card_strategy() -> impl Strategy<Value = Card> {
    (2u8..=14, 0usize..4).prop_map(|(value, suit)| Card(value, Suit::ALL[suit]))
}

// Strategy to generate a vec of unique cards (no duplicates)
fn unique_cards_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<Card>> {
    prop::collection::vec(card_strategy(), min..=max).prop_filter("Cards must be unique", |cards| {
        let set: BTreeSet<_> = cards.iter().collect();
        set.len() == cards.len()
    })
}

// Two hole cards for each seat plus a five-card board, all distinct
fn showdown_strategy() -> impl Strategy<Value = (Vec<Card>, Vec<Card>)> {
    unique_cards_strategy(9, 9).prop_map(|cards| {
        let board = &cards[4..];
        let mut a = cards[0..2].to_vec();
        let mut b = cards[2..4].to_vec();
        a.extend_from_slice(board);
        b.extend_from_slice(board);
        (a, b)
    })
}

fn five(cards: &[Card]) -> [Card; 5] {
    [cards[0], cards[1], cards[2], cards[3], cards[4]]
}

proptest! {
    #[test]
    fn test_evaluate_is_deterministic(cards in unique_cards_strategy(7, 7)) {
        prop_assert_eq!(evaluate(&cards), evaluate(&cards));
    }

    #[test]
    fn test_evaluate_ignores_card_order(cards in unique_cards_strategy(7, 7)) {
        let mut reversed = cards.clone();
        reversed.reverse();
        prop_assert_eq!(evaluate(&cards), evaluate(&reversed));
    }

    #[test]
    fn test_best_of_seven_beats_every_five_subset(cards in unique_cards_strategy(7, 7)) {
        let best = evaluate(&cards);
        for skip_a in 0..7 {
            for skip_b in (skip_a + 1)..7 {
                let subset: Vec<Card> = cards
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip_a && *i != skip_b)
                    .map(|(_, c)| *c)
                    .collect();
                prop_assert!(best >= eval_five(&five(&subset)));
            }
        }
    }

    #[test]
    fn test_adding_cards_never_weakens_a_hand(cards in unique_cards_strategy(7, 7)) {
        let five_card = evaluate(&cards[..5]);
        let six_card = evaluate(&cards[..6]);
        let seven_card = evaluate(&cards);
        prop_assert!(six_card >= five_card);
        prop_assert!(seven_card >= six_card);
    }

    #[test]
    fn test_comparison_is_antisymmetric((a, b) in showdown_strategy()) {
        prop_assert_eq!(compare_hands(&a, &b), compare_hands(&b, &a).reverse());
    }

    #[test]
    fn test_tiebreak_values_are_bounded(cards in unique_cards_strategy(5, 7)) {
        let hand = evaluate(&cards);
        prop_assert!(!hand.values.is_empty());
        prop_assert!(hand.values.len() <= 5);
        prop_assert!(hand.values.iter().all(|v| (2..=14).contains(v)));
    }

    #[test]
    fn test_flush_requires_five_of_a_suit(cards in unique_cards_strategy(5, 5)) {
        let hand = eval_five(&five(&cards));
        let suited = cards.iter().all(|c| c.1 == cards[0].1);
        let is_flush = matches!(hand.rank, Rank::Flush | Rank::StraightFlush);
        prop_assert_eq!(is_flush, suited);
    }
}

// Specific orderings between categories

#[test]
fn test_category_order() {
    let hands = [
        "As Jd 9c 6h 2s",
        "As Ad 9c 6h 2s",
        "As Ad 9c 9h 2s",
        "As Ad Ac 6h 2s",
        "5s 4d 3c 2h As",
        "Ks Js 9s 6s 2s",
        "Ks Kd Kc 6h 6s",
        "Ks Kd Kc Kh 6s",
        "9h 8h 7h 6h 5h",
    ];
    let values: Vec<_> = hands
        .iter()
        .map(|codes| {
            let cards: Vec<Card> = codes.split_whitespace().map(|c| c.parse().unwrap()).collect();
            eval_five(&five(&cards))
        })
        .collect();

    for pair in values.windows(2) {
        assert!(pair[0] < pair[1], "{:?} should lose to {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_wheel_is_lowest_straight() {
    let parse = |codes: &str| -> Vec<Card> { codes.split_whitespace().map(|c| c.parse().unwrap()).collect() };
    let wheel = evaluate(&parse("As 2d 3c 4h 5s"));
    let six_high = evaluate(&parse("2d 3c 4h 5s 6d"));
    assert_eq!(wheel.rank, Rank::Straight);
    assert_eq!(wheel.values, vec![5]);
    assert_eq!(
        compare_hands(&parse("As 2d 3c 4h 5s"), &parse("2d 3c 4h 5s 6d")),
        Ordering::Less
    );
    assert!(six_high > wheel);
}

#[test]
fn test_board_plays_for_both() {
    let board = "As Ks Qs Js Ts";
    let a: Vec<Card> = format!("2c 3d {board}").split_whitespace().map(|c| c.parse().unwrap()).collect();
    let b: Vec<Card> = format!("4h 5h {board}").split_whitespace().map(|c| c.parse().unwrap()).collect();
    assert_eq!(compare_hands(&a, &b), Ordering::Equal);
}
