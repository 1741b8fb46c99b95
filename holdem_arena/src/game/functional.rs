use std::cmp::Ordering;

use super::entities::{Card, Chips, HandValue, Rank, SeatIndex, Value};

/// Rank exactly five cards.
#[must_use]
pub fn eval_five(cards: &[Card; 5]) -> HandValue {
    let mut values: Vec<Value> = cards.iter().map(|c| c.0).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.1 == cards[0].1);
    let straight_high = straight_high(&values);

    // (count, value) groups, largest group first, then highest value.
    let mut groups: Vec<(usize, Value)> = Vec::with_capacity(5);
    for &value in &values {
        match groups.iter_mut().find(|(_, v)| *v == value) {
            Some(group) => group.0 += 1,
            None => groups.push((1, value)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));
    let grouped: Vec<Value> = groups.iter().map(|&(_, v)| v).collect();

    let (rank, values) = match (straight_high, is_flush, groups[0].0, groups.get(1).map(|g| g.0)) {
        (Some(high), true, _, _) => (Rank::StraightFlush, vec![high]),
        (_, _, 4, _) => (Rank::FourOfAKind, grouped),
        (_, _, 3, Some(2)) => (Rank::FullHouse, grouped),
        (_, true, _, _) => (Rank::Flush, values),
        (Some(high), false, _, _) => (Rank::Straight, vec![high]),
        (_, _, 3, _) => (Rank::ThreeOfAKind, grouped),
        (_, _, 2, Some(2)) => (Rank::TwoPair, grouped),
        (_, _, 2, _) => (Rank::OnePair, grouped),
        _ => (Rank::HighCard, values),
    };
    HandValue { rank, values }
}

/// High card of a straight in `sorted` (descending), or `None`. The wheel
/// (A-2-3-4-5) is a five-high straight.
fn straight_high(sorted: &[Value]) -> Option<Value> {
    let distinct = sorted.windows(2).all(|w| w[0] != w[1]);
    if !distinct || sorted.len() != 5 {
        return None;
    }
    if sorted[0] - sorted[4] == 4 {
        return Some(sorted[0]);
    }
    if sorted == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}

/// Best five-card hand out of `cards` (five to seven cards). With fewer
/// than five cards, ranks the cards present as a high-card/pairs hand.
#[must_use]
pub fn evaluate(cards: &[Card]) -> HandValue {
    let n = cards.len();
    if n < 5 {
        let mut values: Vec<Value> = cards.iter().map(|c| c.0).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        let pair = values.windows(2).find(|w| w[0] == w[1]).map(|w| w[0]);
        return match pair {
            Some(p) => {
                let mut rest: Vec<Value> = values.into_iter().filter(|v| *v != p).collect();
                rest.insert(0, p);
                HandValue {
                    rank: Rank::OnePair,
                    values: rest,
                }
            }
            None => HandValue {
                rank: Rank::HighCard,
                values,
            },
        };
    }

    let mut best: Option<HandValue> = None;
    for a in 0..n {
        for b in (a + 1)..n {
            for c in (b + 1)..n {
                for d in (c + 1)..n {
                    for e in (d + 1)..n {
                        let hand = eval_five(&[cards[a], cards[b], cards[c], cards[d], cards[e]]);
                        if best.as_ref().is_none_or(|current| hand > *current) {
                            best = Some(hand);
                        }
                    }
                }
            }
        }
    }
    best.unwrap_or(HandValue {
        rank: Rank::HighCard,
        values: Vec::new(),
    })
}

/// Compare two hole-plus-board card sets.
#[must_use]
pub fn compare_hands(a: &[Card], b: &[Card]) -> Ordering {
    evaluate(a).cmp(&evaluate(b))
}

/// Main/side pot split for a heads-up hand.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PotSplit {
    pub main: Chips,
    pub side: Chips,
    pub has_side: bool,
    /// Seat that contributed the excess, and is the only one eligible for
    /// the side pot.
    pub side_owner: Option<SeatIndex>,
}

/// Split two contributions into a main pot both seats contest and a side
/// pot holding the larger contributor's excess.
#[must_use]
pub fn compute_pot(contrib_a: Chips, contrib_b: Chips) -> PotSplit {
    let matched = contrib_a.min(contrib_b);
    let side = (contrib_a - contrib_b).abs();
    let side_owner = match contrib_a.cmp(&contrib_b) {
        Ordering::Greater => Some(0),
        Ordering::Less => Some(1),
        Ordering::Equal => None,
    };
    PotSplit {
        main: matched * 2,
        side,
        has_side: side > 0,
        side_owner,
    }
}
