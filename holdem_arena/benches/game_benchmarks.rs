use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use holdem_arena::{
    entities::{Card, Deck, Suit},
    functional::{compare_hands, compute_pot, evaluate},
};

/// Benchmark hand evaluation with 2 cards (pocket cards)
fn bench_hand_eval_2_cards(c: &mut Criterion) {
    let cards = vec![Card(14, Suit::Spade), Card(13, Suit::Spade)];

    c.bench_function("hand_eval_2_cards", |b| {
        b.iter(|| evaluate(&cards));
    });
}

/// Benchmark hand evaluation with 7 cards (hole cards + board)
fn bench_hand_eval_7_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spade),
        Card(13, Suit::Spade),
        Card(12, Suit::Spade),
        Card(11, Suit::Spade),
        Card(10, Suit::Spade),
        Card(2, Suit::Heart),
        Card(3, Suit::Diamond),
    ];

    c.bench_function("hand_eval_7_cards", |b| {
        b.iter(|| evaluate(&cards));
    });
}

/// Benchmark evaluation of 100 dealt seven-card hands
fn bench_hand_eval_dealt(c: &mut Criterion) {
    let hands: Vec<Vec<Card>> = (0..100)
        .map(|_| {
            let mut deck = Deck::shuffled();
            (0..7).filter_map(|_| deck.deal_card()).collect()
        })
        .collect();

    c.bench_function("hand_eval_100_dealt", |b| {
        b.iter(|| hands.iter().map(|cards| evaluate(cards)).collect::<Vec<_>>());
    });
}

/// Benchmark a showdown comparison between two seven-card hands
fn bench_showdown(c: &mut Criterion) {
    let board = [
        Card(9, Suit::Club),
        Card(9, Suit::Heart),
        Card(5, Suit::Diamond),
        Card(12, Suit::Spade),
        Card(2, Suit::Club),
    ];
    let mut a = vec![Card(14, Suit::Club), Card(13, Suit::Club)];
    let mut b = vec![Card(12, Suit::Heart), Card(3, Suit::Spade)];
    a.extend_from_slice(&board);
    b.extend_from_slice(&board);

    c.bench_function("showdown_compare", |bench| {
        bench.iter(|| compare_hands(&a, &b));
    });
}

/// Benchmark pot splitting across contribution shapes
fn bench_compute_pot(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_pot");

    for (a, b) in [(100, 100), (1_000, 250), (37, 9_000)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{a}_vs_{b}")),
            &(a, b),
            |bench, &(a, b)| {
                bench.iter(|| compute_pot(a, b));
            },
        );
    }

    group.finish();
}

fn bench_deck_shuffle(c: &mut Criterion) {
    c.bench_function("deck_shuffle", |b| {
        b.iter(Deck::shuffled);
    });
}

criterion_group!(
    hand_evaluation,
    bench_hand_eval_2_cards,
    bench_hand_eval_7_cards,
    bench_hand_eval_dealt,
    bench_showdown,
);

criterion_group!(table_operations, bench_compute_pot, bench_deck_shuffle);

criterion_main!(hand_evaluation, table_operations);
