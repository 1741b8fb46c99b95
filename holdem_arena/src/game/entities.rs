use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of seats at every table. Tables are strictly heads-up.
pub const NUM_SEATS: usize = 2;

/// Type alias for chip amounts. Stacks mirror ledger balances, which are
/// stored as signed 64-bit integers.
pub type Chips = i64;

/// Type alias for seat positions (0 or 1).
pub type SeatIndex = usize;

/// The other seat at a heads-up table.
#[must_use]
pub fn opponent(seat: SeatIndex) -> SeatIndex {
    1 - seat
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

    fn letter(self) -> char {
        match self {
            Self::Club => 'c',
            Self::Diamond => 'd',
            Self::Heart => 'h',
            Self::Spade => 's',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values. Deuce is 2, ace is 14.
pub type Value = u8;

/// A card is a tuple of a value (2..=14) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    /// Two-character code used in event payloads, e.g. `As`, `Td`, `7c`.
    #[must_use]
    pub fn code(&self) -> String {
        let value = match self.0 {
            14 => 'A',
            13 => 'K',
            12 => 'Q',
            11 => 'J',
            10 => 'T',
            v => char::from(b'0' + v),
        };
        format!("{value}{}", self.1.letter())
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(v), Some(su), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("malformed card code: {s}"));
        };
        let value = match v.to_ascii_uppercase() {
            'A' => 14,
            'K' => 13,
            'Q' => 12,
            'J' => 11,
            'T' => 10,
            d @ '2'..='9' => d as u8 - b'0',
            _ => return Err(format!("bad card value in {s}")),
        };
        let suit = match su.to_ascii_lowercase() {
            'c' => Suit::Club,
            'd' => Suit::Diamond,
            'h' => Suit::Heart,
            's' => Suit::Spade,
            _ => return Err(format!("bad card suit in {s}")),
        };
        Ok(Card(value, suit))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            11 => "J".to_string(),
            v => v.to_string(),
        };
        let repr = format!("{value}/{}", self.1);
        write!(f, "{repr:>4}")
    }
}

/// Render cards as their two-character codes.
#[must_use]
pub fn card_codes(cards: &[Card]) -> Vec<String> {
    cards.iter().map(Card::code).collect()
}

#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    pub deck_idx: usize,
}

impl Deck {
    /// A freshly shuffled 52-card deck.
    #[must_use]
    pub fn shuffled() -> Self {
        let mut deck = Self::default();
        deck.cards.shuffle(&mut rand::rng());
        deck
    }

    /// A deck that deals the given cards in order. Used to replay or test
    /// hands with a known run-out.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards, deck_idx: 0 }
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.deck_idx).copied()?;
        self.deck_idx += 1;
        Some(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.deck_idx)
    }
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = Vec::with_capacity(52);
        for value in 2u8..=14u8 {
            for suit in Suit::ALL {
                cards.push(Card(value, suit));
            }
        }
        Self { cards, deck_idx: 0 }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    #[must_use]
    pub fn next(self) -> Option<Street> {
        match self {
            Self::Preflop => Some(Self::Flop),
            Self::Flop => Some(Self::Turn),
            Self::Turn => Some(Self::River),
            Self::River => None,
        }
    }

    /// Community cards revealed when entering this street.
    #[must_use]
    pub fn cards_dealt(self) -> usize {
        match self {
            Self::Preflop => 0,
            Self::Flop => 3,
            Self::Turn | Self::River => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
        }
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Street {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preflop" => Ok(Self::Preflop),
            "flop" => Ok(Self::Flop),
            "turn" => Ok(Self::Turn),
            "river" => Ok(Self::River),
            other => Err(format!("unknown street: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fold => "fold",
            Self::Check => "check",
            Self::Call => "call",
            Self::Bet => "bet",
            Self::Raise => "raise",
            Self::AllIn => "all_in",
        }
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fold" => Ok(Self::Fold),
            "check" => Ok(Self::Check),
            "call" => Ok(Self::Call),
            "bet" => Ok(Self::Bet),
            "raise" => Ok(Self::Raise),
            "all_in" | "allin" | "all-in" => Ok(Self::AllIn),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A betting decision by the player in `seat`. For `bet` and `raise`,
/// `amount` is the player's total contribution for the street after the
/// action (a "raise to" amount).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Action {
    pub seat: SeatIndex,
    pub kind: ActionKind,
    pub amount: Option<Chips>,
}

impl Action {
    #[must_use]
    pub fn new(seat: SeatIndex, kind: ActionKind) -> Self {
        Self {
            seat,
            kind,
            amount: None,
        }
    }

    #[must_use]
    pub fn with_amount(seat: SeatIndex, kind: ActionKind, amount: Chips) -> Self {
        Self {
            seat,
            kind,
            amount: Some(amount),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.amount {
            Some(amount) => write!(f, "seat {} {} {amount}", self.seat, self.kind),
            None => write!(f, "seat {} {}", self.seat, self.kind),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Player {
    pub agent_id: String,
    pub stack: Chips,
    pub hole_cards: Vec<Card>,
    pub folded: bool,
    pub all_in: bool,
    pub last_action: Option<ActionKind>,
}

impl Player {
    #[must_use]
    pub fn new(agent_id: &str, stack: Chips) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stack,
            hole_cards: Vec::with_capacity(2),
            folded: false,
            all_in: false,
            last_action: None,
        }
    }
}

/// Complete state of the current hand.
///
/// Invariants: `pot == total_contrib.iter().sum()` at all times, and
/// `round_bets[i] <= current_bet` for every seat still able to act.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableState {
    pub players: [Player; NUM_SEATS],
    pub community: Vec<Card>,
    pub street: Option<Street>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub round_bets: [Chips; NUM_SEATS],
    pub total_contrib: [Chips; NUM_SEATS],
    pub acted: [bool; NUM_SEATS],
    pub current_actor: SeatIndex,
    pub dealer: SeatIndex,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub action_timeout_secs: u64,
    pub hand_no: u64,
    pub settled: bool,
}

impl TableState {
    /// Chips `seat` must add to match the current bet.
    #[must_use]
    pub fn to_call(&self, seat: SeatIndex) -> Chips {
        (self.current_bet - self.round_bets[seat]).max(0)
    }

    /// Seat that folded this hand, if any.
    #[must_use]
    pub fn folded_seat(&self) -> Option<SeatIndex> {
        self.players.iter().position(|p| p.folded)
    }

    #[must_use]
    pub fn any_all_in(&self) -> bool {
        self.players.iter().any(|p| p.all_in)
    }

    /// True while betting decisions can still be made.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.street.is_some() && !self.settled && self.folded_seat().is_none()
    }

    /// Minimum legal "raise to" amount for the acting seat.
    #[must_use]
    pub fn min_raise_to(&self) -> Chips {
        if self.current_bet == 0 {
            self.min_raise
        } else {
            self.current_bet + self.min_raise
        }
    }

    /// Seat index of the given agent.
    #[must_use]
    pub fn seat_of(&self, agent_id: &str) -> Option<SeatIndex> {
        self.players.iter().position(|p| p.agent_id == agent_id)
    }

    /// Action kinds `seat` may legally submit right now.
    #[must_use]
    pub fn legal_actions(&self, seat: SeatIndex) -> Vec<ActionKind> {
        if !self.in_progress() || seat != self.current_actor {
            return Vec::new();
        }
        let me = &self.players[seat];
        if me.all_in || me.stack == 0 {
            return Vec::new();
        }
        let opponent_all_in = self.players[opponent(seat)].all_in;
        let to_call = self.to_call(seat);

        let mut actions = vec![ActionKind::Fold];
        if to_call == 0 {
            actions.push(ActionKind::Check);
        } else {
            actions.push(ActionKind::Call);
        }
        if !opponent_all_in {
            if self.current_bet == 0 {
                actions.push(ActionKind::Bet);
            } else if me.stack > to_call {
                actions.push(ActionKind::Raise);
            }
            actions.push(ActionKind::AllIn);
        }
        actions
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

impl Rank {
    /// Category ordinal, 0 (high card) through 8 (straight flush).
    #[must_use]
    pub fn category(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "hi",
            Self::OnePair => "1p",
            Self::TwoPair => "2p",
            Self::ThreeOfAKind => "3k",
            Self::Straight => "s8",
            Self::Flush => "fs",
            Self::FullHouse => "fh",
            Self::FourOfAKind => "4k",
            Self::StraightFlush => "sf",
        };
        write!(f, "{repr}")
    }
}

/// Strength of a five-card hand: the category followed by tiebreak values
/// in descending significance. Derived ordering compares category first.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandValue {
    pub rank: Rank,
    pub values: Vec<Value>,
}
