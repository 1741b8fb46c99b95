use std::cmp::Ordering;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{
    entities::{
        Action, ActionKind, Card, Chips, Deck, HandValue, NUM_SEATS, Player, SeatIndex, Street,
        TableState, opponent,
    },
    errors::{EngineError, EngineResult},
    functional::{compute_pot, evaluate},
};
use crate::wallet::{EntryType, Ledger};

/// Winner value reported when the main pot is split.
pub const SPLIT: &str = "split";

/// Result of settling a hand.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Settlement {
    /// Winning agent id, or [`SPLIT`].
    pub winner: String,
    pub winning_seat: Option<SeatIndex>,
    pub payouts: [Chips; NUM_SEATS],
    pub pot: Chips,
    pub main_pot: Chips,
    pub side_pot: Chips,
    pub by_fold: bool,
    pub hands: Option<[HandValue; NUM_SEATS]>,
    pub ending_street: Street,
}

/// Heads-up Texas Hold'em rules engine.
///
/// Chips move only through the [`Ledger`] collaborator; the engine's stacks
/// mirror ledger balances for the duration of a hand.
#[derive(Debug)]
pub struct RulesEngine {
    state: TableState,
    deck: Deck,
    reference: String,
    hands_started: u64,
}

impl RulesEngine {
    /// `reference` tags every ledger entry this engine writes (typically the
    /// table id).
    pub fn new(reference: impl Into<String>, action_timeout_secs: u64) -> Self {
        Self {
            state: TableState {
                action_timeout_secs,
                ..TableState::default()
            },
            deck: Deck::default(),
            reference: reference.into(),
            hands_started: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// Start a new hand with a freshly shuffled deck.
    pub async fn start_hand<L: Ledger + ?Sized>(
        &mut self,
        p1: &str,
        p2: &str,
        small_blind: Chips,
        big_blind: Chips,
        ledger: &L,
    ) -> EngineResult<()> {
        self.start_hand_with_deck(p1, p2, small_blind, big_blind, Deck::shuffled(), ledger)
            .await
    }

    /// Start a new hand dealing from `deck` in order.
    ///
    /// The dealer alternates every hand and posts the small blind. A player
    /// whose stack is below the big blind is folded before blinds are
    /// posted, leaving the hand decided.
    pub async fn start_hand_with_deck<L: Ledger + ?Sized>(
        &mut self,
        p1: &str,
        p2: &str,
        small_blind: Chips,
        big_blind: Chips,
        deck: Deck,
        ledger: &L,
    ) -> EngineResult<()> {
        let dealer = if self.hands_started == 0 {
            0
        } else {
            opponent(self.state.dealer)
        };
        self.hands_started += 1;
        self.deck = deck;

        let mut state = TableState {
            players: [Player::new(p1, 0), Player::new(p2, 0)],
            street: Some(Street::Preflop),
            min_raise: big_blind,
            current_actor: dealer,
            dealer,
            small_blind,
            big_blind,
            action_timeout_secs: self.state.action_timeout_secs,
            hand_no: self.hands_started,
            ..TableState::default()
        };

        for _ in 0..2 {
            for seat in [opponent(dealer), dealer] {
                let card = self.deck.deal_card().ok_or(EngineError::DeckExhausted)?;
                state.players[seat].hole_cards.push(card);
            }
        }

        for player in &mut state.players {
            player.stack = ledger.balance(&player.agent_id).await?;
        }
        self.state = state;

        let mut auto_folded = false;
        for player in &mut self.state.players {
            if player.stack < big_blind {
                debug!(
                    "{}: auto-folding {} with stack {} below big blind {big_blind}",
                    self.reference, player.agent_id, player.stack
                );
                player.folded = true;
                player.last_action = Some(ActionKind::Fold);
                auto_folded = true;
            }
        }
        if auto_folded {
            return Ok(());
        }

        self.post_blinds(ledger).await
    }

    async fn post_blinds<L: Ledger + ?Sized>(&mut self, ledger: &L) -> EngineResult<()> {
        let sb_seat = self.state.dealer;
        let bb_seat = opponent(sb_seat);
        let small_blind = self.state.small_blind;
        let big_blind = self.state.big_blind;

        if let Err(e) = self.commit(sb_seat, small_blind, EntryType::Blind, ledger).await {
            self.state.street = None;
            return Err(e);
        }

        if let Err(e) = self.commit(bb_seat, big_blind, EntryType::Blind, ledger).await {
            let agent_id = self.state.players[sb_seat].agent_id.clone();
            let reference = self.ledger_reference();
            if let Err(refund_err) = ledger
                .credit(&agent_id, small_blind, EntryType::Refund, &reference)
                .await
            {
                error!("{}: failed to refund small blind to {agent_id}: {refund_err}", self.reference);
            } else {
                self.uncommit(sb_seat, small_blind);
            }
            self.state.street = None;
            return Err(e);
        }

        self.state.current_bet = big_blind;
        self.state.current_actor = sb_seat;
        Ok(())
    }

    /// Debit `amount` from `seat` and move it into the pot.
    async fn commit<L: Ledger + ?Sized>(
        &mut self,
        seat: SeatIndex,
        amount: Chips,
        entry_type: EntryType,
        ledger: &L,
    ) -> EngineResult<()> {
        if amount <= 0 {
            return Ok(());
        }
        let reference = self.ledger_reference();
        let agent_id = self.state.players[seat].agent_id.clone();
        ledger.debit(&agent_id, amount, entry_type, &reference).await?;

        let player = &mut self.state.players[seat];
        player.stack -= amount;
        if player.stack == 0 {
            player.all_in = true;
        }
        self.state.round_bets[seat] += amount;
        self.state.total_contrib[seat] += amount;
        self.state.pot += amount;
        Ok(())
    }

    fn uncommit(&mut self, seat: SeatIndex, amount: Chips) {
        let player = &mut self.state.players[seat];
        player.stack += amount;
        player.all_in = false;
        self.state.round_bets[seat] -= amount;
        self.state.total_contrib[seat] -= amount;
        self.state.pot -= amount;
    }

    fn ledger_reference(&self) -> String {
        format!("{}:hand:{}", self.reference, self.state.hand_no)
    }

    /// Validate and apply `action`, returning whether the betting round is
    /// complete. A fold ends the hand and leaves the actor unchanged.
    pub async fn apply_action<L: Ledger + ?Sized>(
        &mut self,
        action: &Action,
        ledger: &L,
    ) -> EngineResult<bool> {
        if !self.state.in_progress() {
            return Err(EngineError::HandNotInProgress);
        }
        let seat = action.seat;
        if seat >= NUM_SEATS || seat != self.state.current_actor {
            return Err(EngineError::NotYourTurn);
        }
        if self.state.players[seat].all_in {
            return Err(EngineError::InvalidAction("player is all-in".to_string()));
        }

        let to_call = self.state.to_call(seat);
        let stack = self.state.players[seat].stack;
        let opponent_all_in = self.state.players[opponent(seat)].all_in;

        match action.kind {
            ActionKind::Fold => {
                let player = &mut self.state.players[seat];
                player.folded = true;
                player.last_action = Some(ActionKind::Fold);
                self.state.acted[seat] = true;
                debug!("{}: {action}", self.reference);
                return Ok(true);
            }
            ActionKind::Check => {
                if to_call > 0 {
                    return Err(EngineError::InvalidAction(format!(
                        "cannot check facing {to_call} to call"
                    )));
                }
            }
            ActionKind::Call => {
                if to_call == 0 {
                    return Err(EngineError::InvalidAction("nothing to call".to_string()));
                }
                self.commit(seat, to_call.min(stack), EntryType::Bet, ledger).await?;
            }
            ActionKind::Bet => {
                if self.state.current_bet != 0 {
                    return Err(EngineError::InvalidAction(
                        "bet not allowed facing a bet, use raise".to_string(),
                    ));
                }
                let amount = action
                    .amount
                    .ok_or_else(|| EngineError::InvalidRaise("bet requires an amount".to_string()))?;
                if amount <= 0 {
                    return Err(EngineError::InvalidRaise(format!(
                        "bet amount must be positive, got {amount}"
                    )));
                }
                if opponent_all_in {
                    return Err(EngineError::InvalidAction("opponent is all-in".to_string()));
                }
                let pay = amount - self.state.round_bets[seat];
                if pay > stack {
                    return Err(EngineError::InvalidRaise(format!(
                        "bet of {amount} exceeds stack of {stack}"
                    )));
                }
                if amount < self.state.min_raise && pay != stack {
                    return Err(EngineError::InvalidRaise(format!(
                        "bet of {amount} below minimum {}",
                        self.state.min_raise
                    )));
                }
                self.commit(seat, pay, EntryType::Bet, ledger).await?;
                self.raise_to(amount);
            }
            ActionKind::Raise => {
                if self.state.current_bet == 0 {
                    return Err(EngineError::InvalidAction(
                        "raise not allowed without a bet, use bet".to_string(),
                    ));
                }
                let amount = action
                    .amount
                    .ok_or_else(|| EngineError::InvalidRaise("raise requires an amount".to_string()))?;
                if amount <= 0 {
                    return Err(EngineError::InvalidRaise(format!(
                        "raise amount must be positive, got {amount}"
                    )));
                }
                if opponent_all_in {
                    return Err(EngineError::InvalidAction("opponent is all-in".to_string()));
                }
                let pay = amount - self.state.round_bets[seat];
                if pay > stack {
                    return Err(EngineError::InvalidRaise(format!(
                        "raise to {amount} exceeds stack of {stack}"
                    )));
                }
                let min_to = self.state.min_raise_to();
                if amount <= self.state.current_bet || (amount < min_to && pay != stack) {
                    return Err(EngineError::InvalidRaise(format!(
                        "raise to {amount} below minimum {min_to}"
                    )));
                }
                self.commit(seat, pay, EntryType::Bet, ledger).await?;
                self.raise_to(amount);
            }
            ActionKind::AllIn => {
                if stack == 0 {
                    return Err(EngineError::InvalidAction("no chips behind".to_string()));
                }
                let total = self.state.round_bets[seat] + stack;
                if total <= self.state.current_bet || opponent_all_in {
                    self.commit(seat, to_call.min(stack), EntryType::Bet, ledger).await?;
                } else {
                    self.commit(seat, stack, EntryType::Bet, ledger).await?;
                    self.raise_to(total);
                }
            }
        }

        self.state.acted[seat] = true;
        self.state.players[seat].last_action = Some(action.kind);
        debug!("{}: {action}", self.reference);

        let complete = self.round_complete();
        if !complete {
            self.state.current_actor = opponent(seat);
        }
        Ok(complete)
    }

    fn raise_to(&mut self, total: Chips) {
        let increment = total - self.state.current_bet;
        if increment > self.state.min_raise {
            self.state.min_raise = increment;
        }
        self.state.current_bet = total;
    }

    fn round_complete(&self) -> bool {
        let state = &self.state;
        if state.folded_seat().is_some() {
            return true;
        }
        let done = |seat: SeatIndex| state.acted[seat] || state.players[seat].all_in;
        if !(done(0) && done(1)) {
            return false;
        }
        match state.round_bets[0].cmp(&state.round_bets[1]) {
            Ordering::Equal => true,
            Ordering::Less => state.players[0].all_in,
            Ordering::Greater => state.players[1].all_in,
        }
    }

    /// Advance to the next street, dealing its community cards.
    pub fn next_street(&mut self) -> EngineResult<Street> {
        let next = self
            .state
            .street
            .and_then(Street::next)
            .ok_or(EngineError::HandNotInProgress)?;

        for _ in 0..next.cards_dealt() {
            let card = self.deck.deal_card().ok_or(EngineError::DeckExhausted)?;
            self.state.community.push(card);
        }

        let state = &mut self.state;
        state.street = Some(next);
        state.round_bets = [0; NUM_SEATS];
        state.acted = [false; NUM_SEATS];
        state.current_bet = 0;
        state.min_raise = state.big_blind;
        state.current_actor = opponent(state.dealer);
        Ok(next)
    }

    /// Deal out the remaining streets without betting.
    pub fn fast_forward_to_showdown(&mut self) -> EngineResult<()> {
        while self.state.street.is_some_and(|s| s != Street::River) {
            self.next_street()?;
        }
        Ok(())
    }

    /// Fold `seat` regardless of turn order. Used for forfeiture.
    pub fn forfeit(&mut self, seat: SeatIndex) {
        if self.state.settled || seat >= NUM_SEATS {
            return;
        }
        let player = &mut self.state.players[seat];
        player.folded = true;
        player.last_action = Some(ActionKind::Fold);
    }

    /// Award the pot and credit the winners through the ledger.
    pub async fn settle<L: Ledger + ?Sized>(&mut self, ledger: &L) -> EngineResult<Settlement> {
        if self.state.settled {
            return Err(EngineError::HandNotInProgress);
        }
        let ending_street = self.state.street.ok_or(EngineError::HandNotInProgress)?;

        let pot = self.state.pot;
        let split = compute_pot(self.state.total_contrib[0], self.state.total_contrib[1]);
        let mut payouts = [0; NUM_SEATS];
        let mut hands = None;

        let winning_seat = match self.state.folded_seat() {
            Some(folded) => {
                let winner = opponent(folded);
                payouts[winner] = pot;
                Some(winner)
            }
            None => {
                let values = [self.showdown_value(0), self.showdown_value(1)];
                let ordering = values[0].cmp(&values[1]);
                hands = Some(values);

                if let Some(owner) = split.side_owner {
                    payouts[owner] += split.side;
                }
                match ordering {
                    Ordering::Greater => {
                        payouts[0] += split.main;
                        Some(0)
                    }
                    Ordering::Less => {
                        payouts[1] += split.main;
                        Some(1)
                    }
                    Ordering::Equal => {
                        let half = split.main / 2;
                        payouts[0] += half;
                        payouts[1] += half;
                        None
                    }
                }
            }
        };

        let reference = self.ledger_reference();
        for (seat, &amount) in payouts.iter().enumerate() {
            if amount > 0 {
                let agent_id = self.state.players[seat].agent_id.clone();
                ledger
                    .credit(&agent_id, amount, EntryType::Payout, &reference)
                    .await?;
                self.state.players[seat].stack += amount;
            }
        }
        self.state.settled = true;

        let winner = match winning_seat {
            Some(seat) => self.state.players[seat].agent_id.clone(),
            None => SPLIT.to_string(),
        };
        debug!("{}: hand {} settled, winner {winner}", self.reference, self.state.hand_no);

        Ok(Settlement {
            winner,
            winning_seat,
            payouts,
            pot,
            main_pot: split.main,
            side_pot: split.side,
            by_fold: hands.is_none(),
            hands,
            ending_street,
        })
    }

    fn showdown_value(&self, seat: SeatIndex) -> HandValue {
        let mut cards: Vec<Card> = self.state.players[seat].hole_cards.clone();
        cards.extend_from_slice(&self.state.community);
        evaluate(&cards)
    }
}
