use crate::{
    data::model::{HorseId, RaceId},
    event::BetConfirmationEvent,
    execution::bet_type::BetType,
    portfolio::{BetId, BetPosition, Portfolio, PortfolioError},
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Canonical [`BetType`](bet_type::BetType) vocabulary and combination matching rules.
pub mod bet_type;

/// [`SimulationBettingRepository`](simulated::SimulationBettingRepository), settling bets
/// against recorded payoffs.
pub mod simulated;

/// [`LiveBettingRepository`](live::LiveBettingRepository), deferring settlement to an
/// external broker.
pub mod live;

/// All errors generated in the execution module.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ExecutionError {
    /// A confirmation arrived for a bet the repository never reserved. Programming error;
    /// the engine treats it as fatal.
    #[error("unknown pending bet id: {0}")]
    UnknownPendingBet(BetId),

    #[error("portfolio: {0}")]
    Portfolio(#[from] PortfolioError),
}

/// An accepted request that has reserved cash but has not yet been confirmed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PendingBet {
    pub bet_id: BetId,
    pub race_id: RaceId,
    pub bet_type: BetType,
    pub combination: Vec<HorseId>,
    pub stake: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Order lifecycle backend: validates requests, reserves cash on acceptance, and settles
/// races against payoff records.
///
/// Request validation is synchronous and never fails the run; rejected requests surface as
/// `accepted == false` confirmations so strategies can adapt. [`confirm_bet`] and
/// [`settle_race`] faults are programming errors and terminate the run.
///
/// [`confirm_bet`]: BettingRepository::confirm_bet
/// [`settle_race`]: BettingRepository::settle_race
pub trait BettingRepository {
    /// The backing portfolio.
    fn portfolio(&self) -> &Portfolio;

    /// Validate a bet request, reserving cash for accepted requests, and return the
    /// confirmation event to enqueue.
    fn place_bet(
        &mut self,
        race_id: RaceId,
        horse_ids: Vec<HorseId>,
        stake: Decimal,
        bet_type: BetType,
        placed_at: DateTime<Utc>,
    ) -> BetConfirmationEvent;

    /// Move a pending bet into the portfolio.
    fn confirm_bet(&mut self, event: &BetConfirmationEvent)
        -> Result<BetPosition, ExecutionError>;

    /// Settle all bets associated with a race, returning the newly settled positions.
    fn settle_race(&mut self, race_id: &RaceId) -> Result<Vec<BetPosition>, ExecutionError>;

    /// Available bankroll.
    fn balance(&self) -> Decimal {
        self.portfolio().bankroll()
    }

    /// All recorded positions, in placement order.
    fn positions(&self) -> Vec<BetPosition> {
        self.portfolio().positions().cloned().collect()
    }
}

/// Reservation book shared by the betting repository implementations.
///
/// Tracks accepted-but-unconfirmed bets so their stakes cannot be double-spent, and issues
/// sequential bet identifiers.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingBook {
    pending: IndexMap<BetId, PendingBet>,
    sequence: u64,
}

impl PendingBook {
    fn next_bet_id(&mut self) -> BetId {
        self.sequence += 1;
        BetId::new(format!("bet-{}", self.sequence))
    }

    /// Cash available for new requests: portfolio cash minus reserved pending stakes.
    pub(crate) fn available_cash(&self, portfolio: &Portfolio) -> Decimal {
        let reserved: Decimal = self.pending.values().map(|pending| pending.stake).sum();
        portfolio.cash - reserved
    }

    /// Validate a request and reserve its stake when accepted.
    pub(crate) fn reserve(
        &mut self,
        portfolio: &Portfolio,
        race_id: RaceId,
        horse_ids: Vec<HorseId>,
        stake: Decimal,
        bet_type: BetType,
        placed_at: DateTime<Utc>,
    ) -> BetConfirmationEvent {
        let bet_id = self.next_bet_id();

        let rejection = if stake <= Decimal::ZERO {
            Some(format!("Stake must be positive, got {stake}"))
        } else {
            let available = self.available_cash(portfolio);
            (stake > available)
                .then(|| format!("Insufficient cash to place bet (available {available})"))
        };

        if let Some(message) = rejection {
            warn!(%race_id, %bet_id, %stake, %message, "rejected bet request");
            return BetConfirmationEvent {
                bet_id,
                race_id,
                bet_type,
                combination: horse_ids,
                stake,
                placed_at,
                accepted: false,
                message: Some(message),
                position: None,
            };
        }

        self.pending.insert(
            bet_id.clone(),
            PendingBet {
                bet_id: bet_id.clone(),
                race_id: race_id.clone(),
                bet_type: bet_type.clone(),
                combination: horse_ids.clone(),
                stake,
                placed_at,
            },
        );

        BetConfirmationEvent {
            bet_id,
            race_id,
            bet_type,
            combination: horse_ids,
            stake,
            placed_at,
            accepted: true,
            message: None,
            position: None,
        }
    }

    /// Consume the pending entry matching a confirmation.
    pub(crate) fn take(&mut self, bet_id: &BetId) -> Option<PendingBet> {
        self.pending.shift_remove(bet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reserve(
        book: &mut PendingBook,
        portfolio: &Portfolio,
        stake: Decimal,
    ) -> BetConfirmationEvent {
        book.reserve(
            portfolio,
            RaceId::new("R1"),
            vec![HorseId::new("H1")],
            stake,
            BetType::Win,
            DateTime::<Utc>::MIN_UTC,
        )
    }

    #[test]
    fn test_pending_reservations_are_not_double_spent() {
        let portfolio = Portfolio::new(dec!(100));
        let mut book = PendingBook::default();

        // First reservation consumes the whole bankroll
        let first = reserve(&mut book, &portfolio, dec!(100));
        assert!(first.accepted);
        assert_eq!(book.available_cash(&portfolio), dec!(0));

        // Second request exceeds available (not yet confirmed) cash
        let second = reserve(&mut book, &portfolio, dec!(1));
        assert!(!second.accepted);
        assert!(second.message.as_deref().unwrap().contains("Insufficient cash"));
    }

    #[test]
    fn test_reserve_rejects_non_positive_stake() {
        let portfolio = Portfolio::new(dec!(100));
        let mut book = PendingBook::default();

        let confirmation = reserve(&mut book, &portfolio, dec!(0));
        assert!(!confirmation.accepted);
        assert!(confirmation.message.as_deref().unwrap().contains("positive"));
        // Rejected requests still consume a bet id but reserve nothing
        assert_eq!(book.available_cash(&portfolio), dec!(100));
    }

    #[test]
    fn test_take_consumes_reservation_once() {
        let portfolio = Portfolio::new(dec!(100));
        let mut book = PendingBook::default();

        let confirmation = reserve(&mut book, &portfolio, dec!(40));
        assert_eq!(book.available_cash(&portfolio), dec!(60));

        let pending = book.take(&confirmation.bet_id).unwrap();
        assert_eq!(pending.stake, dec!(40));
        assert_eq!(book.available_cash(&portfolio), dec!(100));
        assert!(book.take(&confirmation.bet_id).is_none());
    }
}
