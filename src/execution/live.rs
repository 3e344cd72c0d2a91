use crate::{
    data::model::{HorseId, RaceId},
    event::BetConfirmationEvent,
    execution::{bet_type::BetType, BettingRepository, ExecutionError, PendingBook},
    portfolio::{BetPosition, Portfolio},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Betting repository fronting an external broker.
///
/// Requests are validated and reserved exactly like the simulation variant, but confirmed
/// positions are marked `Submitted` and [`settle_race`](BettingRepository::settle_race)
/// always returns empty: settlement is triggered by an external actor (the broker's own
/// result feed), never internally.
#[derive(Debug, Clone)]
pub struct LiveBettingRepository {
    portfolio: Portfolio,
    book: PendingBook,
}

impl LiveBettingRepository {
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio,
            book: PendingBook::default(),
        }
    }
}

impl BettingRepository for LiveBettingRepository {
    fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn place_bet(
        &mut self,
        race_id: RaceId,
        horse_ids: Vec<HorseId>,
        stake: Decimal,
        bet_type: BetType,
        placed_at: DateTime<Utc>,
    ) -> BetConfirmationEvent {
        self.book
            .reserve(&self.portfolio, race_id, horse_ids, stake, bet_type, placed_at)
    }

    fn confirm_bet(
        &mut self,
        event: &BetConfirmationEvent,
    ) -> Result<BetPosition, ExecutionError> {
        let pending = self
            .book
            .take(&event.bet_id)
            .ok_or_else(|| ExecutionError::UnknownPendingBet(event.bet_id.clone()))?;

        self.portfolio.place_bet(
            pending.bet_id.clone(),
            pending.race_id,
            pending.bet_type,
            pending.combination,
            pending.stake,
            pending.placed_at,
        )?;

        Ok(self.portfolio.mark_submitted(&pending.bet_id)?)
    }

    fn settle_race(&mut self, _: &RaceId) -> Result<Vec<BetPosition>, ExecutionError> {
        // Live settlements arrive asynchronously from the broker.
        Ok(Vec::new())
    }
}
