use crate::{
    data::{
        model::{HorseId, Payoff, RaceId},
        DataRepository,
    },
    event::BetConfirmationEvent,
    execution::{bet_type::BetType, BettingRepository, ExecutionError, PendingBook},
    portfolio::{BetId, BetPosition, Portfolio},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Betting repository that settles bets using recorded simulation payoffs.
///
/// Confirmed positions are indexed by race so that a payoff publication settles every open
/// bet on that race in one pass.
#[derive(Debug)]
pub struct SimulationBettingRepository<Data> {
    portfolio: Portfolio,
    data: Arc<Data>,
    book: PendingBook,
    open_by_race: FnvHashMap<RaceId, Vec<BetId>>,
}

impl<Data> SimulationBettingRepository<Data>
where
    Data: DataRepository,
{
    /// Construct a repository backed by `portfolio` and the simulation dataset.
    pub fn new(portfolio: Portfolio, data: Arc<Data>) -> Self {
        Self {
            portfolio,
            data,
            book: PendingBook::default(),
            open_by_race: FnvHashMap::default(),
        }
    }
}

impl<Data> BettingRepository for SimulationBettingRepository<Data>
where
    Data: DataRepository,
{
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

        let position = self.portfolio.place_bet(
            pending.bet_id,
            pending.race_id,
            pending.bet_type,
            pending.combination,
            pending.stake,
            pending.placed_at,
        )?;

        self.open_by_race
            .entry(position.race_id.clone())
            .or_default()
            .push(position.bet_id.clone());

        Ok(position)
    }

    fn settle_race(&mut self, race_id: &RaceId) -> Result<Vec<BetPosition>, ExecutionError> {
        let Some(bet_ids) = self.open_by_race.remove(race_id) else {
            return Ok(Vec::new());
        };
        let payoffs = self.data.payoffs(race_id);

        let mut settled = Vec::with_capacity(bet_ids.len());
        for bet_id in bet_ids {
            let payout = self
                .portfolio
                .position(&bet_id)
                .map(|position| calculate_payout(position, &payoffs))
                .unwrap_or(Decimal::ZERO);
            settled.push(self.portfolio.settle_bet(&bet_id, payout)?);
        }

        debug!(%race_id, settled = settled.len(), "settled race");
        Ok(settled)
    }
}

/// Payout for a position given the race's payoff records: stake times the odds of the first
/// matching payoff of the same canonical market, zero when nothing matches.
fn calculate_payout(position: &BetPosition, payoffs: &[Payoff]) -> Decimal {
    payoffs
        .iter()
        .find(|payoff| {
            payoff.bet_type == position.bet_type
                && position
                    .bet_type
                    .combinations_match(&position.combination, &payoff.combination)
        })
        .map(|payoff| position.stake * payoff.odds)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{model::Race, repository::SimulationDataRepository},
        portfolio::PositionStatus,
    };
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn repository(payoffs: Vec<Payoff>) -> SimulationBettingRepository<SimulationDataRepository> {
        let race = Race::new(
            RaceId::new("R1"),
            DateTime::<Utc>::from_str("2024-04-01T00:00:00Z").unwrap(),
            "Tokyo".into(),
            1600,
            "turf".into(),
            "fine".into(),
            vec![crate::data::model::HorseEntry::new(
                RaceId::new("R1"),
                HorseId::new("H1"),
                "H1".into(),
                "J".into(),
                "T".into(),
                1,
                Default::default(),
            )],
        );
        let data = Arc::new(SimulationDataRepository::new(vec![race], payoffs));
        SimulationBettingRepository::new(Portfolio::new(dec!(1000)), data)
    }

    fn win_payoff(odds: Decimal) -> Payoff {
        Payoff::new(
            RaceId::new("R1"),
            BetType::Win,
            vec![HorseId::new("H1")],
            odds,
            odds * dec!(100),
        )
    }

    fn place_and_confirm(
        repository: &mut SimulationBettingRepository<SimulationDataRepository>,
        horse: &str,
        stake: Decimal,
    ) -> BetPosition {
        let confirmation = repository.place_bet(
            RaceId::new("R1"),
            vec![HorseId::new(horse)],
            stake,
            BetType::Win,
            DateTime::<Utc>::MIN_UTC,
        );
        assert!(confirmation.accepted);
        repository.confirm_bet(&confirmation).unwrap()
    }

    #[test]
    fn test_settle_race_pays_matching_positions() {
        let mut repository = repository(vec![win_payoff(dec!(1.5))]);
        place_and_confirm(&mut repository, "H1", dec!(100));
        place_and_confirm(&mut repository, "H2", dec!(50));

        let settled = repository.settle_race(&RaceId::new("R1")).unwrap();
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].payout, dec!(150.0));
        assert_eq!(settled[1].payout, dec!(0));
        assert!(settled
            .iter()
            .all(|position| position.status == PositionStatus::Settled));

        // 1000 - 150 staked + 150 payout
        assert_eq!(repository.balance(), dec!(1000.0));

        // Settling again is a no-op: no open positions remain for the race
        assert!(repository.settle_race(&RaceId::new("R1")).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_bet_requires_pending_entry() {
        let mut repository = repository(vec![]);
        let confirmation = repository.place_bet(
            RaceId::new("R1"),
            vec![HorseId::new("H1")],
            dec!(100),
            BetType::Win,
            DateTime::<Utc>::MIN_UTC,
        );
        repository.confirm_bet(&confirmation).unwrap();

        // A second confirmation for the same bet id is a programming error
        assert_eq!(
            repository.confirm_bet(&confirmation),
            Err(ExecutionError::UnknownPendingBet(confirmation.bet_id.clone()))
        );
    }
}
