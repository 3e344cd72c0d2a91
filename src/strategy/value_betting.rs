use crate::{
    data::DataKind,
    engine::EngineCtx,
    event::DataEvent,
    execution::bet_type::BetType,
    strategy::Strategy,
};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use rust_decimal_macros::dec;

/// Bets runners whose historical win rate implies positive expected value.
///
/// For each priced runner, the expected value multiplier is
/// `historical win_rate x quoted win odds`; a bet is placed when it reaches the edge
/// threshold and the bankroll covers the stake.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBetting {
    /// Stake size for qualified runners.
    pub stake: Decimal,
    /// Minimum expected value multiplier required to place a bet.
    pub edge_threshold: Decimal,
}

impl Default for ValueBetting {
    fn default() -> Self {
        Self {
            stake: dec!(50),
            edge_threshold: dec!(1.2),
        }
    }
}

impl ValueBetting {
    pub fn new(stake: Decimal, edge_threshold: Decimal) -> Self {
        Self {
            stake,
            edge_threshold,
        }
    }
}

impl Strategy for ValueBetting {
    fn on_data(&mut self, ctx: &mut EngineCtx<'_, Self>, event: &DataEvent) {
        if event.kind != DataKind::Race {
            return;
        }
        for horse in &event.race.horses {
            let Some(odds) = horse.odds(&BetType::Win) else {
                continue;
            };
            let stats = ctx.historical(&horse.horse_id);
            let Some(win_rate) = Decimal::from_f64(stats.win_rate) else {
                continue;
            };
            let expected_value = win_rate * odds;
            if expected_value >= self.edge_threshold && ctx.balance() >= self.stake {
                ctx.place_bet(
                    event.race.race_id.clone(),
                    [horse.horse_id.clone()],
                    self.stake,
                    BetType::Win,
                );
            }
        }
    }
}
