use crate::{
    data::{
        model::{HorseEntry, Race},
        DataKind,
    },
    engine::EngineCtx,
    event::DataEvent,
    execution::bet_type::BetType,
    strategy::Strategy,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Backs the lowest win-odds runner in every race with a fixed stake.
#[derive(Debug, Clone, PartialEq)]
pub struct NaiveFavorite {
    /// Stake wagered on each race.
    pub stake: Decimal,
}

impl Default for NaiveFavorite {
    fn default() -> Self {
        Self { stake: dec!(100) }
    }
}

impl NaiveFavorite {
    pub fn new(stake: Decimal) -> Self {
        Self { stake }
    }

    /// The runner with the lowest quoted win odds, if any are priced.
    fn find_favourite(race: &Race) -> Option<&HorseEntry> {
        race.horses
            .iter()
            .filter_map(|horse| horse.odds(&BetType::Win).map(|odds| (horse, odds)))
            .min_by_key(|(_, odds)| *odds)
            .map(|(horse, _)| horse)
    }
}

impl Strategy for NaiveFavorite {
    fn on_data(&mut self, ctx: &mut EngineCtx<'_, Self>, event: &DataEvent) {
        if event.kind != DataKind::Race {
            return;
        }
        let Some(favourite) = Self::find_favourite(&event.race) else {
            return;
        };
        ctx.place_bet(
            event.race.race_id.clone(),
            [favourite.horse_id.clone()],
            self.stake,
            BetType::Win,
        );
    }
}
