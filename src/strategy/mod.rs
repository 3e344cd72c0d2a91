use crate::{
    engine::EngineCtx,
    event::{BetConfirmationEvent, DataEvent, ResultEvent, TimeEvent},
};

/// Strategy backing the favourite in every race.
pub mod naive_favorite;

/// Strategy betting runners whose historical win rate implies positive value.
pub mod value_betting;

/// Contract between a strategy and the [`Engine`](crate::engine::Engine).
///
/// Every hook is a no-op by default; implement the ones you care about. Hooks receive a
/// borrowed [`EngineCtx`] handle exposing `schedule`, `place_bet`, `balance`, `positions`
/// and `historical`; the handle is only valid for the duration of the hook.
pub trait Strategy: Sized {
    /// Called once before the engine starts pumping events. Schedules registered here
    /// fire at the same instants as schedules registered before the run.
    fn on_start(&mut self, _ctx: &mut EngineCtx<'_, Self>) {}

    /// Called on every engine tick.
    fn on_time(&mut self, _ctx: &mut EngineCtx<'_, Self>, _event: &TimeEvent) {}

    /// Called when new data is published (race cards and payoffs).
    fn on_data(&mut self, _ctx: &mut EngineCtx<'_, Self>, _event: &DataEvent) {}

    /// Called when a bet request has been processed, whether accepted or rejected.
    fn on_bet(&mut self, _ctx: &mut EngineCtx<'_, Self>, _event: &BetConfirmationEvent) {}

    /// Called when a race result has settled at least one position.
    fn on_result(&mut self, _ctx: &mut EngineCtx<'_, Self>, _event: &ResultEvent) {}
}
