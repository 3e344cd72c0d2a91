use crate::{
    clock::Clock,
    data::{
        model::{HistoricalStats, HorseId, Race, RaceId},
        DataKind, DataRepository,
    },
    event::{BetRequestEvent, DataEvent, Event, ResultEvent, TimeEvent},
    execution::{bet_type::BetType, BettingRepository, ExecutionError},
    portfolio::BetPosition,
    strategy,
};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashSet;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Five-field cron evaluation for [`Schedule::Cron`](schedule::Schedule::Cron) entries.
pub mod cron;

/// Event min-heap with the two-channel ordering rule.
pub mod queue;

/// Schedule modes and per-entry activation state.
pub mod schedule;

use queue::EventQueue;
use schedule::{Schedule, ScheduleEntry};

/// All errors that terminate an engine run.
///
/// In-run betting faults never surface here; they become rejected confirmations the
/// strategy observes. Only programming errors (unknown pending bets, double settlements)
/// are fatal.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EngineError {
    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),
}

/// Deterministic, single-threaded event engine.
///
/// Replays the historical timeline so a strategy observes data, schedules callbacks,
/// submits bets, and receives confirmations and results in exactly the order a live venue
/// would produce them. Owns the event queue, schedule table and race snapshot for a run;
/// exactly one run is in progress at a time and every handler runs to completion before
/// the next event is dispatched.
pub struct Engine<Data, Betting, Strategy> {
    data: Arc<Data>,
    betting: Betting,
    clock: Clock,
    tick_interval: TimeDelta,
    schedules: Vec<ScheduleEntry<Strategy>>,
    queue: EventQueue,
    races: Vec<Race>,
    /// Races whose payoff publication has already been delivered this run.
    published_payoffs: FnvHashSet<RaceId>,
    timeline_end: Option<DateTime<Utc>>,
    next_tick: Option<DateTime<Utc>>,
    running: bool,
}

impl<Data, Betting, Strategy> Engine<Data, Betting, Strategy>
where
    Data: DataRepository,
    Betting: BettingRepository,
    Strategy: strategy::Strategy,
{
    /// Construct an engine over the provided repositories, defaulting to a simulated
    /// clock and a one-second tick interval.
    pub fn new(data: Arc<Data>, betting: Betting) -> Self {
        Self {
            data,
            betting,
            clock: Clock::simulated(),
            tick_interval: TimeDelta::seconds(1),
            schedules: Vec::new(),
            queue: EventQueue::default(),
            races: Vec::new(),
            published_payoffs: FnvHashSet::default(),
            timeline_end: None,
            next_tick: None,
            running: false,
        }
    }

    /// Replace the clock, e.g. with [`Clock::live`] for live runs.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Override the live-clock tick interval. Must be positive.
    pub fn with_tick_interval(mut self, tick_interval: TimeDelta) -> Self {
        assert!(
            tick_interval > TimeDelta::zero(),
            "tick_interval must be positive"
        );
        self.tick_interval = tick_interval;
        self
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn betting(&self) -> &Betting {
        &self.betting
    }

    /// Register a schedule before the run starts. Mid-run registration goes through
    /// [`EngineCtx::schedule`] instead.
    pub fn schedule<Name, Callback>(&mut self, name: Name, schedule: Schedule, callback: Callback)
    where
        Name: Into<SmolStr>,
        Callback: FnMut(&mut Strategy, &mut EngineCtx<'_, Strategy>) + 'static,
    {
        self.schedules
            .push(ScheduleEntry::new(name, schedule, Box::new(callback)));
    }

    /// Execute the engine loop for the provided strategy until the queue drains.
    pub fn run(&mut self, strategy: &mut Strategy) -> Result<(), EngineError> {
        self.queue = EventQueue::default();
        self.next_tick = None;
        self.published_payoffs.clear();

        let mut races = self.data.races();
        races.sort_by_key(|race| race.scheduled_at);
        self.races = races;

        let start = if self.clock.is_simulated() {
            self.races
                .first()
                .map(|race| race.scheduled_at)
                .unwrap_or_else(Utc::now)
        } else {
            self.clock.now()
        };
        self.clock.reset(Some(start));
        self.timeline_end = Some(start);
        self.running = true;
        info!(races = self.races.len(), %start, "starting run");

        let result = self.run_inner(strategy);

        self.running = false;
        self.next_tick = None;
        self.timeline_end = None;
        result
    }

    fn run_inner(&mut self, strategy: &mut Strategy) -> Result<(), EngineError> {
        self.dispatch(strategy, |strategy, ctx| strategy.on_start(ctx));

        let timeline_end = self.compute_timeline_end();
        self.timeline_end = Some(timeline_end);
        let now = self.clock.now();
        for entry in &mut self.schedules {
            entry.prepare(now, &self.races, self.tick_interval, timeline_end);
        }

        self.seed_data_events(now);

        let initial_tick = self.clock.now();
        self.next_tick = Some(initial_tick);
        self.queue.push(Event::Time(TimeEvent::new("tick", initial_tick)));

        self.pump(strategy)
    }

    /// Enqueue a `DataEvent` pair per race: the race card at its publish time and, when
    /// known, the payoffs at theirs. Availability never precedes the run start nor, for
    /// payoffs, the race card itself.
    fn seed_data_events(&mut self, now: DateTime<Utc>) {
        for index in 0..self.races.len() {
            let race = &self.races[index];
            let available_at = self
                .data
                .publish_time(&race.race_id, DataKind::Race)
                .unwrap_or(race.scheduled_at)
                .max(now);
            let payoff_available_at = self
                .data
                .publish_time(&race.race_id, DataKind::Payoff)
                .map(|publish| publish.max(available_at).max(now));

            let race_event = DataEvent::race(race.clone(), available_at);
            let payoff_event =
                payoff_available_at.map(|at| DataEvent::payoff(race.clone(), at));

            self.queue.push(Event::Data(race_event));
            if let Some(event) = payoff_event {
                self.queue.push(Event::Data(event));
            }
        }
    }

    /// Process events until the queue is exhausted.
    fn pump(&mut self, strategy: &mut Strategy) -> Result<(), EngineError> {
        while let Some((time, event)) = self.queue.pop() {
            match event {
                Event::Time(mut event) => {
                    self.next_tick = None;
                    event.scheduled_for = time;
                    self.clock.advance_to(time);
                    self.dispatch(strategy, |strategy, ctx| strategy.on_time(ctx, &event));
                    self.run_due_schedules(strategy, time);
                    self.schedule_next_tick();
                }
                Event::Data(mut event) => {
                    event.available_at = time;
                    self.clock.advance_to(time);
                    match event.kind {
                        DataKind::Race => {
                            self.dispatch(strategy, |strategy, ctx| {
                                strategy.on_data(ctx, &event)
                            });
                        }
                        DataKind::Payoff => {
                            self.published_payoffs.insert(event.race.race_id.clone());
                            event.payoffs = self.data.payoffs(&event.race.race_id);
                            self.dispatch(strategy, |strategy, ctx| {
                                strategy.on_data(ctx, &event)
                            });
                            let settled = self.betting.settle_race(&event.race.race_id)?;
                            self.emit_result_if_settled(&event.race.race_id, &settled);
                        }
                    }
                }
                Event::BetRequest(event) => {
                    self.clock.advance_to(time);
                    let confirmation = self.betting.place_bet(
                        event.race_id,
                        event.combination,
                        event.stake,
                        event.bet_type,
                        time,
                    );
                    // Ahead of any tick pending at the same instant, so the strategy sees
                    // the confirmation (and any settlement) before its next wake-up.
                    self.queue.push_front(Event::BetConfirmation(confirmation));
                }
                Event::BetConfirmation(mut event) => {
                    event.placed_at = time;
                    self.clock.advance_to(time);
                    if event.accepted {
                        let position = self.betting.confirm_bet(&event)?;
                        event.position = Some(position);
                        // A bet confirmed after the race already published its payoffs
                        // settles immediately.
                        if self.published_payoffs.contains(&event.race_id) {
                            let settled = self.betting.settle_race(&event.race_id)?;
                            self.emit_result_if_settled(&event.race_id, &settled);
                        }
                    }
                    self.dispatch(strategy, |strategy, ctx| strategy.on_bet(ctx, &event));
                }
                Event::Result(mut event) => {
                    event.settled_at = time;
                    self.clock.advance_to(time);
                    self.dispatch(strategy, |strategy, ctx| strategy.on_result(ctx, &event));
                }
            }
        }
        Ok(())
    }

    fn emit_result_if_settled(&mut self, race_id: &RaceId, settled: &[BetPosition]) {
        if settled.is_empty() {
            return;
        }
        self.queue.push(Event::Result(ResultEvent::new(
            race_id.clone(),
            self.clock.now(),
        )));
    }

    /// Run a strategy hook with a borrowed engine handle, then fold any schedules it
    /// registered into the table. Folding immediately after the hook returns keeps the
    /// observable order identical to preparing inside the registration call: nothing else
    /// runs in between.
    fn dispatch<Hook>(&mut self, strategy: &mut Strategy, hook: Hook)
    where
        Hook: FnOnce(&mut Strategy, &mut EngineCtx<'_, Strategy>),
    {
        let mut registrations = Vec::new();
        {
            let mut ctx = EngineCtx {
                clock: &self.clock,
                queue: &mut self.queue,
                data: self.data.as_ref(),
                betting: &self.betting,
                registrations: &mut registrations,
            };
            hook(strategy, &mut ctx);
        }
        self.absorb_registrations(registrations);
    }

    /// Prepare newly registered schedules and reschedule the next tick when one of them
    /// is due earlier.
    fn absorb_registrations(&mut self, registrations: Vec<ScheduleEntry<Strategy>>) {
        if registrations.is_empty() {
            return;
        }
        let now = self.clock.now();
        let timeline_end = self.compute_timeline_end();
        self.timeline_end = Some(timeline_end);
        for mut entry in registrations {
            entry.prepare(now, &self.races, self.tick_interval, timeline_end);
            debug!(name = %entry.name, next_due = ?entry.next_due, "registered schedule");
            self.schedules.push(entry);
        }
        self.schedule_next_tick();
    }

    /// Invoke every schedule due at `now`, advancing each after it fires. The inner loop
    /// handles entries that become due again at the same instant.
    fn run_due_schedules(&mut self, strategy: &mut Strategy, now: DateTime<Utc>) {
        let mut index = 0;
        while index < self.schedules.len() {
            while self.schedules[index]
                .next_due
                .is_some_and(|due| due <= now)
            {
                let Some(mut callback) = self.schedules[index].take_callback() else {
                    break;
                };
                let mut registrations = Vec::new();
                {
                    let mut ctx = EngineCtx {
                        clock: &self.clock,
                        queue: &mut self.queue,
                        data: self.data.as_ref(),
                        betting: &self.betting,
                        registrations: &mut registrations,
                    };
                    callback(strategy, &mut ctx);
                }
                self.schedules[index].restore_callback(callback);
                self.absorb_registrations(registrations);

                let timeline_end = self.timeline_end.unwrap_or(now);
                self.schedules[index].advance(now, &self.races, timeline_end);
            }
            index += 1;
        }
    }

    /// Enqueue the next tick when there is a future reason to wake.
    ///
    /// With the simulated clock the candidate is the earliest future non-tick event or
    /// schedule activation; with the live clock it is `now + tick_interval`. A tick is
    /// never scheduled beyond the timeline end, and an already-queued earlier tick is
    /// never replaced by a later one.
    fn schedule_next_tick(&mut self) {
        if !self.running {
            return;
        }
        let has_regular = self.queue.has_regular();
        let has_schedule = self.schedules.iter().any(|entry| entry.next_due.is_some());
        if !has_regular && !has_schedule {
            return;
        }

        let now = self.clock.now();
        let next_tick = if self.clock.is_simulated() {
            let queue_candidate = self.queue.next_regular_after(now);
            let schedule_candidate = self
                .schedules
                .iter()
                .filter_map(|entry| entry.next_due)
                .filter(|due| *due > now)
                .min();
            match (queue_candidate, schedule_candidate) {
                (Some(queued), Some(due)) => queued.min(due),
                (Some(queued), None) => queued,
                (None, Some(due)) => due,
                (None, None) => return,
            }
        } else {
            now + self.tick_interval
        };

        if self.timeline_end.is_some_and(|end| next_tick > end) {
            return;
        }
        if self.next_tick.is_some_and(|scheduled| next_tick >= scheduled) {
            return;
        }
        self.next_tick = Some(next_tick);
        self.queue.push(Event::Time(TimeEvent::new("tick", next_tick)));
    }

    /// Upper bound beyond which schedules stop firing so the simulation terminates.
    fn compute_timeline_end(&self) -> DateTime<Utc> {
        let Some(last_race_time) = self.races.iter().map(|race| race.scheduled_at).max() else {
            return self.clock.now();
        };
        let max_offset = self
            .schedules
            .iter()
            .filter_map(ScheduleEntry::relative_offset)
            .filter(|offset| *offset > TimeDelta::zero())
            .max()
            .unwrap_or_else(TimeDelta::zero);

        let mut timeline_end = last_race_time + max_offset;
        if let Some(last_payoff) = self
            .races
            .iter()
            .filter_map(|race| self.data.publish_time(&race.race_id, DataKind::Payoff))
            .max()
        {
            timeline_end = timeline_end.max(last_payoff);
        }
        // Let absolute and cron schedules fire on the final race day without keeping the
        // simulation alive indefinitely.
        timeline_end.max(last_race_time + TimeDelta::days(1))
    }
}

/// Non-owning engine handle passed to every strategy hook and schedule callback.
///
/// This is the strategy's only channel back into the engine: scheduling, bet submission,
/// and read access to the clock, portfolio and data repository. It borrows the engine's
/// internals for the duration of one hook invocation and is never stored.
pub struct EngineCtx<'a, Strategy> {
    clock: &'a Clock,
    queue: &'a mut EventQueue,
    data: &'a dyn DataRepository,
    betting: &'a dyn BettingRepository,
    registrations: &'a mut Vec<ScheduleEntry<Strategy>>,
}

impl<Strategy> EngineCtx<'_, Strategy> {
    /// Current engine time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a schedule. Mid-run registrations are prepared as soon as the current
    /// hook returns and may cause the next tick to be rescheduled earlier.
    pub fn schedule<Name, Callback>(&mut self, name: Name, schedule: Schedule, callback: Callback)
    where
        Name: Into<SmolStr>,
        Callback: FnMut(&mut Strategy, &mut EngineCtx<'_, Strategy>) + 'static,
    {
        self.registrations
            .push(ScheduleEntry::new(name, schedule, Box::new(callback)));
    }

    /// Submit a bet request, stamped with the current engine time. The confirmation
    /// arrives through [`Strategy::on_bet`](crate::strategy::Strategy::on_bet).
    pub fn place_bet<Horses>(
        &mut self,
        race_id: RaceId,
        horse_ids: Horses,
        stake: Decimal,
        bet_type: BetType,
    ) where
        Horses: IntoIterator<Item = HorseId>,
    {
        let event = BetRequestEvent::new(
            race_id,
            bet_type,
            horse_ids.into_iter().collect(),
            stake,
            self.clock.now(),
        );
        self.queue.push(Event::BetRequest(event));
    }

    /// Available bankroll.
    pub fn balance(&self) -> Decimal {
        self.betting.balance()
    }

    /// All recorded positions, in placement order.
    pub fn positions(&self) -> Vec<BetPosition> {
        self.betting.positions()
    }

    /// Historical win statistics for a horse.
    pub fn historical(&self, horse_id: &HorseId) -> HistoricalStats {
        self.data.historical(horse_id)
    }

    /// Look up a race by identifier.
    pub fn race(&self, race_id: &RaceId) -> Option<Race> {
        self.data.race(race_id)
    }
}
