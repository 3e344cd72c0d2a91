//! # Baken
//! Baken is a deterministic, **event-driven backtesting engine for horse-racing betting
//! strategies**. Given a static catalogue of races, runners and settled payoffs plus a
//! user-supplied strategy, it replays the historical timeline so the strategy observes
//! data, schedules callbacks, submits bets, and receives confirmations and results in
//! exactly the order a live venue would produce them.
//!
//! ## Overview
//! At a high level it provides several de-coupled components that interact via a set of
//! traits:
//!
//! * **Data**: the [`DataRepository`](data::DataRepository) trait governs read-only access
//!   to races, payoffs, historical statistics and publish times. A
//!   [`SimulationDataRepository`](data::repository::SimulationDataRepository) serves static
//!   datasets loaded through a [`DataAdaptor`](data::adaptor::DataAdaptor) (CSV ships with
//!   the crate); a [`LiveDataRepository`](data::repository::LiveDataRepository) is fed by
//!   pre-run registrations.
//! * **Portfolio**: the [`Portfolio`](portfolio::Portfolio) owns the cash ledger and
//!   position store, reserving stake when bets are placed and releasing payouts exactly
//!   once at settlement.
//! * **Execution**: the [`BettingRepository`](execution::BettingRepository) trait governs
//!   the order lifecycle, separating bet request, broker confirmation and race-level
//!   settlement. The simulation variant settles against recorded payoffs; the live
//!   variant defers settlement to an external broker.
//! * **Engine**: the [`Engine`](engine::Engine) owns the event queue, schedule table and
//!   virtual [`Clock`](clock::Clock), pumping events in timestamp order and advancing the
//!   clock to each popped event's time.
//! * **Strategy**: the [`Strategy`](strategy::Strategy) trait exposes five hooks, all
//!   no-op by default, plus an [`EngineCtx`](engine::EngineCtx) handle for scheduling and
//!   bet submission.
//! * **Statistic**: [`KpiSummary`](statistic::KpiSummary) aggregates settled positions
//!   into win rate, ROI, drawdown and streak metrics.
//!
//! ## Getting started
//! ```
//! use baken::{
//!     data::repository::SimulationDataRepository,
//!     engine::Engine,
//!     execution::{simulated::SimulationBettingRepository, BettingRepository},
//!     portfolio::Portfolio,
//!     strategy::naive_favorite::NaiveFavorite,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let data = Arc::new(SimulationDataRepository::new(vec![], vec![]));
//! let betting = SimulationBettingRepository::new(Portfolio::new(dec!(1000)), Arc::clone(&data));
//! let mut engine = Engine::new(data, betting);
//!
//! let mut strategy = NaiveFavorite::default();
//! engine.run(&mut strategy).unwrap();
//! assert_eq!(engine.betting().positions().len(), 0);
//! ```

/// Clock abstraction: wall-clock for live runs, simulated for backtests.
pub mod clock;

/// Run configuration loaded from YAML.
pub mod config;

/// Racing data: domain model, ingestion records, adaptors and repositories.
pub mod data;

/// Engine loop, event queue, scheduler and the strategy-facing handle.
pub mod engine;

/// Crate-level error aggregation.
pub mod error;

/// Event variants processed by the engine.
pub mod event;

/// Betting repositories and the canonical bet-type vocabulary.
pub mod execution;

/// Bet-history CSV persistence.
pub mod history;

/// Logging initialisation utilities.
pub mod logging;

/// Cash ledger and position store.
pub mod portfolio;

/// KPI aggregation over run results.
pub mod statistic;

/// Strategy contract and the shipped reference strategies.
pub mod strategy;
