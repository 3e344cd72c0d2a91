use crate::data::model::{HistoricalStats, HorseId, Payoff, Race, RaceId};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain types for races, runners, payoffs and historical statistics.
pub mod model;

/// Raw ingestion records and batched validation into domain types.
pub mod record;

/// [`DataAdaptor`](adaptor::DataAdaptor) seam and the CSV implementation.
pub mod adaptor;

/// Read-only [`DataRepository`] implementations for simulation and live runs.
pub mod repository;

/// What kind of data a publication event carries.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    #[display("race")]
    Race,
    #[display("payoff")]
    Payoff,
}

/// Read-only source of races, payoffs, historical statistics and publish times.
///
/// The engine treats this as static for the duration of a run; any registration APIs on a
/// live implementation must be called before [`Engine::run`](crate::engine::Engine::run).
pub trait DataRepository {
    /// Return the race with the given identifier.
    fn race(&self, race_id: &RaceId) -> Option<Race>;

    /// All known races, in no particular order; the engine sorts by scheduled start.
    fn races(&self) -> Vec<Race>;

    /// Payoffs recorded for a race, empty before publication or when unknown.
    fn payoffs(&self, race_id: &RaceId) -> Vec<Payoff>;

    /// Historical win statistics for a horse, zeroed when unknown.
    fn historical(&self, horse_id: &HorseId) -> HistoricalStats;

    /// When the given kind of data becomes visible for a race, if ever.
    fn publish_time(&self, race_id: &RaceId, kind: DataKind) -> Option<DateTime<Utc>>;
}

/// All errors generated while loading or validating racing data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read data source: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),

    /// Row-level validation failures, batched so a single load reports every bad record.
    #[error("data validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },
}
