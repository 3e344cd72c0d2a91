use crate::{
    data::{
        model::{HorseId, Payoff, Race, RaceId},
        DataKind,
    },
    execution::bet_type::BetType,
    portfolio::{BetId, BetPosition},
};
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Events that occur during a run. [`TimeEvent`] drives the scheduler forward, [`DataEvent`]
/// publishes race cards and payoffs, and the three betting variants carry the bet lifecycle
/// (request, broker confirmation, race-level settlement).
///
/// Every variant carries the UTC timestamp that governs its position in the engine queue.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Event {
    Time(TimeEvent),
    Data(DataEvent),
    BetRequest(BetRequestEvent),
    BetConfirmation(BetConfirmationEvent),
    Result(ResultEvent),
}

impl Event {
    /// Timestamp used to order this event in the queue.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Time(event) => event.scheduled_for,
            Self::Data(event) => event.available_at,
            Self::BetRequest(event) => event.placed_at,
            Self::BetConfirmation(event) => event.placed_at,
            Self::Result(event) => event.settled_at,
        }
    }
}

/// Tick emitted by the engine clock.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TimeEvent {
    /// Identifier for the tick source.
    pub name: SmolStr,
    /// When the tick is scheduled to occur.
    pub scheduled_for: DateTime<Utc>,
}

impl TimeEvent {
    pub fn new<Name>(name: Name, scheduled_for: DateTime<Utc>) -> Self
    where
        Name: Into<SmolStr>,
    {
        Self {
            name: name.into(),
            scheduled_for,
        }
    }
}

/// New data published by the data repository.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct DataEvent {
    /// What kind of data became visible (race card or payoffs).
    pub kind: DataKind,
    /// Race the data belongs to.
    pub race: Race,
    /// When the data becomes available.
    pub available_at: DateTime<Utc>,
    /// Payoff payload, populated by the engine for `kind == Payoff`.
    pub payoffs: Vec<Payoff>,
}

impl DataEvent {
    /// Construct a race-card publication event with an empty payoff payload.
    pub fn race(race: Race, available_at: DateTime<Utc>) -> Self {
        Self::new(DataKind::Race, race, available_at, Vec::new())
    }

    /// Construct a payoff publication event. The engine fills `payoffs` at delivery time.
    pub fn payoff(race: Race, available_at: DateTime<Utc>) -> Self {
        Self::new(DataKind::Payoff, race, available_at, Vec::new())
    }
}

/// Request raised by a strategy asking for a bet to be placed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BetRequestEvent {
    pub race_id: RaceId,
    pub bet_type: BetType,
    /// Runner identifiers involved in the bet.
    pub combination: Vec<HorseId>,
    pub stake: Decimal,
    /// Stamped with the engine clock at submission.
    pub placed_at: DateTime<Utc>,
}

/// Outcome of a bet request, produced synchronously by the betting repository.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BetConfirmationEvent {
    /// Identifier assigned by the betting repository.
    pub bet_id: BetId,
    pub race_id: RaceId,
    pub bet_type: BetType,
    pub combination: Vec<HorseId>,
    pub stake: Decimal,
    pub placed_at: DateTime<Utc>,
    /// Whether the request passed validation and reserved cash.
    pub accepted: bool,
    /// Diagnostic for rejected requests.
    pub message: Option<String>,
    /// Portfolio position, attached by the engine once an accepted bet is confirmed.
    pub position: Option<BetPosition>,
}

/// Emitted when a race has settled at least one position.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct ResultEvent {
    pub race_id: RaceId,
    pub settled_at: DateTime<Utc>,
}
