use crate::execution::bet_type::BetType;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Unique identifier for a [`Race`].
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct RaceId(SmolStr);

impl RaceId {
    pub fn new<Id>(id: Id) -> Self
    where
        Id: Into<SmolStr>,
    {
        Self(id.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for a horse across races.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct HorseId(SmolStr);

impl HorseId {
    pub fn new<Id>(id: Id) -> Self
    where
        Id: Into<SmolStr>,
    {
        Self(id.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HorseId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A scheduled race with a fixed set of runners.
///
/// Immutable once loaded; owned by the data repository and cloned into events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Race {
    pub race_id: RaceId,
    /// Scheduled start time (UTC).
    pub scheduled_at: DateTime<Utc>,
    pub course: SmolStr,
    /// Race distance in metres.
    pub distance: u32,
    /// Track condition at post time.
    pub ground: SmolStr,
    pub weather: SmolStr,
    /// Participants; validated non-empty at load time.
    pub horses: Vec<HorseEntry>,
}

impl Race {
    /// Return the runner with the provided identifier, if entered.
    pub fn horse(&self, horse_id: &HorseId) -> Option<&HorseEntry> {
        self.horses.iter().find(|horse| &horse.horse_id == horse_id)
    }
}

/// A horse participating in a specific race.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct HorseEntry {
    pub race_id: RaceId,
    pub horse_id: HorseId,
    pub name: SmolStr,
    pub jockey: SmolStr,
    pub trainer: SmolStr,
    /// Gate draw position, validated `>= 1`.
    pub draw: u32,
    /// Quoted odds keyed by bet type; aliases are folded into canonical [`BetType`]s at load.
    pub odds: FnvHashMap<BetType, Decimal>,
}

impl HorseEntry {
    /// Quoted odds for the provided market, if any.
    pub fn odds(&self, bet_type: &BetType) -> Option<Decimal> {
        self.odds.get(bet_type).copied()
    }
}

/// The price a specific bet-type/combination earned for a settled race.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Payoff {
    pub race_id: RaceId,
    pub bet_type: BetType,
    /// Runner combination that yielded the payoff; order matters for exact markets.
    pub combination: Vec<HorseId>,
    /// Odds paid for the winning combination, validated `> 0`.
    pub odds: Decimal,
    /// Payout for a unit stake, validated `>= 0`.
    pub payout: Decimal,
}

/// Win statistics for a horse, derived on demand by the data repository.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize, Constructor)]
pub struct HistoricalStats {
    pub starts: u32,
    pub wins: u32,
    /// `wins / starts`, zero when the horse is unknown.
    pub win_rate: f64,
}
