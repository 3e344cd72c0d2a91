use crate::{
    data::model::{HorseId, RaceId},
    execution::bet_type::BetType,
};
use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Unique identifier assigned to a bet by the betting repository.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct BetId(SmolStr);

impl BetId {
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

impl From<&str> for BetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle state of a [`BetPosition`].
///
/// Transitions are monotonic: `Open -> Settled` in simulation, `Open -> Submitted` when a
/// live repository hands the bet to an external broker.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[display("open")]
    Open,
    #[display("submitted")]
    Submitted,
    #[display("settled")]
    Settled,
}

impl std::str::FromStr for PositionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "submitted" => Ok(Self::Submitted),
            "settled" => Ok(Self::Settled),
            other => Err(format!("unknown position status: {other:?}")),
        }
    }
}

/// An accepted bet held by the portfolio until settlement.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BetPosition {
    pub bet_id: BetId,
    pub race_id: RaceId,
    pub bet_type: BetType,
    /// Runners included in the wager.
    pub combination: Vec<HorseId>,
    /// Stake committed to the bet, validated `> 0`.
    pub stake: Decimal,
    pub placed_at: DateTime<Utc>,
    pub status: PositionStatus,
    /// Payout received once the bet settles, zero until then.
    pub payout: Decimal,
}

impl BetPosition {
    /// Realised profit for a settled position, negative exposure otherwise.
    pub fn profit(&self) -> Decimal {
        self.payout - self.stake
    }
}

/// All errors generated in the portfolio module.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PortfolioError {
    #[error("stake must be positive, got {0}")]
    InvalidStake(Decimal),

    #[error("insufficient cash to place bet (stake {stake}, cash {cash})")]
    InsufficientCash { stake: Decimal, cash: Decimal },

    #[error("unknown bet id: {0}")]
    UnknownBet(BetId),

    #[error("bet {0} already settled")]
    AlreadySettled(BetId),
}

/// Cash ledger and position store for a single run.
///
/// Invariant: `cash >= 0` at all times, and
/// `cash + open stakes + pending stakes == initial bankroll + settled (payout - stake)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Portfolio {
    /// Starting bankroll value.
    pub initial_bankroll: Decimal,
    /// Available cash not tied up in open bets.
    pub cash: Decimal,
    /// Positions keyed by bet identifier, in placement order.
    positions: IndexMap<BetId, BetPosition>,
}

impl Portfolio {
    /// Create a new portfolio seeded with `bankroll` cash.
    pub fn new(bankroll: Decimal) -> Self {
        Self {
            initial_bankroll: bankroll,
            cash: bankroll,
            positions: IndexMap::new(),
        }
    }

    /// Reserve stake for a bet and record the resulting position with status `Open`.
    pub fn place_bet(
        &mut self,
        bet_id: BetId,
        race_id: RaceId,
        bet_type: BetType,
        combination: Vec<HorseId>,
        stake: Decimal,
        placed_at: DateTime<Utc>,
    ) -> Result<BetPosition, PortfolioError> {
        if stake <= Decimal::ZERO {
            return Err(PortfolioError::InvalidStake(stake));
        }
        if stake > self.cash {
            return Err(PortfolioError::InsufficientCash {
                stake,
                cash: self.cash,
            });
        }
        let position = BetPosition {
            bet_id: bet_id.clone(),
            race_id,
            bet_type,
            combination,
            stake,
            placed_at,
            status: PositionStatus::Open,
            payout: Decimal::ZERO,
        };
        self.cash -= stake;
        self.positions.insert(bet_id, position.clone());
        Ok(position)
    }

    /// Settle the specified bet, releasing `payout` into cash exactly once.
    pub fn settle_bet(
        &mut self,
        bet_id: &BetId,
        payout: Decimal,
    ) -> Result<BetPosition, PortfolioError> {
        let position = self
            .positions
            .get_mut(bet_id)
            .ok_or_else(|| PortfolioError::UnknownBet(bet_id.clone()))?;
        if position.status != PositionStatus::Open {
            return Err(PortfolioError::AlreadySettled(bet_id.clone()));
        }
        position.status = PositionStatus::Settled;
        position.payout = payout;
        self.cash += payout;
        Ok(position.clone())
    }

    /// Mark an open bet as handed to an external broker.
    pub fn mark_submitted(&mut self, bet_id: &BetId) -> Result<BetPosition, PortfolioError> {
        let position = self
            .positions
            .get_mut(bet_id)
            .ok_or_else(|| PortfolioError::UnknownBet(bet_id.clone()))?;
        position.status = PositionStatus::Submitted;
        Ok(position.clone())
    }

    /// Current cash balance.
    pub fn bankroll(&self) -> Decimal {
        self.cash
    }

    /// All recorded positions, in placement order.
    pub fn positions(&self) -> impl Iterator<Item = &BetPosition> {
        self.positions.values()
    }

    /// Look up a recorded position by bet identifier.
    pub fn position(&self, bet_id: &BetId) -> Option<&BetPosition> {
        self.positions.get(bet_id)
    }

    /// Positions that have not yet settled.
    pub fn open_positions(&self) -> Vec<BetPosition> {
        self.positions
            .values()
            .filter(|position| position.status == PositionStatus::Open)
            .cloned()
            .collect()
    }

    /// Positions that have settled.
    pub fn settled_positions(&self) -> Vec<BetPosition> {
        self.positions
            .values()
            .filter(|position| position.status == PositionStatus::Settled)
            .cloned()
            .collect()
    }

    /// Combined realised and unrealised profit.
    pub fn total_profit(&self) -> Decimal {
        let realised: Decimal = self
            .settled_positions()
            .iter()
            .map(BetPosition::profit)
            .sum();
        let unrealised: Decimal = self.open_positions().iter().map(|p| p.stake).sum();
        realised - unrealised
    }
}
