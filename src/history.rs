use crate::{
    data::{model::RaceId, record::parse_combination},
    error::BakenError,
    execution::bet_type::BetType,
    portfolio::{BetId, BetPosition, PositionStatus},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of the persisted bet-history CSV.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
struct HistoryRecord {
    bet_id: String,
    race_id: String,
    bet_type: String,
    /// Hyphen-joined runner ids.
    combination: String,
    stake: Decimal,
    payout: Decimal,
    status: String,
}

impl From<&BetPosition> for HistoryRecord {
    fn from(position: &BetPosition) -> Self {
        Self {
            bet_id: position.bet_id.to_string(),
            race_id: position.race_id.to_string(),
            bet_type: position.bet_type.to_string(),
            combination: position
                .combination
                .iter()
                .map(|horse| horse.name())
                .collect::<Vec<_>>()
                .join("-"),
            stake: position.stake,
            payout: position.payout,
            status: position.status.to_string(),
        }
    }
}

/// Persist positions as a bet-history CSV with columns
/// `bet_id, race_id, bet_type, combination, stake, payout, status`.
pub fn write_positions<'a, P, Positions>(path: P, positions: Positions) -> Result<(), BakenError>
where
    P: AsRef<Path>,
    Positions: IntoIterator<Item = &'a BetPosition>,
{
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for position in positions {
        writer.serialize(HistoryRecord::from(position))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read positions back from a bet-history CSV for offline reporting.
///
/// Placement times are not persisted; restored positions are stamped with the read time.
pub fn read_positions<P>(path: P) -> Result<Vec<BetPosition>, BakenError>
where
    P: AsRef<Path>,
{
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut positions = Vec::new();
    for result in reader.deserialize() {
        let record: HistoryRecord = result?;
        let combination = parse_combination(&record.combination).unwrap_or_default();
        positions.push(BetPosition {
            bet_id: BetId::new(record.bet_id.as_str()),
            race_id: RaceId::new(record.race_id.as_str()),
            bet_type: BetType::parse(&record.bet_type),
            combination,
            stake: record.stake,
            placed_at: Utc::now(),
            status: record
                .status
                .parse::<PositionStatus>()
                .unwrap_or(PositionStatus::Settled),
            payout: record.payout,
        });
    }
    Ok(positions)
}
