use crate::{
    data::{
        model::{HorseEntry, HorseId, Payoff, Race, RaceId},
        DataError,
    },
    execution::bet_type::BetType,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw race row as it arrives from an external adaptor (CSV, workbook, table).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct RaceRecord {
    pub race_id: String,
    /// ISO datetime; naive values are interpreted as UTC.
    pub date: String,
    pub course: String,
    pub distance: i64,
    pub ground: String,
    pub weather: String,
}

/// Raw horse entry row.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct HorseRecord {
    pub race_id: String,
    pub horse_id: String,
    pub name: String,
    pub jockey: String,
    pub trainer: String,
    pub draw: i64,
    /// JSON object mapping bet type to a positive quoted price.
    pub odds: String,
}

/// Raw payoff row.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct PayoffRecord {
    pub race_id: String,
    pub bet_type: String,
    /// Hyphen-joined runner ids, or a JSON array of ids.
    pub combination: String,
    pub odds: Decimal,
    pub payout: Decimal,
}

/// Validate race and horse rows together and build domain [`Race`]s.
///
/// Every invalid row is reported; nothing is built unless the whole batch passes.
pub fn build_races(
    races: Vec<RaceRecord>,
    horses: Vec<HorseRecord>,
) -> Result<Vec<Race>, DataError> {
    let mut errors = Vec::new();
    let mut entries_by_race: HashMap<String, Vec<HorseEntry>> = HashMap::new();

    for (index, record) in horses.into_iter().enumerate() {
        match build_horse(record) {
            Ok(entry) => entries_by_race
                .entry(entry.race_id.name().to_string())
                .or_default()
                .push(entry),
            Err(error) => errors.push(format!("horse row {index}: {error}")),
        }
    }

    let mut built = Vec::with_capacity(races.len());
    for (index, record) in races.into_iter().enumerate() {
        let entries = entries_by_race
            .remove(&record.race_id)
            .unwrap_or_default();
        match build_race(record, entries) {
            Ok(race) => built.push(race),
            Err(error) => errors.push(format!("race row {index}: {error}")),
        }
    }

    if errors.is_empty() {
        Ok(built)
    } else {
        Err(DataError::Validation { errors })
    }
}

/// Validate payoff rows and build domain [`Payoff`]s, batching all row errors.
pub fn build_payoffs(records: Vec<PayoffRecord>) -> Result<Vec<Payoff>, DataError> {
    let mut errors = Vec::new();
    let mut built = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        match build_payoff(record) {
            Ok(payoff) => built.push(payoff),
            Err(error) => errors.push(format!("payoff row {index}: {error}")),
        }
    }

    if errors.is_empty() {
        Ok(built)
    } else {
        Err(DataError::Validation { errors })
    }
}

fn build_race(record: RaceRecord, horses: Vec<HorseEntry>) -> Result<Race, String> {
    if record.race_id.trim().is_empty() {
        return Err("race_id must be non-empty".to_string());
    }
    if record.distance <= 0 {
        return Err(format!("distance must be positive, got {}", record.distance));
    }
    if horses.is_empty() {
        return Err(format!("race {} has no horses", record.race_id));
    }
    let scheduled_at = parse_timestamp(&record.date)?;

    Ok(Race::new(
        RaceId::new(record.race_id.as_str()),
        scheduled_at,
        record.course.into(),
        record.distance as u32,
        record.ground.into(),
        record.weather.into(),
        horses,
    ))
}

fn build_horse(record: HorseRecord) -> Result<HorseEntry, String> {
    if record.horse_id.trim().is_empty() {
        return Err("horse_id must be non-empty".to_string());
    }
    if record.draw < 1 {
        return Err(format!("draw must be >= 1, got {}", record.draw));
    }

    let raw_odds: HashMap<String, Decimal> = serde_json::from_str(&record.odds)
        .map_err(|error| format!("invalid odds json {:?}: {error}", record.odds))?;

    let mut odds = FnvHashMap::default();
    for (bet_type, price) in raw_odds {
        if price <= Decimal::ZERO {
            return Err(format!("odds for {bet_type} must be positive, got {price}"));
        }
        odds.insert(BetType::parse(&bet_type), price);
    }

    Ok(HorseEntry::new(
        RaceId::new(record.race_id.as_str()),
        HorseId::new(record.horse_id.as_str()),
        record.name.into(),
        record.jockey.into(),
        record.trainer.into(),
        record.draw as u32,
        odds,
    ))
}

fn build_payoff(record: PayoffRecord) -> Result<Payoff, String> {
    if record.odds <= Decimal::ZERO {
        return Err(format!("odds must be positive, got {}", record.odds));
    }
    if record.payout < Decimal::ZERO {
        return Err(format!("payout must be non-negative, got {}", record.payout));
    }
    let combination = parse_combination(&record.combination)?;

    Ok(Payoff::new(
        RaceId::new(record.race_id.as_str()),
        BetType::parse(&record.bet_type),
        combination,
        record.odds,
        record.payout,
    ))
}

/// Parse a serialised combination cell into runner ids.
///
/// Accepts hyphen-joined ids (`"H1-H2"`) or a JSON array (`["H1", "H2"]`).
pub fn parse_combination(raw: &str) -> Result<Vec<HorseId>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("combination must be non-empty".to_string());
    }
    let ids: Vec<HorseId> = if raw.starts_with('[') {
        let values: Vec<String> = serde_json::from_str(raw)
            .map_err(|error| format!("invalid combination json {raw:?}: {error}"))?;
        values.iter().map(|id| HorseId::new(id.as_str())).collect()
    } else {
        raw.split('-')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(HorseId::new)
            .collect()
    };

    if ids.is_empty() {
        return Err(format!("combination {raw:?} contains no runner ids"));
    }
    Ok(ids)
}

/// Parse an ISO-ish timestamp, interpreting naive values as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(moment) = DateTime::parse_from_rfc3339(raw) {
        return Ok(moment.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc());
    }
    Err(format!("unparsable datetime: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn race_record(race_id: &str, date: &str, distance: i64) -> RaceRecord {
        RaceRecord {
            race_id: race_id.to_string(),
            date: date.to_string(),
            course: "Tokyo".to_string(),
            distance,
            ground: "turf".to_string(),
            weather: "fine".to_string(),
        }
    }

    fn horse_record(race_id: &str, horse_id: &str, draw: i64, odds: &str) -> HorseRecord {
        HorseRecord {
            race_id: race_id.to_string(),
            horse_id: horse_id.to_string(),
            name: horse_id.to_string(),
            jockey: "J".to_string(),
            trainer: "T".to_string(),
            draw,
            odds: odds.to_string(),
        }
    }

    #[test]
    fn test_build_races_attaches_horses() {
        let races = vec![race_record("R1", "2024-04-01T00:00:00", 1600)];
        let horses = vec![
            horse_record("R1", "H1", 1, r#"{"win": 1.5}"#),
            horse_record("R1", "H2", 2, r#"{"単勝": 4.0}"#),
        ];

        let built = build_races(races, horses).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].horses.len(), 2);
        assert_eq!(
            built[0].horses[1].odds(&BetType::Win),
            Some(dec!(4.0)),
            "japanese alias should fold into the win market"
        );
    }

    #[test]
    fn test_build_races_batches_all_errors() {
        let races = vec![
            race_record("R1", "2024-04-01T00:00:00", 0),
            race_record("R2", "not-a-date", 1600),
        ];
        let horses = vec![
            horse_record("R1", "H1", 0, r#"{"win": 1.5}"#),
            horse_record("R2", "H2", 1, r#"{"win": -2.0}"#),
        ];

        let error = build_races(races, horses).unwrap_err();
        match error {
            DataError::Validation { errors } => {
                assert_eq!(errors.len(), 4, "expected every bad row reported: {errors:?}")
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_parse_combination_formats() {
        assert_eq!(
            parse_combination("H1-H2").unwrap(),
            vec![HorseId::new("H1"), HorseId::new("H2")]
        );
        assert_eq!(
            parse_combination(r#"["H1", "H2"]"#).unwrap(),
            vec![HorseId::new("H1"), HorseId::new("H2")]
        );
        assert!(parse_combination("  ").is_err());
    }

    #[test]
    fn test_build_payoffs_rejects_bad_rows() {
        let records = vec![
            PayoffRecord {
                race_id: "R1".to_string(),
                bet_type: "win".to_string(),
                combination: "H1".to_string(),
                odds: dec!(1.5),
                payout: dec!(150),
            },
            PayoffRecord {
                race_id: "R1".to_string(),
                bet_type: "win".to_string(),
                combination: "H2".to_string(),
                odds: dec!(0),
                payout: dec!(-10),
            },
        ];

        let error = build_payoffs(records).unwrap_err();
        match error {
            DataError::Validation { errors } => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let parsed = parse_timestamp("2024-04-01T09:30:00").unwrap();
        assert_eq!(parsed, DateTime::parse_from_rfc3339("2024-04-01T09:30:00Z").unwrap());
        assert!(parse_timestamp("2024-04-01").is_ok());
        assert!(parse_timestamp("April 1st").is_err());
    }
}
