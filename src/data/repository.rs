use crate::{
    data::{
        adaptor::DataAdaptor,
        model::{HistoricalStats, HorseId, Payoff, Race, RaceId},
        DataError, DataKind, DataRepository,
    },
    execution::bet_type::BetType,
};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;

/// Default delay between a race running and its payoffs being published.
pub fn default_payoff_delay() -> TimeDelta {
    TimeDelta::minutes(10)
}

/// Repository serving a static dataset for simulations.
///
/// Publish times are derived from the race card: the race itself becomes visible at its
/// scheduled start, payoffs after a configurable delay (default 10 minutes).
#[derive(Debug, Clone)]
pub struct SimulationDataRepository {
    races: FnvHashMap<RaceId, Race>,
    payoffs: FnvHashMap<RaceId, Vec<Payoff>>,
    payoff_delay: TimeDelta,
}

impl SimulationDataRepository {
    pub fn new(races: Vec<Race>, payoffs: Vec<Payoff>) -> Self {
        let mut races_by_id = FnvHashMap::default();
        for race in races {
            races_by_id.insert(race.race_id.clone(), race);
        }
        let mut payoffs_by_race: FnvHashMap<RaceId, Vec<Payoff>> = FnvHashMap::default();
        for payoff in payoffs {
            payoffs_by_race
                .entry(payoff.race_id.clone())
                .or_default()
                .push(payoff);
        }
        Self {
            races: races_by_id,
            payoffs: payoffs_by_race,
            payoff_delay: default_payoff_delay(),
        }
    }

    /// Load the dataset through any [`DataAdaptor`].
    pub fn from_adaptor<Adaptor>(adaptor: &Adaptor) -> Result<Self, DataError>
    where
        Adaptor: DataAdaptor,
    {
        Ok(Self::new(adaptor.load_races()?, adaptor.load_payoffs()?))
    }

    /// Load the dataset from a directory of CSV files.
    pub fn from_csv<P>(base_path: P) -> Result<Self, DataError>
    where
        P: Into<std::path::PathBuf>,
    {
        Self::from_adaptor(&crate::data::adaptor::CsvAdaptor::new(base_path))
    }

    /// Override the payoff publication delay.
    pub fn with_payoff_delay(mut self, delay: TimeDelta) -> Self {
        self.payoff_delay = delay;
        self
    }
}

impl DataRepository for SimulationDataRepository {
    fn race(&self, race_id: &RaceId) -> Option<Race> {
        self.races.get(race_id).cloned()
    }

    fn races(&self) -> Vec<Race> {
        self.races.values().cloned().collect()
    }

    fn payoffs(&self, race_id: &RaceId) -> Vec<Payoff> {
        self.payoffs.get(race_id).cloned().unwrap_or_default()
    }

    fn historical(&self, horse_id: &HorseId) -> HistoricalStats {
        let starts = self
            .races
            .values()
            .filter(|race| race.horse(horse_id).is_some())
            .count() as u32;
        if starts == 0 {
            return HistoricalStats::default();
        }
        let wins = self
            .payoffs
            .values()
            .flatten()
            .filter(|payoff| {
                payoff.bet_type == BetType::Win && payoff.combination.contains(horse_id)
            })
            .count() as u32;
        HistoricalStats::new(starts, wins, f64::from(wins) / f64::from(starts))
    }

    fn publish_time(&self, race_id: &RaceId, kind: DataKind) -> Option<DateTime<Utc>> {
        let race = self.races.get(race_id)?;
        match kind {
            DataKind::Race => Some(race.scheduled_at),
            DataKind::Payoff => Some(race.scheduled_at + self.payoff_delay),
        }
    }
}

/// Repository backed by pre-run registrations, standing in for a live data feed.
///
/// Races, payoffs and publish times must all be registered before the engine run starts;
/// the repository is read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct LiveDataRepository {
    races: FnvHashMap<RaceId, Race>,
    payoffs: FnvHashMap<RaceId, Vec<Payoff>>,
    publish_times: FnvHashMap<(RaceId, DataKind), DateTime<Utc>>,
}

impl LiveDataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a race entry.
    pub fn register_race(&mut self, race: Race) {
        self.races.insert(race.race_id.clone(), race);
    }

    /// Append a payoff entry for later retrieval.
    pub fn register_payoff(&mut self, payoff: Payoff) {
        self.payoffs
            .entry(payoff.race_id.clone())
            .or_default()
            .push(payoff);
    }

    /// Record when a kind of data becomes visible for a race.
    pub fn register_publish_time(
        &mut self,
        race_id: RaceId,
        kind: DataKind,
        available_at: DateTime<Utc>,
    ) {
        self.publish_times.insert((race_id, kind), available_at);
    }
}

impl DataRepository for LiveDataRepository {
    fn race(&self, race_id: &RaceId) -> Option<Race> {
        self.races.get(race_id).cloned()
    }

    fn races(&self) -> Vec<Race> {
        self.races.values().cloned().collect()
    }

    fn payoffs(&self, race_id: &RaceId) -> Vec<Payoff> {
        self.payoffs.get(race_id).cloned().unwrap_or_default()
    }

    fn historical(&self, _: &HorseId) -> HistoricalStats {
        // Live feeds carry no history; strategies receive zeroed stats.
        HistoricalStats::default()
    }

    fn publish_time(&self, race_id: &RaceId, kind: DataKind) -> Option<DateTime<Utc>> {
        self.publish_times.get(&(race_id.clone(), kind)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::HorseEntry;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::<Utc>::from_str(raw).unwrap()
    }

    fn horse(race_id: &str, horse_id: &str, win_odds: rust_decimal::Decimal) -> HorseEntry {
        let mut odds = FnvHashMap::default();
        odds.insert(BetType::Win, win_odds);
        HorseEntry::new(
            RaceId::new(race_id),
            HorseId::new(horse_id),
            horse_id.into(),
            "J".into(),
            "T".into(),
            1,
            odds,
        )
    }

    fn race(race_id: &str, scheduled_at: &str, horses: &[&str]) -> Race {
        Race::new(
            RaceId::new(race_id),
            utc(scheduled_at),
            "Tokyo".into(),
            1600,
            "turf".into(),
            "fine".into(),
            horses
                .iter()
                .map(|id| horse(race_id, id, dec!(2.0)))
                .collect(),
        )
    }

    #[test]
    fn test_publish_times_follow_schedule() {
        let repository = SimulationDataRepository::new(
            vec![race("R1", "2024-04-01T00:00:00Z", &["H1"])],
            vec![],
        )
        .with_payoff_delay(TimeDelta::minutes(45));

        let race_id = RaceId::new("R1");
        assert_eq!(
            repository.publish_time(&race_id, DataKind::Race),
            Some(utc("2024-04-01T00:00:00Z"))
        );
        assert_eq!(
            repository.publish_time(&race_id, DataKind::Payoff),
            Some(utc("2024-04-01T00:45:00Z"))
        );
        assert_eq!(
            repository.publish_time(&RaceId::new("R9"), DataKind::Race),
            None
        );
    }

    #[test]
    fn test_historical_counts_starts_and_wins() {
        let repository = SimulationDataRepository::new(
            vec![
                race("R1", "2024-04-01T00:00:00Z", &["H1", "H2"]),
                race("R2", "2024-04-02T00:00:00Z", &["H1"]),
            ],
            vec![
                Payoff::new(
                    RaceId::new("R1"),
                    BetType::Win,
                    vec![HorseId::new("H1")],
                    dec!(1.5),
                    dec!(150),
                ),
                Payoff::new(
                    RaceId::new("R2"),
                    BetType::Quinella,
                    vec![HorseId::new("H1"), HorseId::new("H3")],
                    dec!(5.0),
                    dec!(500),
                ),
            ],
        );

        let stats = repository.historical(&HorseId::new("H1"));
        assert_eq!(stats.starts, 2);
        // Only win payoffs count as wins
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.win_rate, 0.5);

        assert_eq!(
            repository.historical(&HorseId::new("H9")),
            HistoricalStats::default()
        );
    }
}
