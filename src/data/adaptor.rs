use crate::data::{
    model::{Payoff, Race},
    record::{build_payoffs, build_races, HorseRecord, PayoffRecord, RaceRecord},
    DataError,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Seam for loading validated racing data from an external source.
///
/// The CSV implementation ships with the crate; workbook and relational sources plug in
/// behind the same two methods.
pub trait DataAdaptor {
    /// Load and validate all races with their runners attached.
    fn load_races(&self) -> Result<Vec<Race>, DataError>;

    /// Load and validate all payoff records.
    fn load_payoffs(&self) -> Result<Vec<Payoff>, DataError>;
}

/// Load racing data from a directory of CSV files.
///
/// Expects `races.csv`, `horses.csv` and `payoffs.csv` beneath the base path by default.
/// Horse `odds` cells hold a JSON object keyed by bet type; payoff `combination` cells are
/// hyphen-joined runner ids.
#[derive(Debug, Clone)]
pub struct CsvAdaptor {
    base_path: PathBuf,
    races_file: String,
    horses_file: String,
    payoffs_file: String,
}

impl CsvAdaptor {
    pub fn new<P>(base_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            base_path: base_path.into(),
            races_file: "races.csv".to_string(),
            horses_file: "horses.csv".to_string(),
            payoffs_file: "payoffs.csv".to_string(),
        }
    }

    /// Override the default file names within the base directory.
    pub fn with_files<S>(mut self, races: S, horses: S, payoffs: S) -> Self
    where
        S: Into<String>,
    {
        self.races_file = races.into();
        self.horses_file = horses.into();
        self.payoffs_file = payoffs.into();
        self
    }

    fn read_rows<Record>(&self, file: &str) -> Result<Vec<Record>, DataError>
    where
        Record: DeserializeOwned,
    {
        let path = self.base_path.join(file);
        if !path.exists() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("csv file not found: {}", path.display()),
            )));
        }
        read_csv_rows(&path)
    }
}

impl DataAdaptor for CsvAdaptor {
    fn load_races(&self) -> Result<Vec<Race>, DataError> {
        let races: Vec<RaceRecord> = self.read_rows(&self.races_file)?;
        let horses: Vec<HorseRecord> = self.read_rows(&self.horses_file)?;
        build_races(races, horses)
    }

    fn load_payoffs(&self) -> Result<Vec<Payoff>, DataError> {
        let payoffs: Vec<PayoffRecord> = self.read_rows(&self.payoffs_file)?;
        build_payoffs(payoffs)
    }
}

fn read_csv_rows<Record>(path: &Path) -> Result<Vec<Record>, DataError>
where
    Record: DeserializeOwned,
{
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}
