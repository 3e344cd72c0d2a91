use crate::{
    config::ConfigError, data::DataError, engine::schedule::ScheduleError, engine::EngineError,
};
use thiserror::Error;

/// All errors generated by the crate, aggregated for coarse-grained callers such as the
/// command line interface.
#[derive(Debug, Error)]
pub enum BakenError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}
