use baken::{
    clock::Clock,
    config::{AppConfig, ConfigError, DataSource},
    data::{
        adaptor::{CsvAdaptor, DataAdaptor},
        repository::{LiveDataRepository, SimulationDataRepository},
        DataRepository,
    },
    engine::Engine,
    error::BakenError,
    execution::{
        live::LiveBettingRepository, simulated::SimulationBettingRepository, BettingRepository,
    },
    history,
    portfolio::Portfolio,
    statistic::KpiSummary,
    strategy::{naive_favorite::NaiveFavorite, value_betting::ValueBetting, Strategy},
};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "baken", about = "Horse-racing betting strategy backtester")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a strategy over a racing dataset.
    Run(RunArgs),
    /// Generate analytics for a saved bet history.
    Report(ReportArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Strategy name: naive_favorite or value_betting.
    #[arg(long, default_value = "naive_favorite")]
    strategy: String,

    /// Data source kind: csv, excel or db. Defaults to the configured source.
    #[arg(long)]
    data_source: Option<String>,

    /// Path to the data source (a directory of CSV files).
    #[arg(long)]
    data: PathBuf,

    /// Override the configured bankroll.
    #[arg(long)]
    bankroll: Option<Decimal>,

    /// Optional YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run against the live repositories instead of the simulation pair.
    #[arg(long)]
    live: bool,

    /// Path to save the bet history CSV.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// CSV bet history produced by `run --output`.
    #[arg(long)]
    bets: PathBuf,
}

fn main() {
    baken::logging::init_logging();
    if let Err(error) = try_main() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), BakenError> {
    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Report(args) => report(args),
    }
}

fn run(args: RunArgs) -> Result<(), BakenError> {
    let config = match &args.config {
        Some(path) => AppConfig::from_yaml(path)?,
        None => AppConfig::default(),
    };
    let bankroll = config.ensure_bankroll(args.bankroll)?;
    let portfolio = Portfolio::new(bankroll);

    let data_source = resolve_data_source(args.data_source.as_deref(), &config)?;
    let adaptor = match data_source {
        DataSource::Csv => CsvAdaptor::new(csv_base_path(&args.data)),
        other => {
            return Err(
                ConfigError::UnsupportedDataSource(format!("{other:?}").to_lowercase()).into(),
            )
        }
    };

    if args.live {
        let mut repository = LiveDataRepository::new();
        for race in adaptor.load_races()? {
            repository.register_race(race);
        }
        for payoff in adaptor.load_payoffs()? {
            repository.register_payoff(payoff);
        }
        run_strategy(
            Arc::new(repository),
            LiveBettingRepository::new(portfolio),
            Clock::live(),
            &args.strategy,
            args.output,
        )
    } else {
        let data = Arc::new(
            SimulationDataRepository::from_adaptor(&adaptor)?
                .with_payoff_delay(config.payoff_delay()),
        );
        let betting = SimulationBettingRepository::new(portfolio, Arc::clone(&data));
        run_strategy(
            data,
            betting,
            Clock::simulated(),
            &args.strategy,
            args.output,
        )
    }
}

fn report(args: ReportArgs) -> Result<(), BakenError> {
    let positions = history::read_positions(&args.bets)?;
    KpiSummary::generate(&positions).print();
    Ok(())
}

fn resolve_data_source(
    requested: Option<&str>,
    config: &AppConfig,
) -> Result<DataSource, BakenError> {
    let Some(requested) = requested else {
        return Ok(config.data_source);
    };
    match requested.to_lowercase().as_str() {
        "csv" => Ok(DataSource::Csv),
        "excel" => Ok(DataSource::Excel),
        "db" => Ok(DataSource::Db),
        other => Err(ConfigError::UnsupportedDataSource(other.to_string()).into()),
    }
}

/// CSV datasets are directories; accept a file path and fall back to its parent.
fn csv_base_path(data: &Path) -> PathBuf {
    if data.is_dir() {
        data.to_path_buf()
    } else {
        data.parent().unwrap_or(data).to_path_buf()
    }
}

fn run_strategy<Data, Betting>(
    data: Arc<Data>,
    betting: Betting,
    clock: Clock,
    strategy: &str,
    output: Option<PathBuf>,
) -> Result<(), BakenError>
where
    Data: DataRepository,
    Betting: BettingRepository,
{
    match strategy.to_lowercase().as_str() {
        "naive_favorite" => execute(
            Engine::new(data, betting).with_clock(clock),
            NaiveFavorite::default(),
            output,
        ),
        "value_betting" => execute(
            Engine::new(data, betting).with_clock(clock),
            ValueBetting::default(),
            output,
        ),
        other => Err(ConfigError::UnknownStrategy(other.to_string()).into()),
    }
}

fn execute<Data, Betting, S>(
    mut engine: Engine<Data, Betting, S>,
    mut strategy: S,
    output: Option<PathBuf>,
) -> Result<(), BakenError>
where
    Data: DataRepository,
    Betting: BettingRepository,
    S: Strategy,
{
    engine.run(&mut strategy)?;

    let positions = engine.betting().positions();
    let summary = KpiSummary::generate(&positions);
    info!(
        bets = summary.total_bets,
        settled = summary.settled_bets,
        "run complete"
    );
    println!(
        "Bets: {}/{} | Win rate: {:.1}% | ROI: {:.2}",
        summary.settled_bets,
        summary.total_bets,
        summary.win_rate * 100.0,
        summary.roi
    );

    if let Some(path) = output {
        history::write_positions(&path, &positions)?;
        println!("Saved bet history to {}", path.display());
    }
    Ok(())
}
