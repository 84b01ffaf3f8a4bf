//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::active_bond_filter::ActiveBondFilter;
use crate::adapters::csv_journal::CsvJournal;
use crate::adapters::csv_source::CsvSource;
use crate::adapters::feed_cache::FeedCache;
use crate::adapters::fetcher::CachedFetcher;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_execution::PaperExecution;
use crate::domain::config_validation::{
    default_treat_as_empty, parse_treat_as_empty, validate_run_config,
};
use crate::domain::cycle::{CycleReport, run_cycle};
use crate::domain::error::CbrotorError;
use crate::domain::factor::{FactorConfig, select};
use crate::domain::feed::Feed;
use crate::domain::rebalance::{plan, RebalanceAction};
use crate::ports::config_port::ConfigPort;
use crate::ports::eligibility_port::EligibilityPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::fetch_port::FetchPort;

#[derive(Parser, Debug)]
#[command(name = "cbrotor", about = "Convertible bond rotation rebalancer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one rebalance cycle for a trading date
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: NaiveDate,
        #[arg(long)]
        dry_run: bool,
    },
    /// Fetch and cache all feeds for a trading date
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Rebalance {
            config,
            date,
            dry_run,
        } => {
            if dry_run {
                run_plan(&config, date)
            } else {
                run_rebalance(&config, date)
            }
        }
        Command::Fetch { config, date } => run_fetch(&config, date),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CbrotorError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn run_rebalance(config_path: &PathBuf, date: NaiveDate) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate run config
    if let Err(e) = validate_run_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 3: Assemble the collaborators
    let factors = match build_factor_config(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let fetcher = match build_fetcher(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let filter = ActiveBondFilter::new(maturity_window(&adapter));
    let mut execution = match build_execution(&adapter) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let journal_path = match require_path(&adapter, "journal", "path") {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let mut journal = match CsvJournal::new(&journal_path) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Run the cycle
    eprintln!(
        "Rebalancing to top {} of the universe by {} factors on {}",
        factors.top,
        factors.weights.len(),
        date
    );
    let report = match run_cycle(date, &factors, &fetcher, &filter, &mut execution, &mut journal) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Print console summary to stderr
    eprintln!("\n=== Rebalance Summary ===");
    eprintln!("Date:             {}", report.date);
    eprintln!("Universe:         {}", report.universe_size);
    eprintln!("Eligible:         {}", report.eligible_size);
    eprintln!("Selected:         {}", report.candidates.len());
    eprintln!("Instructions:     {}", report.instructions.len());
    eprintln!("Orders filled:    {}", report.fills.len() - report.unfilled);
    eprintln!("Orders unfilled:  {}", report.unfilled);
    print_portfolio(&report);

    eprintln!("\nOrders journaled to: {}", journal_path.display());
    ExitCode::SUCCESS
}

fn print_portfolio(report: &CycleReport) {
    if report.candidates.is_empty() {
        return;
    }
    eprintln!("\n=== Selected Portfolio ===");
    for candidate in &report.candidates {
        eprintln!(
            "  {}:  score {:.4}",
            candidate.order_book_id, candidate.score
        );
    }
}

pub fn build_factor_config(adapter: &dyn ConfigPort) -> Result<FactorConfig, CbrotorError> {
    let mut weights = BTreeMap::new();
    for name in adapter.keys("factors") {
        let weight = adapter.get_double("factors", &name, f64::NAN);
        if !weight.is_finite() {
            return Err(CbrotorError::ConfigInvalid {
                section: "factors".into(),
                key: name,
                reason: "weight must be a finite number".into(),
            });
        }
        weights.insert(name, weight);
    }
    if weights.is_empty() {
        return Err(CbrotorError::ConfigInvalid {
            section: "factors".into(),
            key: "*".into(),
            reason: "at least one factor weight is required".into(),
        });
    }

    let top = adapter.get_int("rebalance", "top", 0);
    if top < 1 {
        return Err(CbrotorError::ConfigInvalid {
            section: "rebalance".into(),
            key: "top".into(),
            reason: "top must be at least 1".into(),
        });
    }

    Ok(FactorConfig {
        weights,
        top: top as usize,
    })
}

pub fn build_treat_as_empty(adapter: &dyn ConfigPort) -> Result<HashSet<Feed>, CbrotorError> {
    match adapter
        .get_string("rebalance", "treat_as_empty")
        .filter(|s| !s.trim().is_empty())
    {
        Some(value) => parse_treat_as_empty(&value),
        None => Ok(default_treat_as_empty()),
    }
}

pub fn build_fetcher(adapter: &dyn ConfigPort) -> Result<CachedFetcher, CbrotorError> {
    let cache_dir = require_path(adapter, "rebalance", "cache_dir")?;
    let data_dir = require_path(adapter, "source", "data_dir")?;
    let treat_as_empty = build_treat_as_empty(adapter)?;
    Ok(CachedFetcher::new(
        FeedCache::new(cache_dir),
        Box::new(CsvSource::new(data_dir)),
        treat_as_empty,
    ))
}

pub fn build_execution(adapter: &dyn ConfigPort) -> Result<PaperExecution, CbrotorError> {
    let capital = adapter.get_double("execution", "capital", 1_000_000.0);
    if !capital.is_finite() || capital <= 0.0 {
        return Err(CbrotorError::ConfigInvalid {
            section: "execution".into(),
            key: "capital".into(),
            reason: "capital must be positive".into(),
        });
    }
    match adapter
        .get_string("execution", "state_path")
        .filter(|s| !s.trim().is_empty())
    {
        Some(path) => PaperExecution::with_state_file(capital, PathBuf::from(path)),
        None => Ok(PaperExecution::new(capital)),
    }
}

fn require_path(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<PathBuf, CbrotorError> {
    adapter
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| CbrotorError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn maturity_window(adapter: &dyn ConfigPort) -> i64 {
    adapter.get_int("eligibility", "min_days_to_maturity", 30)
}

/// Plan the cycle without placing orders or touching the journal. The fetch
/// still runs against the cache and source, so the printed plan reflects the
/// data a real run would see.
pub fn run_plan(config_path: &PathBuf, date: NaiveDate) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_run_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    eprintln!("Config validated successfully");

    let factors = match build_factor_config(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let fetcher = match build_fetcher(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let filter = ActiveBondFilter::new(maturity_window(&adapter));
    let execution = match build_execution(&adapter) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let metrics = match fetcher.fetch(date) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let eligible = match filter.filter(date, &metrics) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let candidates = select(&eligible, &factors);
    let holdings = match execution.holdings() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let instructions = plan(&holdings, &candidates, factors.top);

    eprintln!("\nUniverse:");
    eprintln!("  instruments: {}", metrics.len());
    eprintln!("  eligible:    {}", eligible.len());
    eprintln!("  selected:    {}", candidates.len());
    eprintln!("  held:        {}", holdings.len());

    eprintln!("\nPlanned instructions ({}):", instructions.len());
    for instruction in &instructions {
        eprintln!(
            "  {:<6}  {}  target {:.4}",
            action_label(instruction.action),
            instruction.order_book_id,
            instruction.target_weight
        );
    }

    eprintln!("\nDry run complete: no orders were placed");
    ExitCode::SUCCESS
}

fn action_label(action: RebalanceAction) -> &'static str {
    match action {
        RebalanceAction::Close => "close",
        RebalanceAction::Resize => "resize",
        RebalanceAction::Open => "open",
    }
}

pub fn run_fetch(config_path: &PathBuf, date: NaiveDate) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let fetcher = match build_fetcher(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Fetching feeds for {date}");
    let metrics = match fetcher.fetch(date) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let rows = metrics.rows();
    eprintln!("\n=== Feed Coverage ===");
    eprintln!("Instruments:      {}", metrics.len());
    eprintln!(
        "With bond bar:    {}",
        rows.iter().filter(|r| r.bond_price.is_some()).count()
    );
    eprintln!(
        "With stock bar:   {}",
        rows.iter().filter(|r| r.stock_price.is_some()).count()
    );
    eprintln!(
        "With conversion:  {}",
        rows.iter().filter(|r| r.conversion_price.is_some()).count()
    );
    eprintln!(
        "With indicators:  {}",
        rows.iter().filter(|r| !r.indicators.is_empty()).count()
    );
    eprintln!(
        "Call announced:   {}",
        rows.iter().filter(|r| r.call_info_date.is_some()).count()
    );
    eprintln!(
        "Suspended:        {}",
        rows.iter().filter(|r| r.suspended == Some(true)).count()
    );
    ExitCode::SUCCESS
}

pub fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match validate_run_config(&adapter) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    let factors = match build_factor_config(&adapter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let treat_as_empty = match build_treat_as_empty(&adapter) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nFactors:");
    for (name, weight) in &factors.weights {
        eprintln!("  {}: weight {}", name, weight);
    }

    eprintln!("\nTarget positions: {}", factors.top);
    eprintln!("Maturity window:  {} days", maturity_window(&adapter));

    if !treat_as_empty.is_empty() {
        let mut names: Vec<&str> = treat_as_empty.iter().map(Feed::name).collect();
        names.sort_unstable();
        eprintln!("Treated as empty: {}", names.join(", "));
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
