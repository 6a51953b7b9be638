//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::validate_config;
use crate::domain::error::ScreenError;
use crate::domain::fanout::CancelToken;
use crate::domain::filter::{self, FilterCriteria, RankCombine, SortMetric};
use crate::domain::fund::{FundRecord, ReturnWindow};
use crate::domain::fund_check::{FundCheckCriteria, FundCheckReport};
use crate::domain::holdings_check::{EngineConfig, HoldingOutcome, HoldingsCheckResult};
use crate::domain::screener::FundScreener;
use crate::domain::similarity::SimilarityReport;
use crate::domain::stock_quality::{CheckerOptions, RubricStockChecker};
use crate::domain::universe::{UniverseStore, parse_codes};
use crate::logging::{self, DEFAULT_FORMAT, DEFAULT_LEVEL};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "fundscreen", about = "Mutual fund screener")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter the fund universe with the configured criteria
    Filter {
        #[arg(short, long)]
        config: PathBuf,
        /// Keep only funds of this category
        #[arg(long = "type")]
        fund_type: Option<String>,
        /// Sort metric id (1-13)
        #[arg(long)]
        sort: Option<u8>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List the fund categories present in the universe
    Types {
        #[arg(short, long)]
        config: PathBuf,
        /// Only list categories of funds passing the configured filter
        #[arg(long)]
        filtered: bool,
        #[arg(long)]
        json: bool,
    },
    /// Check one fund against the fund-check criteria
    Check {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// Also run the stock rubric over the fund's top holdings
        #[arg(long)]
        check_stocks: bool,
        #[arg(long)]
        json: bool,
    },
    /// Holdings similarity between two or more funds
    Similarity {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated fund codes
        #[arg(long)]
        codes: String,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Filter {
            config,
            fund_type,
            sort,
            limit,
            json,
        } => run_filter(&config, fund_type.as_deref(), sort, limit, json),
        Command::Types {
            config,
            filtered,
            json,
        } => run_types(&config, filtered, json),
        Command::Check {
            config,
            code,
            check_stocks,
            json,
        } => run_check(&config, &code, check_stocks, json),
        Command::Similarity {
            config,
            codes,
            json,
        } => run_similarity(&config, &codes, json),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScreenError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

/// `[data] dir`, resolved against the config file's directory when relative.
pub fn resolve_data_dir(config_path: &Path, adapter: &dyn ConfigPort) -> Result<PathBuf, ScreenError> {
    let dir = adapter
        .get_string("data", "dir")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ScreenError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    let dir = PathBuf::from(dir);
    if dir.is_absolute() {
        return Ok(dir);
    }
    Ok(config_path
        .parent()
        .map(|p| p.join(&dir))
        .unwrap_or(dir))
}

pub fn build_filter_criteria(adapter: &dyn ConfigPort) -> Result<FilterCriteria, ScreenError> {
    let rec = FilterCriteria::recommended();
    let this_year_235_mode = match adapter.get_string("filter", "this_year_235_mode") {
        Some(mode) => mode
            .parse::<RankCombine>()
            .map_err(|reason| ScreenError::ConfigInvalid {
                section: "filter".into(),
                key: "this_year_235_mode".into(),
                reason,
            })?,
        None => rec.this_year_235_mode,
    };

    Ok(FilterCriteria {
        min_scale: adapter.get_double("filter", "min_scale", rec.min_scale),
        max_scale: adapter.get_double("filter", "max_scale", rec.max_scale),
        min_estab_years: adapter.get_double("filter", "min_estab_years", rec.min_estab_years),
        min_manager_years: adapter.get_double(
            "filter",
            "min_manager_years",
            rec.min_manager_years,
        ),
        year1_rank_ratio: adapter.get_double("filter", "year1_rank_ratio", rec.year1_rank_ratio),
        this_year_235_rank_ratio: adapter.get_double(
            "filter",
            "this_year_235_rank_ratio",
            rec.this_year_235_rank_ratio,
        ),
        this_year_235_mode,
        month6_rank_ratio: adapter.get_double(
            "filter",
            "month6_rank_ratio",
            rec.month6_rank_ratio,
        ),
        month3_rank_ratio: adapter.get_double(
            "filter",
            "month3_rank_ratio",
            rec.month3_rank_ratio,
        ),
    })
}

pub fn build_fund_check_criteria(
    adapter: &dyn ConfigPort,
) -> Result<FundCheckCriteria, ScreenError> {
    let rec = FundCheckCriteria::recommended();
    Ok(FundCheckCriteria {
        filter: build_filter_criteria(adapter)?,
        max_135_avg_stddev: adapter.get_double(
            "fund_check",
            "max_135_avg_stddev",
            rec.max_135_avg_stddev,
        ),
        min_135_avg_sharpe: adapter.get_double(
            "fund_check",
            "min_135_avg_sharpe",
            rec.min_135_avg_sharpe,
        ),
        max_135_avg_drawdown: adapter.get_double(
            "fund_check",
            "max_135_avg_drawdown",
            rec.max_135_avg_drawdown,
        ),
    })
}

pub fn build_checker_options(adapter: &dyn ConfigPort) -> CheckerOptions {
    let d = CheckerOptions::default();
    CheckerOptions {
        min_roe: adapter.get_double("checker", "min_roe", d.min_roe),
        max_debt_asset_ratio: adapter.get_double(
            "checker",
            "max_debt_asset_ratio",
            d.max_debt_asset_ratio,
        ),
        min_total_market_cap: adapter.get_double(
            "checker",
            "min_total_market_cap",
            d.min_total_market_cap,
        ),
        max_pe_ttm: adapter.get_double("checker", "max_pe_ttm", d.max_pe_ttm),
        max_peg: adapter.get_double("checker", "max_peg", d.max_peg),
        min_revenue_growth: adapter.get_double(
            "checker",
            "min_revenue_growth",
            d.min_revenue_growth,
        ),
        min_net_profit_growth: adapter.get_double(
            "checker",
            "min_net_profit_growth",
            d.min_net_profit_growth,
        ),
        min_gross_margin: adapter.get_double("checker", "min_gross_margin", d.min_gross_margin),
    }
}

pub fn build_engine_config(adapter: &dyn ConfigPort) -> EngineConfig {
    let d = EngineConfig::default();
    EngineConfig {
        max_concurrency: adapter
            .get_usize("engine", "max_concurrency", d.max_concurrency)
            .max(1),
        max_holdings: adapter
            .get_usize("engine", "max_holdings", d.max_holdings)
            .max(1),
        failure_tolerance: adapter
            .get_double("engine", "failure_tolerance", d.failure_tolerance)
            .clamp(0.0, 1.0),
    }
}

/// Loads and validates the config, starts logging and wires the screener to
/// the CSV data directory.
pub fn build_screener(config_path: &Path) -> Result<(FileConfigAdapter, FundScreener), ScreenError> {
    let adapter = load_config(config_path)?;

    let level = adapter
        .get_string("log", "level")
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let format = adapter
        .get_string("log", "format")
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
    logging::init_logging(&level, &format);

    let data_dir = resolve_data_dir(config_path, &adapter)?;
    info!(config = %config_path.display(), data = %data_dir.display(), "config loaded");

    let data = Arc::new(CsvAdapter::new(data_dir));
    let checker = Arc::new(RubricStockChecker::new(data.clone()));
    let screener = FundScreener::new(
        Arc::new(UniverseStore::default()),
        data,
        checker,
        build_engine_config(&adapter),
    );
    Ok((adapter, screener))
}

/// Runs `work` on a fresh runtime with Ctrl-C wired to its cancel token.
fn block_on_cancellable<T, F, Fut>(work: F) -> Result<T, ScreenError>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: Future<Output = Result<T, ScreenError>>,
{
    block_on_with(CancelToken::new(), work)
}

/// Runs `work` on a fresh runtime with Ctrl-C wired to `cancel`.
///
/// On `Cancelled` the runtime is shut down without waiting for blocking
/// calls still in flight; their results are discarded.
fn block_on_with<T, F, Fut>(cancel: CancelToken, work: F) -> Result<T, ScreenError>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: Future<Output = Result<T, ScreenError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                watcher.cancel();
            }
        });
        work(cancel).await
    });

    if matches!(result, Err(ScreenError::Cancelled)) {
        runtime.shutdown_background();
    }
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ScreenError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| ScreenError::TaskFailed {
        reason: format!("failed to serialise output: {e}"),
    })?;
    println!("{out}");
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[derive(Serialize)]
struct FilterOutput<'a> {
    sort: Option<SortMetric>,
    total_count: usize,
    universe_count: usize,
    funds: &'a [FundRecord],
}

pub fn run_filter(
    config_path: &Path,
    fund_type: Option<&str>,
    sort: Option<u8>,
    limit: Option<usize>,
    json: bool,
) -> Result<(), ScreenError> {
    let metric = sort
        .map(SortMetric::try_from)
        .transpose()
        .map_err(|reason| ScreenError::InvalidInput { reason })?;

    let (adapter, screener) = build_screener(config_path)?;
    let criteria = build_filter_criteria(&adapter)?;
    screener.refresh()?;

    let result = screener.filter(&criteria);
    let mut funds = match fund_type {
        Some(tag) => filter::filter_by_type(&result.funds, tag),
        None => result.funds,
    };
    if let Some(metric) = metric {
        filter::sort(&mut funds, metric);
    }
    let total_count = funds.len();
    if let Some(limit) = limit {
        funds.truncate(limit);
    }

    if json {
        return print_json(&FilterOutput {
            sort: metric,
            total_count,
            universe_count: result.universe_count,
            funds: &funds,
        });
    }

    println!(
        "{:<8} {:<28} {:<10} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "code", "name", "type", "scale", "1y", "thisYear", "6m", "3m"
    );
    for f in &funds {
        println!(
            "{:<8} {:<28} {:<10} {:>8.2} {:>8} {:>8} {:>8} {:>8}",
            f.code,
            f.name,
            f.fund_type,
            f.scale,
            fmt_opt(f.return_for(ReturnWindow::Year1)),
            fmt_opt(f.return_for(ReturnWindow::ThisYear)),
            fmt_opt(f.return_for(ReturnWindow::Month6)),
            fmt_opt(f.return_for(ReturnWindow::Month3)),
        );
    }
    println!(
        "\n{} of {} funds passed ({} shown)",
        total_count,
        result.universe_count,
        funds.len()
    );
    Ok(())
}

pub fn run_types(config_path: &Path, filtered: bool, json: bool) -> Result<(), ScreenError> {
    let (adapter, screener) = build_screener(config_path)?;
    let universe = screener.refresh()?;
    let types = if filtered {
        universe.filter(&build_filter_criteria(&adapter)?).fund_types()
    } else {
        universe.fund_types()
    };
    if json {
        return print_json(&types);
    }
    for t in &types {
        println!("{t}");
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckOutput {
    fund: FundCheckReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    stocks: Option<HoldingsCheckResult>,
}

pub fn run_check(
    config_path: &Path,
    code: &str,
    check_stocks: bool,
    json: bool,
) -> Result<(), ScreenError> {
    let (adapter, screener) = build_screener(config_path)?;
    let criteria = build_fund_check_criteria(&adapter)?;
    let options = build_checker_options(&adapter);
    screener.refresh()?;

    let output = block_on_cancellable(|cancel| async move {
        let fund = screener.check_fund(code, &criteria, &cancel).await?;
        let stocks = if check_stocks {
            Some(screener.check_fund_stocks(code, &options, &cancel).await?)
        } else {
            None
        };
        Ok::<_, ScreenError>(CheckOutput { fund, stocks })
    })?;

    if json {
        return print_json(&output);
    }

    let report = &output.fund;
    println!(
        "{} {}: {}",
        report.fund.code,
        report.fund.name,
        if report.passed { "PASS" } else { "FAIL" }
    );
    for failure in &report.failures {
        println!("  - {failure}");
    }

    if let Some(stocks) = &output.stocks {
        println!("\nTop holdings ({:?}):", stocks.verdict);
        for h in &stocks.holdings {
            let status = match &h.outcome {
                HoldingOutcome::Checked(v) if v.passed => format!("pass ({:.0})", v.score),
                HoldingOutcome::Checked(v) => {
                    format!("fail ({:.0}): {}", v.score, v.failures.join(", "))
                }
                HoldingOutcome::Unknown(f) => format!("unknown ({}): {}", f.kind, f.reason),
            };
            println!(
                "  {:<8} {:<16} {:>6.2}%  {}",
                h.stock_code, h.stock_name, h.weight_percent, status
            );
        }
        println!(
            "  passed {}, failed {}, unknown {}",
            stocks.passed_count, stocks.failed_count, stocks.unknown_count
        );
        if let Some(kind) = stocks.failure_kind() {
            eprintln!("warning: {kind}: some holdings could not be checked");
        }
    }
    Ok(())
}

pub fn run_similarity(config_path: &Path, codes: &str, json: bool) -> Result<(), ScreenError> {
    let (_adapter, screener) = build_screener(config_path)?;
    let codes = parse_codes(codes);

    let report: SimilarityReport = block_on_cancellable(|cancel| async move {
        screener.fund_stocks_similarity(&codes, &cancel).await
    })?;

    if json {
        return print_json(&report);
    }

    print!("{:<8}", "");
    for c in &report.codes {
        print!(" {c:>8}");
    }
    println!();
    for (code, row) in report.codes.iter().zip(&report.matrix) {
        print!("{code:<8}");
        for cell in row {
            print!(" {:>8}", fmt_opt(*cell));
        }
        println!();
    }

    for pair in &report.pairs {
        println!("\n{} / {}: {:.4}", pair.left, pair.right, pair.score);
        for s in pair.shared.iter().take(5) {
            println!(
                "  {:<8} {:<16} {:>6.2}% / {:>6.2}%",
                s.stock_code, s.stock_name, s.left_weight, s.right_weight
            );
        }
    }

    for ex in &report.excluded {
        eprintln!("warning: {} excluded ({}): {}", ex.code, ex.failure.kind, ex.failure.reason);
    }
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), ScreenError> {
    let adapter = load_config(config_path)?;
    build_fund_check_criteria(&adapter)?;
    let data_dir = resolve_data_dir(config_path, &adapter)?;
    if !data_dir.is_dir() {
        return Err(ScreenError::ConfigInvalid {
            section: "data".into(),
            key: "dir".into(),
            reason: format!("{} is not a directory", data_dir.display()),
        });
    }
    eprintln!("Config validated successfully");
    Ok(())
}
