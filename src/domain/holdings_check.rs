//! Quality check of a fund's top stock holdings.

use super::error::{ErrorKind, ItemFailure, ScreenError};
use super::fanout::{CancelToken, fan_out};
use super::fund::{FundRecord, StockHolding, sort_by_weight};
use super::stock_quality::{CheckerOptions, StockVerdict};
use crate::ports::data_port::FundDataPort;
use crate::ports::stock_check_port::StockCheckPort;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunables for the fan-out operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineConfig {
    /// Maximum collaborator calls in flight per batch.
    pub max_concurrency: usize,
    /// Holdings checked per fund, largest weight first.
    pub max_holdings: usize,
    /// Fraction of checked holdings allowed to fail while the fund passes.
    pub failure_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_holdings: 10,
            failure_tolerance: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HoldingOutcome {
    Checked(StockVerdict),
    /// The check could not be performed; excluded from the tally.
    Unknown(ItemFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingCheck {
    pub stock_code: String,
    pub stock_name: String,
    pub weight_percent: f64,
    pub outcome: HoldingOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateVerdict {
    Pass,
    Fail,
    /// No holding could be checked.
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingsCheckResult {
    pub fund_code: String,
    pub holdings: Vec<HoldingCheck>,
    pub passed_count: usize,
    pub failed_count: usize,
    pub unknown_count: usize,
    pub verdict: AggregateVerdict,
}

impl HoldingsCheckResult {
    pub fn passed(&self) -> bool {
        self.verdict == AggregateVerdict::Pass
    }

    /// True when some holdings could not be checked.
    pub fn is_partial(&self) -> bool {
        self.unknown_count > 0
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.is_partial().then_some(ErrorKind::PartialFailure)
    }
}

pub fn aggregate_verdict(passed: usize, failed: usize, tolerance: f64) -> AggregateVerdict {
    let checked = passed + failed;
    if checked == 0 {
        return AggregateVerdict::Inconclusive;
    }
    if failed as f64 / checked as f64 <= tolerance {
        AggregateVerdict::Pass
    } else {
        AggregateVerdict::Fail
    }
}

pub struct HoldingsChecker {
    data: Arc<dyn FundDataPort>,
    stock_checker: Arc<dyn StockCheckPort>,
    options: CheckerOptions,
    engine: EngineConfig,
}

impl HoldingsChecker {
    pub fn new(
        data: Arc<dyn FundDataPort>,
        stock_checker: Arc<dyn StockCheckPort>,
        options: CheckerOptions,
        engine: EngineConfig,
    ) -> Self {
        Self {
            data,
            stock_checker,
            options,
            engine,
        }
    }

    /// Looks the fund up through the data provider, then checks its holdings.
    pub async fn check_fund_stocks_by_code(
        &self,
        code: &str,
        cancel: &CancelToken,
    ) -> Result<HoldingsCheckResult, ScreenError> {
        let data = Arc::clone(&self.data);
        let lookup = code.to_string();
        let mut found = fan_out(vec![lookup], 1, cancel, move |c: String| {
            data.fetch_fund_info(&c)
        })
        .await?;
        let fund = found.pop().ok_or_else(|| ScreenError::fund_not_found(code))??;
        self.check_fund_stocks(&fund, cancel).await
    }

    /// Checks up to `max_holdings` of the fund's top holdings concurrently.
    ///
    /// Holdings are fetched first when the record carries none. Per-holding
    /// errors are reported as `Unknown` and do not abort the others.
    pub async fn check_fund_stocks(
        &self,
        fund: &FundRecord,
        cancel: &CancelToken,
    ) -> Result<HoldingsCheckResult, ScreenError> {
        let holdings = if fund.top_holdings.is_empty() {
            self.fetch_holdings(&fund.code, cancel).await?
        } else {
            let mut holdings = fund.top_holdings.clone();
            sort_by_weight(&mut holdings);
            holdings
        };
        if holdings.is_empty() {
            return Err(ScreenError::InsufficientData {
                reason: format!("fund {} has no stock holdings", fund.code),
            });
        }

        let selected: Vec<StockHolding> = holdings
            .into_iter()
            .take(self.engine.max_holdings.max(1))
            .collect();
        debug!(fund = %fund.code, holdings = selected.len(), "checking fund holdings");

        let checker = Arc::clone(&self.stock_checker);
        let options = self.options;
        let verdicts = fan_out(
            selected.clone(),
            self.engine.max_concurrency,
            cancel,
            move |h: StockHolding| checker.check_stock(&h.stock_code, &options),
        )
        .await?;

        let mut passed_count = 0;
        let mut failed_count = 0;
        let mut unknown_count = 0;
        let checks: Vec<HoldingCheck> = selected
            .into_iter()
            .zip(verdicts)
            .map(|(holding, verdict)| {
                let outcome = match verdict {
                    Ok(v) => {
                        if v.passed {
                            passed_count += 1;
                        } else {
                            failed_count += 1;
                        }
                        HoldingOutcome::Checked(v)
                    }
                    Err(e) => {
                        warn!(fund = %fund.code, stock = %holding.stock_code, error = %e, "stock check failed");
                        unknown_count += 1;
                        HoldingOutcome::Unknown(ItemFailure::from(&e))
                    }
                };
                HoldingCheck {
                    stock_code: holding.stock_code,
                    stock_name: holding.stock_name,
                    weight_percent: holding.weight_percent,
                    outcome,
                }
            })
            .collect();

        let verdict = aggregate_verdict(passed_count, failed_count, self.engine.failure_tolerance);
        info!(
            fund = %fund.code,
            passed = passed_count,
            failed = failed_count,
            unknown = unknown_count,
            ?verdict,
            "holdings check complete"
        );

        Ok(HoldingsCheckResult {
            fund_code: fund.code.clone(),
            holdings: checks,
            passed_count,
            failed_count,
            unknown_count,
            verdict,
        })
    }

    async fn fetch_holdings(
        &self,
        code: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<StockHolding>, ScreenError> {
        let data = Arc::clone(&self.data);
        let mut fetched = fan_out(vec![code.to_string()], 1, cancel, move |c: String| {
            data.fetch_fund_holdings(&c)
        })
        .await?;
        let mut holdings = fetched
            .pop()
            .ok_or_else(|| ScreenError::fund_not_found(code))??;
        sort_by_weight(&mut holdings);
        Ok(holdings)
    }
}
