//! Single-fund check: the filter predicates plus 1/3/5-year risk averages.

use super::filter::{FilterCriteria, PredicateFailure, evaluate};
use super::fund::FundRecord;
use super::rank::RankPercentileTable;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FundCheckCriteria {
    pub filter: FilterCriteria,
    /// Ceiling on the mean of the 1/3/5-year volatility.
    pub max_135_avg_stddev: f64,
    /// Floor on the mean of the 1/3/5-year Sharpe ratio.
    pub min_135_avg_sharpe: f64,
    /// Ceiling on the mean of the 1/3/5-year max drawdown.
    pub max_135_avg_drawdown: f64,
}

impl FundCheckCriteria {
    pub fn recommended() -> Self {
        Self {
            filter: FilterCriteria::recommended(),
            max_135_avg_stddev: 25.0,
            min_135_avg_sharpe: 1.0,
            max_135_avg_drawdown: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundCheckReport {
    pub fund: FundRecord,
    pub passed: bool,
    pub failures: Vec<PredicateFailure>,
}

/// Checks one fund against `criteria`, ranking it within `universe`.
///
/// The fund replaces its own entry in the ranking, or is appended when the
/// universe does not list it.
pub fn check_fund(
    universe: &[FundRecord],
    fund: &FundRecord,
    criteria: &FundCheckCriteria,
) -> FundCheckReport {
    let mut ranked: Vec<FundRecord> = universe
        .iter()
        .filter(|f| f.code != fund.code)
        .cloned()
        .collect();
    let position = universe
        .iter()
        .position(|f| f.code == fund.code)
        .unwrap_or(ranked.len());
    ranked.insert(position.min(ranked.len()), fund.clone());

    let ranks = RankPercentileTable::build(&ranked, &criteria.filter.rank_windows());
    let mut failures = evaluate(fund, &ranks, &criteria.filter);

    let risk_checks: [(&'static str, Option<f64>, f64, bool); 3] = [
        (
            "max_135_avg_stddev",
            fund.avg_risk_stat(|r| r.stddev),
            criteria.max_135_avg_stddev,
            false,
        ),
        (
            "min_135_avg_sharpe",
            fund.avg_risk_stat(|r| r.sharpe),
            criteria.min_135_avg_sharpe,
            true,
        ),
        (
            "max_135_avg_drawdown",
            fund.avg_risk_stat(|r| r.max_drawdown),
            criteria.max_135_avg_drawdown,
            false,
        ),
    ];
    for (predicate, observed, threshold, is_floor) in risk_checks {
        if threshold == 0.0 {
            continue;
        }
        let ok = observed.is_some_and(|v| if is_floor { v >= threshold } else { v <= threshold });
        if !ok {
            failures.push(PredicateFailure {
                predicate,
                observed,
                threshold,
            });
        }
    }

    FundCheckReport {
        fund: fund.clone(),
        passed: failures.is_empty(),
        failures,
    }
}
