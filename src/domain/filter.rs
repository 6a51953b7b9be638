//! Fund filter pipeline: scale, tenure and return-rank predicates.
//!
//! Every threshold left at zero is "no constraint". Active thresholds are
//! ANDed. Invalid thresholds are not rejected; they just shrink or keep the
//! result.

use super::fund::{FundRecord, ReturnWindow, present};
use super::rank::RankPercentileTable;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Windows sharing the `this_year_235_rank_ratio` ceiling.
pub const THIS_YEAR_235_WINDOWS: [ReturnWindow; 4] = [
    ReturnWindow::ThisYear,
    ReturnWindow::Year2,
    ReturnWindow::Year3,
    ReturnWindow::Year5,
];

/// How a shared rank ceiling combines across several windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankCombine {
    /// Every window must be within the ceiling.
    #[default]
    All,
    /// At least one window must be within the ceiling.
    Any,
}

impl FromStr for RankCombine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(RankCombine::All),
            "any" => Ok(RankCombine::Any),
            other => Err(format!("unknown rank combine mode '{other}' (expected all or any)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FilterCriteria {
    pub min_scale: f64,
    pub max_scale: f64,
    pub min_estab_years: f64,
    pub min_manager_years: f64,
    pub year1_rank_ratio: f64,
    pub this_year_235_rank_ratio: f64,
    pub this_year_235_mode: RankCombine,
    pub month6_rank_ratio: f64,
    pub month3_rank_ratio: f64,
}

impl FilterCriteria {
    /// The "4433" rule: top quarter over 1y and this-year/2y/3y/5y, top
    /// third over 6m and 3m, mid-sized funds with a seasoned manager.
    pub fn recommended() -> Self {
        Self {
            min_scale: 2.0,
            max_scale: 50.0,
            min_estab_years: 5.0,
            min_manager_years: 5.0,
            year1_rank_ratio: 25.0,
            this_year_235_rank_ratio: 25.0,
            this_year_235_mode: RankCombine::All,
            month6_rank_ratio: 33.33,
            month3_rank_ratio: 33.33,
        }
    }

    /// Return windows referenced by the active rank thresholds.
    pub fn rank_windows(&self) -> Vec<ReturnWindow> {
        let mut windows = Vec::new();
        if self.year1_rank_ratio != 0.0 {
            windows.push(ReturnWindow::Year1);
        }
        if self.this_year_235_rank_ratio != 0.0 {
            windows.extend(THIS_YEAR_235_WINDOWS);
        }
        if self.month6_rank_ratio != 0.0 {
            windows.push(ReturnWindow::Month6);
        }
        if self.month3_rank_ratio != 0.0 {
            windows.push(ReturnWindow::Month3);
        }
        windows
    }
}

/// One predicate a fund did not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateFailure {
    pub predicate: &'static str,
    /// `None` when the fund has no value for the referenced field.
    pub observed: Option<f64>,
    pub threshold: f64,
}

impl fmt::Display for PredicateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.observed {
            Some(v) => write!(f, "{}: {:.2} (threshold {:.2})", self.predicate, v, self.threshold),
            None => write!(f, "{}: missing (threshold {:.2})", self.predicate, self.threshold),
        }
    }
}

fn check_min(
    failures: &mut Vec<PredicateFailure>,
    predicate: &'static str,
    observed: Option<f64>,
    threshold: f64,
) {
    if threshold == 0.0 {
        return;
    }
    if !observed.is_some_and(|v| v >= threshold) {
        failures.push(PredicateFailure {
            predicate,
            observed,
            threshold,
        });
    }
}

fn check_max(
    failures: &mut Vec<PredicateFailure>,
    predicate: &'static str,
    observed: Option<f64>,
    threshold: f64,
) {
    if threshold == 0.0 {
        return;
    }
    if !observed.is_some_and(|v| v <= threshold) {
        failures.push(PredicateFailure {
            predicate,
            observed,
            threshold,
        });
    }
}

/// Evaluates every active predicate and returns the ones the fund fails.
pub fn evaluate(
    fund: &FundRecord,
    ranks: &RankPercentileTable,
    criteria: &FilterCriteria,
) -> Vec<PredicateFailure> {
    let mut failures = Vec::new();
    let scale = present(fund.scale);

    check_min(&mut failures, "min_scale", scale, criteria.min_scale);
    check_max(&mut failures, "max_scale", scale, criteria.max_scale);
    check_min(
        &mut failures,
        "min_estab_years",
        present(fund.established_years),
        criteria.min_estab_years,
    );
    check_min(
        &mut failures,
        "min_manager_years",
        present(fund.manager_years),
        criteria.min_manager_years,
    );
    check_max(
        &mut failures,
        "year1_rank_ratio",
        ranks.rank(&fund.code, ReturnWindow::Year1),
        criteria.year1_rank_ratio,
    );

    if criteria.this_year_235_rank_ratio != 0.0 {
        let ceiling = criteria.this_year_235_rank_ratio;
        let window_ranks: Vec<Option<f64>> = THIS_YEAR_235_WINDOWS
            .iter()
            .map(|&w| ranks.rank(&fund.code, w))
            .collect();
        let within = |r: &Option<f64>| r.is_some_and(|v| v <= ceiling);
        let passed = match criteria.this_year_235_mode {
            RankCombine::All => window_ranks.iter().all(within),
            RankCombine::Any => window_ranks.iter().any(within),
        };
        if !passed {
            // Report the worst window for All and the best one for Any.
            let observed = match criteria.this_year_235_mode {
                RankCombine::All => window_ranks
                    .iter()
                    .map(|r| r.unwrap_or(f64::INFINITY))
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                    .filter(|v| v.is_finite()),
                RankCombine::Any => window_ranks
                    .iter()
                    .flatten()
                    .copied()
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))),
            };
            failures.push(PredicateFailure {
                predicate: "this_year_235_rank_ratio",
                observed,
                threshold: ceiling,
            });
        }
    }

    check_max(
        &mut failures,
        "month6_rank_ratio",
        ranks.rank(&fund.code, ReturnWindow::Month6),
        criteria.month6_rank_ratio,
    );
    check_max(
        &mut failures,
        "month3_rank_ratio",
        ranks.rank(&fund.code, ReturnWindow::Month3),
        criteria.month3_rank_ratio,
    );

    failures
}

/// Keeps the funds satisfying every active predicate, ranked against all of
/// `universe`. Input order is preserved.
pub fn filter(universe: &[FundRecord], criteria: &FilterCriteria) -> Vec<FundRecord> {
    filter_candidates(universe, universe, criteria)
}

/// Filters `candidates` while ranking against `universe`, so re-filtering a
/// filtered list against the same snapshot returns the same list.
pub fn filter_candidates(
    universe: &[FundRecord],
    candidates: &[FundRecord],
    criteria: &FilterCriteria,
) -> Vec<FundRecord> {
    let ranks = RankPercentileTable::build(universe, &criteria.rank_windows());
    candidates
        .iter()
        .filter(|f| evaluate(f, &ranks, criteria).is_empty())
        .cloned()
        .collect()
}

/// Exact, case-sensitive category match. An empty tag keeps everything.
pub fn filter_by_type(list: &[FundRecord], fund_type: &str) -> Vec<FundRecord> {
    if fund_type.is_empty() {
        return list.to_vec();
    }
    list.iter()
        .filter(|f| f.fund_type == fund_type)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMetric {
    Week1 = 1,
    Month1 = 2,
    Month3 = 3,
    Month6 = 4,
    Year1 = 5,
    Year2 = 6,
    Year3 = 7,
    Year5 = 8,
    ThisYear = 9,
    SinceInception = 10,
    Scale = 11,
    ManagerYears = 12,
    EstablishedYears = 13,
}

impl SortMetric {
    pub fn value_of(self, fund: &FundRecord) -> Option<f64> {
        let window = match self {
            SortMetric::Week1 => ReturnWindow::Week1,
            SortMetric::Month1 => ReturnWindow::Month1,
            SortMetric::Month3 => ReturnWindow::Month3,
            SortMetric::Month6 => ReturnWindow::Month6,
            SortMetric::Year1 => ReturnWindow::Year1,
            SortMetric::Year2 => ReturnWindow::Year2,
            SortMetric::Year3 => ReturnWindow::Year3,
            SortMetric::Year5 => ReturnWindow::Year5,
            SortMetric::ThisYear => ReturnWindow::ThisYear,
            SortMetric::SinceInception => ReturnWindow::SinceInception,
            SortMetric::Scale => return present(fund.scale),
            SortMetric::ManagerYears => return present(fund.manager_years),
            SortMetric::EstablishedYears => return present(fund.established_years),
        };
        fund.return_for(window)
    }
}

impl TryFrom<u8> for SortMetric {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        let metric = match id {
            1 => SortMetric::Week1,
            2 => SortMetric::Month1,
            3 => SortMetric::Month3,
            4 => SortMetric::Month6,
            5 => SortMetric::Year1,
            6 => SortMetric::Year2,
            7 => SortMetric::Year3,
            8 => SortMetric::Year5,
            9 => SortMetric::ThisYear,
            10 => SortMetric::SinceInception,
            11 => SortMetric::Scale,
            12 => SortMetric::ManagerYears,
            13 => SortMetric::EstablishedYears,
            other => return Err(format!("unknown sort metric id {other}")),
        };
        Ok(metric)
    }
}

/// Stable descending sort by `metric`; funds without a value go last.
pub fn sort(list: &mut [FundRecord], metric: SortMetric) {
    list.sort_by(|a, b| match (metric.value_of(a), metric.value_of(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
