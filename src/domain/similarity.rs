//! Portfolio overlap between funds, measured on their stock holdings.
//!
//! Each fund's holdings form a weight vector over the union of stock codes
//! held by either fund. The score is the cosine of the two vectors, so it
//! rewards holding the same names at similar weights.

use super::error::{ErrorKind, ItemFailure, ScreenError};
use super::fanout::{CancelToken, fan_out};
use super::fund::StockHolding;
use super::universe::dedup_codes;
use crate::ports::data_port::FundDataPort;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedStock {
    pub stock_code: String,
    pub stock_name: String,
    pub left_weight: f64,
    pub right_weight: f64,
}

impl SharedStock {
    pub fn combined_weight(&self) -> f64 {
        self.left_weight + self.right_weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSimilarity {
    pub left: String,
    pub right: String,
    pub score: f64,
    /// Stocks held by both funds, largest combined weight first.
    pub shared: Vec<SharedStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedFund {
    pub code: String,
    pub failure: ItemFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    /// De-duplicated input codes; rows and columns of `matrix` follow it.
    pub codes: Vec<String>,
    /// `None` wherever either fund was excluded.
    pub matrix: Vec<Vec<Option<f64>>>,
    pub pairs: Vec<PairSimilarity>,
    pub excluded: Vec<ExcludedFund>,
}

impl SimilarityReport {
    pub fn is_partial(&self) -> bool {
        !self.excluded.is_empty()
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.is_partial().then_some(ErrorKind::PartialFailure)
    }

    pub fn score(&self, left: &str, right: &str) -> Option<f64> {
        let i = self.codes.iter().position(|c| c == left)?;
        let j = self.codes.iter().position(|c| c == right)?;
        self.matrix[i][j]
    }
}

/// Stock code to total weight; duplicate rows for one stock are summed.
fn weight_vector(holdings: &[StockHolding]) -> HashMap<&str, f64> {
    let mut weights = HashMap::new();
    for h in holdings {
        if h.weight_percent.is_finite() && h.weight_percent > 0.0 {
            *weights.entry(h.stock_code.as_str()).or_insert(0.0) += h.weight_percent;
        }
    }
    weights
}

fn norm(weights: &HashMap<&str, f64>) -> f64 {
    weights.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Cosine similarity of two holdings lists, clamped into [0, 1].
///
/// `None` when either list carries no positive weight.
pub fn cosine_similarity(left: &[StockHolding], right: &[StockHolding]) -> Option<f64> {
    let a = weight_vector(left);
    let b = weight_vector(right);
    let (na, nb) = (norm(&a), norm(&b));
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(code, wa)| b.get(code).map(|wb| wa * wb))
        .sum();
    Some((dot / (na * nb)).clamp(0.0, 1.0))
}

/// Stocks present in both lists, sorted by combined weight descending.
pub fn shared_stocks(left: &[StockHolding], right: &[StockHolding]) -> Vec<SharedStock> {
    let a = weight_vector(left);
    let b = weight_vector(right);
    let names: HashMap<&str, &str> = left
        .iter()
        .chain(right)
        .map(|h| (h.stock_code.as_str(), h.stock_name.as_str()))
        .collect();

    let common: BTreeSet<&str> = a.keys().filter(|c| b.contains_key(*c)).copied().collect();
    let mut shared: Vec<SharedStock> = common
        .into_iter()
        .map(|code| SharedStock {
            stock_code: code.to_string(),
            stock_name: names.get(code).copied().unwrap_or_default().to_string(),
            left_weight: a[code],
            right_weight: b[code],
        })
        .collect();
    shared.sort_by(|x, y| {
        y.combined_weight()
            .partial_cmp(&x.combined_weight())
            .unwrap_or(Ordering::Equal)
    });
    shared
}

/// Builds the report from per-code fetch outcomes, in `codes` order.
pub fn build_report(
    codes: Vec<String>,
    fetched: Vec<Result<Vec<StockHolding>, ScreenError>>,
) -> Result<SimilarityReport, ScreenError> {
    let mut excluded = Vec::new();
    let mut usable: Vec<Option<Vec<StockHolding>>> = Vec::with_capacity(codes.len());

    for (code, outcome) in codes.iter().zip(fetched) {
        match outcome {
            Ok(holdings) if norm(&weight_vector(&holdings)) > 0.0 => usable.push(Some(holdings)),
            Ok(_) => {
                let err = ScreenError::InsufficientData {
                    reason: format!("fund {code} reports no weighted holdings"),
                };
                warn!(fund = %code, "excluding fund without holdings");
                excluded.push(ExcludedFund {
                    code: code.clone(),
                    failure: ItemFailure::from(err),
                });
                usable.push(None);
            }
            Err(e) => {
                warn!(fund = %code, error = %e, "excluding fund after holdings fetch failure");
                excluded.push(ExcludedFund {
                    code: code.clone(),
                    failure: ItemFailure::from(e),
                });
                usable.push(None);
            }
        }
    }

    let ok_count = usable.iter().filter(|u| u.is_some()).count();
    if ok_count < 2 {
        return Err(ScreenError::InsufficientData {
            reason: format!(
                "only {ok_count} of {} funds have usable holdings, need at least 2",
                codes.len()
            ),
        });
    }

    let n = codes.len();
    let mut matrix = vec![vec![None; n]; n];
    let mut pairs = Vec::new();
    for i in 0..n {
        let Some(left) = usable[i].as_ref() else {
            continue;
        };
        matrix[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let Some(right) = usable[j].as_ref() else {
                continue;
            };
            let score = cosine_similarity(left, right).unwrap_or(0.0);
            matrix[i][j] = Some(score);
            matrix[j][i] = Some(score);
            pairs.push(PairSimilarity {
                left: codes[i].clone(),
                right: codes[j].clone(),
                score,
                shared: shared_stocks(left, right),
            });
        }
    }

    Ok(SimilarityReport {
        codes,
        matrix,
        pairs,
        excluded,
    })
}

pub struct SimilarityEngine {
    data: Arc<dyn FundDataPort>,
    max_concurrency: usize,
}

impl SimilarityEngine {
    pub fn new(data: Arc<dyn FundDataPort>, max_concurrency: usize) -> Self {
        Self {
            data,
            max_concurrency,
        }
    }

    /// Fetches every fund's holdings concurrently and scores each pair.
    ///
    /// Duplicate codes are dropped keeping the first occurrence. Fewer than
    /// two distinct codes is `InvalidInput`; fewer than two funds with usable
    /// holdings is `InsufficientData`. Otherwise the report lists which funds
    /// were excluded and why.
    pub async fn fund_stocks_similarity(
        &self,
        codes: &[String],
        cancel: &CancelToken,
    ) -> Result<SimilarityReport, ScreenError> {
        let codes = dedup_codes(codes.iter().map(String::as_str));
        if codes.len() < 2 {
            return Err(ScreenError::InvalidInput {
                reason: format!(
                    "similarity needs at least 2 distinct fund codes, got {}",
                    codes.len()
                ),
            });
        }

        let data = Arc::clone(&self.data);
        let fetched = fan_out(codes.clone(), self.max_concurrency, cancel, move |code: String| {
            data.fetch_fund_holdings(&code)
        })
        .await?;

        let report = build_report(codes, fetched)?;
        info!(
            funds = report.codes.len(),
            pairs = report.pairs.len(),
            excluded = report.excluded.len(),
            "similarity computed"
        );
        Ok(report)
    }
}
