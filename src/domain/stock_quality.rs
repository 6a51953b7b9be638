//! Stock quality rubric applied to each fund holding.

use super::error::ScreenError;
use crate::ports::data_port::StockDataPort;
use crate::ports::stock_check_port::StockCheckPort;
use serde::Serialize;
use std::sync::Arc;

/// Raw fundamentals supplied by the data provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StockFundamentals {
    pub code: String,
    pub name: String,
    /// Return on equity (%).
    pub roe: Option<f64>,
    /// Liabilities over assets (%).
    pub debt_asset_ratio: Option<f64>,
    /// Total market value, hundred-million units.
    pub total_market_cap: Option<f64>,
    pub pe_ttm: Option<f64>,
    pub peg: Option<f64>,
    /// Year-over-year revenue growth (%).
    pub revenue_growth: Option<f64>,
    /// Year-over-year net profit growth (%).
    pub net_profit_growth: Option<f64>,
    /// Gross margin (%).
    pub gross_margin: Option<f64>,
}

/// Rubric thresholds. Zero disables a rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckerOptions {
    pub min_roe: f64,
    pub max_debt_asset_ratio: f64,
    pub min_total_market_cap: f64,
    pub max_pe_ttm: f64,
    pub max_peg: f64,
    pub min_revenue_growth: f64,
    pub min_net_profit_growth: f64,
    pub min_gross_margin: f64,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            min_roe: 8.0,
            max_debt_asset_ratio: 60.0,
            min_total_market_cap: 100.0,
            max_pe_ttm: 0.0,
            max_peg: 1.5,
            min_revenue_growth: 0.0,
            min_net_profit_growth: 0.0,
            min_gross_margin: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockVerdict {
    pub stock_code: String,
    pub stock_name: String,
    pub passed: bool,
    /// Percentage of active rules passed.
    pub score: f64,
    pub failures: Vec<String>,
}

enum Bound {
    Min,
    Max,
}

pub fn evaluate_stock(stock: &StockFundamentals, options: &CheckerOptions) -> StockVerdict {
    let rules = [
        ("roe", stock.roe, options.min_roe, Bound::Min),
        (
            "debt_asset_ratio",
            stock.debt_asset_ratio,
            options.max_debt_asset_ratio,
            Bound::Max,
        ),
        (
            "total_market_cap",
            stock.total_market_cap,
            options.min_total_market_cap,
            Bound::Min,
        ),
        ("pe_ttm", stock.pe_ttm, options.max_pe_ttm, Bound::Max),
        ("peg", stock.peg, options.max_peg, Bound::Max),
        (
            "revenue_growth",
            stock.revenue_growth,
            options.min_revenue_growth,
            Bound::Min,
        ),
        (
            "net_profit_growth",
            stock.net_profit_growth,
            options.min_net_profit_growth,
            Bound::Min,
        ),
        (
            "gross_margin",
            stock.gross_margin,
            options.min_gross_margin,
            Bound::Min,
        ),
    ];

    let mut active = 0usize;
    let mut failures = Vec::new();
    for (name, value, threshold, bound) in rules {
        if threshold == 0.0 {
            continue;
        }
        active += 1;
        match (value.filter(|v| v.is_finite()), bound) {
            (None, _) => failures.push(format!("{name}: missing")),
            (Some(v), Bound::Min) if v < threshold => {
                failures.push(format!("{name}: {v:.2} < {threshold:.2}"))
            }
            (Some(v), Bound::Max) if v > threshold => {
                failures.push(format!("{name}: {v:.2} > {threshold:.2}"))
            }
            _ => {}
        }
    }

    let score = if active == 0 {
        100.0
    } else {
        (active - failures.len()) as f64 / active as f64 * 100.0
    };

    StockVerdict {
        stock_code: stock.code.clone(),
        stock_name: stock.name.clone(),
        passed: failures.is_empty(),
        score,
        failures,
    }
}

/// [`StockCheckPort`] that pulls fundamentals from a [`StockDataPort`] and
/// applies [`evaluate_stock`].
pub struct RubricStockChecker {
    data: Arc<dyn StockDataPort>,
}

impl RubricStockChecker {
    pub fn new(data: Arc<dyn StockDataPort>) -> Self {
        Self { data }
    }
}

impl StockCheckPort for RubricStockChecker {
    fn check_stock(
        &self,
        stock_code: &str,
        options: &CheckerOptions,
    ) -> Result<StockVerdict, ScreenError> {
        let fundamentals = self.data.fetch_stock_fundamentals(stock_code)?;
        Ok(evaluate_stock(&fundamentals, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality_stock() -> StockFundamentals {
        StockFundamentals {
            code: "600519".into(),
            name: "Moutai".into(),
            roe: Some(30.0),
            debt_asset_ratio: Some(20.0),
            total_market_cap: Some(20_000.0),
            pe_ttm: Some(30.0),
            peg: Some(1.2),
            revenue_growth: Some(15.0),
            net_profit_growth: Some(18.0),
            gross_margin: Some(91.0),
        }
    }

    #[test]
    fn strong_stock_passes_default_rubric() {
        let verdict = evaluate_stock(&quality_stock(), &CheckerOptions::default());
        assert!(verdict.passed);
        assert_eq!(verdict.score, 100.0);
        assert!(verdict.failures.is_empty());
    }

    #[test]
    fn failures_are_named() {
        let mut stock = quality_stock();
        stock.roe = Some(5.0);
        stock.debt_asset_ratio = Some(80.0);
        let verdict = evaluate_stock(&stock, &CheckerOptions::default());
        assert!(!verdict.passed);
        assert_eq!(verdict.failures.len(), 2);
        assert!(verdict.failures[0].starts_with("roe"));
        assert!(verdict.failures[1].starts_with("debt_asset_ratio"));
        // 4 active rules in the default rubric, 2 pass.
        assert!((verdict.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_metric_fails_active_rule_only() {
        let mut stock = quality_stock();
        stock.peg = None;
        stock.gross_margin = None;
        let verdict = evaluate_stock(&stock, &CheckerOptions::default());
        assert_eq!(verdict.failures, vec!["peg: missing".to_string()]);
    }

    #[test]
    fn empty_rubric_passes_everything() {
        let options = CheckerOptions {
            min_roe: 0.0,
            max_debt_asset_ratio: 0.0,
            min_total_market_cap: 0.0,
            max_pe_ttm: 0.0,
            max_peg: 0.0,
            min_revenue_growth: 0.0,
            min_net_profit_growth: 0.0,
            min_gross_margin: 0.0,
        };
        let verdict = evaluate_stock(&StockFundamentals::default(), &options);
        assert!(verdict.passed);
        assert_eq!(verdict.score, 100.0);
    }
}
