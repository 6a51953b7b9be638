//! Fund and holding value types.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ReturnWindow {
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1m")]
    Month1,
    #[serde(rename = "3m")]
    Month3,
    #[serde(rename = "6m")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "3y")]
    Year3,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "thisYear")]
    ThisYear,
    #[serde(rename = "all")]
    SinceInception,
}

impl ReturnWindow {
    pub const ALL: [ReturnWindow; 10] = [
        ReturnWindow::Week1,
        ReturnWindow::Month1,
        ReturnWindow::Month3,
        ReturnWindow::Month6,
        ReturnWindow::Year1,
        ReturnWindow::Year2,
        ReturnWindow::Year3,
        ReturnWindow::Year5,
        ReturnWindow::ThisYear,
        ReturnWindow::SinceInception,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReturnWindow::Week1 => "1w",
            ReturnWindow::Month1 => "1m",
            ReturnWindow::Month3 => "3m",
            ReturnWindow::Month6 => "6m",
            ReturnWindow::Year1 => "1y",
            ReturnWindow::Year2 => "2y",
            ReturnWindow::Year3 => "3y",
            ReturnWindow::Year5 => "5y",
            ReturnWindow::ThisYear => "thisYear",
            ReturnWindow::SinceInception => "all",
        }
    }
}

impl fmt::Display for ReturnWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReturnWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReturnWindow::ALL
            .into_iter()
            .find(|w| w.label() == s)
            .ok_or_else(|| format!("unknown return window '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskHorizon {
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "3y")]
    Year3,
    #[serde(rename = "5y")]
    Year5,
}

impl RiskHorizon {
    pub const ALL: [RiskHorizon; 3] = [RiskHorizon::Year1, RiskHorizon::Year3, RiskHorizon::Year5];

    pub fn label(self) -> &'static str {
        match self {
            RiskHorizon::Year1 => "1y",
            RiskHorizon::Year3 => "3y",
            RiskHorizon::Year5 => "5y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskStats {
    pub stddev: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockHolding {
    pub stock_code: String,
    pub stock_name: String,
    /// Share of net assets, 0-100.
    pub weight_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundRecord {
    pub code: String,
    pub name: String,
    pub fund_type: String,
    /// Net assets in billions.
    pub scale: f64,
    pub established_years: f64,
    pub manager_years: f64,
    pub returns: BTreeMap<ReturnWindow, f64>,
    pub risk_stats: BTreeMap<RiskHorizon, RiskStats>,
    /// Largest weight first. Empty until holdings are fetched.
    pub top_holdings: Vec<StockHolding>,
}

impl FundRecord {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            fund_type: String::new(),
            scale: 0.0,
            established_years: 0.0,
            manager_years: 0.0,
            returns: BTreeMap::new(),
            risk_stats: BTreeMap::new(),
            top_holdings: Vec::new(),
        }
    }

    /// Return for a window; non-finite values count as absent.
    pub fn return_for(&self, window: ReturnWindow) -> Option<f64> {
        self.returns.get(&window).copied().filter(|v| v.is_finite())
    }

    /// Mean of a risk statistic over the horizons that are present.
    pub fn avg_risk_stat(&self, pick: impl Fn(&RiskStats) -> f64) -> Option<f64> {
        let values: Vec<f64> = self
            .risk_stats
            .values()
            .map(pick)
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Stable sort, largest weight first.
pub fn sort_by_weight(holdings: &mut [StockHolding]) {
    holdings.sort_by(|a, b| {
        b.weight_percent
            .partial_cmp(&a.weight_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// A zero or non-finite scale, age or tenure value is treated as missing.
pub fn present(value: f64) -> Option<f64> {
    if value.is_finite() && value != 0.0 {
        Some(value)
    } else {
        None
    }
}
