#![allow(dead_code)]

use fundscreen::domain::error::ScreenError;
use fundscreen::domain::fund::{FundRecord, ReturnWindow, RiskHorizon, RiskStats, StockHolding};
use fundscreen::domain::stock_quality::{CheckerOptions, StockVerdict};
use fundscreen::ports::data_port::FundDataPort;
use fundscreen::ports::stock_check_port::StockCheckPort;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub struct MockFundDataPort {
    pub funds: Vec<FundRecord>,
    pub holdings: HashMap<String, Vec<StockHolding>>,
    pub errors: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
}

impl MockFundDataPort {
    pub fn new() -> Self {
        Self {
            funds: Vec::new(),
            holdings: HashMap::new(),
            errors: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    pub fn with_fund(mut self, fund: FundRecord) -> Self {
        self.funds.push(fund);
        self
    }

    pub fn with_funds(mut self, funds: Vec<FundRecord>) -> Self {
        self.funds.extend(funds);
        self
    }

    pub fn with_holdings(mut self, code: &str, holdings: Vec<StockHolding>) -> Self {
        self.holdings.insert(code.to_string(), holdings);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, code: &str, delay: Duration) -> Self {
        self.delays.insert(code.to_string(), delay);
        self
    }

    fn before_call(&self, code: &str) -> Result<(), ScreenError> {
        if let Some(delay) = self.delays.get(code) {
            thread::sleep(*delay);
        }
        if let Some(reason) = self.errors.get(code) {
            return Err(ScreenError::UpstreamUnavailable {
                reason: reason.clone(),
            });
        }
        Ok(())
    }
}

impl FundDataPort for MockFundDataPort {
    fn fetch_fund_universe(&self) -> Result<Vec<FundRecord>, ScreenError> {
        Ok(self.funds.clone())
    }

    fn fetch_fund_info(&self, code: &str) -> Result<FundRecord, ScreenError> {
        self.before_call(code)?;
        let mut fund = self
            .funds
            .iter()
            .find(|f| f.code == code)
            .cloned()
            .ok_or_else(|| ScreenError::fund_not_found(code))?;
        if let Some(h) = self.holdings.get(code) {
            fund.top_holdings = h.clone();
        }
        Ok(fund)
    }

    fn fetch_fund_holdings(&self, code: &str) -> Result<Vec<StockHolding>, ScreenError> {
        self.before_call(code)?;
        self.holdings
            .get(code)
            .cloned()
            .ok_or_else(|| ScreenError::fund_not_found(code))
    }
}

/// Stock checker with scripted verdicts, per-stock latency and a
/// high-water mark of concurrent calls.
pub struct MockStockCheckPort {
    pub failing: Vec<String>,
    pub errors: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl MockStockCheckPort {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            errors: HashMap::new(),
            delays: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, code: &str) -> Self {
        self.failing.push(code.to_string());
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, code: &str, delay: Duration) -> Self {
        self.delays.insert(code.to_string(), delay);
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl StockCheckPort for MockStockCheckPort {
    fn check_stock(
        &self,
        stock_code: &str,
        _options: &CheckerOptions,
    ) -> Result<StockVerdict, ScreenError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(stock_code.to_string());

        thread::sleep(
            self.delays
                .get(stock_code)
                .copied()
                .unwrap_or(Duration::from_millis(5)),
        );
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(reason) = self.errors.get(stock_code) {
            return Err(ScreenError::UpstreamUnavailable {
                reason: reason.clone(),
            });
        }
        let passed = !self.failing.iter().any(|c| c == stock_code);
        Ok(StockVerdict {
            stock_code: stock_code.to_string(),
            stock_name: format!("{stock_code} Corp"),
            passed,
            score: if passed { 100.0 } else { 50.0 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["roe".to_string()]
            },
        })
    }
}

/// A fund passing the size and tenure gates, with the given returns.
pub fn make_fund(code: &str, returns: &[(ReturnWindow, f64)]) -> FundRecord {
    let mut fund = FundRecord::new(code);
    fund.name = format!("Fund {code}");
    fund.fund_type = "equity".into();
    fund.scale = 10.0;
    fund.established_years = 8.0;
    fund.manager_years = 6.0;
    for (window, value) in returns {
        fund.returns.insert(*window, *value);
    }
    fund
}

/// Sets identical risk stats on all three horizons.
pub fn with_risk(mut fund: FundRecord, stddev: f64, sharpe: f64, drawdown: f64) -> FundRecord {
    for horizon in RiskHorizon::ALL {
        fund.risk_stats.insert(
            horizon,
            RiskStats {
                stddev,
                sharpe,
                max_drawdown: drawdown,
            },
        );
    }
    fund
}

pub fn holding(code: &str, weight: f64) -> StockHolding {
    StockHolding {
        stock_code: code.to_string(),
        stock_name: format!("{code} Corp"),
        weight_percent: weight,
    }
}

/// Twenty funds ranked F01 (best) to F20 (worst) on every rank window.
pub fn ranked_universe() -> Vec<FundRecord> {
    (1..=20)
        .map(|i| {
            let r = 100.0 - i as f64;
            make_fund(
                &format!("F{i:02}"),
                &[
                    (ReturnWindow::Year1, r),
                    (ReturnWindow::ThisYear, r),
                    (ReturnWindow::Year2, r),
                    (ReturnWindow::Year3, r),
                    (ReturnWindow::Year5, r),
                    (ReturnWindow::Month6, r),
                    (ReturnWindow::Month3, r),
                ],
            )
        })
        .collect()
}
