//! Data provider port traits.
//!
//! Implementations are called from blocking worker threads, so they must be
//! `Send + Sync`. A failed call is final for the invocation; retry policy, if
//! any, belongs to the implementation.

use crate::domain::error::ScreenError;
use crate::domain::fund::{FundRecord, StockHolding};
use crate::domain::stock_quality::StockFundamentals;

pub trait FundDataPort: Send + Sync {
    /// The full fund universe, used to build a fresh snapshot.
    fn fetch_fund_universe(&self) -> Result<Vec<FundRecord>, ScreenError>;

    /// A single fund; `NotFound` for unknown codes.
    fn fetch_fund_info(&self, code: &str) -> Result<FundRecord, ScreenError>;

    /// Weighted holdings, largest weight first.
    fn fetch_fund_holdings(&self, code: &str) -> Result<Vec<StockHolding>, ScreenError>;
}

pub trait StockDataPort: Send + Sync {
    fn fetch_stock_fundamentals(&self, stock_code: &str)
    -> Result<StockFundamentals, ScreenError>;
}
