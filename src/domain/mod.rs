//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod fanout;
pub mod filter;
pub mod fund;
pub mod fund_check;
pub mod holdings_check;
pub mod rank;
pub mod screener;
pub mod similarity;
pub mod stock_quality;
pub mod universe;
