//! Stock quality check port trait.

use crate::domain::error::ScreenError;
use crate::domain::stock_quality::{CheckerOptions, StockVerdict};

/// Evaluates one stock against a quality rubric.
pub trait StockCheckPort: Send + Sync {
    fn check_stock(
        &self,
        stock_code: &str,
        options: &CheckerOptions,
    ) -> Result<StockVerdict, ScreenError>;
}
