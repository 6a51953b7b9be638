//! Percentile rank of fund returns across a universe.
//!
//! Rank 1 is the best performer and 100 the worst. A table is built per
//! filter invocation from the snapshot being filtered and dropped after use.

use super::fund::{FundRecord, ReturnWindow};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RankPercentileTable {
    ranks: HashMap<String, HashMap<ReturnWindow, f64>>,
}

impl RankPercentileTable {
    /// Ranks every fund in `funds` for each of `windows`.
    ///
    /// Funds are ordered descending by return with ties kept in input order,
    /// and `rank = position / funds.len() * 100`. Funds without a value for a
    /// window get no rank there but still count towards the denominator.
    pub fn build(funds: &[FundRecord], windows: &[ReturnWindow]) -> Self {
        let mut table = Self::default();

        for &window in windows {
            let mut ranked: Vec<(&str, f64)> = funds
                .iter()
                .filter_map(|f| f.return_for(window).map(|r| (f.code.as_str(), r)))
                .collect();

            // sort_by is stable, so equal returns keep their input order.
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let total = funds.len();
            for (position, (code, _)) in ranked.into_iter().enumerate() {
                let pct = (position + 1) as f64 / total as f64 * 100.0;
                table
                    .ranks
                    .entry(code.to_string())
                    .or_default()
                    .entry(window)
                    .or_insert(pct);
            }
        }

        table
    }

    pub fn rank(&self, code: &str, window: ReturnWindow) -> Option<f64> {
        self.ranks.get(code).and_then(|m| m.get(&window)).copied()
    }
}
