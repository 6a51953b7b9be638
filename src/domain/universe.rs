//! Fund universe snapshots and code-list parsing.
//!
//! A snapshot is immutable once built. The store swaps whole snapshots in and
//! readers keep the `Arc` they took for the length of a request, so a refresh
//! never exposes a half-built universe.

use crate::domain::error::ScreenError;
use crate::domain::filter::{self, FilterCriteria};
use crate::domain::fund::FundRecord;
use crate::ports::data_port::FundDataPort;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct FundUniverse {
    pub funds: Vec<FundRecord>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResult {
    pub funds: Vec<FundRecord>,
    pub total_count: usize,
    pub universe_count: usize,
}

impl FilterResult {
    /// Category tags of the funds that passed, in first-occurrence order.
    pub fn fund_types(&self) -> Vec<String> {
        fund_types(&self.funds)
    }
}

impl FundUniverse {
    pub fn new(funds: Vec<FundRecord>, synced_at: DateTime<Utc>) -> Self {
        Self { funds, synced_at }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn count(&self) -> usize {
        self.funds.len()
    }

    pub fn find(&self, code: &str) -> Option<&FundRecord> {
        self.funds.iter().find(|f| f.code == code)
    }

    /// Distinct category tags in first-occurrence order.
    pub fn fund_types(&self) -> Vec<String> {
        fund_types(&self.funds)
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> FilterResult {
        let funds = filter::filter(&self.funds, criteria);
        FilterResult {
            total_count: funds.len(),
            universe_count: self.funds.len(),
            funds,
        }
    }
}

pub fn fund_types(funds: &[FundRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    funds
        .iter()
        .filter(|f| !f.fund_type.is_empty())
        .filter(|f| seen.insert(f.fund_type.as_str()))
        .map(|f| f.fund_type.clone())
        .collect()
}

/// Process-wide holder of the current snapshot.
#[derive(Debug)]
pub struct UniverseStore {
    current: RwLock<Arc<FundUniverse>>,
}

impl UniverseStore {
    pub fn new(universe: FundUniverse) -> Self {
        Self {
            current: RwLock::new(Arc::new(universe)),
        }
    }

    pub fn snapshot(&self) -> Arc<FundUniverse> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, universe: FundUniverse) -> Arc<FundUniverse> {
        let next = Arc::new(universe);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        next
    }

    /// Fetches a new universe and swaps it in. On failure the previous
    /// snapshot stays current.
    pub fn refresh(&self, port: &dyn FundDataPort) -> Result<Arc<FundUniverse>, ScreenError> {
        let funds = match port.fetch_fund_universe() {
            Ok(funds) => funds,
            Err(e) => {
                warn!(error = %e, "fund universe refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };
        let universe = FundUniverse::new(funds, Utc::now());
        info!(funds = universe.count(), "fund universe refreshed");
        Ok(self.replace(universe))
    }
}

impl Default for UniverseStore {
    fn default() -> Self {
        Self::new(FundUniverse::empty())
    }
}

/// Splits a comma-separated code list, trimming tokens, dropping empty ones
/// and keeping only the first occurrence of each code.
pub fn parse_codes(input: &str) -> Vec<String> {
    dedup_codes(input.split(','))
}

pub fn dedup_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for token in codes {
        let code = token.trim().to_string();
        if code.is_empty() {
            continue;
        }
        if seen.insert(code.clone()) {
            out.push(code);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fund::StockHolding;

    struct StaticPort {
        funds: Option<Vec<FundRecord>>,
    }

    impl FundDataPort for StaticPort {
        fn fetch_fund_universe(&self) -> Result<Vec<FundRecord>, ScreenError> {
            self.funds
                .clone()
                .ok_or_else(|| ScreenError::UpstreamUnavailable {
                    reason: "down".into(),
                })
        }

        fn fetch_fund_info(&self, code: &str) -> Result<FundRecord, ScreenError> {
            Err(ScreenError::fund_not_found(code))
        }

        fn fetch_fund_holdings(&self, code: &str) -> Result<Vec<StockHolding>, ScreenError> {
            Err(ScreenError::fund_not_found(code))
        }
    }

    fn typed(code: &str, fund_type: &str) -> FundRecord {
        let mut f = FundRecord::new(code);
        f.fund_type = fund_type.into();
        f
    }

    #[test]
    fn test_parse_codes_basic() {
        assert_eq!(
            parse_codes("001975,519133,519644"),
            vec!["001975", "519133", "519644"]
        );
    }

    #[test]
    fn test_parse_codes_with_whitespace_and_empty_tokens() {
        assert_eq!(parse_codes(" 001975 ,, 519133,"), vec!["001975", "519133"]);
    }

    #[test]
    fn test_parse_codes_dedups_keeping_first() {
        assert_eq!(
            parse_codes("519133,001975,519133,001975"),
            vec!["519133", "001975"]
        );
    }

    #[test]
    fn test_parse_codes_keeps_case() {
        assert_eq!(parse_codes("of001, OF001,of001"), vec!["of001", "OF001"]);
    }

    #[test]
    fn test_parse_codes_empty() {
        assert!(parse_codes("").is_empty());
        assert!(parse_codes(" , ").is_empty());
    }

    #[test]
    fn fund_types_in_first_occurrence_order() {
        let universe = FundUniverse::new(
            vec![
                typed("A", "hybrid"),
                typed("B", "equity"),
                typed("C", "hybrid"),
                typed("D", ""),
            ],
            Utc::now(),
        );
        assert_eq!(universe.fund_types(), vec!["hybrid", "equity"]);
    }

    #[test]
    fn filtered_types_only_list_passing_funds() {
        let mut small = typed("A", "bond");
        small.scale = 0.5;
        let mut big = typed("B", "equity");
        big.scale = 10.0;
        let universe = FundUniverse::new(vec![small, big], Utc::now());

        let result = universe.filter(&FilterCriteria {
            min_scale: 2.0,
            ..Default::default()
        });
        assert_eq!(result.fund_types(), vec!["equity"]);
        assert_eq!(universe.fund_types(), vec!["bond", "equity"]);
    }

    #[test]
    fn snapshot_survives_replace() {
        let store = UniverseStore::new(FundUniverse::new(vec![typed("A", "x")], Utc::now()));
        let before = store.snapshot();
        store.replace(FundUniverse::new(
            vec![typed("B", "x"), typed("C", "x")],
            Utc::now(),
        ));
        assert_eq!(before.count(), 1);
        assert_eq!(store.snapshot().count(), 2);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let store = UniverseStore::new(FundUniverse::new(vec![typed("A", "x")], Utc::now()));
        let result = store.refresh(&StaticPort { funds: None });
        assert!(matches!(result, Err(ScreenError::UpstreamUnavailable { .. })));
        assert_eq!(store.snapshot().count(), 1);

        let fresh = store
            .refresh(&StaticPort {
                funds: Some(vec![typed("B", "x"), typed("C", "y")]),
            })
            .unwrap();
        assert_eq!(fresh.count(), 2);
        assert!(store.snapshot().find("C").is_some());
    }

    #[test]
    fn filter_reports_counts() {
        let universe = FundUniverse::new(vec![typed("A", "x"), typed("B", "y")], Utc::now());
        let result = universe.filter(&FilterCriteria::default());
        assert_eq!(result.total_count, 2);
        assert_eq!(result.universe_count, 2);
    }
}
