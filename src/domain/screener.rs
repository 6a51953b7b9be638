//! Entry points exposed to the display layer.
//!
//! `FundScreener` ties the universe store to the data provider and stock
//! rubric. Filtering reads one snapshot; checks and similarity fan out to the
//! collaborators through [`fan_out`].

use super::error::ScreenError;
use super::fanout::{CancelToken, fan_out};
use super::filter::FilterCriteria;
use super::fund::FundRecord;
use super::fund_check::{FundCheckCriteria, FundCheckReport, check_fund};
use super::holdings_check::{EngineConfig, HoldingsCheckResult, HoldingsChecker};
use super::similarity::{SimilarityEngine, SimilarityReport};
use super::stock_quality::CheckerOptions;
use super::universe::{FilterResult, FundUniverse, UniverseStore};
use crate::ports::data_port::FundDataPort;
use crate::ports::stock_check_port::StockCheckPort;
use std::sync::Arc;
use tracing::{debug, info};

pub struct FundScreener {
    store: Arc<UniverseStore>,
    data: Arc<dyn FundDataPort>,
    stock_checker: Arc<dyn StockCheckPort>,
    engine: EngineConfig,
}

impl FundScreener {
    pub fn new(
        store: Arc<UniverseStore>,
        data: Arc<dyn FundDataPort>,
        stock_checker: Arc<dyn StockCheckPort>,
        engine: EngineConfig,
    ) -> Self {
        Self {
            store,
            data,
            stock_checker,
            engine,
        }
    }

    pub fn snapshot(&self) -> Arc<FundUniverse> {
        self.store.snapshot()
    }

    /// Replaces the snapshot with a fresh one from the data provider.
    pub fn refresh(&self) -> Result<Arc<FundUniverse>, ScreenError> {
        self.store.refresh(self.data.as_ref())
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> FilterResult {
        let universe = self.store.snapshot();
        let result = universe.filter(criteria);
        info!(
            passed = result.total_count,
            universe = result.universe_count,
            "fund filter applied"
        );
        result
    }

    /// Fetches one fund and checks it against `criteria`, ranking it within
    /// the current snapshot.
    pub async fn check_fund(
        &self,
        code: &str,
        criteria: &FundCheckCriteria,
        cancel: &CancelToken,
    ) -> Result<FundCheckReport, ScreenError> {
        let fund = self.fetch_fund(code, cancel).await?;
        let universe = self.store.snapshot();
        let report = check_fund(&universe.funds, &fund, criteria);
        debug!(fund = %code, passed = report.passed, failures = report.failures.len(), "fund checked");
        Ok(report)
    }

    pub async fn check_fund_stocks(
        &self,
        code: &str,
        options: &CheckerOptions,
        cancel: &CancelToken,
    ) -> Result<HoldingsCheckResult, ScreenError> {
        let code = require_code(code)?;
        self.holdings_checker(options)
            .check_fund_stocks_by_code(code, cancel)
            .await
    }

    pub async fn fund_stocks_similarity(
        &self,
        codes: &[String],
        cancel: &CancelToken,
    ) -> Result<SimilarityReport, ScreenError> {
        SimilarityEngine::new(Arc::clone(&self.data), self.engine.max_concurrency)
            .fund_stocks_similarity(codes, cancel)
            .await
    }

    pub fn holdings_checker(&self, options: &CheckerOptions) -> HoldingsChecker {
        HoldingsChecker::new(
            Arc::clone(&self.data),
            Arc::clone(&self.stock_checker),
            *options,
            self.engine,
        )
    }

    async fn fetch_fund(&self, code: &str, cancel: &CancelToken) -> Result<FundRecord, ScreenError> {
        let code = require_code(code)?;
        let data = Arc::clone(&self.data);
        let mut found = fan_out(vec![code.to_string()], 1, cancel, move |c: String| {
            data.fetch_fund_info(&c)
        })
        .await?;
        found
            .pop()
            .ok_or_else(|| ScreenError::fund_not_found(code))?
    }
}

fn require_code(code: &str) -> Result<&str, ScreenError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ScreenError::InvalidInput {
            reason: "fund code is required".into(),
        });
    }
    Ok(code)
}
