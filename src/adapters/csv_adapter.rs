//! CSV file data provider.
//!
//! Layout under the base directory:
//! - `funds.csv`: one row per fund, columns addressed by header name
//!   (`code,name,type,scale,established_years,manager_years`, one
//!   `ret_<window>` column per return window and
//!   `stddev_/sharpe_/drawdown_<horizon>` risk columns). Empty cells are
//!   missing values.
//! - `holdings/<code>.csv`: `stock_code,stock_name,weight_percent`.
//! - `stocks.csv`: `code,name,roe,debt_asset_ratio,total_market_cap,pe_ttm,
//!   peg,revenue_growth,net_profit_growth,gross_margin`.

use crate::domain::error::ScreenError;
use crate::domain::fund::{
    FundRecord, ReturnWindow, RiskHorizon, RiskStats, StockHolding, sort_by_weight,
};
use crate::domain::stock_quality::StockFundamentals;
use crate::ports::data_port::{FundDataPort, StockDataPort};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FUNDS_FILE: &str = "funds.csv";
pub const STOCKS_FILE: &str = "stocks.csv";
pub const HOLDINGS_DIR: &str = "holdings";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn holdings_path(&self, code: &str) -> PathBuf {
        self.base_path.join(HOLDINGS_DIR).join(format!("{}.csv", code))
    }

    fn load_funds(&self) -> Result<Vec<FundRecord>, ScreenError> {
        let path = self.base_path.join(FUNDS_FILE);
        let table = Table::read(&path)?;
        table.rows().map(|row| row.fund_record()).collect()
    }
}

fn unavailable(reason: String) -> ScreenError {
    ScreenError::UpstreamUnavailable { reason }
}

/// A parsed CSV file with header-addressed columns.
struct Table {
    path: PathBuf,
    columns: HashMap<String, usize>,
    records: Vec<StringRecord>,
}

struct Row<'a> {
    table: &'a Table,
    record: &'a StringRecord,
}

impl Table {
    /// Reads `path`; a missing file surfaces as the raw `io::Error`.
    fn read_raw(path: &Path) -> Result<Self, std::io::Error> {
        let content = fs::read_to_string(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns = rdr
            .headers()
            .map_err(std::io::Error::other)?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();

        let records = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(std::io::Error::other)?;

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            records,
        })
    }

    fn read(path: &Path) -> Result<Self, ScreenError> {
        Self::read_raw(path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))
    }

    fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().map(move |record| Row {
            table: self,
            record,
        })
    }
}

impl Row<'_> {
    fn text(&self, column: &str) -> Option<&str> {
        self.table
            .columns
            .get(column)
            .and_then(|&i| self.record.get(i))
            .filter(|v| !v.is_empty())
    }

    fn required(&self, column: &str) -> Result<String, ScreenError> {
        self.text(column).map(str::to_string).ok_or_else(|| {
            unavailable(format!(
                "missing {} column in {}",
                column,
                self.table.path.display()
            ))
        })
    }

    fn number(&self, column: &str) -> Result<Option<f64>, ScreenError> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => raw.trim_end_matches('%').parse::<f64>().map(Some).map_err(|e| {
                unavailable(format!(
                    "invalid {} value '{}' in {}: {}",
                    column,
                    raw,
                    self.table.path.display(),
                    e
                ))
            }),
        }
    }

    fn fund_record(&self) -> Result<FundRecord, ScreenError> {
        let mut fund = FundRecord::new(self.required("code")?);
        fund.name = self.text("name").unwrap_or_default().to_string();
        fund.fund_type = self.text("type").unwrap_or_default().to_string();
        fund.scale = self.number("scale")?.unwrap_or(0.0);
        fund.established_years = self.number("established_years")?.unwrap_or(0.0);
        fund.manager_years = self.number("manager_years")?.unwrap_or(0.0);

        for window in ReturnWindow::ALL {
            let column = format!("ret_{}", window.label().to_lowercase());
            if let Some(value) = self.number(&column)? {
                fund.returns.insert(window, value);
            }
        }

        for horizon in RiskHorizon::ALL {
            let label = horizon.label();
            let stddev = self.number(&format!("stddev_{label}"))?;
            let sharpe = self.number(&format!("sharpe_{label}"))?;
            let drawdown = self.number(&format!("drawdown_{label}"))?;
            if stddev.is_none() && sharpe.is_none() && drawdown.is_none() {
                continue;
            }
            fund.risk_stats.insert(
                horizon,
                RiskStats {
                    stddev: stddev.unwrap_or(f64::NAN),
                    sharpe: sharpe.unwrap_or(f64::NAN),
                    max_drawdown: drawdown.unwrap_or(f64::NAN),
                },
            );
        }

        Ok(fund)
    }

    fn holding(&self) -> Result<StockHolding, ScreenError> {
        Ok(StockHolding {
            stock_code: self.required("stock_code")?,
            stock_name: self.text("stock_name").unwrap_or_default().to_string(),
            weight_percent: self.number("weight_percent")?.unwrap_or(0.0),
        })
    }

    fn fundamentals(&self) -> Result<StockFundamentals, ScreenError> {
        Ok(StockFundamentals {
            code: self.required("code")?,
            name: self.text("name").unwrap_or_default().to_string(),
            roe: self.number("roe")?,
            debt_asset_ratio: self.number("debt_asset_ratio")?,
            total_market_cap: self.number("total_market_cap")?,
            pe_ttm: self.number("pe_ttm")?,
            peg: self.number("peg")?,
            revenue_growth: self.number("revenue_growth")?,
            net_profit_growth: self.number("net_profit_growth")?,
            gross_margin: self.number("gross_margin")?,
        })
    }
}

impl FundDataPort for CsvAdapter {
    fn fetch_fund_universe(&self) -> Result<Vec<FundRecord>, ScreenError> {
        let funds = self.load_funds()?;
        debug!(funds = funds.len(), path = %self.base_path.display(), "loaded fund universe");
        Ok(funds)
    }

    fn fetch_fund_info(&self, code: &str) -> Result<FundRecord, ScreenError> {
        let mut fund = self
            .load_funds()?
            .into_iter()
            .find(|f| f.code == code)
            .ok_or_else(|| ScreenError::fund_not_found(code))?;

        match self.fetch_fund_holdings(code) {
            Ok(holdings) => fund.top_holdings = holdings,
            Err(ScreenError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(fund)
    }

    fn fetch_fund_holdings(&self, code: &str) -> Result<Vec<StockHolding>, ScreenError> {
        let path = self.holdings_path(code);
        let table = match Table::read_raw(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScreenError::fund_not_found(code));
            }
            Err(e) => {
                return Err(unavailable(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut holdings = table
            .rows()
            .map(|row| row.holding())
            .collect::<Result<Vec<_>, _>>()?;
        sort_by_weight(&mut holdings);
        Ok(holdings)
    }
}

impl StockDataPort for CsvAdapter {
    fn fetch_stock_fundamentals(
        &self,
        stock_code: &str,
    ) -> Result<StockFundamentals, ScreenError> {
        let table = Table::read(&self.base_path.join(STOCKS_FILE))?;
        for row in table.rows() {
            if row.text("code") == Some(stock_code) {
                return row.fundamentals();
            }
        }
        Err(ScreenError::stock_not_found(stock_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join(FUNDS_FILE),
            "code,name,type,scale,established_years,manager_years,ret_1y,ret_3m,ret_thisyear,stddev_1y,sharpe_1y,drawdown_1y,sharpe_3y\n\
             001975,Alpha Growth,equity,12.5,7.2,5.5,30.1,4.2,12.0,21.0,1.4,18.0,1.1\n\
             519133,Beta Value,hybrid,3.0,9.0,2.0,,-1.5,,,,,\n",
        )
        .unwrap();

        fs::create_dir(path.join(HOLDINGS_DIR)).unwrap();
        fs::write(
            path.join(HOLDINGS_DIR).join("001975.csv"),
            "stock_code,stock_name,weight_percent\n\
             600519,Moutai,6.5\n\
             000858,Wuliangye,9.1\n",
        )
        .unwrap();
        fs::write(path.join(HOLDINGS_DIR).join("BROKEN.csv"), "stock_code,weight_percent\nX,abc\n")
            .unwrap();

        fs::write(
            path.join(STOCKS_FILE),
            "code,name,roe,debt_asset_ratio,total_market_cap,pe_ttm,peg,revenue_growth,net_profit_growth,gross_margin\n\
             600519,Moutai,30.2,19.5,21000,28.0,1.3,16.0,19.0,91.5\n\
             000858,Wuliangye,24.0,,8000,,,,,\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_universe_parses_header_addressed_columns() {
        let (_dir, path) = setup_test_data();
        let funds = CsvAdapter::new(path).fetch_fund_universe().unwrap();

        assert_eq!(funds.len(), 2);
        let alpha = &funds[0];
        assert_eq!(alpha.code, "001975");
        assert_eq!(alpha.fund_type, "equity");
        assert_eq!(alpha.scale, 12.5);
        assert_eq!(alpha.return_for(ReturnWindow::Year1), Some(30.1));
        assert_eq!(alpha.return_for(ReturnWindow::ThisYear), Some(12.0));
        assert_eq!(alpha.risk_stats[&RiskHorizon::Year1].sharpe, 1.4);
        assert!(alpha.risk_stats[&RiskHorizon::Year3].stddev.is_nan());
        assert!(!alpha.risk_stats.contains_key(&RiskHorizon::Year5));

        let beta = &funds[1];
        assert_eq!(beta.return_for(ReturnWindow::Year1), None);
        assert_eq!(beta.return_for(ReturnWindow::Month3), Some(-1.5));
        assert!(beta.risk_stats.is_empty());
    }

    #[test]
    fn fetch_fund_info_attaches_holdings() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let fund = adapter.fetch_fund_info("001975").unwrap();
        assert_eq!(fund.top_holdings.len(), 2);
        assert_eq!(fund.top_holdings[0].stock_code, "000858");

        let fund = adapter.fetch_fund_info("519133").unwrap();
        assert!(fund.top_holdings.is_empty());
    }

    #[test]
    fn unknown_fund_is_not_found() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_fund_info("999999"),
            Err(ScreenError::NotFound { .. })
        ));
        assert!(matches!(
            adapter.fetch_fund_holdings("999999"),
            Err(ScreenError::NotFound { .. })
        ));
    }

    #[test]
    fn garbled_holdings_are_upstream_errors() {
        let (_dir, path) = setup_test_data();
        let result = CsvAdapter::new(path).fetch_fund_holdings("BROKEN");
        assert!(matches!(result, Err(ScreenError::UpstreamUnavailable { .. })));
    }

    #[test]
    fn missing_universe_file_is_upstream_error() {
        let dir = TempDir::new().unwrap();
        let result = CsvAdapter::new(dir.path().to_path_buf()).fetch_fund_universe();
        assert!(matches!(result, Err(ScreenError::UpstreamUnavailable { .. })));
    }

    #[test]
    fn stock_fundamentals_lookup() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let moutai = adapter.fetch_stock_fundamentals("600519").unwrap();
        assert_eq!(moutai.roe, Some(30.2));
        assert_eq!(moutai.peg, Some(1.3));

        let wly = adapter.fetch_stock_fundamentals("000858").unwrap();
        assert_eq!(wly.debt_asset_ratio, None);

        assert!(matches!(
            adapter.fetch_stock_fundamentals("000001"),
            Err(ScreenError::NotFound { .. })
        ));
    }
}
