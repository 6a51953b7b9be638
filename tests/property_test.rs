//! Property tests for ranking, filtering and similarity.

mod common;

use common::*;
use fundscreen::domain::filter::{self, FilterCriteria, RankCombine};
use fundscreen::domain::fund::{FundRecord, ReturnWindow, StockHolding};
use fundscreen::domain::rank::RankPercentileTable;
use fundscreen::domain::similarity::cosine_similarity;
use proptest::prelude::*;

fn universe_strategy() -> impl Strategy<Value = Vec<FundRecord>> {
    prop::collection::vec(
        (
            prop::option::of(-50.0f64..150.0),
            prop::option::of(-30.0f64..80.0),
            0.1f64..100.0,
            0.0f64..20.0,
        ),
        1..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (y1, m6, scale, years))| {
                let mut fund = make_fund(&format!("P{i:03}"), &[]);
                if let Some(v) = y1 {
                    fund.returns.insert(ReturnWindow::Year1, v);
                    fund.returns.insert(ReturnWindow::ThisYear, v / 2.0);
                }
                if let Some(v) = m6 {
                    fund.returns.insert(ReturnWindow::Month6, v);
                }
                fund.scale = scale;
                fund.established_years = years;
                fund.manager_years = years / 2.0;
                fund
            })
            .collect()
    })
}

fn criteria_strategy() -> impl Strategy<Value = FilterCriteria> {
    (
        0.0f64..10.0,
        0.0f64..100.0,
        0.0f64..100.0,
        0.0f64..100.0,
        any::<bool>(),
    )
        .prop_map(|(min_scale, y1, ty, m6, any_mode)| FilterCriteria {
            min_scale,
            min_estab_years: 3.0,
            year1_rank_ratio: y1,
            this_year_235_rank_ratio: ty,
            this_year_235_mode: if any_mode {
                RankCombine::Any
            } else {
                RankCombine::All
            },
            month6_rank_ratio: m6,
            ..FilterCriteria::default()
        })
}

fn holdings_strategy() -> impl Strategy<Value = Vec<StockHolding>> {
    prop::collection::vec((0usize..8, 0.0f64..20.0), 0..8).prop_map(|rows| {
        rows.into_iter()
            .map(|(stock, weight)| holding(&format!("S{stock}"), weight))
            .collect()
    })
}

proptest! {
    #[test]
    fn higher_return_never_ranks_worse(funds in universe_strategy()) {
        let table = RankPercentileTable::build(&funds, &[ReturnWindow::Year1]);
        for a in &funds {
            for b in &funds {
                if let (Some(ra), Some(rb)) = (
                    a.return_for(ReturnWindow::Year1),
                    b.return_for(ReturnWindow::Year1),
                ) {
                    if ra > rb {
                        let pa = table.rank(&a.code, ReturnWindow::Year1).unwrap();
                        let pb = table.rank(&b.code, ReturnWindow::Year1).unwrap();
                        prop_assert!(pa < pb);
                    }
                }
            }
        }
    }

    #[test]
    fn ranks_stay_in_bounds(funds in universe_strategy()) {
        let table = RankPercentileTable::build(&funds, &[ReturnWindow::Year1]);
        for f in &funds {
            match table.rank(&f.code, ReturnWindow::Year1) {
                Some(r) => prop_assert!(r > 0.0 && r <= 100.0),
                None => prop_assert!(f.return_for(ReturnWindow::Year1).is_none()),
            }
        }
    }

    #[test]
    fn filter_is_idempotent(funds in universe_strategy(), criteria in criteria_strategy()) {
        let once = filter::filter(&funds, &criteria);
        let twice = filter::filter_candidates(&funds, &once, &criteria);
        let a: Vec<_> = once.iter().map(|f| &f.code).collect();
        let b: Vec<_> = twice.iter().map(|f| &f.code).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn filter_output_is_an_ordered_subset(funds in universe_strategy(), criteria in criteria_strategy()) {
        let out = filter::filter(&funds, &criteria);
        let mut cursor = funds.iter();
        for kept in &out {
            prop_assert!(cursor.any(|f| f.code == kept.code));
        }
    }

    #[test]
    fn inactive_criteria_keep_everything(funds in universe_strategy()) {
        prop_assert_eq!(filter::filter(&funds, &FilterCriteria::default()).len(), funds.len());
    }

    #[test]
    fn similarity_is_symmetric_and_bounded(a in holdings_strategy(), b in holdings_strategy()) {
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        match (ab, ba) {
            (Some(x), Some(y)) => {
                prop_assert!((x - y).abs() < 1e-12);
                prop_assert!((0.0..=1.0).contains(&x));
            }
            (None, None) => {}
            _ => prop_assert!(false, "asymmetric availability"),
        }
    }

    #[test]
    fn self_similarity_is_one(a in holdings_strategy()) {
        if let Some(s) = cosine_similarity(&a, &a) {
            prop_assert!((s - 1.0).abs() < 1e-9);
        }
    }
}
