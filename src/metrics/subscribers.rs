//! Subscriber-base KPIs: active count, monthly growth, plan popularity,
//! auto-renewal rate and the churn proxy.

use super::{count_equal, grouped_count, round_to};
use crate::error::Result;
use crate::filter::{FilteredDataset, MONTH_COL};
use crate::schema::{AUTO_RENEWAL, PLAN, SUBSCRIBER_ID};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// The most popular plan and its share of active subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPopularity {
    pub plan: String,
    /// Row count of the plan over distinct active subscribers, x100,
    /// rounded to 1 decimal.
    pub share_pct: f64,
}

/// Distinct non-null `Subscriber ID` count.
pub fn active_subscribers(ds: &FilteredDataset) -> Result<usize> {
    Ok(ds.frame().column(SUBSCRIBER_ID)?.drop_nulls().n_unique()?)
}

/// Month-over-month subscriber delta: distinct subscribers per month bucket
/// (sorted ascending), last minus second-to-last. A single bucket reports
/// its own count; no buckets reports 0.
pub fn monthly_growth(ds: &FilteredDataset) -> Result<i64> {
    let out = ds
        .frame()
        .clone()
        .lazy()
        .filter(col(MONTH_COL).is_not_null())
        .group_by([col(MONTH_COL)])
        .agg([col(SUBSCRIBER_ID).drop_nulls().n_unique().alias("subscribers")])
        .collect()?;

    let months = out.column(MONTH_COL)?.str()?;
    let counts = out.column("subscribers")?.u32()?;
    let mut buckets = Vec::with_capacity(out.height());
    for i in 0..out.height() {
        if let (Some(m), Some(c)) = (months.get(i), counts.get(i)) {
            buckets.push((m.to_string(), c as i64));
        }
    }
    buckets.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(match buckets.len() {
        0 => 0,
        1 => buckets[0].1,
        n => buckets[n - 1].1 - buckets[n - 2].1,
    })
}

/// The plan with the most rows, plus its share of active subscribers.
/// Candidates are sorted by plan name first, so ties resolve to the
/// alphabetically first plan. `None` when the filtered set is empty.
pub fn most_popular_plan(ds: &FilteredDataset) -> Result<Option<PlanPopularity>> {
    // grouped_count sorts by plan name, so keeping the first strict maximum
    // resolves ties to the alphabetically first plan.
    let mut best: Option<(String, u32)> = None;
    for (plan, count) in grouped_count(ds.frame(), PLAN)? {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((plan, count));
        }
    }
    let Some((plan, count)) = best else {
        return Ok(None);
    };
    let active = active_subscribers(ds)?.max(1);
    Ok(Some(PlanPopularity {
        plan,
        share_pct: round_to(count as f64 / active as f64 * 100.0, 1),
    }))
}

/// Percentage of rows with `Auto Renewal == "Yes"`; 0 when there are no rows.
pub fn auto_renewal_rate_pct(ds: &FilteredDataset) -> Result<f64> {
    if ds.is_empty() {
        return Ok(0.0);
    }
    let yes = count_equal(ds.frame(), AUTO_RENEWAL, "Yes")?;
    Ok(yes as f64 / ds.row_count() as f64 * 100.0)
}

/// Churn proxy: absolute count of rows with auto-renewal disabled.
pub fn estimated_churn(ds: &FilteredDataset) -> Result<usize> {
    count_equal(ds.frame(), AUTO_RENEWAL, "No")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{records_to_frame, SubscriptionRecord};
    use chrono::NaiveDate;

    fn record(id: &str, plan: &str, auto: &str, date: Option<(i32, u32, u32)>) -> SubscriptionRecord {
        SubscriptionRecord {
            subscriber_id: id.to_string(),
            name: id.to_string(),
            plan: plan.to_string(),
            start_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            auto_renewal: auto.to_string(),
            subscription_price: Some(30.0),
            subscription_type: "Standard".to_string(),
            ea_play_pass: "No".to_string(),
            ea_play_pass_price: None,
            minecraft_pass: "No".to_string(),
            minecraft_pass_price: None,
            coupon_value: Some(0.0),
            total_value: Some(50.0),
        }
    }

    fn dataset(records: &[SubscriptionRecord]) -> FilteredDataset {
        let df = records_to_frame(records).unwrap();
        FilteredDataset::unfiltered(&df).unwrap()
    }

    #[test]
    fn test_active_subscribers_distinct() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Yes", None),
            record("S1", "Ultimate", "Yes", None),
            record("S2", "Core", "No", None),
        ]);
        assert_eq!(active_subscribers(&ds).unwrap(), 2);
    }

    #[test]
    fn test_monthly_growth_delta() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Yes", Some((2024, 3, 1))),
            record("S2", "Core", "Yes", Some((2024, 4, 1))),
            record("S3", "Core", "Yes", Some((2024, 4, 2))),
            record("S4", "Core", "Yes", Some((2024, 4, 20))),
        ]);
        // March: 1 subscriber, April: 3 -> growth = 2.
        assert_eq!(monthly_growth(&ds).unwrap(), 2);
    }

    #[test]
    fn test_monthly_growth_single_bucket_and_empty() {
        let single = dataset(&[
            record("S1", "Ultimate", "Yes", Some((2024, 3, 1))),
            record("S2", "Core", "Yes", Some((2024, 3, 9))),
        ]);
        assert_eq!(monthly_growth(&single).unwrap(), 2);

        let no_dates = dataset(&[record("S1", "Ultimate", "Yes", None)]);
        assert_eq!(monthly_growth(&no_dates).unwrap(), 0);

        let empty = dataset(&[]);
        assert_eq!(monthly_growth(&empty).unwrap(), 0);
    }

    #[test]
    fn test_most_popular_plan_tiebreak_by_name() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Yes", None),
            record("S2", "Core", "Yes", None),
        ]);
        let top = most_popular_plan(&ds).unwrap().unwrap();
        // Equal counts: "Core" beats "Ultimate" alphabetically.
        assert_eq!(top.plan, "Core");
        assert_eq!(top.share_pct, 50.0);
    }

    #[test]
    fn test_most_popular_plan_empty_is_unavailable() {
        let ds = dataset(&[]);
        assert!(most_popular_plan(&ds).unwrap().is_none());
    }

    #[test]
    fn test_renewal_rate_and_churn() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Yes", None),
            record("S2", "Core", "No", None),
            record("S3", "Ultimate", "Yes", None),
        ]);
        let rate = auto_renewal_rate_pct(&ds).unwrap();
        assert!((rate - 66.666_666_666).abs() < 1e-6);
        assert_eq!(estimated_churn(&ds).unwrap(), 1);
    }

    #[test]
    fn test_all_no_means_full_churn() {
        let ds = dataset(&[
            record("S1", "Ultimate", "No", None),
            record("S2", "Core", "No", None),
        ]);
        assert_eq!(auto_renewal_rate_pct(&ds).unwrap(), 0.0);
        assert_eq!(estimated_churn(&ds).unwrap(), 2);
    }
}
