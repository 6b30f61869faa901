//! Revenue and value KPIs: bucketed revenue series, ARPU, coupon averages,
//! revenue by plan and add-on contribution.

use super::{grouped_sum, mean_f64, sum_f64};
use crate::error::Result;
use crate::filter::FilteredDataset;
use crate::schema::{COUPON_VALUE, EA_PLAY_PASS_PRICE, MINECRAFT_PASS_PRICE, PLAN, TOTAL_VALUE};
use serde::{Deserialize, Serialize};

/// One point of a bucketed revenue series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRevenue {
    pub bucket: String,
    pub revenue: f64,
}

/// Total revenue for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRevenue {
    pub plan: String,
    pub revenue: f64,
}

/// Sum `Total Value` per bucket of `bucket_col` (Month/Quarter/Year),
/// sorted ascending by bucket key. Rows with a null bucket (unparseable
/// start date) are excluded.
pub fn revenue_by_bucket(ds: &FilteredDataset, bucket_col: &str) -> Result<Vec<BucketRevenue>> {
    Ok(grouped_sum(ds.frame(), bucket_col, TOTAL_VALUE)?
        .into_iter()
        .map(|(bucket, revenue)| BucketRevenue { bucket, revenue })
        .collect())
}

/// The last bucket's revenue of a sorted series, or `None` when the series
/// is empty (never an arithmetic error).
pub fn latest(series: &[BucketRevenue]) -> Option<f64> {
    series.last().map(|p| p.revenue)
}

/// Average revenue per user: total revenue over distinct subscribers, with
/// the denominator floored at 1 so an empty set yields 0 rather than a
/// division error.
pub fn arpu(ds: &FilteredDataset) -> Result<f64> {
    let total = sum_f64(ds.frame(), TOTAL_VALUE)?;
    let subscribers = super::subscribers::active_subscribers(ds)?;
    Ok(total / subscribers.max(1) as f64)
}

/// Null-aware mean of `Coupon Value`; `None` when no row carries one.
pub fn average_coupon_value(ds: &FilteredDataset) -> Result<Option<f64>> {
    mean_f64(ds.frame(), COUPON_VALUE)
}

/// Total revenue per plan, sorted by plan name for deterministic output.
pub fn revenue_by_plan(ds: &FilteredDataset) -> Result<Vec<PlanRevenue>> {
    Ok(grouped_sum(ds.frame(), PLAN, TOTAL_VALUE)?
        .into_iter()
        .map(|(plan, revenue)| PlanRevenue { plan, revenue })
        .collect())
}

/// Share of total revenue contributed by the two add-on passes, as a
/// percentage. 0 when total revenue is not positive.
pub fn addon_contribution_pct(ds: &FilteredDataset) -> Result<f64> {
    let ea = sum_f64(ds.frame(), EA_PLAY_PASS_PRICE)?;
    let mc = sum_f64(ds.frame(), MINECRAFT_PASS_PRICE)?;
    let total = sum_f64(ds.frame(), TOTAL_VALUE)?;
    if total > 0.0 {
        Ok((ea + mc) / total * 100.0)
    } else {
        Ok(0.0)
    }
}
