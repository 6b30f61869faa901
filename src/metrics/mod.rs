//! The metrics engine: pure aggregation functions over a [`FilteredDataset`].
//!
//! Every function here is side-effect free and never errors on an empty
//! input — each degrades to its documented sentinel (`None` or 0) so the
//! dashboard can render whatever the filters produce. Split by dashboard
//! section: revenue, subscriber base, engagement, segment performance.

pub mod engagement;
pub mod revenue;
pub mod segments;
pub mod subscribers;

pub use engagement::{
    addon_adoption_pct, avg_ticket_with_addons, subscription_type_mix, TypeMixShare,
};
pub use revenue::{
    addon_contribution_pct, arpu, average_coupon_value, latest, revenue_by_bucket,
    revenue_by_plan, BucketRevenue, PlanRevenue,
};
pub use segments::{
    addon_efficiency_pct, coupon_segmentation, plan_breakdown, revenue_matrix,
    CouponSegmentation, PlanBreakdown, RevenueMatrix,
};
pub use subscribers::{
    active_subscribers, auto_renewal_rate_pct, estimated_churn, monthly_growth,
    most_popular_plan, PlanPopularity,
};

use crate::error::Result;
use polars::prelude::*;

/// Round to a fixed number of decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Null-aware column sum. Empty or all-null columns sum to 0.
pub(crate) fn sum_f64(df: &DataFrame, column: &str) -> Result<f64> {
    Ok(df.column(column)?.f64()?.sum().unwrap_or(0.0))
}

/// Null-aware column mean. `None` when there are no non-null values.
pub(crate) fn mean_f64(df: &DataFrame, column: &str) -> Result<Option<f64>> {
    Ok(df.column(column)?.f64()?.mean())
}

/// Rows where a string column equals `value` exactly (null never matches).
pub(crate) fn count_equal(df: &DataFrame, column: &str, value: &str) -> Result<usize> {
    let ca = df.column(column)?.str()?;
    Ok(ca.into_iter().filter(|v| *v == Some(value)).count())
}

/// Mask of rows holding either add-on pass (null flags count as "No").
pub(crate) fn addon_mask(df: &DataFrame) -> Result<BooleanChunked> {
    let ea = df.column(crate::schema::EA_PLAY_PASS)?.str()?;
    let mc = df.column(crate::schema::MINECRAFT_PASS)?.str()?;
    Ok(ea
        .into_iter()
        .zip(mc)
        .map(|(e, m)| e == Some("Yes") || m == Some("Yes"))
        .collect())
}

/// Mask of rows that used a coupon: `Coupon Value > 0`, null treated as
/// not-greater (those rows land in the no-coupon partition).
pub(crate) fn coupon_used_mask(df: &DataFrame) -> Result<BooleanChunked> {
    let coupons = df.column(crate::schema::COUPON_VALUE)?.f64()?;
    Ok(coupons
        .into_iter()
        .map(|v| v.map_or(false, |c| c > 0.0))
        .collect())
}

/// Group a string key column and sum a value column per group, sorted
/// ascending by key. Null keys are dropped before grouping.
pub(crate) fn grouped_sum(df: &DataFrame, key: &str, value: &str) -> Result<Vec<(String, f64)>> {
    let out = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg([col(value).sum().alias("total")])
        .collect()?;

    let keys = out.column(key)?.str()?;
    let totals = out.column("total")?.f64()?;
    let mut rows = Vec::with_capacity(out.height());
    for i in 0..out.height() {
        if let (Some(k), Some(v)) = (keys.get(i), totals.get(i)) {
            rows.push((k.to_string(), v));
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows)
}

/// Group a string key column and count rows per group, sorted ascending by
/// key. Null keys are dropped before grouping.
pub(crate) fn grouped_count(df: &DataFrame, key: &str) -> Result<Vec<(String, u32)>> {
    let out = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg([len().alias("count")])
        .collect()?;

    let keys = out.column(key)?.str()?;
    let counts = out.column("count")?.u32()?;
    let mut rows = Vec::with_capacity(out.height());
    for i in 0..out.height() {
        if let (Some(k), Some(c)) = (keys.get(i), counts.get(i)) {
            rows.push((k.to_string(), c));
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows)
}
