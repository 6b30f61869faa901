//! Segment-performance KPIs: per-plan breakdown, coupon-usage segmentation,
//! add-on efficiency and the plan x subscription-type revenue matrix.

use super::{addon_mask, count_equal, coupon_used_mask, round_to, sum_f64};
use crate::error::Result;
use crate::filter::FilteredDataset;
use crate::schema::{
    AUTO_RENEWAL, COUPON_VALUE, EA_PLAY_PASS_PRICE, MINECRAFT_PASS_PRICE, PLAN,
    SUBSCRIPTION_PRICE, SUBSCRIPTION_TYPE, TOTAL_VALUE,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-plan performance row: average ticket, auto-renewal share, average
/// coupon. All rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanBreakdown {
    pub plan: String,
    pub avg_total_value: Option<f64>,
    pub auto_renewal_pct: f64,
    pub avg_coupon_value: Option<f64>,
}

/// Coupon-usage segmentation of the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponSegmentation {
    /// Mean ticket of rows with `Coupon Value > 0`; `None` when none exist.
    pub avg_ticket_with_coupon: Option<f64>,
    /// Mean ticket of the remaining rows (null coupons land here).
    pub avg_ticket_without_coupon: Option<f64>,
    /// `sum(Total Value) - sum(Coupon Value)` over the whole filtered set.
    /// Always computable; negative when the data is inconsistent.
    pub net_revenue: f64,
    /// Auto-renewal share inside the coupon partition. `None` when the
    /// partition is empty or the share is exactly 0 (the dashboard has
    /// always displayed both cases as N/A).
    pub retention_with_coupon_pct: Option<f64>,
    /// Same, for the no-coupon partition.
    pub retention_without_coupon_pct: Option<f64>,
}

/// Revenue summed per (plan, subscription type) pair, pivoted for heatmap
/// rendering. `plans` are the row labels, `subscription_types` the column
/// labels, both sorted lexicographically; missing combinations are 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueMatrix {
    pub plans: Vec<String>,
    pub subscription_types: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Per-plan averages and auto-renewal share, sorted by plan name. Null
/// auto-renewal values count toward the denominator (they are not "Yes").
pub fn plan_breakdown(ds: &FilteredDataset) -> Result<Vec<PlanBreakdown>> {
    let out = ds
        .frame()
        .clone()
        .lazy()
        .filter(col(PLAN).is_not_null())
        .group_by([col(PLAN)])
        .agg([
            col(TOTAL_VALUE).mean().alias("avg_total"),
            (col(AUTO_RENEWAL)
                .eq(lit("Yes"))
                .fill_null(lit(false))
                .cast(DataType::Float64)
                .mean()
                * lit(100.0))
            .alias("renewal_pct"),
            col(COUPON_VALUE).mean().alias("avg_coupon"),
        ])
        .collect()?;

    let plans = out.column(PLAN)?.str()?;
    let avg_totals = out.column("avg_total")?.f64()?;
    let renewal_pcts = out.column("renewal_pct")?.f64()?;
    let avg_coupons = out.column("avg_coupon")?.f64()?;

    let mut rows = Vec::with_capacity(out.height());
    for i in 0..out.height() {
        let Some(plan) = plans.get(i) else { continue };
        rows.push(PlanBreakdown {
            plan: plan.to_string(),
            avg_total_value: avg_totals.get(i).map(|v| round_to(v, 2)),
            auto_renewal_pct: round_to(renewal_pcts.get(i).unwrap_or(0.0), 2),
            avg_coupon_value: avg_coupons.get(i).map(|v| round_to(v, 2)),
        });
    }
    rows.sort_by(|a, b| a.plan.cmp(&b.plan));
    Ok(rows)
}

/// Partition rows by coupon usage and compare tickets, retention and net
/// revenue. Net revenue needs no partition guard.
pub fn coupon_segmentation(ds: &FilteredDataset) -> Result<CouponSegmentation> {
    let used = coupon_used_mask(ds.frame())?;
    let not_used = !&used;
    let with_coupon = ds.frame().filter(&used)?;
    let without_coupon = ds.frame().filter(&not_used)?;

    let net_revenue =
        sum_f64(ds.frame(), TOTAL_VALUE)? - sum_f64(ds.frame(), COUPON_VALUE)?;

    Ok(CouponSegmentation {
        avg_ticket_with_coupon: partition_mean(&with_coupon)?,
        avg_ticket_without_coupon: partition_mean(&without_coupon)?,
        net_revenue,
        retention_with_coupon_pct: partition_retention(&with_coupon)?,
        retention_without_coupon_pct: partition_retention(&without_coupon)?,
    })
}

fn partition_mean(partition: &DataFrame) -> Result<Option<f64>> {
    if partition.height() == 0 {
        return Ok(None);
    }
    Ok(partition.column(TOTAL_VALUE)?.f64()?.mean())
}

/// Renewal share of one partition. A share of exactly 0 reports `None`,
/// matching the dashboard's long-standing display behavior.
fn partition_retention(partition: &DataFrame) -> Result<Option<f64>> {
    if partition.height() == 0 {
        return Ok(None);
    }
    let yes = count_equal(partition, AUTO_RENEWAL, "Yes")?;
    let pct = yes as f64 / partition.height() as f64 * 100.0;
    Ok(if pct == 0.0 { None } else { Some(pct) })
}

/// Add-on revenue over base subscription revenue, restricted to rows that
/// hold at least one pass, as a percentage. `None` when no such rows exist
/// or their base revenue is not positive.
pub fn addon_efficiency_pct(ds: &FilteredDataset) -> Result<Option<f64>> {
    let mask = addon_mask(ds.frame())?;
    let subset = ds.frame().filter(&mask)?;
    if subset.height() == 0 {
        return Ok(None);
    }
    let base = sum_f64(&subset, SUBSCRIPTION_PRICE)?;
    if base <= 0.0 {
        return Ok(None);
    }
    let addons = sum_f64(&subset, EA_PLAY_PASS_PRICE)? + sum_f64(&subset, MINECRAFT_PASS_PRICE)?;
    Ok(Some(addons / base * 100.0))
}

/// Sum `Total Value` per (plan, type) pair and pivot, filling missing
/// combinations with 0. Null plan or type rows are dropped.
pub fn revenue_matrix(ds: &FilteredDataset) -> Result<RevenueMatrix> {
    let out = ds
        .frame()
        .clone()
        .lazy()
        .filter(col(PLAN).is_not_null().and(col(SUBSCRIPTION_TYPE).is_not_null()))
        .group_by([col(PLAN), col(SUBSCRIPTION_TYPE)])
        .agg([col(TOTAL_VALUE).sum().alias("revenue")])
        .collect()?;

    let plans_col = out.column(PLAN)?.str()?;
    let types_col = out.column(SUBSCRIPTION_TYPE)?.str()?;
    let revenues = out.column("revenue")?.f64()?;

    let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
    for i in 0..out.height() {
        if let (Some(p), Some(t), Some(r)) = (plans_col.get(i), types_col.get(i), revenues.get(i))
        {
            cells.insert((p.to_string(), t.to_string()), r);
        }
    }

    let plans: Vec<String> = cells
        .keys()
        .map(|(p, _)| p.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let subscription_types: Vec<String> = cells
        .keys()
        .map(|(_, t)| t.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = plans
        .iter()
        .map(|p| {
            subscription_types
                .iter()
                .map(|t| {
                    cells
                        .get(&(p.clone(), t.clone()))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    Ok(RevenueMatrix {
        plans,
        subscription_types,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{records_to_frame, SubscriptionRecord};

    fn record(
        id: &str,
        plan: &str,
        sub_type: &str,
        auto: &str,
        total: Option<f64>,
        coupon: Option<f64>,
    ) -> SubscriptionRecord {
        SubscriptionRecord {
            subscriber_id: id.to_string(),
            name: id.to_string(),
            plan: plan.to_string(),
            start_date: None,
            auto_renewal: auto.to_string(),
            subscription_price: Some(30.0),
            subscription_type: sub_type.to_string(),
            ea_play_pass: "No".to_string(),
            ea_play_pass_price: None,
            minecraft_pass: "No".to_string(),
            minecraft_pass_price: None,
            coupon_value: coupon,
            total_value: total,
        }
    }

    fn dataset(records: &[SubscriptionRecord]) -> FilteredDataset {
        let df = records_to_frame(records).unwrap();
        FilteredDataset::unfiltered(&df).unwrap()
    }

    #[test]
    fn test_plan_breakdown_rounding_and_order() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Standard", "Yes", Some(50.0), Some(0.0)),
            record("S2", "Ultimate", "Standard", "No", Some(70.0), Some(10.0)),
            record("S3", "Core", "Standard", "No", Some(30.0), Some(5.0)),
        ]);
        let rows = plan_breakdown(&ds).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].plan, "Core");
        assert_eq!(rows[0].auto_renewal_pct, 0.0);
        assert_eq!(rows[1].plan, "Ultimate");
        assert_eq!(rows[1].avg_total_value, Some(60.0));
        assert_eq!(rows[1].auto_renewal_pct, 50.0);
        assert_eq!(rows[1].avg_coupon_value, Some(5.0));
    }

    #[test]
    fn test_coupon_segmentation_null_coupon_is_no_coupon() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Standard", "Yes", Some(50.0), Some(5.0)),
            record("S2", "Core", "Standard", "Yes", Some(30.0), None),
            record("S3", "Core", "Standard", "Yes", Some(40.0), Some(0.0)),
        ]);
        let seg = coupon_segmentation(&ds).unwrap();
        assert_eq!(seg.avg_ticket_with_coupon, Some(50.0));
        assert_eq!(seg.avg_ticket_without_coupon, Some(35.0));
        assert_eq!(seg.net_revenue, 120.0 - 5.0);
    }

    #[test]
    fn test_retention_zero_reported_as_unavailable() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Standard", "No", Some(50.0), Some(5.0)),
            record("S2", "Core", "Standard", "Yes", Some(30.0), None),
        ]);
        let seg = coupon_segmentation(&ds).unwrap();
        // The coupon partition renews 0% of the time: reported unavailable.
        assert_eq!(seg.retention_with_coupon_pct, None);
        assert_eq!(seg.retention_without_coupon_pct, Some(100.0));
    }

    #[test]
    fn test_net_revenue_identity_without_coupons() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Standard", "Yes", Some(50.0), Some(0.0)),
            record("S2", "Core", "Standard", "Yes", Some(30.0), Some(0.0)),
        ]);
        let seg = coupon_segmentation(&ds).unwrap();
        assert_eq!(seg.net_revenue, 80.0);
    }

    #[test]
    fn test_addon_efficiency_unavailable_without_addons() {
        let ds = dataset(&[record("S1", "Ultimate", "Standard", "Yes", Some(50.0), None)]);
        assert_eq!(addon_efficiency_pct(&ds).unwrap(), None);
    }

    #[test]
    fn test_addon_efficiency() {
        let mut rec = record("S1", "Ultimate", "Standard", "Yes", Some(50.0), None);
        rec.ea_play_pass = "Yes".to_string();
        rec.ea_play_pass_price = Some(10.0);
        rec.minecraft_pass_price = Some(5.0);
        let ds = dataset(&[rec]);
        // (10 + 5) / 30 = 50%
        assert_eq!(addon_efficiency_pct(&ds).unwrap(), Some(50.0));
    }

    #[test]
    fn test_revenue_matrix_fills_missing_with_zero() {
        let ds = dataset(&[
            record("S1", "Ultimate", "Standard", "Yes", Some(50.0), None),
            record("S2", "Ultimate", "Premium", "Yes", Some(70.0), None),
            record("S3", "Core", "Standard", "Yes", Some(30.0), None),
        ]);
        let matrix = revenue_matrix(&ds).unwrap();
        assert_eq!(matrix.plans, vec!["Core", "Ultimate"]);
        assert_eq!(matrix.subscription_types, vec!["Premium", "Standard"]);
        // Core has no Premium rows: filled with 0.
        assert_eq!(matrix.values, vec![vec![0.0, 30.0], vec![70.0, 50.0]]);
    }
}
