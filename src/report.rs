//! Assembles every KPI and aggregate table into one [`KpiReport`].
//!
//! The report is a plain value: serializable, comparable, and computed in a
//! single pass with no presentation dependencies. Rendering (text here,
//! charts elsewhere) only ever consumes it.

use crate::error::Result;
use crate::filter::{FilteredDataset, MONTH_COL, QUARTER_COL, YEAR_COL};
use crate::metrics::{
    self, BucketRevenue, CouponSegmentation, PlanBreakdown, PlanPopularity, PlanRevenue,
    RevenueMatrix, TypeMixShare,
};
use crate::schema::{EA_PLAY_PASS, MINECRAFT_PASS};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    // Revenue & value
    pub latest_monthly_revenue: Option<f64>,
    pub latest_annual_revenue: Option<f64>,
    pub arpu: f64,
    pub avg_coupon_value: Option<f64>,
    pub revenue_by_plan: Vec<PlanRevenue>,
    pub addon_contribution_pct: f64,

    // Subscriber base
    pub active_subscribers: usize,
    pub monthly_growth: i64,
    pub most_popular_plan: Option<PlanPopularity>,
    pub auto_renewal_rate_pct: f64,
    pub estimated_churn: usize,

    // Engagement & product
    pub ea_play_adoption_pct: f64,
    pub minecraft_adoption_pct: f64,
    pub avg_ticket_with_addons: Option<f64>,
    pub subscription_type_mix: Vec<TypeMixShare>,

    // Time series
    pub revenue_by_month: Vec<BucketRevenue>,
    pub revenue_by_quarter: Vec<BucketRevenue>,
    pub revenue_by_year: Vec<BucketRevenue>,

    // Segments
    pub plan_breakdown: Vec<PlanBreakdown>,
    pub coupon_segments: CouponSegmentation,
    pub addon_efficiency_pct: Option<f64>,
    pub revenue_matrix: RevenueMatrix,
}

impl KpiReport {
    /// Compute every KPI over one filtered dataset. Pure: identical input
    /// yields an identical report, and empty input degrades to sentinels
    /// instead of erroring.
    pub fn compute(ds: &FilteredDataset) -> Result<Self> {
        let revenue_by_month = metrics::revenue_by_bucket(ds, MONTH_COL)?;
        let revenue_by_quarter = metrics::revenue_by_bucket(ds, QUARTER_COL)?;
        let revenue_by_year = metrics::revenue_by_bucket(ds, YEAR_COL)?;

        let report = Self {
            latest_monthly_revenue: metrics::latest(&revenue_by_month),
            latest_annual_revenue: metrics::latest(&revenue_by_year),
            arpu: metrics::arpu(ds)?,
            avg_coupon_value: metrics::average_coupon_value(ds)?,
            revenue_by_plan: metrics::revenue_by_plan(ds)?,
            addon_contribution_pct: metrics::addon_contribution_pct(ds)?,
            active_subscribers: metrics::active_subscribers(ds)?,
            monthly_growth: metrics::monthly_growth(ds)?,
            most_popular_plan: metrics::most_popular_plan(ds)?,
            auto_renewal_rate_pct: metrics::auto_renewal_rate_pct(ds)?,
            estimated_churn: metrics::estimated_churn(ds)?,
            ea_play_adoption_pct: metrics::addon_adoption_pct(ds, EA_PLAY_PASS)?,
            minecraft_adoption_pct: metrics::addon_adoption_pct(ds, MINECRAFT_PASS)?,
            avg_ticket_with_addons: metrics::avg_ticket_with_addons(ds)?,
            subscription_type_mix: metrics::subscription_type_mix(ds)?,
            revenue_by_month,
            revenue_by_quarter,
            revenue_by_year,
            plan_breakdown: metrics::plan_breakdown(ds)?,
            coupon_segments: metrics::coupon_segmentation(ds)?,
            addon_efficiency_pct: metrics::addon_efficiency_pct(ds)?,
            revenue_matrix: metrics::revenue_matrix(ds)?,
        };
        info!(
            rows = ds.row_count(),
            subscribers = report.active_subscribers,
            "KPI report computed"
        );
        Ok(report)
    }
}

fn money(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}%"),
        None => "N/A".to_string(),
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Revenue & Value ==")?;
        writeln!(f, "Latest monthly revenue:  {}", money(self.latest_monthly_revenue))?;
        writeln!(f, "Latest annual revenue:   {}", money(self.latest_annual_revenue))?;
        writeln!(f, "ARPU:                    {:.2}", self.arpu)?;
        writeln!(f, "Avg coupon value:        {}", money(self.avg_coupon_value))?;
        writeln!(f, "Add-on contribution:     {:.2}%", self.addon_contribution_pct)?;
        writeln!(f, "Revenue by plan:")?;
        for row in &self.revenue_by_plan {
            writeln!(f, "  {:<12} {:.2}", row.plan, row.revenue)?;
        }

        writeln!(f, "\n== Subscriber Base ==")?;
        writeln!(f, "Active subscribers:      {}", self.active_subscribers)?;
        writeln!(f, "Monthly growth:          {}", self.monthly_growth)?;
        match &self.most_popular_plan {
            Some(p) => writeln!(f, "Most popular plan:       {} ({}%)", p.plan, p.share_pct)?,
            None => writeln!(f, "Most popular plan:       N/A")?,
        }
        writeln!(f, "Auto-renewal rate:       {:.2}%", self.auto_renewal_rate_pct)?;
        writeln!(f, "Estimated churn:         {}", self.estimated_churn)?;

        writeln!(f, "\n== Engagement & Product ==")?;
        writeln!(f, "EA Play adoption:        {:.2}%", self.ea_play_adoption_pct)?;
        writeln!(f, "Minecraft adoption:      {:.2}%", self.minecraft_adoption_pct)?;
        writeln!(f, "Avg ticket w/ add-ons:   {}", money(self.avg_ticket_with_addons))?;
        writeln!(f, "Subscription type mix:")?;
        for row in &self.subscription_type_mix {
            writeln!(f, "  {:<12} {}%", row.subscription_type, row.pct)?;
        }

        writeln!(f, "\n== Time Series ==")?;
        writeln!(f, "Revenue by start month:")?;
        for row in &self.revenue_by_month {
            writeln!(f, "  {:<8} {:.2}", row.bucket, row.revenue)?;
        }
        writeln!(f, "Revenue by quarter:")?;
        for row in &self.revenue_by_quarter {
            writeln!(f, "  {:<8} {:.2}", row.bucket, row.revenue)?;
        }

        writeln!(f, "\n== Segment Performance ==")?;
        for row in &self.plan_breakdown {
            writeln!(
                f,
                "  {:<12} avg ticket {} | renewal {:.2}% | avg coupon {}",
                row.plan,
                money(row.avg_total_value),
                row.auto_renewal_pct,
                money(row.avg_coupon_value),
            )?;
        }

        writeln!(f, "\n== Commercial Efficiency ==")?;
        let seg = &self.coupon_segments;
        writeln!(f, "Avg ticket with coupon:  {}", money(seg.avg_ticket_with_coupon))?;
        writeln!(f, "Avg ticket w/o coupon:   {}", money(seg.avg_ticket_without_coupon))?;
        writeln!(f, "Net revenue:             {:.2}", seg.net_revenue)?;
        writeln!(f, "Retention with coupon:   {}", pct(seg.retention_with_coupon_pct))?;
        writeln!(f, "Retention w/o coupon:    {}", pct(seg.retention_without_coupon_pct))?;
        writeln!(f, "Add-on efficiency:       {}", pct(self.addon_efficiency_pct))?;

        writeln!(f, "\n== Revenue Matrix (plan x type) ==")?;
        write!(f, "  {:<12}", "")?;
        for t in &self.revenue_matrix.subscription_types {
            write!(f, "{t:<12}")?;
        }
        writeln!(f)?;
        for (plan, row) in self
            .revenue_matrix
            .plans
            .iter()
            .zip(&self.revenue_matrix.values)
        {
            write!(f, "  {plan:<12}")?;
            for v in row {
                write!(f, "{v:<12.2}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{records_to_frame, SubscriptionRecord};

    fn record(id: &str, plan: &str, auto: &str, total: f64) -> SubscriptionRecord {
        SubscriptionRecord {
            subscriber_id: id.to_string(),
            name: id.to_string(),
            plan: plan.to_string(),
            start_date: None,
            auto_renewal: auto.to_string(),
            subscription_price: Some(30.0),
            subscription_type: "Standard".to_string(),
            ea_play_pass: "No".to_string(),
            ea_play_pass_price: None,
            minecraft_pass: "No".to_string(),
            minecraft_pass_price: None,
            coupon_value: Some(0.0),
            total_value: Some(total),
        }
    }

    #[test]
    fn test_text_render_mentions_sentinels() {
        let df = records_to_frame(&[record("S1", "Ultimate", "No", 50.0)]).unwrap();
        let ds = FilteredDataset::unfiltered(&df).unwrap();
        let report = KpiReport::compute(&ds).unwrap();
        let text = report.to_string();
        // No dates, no add-ons in this dataset.
        assert!(text.contains("Latest monthly revenue:  N/A"));
        assert!(text.contains("Avg ticket w/ add-ons:   N/A"));
        assert!(text.contains("Estimated churn:         1"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let df = records_to_frame(&[record("S1", "Ultimate", "Yes", 50.0)]).unwrap();
        let ds = FilteredDataset::unfiltered(&df).unwrap();
        let report = KpiReport::compute(&ds).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"arpu\":50.0"));
        assert!(json.contains("\"latest_monthly_revenue\":null"));
    }
}
