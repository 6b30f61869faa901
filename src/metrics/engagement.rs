//! Engagement and product KPIs: add-on adoption, ticket size with add-ons,
//! subscription-type mix.

use super::{addon_mask, count_equal, grouped_count, mean_f64, round_to};
use crate::error::Result;
use crate::filter::FilteredDataset;
use crate::schema::{SUBSCRIPTION_TYPE, TOTAL_VALUE};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One subscription type's share of the filtered rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMixShare {
    pub subscription_type: String,
    /// Percentage of non-null-type rows, rounded to 1 decimal.
    pub pct: f64,
}

/// Percentage of rows with `flag_column == "Yes"`; 0 when there are no rows.
/// Used for both EA Play and Minecraft adoption.
pub fn addon_adoption_pct(ds: &FilteredDataset, flag_column: &str) -> Result<f64> {
    if ds.is_empty() {
        return Ok(0.0);
    }
    let yes = count_equal(ds.frame(), flag_column, "Yes")?;
    Ok(yes as f64 / ds.row_count() as f64 * 100.0)
}

/// Mean `Total Value` over rows holding at least one add-on pass; `None`
/// when no row does.
pub fn avg_ticket_with_addons(ds: &FilteredDataset) -> Result<Option<f64>> {
    let mask = addon_mask(ds.frame())?;
    let subset = ds.frame().filter(&mask)?;
    if subset.height() == 0 {
        return Ok(None);
    }
    mean_f64(&subset, TOTAL_VALUE)
}

/// Share of rows per subscription type, normalized over non-null-type rows
/// and rounded to 1 decimal. Sorted by share descending, then type name,
/// for deterministic output.
pub fn subscription_type_mix(ds: &FilteredDataset) -> Result<Vec<TypeMixShare>> {
    let counts = grouped_count(ds.frame(), SUBSCRIPTION_TYPE)?;
    let denominator: u32 = counts.iter().map(|(_, c)| c).sum();
    if denominator == 0 {
        return Ok(Vec::new());
    }
    Ok(counts
        .into_iter()
        .map(|(subscription_type, count)| TypeMixShare {
            subscription_type,
            pct: round_to(count as f64 / denominator as f64 * 100.0, 1),
        })
        .sorted_by(|a, b| {
            b.pct
                .partial_cmp(&a.pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.subscription_type.cmp(&b.subscription_type))
        })
        .collect())
}
