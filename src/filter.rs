//! Filter selections and the filtered dataset the metrics engine runs on.
//!
//! A [`FilterSelection`] is derived once per computation pass and stays
//! immutable; applying it never mutates the source frame. The resulting
//! [`FilteredDataset`] carries the derived Month/Quarter/Year bucket columns
//! so every downstream aggregation shares one pass of date bucketing.

use crate::error::Result;
use crate::schema::{AUTO_RENEWAL, START_DATE, SUBSCRIPTION_TYPE};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Derived bucket column: `Start Date` truncated to month, e.g. "2024-03".
pub const MONTH_COL: &str = "Month";
/// Derived bucket column: calendar quarter, e.g. "2024Q1".
pub const QUARTER_COL: &str = "Quarter";
/// Derived bucket column: calendar year, e.g. "2024".
pub const YEAR_COL: &str = "Year";

/// The user's filter choices: which subscription types and auto-renewal
/// values to keep. Defaults to the full domain observed in the loaded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSelection {
    pub subscription_types: BTreeSet<String>,
    pub auto_renewal_values: BTreeSet<String>,
}

impl FilterSelection {
    /// The full non-null domain observed in the frame (the default
    /// selection, keeping everything).
    pub fn observed(df: &DataFrame) -> Result<Self> {
        Ok(Self {
            subscription_types: observed_values(df, SUBSCRIPTION_TYPE)?,
            auto_renewal_values: observed_values(df, AUTO_RENEWAL)?,
        })
    }

    /// Replace the subscription-type set. An empty iterator leaves the
    /// selection unchanged (matches the "nothing picked = keep all"
    /// behavior of the dashboard multiselects).
    pub fn restrict_types<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let picked: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if !picked.is_empty() {
            self.subscription_types = picked;
        }
        self
    }

    /// Replace the auto-renewal set, same empty-means-all rule.
    pub fn restrict_auto_renewal<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let picked: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if !picked.is_empty() {
            self.auto_renewal_values = picked;
        }
        self
    }
}

fn observed_values(df: &DataFrame, column: &str) -> Result<BTreeSet<String>> {
    let ca = df.column(column)?.str()?;
    Ok(ca.into_iter().flatten().map(str::to_string).collect())
}

/// The subset of rows matching a [`FilterSelection`], with bucket columns
/// attached. Rows whose type or auto-renewal value is null never match.
#[derive(Debug, Clone)]
pub struct FilteredDataset {
    df: DataFrame,
}

impl FilteredDataset {
    /// Filter `df` by set-membership conjunction and derive the bucket
    /// columns. The source frame is left untouched.
    pub fn new(df: &DataFrame, selection: &FilterSelection) -> Result<Self> {
        let types = df.column(SUBSCRIPTION_TYPE)?.str()?;
        let autos = df.column(AUTO_RENEWAL)?.str()?;
        let mask: BooleanChunked = types
            .into_iter()
            .zip(autos)
            .map(|(t, a)| {
                t.map_or(false, |t| selection.subscription_types.contains(t))
                    && a.map_or(false, |a| selection.auto_renewal_values.contains(a))
            })
            .collect();
        let filtered = df.filter(&mask)?;
        Ok(Self {
            df: with_bucket_columns(filtered)?,
        })
    }

    /// The whole frame, unfiltered, with bucket columns attached.
    pub fn unfiltered(df: &DataFrame) -> Result<Self> {
        let selection = FilterSelection::observed(df)?;
        Self::new(df, &selection)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn row_count(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

/// Attach Month/Quarter/Year bucket columns. Rows with a null `Start Date`
/// get null buckets and drop out of date-keyed aggregations.
fn with_bucket_columns(df: DataFrame) -> Result<DataFrame> {
    let date = col(START_DATE);
    let quarter = concat_str(
        [
            date.clone().dt().to_string("%Y"),
            date.clone().dt().quarter().cast(DataType::String),
        ],
        "Q",
        false,
    );
    Ok(df
        .lazy()
        .with_columns([
            date.clone().dt().to_string("%Y-%m").alias(MONTH_COL),
            quarter.alias(QUARTER_COL),
            date.dt().to_string("%Y").alias(YEAR_COL),
        ])
        .collect()?)
}
