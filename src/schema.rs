//! Source-table schema: canonical column names, header normalization,
//! required-column validation and dtype coercion.
//!
//! The loader hands every parsed frame through [`normalize_column_names`],
//! [`validate_required_columns`] and [`coerce_column_types`] before anything
//! downstream sees it, so the metrics engine can assume a fixed schema.

use crate::error::{DashboardError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const SUBSCRIBER_ID: &str = "Subscriber ID";
pub const NAME: &str = "Name";
pub const PLAN: &str = "Plan";
pub const START_DATE: &str = "Start Date";
pub const AUTO_RENEWAL: &str = "Auto Renewal";
pub const SUBSCRIPTION_PRICE: &str = "Subscription Price";
pub const SUBSCRIPTION_TYPE: &str = "Subscription Type";
pub const EA_PLAY_PASS: &str = "EA Play Season Pass";
pub const EA_PLAY_PASS_PRICE: &str = "EA Play Season Pass Price";
pub const MINECRAFT_PASS: &str = "Minecraft Season Pass";
pub const MINECRAFT_PASS_PRICE: &str = "Minecraft Season Pass Price";
pub const COUPON_VALUE: &str = "Coupon Value";
pub const TOTAL_VALUE: &str = "Total Value";

/// Every column the source spreadsheet must provide (after normalization).
pub const REQUIRED_COLUMNS: [&str; 13] = [
    SUBSCRIBER_ID,
    NAME,
    PLAN,
    START_DATE,
    AUTO_RENEWAL,
    SUBSCRIPTION_PRICE,
    SUBSCRIPTION_TYPE,
    EA_PLAY_PASS,
    EA_PLAY_PASS_PRICE,
    MINECRAFT_PASS,
    MINECRAFT_PASS_PRICE,
    COUPON_VALUE,
    TOTAL_VALUE,
];

/// Columns coerced to Float64 on load. Unparseable values become null,
/// never zero, so null-aware sums and means stay honest.
pub const NUMERIC_COLUMNS: [&str; 5] = [
    SUBSCRIPTION_PRICE,
    EA_PLAY_PASS_PRICE,
    MINECRAFT_PASS_PRICE,
    COUPON_VALUE,
    TOTAL_VALUE,
];

/// One row of the source table, in typed form.
///
/// The engine itself works on dataframes; this struct exists for embedders
/// and tests that already hold typed rows ([`records_to_frame`] turns them
/// into a schema-correct frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscriber_id: String,
    pub name: String,
    pub plan: String,
    pub start_date: Option<NaiveDate>,
    pub auto_renewal: String,
    pub subscription_price: Option<f64>,
    pub subscription_type: String,
    pub ea_play_pass: String,
    pub ea_play_pass_price: Option<f64>,
    pub minecraft_pass: String,
    pub minecraft_pass_price: Option<f64>,
    pub coupon_value: Option<f64>,
    pub total_value: Option<f64>,
}

/// Trim surrounding whitespace and collapse embedded newlines to one space.
pub fn clean_column_name(name: &str) -> String {
    name.trim().replace('\n', " ")
}

/// Rename every column through [`clean_column_name`].
pub fn normalize_column_names(mut df: DataFrame) -> Result<DataFrame> {
    let cleaned: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(clean_column_name)
        .collect();
    df.set_column_names(&cleaned)?;
    Ok(df)
}

/// Reject the frame unless all required columns are present, naming the
/// missing ones in the error.
pub fn validate_required_columns(df: &DataFrame) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.iter().any(|p| p == *c))
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DashboardError::MissingColumns(missing.join(", ")))
    }
}

/// Coerce price/value columns to Float64 and `Start Date` to a Date column.
/// Both casts are non-strict: values that fail coercion become null.
pub fn coerce_column_types(df: DataFrame) -> Result<DataFrame> {
    let date_expr = match df.column(START_DATE)?.dtype() {
        DataType::Date => col(START_DATE),
        DataType::Datetime(_, _) => col(START_DATE).cast(DataType::Date),
        _ => col(START_DATE).cast(DataType::String).str().to_date(StrptimeOptions {
            strict: false,
            ..Default::default()
        }),
    };

    let mut exprs: Vec<Expr> = NUMERIC_COLUMNS
        .iter()
        .map(|c| col(*c).cast(DataType::Float64))
        .collect();
    exprs.push(date_expr);

    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Build a schema-correct frame from typed records.
pub fn records_to_frame(records: &[SubscriptionRecord]) -> Result<DataFrame> {
    let ids: Vec<&str> = records.iter().map(|r| r.subscriber_id.as_str()).collect();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let plans: Vec<&str> = records.iter().map(|r| r.plan.as_str()).collect();
    let autos: Vec<&str> = records.iter().map(|r| r.auto_renewal.as_str()).collect();
    let types: Vec<&str> = records.iter().map(|r| r.subscription_type.as_str()).collect();
    let ea_flags: Vec<&str> = records.iter().map(|r| r.ea_play_pass.as_str()).collect();
    let mc_flags: Vec<&str> = records.iter().map(|r| r.minecraft_pass.as_str()).collect();

    let dates = DateChunked::from_naive_date_options(
        START_DATE,
        records.iter().map(|r| r.start_date),
    )
    .into_series();

    let df = DataFrame::new(vec![
        Series::new(SUBSCRIBER_ID, ids),
        Series::new(NAME, names),
        Series::new(PLAN, plans),
        dates,
        Series::new(AUTO_RENEWAL, autos),
        Series::new(
            SUBSCRIPTION_PRICE,
            records.iter().map(|r| r.subscription_price).collect::<Vec<_>>(),
        ),
        Series::new(SUBSCRIPTION_TYPE, types),
        Series::new(EA_PLAY_PASS, ea_flags),
        Series::new(
            EA_PLAY_PASS_PRICE,
            records.iter().map(|r| r.ea_play_pass_price).collect::<Vec<_>>(),
        ),
        Series::new(MINECRAFT_PASS, mc_flags),
        Series::new(
            MINECRAFT_PASS_PRICE,
            records.iter().map(|r| r.minecraft_pass_price).collect::<Vec<_>>(),
        ),
        Series::new(
            COUPON_VALUE,
            records.iter().map(|r| r.coupon_value).collect::<Vec<_>>(),
        ),
        Series::new(
            TOTAL_VALUE,
            records.iter().map(|r| r.total_value).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}
