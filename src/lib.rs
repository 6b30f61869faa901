pub mod cache;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod schema;

pub use error::{DashboardError, Result};
pub use filter::{FilterSelection, FilteredDataset};
pub use loader::{DataLoader, DataSource};
pub use report::KpiReport;
pub use schema::SubscriptionRecord;
