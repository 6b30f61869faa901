use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use subscription_insights::filter::{FilterSelection, FilteredDataset};
use subscription_insights::loader::{DataLoader, DataSource};
use subscription_insights::report::KpiReport;
use tracing::info;

#[derive(Parser)]
#[command(name = "subscription-insights")]
#[command(about = "Compute subscription KPIs and aggregate tables from a spreadsheet export")]
struct Args {
    /// Path to the subscriptions CSV (takes precedence over --url)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// URL of the subscriptions CSV (http/https)
    #[arg(long)]
    url: Option<String>,

    /// Default local file consulted when neither --file nor --url is given
    #[arg(long, default_value = "database.csv")]
    default_file: PathBuf,

    /// Keep only these subscription types (repeatable; default: all observed)
    #[arg(long = "subscription-type")]
    subscription_types: Vec<String>,

    /// Keep only these auto-renewal values (repeatable; default: all observed)
    #[arg(long = "auto-renewal")]
    auto_renewal: Vec<String>,

    /// Emit the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let upload = match &args.file {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };
    let source = DataSource::resolve(upload, args.url.as_deref(), &args.default_file)?;

    let mut loader = DataLoader::new();
    let df = loader.load(&source)?;
    info!(rows = df.height(), "dataset ready");

    let selection = FilterSelection::observed(&df)?
        .restrict_types(args.subscription_types)
        .restrict_auto_renewal(args.auto_renewal);
    let ds = FilteredDataset::new(&df, &selection)?;
    info!(rows = ds.row_count(), "filters applied");

    let report = KpiReport::compute(&ds)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(())
}
