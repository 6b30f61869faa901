//! Data loader: turns an external spreadsheet into a validated frame.
//!
//! Exactly one source is consulted per load, in priority order: uploaded
//! bytes, then a remote URL, then a default local file. Every source flows
//! through the same byte-level entry point, so the content-addressed cache
//! covers all of them. Loading is single-shot: any failure aborts the run
//! with a [`DashboardError`], there are no partial results.

use crate::cache::FrameCache;
use crate::error::{DashboardError, Result};
use crate::schema;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default HTTP timeout for URL sources.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the spreadsheet comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Raw bytes handed in by the caller (an uploaded file).
    Upload(Vec<u8>),
    /// A remote file fetched over HTTP/HTTPS.
    Remote(String),
    /// A file on the local filesystem.
    LocalFile(PathBuf),
}

impl DataSource {
    /// Pick one source by the documented precedence: uploaded bytes beat a
    /// URL, a URL beats the default local file. With nothing available the
    /// run aborts with a guidance message.
    pub fn resolve(
        upload: Option<Vec<u8>>,
        url: Option<&str>,
        default_path: &Path,
    ) -> Result<Self> {
        if let Some(bytes) = upload {
            return Ok(DataSource::Upload(bytes));
        }
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(DataSource::Remote(url.to_string()));
        }
        if default_path.exists() {
            return Ok(DataSource::LocalFile(default_path.to_path_buf()));
        }
        Err(DashboardError::NoSource(
            default_path.display().to_string(),
        ))
    }
}

/// Parses, validates and memoizes subscription spreadsheets.
pub struct DataLoader {
    timeout: Duration,
    cache: FrameCache,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            cache: FrameCache::new(),
        }
    }

    /// Override the HTTP timeout for remote sources.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of distinct payloads parsed so far.
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    /// Load one source into a validated, type-coerced frame.
    pub fn load(&mut self, source: &DataSource) -> Result<DataFrame> {
        match source {
            DataSource::Upload(bytes) => self.load_bytes(bytes),
            DataSource::Remote(url) => {
                let bytes = self.fetch(url)?;
                self.load_bytes(&bytes)
            }
            DataSource::LocalFile(path) => {
                info!(path = %path.display(), "reading local spreadsheet");
                let bytes = std::fs::read(path)?;
                self.load_bytes(&bytes)
            }
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!(url, "fetching remote spreadsheet");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DashboardError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| DashboardError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let bytes = response.bytes().map_err(|e| DashboardError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Parse raw bytes, memoized on the payload fingerprint.
    fn load_bytes(&mut self, bytes: &[u8]) -> Result<DataFrame> {
        if let Some(frame) = self.cache.get(bytes) {
            info!(rows = frame.height(), "spreadsheet served from cache");
            return Ok(frame);
        }
        let df = parse_and_validate(bytes)?;
        info!(
            rows = df.height(),
            columns = df.width(),
            "spreadsheet loaded"
        );
        self.cache.insert(bytes, df.clone());
        Ok(df)
    }
}

/// Full parse pipeline: CSV -> normalized headers -> required-column check
/// -> numeric/date coercion.
fn parse_and_validate(bytes: &[u8]) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| DashboardError::Parse(e.to_string()))?;
    let df = schema::normalize_column_names(df)?;
    schema::validate_required_columns(&df)?;
    schema::coerce_column_types(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
 Subscriber ID ,Name,Plan,Start Date,Auto Renewal,Subscription Price,Subscription Type,EA Play Season Pass,EA Play Season Pass Price,Minecraft Season Pass,Minecraft Season Pass Price,Coupon Value, Total Value \n\
S1,Alice,Ultimate,2024-03-15,Yes,30,Standard,Yes,10,No,,0,50\n\
S2,Bob,Core,bad-date,No,20,Standard,No,,No,,5,30\n\
S3,Carol,Ultimate,2024-04-02,Yes,30,Premium,No,,Yes,8,not-a-number,70\n";

    #[test]
    fn test_load_from_upload_bytes() {
        let mut loader = DataLoader::new();
        let df = loader
            .load(&DataSource::Upload(SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(df.height(), 3);
        // Headers with stray whitespace are normalized.
        assert!(df.column(schema::SUBSCRIBER_ID).is_ok());
        assert!(df.column(schema::TOTAL_VALUE).is_ok());
        // Bad date and bad numeric degrade to null.
        assert_eq!(df.column(schema::START_DATE).unwrap().null_count(), 1);
        assert_eq!(df.column(schema::COUPON_VALUE).unwrap().null_count(), 1);
    }

    #[test]
    fn test_load_from_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        let mut loader = DataLoader::new();
        let df = loader
            .load(&DataSource::LocalFile(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_missing_columns_abort_with_names() {
        let csv = "Subscriber ID,Plan\nS1,Ultimate\n";
        let mut loader = DataLoader::new();
        let err = loader
            .load(&DataSource::Upload(csv.as_bytes().to_vec()))
            .unwrap_err();
        match err {
            DashboardError::MissingColumns(cols) => {
                assert!(cols.contains("Total Value"));
                assert!(cols.contains("Auto Renewal"));
            }
            other => panic!("expected MissingColumns, got {other}"),
        }
    }

    #[test]
    fn test_identical_bytes_are_memoized() {
        let mut loader = DataLoader::new();
        let source = DataSource::Upload(SAMPLE_CSV.as_bytes().to_vec());
        loader.load(&source).unwrap();
        loader.load(&source).unwrap();
        assert_eq!(loader.cached_frames(), 1);
    }

    #[test]
    fn test_source_precedence() {
        let upload = Some(b"bytes".to_vec());
        let missing = Path::new("definitely-not-here.csv");

        let src = DataSource::resolve(upload.clone(), Some("http://x/y.csv"), missing).unwrap();
        assert!(matches!(src, DataSource::Upload(_)));

        let src = DataSource::resolve(None, Some("http://x/y.csv"), missing).unwrap();
        assert_eq!(src, DataSource::Remote("http://x/y.csv".to_string()));

        let err = DataSource::resolve(None, None, missing).unwrap_err();
        assert!(matches!(err, DashboardError::NoSource(_)));
    }
}
