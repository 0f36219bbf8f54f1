use anyhow::{Context, Result, bail};
use flate2::read::MultiGzDecoder;
use futures::TryStreamExt;
use reqwest::{Client, Url};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::debug;

pub const DEFAULT_URL_PREFIX: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow";

/// Location of the monthly yellow taxi file under `prefix`.
pub fn monthly_url(prefix: &str, year: u16, month: u8) -> String {
    format!(
        "{}/yellow_tripdata_{:04}-{:02}.csv.gz",
        prefix.trim_end_matches('/'),
        year,
        month
    )
}

/// Where delimited text is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    pub fn parse(location: &str) -> Result<Source> {
        let location = location.trim();
        if location.is_empty() {
            bail!("Source location must not be empty.");
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            let url = Url::parse(location).with_context(|| format!("Invalid source url {location}"))?;
            return Ok(Source::Http(url));
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        Ok(Source::File(PathBuf::from(path)))
    }

    pub fn monthly(prefix: &str, year: u16, month: u8) -> Result<Source> {
        Source::parse(&monthly_url(prefix, year, month))
    }

    pub fn is_gzip(&self) -> bool {
        match self {
            Source::Http(url) => url.path().ends_with(".gz"),
            Source::File(path) => path.extension().is_some_and(|ext| ext == "gz"),
        }
    }

    /// Opens the raw byte stream. HTTP errors and non-success statuses surface here,
    /// before anything is decoded. The returned reader blocks, so it must only be
    /// read from the blocking pool.
    pub async fn open(&self, client: &Client) -> Result<Box<dyn Read + Send>> {
        match self {
            Source::Http(url) => {
                debug!(%url, "requesting source");
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .with_context(|| format!("Could not fetch {url}"))?
                    .error_for_status()
                    .with_context(|| format!("Could not fetch {url}"))?;
                let stream = Box::pin(response.bytes_stream().map_err(io::Error::other));
                Ok(Box::new(SyncIoBridge::new(StreamReader::new(stream))))
            }
            Source::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Could not open {}", path.display()))?;
                Ok(Box::new(file))
            }
        }
    }

    /// Wraps `raw` in a decompressor when the location names a compressed file.
    pub fn decode(&self, raw: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
        if self.is_gzip() {
            Box::new(MultiGzDecoder::new(raw))
        } else {
            raw
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Http(url) => write!(f, "{url}"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}
