use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Archive {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Temporary download file for {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decompression failed for {url}: {source}")]
    Decompress {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decompression task for {url} did not complete: {reason}")]
    Join { url: String, reason: String },
}

#[derive(Error, Debug)]
#[error("Malformed event line `{excerpt}`: {source}")]
pub struct ParseError {
    pub excerpt: String,
    #[source]
    pub source: serde_json::Error,
}

impl ParseError {
    const EXCERPT_LEN: usize = 80;

    pub fn new(line: &str, source: serde_json::Error) -> Self {
        let excerpt = if line.chars().count() > Self::EXCERPT_LEN {
            let head: String = line.chars().take(Self::EXCERPT_LEN).collect();
            format!("{head}...")
        } else {
            line.to_string()
        };
        Self { excerpt, source }
    }
}

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geocoding response is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No geocoding match for {place:?}")]
    NotFound { place: String },

    #[error("Geocoding response is missing `{field}`")]
    MissingField { field: &'static str },

    #[error("Unparseable centroid {centroid:?}")]
    BadCentroid { centroid: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config file {path} does not exist")]
    Missing { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

#[derive(Error, Debug)]
pub enum GhPushError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GhPushError {
    /// Failures confined to one archive hour; anything else (output IO, config) ends the run.
    pub fn is_hour_local(&self) -> bool {
        matches!(self, GhPushError::Fetch(_) | GhPushError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, GhPushError>;
