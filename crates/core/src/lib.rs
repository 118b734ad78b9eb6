//! ghpush Core Library
//!
//! Fetches hourly GitHub Archive dumps, keeps the configured event types,
//! optionally geocodes actor locations, and writes the result as NDJSON.

pub mod archive;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod geocode;
pub mod paths;
pub mod pipeline;
pub mod types;
pub mod writer;

// Re-export commonly used items at crate root
pub use archive::{ArchiveSource, HttpArchive, archive_url, decode_archive};
pub use config::{DateRange, HourRange, PipelineConfig, load_config, load_config_from};
pub use error::{ConfigError, EnrichmentError, FetchError, GhPushError, ParseError, Result};
pub use filter::{EventFilter, parse_event};
pub use format::{format_duration, format_hour_counts, format_summary_readable};
pub use geocode::{CachingGeocoder, Geocoder, HttpGeocoder, parse_centroid, parse_geocode_response};
pub use paths::{default_config_path, default_output_path, get_output_path};
pub use pipeline::{FailedHour, HourSummary, Pipeline, Progress, RunSummary, run_to_file};
pub use types::{Centroid, Event, GeoFields, HourId, SENTINEL};
pub use writer::EventWriter;
