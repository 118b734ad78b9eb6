#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Write,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use ghpush_core::{
    ArchiveSource, Centroid, EnrichmentError, FetchError, HourId, HourRange, PipelineConfig,
    decode_archive,
};
use serde_json::Value;

pub fn gzip_lines(lines: &[&str]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        encoder.write_all(line.as_bytes()).unwrap();
        encoder.write_all(b"\n").unwrap();
    }
    encoder.finish().unwrap()
}

/// Serves gzip bodies from memory keyed by hour id (`2014-11-01-0`)
#[derive(Default)]
pub struct StubArchive {
    hours: HashMap<String, Vec<u8>>,
    pub fetches: AtomicUsize,
}

impl StubArchive {
    pub fn with_hour(mut self, hour: &str, lines: &[&str]) -> Self {
        self.hours.insert(hour.to_string(), gzip_lines(lines));
        self
    }

    pub fn with_raw_hour(mut self, hour: &str, bytes: Vec<u8>) -> Self {
        self.hours.insert(hour.to_string(), bytes);
        self
    }
}

#[async_trait]
impl ArchiveSource for StubArchive {
    async fn fetch(&self, hour: &HourId) -> Result<Vec<String>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let url = format!("stub://{}", hour.file_name());
        let Some(bytes) = self.hours.get(&hour.to_string()) else {
            return Err(FetchError::Status {
                url,
                status: reqwest::StatusCode::NOT_FOUND,
            });
        };
        decode_archive(bytes.as_slice()).map_err(|source| FetchError::Decompress { url, source })
    }
}

/// Answers from a fixed table; everything else is a miss
#[derive(Default)]
pub struct StubGeocoder {
    places: HashMap<String, Centroid>,
    pub calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn with_place(mut self, place: &str, lat: f64, lon: f64, country: &str) -> Self {
        self.places.insert(
            place.to_string(),
            Centroid {
                lat,
                lon,
                country: country.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ghpush_core::Geocoder for StubGeocoder {
    async fn geocode(&self, place: &str) -> Result<Centroid, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.places
            .get(place)
            .cloned()
            .ok_or_else(|| EnrichmentError::NotFound {
                place: place.to_string(),
            })
    }
}

/// Single-day config over `hours`, writing into `dir`
pub fn config_in(dir: &Path, hours: HourRange, enrich: bool) -> PipelineConfig {
    PipelineConfig {
        hours,
        enrichment_enabled: enrich,
        output_path: Some(dir.join("out.json")),
        ..Default::default()
    }
}

pub fn read_output(config: &PipelineConfig) -> Vec<Value> {
    let path = config.output_path.as_ref().unwrap();
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
