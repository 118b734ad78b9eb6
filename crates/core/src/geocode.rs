use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::EnrichmentError, types::Centroid};

/// Resolves a free-text place name to a centroid and country
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Centroid, EnrichmentError>;
}

/// Name search against an Unlock-style places endpoint
pub struct HttpGeocoder {
    url: String,
    client: reqwest::Client,
}

impl HttpGeocoder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, place: &str) -> Result<Centroid, EnrichmentError> {
        let body = self
            .client
            .get(&self.url)
            .query(&[("name", place), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: Value = serde_json::from_str(&body)?;
        parse_geocode_response(place, &response)
    }
}

/// Take the first feature's `properties.centroid` and `properties.country`
pub fn parse_geocode_response(place: &str, response: &Value) -> Result<Centroid, EnrichmentError> {
    let features = response["features"]
        .as_array()
        .ok_or(EnrichmentError::MissingField { field: "features" })?;
    let Some(feature) = features.first() else {
        return Err(EnrichmentError::NotFound {
            place: place.to_string(),
        });
    };

    let properties = &feature["properties"];
    let centroid = properties["centroid"]
        .as_str()
        .ok_or(EnrichmentError::MissingField {
            field: "properties.centroid",
        })?;
    let country = properties["country"]
        .as_str()
        .ok_or(EnrichmentError::MissingField {
            field: "properties.country",
        })?;

    let (lat, lon) = parse_centroid(centroid)?;
    Ok(Centroid {
        lat,
        lon,
        country: country.to_string(),
    })
}

/// Parse `"<lat>, <lon>"`
pub fn parse_centroid(text: &str) -> Result<(f64, f64), EnrichmentError> {
    let bad = || EnrichmentError::BadCentroid {
        centroid: text.to_string(),
    };
    let coord = |part: &str| {
        part.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(bad)
    };

    let mut parts = text.split(',').map(str::trim);
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(bad());
    };
    Ok((coord(lat)?, coord(lon)?))
}

/// Per-run memo keyed by exact place text.
///
/// Matches and definitive misses are both remembered so a location that shows
/// up thousands of times costs one lookup. Transport failures are not cached.
pub struct CachingGeocoder<G> {
    inner: G,
    memo: Mutex<HashMap<String, Option<Centroid>>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_places(&self) -> usize {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn lookup(&self, place: &str) -> Option<Option<Centroid>> {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(place)
            .cloned()
    }

    fn remember(&self, place: &str, outcome: Option<Centroid>) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(place.to_string(), outcome);
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    async fn geocode(&self, place: &str) -> Result<Centroid, EnrichmentError> {
        if let Some(cached) = self.lookup(place) {
            return cached.ok_or_else(|| EnrichmentError::NotFound {
                place: place.to_string(),
            });
        }

        let result = self.inner.geocode(place).await;
        match &result {
            Ok(centroid) => self.remember(place, Some(centroid.clone())),
            Err(EnrichmentError::Request(_)) => {}
            Err(_) => self.remember(place, None),
        }
        result
    }
}
