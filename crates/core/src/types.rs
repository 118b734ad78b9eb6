use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder written for geo fields that were not (or could not be) resolved.
pub const SENTINEL: &str = "NA";

const ACTOR_ATTRIBUTES: &str = "actor_attributes";

/// One archive record. Every field of the source line is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Actor location, if present and not blank.
    pub fn location(&self) -> Option<&str> {
        self.0
            .get(ACTOR_ATTRIBUTES)
            .and_then(|attrs| attrs.get("location"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|place| !place.is_empty())
    }

    pub fn actor_attributes(&self) -> Option<&Map<String, Value>> {
        self.0.get(ACTOR_ATTRIBUTES).and_then(Value::as_object)
    }

    /// Overwrite `actor_attributes.{lat,lon,country}`, creating the object if needed.
    pub fn set_geo(&mut self, geo: GeoFields) {
        let attrs = self
            .0
            .entry(ACTOR_ATTRIBUTES)
            .or_insert_with(|| Value::Object(Map::new()));
        if !attrs.is_object() {
            *attrs = Value::Object(Map::new());
        }
        if let Value::Object(attrs) = attrs {
            let (lat, lon, country) = geo.into_values();
            attrs.insert("lat".into(), lat);
            attrs.insert("lon".into(), lon);
            attrs.insert("country".into(), country);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Names one hourly archive file: `YYYY-MM-DD-H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourId {
    date: NaiveDate,
    hour: u8,
}

impl HourId {
    pub fn new(date: NaiveDate, hour: u8) -> Option<Self> {
        (hour < 24).then_some(Self { date, hour })
    }

    pub fn file_name(&self) -> String {
        format!("{self}.json.gz")
    }
}

impl fmt::Display for HourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
    pub country: String,
}

/// The three geo values merged into an event; `None` is written as [`SENTINEL`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoFields {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub country: Option<String>,
}

impl GeoFields {
    pub fn unknown() -> Self {
        Self::default()
    }

    fn into_values(self) -> (Value, Value, Value) {
        let sentinel = || Value::String(SENTINEL.to_string());
        // Non-finite floats have no JSON form
        let coord = |v: Option<f64>| {
            v.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(sentinel)
        };
        (
            coord(self.lat),
            coord(self.lon),
            self.country.map(Value::String).unwrap_or_else(sentinel),
        )
    }
}

impl From<Centroid> for GeoFields {
    fn from(c: Centroid) -> Self {
        Self {
            lat: Some(c.lat),
            lon: Some(c.lon),
            country: Some(c.country),
        }
    }
}
