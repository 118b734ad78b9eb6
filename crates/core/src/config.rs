use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, paths::default_config_path, types::HourId};

pub const ENV_CONFIG_PATH: &str = "GHPUSH_CONFIG";

pub const DEFAULT_BASE_URL: &str = "https://data.gharchive.org";
pub const DEFAULT_GEOCODER_URL: &str = "https://unlock.edina.ac.uk/ws/nameSearch";
pub const DEFAULT_EVENT_TYPE: &str = "PushEvent";

fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 11, 1).expect("2014-11-01 is a valid date")
}

/// Inclusive range of archive days. A missing `end` means a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: default_date(),
            end: None,
        }
    }
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: None,
        }
    }

    pub fn last(&self) -> NaiveDate {
        self.end.unwrap_or(self.start)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let last = self.last();
        self.start.iter_days().take_while(move |d| *d <= last)
    }
}

/// Hours of each day to fetch, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HourRange {
    pub start: u8,
    pub end: u8,
}

impl Default for HourRange {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub base_url: String,
    pub date_range: DateRange,
    pub hours: HourRange,
    pub accepted_event_types: Vec<String>,
    pub enrichment_enabled: bool,
    pub geocoder_url: String,
    pub output_path: Option<PathBuf>,
    pub strict: bool,
    pub archive_timeout_secs: u64,
    pub geocoder_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            date_range: DateRange::default(),
            hours: HourRange::default(),
            accepted_event_types: vec![DEFAULT_EVENT_TYPE.to_string()],
            enrichment_enabled: false,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            output_path: None,
            strict: false,
            archive_timeout_secs: 300,
            geocoder_timeout_secs: 10,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });

        if self.base_url.trim().is_empty() {
            return invalid("base_url must not be empty".into());
        }
        if self.date_range.last() < self.date_range.start {
            return invalid(format!(
                "date range ends ({}) before it starts ({})",
                self.date_range.last(),
                self.date_range.start
            ));
        }
        if self.hours.end > 24 || self.hours.start >= self.hours.end {
            return invalid(format!(
                "hour range {}..{} must satisfy start < end <= 24",
                self.hours.start, self.hours.end
            ));
        }
        if self.accepted_event_types.is_empty()
            || self.accepted_event_types.iter().any(|t| t.trim().is_empty())
        {
            return invalid("accepted_event_types must list at least one non-empty type".into());
        }
        if self.enrichment_enabled && self.geocoder_url.trim().is_empty() {
            return invalid("geocoder_url is required when enrichment is enabled".into());
        }
        if self.archive_timeout_secs == 0 || self.geocoder_timeout_secs == 0 {
            return invalid("timeouts must be at least one second".into());
        }
        Ok(())
    }

    /// Every hour to process, in chronological order.
    pub fn hour_ids(&self) -> Vec<HourId> {
        self.date_range
            .days()
            .flat_map(|day| {
                (self.hours.start..self.hours.end).filter_map(move |h| HourId::new(day, h))
            })
            .collect()
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }
}

/// Load config from an explicit TOML file. Missing keys take their defaults.
///
/// The result is not validated; callers apply their overrides first and then
/// call [`PipelineConfig::validate`].
pub fn load_config_from(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve config using:
/// 1) the explicit path
/// 2) $GHPUSH_CONFIG
/// 3) `<config dir>/ghpush/config.toml` if it exists
/// 4) built-in defaults
pub fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return load_config_from(Path::new(&path));
    }
    match default_config_path().filter(|p| p.exists()) {
        Some(path) => load_config_from(&path),
        None => Ok(PipelineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_match_single_day_push_events() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.accepted_event_types, vec!["PushEvent".to_string()]);
        assert!(!config.enrichment_enabled);

        let hours = config.hour_ids();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0].to_string(), "2014-11-01-0");
        assert_eq!(hours[23].to_string(), "2014-11-01-23");
    }

    #[test]
    fn hour_ids_span_every_day_in_order() {
        let config = PipelineConfig {
            date_range: DateRange {
                start: day(2014, 12, 31),
                end: Some(day(2015, 1, 1)),
            },
            hours: HourRange { start: 22, end: 24 },
            ..Default::default()
        };
        let ids: Vec<String> = config.hour_ids().iter().map(ToString::to_string).collect();
        assert_eq!(
            ids,
            vec![
                "2014-12-31-22",
                "2014-12-31-23",
                "2015-01-01-22",
                "2015-01-01-23"
            ]
        );
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let reversed = PipelineConfig {
            date_range: DateRange {
                start: day(2014, 11, 2),
                end: Some(day(2014, 11, 1)),
            },
            ..Default::default()
        };
        assert!(matches!(
            reversed.validate(),
            Err(ConfigError::Invalid { .. })
        ));

        let empty_hours = PipelineConfig {
            hours: HourRange { start: 5, end: 5 },
            ..Default::default()
        };
        assert!(empty_hours.validate().is_err());

        let past_midnight = PipelineConfig {
            hours: HourRange { start: 0, end: 25 },
            ..Default::default()
        };
        assert!(past_midnight.validate().is_err());

        let no_types = PipelineConfig {
            accepted_event_types: vec![],
            ..Default::default()
        };
        assert!(no_types.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
enrichment_enabled = true
accepted_event_types = ["PushEvent", "CreateEvent"]

[date_range]
start = "2015-01-01"

[hours]
end = 3
"#,
        )
        .unwrap();

        assert!(config.enrichment_enabled);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.date_range.last(), day(2015, 1, 1));
        assert_eq!(config.hours, HourRange { start: 0, end: 3 });
        assert_eq!(config.hour_ids().len(), 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = toml::from_str::<PipelineConfig>("enrich = true");
        assert!(parsed.is_err());
    }
}
