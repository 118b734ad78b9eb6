use std::path::PathBuf;

use crate::config::PipelineConfig;

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ghpush"))
}

/// `<config dir>/ghpush/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Output file derived from the date range and accepted types,
/// e.g. `data/2014-11-01-PushEvent.json`
pub fn default_output_path(config: &PipelineConfig) -> PathBuf {
    let range = &config.date_range;
    let days = if range.last() == range.start {
        range.start.format("%Y-%m-%d").to_string()
    } else {
        format!(
            "{}_{}",
            range.start.format("%Y-%m-%d"),
            range.last().format("%Y-%m-%d")
        )
    };
    let types = config.accepted_event_types.join("+");
    PathBuf::from("data").join(format!("{days}-{types}.json"))
}

/// The configured output path, or the derived default
pub fn get_output_path(config: &PipelineConfig) -> PathBuf {
    config
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(config))
}
