use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for map and CSV artifacts
    pub output_dir: PathBuf,
    /// Geolocation enabled
    pub geo_enabled: bool,
    /// Render the HTML map
    pub map_enabled: bool,
    /// Write the CSV export
    pub csv_enabled: bool,
    /// Per-request HTTP timeout
    #[serde(with = "duration_serde")]
    pub http_timeout: Duration,
    /// Bounded fan-out width for geolocation lookups
    pub max_concurrent_lookups: usize,
    /// Loss percentage where severity turns from low to elevated
    pub loss_minor_pct: f64,
    /// Loss percentage where severity turns from elevated to severe
    pub loss_major_pct: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            geo_enabled: true,
            map_enabled: true,
            csv_enabled: true,
            http_timeout: Duration::from_secs(5),
            max_concurrent_lookups: 5,
            loss_minor_pct: 5.0,
            loss_major_pct: 20.0,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            output_dir: PathBuf::from(&args.output_dir),
            geo_enabled: !args.no_geo,
            map_enabled: !args.no_map,
            csv_enabled: !args.no_csv,
            http_timeout: args.timeout_duration(),
            max_concurrent_lookups: args.concurrency.max(1),
            loss_minor_pct: args.loss_minor,
            loss_major_pct: args.loss_major,
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "tracemap",
            "--no-map",
            "--timeout",
            "2.5",
            "--concurrency",
            "3",
        ]);
        let config = Config::from(&args);

        assert!(!config.map_enabled);
        assert!(config.csv_enabled);
        assert!(config.geo_enabled);
        assert_eq!(config.http_timeout, Duration::from_secs_f64(2.5));
        assert_eq!(config.max_concurrent_lookups, 3);
    }
}
