use clap::Parser;
use std::time::Duration;

/// Paste traceroute/MTR output, get a geolocated route map, a console
/// summary and a CSV export
#[derive(Parser, Debug, Clone)]
#[command(name = "tracemap")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Read the trace from a file instead of stdin
    #[arg(long = "input")]
    pub input: Option<String>,

    /// Directory for the map and CSV artifacts
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: String,

    /// Skip geolocation lookups entirely
    #[arg(long = "no-geo")]
    pub no_geo: bool,

    /// Skip the HTML map artifact
    #[arg(long = "no-map")]
    pub no_map: bool,

    /// Skip the CSV artifact
    #[arg(long = "no-csv")]
    pub no_csv: bool,

    /// Per-request HTTP timeout in seconds
    #[arg(long = "timeout", default_value = "5")]
    pub timeout: f64,

    /// Concurrent geolocation lookups
    #[arg(long = "concurrency", default_value = "5")]
    pub concurrency: usize,

    /// Loss percentage where severity turns from low to elevated
    #[arg(long = "loss-minor", default_value = "5.0")]
    pub loss_minor: f64,

    /// Loss percentage where severity turns from elevated to severe
    #[arg(long = "loss-major", default_value = "20.0")]
    pub loss_major: f64,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }

        // Keep fan-out bounded; this is a courtesy tool, not a load test
        const MAX_CONCURRENCY: usize = 16;
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".into());
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(format!("Concurrency cannot exceed {}", MAX_CONCURRENCY));
        }

        if !(0.0..=100.0).contains(&self.loss_minor) || !(0.0..=100.0).contains(&self.loss_major) {
            return Err("Loss thresholds must be between 0 and 100".into());
        }
        if self.loss_minor >= self.loss_major {
            return Err("--loss-minor must be below --loss-major".into());
        }

        Ok(())
    }
}
