pub mod csv;
pub mod map;
pub mod report;

pub use csv::export_csv;
pub use map::render_map;
pub use report::print_summary;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Build a timestamped output path that never clobbers an earlier run.
/// Two runs within the same wall-clock second get `_1`, `_2`, ... suffixes.
pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str, at: DateTime<Utc>) -> PathBuf {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let base = dir.join(format!("{}_{}.{}", prefix, stamp, ext));
    if !base.exists() {
        return base;
    }
    for seq in 1.. {
        let candidate = dir.join(format!("{}_{}_{}.{}", prefix, stamp, seq, ext));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// Shared "Unknown" fallback text for console and CSV output
pub(crate) const UNKNOWN: &str = "Unknown";

/// Shared missing-latency marker
pub(crate) const NOT_AVAILABLE: &str = "N/A";
