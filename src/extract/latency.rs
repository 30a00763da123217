//! Latency recovery for extracted hops.
//!
//! If a hop's line matches the multi-column report shape (`Loss% Snt Last
//! Avg ...`) the Avg column is taken. Otherwise discrete `<value> ms`
//! tokens near the address are collapsed with `DISCRETE_SAMPLE_POLICY`.
//! No match leaves latency unset, never zero.

use regex::Regex;
use std::sync::OnceLock;

use crate::state::Hop;

/// How several discrete latency samples collapse into one figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePolicy {
    /// Best-case (optimistic) latency
    Minimum,
}

/// Product-level heuristic, kept as a named constant rather than inline
pub const DISCRETE_SAMPLE_POLICY: SamplePolicy = SamplePolicy::Minimum;

fn multi_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Loss%  Snt  Last  Avg, where the fourth group is the Avg column
        Regex::new(r"(\d+(?:\.\d+)?)%\s+(\d+)\s+(\d+(?:\.\d+)?)\s+(\d+(?:\.\d+)?)")
            .expect("static pattern")
    })
}

fn ms_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*ms\b").expect("static pattern"))
}

fn index_prefix_re(index: u32) -> Regex {
    Regex::new(&format!(r"^\s*{}[.)|\s]", index)).expect("static pattern")
}

/// Lines of the trace that plausibly belong to this hop: those mentioning
/// its address or hostname, or starting with its hop index.
fn hop_lines<'a>(text: &'a str, hop: &Hop) -> Vec<&'a str> {
    let addr = hop.address.to_string();
    let index_re = index_prefix_re(hop.index);
    text.lines()
        .filter(|line| {
            line.contains(&addr)
                || hop
                    .hostname
                    .as_deref()
                    .map(|h| line.contains(h))
                    .unwrap_or(false)
                || index_re.is_match(line)
        })
        .collect()
}

/// Recover a latency figure for one hop from the raw trace text.
pub fn latency_for_hop(text: &str, hop: &Hop) -> Option<f64> {
    let lines = hop_lines(text, hop);

    // Multi-column report format takes precedence: the Avg column is the
    // designated figure.
    for line in &lines {
        if let Some(caps) = multi_column_re().captures(line) {
            if let Ok(avg) = caps[4].parse::<f64>() {
                return Some(avg);
            }
        }
    }

    // Discrete "<value> ms" tokens near the address
    let samples: Vec<f64> = lines
        .iter()
        .flat_map(|line| ms_token_re().captures_iter(line))
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .filter(|v| *v >= 0.0)
        .collect();

    if samples.is_empty() {
        return None;
    }
    match DISCRETE_SAMPLE_POLICY {
        SamplePolicy::Minimum => samples.into_iter().reduce(f64::min),
    }
}
