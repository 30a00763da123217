use std::io::Write;

use super::{NOT_AVAILABLE, UNKNOWN};
use crate::config::Config;
use crate::state::{RouteRow, RouteSummary};

/// Four-bucket packet-loss severity scale. Thresholds come from config
/// rather than being hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossSeverity {
    Clean,
    Low,
    Elevated,
    Severe,
}

impl LossSeverity {
    pub fn classify(loss_pct: f64, config: &Config) -> Self {
        if loss_pct <= 0.0 {
            Self::Clean
        } else if loss_pct < config.loss_minor_pct {
            Self::Low
        } else if loss_pct < config.loss_major_pct {
            Self::Elevated
        } else {
            Self::Severe
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Low => "low loss",
            Self::Elevated => "elevated loss",
            Self::Severe => "severe loss",
        }
    }
}

/// Print the route summary: aggregates, the per-hop table in ascending
/// hop-index order, a packet-loss issue list, and the end-to-end latency
/// estimate when both first- and last-hop samples exist.
pub fn print_summary<W: Write>(
    summary: &RouteSummary,
    config: &Config,
    mut writer: W,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "Route captured {}: {} hops, {} mapped, {} unreachable",
        summary.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.hops.len(),
        summary.mapped_count(),
        summary.unreachable.len()
    )?;

    let countries = summary.country_counts();
    if !countries.is_empty() {
        let parts: Vec<String> = countries
            .iter()
            .map(|(c, n)| format!("{} ({})", c, n))
            .collect();
        writeln!(writer, "Countries: {}", parts.join(", "))?;
    }
    let asns = summary.asn_counts();
    if !asns.is_empty() {
        let parts: Vec<String> = asns.iter().map(|(a, n)| format!("{} ({})", a, n)).collect();
        writeln!(writer, "ASNs: {}", parts.join(", "))?;
    }
    writeln!(writer)?;

    writeln!(
        writer,
        "{:>3}  {:<16} {:<28} {:>6} {:>9}  {:<28} {:<20}",
        "#", "Address", "Hostname", "Loss%", "Latency", "Location", "ASN"
    )?;
    writeln!(writer, "{}", "-".repeat(118))?;

    for row in summary.rows() {
        match row {
            RouteRow::Resolved(hop) => {
                let location = match &hop.geo {
                    Some(geo) => format!("{}, {}, {}", geo.city, geo.region, geo.country),
                    None => UNKNOWN.to_string(),
                };
                let latency = hop
                    .latency_ms
                    .map(|ms| format!("{:.1} ms", ms))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                writeln!(
                    writer,
                    "{:>3}  {:<16} {:<28} {:>5.1}% {:>9}  {:<28} {:<20}",
                    hop.index,
                    hop.address,
                    hop.hostname.as_deref().unwrap_or(UNKNOWN),
                    hop.loss_pct,
                    latency,
                    location,
                    hop.asn_label().unwrap_or(UNKNOWN),
                )?;
            }
            RouteRow::Unreachable(u) => {
                writeln!(
                    writer,
                    "{:>3}  {:<16} {:<28} {:>5.1}% {:>9}  {:<28} {:<20}",
                    u.index,
                    u.label,
                    "unreachable",
                    u.loss_pct,
                    NOT_AVAILABLE,
                    UNKNOWN,
                    UNKNOWN,
                )?;
            }
        }
    }

    // Loss issue list: anything that dropped packets, bucketed by severity
    let mut issues: Vec<String> = Vec::new();
    for hop in &summary.hops {
        let severity = LossSeverity::classify(hop.loss_pct, config);
        if severity != LossSeverity::Clean {
            issues.push(format!(
                "hop {} ({}): {:.1}% loss ({})",
                hop.index,
                hop.address,
                hop.loss_pct,
                severity.label()
            ));
        }
    }
    for u in &summary.unreachable {
        issues.push(format!(
            "hop {} ({}): {:.1}% loss (unreachable)",
            u.index, u.label, u.loss_pct
        ));
    }
    if !issues.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Packet loss issues:")?;
        for issue in issues {
            writeln!(writer, "  - {}", issue)?;
        }
    }

    if let Some((first, last)) = summary.latency_estimate() {
        writeln!(writer)?;
        writeln!(
            writer,
            "End-to-end latency: ~{:.1} ms (first hop {:.1} ms)",
            last, first
        )?;
    }

    Ok(())
}
