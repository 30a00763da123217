use anyhow::Result;
use std::io::Write;

use super::{NOT_AVAILABLE, UNKNOWN};
use crate::state::{RouteRow, RouteSummary};

/// Exact header contract for the data export
pub const CSV_HEADER: &str =
    "Hop, IP, Hostname, Packet Loss (%), Latency (ms), City, Region, Country, ASN";

/// Write one row per hop index (ascending) to a CSV sink.
/// Unreachable markers get the same row shape with their trace label in the
/// IP column and `Unknown` elsewhere.
pub fn export_csv<W: Write>(summary: &RouteSummary, mut writer: W) -> Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;

    for row in summary.rows() {
        match row {
            RouteRow::Resolved(hop) => {
                let (city, region, country) = match &hop.geo {
                    Some(geo) => (geo.city.as_str(), geo.region.as_str(), geo.country.as_str()),
                    None => (UNKNOWN, UNKNOWN, UNKNOWN),
                };
                let latency = hop
                    .latency_ms
                    .map(|ms| format!("{:.1}", ms))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                writeln!(
                    writer,
                    "{}, {}, {}, {:.1}, {}, {}, {}, {}, {}",
                    hop.index,
                    hop.address,
                    escape_csv(hop.hostname.as_deref().unwrap_or(UNKNOWN)),
                    hop.loss_pct,
                    latency,
                    escape_csv(city),
                    escape_csv(region),
                    escape_csv(country),
                    escape_csv(hop.asn_label().unwrap_or(UNKNOWN)),
                )?;
            }
            RouteRow::Unreachable(u) => {
                writeln!(
                    writer,
                    "{}, {}, {}, {:.1}, {}, {}, {}, {}, {}",
                    u.index,
                    escape_csv(&u.label),
                    UNKNOWN,
                    u.loss_pct,
                    NOT_AVAILABLE,
                    UNKNOWN,
                    UNKNOWN,
                    UNKNOWN,
                    UNKNOWN,
                )?;
            }
        }
    }

    Ok(())
}

/// Escape a field for CSV (quote if it contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GeoFact, GeoSource, Hop, UnreachableHop};
    use std::net::IpAddr;

    fn summary() -> RouteSummary {
        let mut hop2 = Hop::new(2, "8.8.8.8".parse::<IpAddr>().unwrap());
        hop2.latency_ms = Some(12.3);
        hop2.geo = Some(GeoFact {
            address: hop2.address,
            country: "US".to_string(),
            region: "California".to_string(),
            city: "Mountain View".to_string(),
            latitude: 37.4,
            longitude: -122.07,
            org: Some("AS15169 Google LLC".to_string()),
            source: GeoSource::Primary,
        });
        let hop1 = Hop::new(1, "192.168.1.1".parse::<IpAddr>().unwrap());
        let unreachable = UnreachableHop {
            index: 3,
            label: "???".to_string(),
            loss_pct: 100.0,
        };
        RouteSummary::new(vec![hop2, hop1], vec![unreachable])
    }

    #[test]
    fn test_header_is_exact() {
        let mut buf = Vec::new();
        export_csv(&summary(), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out.lines().next().unwrap(),
            "Hop, IP, Hostname, Packet Loss (%), Latency (ms), City, Region, Country, ASN"
        );
    }

    #[test]
    fn test_rows_ascend_and_fallbacks_apply() {
        let mut buf = Vec::new();
        export_csv(&summary(), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[1].starts_with("1, 192.168.1.1, Unknown, 0.0, N/A, Unknown"));
        assert!(lines[2].starts_with("2, 8.8.8.8, Unknown, 0.0, 12.3, Mountain View, California, US"));
        assert!(lines[3].starts_with("3, ???, Unknown, 100.0, N/A"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_org_with_comma_is_quoted() {
        let mut s = summary();
        s.hops[1].geo.as_mut().unwrap().org = Some("AS64500 Corp, Inc".to_string());
        let mut buf = Vec::new();
        export_csv(&s, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("\"AS64500 Corp, Inc\""));
    }
}
