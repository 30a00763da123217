use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Which provider produced a GeoFact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoSource {
    Primary,
    Fallback,
}

/// Resolved geolocation attributes for one address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFact {
    pub address: IpAddr,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Organization or AS string as reported by the provider
    pub org: Option<String>,
    pub source: GeoSource,
}

/// One extracted hop on the route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    /// Hop index as reported by the diagnostic tool, not array position
    pub index: u32,
    pub address: IpAddr,
    pub hostname: Option<String>,
    pub loss_pct: f64,
    pub latency_ms: Option<f64>,
    /// AS tag recovered from the trace text itself (e.g. "AS15169")
    pub asn_tag: Option<String>,
    pub geo: Option<GeoFact>,
}

impl Hop {
    pub fn new(index: u32, address: IpAddr) -> Self {
        Self {
            index,
            address,
            hostname: None,
            loss_pct: 0.0,
            latency_ms: None,
            asn_tag: None,
            geo: None,
        }
    }

    /// Best available ASN string: trace tag first, then the provider's org field
    pub fn asn_label(&self) -> Option<&str> {
        self.asn_tag
            .as_deref()
            .or_else(|| self.geo.as_ref().and_then(|g| g.org.as_deref()))
    }
}

/// A hop index that reported 100% loss with no resolvable address.
/// Shown in console and CSV output, never plotted on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreachableHop {
    pub index: u32,
    /// Display label from the trace text ("???" in MTR output)
    pub label: String,
    pub loss_pct: f64,
}

/// One output row: either a resolved hop or an unreachable marker
#[derive(Debug, Clone, Copy)]
pub enum RouteRow<'a> {
    Resolved(&'a Hop),
    Unreachable(&'a UnreachableHop),
}

impl RouteRow<'_> {
    pub fn index(&self) -> u32 {
        match self {
            RouteRow::Resolved(h) => h.index,
            RouteRow::Unreachable(u) => u.index,
        }
    }
}

/// The full extracted route for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub hops: Vec<Hop>,
    pub unreachable: Vec<UnreachableHop>,
    pub captured_at: DateTime<Utc>,
}

impl RouteSummary {
    pub fn new(mut hops: Vec<Hop>, mut unreachable: Vec<UnreachableHop>) -> Self {
        // All output ordering is ascending hop index, never discovery order
        hops.sort_by_key(|h| h.index);
        unreachable.sort_by_key(|u| u.index);
        Self {
            hops,
            unreachable,
            captured_at: Utc::now(),
        }
    }

    /// Merged console/CSV rows in ascending hop-index order
    pub fn rows(&self) -> Vec<RouteRow<'_>> {
        let mut rows: Vec<RouteRow> = self
            .hops
            .iter()
            .map(RouteRow::Resolved)
            .chain(self.unreachable.iter().map(RouteRow::Unreachable))
            .collect();
        rows.sort_by_key(|r| r.index());
        rows
    }

    /// Hops that carry coordinates, in hop-index order (map markers)
    pub fn mapped_hops(&self) -> impl Iterator<Item = &Hop> {
        self.hops.iter().filter(|h| h.geo.is_some())
    }

    pub fn mapped_count(&self) -> usize {
        self.mapped_hops().count()
    }

    /// Hop tally per country, sorted by name for stable output
    pub fn country_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for hop in &self.hops {
            if let Some(geo) = &hop.geo {
                *counts.entry(geo.country.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Hop tally per ASN label, sorted for stable output
    pub fn asn_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for hop in &self.hops {
            if let Some(asn) = hop.asn_label() {
                *counts.entry(asn.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// First- and last-hop latency samples, when both exist.
    /// The last-hop sample is the end-to-end round-trip estimate; the
    /// first-hop sample is the local-segment baseline.
    pub fn latency_estimate(&self) -> Option<(f64, f64)> {
        let first = self.hops.iter().find_map(|h| h.latency_ms)?;
        let last = self.hops.iter().rev().find_map(|h| h.latency_ms)?;
        Some((first, last))
    }

    /// Attach a resolved GeoFact to the hop owning that address
    pub fn attach_geo(&mut self, fact: GeoFact) {
        if let Some(hop) = self.hops.iter_mut().find(|h| h.address == fact.address) {
            hop.geo = Some(fact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn hop(index: u32, addr: [u8; 4]) -> Hop {
        Hop::new(index, IpAddr::V4(Ipv4Addr::from(addr)))
    }

    fn geo(addr: IpAddr, country: &str) -> GeoFact {
        GeoFact {
            address: addr,
            country: country.to_string(),
            region: "Region".to_string(),
            city: "City".to_string(),
            latitude: 1.0,
            longitude: 2.0,
            org: Some("AS64500 Example".to_string()),
            source: GeoSource::Primary,
        }
    }

    #[test]
    fn test_rows_are_index_ordered() {
        let hops = vec![hop(7, [10, 0, 0, 7]), hop(2, [10, 0, 0, 2])];
        let unreachable = vec![UnreachableHop {
            index: 4,
            label: "???".to_string(),
            loss_pct: 100.0,
        }];
        let summary = RouteSummary::new(hops, unreachable);

        let indices: Vec<u32> = summary.rows().iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![2, 4, 7]);
    }

    #[test]
    fn test_mapped_hops_require_coordinates() {
        let mut summary = RouteSummary::new(vec![hop(1, [192, 0, 2, 1]), hop(2, [192, 0, 2, 2])], vec![]);
        summary.attach_geo(geo("192.0.2.2".parse().unwrap(), "DE"));

        assert_eq!(summary.mapped_count(), 1);
        assert_eq!(summary.mapped_hops().next().unwrap().index, 2);
    }

    #[test]
    fn test_country_and_asn_tallies() {
        let mut summary = RouteSummary::new(
            vec![hop(1, [192, 0, 2, 1]), hop(2, [192, 0, 2, 2]), hop(3, [192, 0, 2, 3])],
            vec![],
        );
        summary.attach_geo(geo("192.0.2.1".parse().unwrap(), "DE"));
        summary.attach_geo(geo("192.0.2.2".parse().unwrap(), "DE"));
        summary.hops[2].asn_tag = Some("AS3320".to_string());

        assert_eq!(summary.country_counts().get("DE"), Some(&2));
        // Trace AS tag wins over the provider org string
        assert_eq!(summary.asn_counts().get("AS3320"), Some(&1));
        assert_eq!(summary.asn_counts().get("AS64500 Example"), Some(&2));
    }

    #[test]
    fn test_latency_estimate_needs_both_samples() {
        let mut summary = RouteSummary::new(vec![hop(1, [192, 0, 2, 1]), hop(5, [192, 0, 2, 5])], vec![]);
        assert!(summary.latency_estimate().is_none());

        summary.hops[0].latency_ms = Some(1.2);
        summary.hops[1].latency_ms = Some(34.5);
        assert_eq!(summary.latency_estimate(), Some((1.2, 34.5)));
    }

    #[test]
    fn test_asn_label_prefers_trace_tag() {
        let mut h = hop(1, [192, 0, 2, 1]);
        h.geo = Some(geo(h.address, "US"));
        assert_eq!(h.asn_label(), Some("AS64500 Example"));
        h.asn_tag = Some("AS15169".to_string());
        assert_eq!(h.asn_label(), Some("AS15169"));
    }
}
