//! Interactive route map: a self-contained Leaflet HTML document with one
//! marker per geolocated hop, a path between consecutive hops, and overlay
//! panels for unreachable hops and per-country/per-ASN tallies.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::timestamped_path;
use crate::config::Config;
use crate::export::report::LossSeverity;
use crate::state::RouteSummary;

/// Marker payload embedded into the document as JSON
#[derive(Debug, Serialize)]
struct Marker {
    hop: u32,
    lat: f64,
    lon: f64,
    color: &'static str,
    popup: String,
    tooltip: String,
}

fn severity_color(loss_pct: f64, config: &Config) -> &'static str {
    match LossSeverity::classify(loss_pct, config) {
        LossSeverity::Clean => "#2ecc71",
        LossSeverity::Low => "#f1c40f",
        LossSeverity::Elevated => "#e67e22",
        LossSeverity::Severe => "#e74c3c",
    }
}

fn build_markers(summary: &RouteSummary, config: &Config) -> Vec<Marker> {
    summary
        .mapped_hops()
        .filter_map(|hop| {
            let geo = hop.geo.as_ref()?;
            Some(Marker {
                hop: hop.index,
                lat: geo.latitude,
                lon: geo.longitude,
                color: severity_color(hop.loss_pct, config),
                popup: format!("Hop {}: {}", hop.index, hop.address),
                tooltip: format!("{}, {}, {}", geo.city, geo.region, geo.country),
            })
        })
        .collect()
}

fn overlay_html(summary: &RouteSummary) -> (String, String) {
    let unreachable = if summary.unreachable.is_empty() {
        String::new()
    } else {
        let items: String = summary
            .unreachable
            .iter()
            .map(|u| {
                format!(
                    "<li>hop {}: {} ({:.0}% loss)</li>",
                    u.index,
                    html_escape(&u.label),
                    u.loss_pct
                )
            })
            .collect();
        format!("<b>Unreachable hops</b><ul>{}</ul>", items)
    };

    let mut tallies = String::new();
    let countries = summary.country_counts();
    if !countries.is_empty() {
        let items: String = countries
            .iter()
            .map(|(c, n)| format!("<li>{}: {} hops</li>", html_escape(c), n))
            .collect();
        tallies.push_str(&format!("<b>Countries</b><ul>{}</ul>", items));
    }
    let asns = summary.asn_counts();
    if !asns.is_empty() {
        let items: String = asns
            .iter()
            .map(|(a, n)| format!("<li>{}: {} hops</li>", html_escape(a), n))
            .collect();
        tallies.push_str(&format!("<b>ASNs</b><ul>{}</ul>", items));
    }

    (unreachable, tallies)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>tracemap route</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; }
  .panel {
    position: absolute; z-index: 1000; background: rgba(255,255,255,0.92);
    padding: 8px 12px; border-radius: 4px; font: 12px sans-serif;
    max-height: 40%; overflow-y: auto;
  }
  #unreachable { top: 10px; right: 10px; }
  #tallies { bottom: 10px; right: 10px; }
  .panel ul { margin: 4px 0; padding-left: 16px; }
</style>
</head>
<body>
<div id="map"></div>
<div id="unreachable" class="panel">__UNREACHABLE__</div>
<div id="tallies" class="panel">__TALLIES__</div>
<script>
var markers = __MARKERS__;
var map = L.map('map').setView([0, 0], 2);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
var path = [];
markers.forEach(function (m) {
  path.push([m.lat, m.lon]);
  L.circleMarker([m.lat, m.lon], {
    radius: 7, color: m.color, fillColor: m.color, fillOpacity: 0.8
  }).bindPopup(m.popup).bindTooltip(m.tooltip).addTo(map);
});
if (path.length > 1) {
  L.polyline(path, { color: '#3388ff', weight: 2.5, opacity: 1 }).addTo(map);
}
if (path.length > 0) {
  map.fitBounds(path, { padding: [30, 30], maxZoom: 6 });
}
['unreachable', 'tallies'].forEach(function (id) {
  var el = document.getElementById(id);
  if (!el.innerHTML.trim()) { el.style.display = 'none'; }
});
</script>
</body>
</html>
"#;

/// Render the map document into a string.
pub fn render_map_html(summary: &RouteSummary, config: &Config) -> Result<String> {
    let markers = build_markers(summary, config);
    let markers_json = serde_json::to_string(&markers)?;
    let (unreachable, tallies) = overlay_html(summary);

    Ok(TEMPLATE
        .replace("__MARKERS__", &markers_json)
        .replace("__UNREACHABLE__", &unreachable)
        .replace("__TALLIES__", &tallies))
}

/// Render and write the map to a uniquely timestamped file. Returns the
/// path written.
pub fn render_map(summary: &RouteSummary, config: &Config, dir: &Path) -> Result<PathBuf> {
    let html = render_map_html(summary, config)?;
    let path = timestamped_path(dir, "trace_map", "html", summary.captured_at);
    fs::write(&path, html).with_context(|| format!("writing map to {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GeoFact, GeoSource, Hop, UnreachableHop};
    use std::net::IpAddr;

    fn summary() -> RouteSummary {
        let hop1 = Hop::new(1, "192.168.1.1".parse::<IpAddr>().unwrap());
        let mut hop2 = Hop::new(2, "8.8.8.8".parse::<IpAddr>().unwrap());
        hop2.loss_pct = 30.0;
        hop2.geo = Some(GeoFact {
            address: hop2.address,
            country: "US".to_string(),
            region: "California".to_string(),
            city: "Mountain View".to_string(),
            latitude: 37.4,
            longitude: -122.07,
            org: None,
            source: GeoSource::Primary,
        });
        let unreachable = UnreachableHop {
            index: 3,
            label: "???".to_string(),
            loss_pct: 100.0,
        };
        RouteSummary::new(vec![hop1, hop2], vec![unreachable])
    }

    #[test]
    fn test_only_geolocated_hops_become_markers() {
        let html = render_map_html(&summary(), &Config::default()).unwrap();
        assert!(html.contains("\"hop\":2"));
        assert!(!html.contains("\"hop\":1"));
        assert!(!html.contains("\"hop\":3"));
    }

    #[test]
    fn test_severity_color_applied() {
        // 30% loss lands in the severe bucket
        let html = render_map_html(&summary(), &Config::default()).unwrap();
        assert!(html.contains("#e74c3c"));
    }

    #[test]
    fn test_unreachable_panel_listed_not_plotted() {
        let html = render_map_html(&summary(), &Config::default()).unwrap();
        assert!(html.contains("hop 3: ???"));
    }

    #[test]
    fn test_render_map_writes_unique_file() {
        let dir = std::env::temp_dir().join(format!("tracemap_map_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let s = summary();
        let config = Config::default();
        let first = render_map(&s, &config, &dir).unwrap();
        let second = render_map(&s, &config, &dir).unwrap();

        assert!(first.exists() && second.exists());
        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("trace_map_"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_labels_are_html_escaped() {
        let mut s = summary();
        s.unreachable[0].label = "<script>".to_string();
        let html = render_map_html(&s, &Config::default()).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<li>hop 3: <script>"));
    }
}
