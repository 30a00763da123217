//! Geolocation via two HTTP providers with a per-run memoizing cache.
//!
//! The primary provider (ipinfo.io shape) must return a parseable `loc`
//! coordinate pair or its answer is treated as insufficient; the fallback
//! (ip-api.com shape) must report `status == "success"`. Any transport or
//! parse failure from either provider means "no answer from that provider"
//! and is never propagated.

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::sanitize_display;
use crate::state::{GeoFact, GeoSource};

const PRIMARY_BASE: &str = "https://ipinfo.io";
const FALLBACK_BASE: &str = "http://ip-api.com";

/// Optional ipinfo.io token for higher rate limits
const PRIMARY_TOKEN_ENV: &str = "TRACEMAP_IPINFO_TOKEN";

/// Primary provider response (ipinfo.io)
#[derive(Debug, Deserialize)]
struct PrimaryResponse {
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    /// "lat,lon"; both halves must parse or the result is insufficient
    loc: Option<String>,
    org: Option<String>,
}

/// Fallback provider response (ip-api.com)
#[derive(Debug, Deserialize)]
struct FallbackResponse {
    status: String,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "as")]
    asn: Option<String>,
}

/// Per-run memoizing cache, passed into the resolver explicitly.
/// Negative results are cached too so a failing address is queried once.
#[derive(Default)]
pub struct GeoCache {
    entries: RwLock<HashMap<IpAddr, Option<GeoFact>>>,
}

impl GeoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: &IpAddr) -> Option<Option<GeoFact>> {
        self.entries.read().get(ip).cloned()
    }

    pub fn insert(&self, ip: IpAddr, fact: Option<GeoFact>) {
        self.entries.write().insert(ip, fact);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Two-provider geolocation resolver
pub struct GeoResolver {
    client: reqwest::Client,
    primary_base: String,
    fallback_base: String,
    primary_token: Option<String>,
}

/// Addresses that must never be sent to a provider: private, loopback,
/// link-local and unspecified ranges. IPv6 lacks stable std helpers for
/// unique-local and link-local, so those ranges are checked by prefix.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified())
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            let unique_local = (seg[0] & 0xfe00) == 0xfc00;
            let link_local = (seg[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

impl GeoResolver {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("tracemap/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            primary_base: PRIMARY_BASE.to_string(),
            fallback_base: FALLBACK_BASE.to_string(),
            primary_token: std::env::var(PRIMARY_TOKEN_ENV).ok(),
        })
    }

    /// Construct against non-default endpoints (tests)
    #[cfg(test)]
    pub fn with_endpoints(primary_base: &str, fallback_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            primary_base: primary_base.to_string(),
            fallback_base: fallback_base.to_string(),
            primary_token: None,
        }
    }

    /// Resolve one address: cache, routability filter, primary, fallback.
    pub async fn resolve(&self, ip: IpAddr, cache: &GeoCache) -> Option<GeoFact> {
        if let Some(cached) = cache.get(&ip) {
            return cached;
        }
        if !is_routable(ip) {
            cache.insert(ip, None);
            return None;
        }

        let fact = match self.query_primary(ip).await {
            Some(fact) => Some(fact),
            None => self.query_fallback(ip).await,
        };

        cache.insert(ip, fact.clone());
        fact
    }

    /// Resolve all addresses in bounded batches, attaching results to the
    /// cache. Completion order is irrelevant; renderers re-sort by hop
    /// index. Cancellation stops between batches, keeping completed facts.
    pub async fn resolve_all(
        &self,
        addresses: &[IpAddr],
        cache: &GeoCache,
        batch_size: usize,
        cancel: &CancellationToken,
    ) {
        let batch_size = batch_size.max(1);
        for batch in addresses.chunks(batch_size) {
            if cancel.is_cancelled() {
                break;
            }
            let lookups = batch.iter().map(|&ip| self.resolve(ip, cache));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = join_all(lookups) => {}
            }
        }
    }

    async fn query_primary(&self, ip: IpAddr) -> Option<GeoFact> {
        let mut url = format!("{}/{}/json", self.primary_base, ip);
        if let Some(token) = &self.primary_token {
            url.push_str(&format!("?token={}", token));
        }

        let resp: PrimaryResponse = self
            .client
            .get(&url)
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        // Both coordinate halves must be present and parse as floats;
        // anything less is insufficient even if other fields came back.
        let loc = resp.loc?;
        let (lat_s, lon_s) = loc.split_once(',')?;
        let latitude: f64 = lat_s.trim().parse().ok()?;
        let longitude: f64 = lon_s.trim().parse().ok()?;

        Some(GeoFact {
            address: ip,
            country: sanitize_display(resp.country.as_deref().unwrap_or("Unknown")),
            region: sanitize_display(resp.region.as_deref().unwrap_or("Unknown")),
            city: sanitize_display(resp.city.as_deref().unwrap_or("Unknown")),
            latitude,
            longitude,
            org: resp.org.as_deref().map(sanitize_display),
            source: GeoSource::Primary,
        })
    }

    async fn query_fallback(&self, ip: IpAddr) -> Option<GeoFact> {
        let url = format!(
            "{}/json/{}?fields=status,country,regionName,city,lat,lon,as,query",
            self.fallback_base, ip
        );

        let resp: FallbackResponse = self
            .client
            .get(&url)
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        if resp.status != "success" {
            return None;
        }

        Some(GeoFact {
            address: ip,
            country: sanitize_display(resp.country.as_deref().unwrap_or("Unknown")),
            region: sanitize_display(resp.region_name.as_deref().unwrap_or("Unknown")),
            city: sanitize_display(resp.city.as_deref().unwrap_or("Unknown")),
            latitude: resp.lat?,
            longitude: resp.lon?,
            org: resp.asn.as_deref().map(sanitize_display),
            source: GeoSource::Fallback,
        })
    }
}
