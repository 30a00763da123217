//! Hop extraction: an ordered cascade of pattern families over the pasted
//! trace text. The first family that matches anything wins for the entire
//! trace; auxiliary loss/hostname passes fill in what the winning family
//! could not provide.

pub mod families;
pub mod latency;

use std::collections::HashSet;

use crate::state::{Hop, RouteSummary, UnreachableHop};
use families::{FamilyKind, FamilyMatch, HostResolver};

/// Extraction outcome for one trace
#[derive(Debug)]
pub struct Extraction {
    pub summary: RouteSummary,
    pub family: FamilyKind,
}

/// No address-shaped token was recoverable from any family. A terminal,
/// user-visible condition for the run, not an internal error.
#[derive(Debug, PartialEq, Eq)]
pub struct NoAddresses;

impl std::fmt::Display for NoAddresses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no addresses found in the pasted trace")
    }
}

impl std::error::Error for NoAddresses {}

/// Run the matcher cascade over the raw trace text.
pub fn extract_route(text: &str, resolver: &dyn HostResolver) -> Result<Extraction, NoAddresses> {
    let strategies: [(FamilyKind, Box<dyn Fn() -> FamilyMatch + '_>); 5] = [
        (
            FamilyKind::MtrReport,
            Box::new(|| families::match_mtr_report(text, resolver)),
        ),
        (
            FamilyKind::IndexNameAddress,
            Box::new(|| families::match_index_name_address(text)),
        ),
        (
            FamilyKind::IndexTrailingAddress,
            Box::new(|| families::match_index_trailing_address(text)),
        ),
        (
            FamilyKind::ParentheticalAddress,
            Box::new(|| families::match_parenthetical_address(text)),
        ),
        (
            FamilyKind::BareAddresses,
            Box::new(|| families::match_bare_addresses(text)),
        ),
    ];

    let mut selected = None;
    for (kind, run) in &strategies {
        let m = run();
        if !m.is_empty() {
            selected = Some((*kind, m));
            break;
        }
    }
    let Some((family, mut matched)) = selected else {
        return Err(NoAddresses);
    };

    // Families 2a-2d carry no loss/hostname data of their own; recover it
    // with the standalone index-keyed passes.
    if matched.loss_by_index.is_empty() {
        matched.loss_by_index = families::scan_loss_by_index(text);
    }
    if matched.hostname_by_index.is_empty() {
        matched.hostname_by_index = families::scan_hostname_by_index(text);
    }

    let summary = build_summary(text, matched)?;
    Ok(Extraction { summary, family })
}

/// Deduplicate candidates, merge auxiliary maps, attach latency, and build
/// unreachable markers for 100%-loss indices that produced no address.
fn build_summary(text: &str, matched: FamilyMatch) -> Result<RouteSummary, NoAddresses> {
    let mut seen = HashSet::new();
    let mut hops = Vec::new();

    for cand in matched.candidates {
        // First occurrence of an address wins; later hop indices are dropped
        if !seen.insert(cand.address) {
            continue;
        }
        let mut hop = Hop::new(cand.index, cand.address);
        if let Some(&loss) = matched.loss_by_index.get(&cand.index) {
            hop.loss_pct = loss.clamp(0.0, 100.0);
        }
        if let Some(host) = matched.hostname_by_index.get(&cand.index) {
            if host != "???" && host.parse::<std::net::IpAddr>().is_err() {
                hop.hostname = Some(host.clone());
            }
        }
        if let Some(asn) = matched.asn_by_index.get(&cand.index) {
            hop.asn_tag = Some(asn.clone());
        }
        hop.latency_ms = latency::latency_for_hop(text, &hop);
        hops.push(hop);
    }

    if hops.is_empty() && matched.unresolved_indices.is_empty() {
        return Err(NoAddresses);
    }

    let hop_indices: HashSet<u32> = hops.iter().map(|h| h.index).collect();
    let mut unreachable = Vec::new();
    for &index in &matched.unresolved_indices {
        if hop_indices.contains(&index) {
            continue;
        }
        let loss = matched.loss_by_index.get(&index).copied().unwrap_or(100.0);
        // Only a fully-lost hop is an unreachable marker
        if loss >= 100.0 {
            let label = matched
                .hostname_by_index
                .get(&index)
                .cloned()
                .unwrap_or_else(|| "*".to_string());
            unreachable.push(UnreachableHop {
                index,
                label,
                loss_pct: loss,
            });
        }
    }

    if hops.is_empty() && unreachable.is_empty() {
        return Err(NoAddresses);
    }

    Ok(RouteSummary::new(hops, unreachable))
}
