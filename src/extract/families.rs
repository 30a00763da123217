//! Ordered matcher families for traceroute/MTR text.
//!
//! Each family is a self-contained strategy over the whole trace. The
//! cascade in `extract` evaluates them in priority order and commits to the
//! first family that yields at least one match; families are never mixed
//! per line. This is best-effort pattern matching over free-text router
//! output, not a grammar.

use regex::Regex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

/// Which family produced the extraction (for logging and tests)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    /// `index  AS-token  host  loss%` (mtr -rz style, full fidelity)
    MtrReport,
    /// `index  device-name  a.b.c.d`
    IndexNameAddress,
    /// index at line start, first address anywhere after it
    IndexTrailingAddress,
    /// `index ... (a.b.c.d)` numbered-list style
    ParentheticalAddress,
    /// every address-shaped token, synthetic indices
    BareAddresses,
}

/// One hop candidate before deduplication
#[derive(Debug, Clone)]
pub struct HopCandidate {
    pub index: u32,
    pub address: IpAddr,
}

/// Raw yield of one family over the whole trace
#[derive(Debug, Default)]
pub struct FamilyMatch {
    pub candidates: Vec<HopCandidate>,
    /// Packet loss by hop index (family 1 only)
    pub loss_by_index: HashMap<u32, f64>,
    /// Hostname or unknown-marker by hop index (family 1 only)
    pub hostname_by_index: HashMap<u32, String>,
    /// AS tag by hop index (family 1 only)
    pub asn_by_index: HashMap<u32, String>,
    /// Indices whose host could not be turned into an address (family 1 only)
    pub unresolved_indices: Vec<u32>,
}

impl FamilyMatch {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.unresolved_indices.is_empty()
    }
}

/// Forward-resolution seam so the cascade is testable without DNS
pub trait HostResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// System resolver backed by `ToSocketAddrs`
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        use std::net::ToSocketAddrs;
        format!("{}:0", host)
            .to_socket_addrs()
            .ok()?
            .map(|s| s.ip())
            .next()
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

/// IPv4-shaped token. Octet range is checked by the address parse, which
/// silently discards shapes like 999.1.2.3.
const IPV4_TOKEN: &str = r"(?:\d{1,3}\.){3}\d{1,3}";

pub(crate) fn parse_ipv4(token: &str) -> Option<IpAddr> {
    token.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Family 1: `  2. AS15169  dns.google  0.0%` (mtr -rz report lines).
/// The host slot may be a literal address, a resolvable hostname, or the
/// `???` unknown marker. Loss and AS tag are captured in the same pass.
pub fn match_mtr_report(text: &str, resolver: &dyn HostResolver) -> FamilyMatch {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"(?m)^\s*(\d+)\.?\|?-*\s+(AS\d+|AS\?\?\?)\s+(\S+)\s+(\d+(?:\.\d+)?)%",
    );

    let mut out = FamilyMatch::default();
    for caps in re.captures_iter(text) {
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        let asn = &caps[2];
        let host = &caps[3];
        let loss: f64 = caps[4].parse().unwrap_or(0.0);

        out.loss_by_index.insert(index, loss);
        out.hostname_by_index.insert(index, host.to_string());
        if asn != "AS???" {
            out.asn_by_index.insert(index, asn.to_string());
        }

        // Literal address, then DNS, then give up on this index
        let address = if host == "???" {
            None
        } else if let Ok(ip) = host.parse::<IpAddr>() {
            Some(ip)
        } else {
            resolver.resolve(host)
        };

        match address {
            Some(address) => out.candidates.push(HopCandidate { index, address }),
            None => out.unresolved_indices.push(index),
        }
    }
    out
}

/// Family 2a: `3  core-rtr1  203.0.113.1`, a named device followed by a
/// bare address. The name must not itself look like an address.
pub fn match_index_name_address(text: &str) -> FamilyMatch {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        &format!(r"(?m)^\s*(\d+)[.)]?\s+([A-Za-z][\w.:-]*)\s+({})(?:\s|$)", IPV4_TOKEN),
    );

    let mut out = FamilyMatch::default();
    for caps in re.captures_iter(text) {
        if let (Ok(index), Some(address)) = (caps[1].parse::<u32>(), parse_ipv4(&caps[3])) {
            out.candidates.push(HopCandidate { index, address });
        }
    }
    out
}

/// Family 2b: index at line start, first address-shaped token after it.
pub fn match_index_trailing_address(text: &str) -> FamilyMatch {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, &format!(r"(?m)^\s*(\d+)[.)]?\s.*?({})", IPV4_TOKEN));

    let mut out = FamilyMatch::default();
    for caps in re.captures_iter(text) {
        if let (Ok(index), Some(address)) = (caps[1].parse::<u32>(), parse_ipv4(&caps[2])) {
            out.candidates.push(HopCandidate { index, address });
        }
    }
    out
}

/// Family 2c: `1  gw.example.net (192.0.2.1)  1.1 ms`, address in parens.
pub fn match_parenthetical_address(text: &str) -> FamilyMatch {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, &format!(r"(?m)^\s*(\d+)[.)]?\s+.*?\(({})\)", IPV4_TOKEN));

    let mut out = FamilyMatch::default();
    for caps in re.captures_iter(text) {
        if let (Ok(index), Some(address)) = (caps[1].parse::<u32>(), parse_ipv4(&caps[2])) {
            out.candidates.push(HopCandidate { index, address });
        }
    }
    out
}

/// Family 2d, last resort: every address-shaped token in the text with
/// synthetic sequential hop indices.
pub fn match_bare_addresses(text: &str) -> FamilyMatch {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, &format!(r"\b({})\b", IPV4_TOKEN));

    let mut out = FamilyMatch::default();
    let mut next_index = 1u32;
    for caps in re.captures_iter(text) {
        if let Some(address) = parse_ipv4(&caps[1]) {
            out.candidates.push(HopCandidate {
                index: next_index,
                address,
            });
            next_index += 1;
        }
    }
    out
}

/// Standalone `index ... percentage` pass, used when family 1 did not run.
pub fn scan_loss_by_index(text: &str) -> HashMap<u32, f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"(?m)^\s*(\d+)[.)]?\s.*?(\d+(?:\.\d+)?)%");

    let mut out = HashMap::new();
    for caps in re.captures_iter(text) {
        if let (Ok(index), Ok(loss)) = (caps[1].parse::<u32>(), caps[2].parse::<f64>()) {
            out.entry(index).or_insert(loss);
        }
    }
    out
}

/// Standalone `index ... token` pass for hostnames, used when family 1 did
/// not run. Tokens that are themselves addresses are not hostnames.
pub fn scan_hostname_by_index(text: &str) -> HashMap<u32, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"(?m)^\s*(\d+)[.)]?\s+(\S+)");

    let mut out = HashMap::new();
    for caps in re.captures_iter(text) {
        let token = &caps[2];
        if token.parse::<IpAddr>().is_ok() {
            continue;
        }
        if let Ok(index) = caps[1].parse::<u32>() {
            out.entry(index).or_insert_with(|| token.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDns;
    impl HostResolver for NoDns {
        fn resolve(&self, _host: &str) -> Option<IpAddr> {
            None
        }
    }

    struct FixedDns(IpAddr);
    impl HostResolver for FixedDns {
        fn resolve(&self, _host: &str) -> Option<IpAddr> {
            Some(self.0)
        }
    }

    #[test]
    fn test_mtr_report_full_fidelity() {
        let text = "\
HOST: laptop            Loss%   Snt   Last   Avg  Best  Wrst StDev
  1. AS???    192.168.1.1     0.0%    10    0.4   0.4   0.3   0.5
  2. AS15169  8.8.8.8         5.0%    10   12.3  12.5  12.1  13.0
";
        let m = match_mtr_report(text, &NoDns);
        assert_eq!(m.candidates.len(), 2);
        assert_eq!(m.candidates[1].index, 2);
        assert_eq!(m.candidates[1].address, "8.8.8.8".parse::<IpAddr>().unwrap());
        assert_eq!(m.loss_by_index[&2], 5.0);
        assert_eq!(m.asn_by_index.get(&2).map(String::as_str), Some("AS15169"));
        // AS??? is the unknown marker, not a tag
        assert!(!m.asn_by_index.contains_key(&1));
    }

    #[test]
    fn test_mtr_report_resolves_hostnames() {
        let text = "  3. AS3320  core.example.net  0.0%  10  8.1  8.2  8.0  8.5\n";
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let m = match_mtr_report(text, &FixedDns(ip));
        assert_eq!(m.candidates.len(), 1);
        assert_eq!(m.candidates[0].address, ip);
        assert_eq!(m.hostname_by_index[&3], "core.example.net");
    }

    #[test]
    fn test_mtr_report_unknown_host_yields_no_candidate() {
        let text = "  4. AS???   ???             100.0    10  0.0\n";
        // Note: loss column here has no trailing %; the family requires one
        let m = match_mtr_report(text, &NoDns);
        assert!(m.is_empty());

        let text = "  4. AS???   ???             100.0%   10  0.0\n";
        let m = match_mtr_report(text, &NoDns);
        assert!(m.candidates.is_empty());
        assert_eq!(m.unresolved_indices, vec![4]);
        assert_eq!(m.loss_by_index[&4], 100.0);
        assert_eq!(m.hostname_by_index[&4], "???");
    }

    #[test]
    fn test_index_name_address() {
        let text = " 1 edge-gw1 198.51.100.1\n 2 core-rtr7 198.51.100.33\n";
        let m = match_index_name_address(text);
        assert_eq!(m.candidates.len(), 2);
        assert_eq!(m.candidates[0].index, 1);
        assert_eq!(m.candidates[1].address, "198.51.100.33".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_index_name_address_skips_parenthetical() {
        // Parenthesized addresses belong to family 2c, not 2a
        let text = " 1  gw.example.net (192.0.2.1)  1.1 ms\n";
        assert!(match_index_name_address(text).is_empty());
    }

    #[test]
    fn test_index_trailing_address() {
        let text = "1.  192.168.1.1  0.0%\n2.  8.8.8.8  0.0% 12.3 ms\n";
        let m = match_index_trailing_address(text);
        assert_eq!(m.candidates.len(), 2);
        assert_eq!(m.candidates[0].address, "192.168.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(m.candidates[1].index, 2);
    }

    #[test]
    fn test_parenthetical_address() {
        let text = " 1  gw (192.0.2.1)  1.1 ms\n 2  upstream (192.0.2.77)  8.3 ms\n";
        let m = match_parenthetical_address(text);
        assert_eq!(m.candidates.len(), 2);
        assert_eq!(m.candidates[1].address, "192.0.2.77".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_bare_addresses_synthetic_indices() {
        let text = "path goes 192.0.2.1 then 198.51.100.2 then 203.0.113.3";
        let m = match_bare_addresses(text);
        let indices: Vec<u32> = m.candidates.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_octets_are_dropped() {
        let m = match_bare_addresses("bogus 999.1.2.3 real 192.0.2.1");
        assert_eq!(m.candidates.len(), 1);
        assert_eq!(m.candidates[0].address, "192.0.2.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_scan_loss_by_index() {
        let text = "1.  192.168.1.1  0.0%\n2.  8.8.8.8  12.5%\n";
        let loss = scan_loss_by_index(text);
        assert_eq!(loss[&1], 0.0);
        assert_eq!(loss[&2], 12.5);
    }

    #[test]
    fn test_scan_hostname_skips_addresses() {
        let text = "1  gw.example.net (192.0.2.1)\n2  198.51.100.7\n";
        let hosts = scan_hostname_by_index(text);
        assert_eq!(hosts.get(&1).map(String::as_str), Some("gw.example.net"));
        assert!(!hosts.contains_key(&2));
    }
}
