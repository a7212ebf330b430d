use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

use get_if_addrs::get_if_addrs;
use regex::Regex;
use tracing::warn;

const VIRTUAL_PREFIXES: &[&str] = &[
    "docker", "br-", "veth", "virbr", "vmnet", "vboxnet", "utun", "tun", "tap",
];

fn address_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(:\d+)?$").expect("static regex is valid")
    })
}

fn is_virtual_interface(name: &str) -> bool {
    VIRTUAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn address_rank(name: &str, ip: Ipv4Addr) -> Option<u8> {
    if ip.is_loopback() || ip.is_unspecified() {
        return None;
    }
    let rank = match (ip.is_private(), ip.is_link_local(), is_virtual_interface(name)) {
        (true, _, false) => 0,
        (true, _, true) => 1,
        (false, false, false) => 2,
        (false, false, true) => 3,
        (false, true, _) => 4,
    };
    Some(rank)
}

/// Picks the LAN address among `(interface, address)` pairs: private before public, physical
/// interfaces before bridges and tunnels, link-local last. Ties keep enumeration order.
pub fn pick_local_ipv4<'a>(
    interfaces: impl IntoIterator<Item = (&'a str, Ipv4Addr)>,
) -> Option<Ipv4Addr> {
    interfaces
        .into_iter()
        .filter_map(|(name, ip)| address_rank(name, ip).map(|rank| (rank, ip)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, ip)| ip)
}

pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            warn!(error = %err, "failed to list network interfaces");
            return None;
        }
    };
    let candidates: Vec<(String, Ipv4Addr)> = interfaces
        .into_iter()
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some((iface.name, ip)),
            IpAddr::V6(_) => None,
        })
        .collect();
    pick_local_ipv4(candidates.iter().map(|(name, ip)| (name.as_str(), *ip)))
}

pub fn local_ipv4_or_loopback() -> Ipv4Addr {
    local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST)
}

pub fn is_sweepable(local: Ipv4Addr) -> bool {
    !local.is_loopback() && !local.is_unspecified()
}

/// Hosts .1 through .254 of `local`'s /24, without `local` itself.
pub fn subnet_candidates(local: Ipv4Addr) -> Vec<Ipv4Addr> {
    if !is_sweepable(local) {
        return Vec::new();
    }
    let [a, b, c, _] = local.octets();
    (1..=254u8)
        .map(|host| Ipv4Addr::new(a, b, c, host))
        .filter(|candidate| *candidate != local)
        .collect()
}

pub fn is_valid_address_input(value: &str) -> bool {
    address_input_re().is_match(value.trim())
}

/// Validates `ip[:port]` and appends `default_port` when no port is given.
pub fn normalize_address(value: &str, default_port: u16) -> Result<String, String> {
    let trimmed = value.trim();
    if !is_valid_address_input(trimmed) {
        return Err(format!("'{trimmed}' is not an IPv4 address (expected a.b.c.d[:port])"));
    }
    let (host, port) = match trimmed.split_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().ok().filter(|port| *port != 0)),
        None => (trimmed, Some(default_port)),
    };
    let host = host
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("'{host}' is not a valid IPv4 address"))?;
    let port = port.ok_or_else(|| format!("'{trimmed}' has an invalid port"))?;
    Ok(format!("{host}:{port}"))
}
