// ── Subnet sweep planning ──
//
// Builds the ordered candidate list for a local /24 sweep: hot ranges
// recorded by previous runs first, then the conventional host
// suffixes, then (optionally) the rest of the subnet. Edge appliances
// ship listening on one of a short list of conventional ports.

use std::net::{Ipv4Addr, UdpSocket};

use crate::model::OctetRange;

/// Ports an edge appliance conventionally listens on.
pub const SWEEP_PORTS: [u16; 4] = [3000, 3001, 3002, 8080];

/// Host suffixes tried when no hot ranges are known: router-adjacent
/// static assignments, the common DHCP pool start, and the top of the
/// subnet.
pub const CONVENTIONAL_RANGES: [OctetRange; 3] = [
    OctetRange { start: 1, end: 10 },
    OctetRange { start: 100, end: 110 },
    OctetRange { start: 254, end: 254 },
];

/// Best-effort local IPv4 discovery: a connected UDP socket reveals
/// the address the OS would route external traffic from. No packet is
/// sent.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(addr) => Some(*addr.ip()),
        std::net::SocketAddr::V6(_) => None,
    }
}

/// Ordered, deduplicated sweep hosts for the /24 containing `local`.
///
/// Hot ranges lead, conventional ranges follow, and `full_range`
/// appends every remaining host suffix (1-254).
pub fn candidate_hosts(
    local: Ipv4Addr,
    hot_ranges: &[OctetRange],
    full_range: bool,
) -> Vec<Ipv4Addr> {
    let [a, b, c, _] = local.octets();
    let mut seen = [false; 256];
    let mut hosts = Vec::new();

    let mut push = |octet: u8| {
        if octet != 0 && octet != 255 && !seen[usize::from(octet)] {
            seen[usize::from(octet)] = true;
            hosts.push(Ipv4Addr::new(a, b, c, octet));
        }
    };

    for range in hot_ranges {
        for octet in range.iter() {
            push(octet);
        }
    }
    for range in &CONVENTIONAL_RANGES {
        for octet in range.iter() {
            push(octet);
        }
    }
    if full_range {
        for octet in 1..=254 {
            push(octet);
        }
    }

    hosts
}

/// Expand hosts into probe candidates, host-major: every port of a
/// host is tried before moving to the next host.
pub fn candidate_endpoints(hosts: &[Ipv4Addr], ports: &[u16]) -> Vec<(Ipv4Addr, u16)> {
    hosts
        .iter()
        .flat_map(|&host| ports.iter().map(move |&port| (host, port)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 23);

    #[test]
    fn hot_ranges_come_first() {
        let hot = [OctetRange::new(40, 42)];
        let hosts = candidate_hosts(LOCAL, &hot, false);

        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 4, 40));
        assert_eq!(hosts[1], Ipv4Addr::new(192, 168, 4, 41));
        assert_eq!(hosts[2], Ipv4Addr::new(192, 168, 4, 42));
        assert_eq!(hosts[3], Ipv4Addr::new(192, 168, 4, 1));
    }

    #[test]
    fn conventional_sweep_covers_expected_count() {
        // 10 + 11 + 1 conventional suffixes, no hot ranges.
        let hosts = candidate_hosts(LOCAL, &[], false);
        assert_eq!(hosts.len(), 22);
        assert!(hosts.contains(&Ipv4Addr::new(192, 168, 4, 254)));
    }

    #[test]
    fn overlapping_hot_range_does_not_duplicate() {
        let hot = [OctetRange::new(5, 10)];
        let hosts = candidate_hosts(LOCAL, &hot, false);
        let fives = hosts
            .iter()
            .filter(|h| h.octets()[3] == 5)
            .count();
        assert_eq!(fives, 1);
    }

    #[test]
    fn full_range_reaches_every_host() {
        let hosts = candidate_hosts(LOCAL, &[], true);
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.iter().any(|h| h.octets()[3] == 0));
        assert!(!hosts.iter().any(|h| h.octets()[3] == 255));
    }

    #[test]
    fn endpoints_are_host_major() {
        let hosts = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let endpoints = candidate_endpoints(&hosts, &[3000, 8080]);
        assert_eq!(
            endpoints,
            vec![
                (hosts[0], 3000),
                (hosts[0], 8080),
                (hosts[1], 3000),
                (hosts[1], 8080),
            ]
        );
    }
}
