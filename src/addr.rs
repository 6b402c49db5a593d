//! IPv4 address/network arithmetic (spec §4.1).
//!
//! All arithmetic is 32-bit unsigned; IPv6 containment is not required
//! for compilation and is not implemented here.

use std::net::Ipv4Addr;

/// The network address of `addr/prefix`: `addr` with all bits below
/// `prefix` cleared.
pub fn network_of(addr: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let mask = prefix_mask(prefix);
    Ipv4Addr::from(u32::from(addr) & mask)
}

fn prefix_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix as u32)
    }
}

/// Does `net` (given as `address/prefix`) contain `host`?
pub fn contains_host(net_addr: Ipv4Addr, net_prefix: u8, host: Ipv4Addr) -> bool {
    network_of(host, net_prefix) == net_addr
}

/// Does `net` (given as `address/prefix`) contain `other` (also an
/// `address/prefix`)? True iff the address falls within `net` and
/// `other`'s prefix is at least as specific.
pub fn contains_net(net_addr: Ipv4Addr, net_prefix: u8, other_addr: Ipv4Addr, other_prefix: u8) -> bool {
    network_of(other_addr, net_prefix) == net_addr && other_prefix >= net_prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn network_of_clears_host_bits() {
        assert_eq!(network_of(a("10.0.0.5"), 24), a("10.0.0.0"));
        assert_eq!(network_of(a("192.168.1.200"), 25), a("192.168.1.128"));
        assert_eq!(network_of(a("1.2.3.4"), 32), a("1.2.3.4"));
        assert_eq!(network_of(a("1.2.3.4"), 0), a("0.0.0.0"));
    }

    #[test]
    fn network_of_is_idempotent() {
        for (addr, prefix) in [("10.0.0.5", 24), ("172.16.5.9", 16), ("8.8.8.8", 32)] {
            let once = network_of(a(addr), prefix);
            let twice = network_of(once, prefix);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn contains_host_matches_network_of() {
        let net = a("10.0.0.0");
        assert!(contains_host(net, 24, a("10.0.0.5")));
        assert!(!contains_host(net, 24, a("10.0.1.5")));
    }

    #[test]
    fn contains_net_requires_narrower_or_equal_prefix() {
        let net = a("10.0.0.0");
        assert!(contains_net(net, 16, a("10.0.5.0"), 24));
        assert!(!contains_net(net, 24, a("10.0.0.0"), 16));
        assert!(!contains_net(net, 24, a("10.1.0.0"), 24));
    }
}
