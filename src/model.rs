//! The object model (spec §3): Host, Network, HostGroup, Service, Rule,
//! and the composite FireSet that holds them as ordered tables.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::addr::network_of;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Protocol {
    Ip,
    Tcp,
    Udp,
    Ospf,
    IsIs,
    Sctp,
    Ah,
    Esp,
}

impl Protocol {
    pub fn parse(s: &str) -> Option<Protocol> {
        match s {
            "IP" => Some(Protocol::Ip),
            "TCP" => Some(Protocol::Tcp),
            "UDP" => Some(Protocol::Udp),
            "OSPF" => Some(Protocol::Ospf),
            "IS-IS" => Some(Protocol::IsIs),
            "SCTP" => Some(Protocol::Sctp),
            "AH" => Some(Protocol::Ah),
            "ESP" => Some(Protocol::Esp),
            _ => None,
        }
    }

    /// Lowercase form as emitted after `-p` (spec §4.3).
    pub fn as_iptables_str(&self) -> &'static str {
        match self {
            Protocol::Ip => "ip",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Ospf => "ospf",
            Protocol::IsIs => "is-is",
            Protocol::Sctp => "sctp",
            Protocol::Ah => "ah",
            Protocol::Esp => "esp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub iface: String,
    pub address: Ipv4Addr,
    pub is_management: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl Network {
    /// Normalizes `address` to the canonical network address for
    /// `address/prefix_len`, returning whether a correction was made.
    pub fn normalize(&mut self) -> bool {
        let canonical = network_of(self.address, self.prefix_len);
        let changed = canonical != self.address;
        self.address = canonical;
        changed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostGroup {
    pub name: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub protocol: Option<Protocol>,
    /// Comma-separated list of single ports or `a:b` ranges; empty
    /// means "any port".
    pub ports: String,
}

impl Service {
    /// The reserved `*` service: any protocol, any ports.
    pub fn wildcard() -> Service {
        Service {
            name: "*".to_string(),
            protocol: None,
            ports: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Accept,
    Drop,
}

impl Action {
    pub fn parse(s: &str) -> Option<Action> {
        match s {
            "ACCEPT" => Some(Action::Accept),
            "DROP" => Some(Action::Drop),
            _ => None,
        }
    }

    pub fn as_iptables_str(&self) -> &'static str {
        match self {
            Action::Accept => "ACCEPT",
            Action::Drop => "DROP",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub enabled: bool,
    pub name: String,
    pub src: String,
    pub src_service: String,
    pub dst: String,
    pub dst_service: String,
    pub action: Action,
    pub log_level: u32,
    pub description: String,
}

/// A rule name must match `[A-Za-z0-9_-]+` (spec §3, enforced per §4.3).
pub fn is_valid_rule_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The five editable tables, loaded as ordered sequences. Rule order is
/// semantically significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FireSet {
    pub rules: Vec<Rule>,
    pub hosts: Vec<Host>,
    pub hostgroups: Vec<HostGroup>,
    pub services: Vec<Service>,
    pub networks: Vec<Network>,
    #[serde(skip)]
    dirty: bool,
}

impl FireSet {
    pub fn new(
        rules: Vec<Rule>,
        hosts: Vec<Host>,
        hostgroups: Vec<HostGroup>,
        services: Vec<Service>,
        networks: Vec<Network>,
    ) -> FireSet {
        FireSet {
            rules,
            hosts,
            hostgroups,
            services,
            networks,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn service_by_name(&self, name: &str) -> Option<&Service> {
        if name == "*" {
            return None; // handled by caller via Service::wildcard()
        }
        self.services.iter().find(|s| s.name == name)
    }

    /// All host names for which at least one row is flagged management,
    /// paired with that management address.
    pub fn management_addresses(&self) -> Vec<(String, Ipv4Addr)> {
        let mut names: Vec<&str> = self.hosts.iter().map(|h| h.name.as_str()).collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .filter_map(|name| {
                self.hosts
                    .iter()
                    .find(|h| h.name == name && h.is_management)
                    .map(|h| (name.to_string(), h.address))
            })
            .collect()
    }

    pub fn hostgroup_names(&self) -> HashSet<&str> {
        self.hostgroups.iter().map(|hg| hg.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_normalize_flags_correction() {
        let mut net = Network {
            name: "n1".to_string(),
            address: "10.0.0.5".parse().unwrap(),
            prefix_len: 24,
        };
        assert!(net.normalize());
        assert_eq!(net.address, "10.0.0.0".parse::<Ipv4Addr>().unwrap());
        assert!(!net.normalize());
    }

    #[test]
    fn rule_name_validation() {
        assert!(is_valid_rule_name("r1"));
        assert!(is_valid_rule_name("allow-web_1"));
        assert!(!is_valid_rule_name(""));
        assert!(!is_valid_rule_name("bad name"));
        assert!(!is_valid_rule_name("bad;name"));
    }

    #[test]
    fn management_addresses_picks_flagged_row() {
        let fs = FireSet::new(
            vec![],
            vec![
                Host {
                    name: "A".into(),
                    iface: "eth0".into(),
                    address: "1.1.1.1".parse().unwrap(),
                    is_management: true,
                },
                Host {
                    name: "A".into(),
                    iface: "eth1".into(),
                    address: "10.0.0.1".parse().unwrap(),
                    is_management: false,
                },
            ],
            vec![],
            vec![],
            vec![],
        );
        assert_eq!(
            fs.management_addresses(),
            vec![("A".to_string(), "1.1.1.1".parse::<Ipv4Addr>().unwrap())]
        );
    }
}
