//! Persisted-table loader (spec §4.9, §6.3): reads the five CSV tables
//! from a repo directory and assembles a `FireSet`. This is the shape
//! the bundled CLI and its fixtures use; the core pipeline itself only
//! ever consumes an already-built `FireSet`.

use std::path::Path;

use csv::ReaderBuilder;
use tracing::warn;

use crate::error::{FireletError, Result};
use crate::model::{Action, FireSet, Host, HostGroup, Network, Protocol, Rule, Service};

fn reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(FireletError::from)
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, table: &str) -> Result<&'a str> {
    record.get(idx).ok_or_else(|| {
        FireletError::Config(format!("{table}: row has too few fields: {:?}", record))
    })
}

fn load_hosts(dir: &Path) -> Result<Vec<Host>> {
    let path = dir.join("hosts.csv");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(&path)?;
    let mut hosts = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = field(&record, 0, "hosts")?.to_string();
        let iface = field(&record, 1, "hosts")?.to_string();
        let address = field(&record, 2, "hosts")?
            .parse()
            .map_err(|_| FireletError::Config(format!("hosts: bad address for '{name}'")))?;
        let is_management = matches!(field(&record, 3, "hosts")?, "1" | "y");
        hosts.push(Host {
            name,
            iface,
            address,
            is_management,
        });
    }
    Ok(hosts)
}

fn load_networks(dir: &Path) -> Result<Vec<Network>> {
    let path = dir.join("networks.csv");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(&path)?;
    let mut networks = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = field(&record, 0, "networks")?.to_string();
        let address = field(&record, 1, "networks")?
            .parse()
            .map_err(|_| FireletError::Config(format!("networks: bad address for '{name}'")))?;
        let prefix_len: u8 = field(&record, 2, "networks")?
            .parse()
            .map_err(|_| FireletError::Config(format!("networks: bad prefix for '{name}'")))?;
        let mut net = Network {
            name,
            address,
            prefix_len,
        };
        if net.normalize() {
            warn!(network = net.name.as_str(), "normalized to canonical network address on load");
        }
        networks.push(net);
    }
    Ok(networks)
}

fn load_hostgroups(dir: &Path) -> Result<Vec<HostGroup>> {
    let path = dir.join("hostgroups.csv");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(&path)?;
    let mut hostgroups = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = field(&record, 0, "hostgroups")?.to_string();
        let children = record.iter().skip(1).map(|s| s.to_string()).collect();
        hostgroups.push(HostGroup { name, children });
    }
    Ok(hostgroups)
}

fn load_services(dir: &Path) -> Result<Vec<Service>> {
    let path = dir.join("services.csv");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(&path)?;
    let mut services = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = field(&record, 0, "services")?.to_string();
        let protocol_field = field(&record, 1, "services")?;
        let protocol = if protocol_field.is_empty() {
            None
        } else {
            Some(Protocol::parse(protocol_field).ok_or_else(|| {
                FireletError::Config(format!("services: unknown protocol '{protocol_field}' for '{name}'"))
            })?)
        };
        let ports = record.get(2).unwrap_or("").to_string();
        services.push(Service {
            name,
            protocol,
            ports,
        });
    }
    Ok(services)
}

fn load_rules(dir: &Path) -> Result<Vec<Rule>> {
    let path = dir.join("rules.csv");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(&path)?;
    let mut rules = Vec::new();
    for record in reader.records() {
        let record = record?;
        let enabled_field = field(&record, 0, "rules")?;
        let name = field(&record, 1, "rules")?.to_string();
        let enabled = match enabled_field {
            "y" => true,
            "n" => false,
            other => {
                return Err(FireletError::BadField {
                    rule: name,
                    detail: format!("enabled must be 'y' or 'n', got '{other}'"),
                })
            }
        };
        let src = field(&record, 2, "rules")?.to_string();
        let src_service = field(&record, 3, "rules")?.to_string();
        let dst = field(&record, 4, "rules")?.to_string();
        let dst_service = field(&record, 5, "rules")?.to_string();
        let action_field = field(&record, 6, "rules")?;
        let action = Action::parse(action_field).ok_or_else(|| FireletError::BadField {
            rule: name.clone(),
            detail: format!("action must be ACCEPT or DROP, got '{action_field}'"),
        })?;
        let log_field = field(&record, 7, "rules")?;
        let log_level: u32 = log_field.parse().map_err(|_| FireletError::BadField {
            rule: name.clone(),
            detail: format!("log_level must be a non-negative integer, got '{log_field}'"),
        })?;
        let description = record.get(8).unwrap_or("").to_string();

        rules.push(Rule {
            enabled,
            name,
            src,
            src_service,
            dst,
            dst_service,
            action,
            log_level,
            description,
        });
    }
    Ok(rules)
}

/// Loads the five tables named in spec §6.3 from `dir` and builds a
/// `FireSet`. Missing files are treated as empty tables.
pub fn load_fireset(dir: &Path) -> Result<FireSet> {
    let rules = load_rules(dir)?;
    let hosts = load_hosts(dir)?;
    let hostgroups = load_hostgroups(dir)?;
    let services = load_services(dir)?;
    let networks = load_networks(dir)?;
    Ok(FireSet::new(rules, hosts, hostgroups, services, networks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn loads_minimal_repo() {
        let dir = tempdir().unwrap();
        write(dir.path(), "hosts.csv", "A eth0 1.1.1.1 1\nB eth0 2.2.2.2 1\n");
        write(dir.path(), "rules.csv", "y r1 A * B * ACCEPT 0 \"\"\n");

        let fireset = load_fireset(dir.path()).unwrap();
        assert_eq!(fireset.hosts.len(), 2);
        assert_eq!(fireset.rules.len(), 1);
        assert!(fireset.rules[0].enabled);
        assert_eq!(fireset.rules[0].action, Action::Accept);
    }

    #[test]
    fn missing_tables_are_empty() {
        let dir = tempdir().unwrap();
        let fireset = load_fireset(dir.path()).unwrap();
        assert!(fireset.hosts.is_empty());
        assert!(fireset.rules.is_empty());
    }

    #[test]
    fn normalizes_non_canonical_network() {
        let dir = tempdir().unwrap();
        write(dir.path(), "networks.csv", "lan 10.0.0.5 24\n");
        let fireset = load_fireset(dir.path()).unwrap();
        assert_eq!(fireset.networks[0].address, "10.0.0.0".parse::<std::net::Ipv4Addr>().unwrap());
    }

    #[test]
    fn hostgroup_children_are_remaining_fields() {
        let dir = tempdir().unwrap();
        write(dir.path(), "hostgroups.csv", "grp A:eth0 B:eth0\n");
        let fireset = load_fireset(dir.path()).unwrap();
        assert_eq!(fireset.hostgroups[0].children, vec!["A:eth0", "B:eth0"]);
    }

    #[test]
    fn bad_action_is_rejected() {
        let dir = tempdir().unwrap();
        write(dir.path(), "rules.csv", "y r1 A * B * MAYBE 0 \"\"\n");
        let err = load_fireset(dir.path()).unwrap_err();
        assert!(matches!(err, FireletError::BadField { .. }));
    }
}
