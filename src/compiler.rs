//! Rule compiler (spec §4.3): turns the rule table into a deterministic
//! ordered list of packet-filter directives.

use crate::error::{FireletError, Result};
use crate::model::{is_valid_rule_name, FireSet, Service};
use crate::resolver::{resolve, ResolvedAddr};

/// One compiled packet-filter line, e.g. `-A FORWARD -s 1.1.1.1 -j ACCEPT`.
pub type Directive = String;

/// Compiles the firewall rule table into an ordered list of directives.
///
/// Aborts with the first fatal error encountered: `ConfigurationDirty`,
/// `BadName`, `BadField`, `ProtocolMismatch`, `UnknownEndpoint`, or
/// `CyclicHostGroup`.
pub fn compile(fireset: &FireSet) -> Result<Vec<Directive>> {
    if fireset.is_dirty() {
        return Err(FireletError::ConfigurationDirty);
    }

    let mut out = Vec::new();
    for rule in &fireset.rules {
        if !is_valid_rule_name(&rule.name) {
            return Err(FireletError::BadName(rule.name.clone()));
        }
        if !rule.enabled {
            continue;
        }

        let src_service = resolve_service(fireset, &rule.src_service, &rule.name)?;
        let dst_service = resolve_service(fireset, &rule.dst_service, &rule.name)?;

        let protocol = match (&src_service.protocol, &dst_service.protocol) {
            (Some(ps), Some(pd)) if ps != pd => {
                return Err(FireletError::ProtocolMismatch(rule.name.clone()));
            }
            (_, Some(pd)) => Some(pd.clone()),
            (Some(ps), None) => Some(ps.clone()),
            (None, None) => None,
        };

        let srcs = resolve(fireset, &rule.src)?;
        let dsts = resolve(fireset, &rule.dst)?;

        let proto_fragment = protocol
            .as_ref()
            .map(|p| format!(" -p {}", p.as_iptables_str()))
            .unwrap_or_default();
        let sport_fragment = port_fragment("sport", &src_service.ports);
        let dport_fragment = port_fragment("dport", &dst_service.ports);

        for s in &srcs {
            for d in &dsts {
                let src_fragment = addr_fragment("s", s);
                let dst_fragment = addr_fragment("d", d);
                if rule.log_level > 0 {
                    out.push(format!(
                        "-A FORWARD{proto}{src}{sport}{dst}{dport} --log-level {level} --log-prefix {name} -j LOG",
                        proto = proto_fragment,
                        src = src_fragment,
                        sport = sport_fragment,
                        dst = dst_fragment,
                        dport = dport_fragment,
                        level = rule.log_level,
                        name = rule.name,
                    ));
                }
                out.push(format!(
                    "-A FORWARD{proto}{src}{sport}{dst}{dport} -j {action}",
                    proto = proto_fragment,
                    src = src_fragment,
                    sport = sport_fragment,
                    dst = dst_fragment,
                    dport = dport_fragment,
                    action = rule.action.as_iptables_str(),
                ));
            }
        }
    }

    Ok(out)
}

fn resolve_service(fireset: &FireSet, name: &str, rule_name: &str) -> Result<Service> {
    if name.is_empty() || name == "*" {
        return Ok(Service::wildcard());
    }
    fireset
        .service_by_name(name)
        .cloned()
        .ok_or_else(|| FireletError::BadField {
            rule: rule_name.to_string(),
            detail: format!("unknown service '{}'", name),
        })
}

fn port_fragment(flag: &str, ports: &str) -> String {
    if ports.is_empty() {
        String::new()
    } else if ports.contains(',') {
        format!(" -m multiport --{} {}", flag, ports)
    } else {
        format!(" --{} {}", flag, ports)
    }
}

fn addr_fragment(flag: &str, resolved: &ResolvedAddr) -> String {
    match resolved {
        ResolvedAddr::Wildcard => String::new(),
        ResolvedAddr::Addr(a) => format!(" -{} {}", flag, a),
    }
}
