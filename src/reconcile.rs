//! Reconciliation (spec §4.7): validates that declared interfaces and
//! addresses exist on each live host.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{FireletError, Result};
use crate::model::Host;
use crate::parsers::InterfaceAddresses;

/// Checks every declared host row against its fetched interface map.
/// Fatal on the first mismatch; extra interfaces on the host are
/// tolerated but logged (spec §9 resolves the "should warn" open
/// question in favor of warning).
pub fn check_interfaces(hosts: &[Host], remote: &HashMap<String, InterfaceAddresses>) -> Result<()> {
    for host in hosts {
        let ifaces = remote
            .get(&host.name)
            .ok_or_else(|| FireletError::HostUnavailable(host.name.clone()))?;

        let (v4, v6) = ifaces.get(&host.iface).ok_or_else(|| FireletError::MissingInterface {
            host: host.name.clone(),
            iface: host.iface.clone(),
        })?;

        let declared = host.address.to_string();
        let v4_addr = v4.as_ref().and_then(|cidr| cidr.split('/').next());
        let v6_addr = v6.as_deref();
        let matches = v4_addr == Some(declared.as_str()) || v6_addr == Some(declared.as_str());

        if !matches {
            return Err(FireletError::AddressMismatch {
                host: host.name.clone(),
                iface: host.iface.clone(),
                declared,
                actual: v4_addr.or(v6_addr).unwrap_or("none").to_string(),
            });
        }

        for extra_iface in ifaces.keys().filter(|i| *i != &host.iface) {
            warn!(
                host = host.name.as_str(),
                iface = extra_iface.as_str(),
                "extra interface not declared in host table"
            );
        }
    }
    Ok(())
}
