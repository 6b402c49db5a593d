//! Endpoint resolution (spec §4.2): expands a symbolic endpoint into a
//! set of concrete addresses or the wildcard.

use std::collections::HashSet;

use crate::error::{FireletError, Result};
use crate::model::FireSet;

/// One resolved element of an endpoint's address set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAddr {
    /// "any address" — emitted as no `-s`/`-d` filter.
    Wildcard,
    /// A concrete `address` or `address/prefix` string.
    Addr(String),
}

/// Resolves a symbolic endpoint, first match wins (spec §4.2):
/// 1. `*` → wildcard
/// 2. `name:iface` → the host's address
/// 3. a network name → `addr/prefix`
/// 4. a hostgroup name → recursive flattening of its children
/// 5. otherwise `UnknownEndpoint`
pub fn resolve(fireset: &FireSet, endpoint: &str) -> Result<Vec<ResolvedAddr>> {
    let mut in_progress = HashSet::new();
    resolve_inner(fireset, endpoint, &mut in_progress)
}

fn resolve_inner<'a>(
    fireset: &'a FireSet,
    endpoint: &str,
    in_progress: &mut HashSet<&'a str>,
) -> Result<Vec<ResolvedAddr>> {
    if endpoint == "*" {
        return Ok(vec![ResolvedAddr::Wildcard]);
    }

    if let Some((name, iface)) = endpoint.split_once(':') {
        if let Some(host) = fireset
            .hosts
            .iter()
            .find(|h| h.name == name && h.iface == iface)
        {
            return Ok(vec![ResolvedAddr::Addr(host.address.to_string())]);
        }
    }

    if let Some(net) = fireset.networks.iter().find(|n| n.name == endpoint) {
        return Ok(vec![ResolvedAddr::Addr(format!(
            "{}/{}",
            net.address, net.prefix_len
        ))]);
    }

    if let Some(hg) = fireset.hostgroups.iter().find(|h| h.name == endpoint) {
        let key: &'a str = hg.name.as_str();
        if !in_progress.insert(key) {
            return Err(FireletError::CyclicHostGroup(endpoint.to_string()));
        }
        let mut out = Vec::new();
        for child in &hg.children {
            out.extend(resolve_inner(fireset, child, in_progress)?);
        }
        in_progress.remove(key);
        return Ok(out);
    }

    Err(FireletError::UnknownEndpoint(endpoint.to_string()))
}
