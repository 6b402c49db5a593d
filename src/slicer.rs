//! Per-host slicer (spec §4.4): partitions the compiled directive list
//! into `{host -> {iface -> [directive...]}}`.

use std::collections::HashMap;

use crate::compiler::Directive;
use crate::model::Host;

/// Decides whether a compiled directive belongs to a given host.
///
/// The default implementation is a documented approximation (see spec
/// §9): it does not match subnet membership, only a literal substring
/// match on the host's address. Exposed as a trait so a subnet-aware
/// matcher can be substituted without touching the slicer's grouping
/// logic.
pub trait SliceMatcher {
    fn matches(&self, directive: &Directive, host: &Host) -> bool;
}

/// The substring matcher described in spec §4.4 and flagged as a known
/// approximation in §9.
pub struct SubstringMatcher;

impl SliceMatcher for SubstringMatcher {
    fn matches(&self, directive: &Directive, host: &Host) -> bool {
        directive.contains(&host.address.to_string())
    }
}

pub type SlicedRules = HashMap<String, HashMap<String, Vec<Directive>>>;

/// Slices `directives` by host using the default substring matcher.
pub fn slice(hosts: &[Host], directives: &[Directive]) -> SlicedRules {
    slice_with(hosts, directives, &SubstringMatcher)
}

/// Slices `directives` by host using a caller-supplied matching strategy.
pub fn slice_with(hosts: &[Host], directives: &[Directive], matcher: &dyn SliceMatcher) -> SlicedRules {
    let mut out: SlicedRules = HashMap::new();

    for host in hosts {
        let ifaces = out.entry(host.name.clone()).or_default();
        let matched: Vec<Directive> = directives
            .iter()
            .filter(|d| matcher.matches(d, host))
            .cloned()
            .collect();
        ifaces.entry(host.iface.clone()).or_insert(matched);
    }

    out
}
