//! Remote state parsers (spec §4.6): `iptables-save` and `ip addr show`
//! output, parsed into structured form.

use std::collections::HashMap;

const FORWARDING_PREFIXES: &[&str] = &[
    "-A PREROUTING",
    "-A POSTROUTING",
    "-A OUTPUT",
    "-A INPUT",
    "-A FORWARD",
];

/// `{nat: joined-by-newline, filter: [retained lines]}` (spec §4.6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptablesSave {
    pub nat: String,
    pub filter: Vec<String>,
}

/// Parses `iptables-save` output (spec §4.6, §6.2). Missing sections
/// yield empty results rather than an error.
pub fn parse_iptables_save(lines: &[String]) -> IptablesSave {
    let nat_block = extract_block(lines, "*nat");
    let filter_block = extract_block(lines, "*filter");

    let nat = nat_block
        .into_iter()
        .filter(|l| is_forwarding_line(l))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    let filter = filter_block
        .into_iter()
        .filter(|l| is_forwarding_line(l))
        .cloned()
        .collect();

    IptablesSave { nat, filter }
}

fn is_forwarding_line(line: &str) -> bool {
    FORWARDING_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Returns the lines strictly between a line equal to `tag` and the
/// next line equal to `COMMIT`. Empty if `tag` never appears.
fn extract_block<'a>(lines: &'a [String], tag: &str) -> Vec<&'a String> {
    let start = match lines.iter().position(|l| l == tag) {
        Some(i) => i + 1,
        None => return Vec::new(),
    };
    let rest = &lines[start..];
    let end = rest.iter().position(|l| l == "COMMIT").unwrap_or(rest.len());
    rest[..end].iter().collect()
}

/// `{iface -> (ipv4_cidr?, ipv6_cidr?)}` (spec §4.6).
pub type InterfaceAddresses = HashMap<String, (Option<String>, Option<String>)>;

/// Parses `ip addr show` output (spec §4.6, §6.2). The first header
/// line (kernel index) is skipped.
pub fn parse_ip_addr_show(lines: &[String]) -> InterfaceAddresses {
    let mut out = InterfaceAddresses::new();
    let mut current: Option<(String, Option<String>, Option<String>)> = None;

    for line in lines.iter().skip(1) {
        if !line.is_empty() && !line.starts_with(' ') {
            if let Some((iface, v4, v6)) = current.take() {
                out.insert(iface, (v4, v6));
            }
            let iface = line
                .split_whitespace()
                .nth(1)
                .map(|s| s.trim_end_matches(':').to_string())
                .unwrap_or_default();
            current = Some((iface, None, None));
        } else if line.starts_with("    inet ") {
            if let Some((_, v4, _)) = current.as_mut() {
                *v4 = line.split_whitespace().nth(1).map(|s| s.to_string());
            }
        } else if line.starts_with("    inet6 ") {
            if let Some((_, _, v6)) = current.as_mut() {
                *v6 = line.split_whitespace().nth(1).map(|s| s.to_string());
            }
        }
    }
    if let Some((iface, v4, v6)) = current {
        out.insert(iface, (v4, v6));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn parses_nat_and_filter_sections() {
        let input = lines(
            "*nat\n\
             :PREROUTING ACCEPT\n\
             -A PREROUTING -j DNAT\n\
             COMMIT\n\
             *filter\n\
             :INPUT ACCEPT\n\
             -A INPUT -s 4.4.4.4/32 -j ACCEPT\n\
             -A FORWARD -j DROP\n\
             COMMIT",
        );
        let parsed = parse_iptables_save(&input);
        assert_eq!(parsed.nat, "-A PREROUTING -j DNAT");
        assert_eq!(
            parsed.filter,
            vec![
                "-A INPUT -s 4.4.4.4/32 -j ACCEPT".to_string(),
                "-A FORWARD -j DROP".to_string(),
            ]
        );
    }

    #[test]
    fn missing_section_is_empty() {
        let input = lines("*filter\nCOMMIT");
        let parsed = parse_iptables_save(&input);
        assert_eq!(parsed.nat, "");
        assert!(parsed.filter.is_empty());
    }

    #[test]
    fn s7_ip_addr_show_fan_out_parser() {
        let input = lines(
            "1: lo: <LOOPBACK,UP,LOWER_UP>\n\
             2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP>\n\
             \x20   link/ether 00:11:22:33:44:55\n\
             \x20   inet 10.0.0.1/24 brd 10.0.0.255 scope global eth0\n\
             \x20   inet6 fe80::1/64 scope link",
        );
        let parsed = parse_ip_addr_show(&input);
        assert_eq!(
            parsed.get("eth0"),
            Some(&(Some("10.0.0.1/24".to_string()), Some("fe80::1/64".to_string())))
        );
    }

    #[test]
    fn flushes_final_interface() {
        let input = lines(
            "1: lo\n\
             2: eth0: <UP>\n\
             \x20   inet 192.168.1.5/24 scope global eth0",
        );
        let parsed = parse_ip_addr_show(&input);
        assert_eq!(parsed["eth0"].0, Some("192.168.1.5/24".to_string()));
    }
}
