// SPDX-License-Identifier: Apache-2.0

//! Turns line-oriented CLI text into typed `Interface` and
//! `RawBridgeDomain` records.
//!
//! **Golden Rule**: every fact produced here comes from a regex match
//! against a CLI line, never from the interface or BD name. Names are
//! only ever used as map keys.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::interface::InterfaceKind;
use crate::{Interface, ManipulationAction, RawBridgeDomain, VlanList};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

static RE_VLAN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interfaces\s+(\S+)\s+vlan-id\s+(\d+)\s*$").unwrap());

static RE_VLAN_LIST_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^interfaces\s+(\S+)\s+vlan-id\s+list\s+(\d+)-(\d+)\s*$").unwrap()
});

static RE_VLAN_LIST_DISCRETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^interfaces\s+(\S+)\s+vlan-id\s+list\s+([\d]+(?:,[\d]+)+)\s*$").unwrap()
});

static RE_VLAN_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^interfaces\s+(\S+)\s+vlan-tags\s+outer-tag\s+(\d+)\s+inner-tag\s+(\d+)\s*$")
        .unwrap()
});

static RE_MANIP_PUSH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^interfaces\s+(\S+)\s+vlan-manipulation\s+ingress-mapping\s+action\s+push\s+outer-tag\s+(\d+)\s+outer-tpid\s+(0x[0-9a-fA-F]+)\s*$",
    )
    .unwrap()
});

static RE_MANIP_POP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^interfaces\s+(\S+)\s+vlan-manipulation\s+egress-mapping\s+action\s+pop\s*$")
        .unwrap()
});

static RE_L2_SERVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interfaces\s+(\S+)\s+l2-service\s+enable\s*$").unwrap());

static RE_BD_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^network-services\s+bridge-domain\s+instance\s+(\S+)\s+interface\s+(\S+)\s*$")
        .unwrap()
});

/// Strips ANSI escape sequences (color codes, cursor moves) that
/// device CLIs commonly emit in paged output.
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

fn iface_kind(name: &str) -> InterfaceKind {
    if name.starts_with("bundle-") {
        InterfaceKind::Bundle
    } else {
        InterfaceKind::Physical
    }
}

fn get_or_insert<'a>(
    ifaces: &'a mut BTreeMap<String, Interface>,
    device: &str,
    name: &str,
) -> &'a mut Interface {
    ifaces.entry(name.to_string()).or_insert_with(|| {
        let mut iface = Interface::new(device, name);
        iface.kind = iface_kind(&iface.name);
        iface
    })
}

/// Parses a device's VLAN-configuration dump into interface records
/// keyed by qualified name (spec §4.C2).
pub fn parse_vlan_dump(device: &str, text: &str) -> BTreeMap<String, Interface> {
    let mut ifaces: BTreeMap<String, Interface> = BTreeMap::new();

    for raw_line in text.lines() {
        let line = strip_ansi(raw_line);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = RE_VLAN_ID.captures(trimmed) {
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.vlan_id = caps[2].parse().ok();
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_VLAN_LIST_RANGE.captures(trimmed) {
            let (min, max) = (caps[2].parse().unwrap_or(0), caps[3].parse().unwrap_or(0));
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.vlan_list = Some(VlanList::Range { min, max });
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_VLAN_LIST_DISCRETE.captures(trimmed) {
            let values: Vec<u16> =
                caps[2].split(',').filter_map(|s| s.parse().ok()).collect();
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.vlan_list = Some(VlanList::Discrete(values));
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_VLAN_TAGS.captures(trimmed) {
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.outer_vlan = caps[2].parse().ok();
            iface.vlan_facts.inner_vlan = caps[3].parse().ok();
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_MANIP_PUSH.captures(trimmed) {
            let tag: u16 = caps[2].parse().unwrap_or(0);
            let tpid = u16::from_str_radix(caps[3].trim_start_matches("0x"), 16).unwrap_or(0x8100);
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.manipulation.ingress = Some(ManipulationAction::Push { tag, tpid });
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_MANIP_POP.captures(trimmed) {
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.vlan_facts.manipulation.egress = Some(ManipulationAction::Pop);
            iface.raw_cli.push(line.clone());
        } else if let Some(caps) = RE_L2_SERVICE.captures(trimmed) {
            let iface = get_or_insert(&mut ifaces, device, &caps[1]);
            iface.l2_service_enabled = true;
            iface.raw_cli.push(line.clone());
        }
        // Any other line is opaque: it is simply not attached to an
        // interface, per the parser's "never abort the stanza" rule.
    }

    ifaces
}

/// Parses a device's bridge-domain dump into one `RawBridgeDomain`
/// per `network-services bridge-domain instance` stanza, filling in
/// VLAN facts from `vlan_ifaces` where available and flagging
/// `incomplete` where not (spec §4.C2 Golden Rule fallback).
pub fn parse_bd_dump(
    device: &str,
    text: &str,
    vlan_ifaces: &BTreeMap<String, Interface>,
) -> Vec<RawBridgeDomain> {
    let mut bds: BTreeMap<String, RawBridgeDomain> = BTreeMap::new();

    for raw_line in text.lines() {
        let line = strip_ansi(raw_line);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = RE_BD_MEMBER.captures(trimmed) {
            let bd_name = &caps[1];
            let iface_name = &caps[2];
            let bd = bds
                .entry(bd_name.to_string())
                .or_insert_with(|| RawBridgeDomain::new(device, bd_name));
            bd.raw_cli.push(line.clone());

            let mut iface = match vlan_ifaces.get(iface_name) {
                Some(found) => found.clone(),
                None => {
                    let mut iface = Interface::new(device, iface_name);
                    iface.kind = iface_kind(&iface.name);
                    iface.incomplete = true;
                    iface
                }
            };
            if iface.vlan_facts.is_empty() {
                iface.incomplete = true;
            }
            bd.members.push(iface);
        }
    }

    bds.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_color_codes() {
        let colored = "\x1b[32minterfaces ge0 vlan-id 10\x1b[0m";
        assert_eq!(strip_ansi(colored), "interfaces ge0 vlan-id 10");
    }

    #[test]
    fn parses_single_vlan_id() {
        let ifaces = parse_vlan_dump("L-A", "interfaces ge100-0/0/5.251 vlan-id 251\n");
        let iface = ifaces.get("ge100-0/0/5.251").unwrap();
        assert_eq!(iface.vlan_facts.vlan_id, Some(251));
        assert_eq!(iface.raw_cli, vec!["interfaces ge100-0/0/5.251 vlan-id 251"]);
    }

    #[test]
    fn parses_vlan_list_range_and_discrete() {
        let ifaces = parse_vlan_dump(
            "L-A",
            "interfaces ge1.1 vlan-id list 100-200\n\
             interfaces ge2.1 vlan-id list 100,105,110\n",
        );
        assert_eq!(
            ifaces.get("ge1.1").unwrap().vlan_facts.vlan_list,
            Some(VlanList::Range { min: 100, max: 200 })
        );
        assert_eq!(
            ifaces.get("ge2.1").unwrap().vlan_facts.vlan_list,
            Some(VlanList::Discrete(vec![100, 105, 110]))
        );
    }

    #[test]
    fn parses_outer_inner_tags() {
        let ifaces = parse_vlan_dump(
            "L-A",
            "interfaces ge1.1 vlan-tags outer-tag 100 inner-tag 200\n",
        );
        let iface = ifaces.get("ge1.1").unwrap();
        assert_eq!(iface.vlan_facts.outer_vlan, Some(100));
        assert_eq!(iface.vlan_facts.inner_vlan, Some(200));
    }

    #[test]
    fn parses_manipulation_push_and_pop() {
        let ifaces = parse_vlan_dump(
            "L-A",
            "interfaces bundle-77.210 vlan-manipulation ingress-mapping action push outer-tag 210 outer-tpid 0x8100\n\
             interfaces bundle-77.210 vlan-manipulation egress-mapping action pop\n",
        );
        let iface = ifaces.get("bundle-77.210").unwrap();
        assert_eq!(
            iface.vlan_facts.manipulation.ingress,
            Some(ManipulationAction::Push { tag: 210, tpid: 0x8100 })
        );
        assert_eq!(iface.vlan_facts.manipulation.egress, Some(ManipulationAction::Pop));
        assert_eq!(iface.vlan_facts.manipulation.push_outer_tag(), Some(210));
    }

    #[test]
    fn never_infers_vlan_from_name() {
        // "ge100-0/0/5.251" suggests VLAN 251 in its name, but with no
        // matching vlan-id line the fact must stay absent.
        let ifaces = parse_vlan_dump("L-A", "interfaces ge100-0/0/5.251 l2-service enable\n");
        let iface = ifaces.get("ge100-0/0/5.251").unwrap();
        assert!(iface.vlan_facts.is_empty());
    }

    #[test]
    fn bd_membership_pulls_in_vlan_facts_and_flags_incomplete() {
        let vlan_ifaces = parse_vlan_dump("L-A", "interfaces ge1.1 vlan-id 251\n");
        let bds = parse_bd_dump(
            "L-A",
            "network-services bridge-domain instance g_alice_v251 interface ge1.1\n\
             network-services bridge-domain instance g_alice_v251 interface ge2.1\n",
            &vlan_ifaces,
        );
        assert_eq!(bds.len(), 1);
        let bd = &bds[0];
        assert_eq!(bd.bd_name, "g_alice_v251");
        let ge1 = bd.members.iter().find(|i| i.name == "ge1").unwrap();
        assert_eq!(ge1.vlan_facts.vlan_id, Some(251));
        assert!(!ge1.incomplete);
        let ge2 = bd.members.iter().find(|i| i.name == "ge2").unwrap();
        assert!(ge2.incomplete);
    }

    #[test]
    fn unrecognized_line_does_not_abort_the_stanza() {
        let ifaces = parse_vlan_dump(
            "L-A",
            "some unrecognized diagnostic banner\n\
             interfaces ge1.1 vlan-id 10\n",
        );
        assert_eq!(ifaces.get("ge1.1").unwrap().vlan_facts.vlan_id, Some(10));
    }
}
