// SPDX-License-Identifier: Apache-2.0

//! BD-PROC: the seven-phase pipeline that turns one `RawBridgeDomain`
//! into a `ProcessedBridgeDomain` (spec §4.C4). A phase failure aborts
//! only the BD being processed; callers collect the error as a
//! diagnostic and move on to the next one.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::bridge_domain::{DnaasType, ProcessedBridgeDomain, RawBridgeDomain};
use crate::interface::{InterfaceKind, ManipulationAction, VlanList};
use crate::{BdError, Device, ErrorKind, Interface};

/// Runs all seven phases over `raw`, enriching member interface roles
/// from the already-classified `devices` map (built by `crate::classify`
/// over the full fleet, not just this BD's device).
pub fn process(
    raw: &RawBridgeDomain,
    devices: &BTreeMap<String, Device>,
) -> Result<ProcessedBridgeDomain, BdError> {
    validate(raw)?;

    let dnaas_type = classify(raw)?;
    let global_identifier = global_identifier(raw, dnaas_type);
    let username = extract_username(&raw.bd_name);
    let members = enrich_roles(raw, devices);
    let consolidation_key = consolidation_key(&username, global_identifier, &raw.bd_name);

    Ok(ProcessedBridgeDomain {
        device: raw.device.clone(),
        bd_name: raw.bd_name.clone(),
        members,
        raw_cli: raw.raw_cli.clone(),
        dnaas_type,
        service_type: dnaas_type.service_type_name().to_string(),
        qinq_detected: dnaas_type.is_qinq(),
        global_identifier,
        username,
        consolidation_key,
    })
}

/// Phase 1 — data validation.
fn validate(raw: &RawBridgeDomain) -> Result<(), BdError> {
    if raw.bd_name.trim().is_empty() {
        return Err(BdError::new(ErrorKind::DataQuality, "bridge domain name is empty"));
    }
    if raw.members.is_empty() {
        return Err(BdError::new(
            ErrorKind::DataQuality,
            format!("bridge domain {} has no member interfaces", raw.bd_name),
        ));
    }
    let has_vlan_fact = raw.members.iter().any(|m| !m.vlan_facts.is_empty());
    let is_port_mode_candidate = raw
        .members
        .iter()
        .all(|m| !m.has_subinterface() && m.vlan_facts.is_empty() && m.l2_service_enabled);
    if !has_vlan_fact && !is_port_mode_candidate {
        return Err(BdError::new(
            ErrorKind::DataQuality,
            format!(
                "bridge domain {} has no authoritative VLAN fact and is not Port-Mode eligible",
                raw.bd_name
            ),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QinqShape {
    /// Push covers the full `1-4094` range, or carries no list/range
    /// at all (implicitly full).
    Single,
    /// Discrete inner VLANs, or a non-full range.
    Multi,
}

fn qinq_shape(iface: &Interface) -> QinqShape {
    match &iface.vlan_facts.vlan_list {
        None => QinqShape::Single,
        Some(list) if list.is_full_qinq_range() => QinqShape::Single,
        Some(VlanList::Range { .. }) | Some(VlanList::Discrete(_)) => QinqShape::Multi,
    }
}

/// Phase 2 — DNAAS classification, top-down per the decision table.
fn classify(raw: &RawBridgeDomain) -> Result<DnaasType, BdError> {
    classify_members(&raw.members, &raw.bd_name)
}

/// Same decision table as [`classify`], but over a bare interface
/// slice. Exposed so `crate::edit` can re-run Phase 2 against a
/// working copy and enforce the "modifications do not silently retype
/// a BD" invariant (spec §8 testable property 6) without reaching for
/// a full `RawBridgeDomain`.
pub(crate) fn classify_members(members: &[Interface], name: &str) -> Result<DnaasType, BdError> {
    let is_port_mode = !members.is_empty()
        && members.iter().all(|m| {
            m.kind == InterfaceKind::Physical
                && !m.has_subinterface()
                && m.vlan_facts.is_empty()
                && m.l2_service_enabled
        });
    if is_port_mode {
        return Ok(DnaasType::Type5);
    }

    let manipulated: Vec<&Interface> =
        members.iter().filter(|m| m.vlan_facts.has_manipulation()).collect();
    if !manipulated.is_empty() {
        let mixed_egress = manipulated
            .iter()
            .map(|m| matches!(m.vlan_facts.manipulation.egress, Some(ManipulationAction::Pop)))
            .collect::<std::collections::BTreeSet<_>>()
            .len()
            > 1;
        let shapes: std::collections::BTreeSet<_> =
            manipulated.iter().map(|m| qinq_shape(m)).collect();
        let mixed_shapes = shapes.len() > 1;

        if mixed_egress || mixed_shapes {
            return Ok(DnaasType::Type3);
        }
        return Ok(if shapes.contains(&QinqShape::Single) {
            DnaasType::Type2A
        } else {
            DnaasType::Type2B
        });
    }

    if members.iter().all(|m| m.vlan_facts.has_explicit_outer_inner()) {
        return Ok(DnaasType::Type1);
    }

    if members.iter().any(|m| m.vlan_facts.vlan_list.is_some()) {
        return Ok(DnaasType::Type4B);
    }

    if members.iter().any(|m| m.vlan_facts.vlan_id.is_some()) {
        return Ok(DnaasType::Type4A);
    }

    Err(BdError::new(
        ErrorKind::Classification,
        format!("bridge domain {name} does not match any DNAAS type"),
    ))
}

/// Phase 3 — global identifier.
fn global_identifier(raw: &RawBridgeDomain, dnaas_type: DnaasType) -> Option<u16> {
    match dnaas_type {
        DnaasType::Type1 | DnaasType::Type2A | DnaasType::Type2B | DnaasType::Type3 => {
            most_common(raw.members.iter().filter_map(|m| m.vlan_facts.outer_vlan))
        }
        DnaasType::Type4A => most_common(raw.members.iter().filter_map(|m| m.vlan_facts.vlan_id)),
        DnaasType::Type4B => {
            most_common(raw.members.iter().filter_map(|m| m.vlan_facts.outer_vlan))
        }
        DnaasType::Type5 => None,
    }
}

/// Most frequent value, ties broken by smallest value for determinism
/// (testable property 2: identical inputs yield identical output).
fn most_common(values: impl Iterator<Item = u16>) -> Option<u16> {
    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(v, c)| (*c, std::cmp::Reverse(*v))).map(|(v, _)| v)
}

static RE_PREFIXED_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[gl]_([A-Za-z0-9]+)_v\d+(?:_.+)?$").unwrap());
static RE_BARE_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9]+)[-_]v?(\d+)$").unwrap());

/// Phase 4 — username extraction, stopping at first matching pattern.
fn extract_username(bd_name: &str) -> Option<String> {
    if let Some(caps) = RE_PREFIXED_USER.captures(bd_name) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = RE_BARE_USER.captures(bd_name) {
        return Some(caps[1].to_string());
    }
    bd_name
        .split('_')
        .find(|tok| tok.len() >= 3 && tok.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|s| s.to_string())
}

/// Phase 5/6 — device classification is already reflected in `devices`
/// (produced by `crate::classify`); here we copy each member's
/// authoritative role over from the canonical per-device interface
/// record, since the copy held by the raw BD predates role assignment.
fn enrich_roles(raw: &RawBridgeDomain, devices: &BTreeMap<String, Device>) -> Vec<Interface> {
    let canonical = devices.get(&raw.device);
    raw.members
        .iter()
        .cloned()
        .map(|mut iface| {
            if let Some(device) = canonical
                && let Some(found) = device.interfaces.get(&iface.qualified_name())
            {
                iface.role = found.role;
            }
            iface
        })
        .collect()
}

/// Phase 7 — consolidation key.
fn consolidation_key(username: &Option<String>, global_identifier: Option<u16>, bd_name: &str) -> String {
    match (username, global_identifier) {
        (Some(user), Some(id)) => format!("{user}|{id}"),
        (Some(user), None) => format!("LOCAL|{user}|{bd_name}"),
        (None, _) => format!("INDIVIDUAL|{bd_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{InterfaceKind, Manipulation};

    fn tagged_iface(device: &str, name: &str, outer: u16, inner: u16) -> Interface {
        let mut iface = Interface::new(device, name);
        iface.vlan_facts.outer_vlan = Some(outer);
        iface.vlan_facts.inner_vlan = Some(inner);
        iface
    }

    fn single_tagged_iface(device: &str, name: &str, vlan_id: u16) -> Interface {
        let mut iface = Interface::new(device, name);
        iface.vlan_facts.vlan_id = Some(vlan_id);
        iface
    }

    #[test]
    fn classifies_type1_double_tagged() {
        let mut raw = RawBridgeDomain::new("L-A", "g_alice_double_v100");
        raw.members.push(tagged_iface("L-A", "ge1.1", 100, 200));
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type1);
        assert_eq!(result.global_identifier, Some(100));
    }

    #[test]
    fn classifies_type4a_single_tagged_and_consolidates_on_username_and_vlan() {
        let mut raw = RawBridgeDomain::new("L-A", "g_alice_v251");
        raw.members.push(single_tagged_iface("L-A", "ge100-0/0/5.251", 251));
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type4A);
        assert_eq!(result.global_identifier, Some(251));
        assert_eq!(result.username.as_deref(), Some("alice"));
        assert_eq!(result.consolidation_key, "alice|251");
    }

    #[test]
    fn classifies_type2a_full_range_qinq_push() {
        let mut raw = RawBridgeDomain::new("L-A", "g_bob_v210");
        let mut iface = Interface::new("L-A", "bundle-77.210");
        iface.kind = InterfaceKind::Bundle;
        iface.vlan_facts.outer_vlan = Some(210);
        iface.vlan_facts.manipulation = Manipulation {
            ingress: Some(ManipulationAction::Push { tag: 210, tpid: 0x8100 }),
            egress: None,
        };
        raw.members.push(iface);
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type2A);
        assert!(result.qinq_detected);
        assert_eq!(result.global_identifier, Some(210));
    }

    #[test]
    fn classifies_type2b_discrete_inner_vlans() {
        let mut raw = RawBridgeDomain::new("L-A", "g_carol_v300");
        let mut iface = Interface::new("L-A", "bundle-77.300");
        iface.kind = InterfaceKind::Bundle;
        iface.vlan_facts.outer_vlan = Some(300);
        iface.vlan_facts.vlan_list = Some(VlanList::Discrete(vec![10, 20, 30]));
        iface.vlan_facts.manipulation = Manipulation {
            ingress: Some(ManipulationAction::Push { tag: 300, tpid: 0x8100 }),
            egress: None,
        };
        raw.members.push(iface);
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type2B);
    }

    #[test]
    fn mixed_manipulation_kinds_classify_as_hybrid() {
        let mut raw = RawBridgeDomain::new("L-A", "g_dave_v400");
        let mut push_only = Interface::new("L-A", "bundle-1.400");
        push_only.kind = InterfaceKind::Bundle;
        push_only.vlan_facts.manipulation = Manipulation {
            ingress: Some(ManipulationAction::Push { tag: 400, tpid: 0x8100 }),
            egress: None,
        };
        let mut push_and_pop = Interface::new("L-A", "bundle-2.400");
        push_and_pop.kind = InterfaceKind::Bundle;
        push_and_pop.vlan_facts.manipulation = Manipulation {
            ingress: Some(ManipulationAction::Push { tag: 400, tpid: 0x8100 }),
            egress: Some(ManipulationAction::Pop),
        };
        raw.members.push(push_only);
        raw.members.push(push_and_pop);
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type3);
        assert!(!result.dnaas_type.supports_editing());
    }

    #[test]
    fn classifies_type5_port_mode() {
        let mut raw = RawBridgeDomain::new("L-A", "port-mode-1");
        let mut iface = Interface::new("L-A", "ge100-0/0/9");
        iface.l2_service_enabled = true;
        raw.members.push(iface);
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.dnaas_type, DnaasType::Type5);
        assert_eq!(result.global_identifier, None);
    }

    #[test]
    fn bundle_interface_is_not_port_mode() {
        let mut raw = RawBridgeDomain::new("L-A", "lag-1");
        let mut iface = Interface::new("L-A", "bundle-1");
        iface.kind = InterfaceKind::Bundle;
        iface.l2_service_enabled = true;
        raw.members.push(iface);
        let err = process(&raw, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Classification);
    }

    #[test]
    fn no_username_match_yields_individual_key() {
        let mut raw = RawBridgeDomain::new("L-A", "9999");
        raw.members.push(single_tagged_iface("L-A", "ge1", 500));
        let result = process(&raw, &BTreeMap::new()).unwrap();
        assert_eq!(result.username, None);
        assert_eq!(result.consolidation_key, "INDIVIDUAL|9999");
        assert!(result.is_individual());
    }

    #[test]
    fn empty_bd_fails_validation() {
        let raw = RawBridgeDomain::new("L-A", "g_empty_v1");
        let err = process(&raw, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataQuality);
    }
}
