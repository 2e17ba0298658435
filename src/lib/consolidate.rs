// SPDX-License-Identifier: Apache-2.0

//! Groups `ProcessedBridgeDomain`s by consolidation key into
//! network-wide `ConsolidatedBridgeDomain` records (spec §4.C5).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::bridge_domain::{
    AssignmentState, ConsolidatedBridgeDomain, ConsolidationInfo, DnaasType, ProcessedBridgeDomain,
    SelectionReason,
};
use crate::{DiagnosticCode, Interface};

/// Groups `processed` by consolidation key, splitting any group whose
/// members disagree on type or global identifier into its largest
/// consistent subgroup plus a set of demoted individuals. Returns the
/// resulting records plus any `ConsolidationSplit` diagnostics.
pub fn consolidate(
    processed: Vec<ProcessedBridgeDomain>,
) -> (Vec<ConsolidatedBridgeDomain>, Vec<DiagnosticCode>) {
    let mut by_key: BTreeMap<String, Vec<ProcessedBridgeDomain>> = BTreeMap::new();
    for p in processed {
        by_key.entry(p.consolidation_key.clone()).or_default().push(p);
    }

    let mut results = Vec::new();
    let mut diagnostics = Vec::new();

    for (key, group) in by_key {
        if is_consistent(&group) {
            results.push(build_consolidated(&key, group));
            continue;
        }

        let (kept, demoted, reason) = split_largest_consistent(group);
        diagnostics.push(DiagnosticCode::ConsolidationSplit { consolidation_key: key.clone(), reason });
        results.push(build_consolidated(&key, kept));
        for member in demoted {
            let individual_key = format!("INDIVIDUAL|{}", member.bd_name);
            results.push(build_consolidated(&individual_key, vec![member]));
        }
    }

    (results, diagnostics)
}

fn is_consistent(group: &[ProcessedBridgeDomain]) -> bool {
    let first = &group[0];
    group
        .iter()
        .all(|p| p.dnaas_type == first.dnaas_type && p.global_identifier == first.global_identifier)
}

/// Partitions `group` by `(dnaas_type, global_identifier)`, keeps the
/// largest partition (ties broken by the smaller partition key for
/// determinism) and demotes the rest.
fn split_largest_consistent(
    group: Vec<ProcessedBridgeDomain>,
) -> (Vec<ProcessedBridgeDomain>, Vec<ProcessedBridgeDomain>, String) {
    let total = group.len();
    let mut partitions: BTreeMap<(DnaasType, Option<u16>), Vec<ProcessedBridgeDomain>> =
        BTreeMap::new();
    for p in group {
        partitions.entry((p.dnaas_type, p.global_identifier)).or_default().push(p);
    }

    let winning_key = partitions
        .iter()
        .max_by_key(|(key, members)| (members.len(), std::cmp::Reverse((*key).clone())))
        .map(|(key, _)| key.clone())
        .expect("at least one partition");

    let kept = partitions.remove(&winning_key).unwrap();
    let demoted: Vec<ProcessedBridgeDomain> = partitions.into_values().flatten().collect();
    let reason = format!(
        "{} of {} members disagreed on (dnaas_type, global_identifier); kept the ({:?}, {:?}) subgroup",
        demoted.len(),
        total,
        winning_key.0,
        winning_key.1,
    );
    (kept, demoted, reason)
}

static RE_STANDARD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^g_[A-Za-z0-9]+_v\d+$").unwrap());

/// Primary-name selection (spec §4.C5): standard form, then shortest
/// name, then lexicographically smallest.
fn select_primary_name(
    names: &[String],
    username: Option<&str>,
    global_identifier: Option<u16>,
) -> (String, SelectionReason) {
    if let (Some(user), Some(id)) = (username, global_identifier) {
        let standard = format!("g_{user}_v{id}");
        if names.iter().any(|n| n == &standard) && RE_STANDARD_NAME.is_match(&standard) {
            return (standard, SelectionReason::StandardFormatPreferred);
        }
    }

    let min_len = names.iter().map(|n| n.len()).min().unwrap_or(0);
    let shortest: Vec<&String> = names.iter().filter(|n| n.len() == min_len).collect();
    if shortest.len() == 1 {
        return (shortest[0].clone(), SelectionReason::ShortestName);
    }

    let smallest = names.iter().min().cloned().unwrap_or_default();
    (smallest, SelectionReason::LexicographicallySmallest)
}

fn most_common(values: impl Iterator<Item = u16>) -> Option<u16> {
    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(v, c)| (*c, std::cmp::Reverse(*v))).map(|(v, _)| v)
}

fn build_consolidated(key: &str, group: Vec<ProcessedBridgeDomain>) -> ConsolidatedBridgeDomain {
    let mut names: Vec<String> = {
        let mut set: Vec<String> = group.iter().map(|p| p.bd_name.clone()).collect();
        set.sort();
        set.dedup();
        set
    };
    // Descending lexicographic order: prefers listing the more
    // descriptive/longer alias before the eventual primary name.
    names.sort_by(|a, b| b.cmp(a));

    let username = group[0].username.clone();
    let dnaas_type = group[0].dnaas_type;
    let global_identifier = group[0].global_identifier;
    let service_type = dnaas_type.service_type_name().to_string();

    let (primary_name, selection_reason) =
        select_primary_name(&names, username.as_deref(), global_identifier);

    let outer_vlan = most_common(
        group.iter().flat_map(|p| p.members.iter().filter_map(|m| m.vlan_facts.outer_vlan)),
    );
    let inner_vlan = most_common(
        group.iter().flat_map(|p| p.members.iter().filter_map(|m| m.vlan_facts.inner_vlan)),
    );

    let mut devices: BTreeMap<String, Vec<Interface>> = BTreeMap::new();
    for p in &group {
        let entry = devices.entry(p.device.clone()).or_default();
        for member in &p.members {
            let qname = member.qualified_name();
            if !entry.iter().any(|existing: &Interface| existing.qualified_name() == qname) {
                entry.push(member.clone());
            }
        }
    }

    ConsolidatedBridgeDomain {
        consolidation_key: key.to_string(),
        primary_name,
        dnaas_type,
        service_type,
        global_identifier,
        outer_vlan,
        inner_vlan,
        username,
        members: group,
        devices,
        consolidation_info: ConsolidationInfo { represents: names, selection_reason },
        assignment_state: AssignmentState::Available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interface;

    fn processed(device: &str, bd_name: &str, username: &str, vlan: u16, iface: &str) -> ProcessedBridgeDomain {
        ProcessedBridgeDomain {
            device: device.to_string(),
            bd_name: bd_name.to_string(),
            members: vec![Interface::new(device, iface)],
            raw_cli: Vec::new(),
            dnaas_type: DnaasType::Type4A,
            service_type: DnaasType::Type4A.service_type_name().to_string(),
            qinq_detected: false,
            global_identifier: Some(vlan),
            username: Some(username.to_string()),
            consolidation_key: format!("{username}|{vlan}"),
        }
    }

    #[test]
    fn s1_single_tagged_consolidation() {
        let a = processed("L-A", "g_alice_v251", "alice", 251, "ge100-0/0/5.251");
        let b = processed("L-B", "g_alice_v251_to_Spirent", "alice", 251, "ge100-0/0/12.251");

        let (consolidated, diagnostics) = consolidate(vec![a, b]);
        assert!(diagnostics.is_empty());
        assert_eq!(consolidated.len(), 1);
        let bd = &consolidated[0];
        assert_eq!(bd.primary_name, "g_alice_v251");
        assert_eq!(bd.dnaas_type, DnaasType::Type4A);
        assert_eq!(bd.global_identifier, Some(251));
        assert_eq!(bd.devices.len(), 2);
        assert_eq!(
            bd.consolidation_info.represents,
            vec!["g_alice_v251_to_Spirent".to_string(), "g_alice_v251".to_string()]
        );
        assert_eq!(bd.consolidation_info.selection_reason, SelectionReason::StandardFormatPreferred);
    }

    #[test]
    fn conflicting_members_split_with_diagnostic() {
        let mut a = processed("L-A", "g_eve_v10", "eve", 10, "ge1");
        a.dnaas_type = DnaasType::Type4A;
        let mut b = processed("L-B", "g_eve_v10", "eve", 10, "ge2");
        b.dnaas_type = DnaasType::Type2A;
        b.consolidation_key = a.consolidation_key.clone();

        let mut c = processed("L-C", "g_eve_v10", "eve", 10, "ge3");
        c.dnaas_type = DnaasType::Type4A;
        c.consolidation_key = a.consolidation_key.clone();

        let (consolidated, diagnostics) = consolidate(vec![a, b, c]);
        assert_eq!(diagnostics.len(), 1);
        // two records: the kept Type4A pair under the shared key, and
        // one demoted individual for the lone Type2A member.
        assert_eq!(consolidated.len(), 2);
        let kept = consolidated.iter().find(|c| c.consolidation_key == "eve|10").unwrap();
        assert_eq!(kept.dnaas_type, DnaasType::Type4A);
        assert_eq!(kept.members.len(), 2);
        let demoted = consolidated.iter().find(|c| c.consolidation_key.starts_with("INDIVIDUAL|")).unwrap();
        assert_eq!(demoted.dnaas_type, DnaasType::Type2A);
    }
}
