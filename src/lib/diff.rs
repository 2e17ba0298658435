// SPDX-License-Identifier: Apache-2.0

//! Type-aware diff engine (spec §4.C8): compares a `ConsolidatedBridgeDomain`
//! snapshot against a working copy and produces a per-device
//! `DeploymentPlan`, one command template per DNAAS type.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bridge_domain::{ConsolidatedBridgeDomain, DnaasType};
use crate::health::{self, ImpactSummary};
use crate::interface::VlanList;
use crate::{BdError, Device, ErrorKind, Interface};

/// Device command-line dialects. Only one is pinned down today (spec
/// §9 Open Question decision); adding a family means adding a variant
/// and its grammar table entry, not touching the template logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceFamily {
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CommandKind {
    CreateSubinterface,
    VlanId,
    VlanList,
    VlanTags,
    ManipulationPush,
    L2ServiceEnable,
    BdMember,
    NoSubinterface,
    NoBdMember,
    NoL2ServiceEnable,
}

static GRAMMAR: LazyLock<BTreeMap<&'static str, Regex>> = LazyLock::new(|| {
    let mut m = BTreeMap::new();
    m.insert("create_subinterface", Regex::new(r"^interfaces \S+\.\d+$").unwrap());
    m.insert("vlan_id", Regex::new(r"^interfaces \S+\.\d+ vlan-id \d+$").unwrap());
    m.insert(
        "vlan_list",
        Regex::new(r"^interfaces \S+\.\d+ vlan-id list (\d+-\d+|\d+(,\d+)*)$").unwrap(),
    );
    m.insert(
        "vlan_tags",
        Regex::new(r"^interfaces \S+\.\d+ vlan-tags outer-tag \d+ inner-tag \d+$").unwrap(),
    );
    m.insert(
        "manipulation_push",
        Regex::new(
            r"^interfaces \S+\.\d+ vlan-manipulation ingress-mapping action push outer-tag \d+ outer-tpid 0x[0-9a-fA-F]+$",
        )
        .unwrap(),
    );
    m.insert("l2_service_enable", Regex::new(r"^interfaces \S+(\.\d+)? l2-service enable$").unwrap());
    m.insert("bd_member", Regex::new(r"^network-services bridge-domain instance \S+ interface \S+$").unwrap());
    m.insert("no_subinterface", Regex::new(r"^no interfaces \S+\.\d+$").unwrap());
    m.insert(
        "no_bd_member",
        Regex::new(r"^no network-services bridge-domain instance \S+ interface \S+$").unwrap(),
    );
    m.insert("no_l2_service_enable", Regex::new(r"^no interfaces \S+ l2-service enable$").unwrap());
    m
});

fn grammar_key(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::CreateSubinterface => "create_subinterface",
        CommandKind::VlanId => "vlan_id",
        CommandKind::VlanList => "vlan_list",
        CommandKind::VlanTags => "vlan_tags",
        CommandKind::ManipulationPush => "manipulation_push",
        CommandKind::L2ServiceEnable => "l2_service_enable",
        CommandKind::BdMember => "bd_member",
        CommandKind::NoSubinterface => "no_subinterface",
        CommandKind::NoBdMember => "no_bd_member",
        CommandKind::NoL2ServiceEnable => "no_l2_service_enable",
    }
}

/// Validates `line` against its command kind's grammar before it is
/// allowed into a plan. An emitted line that fails its own template's
/// grammar is a bug in this module, not a data problem — it still
/// surfaces as `ValidationFailed` rather than panicking, since a core
/// crate must never unwind on caller-reachable input.
fn emit(_family: DeviceFamily, kind: CommandKind, line: String) -> Result<String, BdError> {
    let key = grammar_key(kind);
    let re = GRAMMAR.get(key).expect("grammar table covers every CommandKind");
    if re.is_match(&line) {
        Ok(line)
    } else {
        Err(BdError::new(
            ErrorKind::Validation,
            format!("generated command `{line}` does not match the {key} grammar"),
        ))
    }
}

/// Hard pre-generation rejects per DNAAS type (spec §4.C8). Shared by
/// the diff engine (gating template synthesis) and `crate::edit`
/// (gating a proposed mutation before it ever reaches a plan).
pub(crate) fn validate_endpoint(dnaas_type: DnaasType, iface: &Interface) -> Result<(), BdError> {
    use DnaasType::*;
    let vf = &iface.vlan_facts;
    let reject = |msg: String| {
        Err(BdError::new(ErrorKind::Validation, format!("{}/{}: {msg}", iface.device, iface.name)))
    };
    match dnaas_type {
        Type4A => {
            if vf.vlan_id.is_none() {
                return reject("type 4A requires vlan_id".to_string());
            }
            if vf.has_manipulation() || vf.has_explicit_outer_inner() {
                return reject("type 4A must not carry manipulation or outer/inner tags".to_string());
            }
        }
        Type2A | Type2B => {
            if vf.manipulation.push_outer_tag().is_none() {
                return reject(format!("type {dnaas_type} requires a manipulation push outer-tag"));
            }
            if vf.vlan_id.is_some() {
                return reject(format!("type {dnaas_type} must not carry a bare vlan_id"));
            }
        }
        Type1 => {
            if !vf.has_explicit_outer_inner() {
                return reject("type 1 requires both outer_vlan and inner_vlan".to_string());
            }
            if vf.has_manipulation() {
                return reject("type 1 must not carry manipulation".to_string());
            }
        }
        Type4B => {
            if vf.vlan_list.is_none() {
                return reject("type 4B requires vlan_list".to_string());
            }
            if vf.has_manipulation() {
                return reject("type 4B must not carry manipulation".to_string());
            }
        }
        Type5 => {
            use crate::interface::InterfaceKind;
            if iface.kind != InterfaceKind::Physical {
                return reject("type 5 requires a physical interface".to_string());
            }
            if !vf.is_empty() {
                return reject("type 5 must carry no VLAN facts".to_string());
            }
        }
        Type3 => {
            return reject("type 3 (Hybrid) has no pinned-down CLI template; edits are rejected".to_string());
        }
    }
    if !iface.is_customer_editable() {
        return reject("interface is not customer-editable".to_string());
    }
    Ok(())
}

fn vlan_list_repr(list: &VlanList) -> (u16, String) {
    match list {
        VlanList::Range { min, max } => (*min, format!("{min}-{max}")),
        VlanList::Discrete(values) => {
            let mut sorted = values.clone();
            sorted.sort_unstable();
            let rep = sorted.first().copied().unwrap_or(0);
            let joined = sorted.iter().map(u16::to_string).collect::<Vec<_>>().join(",");
            (rep, joined)
        }
    }
}

/// `(subinterface number, add commands)` for one endpoint.
fn template_add(family: DeviceFamily, bd_name: &str, dnaas_type: DnaasType, iface: &Interface) -> Result<(u16, Vec<String>), BdError> {
    validate_endpoint(dnaas_type, iface)?;
    let name = &iface.name;
    match dnaas_type {
        DnaasType::Type4A => {
            let vlan = iface.vlan_facts.vlan_id.expect("validated above");
            Ok((
                vlan,
                vec![
                    emit(family, CommandKind::CreateSubinterface, format!("interfaces {name}.{vlan}"))?,
                    emit(family, CommandKind::VlanId, format!("interfaces {name}.{vlan} vlan-id {vlan}"))?,
                    emit(family, CommandKind::L2ServiceEnable, format!("interfaces {name}.{vlan} l2-service enable"))?,
                ],
            ))
        }
        DnaasType::Type2A | DnaasType::Type2B => {
            let outer = iface.vlan_facts.manipulation.push_outer_tag().expect("validated above");
            Ok((
                outer,
                vec![
                    emit(family, CommandKind::CreateSubinterface, format!("interfaces {name}.{outer}"))?,
                    emit(
                        family,
                        CommandKind::ManipulationPush,
                        format!(
                            "interfaces {name}.{outer} vlan-manipulation ingress-mapping action push outer-tag {outer} outer-tpid 0x8100"
                        ),
                    )?,
                    emit(family, CommandKind::L2ServiceEnable, format!("interfaces {name}.{outer} l2-service enable"))?,
                ],
            ))
        }
        DnaasType::Type1 => {
            let outer = iface.vlan_facts.outer_vlan.expect("validated above");
            let inner = iface.vlan_facts.inner_vlan.expect("validated above");
            Ok((
                inner,
                vec![
                    emit(family, CommandKind::CreateSubinterface, format!("interfaces {name}.{inner}"))?,
                    emit(
                        family,
                        CommandKind::VlanTags,
                        format!("interfaces {name}.{inner} vlan-tags outer-tag {outer} inner-tag {inner}"),
                    )?,
                    emit(family, CommandKind::L2ServiceEnable, format!("interfaces {name}.{inner} l2-service enable"))?,
                ],
            ))
        }
        DnaasType::Type4B => {
            let list = iface.vlan_facts.vlan_list.as_ref().expect("validated above");
            let (rep, joined) = vlan_list_repr(list);
            Ok((
                rep,
                vec![
                    emit(family, CommandKind::CreateSubinterface, format!("interfaces {name}.{rep}"))?,
                    emit(family, CommandKind::VlanList, format!("interfaces {name}.{rep} vlan-id list {joined}"))?,
                    emit(family, CommandKind::L2ServiceEnable, format!("interfaces {name}.{rep} l2-service enable"))?,
                ],
            ))
        }
        DnaasType::Type5 => Ok((
            0,
            vec![
                emit(
                    family,
                    CommandKind::BdMember,
                    format!("network-services bridge-domain instance {bd_name} interface {name}"),
                )?,
                emit(family, CommandKind::L2ServiceEnable, format!("interfaces {name} l2-service enable"))?,
            ],
        )),
        DnaasType::Type3 => {
            Err(BdError::new(ErrorKind::Validation, "type 3 (Hybrid) bridge domains are browse-only".to_string()))
        }
    }
}

fn template_remove(
    family: DeviceFamily,
    bd_name: &str,
    dnaas_type: DnaasType,
    iface: &Interface,
    subinterface: u16,
) -> Result<Vec<String>, BdError> {
    let name = &iface.name;
    match dnaas_type {
        DnaasType::Type4A | DnaasType::Type2A | DnaasType::Type2B | DnaasType::Type1 | DnaasType::Type4B => {
            Ok(vec![emit(family, CommandKind::NoSubinterface, format!("no interfaces {name}.{subinterface}"))?])
        }
        DnaasType::Type5 => Ok(vec![
            emit(
                family,
                CommandKind::NoBdMember,
                format!("no network-services bridge-domain instance {bd_name} interface {name}"),
            )?,
            emit(family, CommandKind::NoL2ServiceEnable, format!("no interfaces {name} l2-service enable"))?,
        ]),
        DnaasType::Type3 => {
            Err(BdError::new(ErrorKind::Validation, "type 3 (Hybrid) bridge domains are browse-only".to_string()))
        }
    }
}

/// How one (device, interface) endpoint differs between `original`
/// and `working`.
#[derive(Debug, Clone)]
pub(crate) enum EndpointDiff {
    Add { device: String, after: Interface },
    Remove { device: String, before: Interface },
    Modify { device: String, before: Interface, after: Interface },
}

fn index_by_name(list: &[Interface]) -> BTreeMap<String, &Interface> {
    list.iter().map(|i| (i.qualified_name(), i)).collect()
}

pub(crate) fn diff_endpoints(
    original: &ConsolidatedBridgeDomain,
    working: &ConsolidatedBridgeDomain,
) -> Vec<EndpointDiff> {
    let mut devices: Vec<&String> = original.devices.keys().chain(working.devices.keys()).collect();
    devices.sort();
    devices.dedup();

    let mut diffs = Vec::new();
    for device in devices {
        let empty = Vec::new();
        let before_list = original.devices.get(device).unwrap_or(&empty);
        let after_list = working.devices.get(device).unwrap_or(&empty);
        let before = index_by_name(before_list);
        let after = index_by_name(after_list);

        let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
        names.sort_unstable();
        names.dedup();

        for name in names {
            match (before.get(name.as_str()), after.get(name.as_str())) {
                (None, Some(a)) => diffs.push(EndpointDiff::Add { device: device.clone(), after: (*a).clone() }),
                (Some(b), None) => diffs.push(EndpointDiff::Remove { device: device.clone(), before: (*b).clone() }),
                (Some(b), Some(a)) if b.vlan_facts != a.vlan_facts => {
                    diffs.push(EndpointDiff::Modify { device: device.clone(), before: (*b).clone(), after: (*a).clone() })
                }
                _ => {}
            }
        }
    }
    diffs
}

/// Command plan for every device touched by a session, plus its
/// symmetric inverse for rollback (spec §3 `DeploymentPlan`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeploymentPlan {
    pub commands_by_device: BTreeMap<String, Vec<String>>,
    pub rollback_by_device: BTreeMap<String, Vec<String>>,
    pub affected_devices: Vec<String>,
    pub impact_summary: ImpactSummary,
}

/// Computes the `DeploymentPlan` for deploying `working` over
/// `original`. Pure: identical inputs always yield an identical plan
/// (spec §8 "Preview is pure").
pub fn compute_plan(
    family: DeviceFamily,
    original: &ConsolidatedBridgeDomain,
    working: &ConsolidatedBridgeDomain,
    fleet: Option<&BTreeMap<String, Device>>,
) -> Result<DeploymentPlan, BdError> {
    let dnaas_type = original.dnaas_type;
    let diffs = diff_endpoints(original, working);

    let mut commands_by_device: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut rollback_by_device: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for d in &diffs {
        match d {
            EndpointDiff::Add { device, after } => {
                let (sub, add_cmds) = template_add(family, &working.primary_name, dnaas_type, after)?;
                let remove_cmds = template_remove(family, &working.primary_name, dnaas_type, after, sub)?;
                commands_by_device.entry(device.clone()).or_default().extend(add_cmds);
                rollback_by_device.entry(device.clone()).or_default().extend(remove_cmds);
            }
            EndpointDiff::Remove { device, before } => {
                let (sub, add_cmds) = template_add(family, &working.primary_name, dnaas_type, before)?;
                let remove_cmds = template_remove(family, &working.primary_name, dnaas_type, before, sub)?;
                commands_by_device.entry(device.clone()).or_default().extend(remove_cmds);
                rollback_by_device.entry(device.clone()).or_default().extend(add_cmds);
            }
            EndpointDiff::Modify { device, before, after } => {
                let (before_sub, before_add) = template_add(family, &working.primary_name, dnaas_type, before)?;
                let before_remove = template_remove(family, &working.primary_name, dnaas_type, before, before_sub)?;
                let (after_sub, after_add) = template_add(family, &working.primary_name, dnaas_type, after)?;
                let after_remove = template_remove(family, &working.primary_name, dnaas_type, after, after_sub)?;

                let mut forward = before_remove.clone();
                forward.extend(after_add.clone());
                commands_by_device.entry(device.clone()).or_default().extend(forward);

                let mut backward = after_remove;
                backward.extend(before_add);
                rollback_by_device.entry(device.clone()).or_default().extend(backward);
            }
        }
    }

    let mut affected_devices: Vec<String> = commands_by_device.keys().cloned().collect();
    affected_devices.sort();

    let impact_summary = health::analyze_impact(&diffs, working, fleet);

    Ok(DeploymentPlan { commands_by_device, rollback_by_device, affected_devices, impact_summary })
}
