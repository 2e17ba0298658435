// SPDX-License-Identifier: Apache-2.0

//! Health and impact analysis (spec §4.C10): a read-only check over a
//! discovered bridge domain, plus the downtime/blast-radius estimate
//! attached to every `DeploymentPlan`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bdproc::classify_members;
use crate::bridge_domain::ConsolidatedBridgeDomain;
use crate::diff::EndpointDiff;
use crate::{BdError, Device, ErrorKind, Interface};

/// How disruptive a plan's forward commands are expected to be.
/// Ordered least to most severe so callers can `max()` across diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DowntimeClass {
    /// Pure additions: no existing endpoint's forwarding path changes.
    None,
    /// A `no interfaces ...` precedes a replacement on the same port;
    /// traffic on that endpoint drops for the command round-trip.
    Brief,
    /// The BD's last remaining customer endpoint is being removed, or
    /// every existing endpoint is being modified at once.
    Immediate,
}

impl std::fmt::Display for DowntimeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Brief => "brief",
            Self::Immediate => "immediate",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ImpactSummary {
    pub customer_endpoints_affected: usize,
    pub devices_touched: usize,
    pub downtime: DowntimeClass,
    pub warnings: Vec<String>,
}

/// Computed from a pre-built `EndpointDiff` list so `crate::diff`
/// doesn't have to re-derive before/after sets a second time.
pub(crate) fn analyze_impact(
    diffs: &[EndpointDiff],
    working: &ConsolidatedBridgeDomain,
    fleet: Option<&BTreeMap<String, Device>>,
) -> ImpactSummary {
    let mut devices_touched: Vec<&str> = Vec::new();
    let mut warnings = Vec::new();
    let mut downtime = DowntimeClass::None;

    for d in diffs {
        let device = match d {
            EndpointDiff::Add { device, .. } => device,
            EndpointDiff::Remove { device, .. } => device,
            EndpointDiff::Modify { device, .. } => device,
        };
        if !devices_touched.contains(&device.as_str()) {
            devices_touched.push(device.as_str());
        }
        if matches!(d, EndpointDiff::Modify { .. } | EndpointDiff::Remove { .. }) {
            downtime = downtime.max(DowntimeClass::Brief);
        }
    }

    let remaining_customer_endpoints = working.customer_editable_interfaces().len();
    if remaining_customer_endpoints == 0 && !diffs.is_empty() {
        downtime = DowntimeClass::Immediate;
        warnings.push("change leaves the bridge domain with no customer-editable endpoints".to_string());
    }

    if let Some(fleet) = fleet {
        for (device, ifaces) in &working.devices {
            let Some(dev) = fleet.get(device) else { continue };
            for iface in ifaces {
                if let Some(existing) = dev.interfaces.get(&iface.qualified_name())
                    && existing.vlan_facts != iface.vlan_facts
                    && !diffs.iter().any(|d| matches!(d, EndpointDiff::Modify { device: dd, .. } if dd == device))
                {
                    warnings.push(format!(
                        "{device}/{} already carries conflicting VLAN facts outside this session",
                        iface.name
                    ));
                }
            }
        }
    }

    ImpactSummary {
        customer_endpoints_affected: diffs.len(),
        devices_touched: devices_touched.len(),
        downtime,
        warnings,
    }
}

/// Read-only health snapshot over a consolidated BD: whether it has
/// any customer endpoints at all, whether it is of an editable type,
/// and whether any of its members are individuals masquerading as
/// consolidated (a single-member group is not itself a problem, but a
/// zero-endpoint one is worth flagging to an operator browsing the
/// store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct HealthReport {
    pub bd_name: String,
    pub editable: bool,
    pub customer_endpoint_count: usize,
    pub member_count: usize,
    pub warnings: Vec<String>,
}

pub fn check_health(bd: &ConsolidatedBridgeDomain) -> HealthReport {
    let customer_endpoint_count = bd.customer_editable_interfaces().len();
    let mut warnings = Vec::new();

    if customer_endpoint_count == 0 {
        warnings.push("bridge domain has no customer-editable endpoints".to_string());
    }
    if !bd.dnaas_type.supports_editing() {
        warnings.push(format!("{} bridge domains are browse-only", bd.dnaas_type));
    }
    if bd.members.len() > 1 && bd.global_identifier.is_none() {
        warnings.push("multiple members consolidated without a shared global identifier".to_string());
    }

    HealthReport {
        bd_name: bd.primary_name.clone(),
        editable: bd.dnaas_type.supports_editing(),
        customer_endpoint_count,
        member_count: bd.members.len(),
        warnings,
    }
}

/// Blocking pre-deployment gate (spec §4.C9 step 1): required fields
/// present, device map non-empty, and the VLAN envelope still
/// consistent with `dnaas_type` (an edit session can only ever reach
/// this by way of `crate::edit`'s own retype guard, but a plan may be
/// previewed long before it's deployed, so the check is repeated here
/// against whatever the working copy looks like right now). Returns
/// the ordinary health report on success so a caller can also surface
/// its warnings.
pub fn preflight(bd: &ConsolidatedBridgeDomain) -> Result<HealthReport, BdError> {
    if bd.primary_name.trim().is_empty() {
        return Err(BdError::new(ErrorKind::Validation, "bridge domain has no primary_name"));
    }
    if bd.devices.is_empty() {
        return Err(BdError::new(ErrorKind::Validation, format!("{}: device map is empty", bd.primary_name)));
    }

    let flat: Vec<Interface> = bd.devices.values().flatten().cloned().collect();
    if let Ok(observed) = classify_members(&flat, &bd.primary_name)
        && observed != bd.dnaas_type
    {
        return Err(BdError::new(
            ErrorKind::Validation,
            format!(
                "{}: VLAN envelope no longer matches dnaas_type {} (observed {observed})",
                bd.primary_name, bd.dnaas_type
            ),
        ));
    }

    Ok(check_health(bd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_domain::{AssignmentState, ConsolidationInfo, DnaasType, ProcessedBridgeDomain, SelectionReason};

    fn empty_bd(dnaas_type: DnaasType, global_identifier: Option<u16>, member_count: usize) -> ConsolidatedBridgeDomain {
        ConsolidatedBridgeDomain {
            consolidation_key: "k".to_string(),
            primary_name: "g_alice_v251".to_string(),
            dnaas_type,
            service_type: dnaas_type.service_type_name().to_string(),
            global_identifier,
            outer_vlan: None,
            inner_vlan: None,
            username: Some("alice".to_string()),
            members: (0..member_count)
                .map(|i| ProcessedBridgeDomain {
                    device: format!("L-{i}"),
                    bd_name: "g_alice_v251".to_string(),
                    members: Vec::new(),
                    raw_cli: Vec::new(),
                    dnaas_type,
                    service_type: dnaas_type.service_type_name().to_string(),
                    qinq_detected: dnaas_type.is_qinq(),
                    global_identifier,
                    username: Some("alice".to_string()),
                    consolidation_key: "k".to_string(),
                })
                .collect(),
            devices: BTreeMap::new(),
            consolidation_info: ConsolidationInfo {
                represents: vec!["g_alice_v251".to_string()],
                selection_reason: SelectionReason::StandardFormatPreferred,
            },
            assignment_state: AssignmentState::Available,
        }
    }

    #[test]
    fn flags_no_customer_endpoints() {
        let bd = empty_bd(DnaasType::Type4A, Some(251), 1);
        let report = check_health(&bd);
        assert_eq!(report.customer_endpoint_count, 0);
        assert!(report.warnings.iter().any(|w| w.contains("no customer-editable endpoints")));
    }

    #[test]
    fn flags_browse_only_type() {
        let bd = empty_bd(DnaasType::Type3, None, 2);
        let report = check_health(&bd);
        assert!(!report.editable);
        assert!(report.warnings.iter().any(|w| w.contains("browse-only")));
    }

    #[test]
    fn flags_multi_member_without_shared_identifier() {
        let bd = empty_bd(DnaasType::Type3, None, 2);
        let report = check_health(&bd);
        assert!(report.warnings.iter().any(|w| w.contains("shared global identifier")));
    }

    #[test]
    fn preflight_rejects_an_empty_device_map() {
        let bd = empty_bd(DnaasType::Type4A, Some(251), 1);
        let err = preflight(&bd).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn preflight_passes_a_consistent_single_tagged_bd() {
        use crate::interface::InterfaceRole;
        use std::collections::BTreeMap;

        let mut bd = empty_bd(DnaasType::Type4A, Some(251), 1);
        let mut iface = Interface::new("L-A", "ge1");
        iface.role = InterfaceRole::Access;
        iface.vlan_facts.vlan_id = Some(251);
        let mut devices = BTreeMap::new();
        devices.insert("L-A".to_string(), vec![iface]);
        bd.devices = devices;

        let report = preflight(&bd).unwrap();
        assert_eq!(report.customer_endpoint_count, 1);
    }
}
