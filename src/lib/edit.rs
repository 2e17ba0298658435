// SPDX-License-Identifier: Apache-2.0

//! The data model and pure mutation logic for an [`EditSession`]'s
//! working copy (spec §4.C7). Locking, persistence and the
//! `AlreadyLocked` contract live in `crate::session`; this module only
//! knows how to apply one [`Change`] to a devices map and how to
//! invert it for undo/redo.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bdproc::classify_members;
use crate::bridge_domain::ConsolidatedBridgeDomain;
use crate::interface::{is_infrastructure_bundle, InterfaceRole, Manipulation, VlanFacts};
use crate::{BdError, BdUuid, DiagnosticCode, ErrorKind, Interface};

/// The full enumeration of edits an operator may make against a
/// working copy (spec §4.C7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Change {
    AddInterface { device: String, iface: String, vlan_facts: VlanFacts },
    RemoveInterface { device: String, iface: String },
    ModifyInterface { device: String, iface: String, field: ModifyField },
    MoveInterface { device: String, iface: String, to_device: String, to_iface: String },
    ChangeVlanId { new_vlan_id: u16 },
    ChangeOuterVlan { new_outer_vlan: u16 },
    ChangeInnerVlan { new_inner_vlan: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ModifyField {
    VlanId(u16),
    OuterVlan(u16),
    InnerVlan(u16),
    Manipulation(Manipulation),
}

/// Lifecycle state of one `EditSession` (spec §3 `EditSession`,
/// §4.C9 deployment states are layered on top once `deploying`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionStatus {
    Active,
    Previewed,
    Validated,
    Deploying,
    Deployed,
    Failed,
    RolledBack,
    Cancelled,
    /// A `deploying` session found on restart with no reconciliation
    /// primitive available (spec §9 Open Question decision).
    Unknown,
}

impl SessionStatus {
    /// Sessions in these states hold the exclusive lock on their BD
    /// (spec §8 testable property 7).
    pub fn holds_lock(&self) -> bool {
        matches!(self, Self::Active | Self::Previewed | Self::Validated | Self::Deploying)
    }
}

/// One applied (or rejected-and-discarded) change, with enough
/// before/after state to invert it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ChangeRecord {
    pub change: Change,
    /// Affected interfaces' state before the change (empty for a pure add).
    pub before: Vec<Interface>,
    /// Affected interfaces' state after the change (empty for a pure remove).
    pub after: Vec<Interface>,
    pub reversible: bool,
    pub at: DateTime<Utc>,
}

/// Outcome of `apply_change`. A rejected change never mutates the
/// working copy (spec §7 Validation policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ValidationResult {
    pub accepted: bool,
    pub diagnostic: Option<DiagnosticCode>,
    pub message: Option<String>,
}

impl ValidationResult {
    fn accepted() -> Self {
        Self { accepted: true, diagnostic: None, message: None }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        let message = reason.into();
        Self {
            accepted: false,
            diagnostic: Some(DiagnosticCode::ValidationFailed { reason: message.clone() }),
            message: Some(message),
        }
    }
}

/// An isolated working copy of one `ConsolidatedBridgeDomain`, plus
/// the ordered log of changes applied to it (spec §3 `EditSession`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EditSession {
    pub id: BdUuid,
    pub bd_name: String,
    pub user: String,
    pub status: SessionStatus,
    pub original: ConsolidatedBridgeDomain,
    pub working_copy: ConsolidatedBridgeDomain,
    pub changes: Vec<ChangeRecord>,
    /// Number of changes undone from the tail of `changes` that redo
    /// can still replay. Reset to 0 whenever a new change is applied.
    pub undone: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EditSession {
    pub fn new(bd_name: impl Into<String>, user: impl Into<String>, original: ConsolidatedBridgeDomain) -> Self {
        let now = Utc::now();
        Self {
            id: BdUuid::new(),
            bd_name: bd_name.into(),
            user: user.into(),
            status: SessionStatus::Active,
            working_copy: original.clone(),
            original,
            changes: Vec::new(),
            undone: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applied changes still on the stack (i.e. not undone).
    fn live_changes(&self) -> &[ChangeRecord] {
        &self.changes[..self.changes.len() - self.undone]
    }

    /// Attempts one change against the working copy. On rejection the
    /// working copy and change log are left exactly as they were.
    pub fn apply_change(&mut self, change: Change) -> Result<ValidationResult, BdError> {
        if self.status != SessionStatus::Active {
            return Err(BdError::new(
                ErrorKind::Session,
                format!("session {} is not active (status: {:?})", self.id, self.status),
            ));
        }

        let mut devices = self.working_copy.devices.clone();
        let outcome = apply_one(&mut devices, self.working_copy.dnaas_type, &change);

        let (before, after) = match outcome {
            Ok(pair) => pair,
            Err(reason) => return Ok(ValidationResult::rejected(reason)),
        };

        // Testable property 6: modifications must not silently retype the BD.
        let flat: Vec<Interface> = devices.values().flatten().cloned().collect();
        match classify_members(&flat, &self.working_copy.primary_name) {
            Ok(new_type) if new_type == self.original.dnaas_type => {}
            Ok(new_type) => {
                return Ok(ValidationResult::rejected(format!(
                    "change would retype the bridge domain from {} to {}",
                    self.original.dnaas_type, new_type
                )));
            }
            Err(e) => return Ok(ValidationResult::rejected(e.msg)),
        }

        apply_envelope_change(&mut self.working_copy, &change);
        self.working_copy.devices = devices;
        self.changes.truncate(self.changes.len() - self.undone);
        self.undone = 0;
        self.changes.push(ChangeRecord { change, before, after, reversible: true, at: Utc::now() });
        self.updated_at = Utc::now();
        Ok(ValidationResult::accepted())
    }

    /// Reverts the most recent live change, if any.
    pub fn undo(&mut self) -> Result<(), BdError> {
        if self.undone >= self.changes.len() {
            return Err(BdError::new(ErrorKind::Session, "nothing to undo"));
        }
        let idx = self.changes.len() - self.undone - 1;
        let record = self.changes[idx].clone();
        if !record.reversible {
            return Err(BdError::new(ErrorKind::Session, "change is not reversible"));
        }
        for iface in &record.after {
            remove_interface(&mut self.working_copy.devices, &iface.device, &iface.name);
        }
        for iface in &record.before {
            insert_interface(&mut self.working_copy.devices, iface.clone());
        }
        revert_envelope_change(&mut self.working_copy, &record.change);
        self.undone += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replays the most recently undone change.
    pub fn redo(&mut self) -> Result<(), BdError> {
        if self.undone == 0 {
            return Err(BdError::new(ErrorKind::Session, "nothing to redo"));
        }
        let idx = self.changes.len() - self.undone;
        let record = self.changes[idx].clone();
        for iface in &record.before {
            remove_interface(&mut self.working_copy.devices, &iface.device, &iface.name);
        }
        for iface in &record.after {
            insert_interface(&mut self.working_copy.devices, iface.clone());
        }
        apply_envelope_change(&mut self.working_copy, &record.change);
        self.undone -= 1;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn find_interface<'a>(
    devices: &'a BTreeMap<String, Vec<Interface>>,
    device: &str,
    name: &str,
) -> Option<&'a Interface> {
    devices.get(device)?.iter().find(|i| i.name == name)
}

fn remove_interface(devices: &mut BTreeMap<String, Vec<Interface>>, device: &str, name: &str) -> Option<Interface> {
    let list = devices.get_mut(device)?;
    let idx = list.iter().position(|i| i.name == name)?;
    Some(list.remove(idx))
}

fn insert_interface(devices: &mut BTreeMap<String, Vec<Interface>>, iface: Interface) {
    let list = devices.entry(iface.device.clone()).or_default();
    if let Some(slot) = list.iter_mut().find(|i| i.name == iface.name) {
        *slot = iface;
    } else {
        list.push(iface);
    }
}

fn is_customer_editable_name(name: &str, role: InterfaceRole) -> bool {
    role == InterfaceRole::Access && !is_infrastructure_bundle(name)
}

/// Mutates `devices` in place for one `Change`. Returns the
/// before/after interface snapshots on success, or a plain rejection
/// reason (never a `BdError`, since a rejection is not a plumbing
/// failure — the caller turns it into a `ValidationResult`).
fn apply_one(
    devices: &mut BTreeMap<String, Vec<Interface>>,
    dnaas_type: crate::bridge_domain::DnaasType,
    change: &Change,
) -> Result<(Vec<Interface>, Vec<Interface>), String> {
    if !dnaas_type.supports_editing() {
        return Err(format!("{dnaas_type} bridge domains are browse-only"));
    }

    match change {
        Change::AddInterface { device, iface, vlan_facts } => {
            if find_interface(devices, device, iface).is_some() {
                return Err(format!("{device}/{iface} already exists in this bridge domain"));
            }
            let mut new_iface = Interface::new(device.clone(), iface.clone());
            new_iface.role = InterfaceRole::Access;
            new_iface.vlan_facts = vlan_facts.clone();
            crate::diff::validate_endpoint(dnaas_type, &new_iface).map_err(|e| e.msg)?;
            insert_interface(devices, new_iface.clone());
            Ok((Vec::new(), vec![new_iface]))
        }
        Change::RemoveInterface { device, iface } => {
            let found = find_interface(devices, device, iface)
                .ok_or_else(|| format!("{device}/{iface} is not a member of this bridge domain"))?;
            if !is_customer_editable_name(&found.name, found.role) {
                return Err(format!("{device}/{iface} is not customer-editable"));
            }
            let before = found.clone();
            remove_interface(devices, device, iface);
            Ok((vec![before], Vec::new()))
        }
        Change::ModifyInterface { device, iface, field } => {
            let found = find_interface(devices, device, iface)
                .ok_or_else(|| format!("{device}/{iface} is not a member of this bridge domain"))?;
            if !is_customer_editable_name(&found.name, found.role) {
                return Err(format!("{device}/{iface} is not customer-editable"));
            }
            let before = found.clone();
            let mut after = before.clone();
            match field {
                ModifyField::VlanId(v) => after.vlan_facts.vlan_id = Some(*v),
                ModifyField::OuterVlan(v) => after.vlan_facts.outer_vlan = Some(*v),
                ModifyField::InnerVlan(v) => after.vlan_facts.inner_vlan = Some(*v),
                ModifyField::Manipulation(m) => after.vlan_facts.manipulation = m.clone(),
            }
            crate::diff::validate_endpoint(dnaas_type, &after).map_err(|e| e.msg)?;
            insert_interface(devices, after.clone());
            Ok((vec![before], vec![after]))
        }
        Change::MoveInterface { device, iface, to_device, to_iface } => {
            let found = find_interface(devices, device, iface)
                .ok_or_else(|| format!("{device}/{iface} is not a member of this bridge domain"))?;
            if !is_customer_editable_name(&found.name, found.role) {
                return Err(format!("{device}/{iface} is not customer-editable"));
            }
            if find_interface(devices, to_device, to_iface).is_some() {
                return Err(format!("{to_device}/{to_iface} already exists in this bridge domain"));
            }
            let before = found.clone();
            let mut after = before.clone();
            after.device = to_device.clone();
            after.name = to_iface.clone();
            after.subinterface = None;
            crate::diff::validate_endpoint(dnaas_type, &after).map_err(|e| e.msg)?;
            remove_interface(devices, device, iface);
            insert_interface(devices, after.clone());
            Ok((vec![before], vec![after]))
        }
        Change::ChangeVlanId { .. } | Change::ChangeOuterVlan { .. } | Change::ChangeInnerVlan { .. } => {
            cascade_vlan_change(devices, dnaas_type, change)
        }
    }
}

/// BD-wide VLAN edits cascade to every customer interface (spec
/// §4.C7). Infrastructure interfaces (uplink/downlink/transport) are
/// untouched — they carry the fabric's own VLAN plumbing, not the
/// customer's.
fn cascade_vlan_change(
    devices: &mut BTreeMap<String, Vec<Interface>>,
    dnaas_type: crate::bridge_domain::DnaasType,
    change: &Change,
) -> Result<(Vec<Interface>, Vec<Interface>), String> {
    let mut before = Vec::new();
    let mut after = Vec::new();

    for list in devices.values_mut() {
        for iface in list.iter_mut() {
            if !is_customer_editable_name(&iface.name, iface.role) {
                continue;
            }
            let prior = iface.clone();
            match change {
                Change::ChangeVlanId { new_vlan_id } => iface.vlan_facts.vlan_id = Some(*new_vlan_id),
                Change::ChangeOuterVlan { new_outer_vlan } => iface.vlan_facts.outer_vlan = Some(*new_outer_vlan),
                Change::ChangeInnerVlan { new_inner_vlan } => iface.vlan_facts.inner_vlan = Some(*new_inner_vlan),
                _ => unreachable!("only VLAN-cascade variants reach this function"),
            }
            crate::diff::validate_endpoint(dnaas_type, iface).map_err(|e| e.msg)?;
            before.push(prior);
            after.push(iface.clone());
        }
    }

    if before.is_empty() {
        return Err("bridge domain has no customer-editable interfaces to cascade the change to".to_string());
    }
    Ok((before, after))
}

fn apply_envelope_change(bd: &mut ConsolidatedBridgeDomain, change: &Change) {
    match change {
        Change::ChangeVlanId { new_vlan_id } => bd.global_identifier = Some(*new_vlan_id),
        Change::ChangeOuterVlan { new_outer_vlan } => {
            bd.outer_vlan = Some(*new_outer_vlan);
            if bd.dnaas_type.is_qinq() {
                bd.global_identifier = Some(*new_outer_vlan);
            }
        }
        Change::ChangeInnerVlan { new_inner_vlan } => bd.inner_vlan = Some(*new_inner_vlan),
        _ => {}
    }
}

fn revert_envelope_change(bd: &mut ConsolidatedBridgeDomain, change: &Change) {
    match change {
        Change::ChangeVlanId { .. } => bd.global_identifier = bd.members.first().and_then(|m| m.global_identifier),
        Change::ChangeOuterVlan { .. } => bd.outer_vlan = None,
        Change::ChangeInnerVlan { .. } => bd.inner_vlan = None,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_domain::{AssignmentState, ConsolidationInfo, DnaasType, ProcessedBridgeDomain, SelectionReason};

    fn single_tagged_bd() -> ConsolidatedBridgeDomain {
        let mut iface = Interface::new("L-A", "ge100-0/0/5");
        iface.role = InterfaceRole::Access;
        iface.vlan_facts.vlan_id = Some(251);
        let mut devices = BTreeMap::new();
        devices.insert("L-A".to_string(), vec![iface.clone()]);
        ConsolidatedBridgeDomain {
            consolidation_key: "alice|251".to_string(),
            primary_name: "g_alice_v251".to_string(),
            dnaas_type: DnaasType::Type4A,
            service_type: DnaasType::Type4A.service_type_name().to_string(),
            global_identifier: Some(251),
            outer_vlan: None,
            inner_vlan: None,
            username: Some("alice".to_string()),
            members: vec![ProcessedBridgeDomain {
                device: "L-A".to_string(),
                bd_name: "g_alice_v251".to_string(),
                members: vec![iface],
                raw_cli: Vec::new(),
                dnaas_type: DnaasType::Type4A,
                service_type: DnaasType::Type4A.service_type_name().to_string(),
                qinq_detected: false,
                global_identifier: Some(251),
                username: Some("alice".to_string()),
                consolidation_key: "alice|251".to_string(),
            }],
            devices,
            consolidation_info: ConsolidationInfo {
                represents: vec!["g_alice_v251".to_string()],
                selection_reason: SelectionReason::StandardFormatPreferred,
            },
            assignment_state: AssignmentState::Available,
        }
    }

    #[test]
    fn add_interface_is_accepted_and_logged() {
        let bd = single_tagged_bd();
        let mut session = EditSession::new("g_alice_v251", "alice", bd);
        let mut vlan_facts = VlanFacts::default();
        vlan_facts.vlan_id = Some(251);
        let result = session
            .apply_change(Change::AddInterface {
                device: "L-C".to_string(),
                iface: "ge100-0/0/2".to_string(),
                vlan_facts,
            })
            .unwrap();
        assert!(result.accepted);
        assert_eq!(session.changes.len(), 1);
        assert!(find_interface(&session.working_copy.devices, "L-C", "ge100-0/0/2").is_some());
    }

    #[test]
    fn removing_non_customer_editable_interface_is_rejected_without_mutation() {
        let bd = single_tagged_bd();
        let mut session = EditSession::new("g_alice_v251", "alice", bd);
        let before = session.working_copy.clone();
        let result = session
            .apply_change(Change::RemoveInterface { device: "L-B".to_string(), iface: "ge9".to_string() })
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(session.working_copy, before);
        assert!(session.changes.is_empty());
    }

    #[test]
    fn undo_restores_prior_state() {
        let bd = single_tagged_bd();
        let mut session = EditSession::new("g_alice_v251", "alice", bd.clone());
        let mut vlan_facts = VlanFacts::default();
        vlan_facts.vlan_id = Some(251);
        session
            .apply_change(Change::AddInterface {
                device: "L-C".to_string(),
                iface: "ge100-0/0/2".to_string(),
                vlan_facts,
            })
            .unwrap();
        session.undo().unwrap();
        assert_eq!(session.working_copy.devices, bd.devices);
        session.redo().unwrap();
        assert!(find_interface(&session.working_copy.devices, "L-C", "ge100-0/0/2").is_some());
    }

    #[test]
    fn move_interface_preserves_vlan_facts() {
        let bd = single_tagged_bd();
        let mut session = EditSession::new("g_alice_v251", "alice", bd);
        let result = session
            .apply_change(Change::MoveInterface {
                device: "L-A".to_string(),
                iface: "ge100-0/0/5".to_string(),
                to_device: "L-A".to_string(),
                to_iface: "ge100-0/0/7".to_string(),
            })
            .unwrap();
        assert!(result.accepted);
        assert!(find_interface(&session.working_copy.devices, "L-A", "ge100-0/0/5").is_none());
        let moved = find_interface(&session.working_copy.devices, "L-A", "ge100-0/0/7").unwrap();
        assert_eq!(moved.vlan_facts.vlan_id, Some(251));
    }
}
