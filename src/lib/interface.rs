// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Physical vs. bundle (LAG) interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum InterfaceKind {
    Physical,
    Bundle,
}

/// The functional role an interface plays in the fabric.
///
/// Bundles get their role from a name-pattern match against the owning
/// device's class; physical ports get theirs from LLDP neighbor data
/// (see `crate::classify`). Never inferred from VLAN facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum InterfaceRole {
    Access,
    Uplink,
    Downlink,
    Transport,
    Unknown,
}

impl std::fmt::Display for InterfaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Access => "access",
            Self::Uplink => "uplink",
            Self::Downlink => "downlink",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A discrete set or closed range of VLAN tags, as carried by
/// `vlan-id list ...` lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum VlanList {
    Discrete(Vec<u16>),
    Range { min: u16, max: u16 },
}

impl VlanList {
    pub fn is_full_qinq_range(&self) -> bool {
        matches!(self, Self::Range { min: 1, max: 4094 })
    }
}

/// TPID used by a push/pop manipulation action. `0x8100` is the only
/// value the decision table (spec §4.C4) ever matches against, but the
/// field stays open so a corpus with custom TPIDs does not get
/// silently coerced.
pub type Tpid = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ManipulationAction {
    Push { tag: u16, tpid: Tpid },
    Pop,
}

/// The small push/pop algebra from `vlan-manipulation ingress-mapping`
/// / `egress-mapping` lines. Ingress and egress are independent; a BD
/// may carry either or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Manipulation {
    pub ingress: Option<ManipulationAction>,
    pub egress: Option<ManipulationAction>,
}

impl Manipulation {
    pub fn is_empty(&self) -> bool {
        self.ingress.is_none() && self.egress.is_none()
    }

    /// The outer tag pushed on ingress, if any — the value the spec's
    /// decision table and global-identifier rules key off.
    pub fn push_outer_tag(&self) -> Option<u16> {
        match self.ingress {
            Some(ManipulationAction::Push { tag, .. }) => Some(tag),
            _ => None,
        }
    }
}

/// The VLAN facts an interface can carry. At most one of these
/// combinations is populated by any single real interface; which
/// combination is present drives DNAAS classification (spec §4.C4).
///
/// Golden Rule: every field here must trace back to a `raw_cli` line
/// or the device VLAN-config dump. Nothing here is ever derived from
/// an interface or BD name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct VlanFacts {
    pub vlan_id: Option<u16>,
    pub vlan_list: Option<VlanList>,
    pub outer_vlan: Option<u16>,
    pub inner_vlan: Option<u16>,
    pub manipulation: Manipulation,
}

impl VlanFacts {
    pub fn is_empty(&self) -> bool {
        self.vlan_id.is_none()
            && self.vlan_list.is_none()
            && self.outer_vlan.is_none()
            && self.inner_vlan.is_none()
            && self.manipulation.is_empty()
    }

    pub fn has_manipulation(&self) -> bool {
        !self.manipulation.is_empty()
    }

    pub fn has_explicit_outer_inner(&self) -> bool {
        self.outer_vlan.is_some() && self.inner_vlan.is_some()
    }
}

/// A network interface on one device, as discovered from CLI text.
///
/// `raw_cli` is the provenance trail: the exact (ANSI-stripped) lines
/// that produced every fact on this record. An interface with VLAN
/// facts but no matching `raw_cli` line is a bug, not a shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Interface {
    pub device: String,
    /// Unabbreviated port or bundle name, without the `.N` suffix.
    pub name: String,
    /// Subinterface number, if this is `name.N`.
    pub subinterface: Option<u32>,
    pub kind: InterfaceKind,
    pub role: InterfaceRole,
    pub vlan_facts: VlanFacts,
    /// Set by an `l2-service enable` line. Not a VLAN fact, but the
    /// decisive evidence for Port-Mode (type 5) classification.
    pub l2_service_enabled: bool,
    pub raw_cli: Vec<String>,
    /// Set when the owning BD listed this interface but the VLAN dump
    /// had no fact for it (spec §4.C2 Golden Rule fallback).
    pub incomplete: bool,
}

impl Interface {
    pub fn new(device: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let (base, subinterface) = split_subinterface(&name);
        Self {
            device: device.into(),
            name: base,
            subinterface,
            kind: InterfaceKind::Physical,
            role: InterfaceRole::Unknown,
            vlan_facts: VlanFacts::default(),
            l2_service_enabled: false,
            raw_cli: Vec::new(),
            incomplete: false,
        }
    }

    pub fn has_subinterface(&self) -> bool {
        self.subinterface.is_some()
    }

    /// The fully qualified identifier as it appears in CLI output,
    /// e.g. `ge100-0/0/5.251`.
    pub fn qualified_name(&self) -> String {
        match self.subinterface {
            Some(n) => format!("{}.{n}", self.name),
            None => self.name.clone(),
        }
    }

    /// An access-role interface outside the infrastructure bundle
    /// patterns and not flagged incomplete — the only interfaces an
    /// operator is allowed to touch (spec §4.C7).
    pub fn is_customer_editable(&self) -> bool {
        self.role == InterfaceRole::Access
            && !is_infrastructure_bundle(&self.name)
            && !self.incomplete
    }
}

pub(crate) fn is_infrastructure_bundle(name: &str) -> bool {
    name.starts_with("bundle-60000") || is_spine_downlink_bundle(name)
}

fn is_spine_downlink_bundle(name: &str) -> bool {
    // bundle-6000N, N>=1, but not bundle-60000* (handled above).
    name.strip_prefix("bundle-6000")
        .map(|rest| !rest.is_empty() && rest != "0" && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

fn split_subinterface(name: &str) -> (String, Option<u32>) {
    if let Some((base, suffix)) = name.rsplit_once('.')
        && let Ok(n) = suffix.parse::<u32>()
    {
        return (base.to_string(), Some(n));
    }
    (name.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_subinterface_suffix() {
        let iface = Interface::new("L-A", "ge100-0/0/5.251");
        assert_eq!(iface.name, "ge100-0/0/5");
        assert_eq!(iface.subinterface, Some(251));
        assert_eq!(iface.qualified_name(), "ge100-0/0/5.251");
    }

    #[test]
    fn physical_port_has_no_subinterface() {
        let iface = Interface::new("L-A", "ge100-0/0/5");
        assert_eq!(iface.subinterface, None);
        assert!(!iface.has_subinterface());
    }

    #[test]
    fn infrastructure_bundle_detection() {
        assert!(is_infrastructure_bundle("bundle-60000"));
        assert!(is_infrastructure_bundle("bundle-600001"));
        assert!(is_infrastructure_bundle("bundle-60001"));
        assert!(!is_infrastructure_bundle("bundle-60000-not-a-number"));
        assert!(!is_infrastructure_bundle("ge100-0/0/5"));
    }

    #[test]
    fn customer_editable_requires_access_role_and_not_infra() {
        let mut iface = Interface::new("L-A", "ge100-0/0/5");
        iface.role = InterfaceRole::Access;
        assert!(iface.is_customer_editable());

        iface.role = InterfaceRole::Uplink;
        assert!(!iface.is_customer_editable());

        let mut bundle = Interface::new("L-A", "bundle-60001");
        bundle.role = InterfaceRole::Access;
        assert!(!bundle.is_customer_editable());

        let mut incomplete = Interface::new("L-A", "ge100-0/0/9");
        incomplete.role = InterfaceRole::Access;
        incomplete.incomplete = true;
        assert!(!incomplete.is_customer_editable());
    }
}
