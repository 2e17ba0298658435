// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Interface;

/// The official DNAAS service classification (spec §4.C4 decision
/// table). A sealed sum with per-variant behavior (here and in
/// `crate::diff`) rather than a bare tag plus side tables, so adding a
/// type is localized to one variant instead of scattered `match`es.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[non_exhaustive]
pub enum DnaasType {
    /// Double-Tagged: explicit outer+inner VLAN tags, no manipulation.
    Type1,
    /// QinQ Single BD: manipulation push covering the full `1-4094` range.
    Type2A,
    /// QinQ Multi BD: manipulation with discrete/partial inner VLANs.
    Type2B,
    /// Hybrid: mixed manipulation patterns within one BD. Browse-only;
    /// see the Open Question decision in DESIGN.md.
    Type3,
    /// Single-Tagged: one `vlan-id` per interface, no manipulation.
    Type4A,
    /// VLAN Range/List: `vlan_range` or `vlan_list`, no manipulation.
    Type4B,
    /// Port-Mode: physical, no subinterface, no VLAN facts.
    Type5,
}

impl std::fmt::Display for DnaasType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.service_type_name())
    }
}

impl DnaasType {
    /// Human-readable service type name (spec §4.C4 "Name" column).
    pub fn service_type_name(&self) -> &'static str {
        match self {
            Self::Type1 => "Double-Tagged",
            Self::Type2A => "QinQ Single BD",
            Self::Type2B => "QinQ Multi BD",
            Self::Type3 => "Hybrid",
            Self::Type4A => "Single-Tagged",
            Self::Type4B => "VLAN Range/List",
            Self::Type5 => "Port-Mode",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Type1 => "1",
            Self::Type2A => "2A",
            Self::Type2B => "2B",
            Self::Type3 => "3",
            Self::Type4A => "4A",
            Self::Type4B => "4B",
            Self::Type5 => "5",
        }
    }

    /// Whether this type's classification rests on manipulation
    /// (push/pop) rather than explicit tags.
    pub fn is_qinq(&self) -> bool {
        matches!(self, Self::Type2A | Self::Type2B | Self::Type3)
    }

    /// Whether edits against this type are currently supported by the
    /// diff engine (spec §9 Open Question: Type 3 has no pinned-down
    /// CLI template, so it stays browse-only).
    pub fn supports_editing(&self) -> bool {
        !matches!(self, Self::Type3)
    }
}

/// Per-device fragment as originally discovered, before any BD-PROC
/// enrichment. Discarded once `crate::bdproc` has consumed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RawBridgeDomain {
    pub device: String,
    pub bd_name: String,
    pub members: Vec<Interface>,
    pub raw_cli: Vec<String>,
}

impl RawBridgeDomain {
    pub fn new(device: impl Into<String>, bd_name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            bd_name: bd_name.into(),
            members: Vec::new(),
            raw_cli: Vec::new(),
        }
    }
}

/// Output of running the 7 BD-PROC phases over one `RawBridgeDomain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProcessedBridgeDomain {
    pub device: String,
    pub bd_name: String,
    pub members: Vec<Interface>,
    pub raw_cli: Vec<String>,
    pub dnaas_type: DnaasType,
    pub service_type: String,
    pub qinq_detected: bool,
    /// Set iff `dnaas_type` permits cross-device consolidation
    /// (spec §4.C4 Phase 3).
    pub global_identifier: Option<u16>,
    pub username: Option<String>,
    pub consolidation_key: String,
}

impl ProcessedBridgeDomain {
    /// `INDIVIDUAL|<bd-name>` keys never consolidate with anything
    /// else; this is the convenience predicate callers want instead
    /// of re-parsing the key.
    pub fn is_individual(&self) -> bool {
        self.consolidation_key.starts_with("INDIVIDUAL|")
            || self.global_identifier.is_none() && self.username.is_none()
    }

    pub fn customer_editable_members(&self) -> impl Iterator<Item = &Interface> {
        self.members.iter().filter(|i| i.is_customer_editable())
    }
}

/// Why a particular member's name was chosen as `primary_name`
/// (spec §4.C5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SelectionReason {
    StandardFormatPreferred,
    ShortestName,
    LexicographicallySmallest,
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StandardFormatPreferred => "standard_format_preferred",
            Self::ShortestName => "shortest_name",
            Self::LexicographicallySmallest => "lexicographically_smallest",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ConsolidationInfo {
    /// All source bd-names that fed into this record, in the order
    /// they were considered during primary-name selection.
    pub represents: Vec<String>,
    pub selection_reason: SelectionReason,
}

/// Assignment/lifecycle state of a consolidated BD as tracked by the
/// store (spec §6 `bridge_domains.assignment state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AssignmentState {
    Available,
    Assigned,
    Editing,
    Deployed,
}

/// A network-wide broadcast domain, merged from one or more
/// `ProcessedBridgeDomain`s that share a consolidation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ConsolidatedBridgeDomain {
    pub consolidation_key: String,
    pub primary_name: String,
    pub dnaas_type: DnaasType,
    pub service_type: String,
    pub global_identifier: Option<u16>,
    pub outer_vlan: Option<u16>,
    pub inner_vlan: Option<u16>,
    pub username: Option<String>,
    pub members: Vec<ProcessedBridgeDomain>,
    /// Interfaces grouped by device; never flattened (spec §3).
    pub devices: BTreeMap<String, Vec<Interface>>,
    pub consolidation_info: ConsolidationInfo,
    pub assignment_state: AssignmentState,
}

impl ConsolidatedBridgeDomain {
    pub fn customer_editable_interfaces(&self) -> Vec<&Interface> {
        self.devices
            .values()
            .flatten()
            .filter(|i| i.is_customer_editable())
            .collect()
    }

    pub fn total_interface_count(&self) -> usize {
        self.devices.values().map(|v| v.len()).sum()
    }
}
