// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Interface;

/// A device's position in the leaf/spine/superspine fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum DeviceClass {
    Leaf,
    Spine,
    Superspine,
    Unknown,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Leaf => "leaf",
            Self::Spine => "spine",
            Self::Superspine => "superspine",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A fabric device and the interfaces discovered on it.
///
/// Interfaces are keyed by their qualified name (base name plus any
/// `.N` subinterface) so (device, iface) stays unique per spec §3.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Device {
    pub name: String,
    pub class: DeviceClass,
    pub interfaces: BTreeMap<String, Interface>,
}

impl Default for DeviceClass {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Device {
    pub fn new(name: impl Into<String>, class: DeviceClass) -> Self {
        Self { name: name.into(), class, interfaces: BTreeMap::new() }
    }

    pub fn insert_interface(&mut self, iface: Interface) {
        self.interfaces.insert(iface.qualified_name(), iface);
    }
}

/// Manual name → class overrides for devices that don't fit the
/// pattern table (spec §4.C3 "manual override map").
#[derive(Debug, Clone, Default)]
pub struct DeviceClassOverrides {
    overrides: BTreeMap<String, DeviceClass>,
}

impl DeviceClassOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: impl Into<String>, class: DeviceClass) {
        self.overrides.insert(device.into(), class);
    }

    pub fn get(&self, device: &str) -> Option<DeviceClass> {
        self.overrides.get(device).copied()
    }
}

/// Classifies a device name by pattern, honoring manual overrides
/// first. Pattern table: `leaf-*`/`l-*` → leaf, `spine-*`/`sp-*` →
/// spine, `ss-*`/`superspine-*` → superspine; anything else is
/// `Unknown` and excluded from role-dependent operations (spec §7
/// Topology policy).
pub fn classify_device(name: &str, overrides: &DeviceClassOverrides) -> DeviceClass {
    if let Some(class) = overrides.get(name) {
        return class;
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("superspine") || lower.starts_with("ss-") {
        DeviceClass::Superspine
    } else if lower.starts_with("spine") || lower.starts_with("sp-") {
        DeviceClass::Spine
    } else if lower.starts_with("leaf") || lower.starts_with("l-") {
        DeviceClass::Leaf
    } else {
        DeviceClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_name_pattern() {
        let overrides = DeviceClassOverrides::new();
        assert_eq!(classify_device("L-A", &overrides), DeviceClass::Leaf);
        assert_eq!(classify_device("leaf-12", &overrides), DeviceClass::Leaf);
        assert_eq!(classify_device("SPINE-3", &overrides), DeviceClass::Spine);
        assert_eq!(classify_device("ss-1", &overrides), DeviceClass::Superspine);
        assert_eq!(classify_device("core-rtr-1", &overrides), DeviceClass::Unknown);
    }

    #[test]
    fn manual_override_wins() {
        let mut overrides = DeviceClassOverrides::new();
        overrides.insert("weird-box-7", DeviceClass::Spine);
        assert_eq!(classify_device("weird-box-7", &overrides), DeviceClass::Spine);
    }
}
