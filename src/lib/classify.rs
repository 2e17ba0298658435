// SPDX-License-Identifier: Apache-2.0

//! Device classification glue and interface role assignment (spec
//! §4.C3): bundles get their role from a name pattern plus the owning
//! device's class, physical ports get theirs from an LLDP neighbor
//! map.

use std::collections::BTreeMap;

use crate::device::{classify_device, DeviceClass, DeviceClassOverrides};
use crate::interface::{is_infrastructure_bundle, InterfaceRole};
use crate::{Device, DiagnosticCode, Interface};

/// `(device, iface) -> (neighbor_device, neighbor_iface)`, with a
/// `None` entry standing in for the `"|"` corrupt/absent sentinel.
pub type LldpMap = BTreeMap<(String, String), Option<(String, String)>>;

/// Parses a simple `<device> <iface> <neighbor-device>|<neighbor-iface>`
/// LLDP table, one entry per line; a bare `|` (or a missing pipe)
/// marks the entry corrupt.
pub fn parse_lldp_dump(text: &str) -> LldpMap {
    let mut map = LldpMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(device), Some(iface), Some(neighbor)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let key = (device.to_string(), iface.to_string());
        match neighbor.split_once('|') {
            Some((ndevice, niface)) if !ndevice.is_empty() && !niface.is_empty() => {
                map.insert(key, Some((ndevice.to_string(), niface.to_string())));
            }
            _ => {
                map.insert(key, None);
            }
        }
    }
    map
}

/// Assigns `DeviceClass` to every device in `devices`, honoring
/// `overrides`.
pub fn classify_devices(devices: &mut BTreeMap<String, Device>, overrides: &DeviceClassOverrides) {
    for (name, device) in devices.iter_mut() {
        device.class = classify_device(name, overrides);
    }
}

fn bundle_role(iface_name: &str, class: DeviceClass) -> Option<InterfaceRole> {
    if is_infrastructure_bundle(iface_name) {
        match class {
            DeviceClass::Leaf => Some(InterfaceRole::Uplink),
            DeviceClass::Spine => Some(InterfaceRole::Downlink),
            _ => None,
        }
    } else {
        None
    }
}

/// The four-case role matrix from §3/§4.C3. `None` plus a diagnostic
/// means the interface could not be classified; `None` with no
/// diagnostic means the pairing simply isn't one the matrix defines
/// (e.g. leaf↔superspine) and the interface stays `unknown` silently.
fn physical_role(
    my_class: DeviceClass,
    neighbor_class: DeviceClass,
    device: &str,
    iface: &str,
    neighbor_device: &str,
) -> (InterfaceRole, Option<DiagnosticCode>) {
    use DeviceClass::*;
    match (my_class, neighbor_class) {
        (Leaf, Spine) => (InterfaceRole::Uplink, None),
        (Spine, Leaf) => (InterfaceRole::Downlink, None),
        (Spine, Spine) => (InterfaceRole::Transport, None),
        (Spine, Superspine) => (InterfaceRole::Uplink, None),
        (Superspine, Spine) => (InterfaceRole::Downlink, None),
        (Leaf, Leaf) => (
            InterfaceRole::Unknown,
            Some(DiagnosticCode::InvalidTopology {
                device: device.to_string(),
                iface: iface.to_string(),
                neighbor: neighbor_device.to_string(),
            }),
        ),
        _ => (InterfaceRole::Unknown, None),
    }
}

/// Assigns a role to every interface on every device, mutating in
/// place. Devices must already carry their `DeviceClass` (see
/// `classify_devices`). Returns the diagnostics raised along the way.
pub fn assign_roles(devices: &mut BTreeMap<String, Device>, lldp: &LldpMap) -> Vec<DiagnosticCode> {
    let classes: BTreeMap<String, DeviceClass> =
        devices.iter().map(|(name, d)| (name.clone(), d.class)).collect();

    let mut diagnostics = Vec::new();

    for (device_name, device) in devices.iter_mut() {
        let my_class = device.class;
        for iface in device.interfaces.values_mut() {
            if iface.kind == crate::interface::InterfaceKind::Bundle {
                if let Some(role) = bundle_role(&iface.name, my_class) {
                    iface.role = role;
                }
                continue;
            }
            assign_one_physical_role(device_name, iface, my_class, &classes, lldp, &mut diagnostics);
        }
    }

    diagnostics
}

fn assign_one_physical_role(
    device_name: &str,
    iface: &mut Interface,
    my_class: DeviceClass,
    classes: &BTreeMap<String, DeviceClass>,
    lldp: &LldpMap,
    diagnostics: &mut Vec<DiagnosticCode>,
) {
    let key = (device_name.to_string(), iface.name.clone());
    let neighbor = match lldp.get(&key) {
        Some(Some(n)) => n,
        _ => {
            diagnostics.push(DiagnosticCode::LldpMissing {
                device: device_name.to_string(),
                iface: iface.name.clone(),
            });
            iface.role = InterfaceRole::Unknown;
            return;
        }
    };
    let neighbor_class = classes.get(&neighbor.0).copied().unwrap_or(DeviceClass::Unknown);
    let (role, diag) =
        physical_role(my_class, neighbor_class, device_name, &iface.name, &neighbor.0);
    iface.role = role;
    if let Some(diag) = diag {
        diagnostics.push(diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::InterfaceKind;

    fn device(name: &str, class: DeviceClass) -> Device {
        Device::new(name, class)
    }

    #[test]
    fn leaf_spine_link_gets_uplink_downlink() {
        let mut devices = BTreeMap::new();
        let mut leaf = device("L-A", DeviceClass::Leaf);
        let mut ge = Interface::new("L-A", "ge1");
        ge.kind = InterfaceKind::Physical;
        leaf.insert_interface(ge);
        devices.insert("L-A".to_string(), leaf);

        let mut spine = device("SP-1", DeviceClass::Spine);
        let mut ge2 = Interface::new("SP-1", "ge2");
        ge2.kind = InterfaceKind::Physical;
        spine.insert_interface(ge2);
        devices.insert("SP-1".to_string(), spine);

        let mut lldp = LldpMap::new();
        lldp.insert(
            ("L-A".to_string(), "ge1".to_string()),
            Some(("SP-1".to_string(), "ge2".to_string())),
        );
        lldp.insert(
            ("SP-1".to_string(), "ge2".to_string()),
            Some(("L-A".to_string(), "ge1".to_string())),
        );

        let diagnostics = assign_roles(&mut devices, &lldp);
        assert!(diagnostics.is_empty());
        assert_eq!(devices["L-A"].interfaces["ge1"].role, InterfaceRole::Uplink);
        assert_eq!(devices["SP-1"].interfaces["ge2"].role, InterfaceRole::Downlink);
    }

    #[test]
    fn leaf_leaf_link_is_invalid_topology() {
        let mut devices = BTreeMap::new();
        let mut leaf_a = device("L-A", DeviceClass::Leaf);
        let mut ge = Interface::new("L-A", "ge1");
        ge.kind = InterfaceKind::Physical;
        leaf_a.insert_interface(ge);
        devices.insert("L-A".to_string(), leaf_a);
        devices.insert("L-B".to_string(), device("L-B", DeviceClass::Leaf));

        let mut lldp = LldpMap::new();
        lldp.insert(
            ("L-A".to_string(), "ge1".to_string()),
            Some(("L-B".to_string(), "ge9".to_string())),
        );

        let diagnostics = assign_roles(&mut devices, &lldp);
        assert_eq!(devices["L-A"].interfaces["ge1"].role, InterfaceRole::Unknown);
        assert_eq!(
            diagnostics,
            vec![DiagnosticCode::InvalidTopology {
                device: "L-A".to_string(),
                iface: "ge1".to_string(),
                neighbor: "L-B".to_string(),
            }]
        );
    }

    #[test]
    fn missing_lldp_entry_flags_lldp_missing() {
        let mut devices = BTreeMap::new();
        let mut leaf = device("L-A", DeviceClass::Leaf);
        let mut ge = Interface::new("L-A", "ge1");
        ge.kind = InterfaceKind::Physical;
        leaf.insert_interface(ge);
        devices.insert("L-A".to_string(), leaf);

        let diagnostics = assign_roles(&mut devices, &LldpMap::new());
        assert_eq!(devices["L-A"].interfaces["ge1"].role, InterfaceRole::Unknown);
        assert_eq!(
            diagnostics,
            vec![DiagnosticCode::LldpMissing {
                device: "L-A".to_string(),
                iface: "ge1".to_string(),
            }]
        );
    }

    #[test]
    fn infrastructure_bundle_role_by_device_class() {
        let mut devices = BTreeMap::new();
        let mut leaf = device("L-A", DeviceClass::Leaf);
        let mut bundle = Interface::new("L-A", "bundle-60000");
        bundle.kind = InterfaceKind::Bundle;
        leaf.insert_interface(bundle);
        devices.insert("L-A".to_string(), leaf);

        let mut spine = device("SP-1", DeviceClass::Spine);
        let mut bundle2 = Interface::new("SP-1", "bundle-60001");
        bundle2.kind = InterfaceKind::Bundle;
        spine.insert_interface(bundle2);
        devices.insert("SP-1".to_string(), spine);

        assign_roles(&mut devices, &LldpMap::new());
        assert_eq!(devices["L-A"].interfaces["bundle-60000"].role, InterfaceRole::Uplink);
        assert_eq!(devices["SP-1"].interfaces["bundle-60001"].role, InterfaceRole::Downlink);
    }

    #[test]
    fn parses_lldp_dump_with_corrupt_sentinel() {
        let lldp = parse_lldp_dump(
            "L-A ge1 SP-1|ge2\n\
             L-A ge2 |\n",
        );
        assert_eq!(
            lldp.get(&("L-A".to_string(), "ge1".to_string())),
            Some(&Some(("SP-1".to_string(), "ge2".to_string())))
        );
        assert_eq!(lldp.get(&("L-A".to_string(), "ge2".to_string())), Some(&None));
    }
}
