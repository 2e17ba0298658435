// SPDX-License-Identifier: Apache-2.0

//! End-to-end discovery orchestration: load dumps (C1), parse them
//! (C2), classify devices and assign interface roles (C3), run
//! BD-PROC per bridge domain (C4), then consolidate (C5). Exposed as
//! a free async function so `crate::BdFabric` and the CLI's
//! `discover` subcommand share one pipeline (spec §5).

use std::collections::BTreeMap;
use std::path::Path;

use futures_util::future::join_all;

use crate::bridge_domain::{ConsolidatedBridgeDomain, RawBridgeDomain};
use crate::device::{Device, DeviceClass, DeviceClassOverrides};
use crate::{bdproc, classify, consolidate, loader, parser};
use crate::{BdError, DiagnosticCode, ErrorKind};

/// Spec's public `Discover()` result shape: consolidated records,
/// demoted/standalone individuals, and the diagnostics collected along
/// the way.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct DiscoveryReport {
    pub consolidated: Vec<ConsolidatedBridgeDomain>,
    pub individuals: Vec<ConsolidatedBridgeDomain>,
    pub diagnostics: Vec<DiagnosticCode>,
}

/// Runs the full discovery pipeline over a directory of per-device CLI
/// dumps. `lldp_dump` seeds physical-role assignment; a missing
/// neighbor entry surfaces as `LldpMissing` rather than aborting the
/// run. C2 parsing and C4 BD-PROC are both CPU-bound regex/string
/// work, so each BD and device is farmed out to a blocking thread and
/// joined rather than run serially.
pub async fn discover(
    dump_dir: &Path,
    overrides: &DeviceClassOverrides,
    lldp_dump: &str,
) -> Result<DiscoveryReport, BdError> {
    let load_report = loader::load_directory(dump_dir)?;
    let mut diagnostics = load_report.diagnostics;

    let parse_tasks = load_report.devices.into_iter().map(|dumps| {
        tokio::task::spawn_blocking(move || {
            let vlan_ifaces = parser::parse_vlan_dump(&dumps.device, &dumps.vlan_dump);
            let raw_bds = parser::parse_bd_dump(&dumps.device, &dumps.bd_dump, &vlan_ifaces);
            (dumps.device, vlan_ifaces, raw_bds)
        })
    });

    let mut devices: BTreeMap<String, Device> = BTreeMap::new();
    let mut raw_bds_by_device: BTreeMap<String, Vec<RawBridgeDomain>> = BTreeMap::new();

    for result in join_all(parse_tasks).await {
        let (device_name, vlan_ifaces, raw_bds) =
            result.map_err(|e| BdError::new(ErrorKind::Bug, format!("parse task panicked: {e}")))?;
        let mut device = Device::new(device_name.clone(), DeviceClass::Unknown);
        for iface in vlan_ifaces.into_values() {
            device.insert_interface(iface);
        }
        devices.insert(device_name.clone(), device);
        raw_bds_by_device.insert(device_name, raw_bds);
    }

    classify::classify_devices(&mut devices, overrides);
    let lldp = classify::parse_lldp_dump(lldp_dump);
    diagnostics.extend(classify::assign_roles(&mut devices, &lldp));

    let devices_snapshot = devices;
    let process_tasks = raw_bds_by_device.into_values().flatten().map(|raw| {
        let devices_snapshot = devices_snapshot.clone();
        tokio::task::spawn_blocking(move || bdproc::process(&raw, &devices_snapshot))
    });

    let mut processed = Vec::new();
    for result in join_all(process_tasks).await {
        match result.map_err(|e| BdError::new(ErrorKind::Bug, format!("bdproc task panicked: {e}")))? {
            Ok(p) => processed.push(p),
            Err(e) => diagnostics.push(DiagnosticCode::ValidationFailed { reason: e.msg }),
        }
    }

    let (all_bds, split_diagnostics) = consolidate::consolidate(processed);
    diagnostics.extend(split_diagnostics);

    let (individuals, consolidated): (Vec<_>, Vec<_>) =
        all_bds.into_iter().partition(|bd| bd.consolidation_key.starts_with("INDIVIDUAL|"));

    Ok(DiscoveryReport { consolidated, individuals, diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct TempDir(std::path::PathBuf);

    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn tempdir() -> TempDir {
        let mut dir = std::env::temp_dir();
        dir.push(format!("bdfab-pipeline-test-{}", crate::BdUuid::new()));
        fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }

    #[tokio::test]
    async fn discovers_and_consolidates_single_tagged_bd_across_two_leaves() {
        let dir = tempdir();
        fs::write(
            dir.path().join("L-A_vlan_20260101_120000.txt"),
            "interfaces ge100-0/0/5.251 vlan-id 251\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("L-A_bd_20260101_120000.txt"),
            "network-services bridge-domain instance g_alice_v251 interface ge100-0/0/5.251\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("L-B_vlan_20260101_120000.txt"),
            "interfaces ge100-0/0/12.251 vlan-id 251\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("L-B_bd_20260101_120000.txt"),
            "network-services bridge-domain instance g_alice_v251_to_Spirent interface ge100-0/0/12.251\n",
        )
        .unwrap();

        let report = discover(dir.path(), &DeviceClassOverrides::new(), "").await.unwrap();
        assert_eq!(report.consolidated.len(), 1);
        assert!(report.individuals.is_empty());
        let bd = &report.consolidated[0];
        assert_eq!(bd.primary_name, "g_alice_v251");
        assert_eq!(bd.devices.len(), 2);
        // both leaves' access ports have no LLDP entry and classify as leaf,
        // so role assignment reports LldpMissing rather than failing the run.
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, DiagnosticCode::LldpMissing { .. })));
    }

    #[tokio::test]
    async fn missing_vlan_family_is_reported_and_does_not_abort_the_run() {
        let dir = tempdir();
        fs::write(
            dir.path().join("L-A_bd_20260101_120000.txt"),
            "network-services bridge-domain instance g_alice_v251 interface ge1\n",
        )
        .unwrap();

        let report = discover(dir.path(), &DeviceClassOverrides::new(), "").await.unwrap();
        assert!(report.consolidated.is_empty());
        assert!(report.individuals.is_empty());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, DiagnosticCode::DataMissing { family, .. } if family == "vlan")));
    }
}
