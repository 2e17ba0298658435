// SPDX-License-Identifier: Apache-2.0

//! Loads per-device CLI dumps from a directory and pairs them by
//! device (spec §4.C1).
//!
//! Filename convention: `<device>_bd_<timestamp>.txt` and
//! `<device>_vlan_<timestamp>.txt`, timestamp `YYYYMMDD_HHMMSS`. That
//! format sorts lexicographically in chronological order, so "newest"
//! and "nearest" both reduce to string comparison.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::{BdError, DiagnosticCode, ErrorKind};

static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_(bd|vlan)_(\d{8}_\d{6})\.txt$").unwrap());

/// A device's paired dumps, loaded into memory as line-oriented text.
#[derive(Debug, Clone)]
pub struct DeviceDumps {
    pub device: String,
    pub bd_dump: String,
    pub vlan_dump: String,
}

/// Result of scanning a dump directory: the devices with both
/// families present, plus a diagnostic for every device excluded.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub devices: Vec<DeviceDumps>,
    pub diagnostics: Vec<DiagnosticCode>,
}

#[derive(Debug, Clone, Default)]
struct Candidates {
    bd: Vec<(String, std::path::PathBuf)>,
    vlan: Vec<(String, std::path::PathBuf)>,
}

/// Scans `dir` for `<device>_bd_<ts>.txt` / `<device>_vlan_<ts>.txt`
/// files, picks the newest `bd` dump per device and the `vlan` dump
/// nearest its timestamp (falling back to the newest `vlan` dump if
/// none can be compared), and reads both into memory.
pub fn load_directory(dir: &Path) -> Result<LoadReport, BdError> {
    let mut by_device: BTreeMap<String, Candidates> = BTreeMap::new();

    let entries = std::fs::read_dir(dir).map_err(|e| {
        BdError::new(
            ErrorKind::DataQuality,
            format!("failed to read directory {}: {e}", dir.display()),
        )
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            BdError::new(ErrorKind::DataQuality, format!("failed to read directory entry: {e}"))
        })?;
        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let Some(caps) = FILENAME.captures(filename) else {
            continue;
        };
        let device = caps[1].to_string();
        let timestamp = caps[3].to_string();
        let candidates = by_device.entry(device).or_default();
        match &caps[2] {
            "bd" => candidates.bd.push((timestamp, path.clone())),
            "vlan" => candidates.vlan.push((timestamp, path.clone())),
            _ => unreachable!("regex only matches bd|vlan"),
        }
    }

    let mut report = LoadReport::default();

    for (device, mut candidates) in by_device {
        candidates.bd.sort();
        candidates.vlan.sort();

        let Some((bd_ts, bd_path)) = candidates.bd.last().cloned() else {
            report.diagnostics.push(DiagnosticCode::DataMissing {
                device: device.clone(),
                family: "bd".to_string(),
            });
            continue;
        };

        let vlan_path = match pick_nearest_vlan(&bd_ts, &candidates.vlan) {
            Some(path) => path,
            None => {
                report.diagnostics.push(DiagnosticCode::DataMissing {
                    device: device.clone(),
                    family: "vlan".to_string(),
                });
                continue;
            }
        };

        let bd_dump = std::fs::read_to_string(&bd_path).map_err(|e| {
            BdError::new(
                ErrorKind::DataQuality,
                format!("failed to read {}: {e}", bd_path.display()),
            )
        })?;
        let vlan_dump = std::fs::read_to_string(&vlan_path).map_err(|e| {
            BdError::new(
                ErrorKind::DataQuality,
                format!("failed to read {}: {e}", vlan_path.display()),
            )
        })?;

        report.devices.push(DeviceDumps { device, bd_dump, vlan_dump });
    }

    Ok(report)
}

/// Picks the vlan-dump timestamp closest to `target`, breaking ties in
/// favor of the newer file. Falls back to the newest available vlan
/// dump when timestamps can't be compared numerically.
fn pick_nearest_vlan(
    target: &str,
    candidates: &[(String, std::path::PathBuf)],
) -> Option<std::path::PathBuf> {
    if candidates.is_empty() {
        return None;
    }
    let target_val: Option<i64> = parse_timestamp_value(target);
    let Some(target_val) = target_val else {
        return candidates.last().map(|(_, p)| p.clone());
    };

    candidates
        .iter()
        .filter_map(|(ts, path)| parse_timestamp_value(ts).map(|v| (v, ts, path)))
        .min_by_key(|(v, ts, _)| ((v - target_val).abs(), std::cmp::Reverse((*ts).clone())))
        .map(|(_, _, path)| path.clone())
}

/// `YYYYMMDD_HHMMSS` as a comparable integer; the format has no
/// timezone so this is purely a relative-distance helper.
fn parse_timestamp_value(ts: &str) -> Option<i64> {
    let digits: String = ts.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
