// SPDX-License-Identifier: Apache-2.0

// Try not implement From for BdError here unless you are sure this
// error should always convert to certain type of ErrorKind.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// File, directory or device data could not be found or paired.
    DataQuality,
    /// A bridge domain could not be mapped to any DNAAS type.
    Classification,
    /// LLDP data missing/corrupt, or an invalid topology was observed.
    Topology,
    /// Consolidation group members disagree on type or identifier.
    Consolidation,
    /// Session lifecycle or locking violation.
    Session,
    /// A proposed change violates its DNAAS type's rules.
    Validation,
    /// Commit-check or apply failed on one or more devices.
    Deployment,
    InvalidArgument,
    Bug,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BdError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl BdError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, msg: msg.into() }
    }
}

impl std::fmt::Display for BdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for BdError {}

/// Stable diagnostic codes surfaced to callers (never a stack trace).
///
/// These never unwind the pipeline: a phase or stage that produces one
/// skips the affected device/BD and keeps going (see §7 of the design doc).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticCode {
    DataMissing { device: String, family: String },
    LldpMissing { device: String, iface: String },
    InvalidTopology { device: String, iface: String, neighbor: String },
    GoldenRuleViolation { device: String, bd_name: String, iface: String },
    ConsolidationSplit { consolidation_key: String, reason: String },
    AlreadyLocked { bd_name: String },
    ValidationFailed { reason: String },
    CommitCheckFailed { device: String, reason: String },
    ApplyFailed { device: String, reason: String },
    RolledBack { device: String },
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataMissing { device, family } => {
                write!(f, "DataMissing(device={device}, family={family})")
            }
            Self::LldpMissing { device, iface } => {
                write!(f, "LLDPMissing(device={device}, iface={iface})")
            }
            Self::InvalidTopology { device, iface, neighbor } => write!(
                f,
                "InvalidTopology(device={device}, iface={iface}, neighbor={neighbor})"
            ),
            Self::GoldenRuleViolation { device, bd_name, iface } => write!(
                f,
                "GoldenRuleViolation(device={device}, bd={bd_name}, iface={iface})"
            ),
            Self::ConsolidationSplit { consolidation_key, reason } => write!(
                f,
                "ConsolidationSplit(key={consolidation_key}, reason={reason})"
            ),
            Self::AlreadyLocked { bd_name } => {
                write!(f, "AlreadyLocked(bd={bd_name})")
            }
            Self::ValidationFailed { reason } => {
                write!(f, "ValidationFailed({reason})")
            }
            Self::CommitCheckFailed { device, reason } => {
                write!(f, "CommitCheckFailed(device={device}, reason={reason})")
            }
            Self::ApplyFailed { device, reason } => {
                write!(f, "ApplyFailed(device={device}, reason={reason})")
            }
            Self::RolledBack { device } => {
                write!(f, "RolledBack(device={device})")
            }
        }
    }
}
