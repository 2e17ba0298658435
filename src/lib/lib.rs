//    Copyright 2021 Red Hat, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod actor;
mod bd_uuid;
mod bdproc;
mod bridge_domain;
mod classify;
mod consolidate;
mod deploy;
mod device;
mod diff;
mod edit;
mod error;
mod health;
mod interface;
mod loader;
mod parser;
mod pipeline;
mod session;
mod store;

pub use crate::bd_uuid::BdUuid;
pub use crate::bridge_domain::{
    AssignmentState, ConsolidatedBridgeDomain, ConsolidationInfo, DnaasType, ProcessedBridgeDomain,
    RawBridgeDomain, SelectionReason,
};
pub use crate::classify::{parse_lldp_dump, LldpMap};
pub use crate::deploy::{
    DeploymentExecutor, DeploymentResult, DeviceLease, DeviceLeaseTable, DeviceResult, ExecError, ExecResult,
    FailureClass,
};
pub use crate::device::{classify_device, Device, DeviceClass, DeviceClassOverrides};
pub use crate::diff::{compute_plan, DeploymentPlan, DeviceFamily};
pub use crate::edit::{Change, ChangeRecord, EditSession, ModifyField, SessionStatus, ValidationResult};
pub use crate::error::{BdError, DiagnosticCode, ErrorKind};
pub use crate::health::{check_health, preflight, DowntimeClass, HealthReport, ImpactSummary};
pub use crate::interface::{
    Interface, InterfaceKind, InterfaceRole, Manipulation, ManipulationAction, Tpid, VlanFacts, VlanList,
};
pub use crate::loader::{load_directory, DeviceDumps, LoadReport};
pub use crate::parser::{parse_bd_dump, parse_vlan_dump, strip_ansi};
pub use crate::pipeline::{discover, DiscoveryReport};
pub use crate::session::SessionManager;
pub use crate::store::{BdStore, ListFilter, StoreConfig};

use std::path::Path;

/// Top-level facade binding discovery, the BD store, and the
/// edit/preview/deploy surface together (spec §6 "Public operation
/// surface"). Each call here is a thin wire to one component; the
/// policy lives in the component itself, not in this type.
#[derive(Clone)]
pub struct BdFabric {
    pub store: BdStore,
    pub sessions: SessionManager,
}

impl BdFabric {
    pub fn new(store_config: StoreConfig) -> Self {
        let store = BdStore::new(store_config);
        let sessions = SessionManager::new(store.clone());
        Self { store, sessions }
    }

    /// `Discover()`: runs the full pipeline over `dump_dir` and upserts
    /// every resulting record, consolidated or individual, into the
    /// store.
    pub async fn discover_and_store(
        &mut self,
        dump_dir: &Path,
        overrides: &DeviceClassOverrides,
        lldp_dump: &str,
    ) -> Result<DiscoveryReport, BdError> {
        let report = discover(dump_dir, overrides, lldp_dump).await?;
        for bd in report.consolidated.iter().chain(report.individuals.iter()) {
            self.store.upsert(bd.clone()).await?;
        }
        Ok(report)
    }

    /// `GetBD(name)`.
    pub async fn get_bd(&mut self, name: &str) -> Result<Option<ConsolidatedBridgeDomain>, BdError> {
        self.store.get(name).await
    }

    /// `ListBDs(filter)`.
    pub async fn list_bds(&mut self, filter: ListFilter) -> Result<Vec<ConsolidatedBridgeDomain>, BdError> {
        self.store.list(filter).await
    }

    /// `BeginEdit(name, user)`.
    pub async fn begin_edit(&mut self, bd_name: &str, user: &str) -> Result<EditSession, BdError> {
        self.sessions.begin(bd_name, user).await
    }

    /// `ApplyChange(session, change)`.
    pub async fn apply_change(&mut self, session: BdUuid, change: Change) -> Result<ValidationResult, BdError> {
        self.sessions.apply_change(session, change).await
    }

    /// `Preview(session)`: computes the deployment plan without
    /// touching any device and advances the session to `previewed`.
    pub async fn preview(&mut self, session_id: BdUuid, family: DeviceFamily) -> Result<DeploymentPlan, BdError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {session_id}")))?;
        let plan = compute_plan(family, &session.original, &session.working_copy, None)?;
        self.sessions.set_status(session_id, SessionStatus::Previewed).await?;
        Ok(plan)
    }

    /// `Deploy(session)`: runs pre-flight health checks, then drives
    /// `executor` through commit-check, apply and rollback (spec
    /// §4.C9), merging the working copy into the store on full
    /// success. `leases` enforces that no device in the plan is
    /// already claimed by another in-flight deployment.
    pub async fn deploy<E: DeploymentExecutor>(
        &mut self,
        session_id: BdUuid,
        family: DeviceFamily,
        leases: &DeviceLeaseTable,
        executor: &E,
    ) -> Result<DeploymentResult, BdError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {session_id}")))?;

        preflight(&session.working_copy)?;
        let plan = compute_plan(family, &session.original, &session.working_copy, None)?;
        self.sessions.set_status(session_id, SessionStatus::Validated).await?;

        let lease = leases.acquire(&plan.affected_devices).await?;
        self.sessions.set_status(session_id, SessionStatus::Deploying).await?;
        let result = deploy::deploy(&plan, executor).await;
        drop(lease);

        self.sessions.set_status(session_id, result.status).await?;
        if result.status == SessionStatus::Deployed {
            let mut bd = session.working_copy.clone();
            bd.assignment_state = AssignmentState::Deployed;
            self.store.upsert(bd).await?;
            self.sessions.complete(session_id).await?;
        }
        Ok(result)
    }

    /// `CancelEdit(session)`.
    pub async fn cancel_edit(&mut self, session_id: BdUuid) -> Result<(), BdError> {
        self.sessions.cancel(session_id).await
    }
}
