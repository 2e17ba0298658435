// SPDX-License-Identifier: Apache-2.0

//! The bridge-domain store (spec §4.C6): a single-writer actor over
//! the discovered `ConsolidatedBridgeDomain` set and the `EditSession`s
//! layered on top of it, snapshotted to disk the way the commander's
//! conf worker persists state — serialize, write to a temp path,
//! rename into place — rather than embedding a SQL engine.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use futures_channel::mpsc::UnboundedReceiver;
use futures_channel::oneshot::Sender;
use serde::{Deserialize, Serialize};

use crate::actor::{TaskManager, TaskWorker};
use crate::bridge_domain::{AssignmentState, ConsolidatedBridgeDomain, DnaasType};
use crate::edit::EditSession;
use crate::{BdError, BdUuid, ErrorKind};

/// Criteria `BdStore::list` filters on (spec §4.C6).
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ListFilter {
    pub user: Option<String>,
    pub vlan: Option<u16>,
    pub dnaas_type: Option<DnaasType>,
    pub assignment_state: Option<AssignmentState>,
}

impl ListFilter {
    fn matches(&self, bd: &ConsolidatedBridgeDomain) -> bool {
        if let Some(user) = &self.user
            && bd.username.as_deref() != Some(user.as_str())
        {
            return false;
        }
        if let Some(vlan) = self.vlan
            && bd.global_identifier != Some(vlan)
        {
            return false;
        }
        if let Some(t) = self.dnaas_type
            && bd.dnaas_type != t
        {
            return false;
        }
        if let Some(s) = self.assignment_state
            && bd.assignment_state != s
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub(crate) enum StoreCmd {
    Upsert(Box<ConsolidatedBridgeDomain>),
    Get(String),
    List(ListFilter),
    Delete(String),
    SaveSession(Box<EditSession>),
    LoadSession(BdUuid),
    DeleteSession(BdUuid),
}

impl std::fmt::Display for StoreCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upsert(bd) => write!(f, "Upsert({})", bd.primary_name),
            Self::Get(name) => write!(f, "Get({name})"),
            Self::List(_) => write!(f, "List"),
            Self::Delete(name) => write!(f, "Delete({name})"),
            Self::SaveSession(s) => write!(f, "SaveSession({})", s.id),
            Self::LoadSession(id) => write!(f, "LoadSession({id})"),
            Self::DeleteSession(id) => write!(f, "DeleteSession({id})"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum StoreReply {
    Unit,
    Bd(Option<ConsolidatedBridgeDomain>),
    Bds(Vec<ConsolidatedBridgeDomain>),
    Session(Option<EditSession>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Snapshot {
    bridge_domains: Vec<ConsolidatedBridgeDomain>,
    sessions: Vec<EditSession>,
}

/// Explicit collaborators the store worker needs at startup (spec §9
/// "pass explicit collaborators", no hidden global state). A `None`
/// path runs the store purely in memory, useful for tests.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub snapshot_path: Option<PathBuf>,
}

struct StoreWorker {
    receiver: UnboundedReceiver<(StoreCmd, Sender<Result<StoreReply, BdError>>)>,
    bridge_domains: BTreeMap<String, ConsolidatedBridgeDomain>,
    sessions: BTreeMap<BdUuid, EditSession>,
    snapshot_path: Option<PathBuf>,
}

impl StoreWorker {
    fn persist(&self) -> Result<(), BdError> {
        let Some(path) = &self.snapshot_path else { return Ok(()) };
        let snapshot = Snapshot {
            bridge_domains: self.bridge_domains.values().cloned().collect(),
            sessions: self.sessions.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| BdError::new(ErrorKind::Bug, format!("failed to serialize store snapshot: {e}")))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| BdError::new(ErrorKind::Bug, format!("failed to write store snapshot: {e}")))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| BdError::new(ErrorKind::Bug, format!("failed to install store snapshot: {e}")))?;
        Ok(())
    }

    fn load(path: &PathBuf) -> Snapshot {
        std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }
}

impl TaskWorker for StoreWorker {
    type Cmd = StoreCmd;
    type Reply = StoreReply;
    type Config = StoreConfig;

    fn new(
        receiver: UnboundedReceiver<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)>,
        config: Self::Config,
    ) -> Self {
        let snapshot = config.snapshot_path.as_ref().map(Self::load).unwrap_or_default();
        Self {
            receiver,
            bridge_domains: snapshot
                .bridge_domains
                .into_iter()
                .map(|bd| (bd.primary_name.clone(), bd))
                .collect(),
            sessions: snapshot.sessions.into_iter().map(|s| (s.id, s)).collect(),
            snapshot_path: config.snapshot_path,
        }
    }

    fn receiver(&mut self) -> &mut UnboundedReceiver<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)> {
        &mut self.receiver
    }

    async fn process_cmd(&mut self, cmd: Self::Cmd) -> Result<Self::Reply, BdError> {
        match cmd {
            StoreCmd::Upsert(bd) => {
                validate_for_insert(&bd)?;
                self.bridge_domains.insert(bd.primary_name.clone(), *bd);
                self.persist()?;
                Ok(StoreReply::Unit)
            }
            StoreCmd::Get(name) => Ok(StoreReply::Bd(self.bridge_domains.get(&name).cloned())),
            StoreCmd::List(filter) => {
                let matched = self.bridge_domains.values().filter(|bd| filter.matches(bd)).cloned().collect();
                Ok(StoreReply::Bds(matched))
            }
            StoreCmd::Delete(name) => {
                self.bridge_domains.remove(&name);
                self.persist()?;
                Ok(StoreReply::Unit)
            }
            StoreCmd::SaveSession(session) => {
                self.sessions.insert(session.id, *session);
                self.persist()?;
                Ok(StoreReply::Unit)
            }
            StoreCmd::LoadSession(id) => Ok(StoreReply::Session(self.sessions.get(&id).cloned())),
            StoreCmd::DeleteSession(id) => {
                self.sessions.remove(&id);
                self.persist()?;
                Ok(StoreReply::Unit)
            }
        }
    }
}

/// Interface uniqueness and required-field checks run on every insert
/// (spec §4.C6 invariants).
fn validate_for_insert(bd: &ConsolidatedBridgeDomain) -> Result<(), BdError> {
    if bd.primary_name.trim().is_empty() {
        return Err(BdError::new(ErrorKind::Validation, "bridge domain primary_name is empty"));
    }
    if bd.devices.is_empty() {
        return Err(BdError::new(
            ErrorKind::Validation,
            format!("{}: device map is empty", bd.primary_name),
        ));
    }
    let mut seen = BTreeSet::new();
    for (device, ifaces) in &bd.devices {
        for iface in ifaces {
            let key = (device.clone(), iface.qualified_name());
            if !seen.insert(key.clone()) {
                return Err(BdError::new(
                    ErrorKind::Validation,
                    format!("{}: duplicate interface {}/{}", bd.primary_name, key.0, key.1),
                ));
            }
        }
    }
    Ok(())
}

/// Handle to the store actor. Cloning is cheap (an mpsc sender); every
/// clone talks to the same single-writer task, so readers observe a
/// consistent snapshot and writes never interleave (spec §5 C6).
#[derive(Clone)]
pub struct BdStore {
    manager: TaskManager<StoreCmd, StoreReply>,
}

impl BdStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { manager: TaskManager::new::<StoreWorker>("bd-store", config) }
    }

    pub async fn upsert(&mut self, bd: ConsolidatedBridgeDomain) -> Result<(), BdError> {
        self.manager.exec(StoreCmd::Upsert(Box::new(bd))).await?;
        Ok(())
    }

    pub async fn get(&mut self, name: &str) -> Result<Option<ConsolidatedBridgeDomain>, BdError> {
        match self.manager.exec(StoreCmd::Get(name.to_string())).await? {
            StoreReply::Bd(bd) => Ok(bd),
            _ => unreachable!("Get always replies Bd"),
        }
    }

    pub async fn list(&mut self, filter: ListFilter) -> Result<Vec<ConsolidatedBridgeDomain>, BdError> {
        match self.manager.exec(StoreCmd::List(filter)).await? {
            StoreReply::Bds(bds) => Ok(bds),
            _ => unreachable!("List always replies Bds"),
        }
    }

    pub async fn delete(&mut self, name: &str) -> Result<(), BdError> {
        self.manager.exec(StoreCmd::Delete(name.to_string())).await?;
        Ok(())
    }

    pub async fn save_session(&mut self, session: EditSession) -> Result<(), BdError> {
        self.manager.exec(StoreCmd::SaveSession(Box::new(session))).await?;
        Ok(())
    }

    pub async fn load_session(&mut self, id: BdUuid) -> Result<Option<EditSession>, BdError> {
        match self.manager.exec(StoreCmd::LoadSession(id)).await? {
            StoreReply::Session(s) => Ok(s),
            _ => unreachable!("LoadSession always replies Session"),
        }
    }

    pub async fn delete_session(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(StoreCmd::DeleteSession(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_domain::{ConsolidationInfo, ProcessedBridgeDomain, SelectionReason};
    use crate::interface::InterfaceRole;
    use crate::Interface;

    fn sample_bd(name: &str) -> ConsolidatedBridgeDomain {
        let mut iface = Interface::new("L-A", "ge1");
        iface.role = InterfaceRole::Access;
        iface.vlan_facts.vlan_id = Some(100);
        let mut devices = BTreeMap::new();
        devices.insert("L-A".to_string(), vec![iface.clone()]);
        ConsolidatedBridgeDomain {
            consolidation_key: "alice|100".to_string(),
            primary_name: name.to_string(),
            dnaas_type: DnaasType::Type4A,
            service_type: DnaasType::Type4A.service_type_name().to_string(),
            global_identifier: Some(100),
            outer_vlan: None,
            inner_vlan: None,
            username: Some("alice".to_string()),
            members: vec![ProcessedBridgeDomain {
                device: "L-A".to_string(),
                bd_name: name.to_string(),
                members: vec![iface],
                raw_cli: Vec::new(),
                dnaas_type: DnaasType::Type4A,
                service_type: DnaasType::Type4A.service_type_name().to_string(),
                qinq_detected: false,
                global_identifier: Some(100),
                username: Some("alice".to_string()),
                consolidation_key: "alice|100".to_string(),
            }],
            devices,
            consolidation_info: ConsolidationInfo {
                represents: vec![name.to_string()],
                selection_reason: SelectionReason::StandardFormatPreferred,
            },
            assignment_state: AssignmentState::Available,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let mut store = BdStore::new(StoreConfig::default());
        store.upsert(sample_bd("g_alice_v100")).await.unwrap();
        let found = store.get("g_alice_v100").await.unwrap().unwrap();
        assert_eq!(found.primary_name, "g_alice_v100");
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let mut store = BdStore::new(StoreConfig::default());
        store.upsert(sample_bd("g_alice_v100")).await.unwrap();
        let mut other = sample_bd("g_bob_v200");
        other.username = Some("bob".to_string());
        store.upsert(other).await.unwrap();

        let filter = ListFilter { user: Some("alice".to_string()), ..Default::default() };
        let results = store.list(filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].primary_name, "g_alice_v100");
    }

    #[tokio::test]
    async fn duplicate_interface_is_rejected() {
        let mut store = BdStore::new(StoreConfig::default());
        let mut bd = sample_bd("g_alice_v100");
        let dup = bd.devices.get("L-A").unwrap()[0].clone();
        bd.devices.get_mut("L-A").unwrap().push(dup);
        let err = store.upsert(bd).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn session_round_trips_through_the_store() {
        let mut store = BdStore::new(StoreConfig::default());
        let bd = sample_bd("g_alice_v100");
        let session = EditSession::new("g_alice_v100", "alice", bd);
        let id = session.id;
        store.save_session(session).await.unwrap();
        let loaded = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(loaded.bd_name, "g_alice_v100");
    }
}
