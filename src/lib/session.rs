// SPDX-License-Identifier: Apache-2.0

//! Edit session lifecycle and per-BD exclusive locking (spec §4.C7).
//! Wraps `crate::edit::EditSession`'s pure mutation logic with the
//! `AlreadyLocked` contract and durability through the BD store.

use std::collections::BTreeMap;

use futures_channel::mpsc::UnboundedReceiver;
use futures_channel::oneshot::Sender;

use crate::actor::{TaskManager, TaskWorker};
use crate::edit::{Change, EditSession, SessionStatus, ValidationResult};
use crate::store::BdStore;
use crate::{BdError, BdUuid, DiagnosticCode, ErrorKind};

#[derive(Debug, Clone)]
pub(crate) enum SessionCmd {
    Begin { bd_name: String, user: String },
    ApplyChange { id: BdUuid, change: Change },
    Undo { id: BdUuid },
    Redo { id: BdUuid },
    Save { id: BdUuid },
    Recover { id: BdUuid },
    Cancel { id: BdUuid },
    Complete { id: BdUuid },
    Get { id: BdUuid },
    /// The deployment coordinator drives a session through these
    /// mid-flight statuses directly, without going through the
    /// change-applying API.
    SetStatus { id: BdUuid, status: SessionStatus },
}

impl std::fmt::Display for SessionCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin { bd_name, user } => write!(f, "Begin({bd_name}, {user})"),
            Self::ApplyChange { id, .. } => write!(f, "ApplyChange({id})"),
            Self::Undo { id } => write!(f, "Undo({id})"),
            Self::Redo { id } => write!(f, "Redo({id})"),
            Self::Save { id } => write!(f, "Save({id})"),
            Self::Recover { id } => write!(f, "Recover({id})"),
            Self::Cancel { id } => write!(f, "Cancel({id})"),
            Self::Complete { id } => write!(f, "Complete({id})"),
            Self::Get { id } => write!(f, "Get({id})"),
            Self::SetStatus { id, status } => write!(f, "SetStatus({id}, {status:?})"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SessionReply {
    Session(EditSession),
    MaybeSession(Option<EditSession>),
    Validation(ValidationResult),
    Unit,
}

pub struct SessionManagerConfig {
    pub store: BdStore,
}

struct SessionWorker {
    receiver: UnboundedReceiver<(SessionCmd, Sender<Result<SessionReply, BdError>>)>,
    store: BdStore,
    sessions: BTreeMap<BdUuid, EditSession>,
    /// bd_name -> session id currently holding the lock.
    locks: BTreeMap<String, BdUuid>,
}

impl SessionWorker {
    fn release_lock_if_held(&mut self, id: BdUuid) {
        if let Some(session) = self.sessions.get(&id) {
            let bd_name = session.bd_name.clone();
            if self.locks.get(&bd_name) == Some(&id) {
                self.locks.remove(&bd_name);
            }
        }
    }
}

impl TaskWorker for SessionWorker {
    type Cmd = SessionCmd;
    type Reply = SessionReply;
    type Config = SessionManagerConfig;

    fn new(
        receiver: UnboundedReceiver<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)>,
        config: Self::Config,
    ) -> Self {
        Self { receiver, store: config.store, sessions: BTreeMap::new(), locks: BTreeMap::new() }
    }

    fn receiver(&mut self) -> &mut UnboundedReceiver<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)> {
        &mut self.receiver
    }

    async fn process_cmd(&mut self, cmd: Self::Cmd) -> Result<Self::Reply, BdError> {
        match cmd {
            SessionCmd::Begin { bd_name, user } => {
                if self.locks.contains_key(&bd_name) {
                    return Err(BdError::new(
                        ErrorKind::Session,
                        DiagnosticCode::AlreadyLocked { bd_name: bd_name.clone() }.to_string(),
                    ));
                }
                let original = self.store.get(&bd_name).await?.ok_or_else(|| {
                    BdError::new(ErrorKind::Session, format!("no such bridge domain: {bd_name}"))
                })?;
                let session = EditSession::new(bd_name.clone(), user, original);
                self.locks.insert(bd_name, session.id);
                self.sessions.insert(session.id, session.clone());
                Ok(SessionReply::Session(session))
            }
            SessionCmd::ApplyChange { id, change } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                let result = session.apply_change(change)?;
                Ok(SessionReply::Validation(result))
            }
            SessionCmd::Undo { id } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                session.undo()?;
                Ok(SessionReply::Unit)
            }
            SessionCmd::Redo { id } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                session.redo()?;
                Ok(SessionReply::Unit)
            }
            SessionCmd::Save { id } => {
                let session = self
                    .sessions
                    .get(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?
                    .clone();
                self.store.save_session(session).await?;
                Ok(SessionReply::Unit)
            }
            SessionCmd::Recover { id } => {
                let mut session = self.store.load_session(id).await?.ok_or_else(|| {
                    BdError::new(ErrorKind::Session, format!("no saved session: {id}"))
                })?;
                // A session found `deploying` on restart has no way to
                // reconcile with on-device state: the executor exposes
                // no "read current config" primitive. It lands in
                // `Unknown` and waits on an operator (spec §9 Open
                // Question decision).
                if session.status == SessionStatus::Deploying {
                    session.status = SessionStatus::Unknown;
                }
                if session.status.holds_lock() {
                    self.locks.insert(session.bd_name.clone(), session.id);
                }
                self.sessions.insert(session.id, session.clone());
                Ok(SessionReply::Session(session))
            }
            SessionCmd::Cancel { id } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                session.status = SessionStatus::Cancelled;
                self.release_lock_if_held(id);
                self.store.delete_session(id).await?;
                Ok(SessionReply::Unit)
            }
            SessionCmd::Complete { id } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                session.status = SessionStatus::Deployed;
                self.release_lock_if_held(id);
                Ok(SessionReply::Unit)
            }
            SessionCmd::Get { id } => Ok(SessionReply::MaybeSession(self.sessions.get(&id).cloned())),
            SessionCmd::SetStatus { id, status } => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| BdError::new(ErrorKind::Session, format!("no such session: {id}")))?;
                session.status = status;
                if !status.holds_lock() {
                    self.release_lock_if_held(id);
                }
                Ok(SessionReply::Unit)
            }
        }
    }
}

/// Handle to the edit-session-manager actor (spec §4.C7, §5 "exclusive
/// lock per BD identifier").
#[derive(Clone)]
pub struct SessionManager {
    manager: TaskManager<SessionCmd, SessionReply>,
}

impl SessionManager {
    pub fn new(store: BdStore) -> Self {
        Self { manager: TaskManager::new::<SessionWorker>("edit-session-manager", SessionManagerConfig { store }) }
    }

    pub async fn begin(
        &mut self,
        bd_name: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<EditSession, BdError> {
        match self.manager.exec(SessionCmd::Begin { bd_name: bd_name.into(), user: user.into() }).await? {
            SessionReply::Session(s) => Ok(s),
            _ => unreachable!("Begin always replies Session"),
        }
    }

    pub async fn apply_change(&mut self, id: BdUuid, change: Change) -> Result<ValidationResult, BdError> {
        match self.manager.exec(SessionCmd::ApplyChange { id, change }).await? {
            SessionReply::Validation(v) => Ok(v),
            _ => unreachable!("ApplyChange always replies Validation"),
        }
    }

    pub async fn undo(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::Undo { id }).await?;
        Ok(())
    }

    pub async fn redo(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::Redo { id }).await?;
        Ok(())
    }

    pub async fn save(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::Save { id }).await?;
        Ok(())
    }

    pub async fn recover(&mut self, id: BdUuid) -> Result<EditSession, BdError> {
        match self.manager.exec(SessionCmd::Recover { id }).await? {
            SessionReply::Session(s) => Ok(s),
            _ => unreachable!("Recover always replies Session"),
        }
    }

    pub async fn cancel(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::Cancel { id }).await?;
        Ok(())
    }

    pub async fn complete(&mut self, id: BdUuid) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::Complete { id }).await?;
        Ok(())
    }

    pub async fn get(&mut self, id: BdUuid) -> Result<Option<EditSession>, BdError> {
        match self.manager.exec(SessionCmd::Get { id }).await? {
            SessionReply::MaybeSession(s) => Ok(s),
            _ => unreachable!("Get always replies MaybeSession"),
        }
    }

    pub(crate) async fn set_status(&mut self, id: BdUuid, status: SessionStatus) -> Result<(), BdError> {
        self.manager.exec(SessionCmd::SetStatus { id, status }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_domain::{
        AssignmentState, ConsolidatedBridgeDomain, ConsolidationInfo, DnaasType, ProcessedBridgeDomain,
        SelectionReason,
    };
    use crate::interface::InterfaceRole;
    use crate::store::StoreConfig;
    use crate::Interface;
    use std::collections::BTreeMap;

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
    async fn second_begin_on_same_bd_fails_already_locked() {
        let mut store = BdStore::new(StoreConfig::default());
        store.upsert(sample_bd("g_alice_v100")).await.unwrap();
        let mut sessions = SessionManager::new(store);

        let first = sessions.begin("g_alice_v100", "alice").await.unwrap();
        let second = sessions.begin("g_alice_v100", "bob").await;
        assert!(second.is_err());

        sessions.cancel(first.id).await.unwrap();
        let retried = sessions.begin("g_alice_v100", "bob").await;
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn cancel_releases_the_lock() {
        let mut store = BdStore::new(StoreConfig::default());
        store.upsert(sample_bd("g_alice_v100")).await.unwrap();
        let mut sessions = SessionManager::new(store);

        let session = sessions.begin("g_alice_v100", "alice").await.unwrap();
        sessions.cancel(session.id).await.unwrap();
        assert!(sessions.begin("g_alice_v100", "alice").await.is_ok());
    }
}
