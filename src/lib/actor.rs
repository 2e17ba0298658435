// SPDX-License-Identifier: Apache-2.0

//! A tiny single-task-per-resource actor, generalized from the
//! commander's internal task manager: every mutable shared resource
//! (the BD store, an edit session, the deployment coordinator) owns
//! exactly one background task that serializes commands sent to it
//! over an unbounded channel. There is no locking at the call site;
//! callers `exec()` a command and await its reply.

use futures_channel::{
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
    oneshot::{Sender, channel},
};
use futures_util::{SinkExt, StreamExt};

use crate::{BdError, ErrorKind};

pub(crate) trait TaskWorker: Sized + Send {
    type Cmd: std::fmt::Display + Send;
    type Reply: Send;
    /// Explicit collaborators the worker needs at startup (a snapshot
    /// path, a store handle, a clock) — constructed once by the
    /// caller rather than reached for as global state.
    type Config: Send + 'static;

    fn new(
        receiver: UnboundedReceiver<(
            Self::Cmd,
            Sender<Result<Self::Reply, BdError>>,
        )>,
        config: Self::Config,
    ) -> Self;

    #[allow(clippy::type_complexity)]
    fn receiver(
        &mut self,
    ) -> &mut UnboundedReceiver<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)>;

    fn process_cmd(
        &mut self,
        cmd: Self::Cmd,
    ) -> impl Future<Output = Result<Self::Reply, BdError>> + Send;

    #[allow(clippy::type_complexity)]
    fn recv_cmd(
        &mut self,
    ) -> impl Future<
        Output = Option<(Self::Cmd, Sender<Result<Self::Reply, BdError>>)>,
    > + Send {
        async { self.receiver().next().await }
    }

    /// Runs until every `TaskManager` handle pointing at this worker is
    /// dropped. Intended to be spawned on a tokio task.
    fn run(&mut self) -> impl Future<Output = ()> + Send {
        async {
            loop {
                let (cmd, sender) = match self.recv_cmd().await {
                    Some(c) => c,
                    None => break,
                };
                let cmd_str = cmd.to_string();
                let result = self.process_cmd(cmd).await;
                if sender.send(result).is_err() {
                    log::error!("Failed to send reply for command {cmd_str}");
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TaskManager<C, R>
where
    C: std::fmt::Display + Clone,
{
    name: &'static str,
    sender: UnboundedSender<(C, Sender<Result<R, BdError>>)>,
}

impl<C, R> TaskManager<C, R>
where
    C: std::fmt::Display + Clone,
{
    pub(crate) fn new<W>(name: &'static str, config: W::Config) -> Self
    where
        W: TaskWorker<Cmd = C, Reply = R> + 'static,
    {
        let (sender, receiver) = unbounded::<(C, Sender<Result<R, BdError>>)>();

        let mut worker = W::new(receiver, config);

        tokio::spawn(async move { worker.run().await });

        Self { name, sender }
    }

    pub(crate) async fn exec(&mut self, cmd: C) -> Result<R, BdError> {
        let (result_sender, result_receiver) = channel::<Result<R, BdError>>();

        self.sender
            .send((cmd.clone(), result_sender))
            .await
            .map_err(|e| {
                BdError::new(
                    ErrorKind::Bug,
                    format!("Manager {}: failed to send {}: {e}", self.name, cmd),
                )
            })?;

        result_receiver.await.map_err(|e| {
            BdError::new(
                ErrorKind::Bug,
                format!(
                    "Manager {}: failed to receive reply for {cmd}: {e}",
                    self.name
                ),
            )
        })?
    }
}
