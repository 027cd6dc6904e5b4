use crate::link::LinkCommand;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tablelink_core::{ApplicationMessage, DeviceId, RestartReason, SignalEnvelope};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Cloneable command side of a running link.
#[derive(Debug, Clone)]
pub struct LinkSender {
    peer: DeviceId,
    commands: mpsc::UnboundedSender<LinkCommand>,
    alive: Arc<AtomicBool>,
}

impl LinkSender {
    pub(crate) fn new(
        peer: DeviceId,
        commands: mpsc::UnboundedSender<LinkCommand>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            peer,
            commands,
            alive,
        }
    }

    pub fn peer(&self) -> &DeviceId {
        &self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.commands.is_closed()
    }

    pub fn signal(&self, envelope: SignalEnvelope) -> bool {
        self.command(LinkCommand::Signal(envelope))
    }

    /// Queues a message without waiting for the outcome.
    pub fn post(&self, message: ApplicationMessage) -> bool {
        self.command(LinkCommand::Send {
            message,
            reply: None,
        })
    }

    /// Sends a message and reports whether the channel accepted it.
    pub async fn send(&self, message: ApplicationMessage) -> bool {
        let (reply, outcome) = oneshot::channel();
        if !self.command(LinkCommand::Send {
            message,
            reply: Some(reply),
        }) {
            return false;
        }
        outcome.await.unwrap_or(false)
    }

    pub fn restart(&self, reason: RestartReason) -> bool {
        self.command(LinkCommand::Restart(reason))
    }

    pub fn suspect_silent(&self) -> bool {
        self.command(LinkCommand::SuspectSilent)
    }

    fn command(&self, command: LinkCommand) -> bool {
        self.is_alive() && self.commands.send(command).is_ok()
    }
}

/// Owner of a running `PeerLink` task.
#[derive(Debug)]
pub struct LinkHandle {
    sender: LinkSender,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub(crate) fn new(sender: LinkSender, task: JoinHandle<()>) -> Self {
        Self { sender, task }
    }

    pub fn sender(&self) -> &LinkSender {
        &self.sender
    }

    pub fn peer(&self) -> &DeviceId {
        self.sender.peer()
    }

    /// Marks the link dead and asks it to stop. The link emits nothing after
    /// this returns, even if a negotiation step is still in flight.
    pub fn close(&self) {
        self.sender.alive.store(false, Ordering::Release);
        let _ = self.sender.commands.send(LinkCommand::Close);
    }

    /// Closes the link and waits for its task to release the transport.
    pub async fn shutdown(self) {
        self.close();
        let mut task = self.task;
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            warn!(peer = %self.sender.peer, "link did not stop in time, aborting");
            task.abort();
        }
    }
}
