//! Client interface for the poller actor.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use carewatch_core::{CallRecord, CallStatus};

use super::cycle::PollState;
use crate::error::PollerError;

/// Commands sent to the poller actor.
#[derive(Debug)]
pub enum PollerCommand {
    /// Latest known state of the call
    Observe {
        status: CallStatus,
        has_analysis: bool,
    },
    /// Fetch now and restart polling with a fresh budget
    Refresh,
    Progress {
        respond_to: oneshot::Sender<PollProgress>,
    },
}

/// Published poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PollProgress {
    pub state: PollState,
    pub attempts: u32,
}

/// Handle for driving a poller.
///
/// Dropping the last handle stops the poller and its interval.
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
    progress: watch::Receiver<PollProgress>,
}

impl PollerHandle {
    pub fn new(sender: mpsc::Sender<PollerCommand>, progress: watch::Receiver<PollProgress>) -> Self {
        Self { sender, progress }
    }

    /// Reports the call's current status and whether it has an analysis.
    ///
    /// # Errors
    ///
    /// - `PollerError::ChannelClosed` if the actor has shut down
    pub async fn observe(&self, status: CallStatus, has_analysis: bool) -> Result<(), PollerError> {
        self.sender
            .send(PollerCommand::Observe {
                status,
                has_analysis,
            })
            .await
            .map_err(|_| PollerError::ChannelClosed)
    }

    /// Reports a freshly fetched call record.
    ///
    /// # Errors
    ///
    /// - `PollerError::ChannelClosed` if the actor has shut down
    pub async fn observe_record(&self, record: &CallRecord) -> Result<(), PollerError> {
        self.observe(record.status, record.has_analysis()).await
    }

    /// Fetches immediately and restarts polling from attempt zero.
    ///
    /// # Errors
    ///
    /// - `PollerError::ChannelClosed` if the actor has shut down
    pub async fn refresh(&self) -> Result<(), PollerError> {
        self.sender
            .send(PollerCommand::Refresh)
            .await
            .map_err(|_| PollerError::ChannelClosed)
    }

    /// Progress after every previously sent command has been applied.
    ///
    /// # Errors
    ///
    /// - `PollerError::ChannelClosed` if the actor has shut down
    pub async fn progress(&self) -> Result<PollProgress, PollerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::Progress { respond_to: tx })
            .await
            .map_err(|_| PollerError::ChannelClosed)?;
        rx.await.map_err(|_| PollerError::ChannelClosed)
    }

    /// Watches progress changes.
    pub fn subscribe(&self) -> watch::Receiver<PollProgress> {
        self.progress.clone()
    }

    /// Last published state.
    pub fn state(&self) -> PollState {
        self.progress.borrow().state
    }

    /// Last published attempt count.
    pub fn attempts(&self) -> u32 {
        self.progress.borrow().attempts
    }
}
