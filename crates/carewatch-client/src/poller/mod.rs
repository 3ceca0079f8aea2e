//! Analysis poller.
//!
//! After a call ends its analysis is produced asynchronously. The poller
//! asks the caller to refresh the call every interval until the analysis
//! shows up or the poll budget is spent, and can be restarted on demand.
//!
//! The poller never fetches anything itself: it invokes a
//! [`CallRefresher`], and the caller feeds the refreshed record back with
//! [`PollerHandle::observe_record`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use carewatch_core::CallId;

use crate::config::PollConfig;

mod actor;
mod cycle;
mod handle;

pub use actor::PollerActor;
pub use cycle::{PollCycle, PollState, StopReason};
pub use handle::{PollProgress, PollerCommand, PollerHandle};

const COMMAND_BUFFER: usize = 16;

/// Triggers a refresh of a call's record.
pub trait CallRefresher: Send + Sync + 'static {
    fn refresh(&self, call_id: &CallId);
}

impl<F> CallRefresher for F
where
    F: Fn(&CallId) + Send + Sync + 'static,
{
    fn refresh(&self, call_id: &CallId) {
        self(call_id)
    }
}

/// Spawns a poller for one call. It stays idle until it observes a
/// finished call without an analysis.
pub fn spawn_poller(
    call_id: CallId,
    refresher: impl CallRefresher,
    config: &PollConfig,
) -> PollerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (progress_tx, progress_rx) = watch::channel(PollProgress::default());

    let actor = PollerActor::new(
        cmd_rx,
        call_id,
        Arc::new(refresher),
        PollCycle::new(config.max_polls),
        config.interval(),
        progress_tx,
    );
    tokio::spawn(actor.run());

    PollerHandle::new(cmd_tx, progress_rx)
}
