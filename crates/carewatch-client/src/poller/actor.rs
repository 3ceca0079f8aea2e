//! Poller actor - owns the poll cycle and its single interval.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use carewatch_core::{CallId, CallStatus};

use super::cycle::{PollCycle, PollState, StopReason};
use super::handle::{PollProgress, PollerCommand};
use super::CallRefresher;

/// `interval_at` rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

/// The poller actor.
///
/// At most one interval exists at a time: arming replaces the previous
/// one, and the interval is dropped as soon as the cycle stops polling.
pub struct PollerActor {
    receiver: mpsc::Receiver<PollerCommand>,
    call_id: CallId,
    refresher: Arc<dyn CallRefresher>,
    cycle: PollCycle,
    period: Duration,
    ticker: Option<Interval>,
    progress: watch::Sender<PollProgress>,
}

impl PollerActor {
    pub fn new(
        receiver: mpsc::Receiver<PollerCommand>,
        call_id: CallId,
        refresher: Arc<dyn CallRefresher>,
        cycle: PollCycle,
        period: Duration,
        progress: watch::Sender<PollProgress>,
    ) -> Self {
        Self {
            receiver,
            call_id,
            refresher,
            cycle,
            period: period.max(MIN_PERIOD),
            ticker: None,
            progress,
        }
    }

    pub async fn run(mut self) {
        debug!(call_id = %self.call_id, "Analysis poller starting");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                () = next_tick(&mut self.ticker), if self.ticker.is_some() => self.handle_tick(),
            }
        }

        debug!(call_id = %self.call_id, "Analysis poller stopped");
    }

    fn handle_command(&mut self, cmd: PollerCommand) {
        match cmd {
            PollerCommand::Observe {
                status,
                has_analysis,
            } => self.handle_observe(status, has_analysis),
            PollerCommand::Refresh => self.handle_refresh(),
            PollerCommand::Progress { respond_to } => {
                let _ = respond_to.send(self.current_progress());
            }
        }
    }

    fn handle_observe(&mut self, status: CallStatus, has_analysis: bool) {
        let before = self.cycle.state();

        if self.cycle.observe(status, has_analysis) {
            info!(
                call_id = %self.call_id,
                status = %status,
                max_polls = self.cycle.max_polls(),
                "Call finished without analysis, polling"
            );
            self.arm();
        } else if before == PollState::Polling
            && self.cycle.state() == PollState::Stopped(StopReason::Resolved)
        {
            info!(
                call_id = %self.call_id,
                attempts = self.cycle.attempts(),
                "Analysis available, polling stopped"
            );
            self.ticker = None;
        }

        self.publish();
    }

    fn handle_tick(&mut self) {
        if let Some(attempt) = self.cycle.tick() {
            debug!(
                call_id = %self.call_id,
                attempt,
                max = self.cycle.max_polls(),
                "Polling for analysis"
            );
            self.refresher.refresh(&self.call_id);
        }

        if self.cycle.state() != PollState::Polling {
            if self.cycle.is_timed_out() {
                info!(
                    call_id = %self.call_id,
                    attempts = self.cycle.attempts(),
                    "Analysis still pending, polling stopped"
                );
            }
            self.ticker = None;
        }

        self.publish();
    }

    fn handle_refresh(&mut self) {
        info!(call_id = %self.call_id, "Manual refresh, restarting analysis polling");
        self.refresher.refresh(&self.call_id);
        self.cycle.refresh();
        self.arm();
        self.publish();
    }

    fn arm(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn current_progress(&self) -> PollProgress {
        PollProgress {
            state: self.cycle.state(),
            attempts: self.cycle.attempts(),
        }
    }

    fn publish(&self) {
        self.progress.send_replace(self.current_progress());
    }
}
