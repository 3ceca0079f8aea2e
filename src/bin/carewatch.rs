//! carewatch - follow a live care call from the terminal
//!
//! Connects to a call's realtime channel, prints the conversation as it
//! streams in and, once the call ends, waits for the call analysis.
//!
//! # Usage
//!
//! ```text
//! carewatch watch 42                 # follow call 42
//! carewatch watch 42 --interactive   # also send stdin lines as messages (/end ends the call)
//! carewatch analysis 42              # print the analysis, polling while it is pending
//! ```
//!
//! The access token comes from `--token` or `CAREWATCH_TOKEN`. Logs are
//! written to `$XDG_STATE_HOME/carewatch/carewatch.log`; set `RUST_LOG`
//! for more detail.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use carewatch_client::{
    spawn_poller, spawn_session, CallsApi, ClientConfig, ConnectionStatus, Delivery, PollState,
    SessionError, SessionEvent, SessionHandle, StaticToken, StopReason, WsConnector,
};
use carewatch_core::{AnalysisState, CallId, CallRecord, ChatMessage};
use carewatch_protocol::InboundFrame;

/// carewatch - live call monitor for caregivers
#[derive(Parser, Debug)]
#[command(name = "carewatch", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a live call, then wait for its analysis
    Watch {
        /// Call to follow
        call_id: String,

        /// Send lines typed on stdin as chat messages (`/end` ends the call)
        #[arg(short, long)]
        interactive: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print a call's analysis, polling while it is pending
    Analysis {
        call_id: String,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Config file (default: $XDG_CONFIG_HOME/carewatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Realtime endpoint base URL
    #[arg(long)]
    ws_url: Option<String>,

    /// REST API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Access token
    #[arg(long, env = "CAREWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl CommonArgs {
    /// Defaults, then the config file, then environment, then flags.
    fn resolve_config(&self) -> Result<ClientConfig> {
        let path = self.config.clone().or_else(default_config_path);
        let config = match path {
            Some(path) if self.config.is_some() || path.exists() => ClientConfig::load(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            _ => ClientConfig::default(),
        };

        let mut config = config.with_env_overrides();
        if let Some(url) = &self.ws_url {
            config.ws_base_url = url.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        Ok(config)
    }

    fn tokens(&self) -> StaticToken {
        match &self.token {
            Some(token) => StaticToken::new(token.clone()),
            None => StaticToken::none(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("carewatch").join("config.toml"))
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("carewatch")
        .join("carewatch.log")
}

/// Opens the log file in append mode, creating its directory.
///
/// Returns `None` (logging disabled) if that fails; stdout carries the
/// conversation so logs never go to the terminal.
fn create_log_file(path: &Path) -> Option<fs::File> {
    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Warning: Failed to create log directory {dir:?}: {e}");
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {path:?}: {e}");
            None
        }
    }
}

fn init_logging() {
    match create_log_file(&log_file_path()) {
        Some(file) => {
            let filter = EnvFilter::from_default_env().add_directive(
                "carewatch=info"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::INFO.into()),
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}

// ============================================================================
// Chat Rendering
// ============================================================================

/// Prints chat messages, rewriting a streaming reply in place.
#[derive(Default)]
struct ChatPrinter {
    partial_open: bool,
}

impl ChatPrinter {
    fn print(&mut self, message: &ChatMessage) {
        let mut out = io::stdout().lock();
        if self.partial_open {
            // Clear the partial line
            let _ = write!(out, "\r\x1b[2K");
        }
        let _ = write!(out, "{}: {}", message.role, message.content);
        if message.is_streaming {
            self.partial_open = true;
        } else {
            self.partial_open = false;
            let _ = writeln!(out);
            if message.call_end_detected {
                let _ = writeln!(out, "(the assistant is wrapping up the call)");
            }
        }
        let _ = out.flush();
    }

    fn note(&mut self, text: &str) {
        if self.partial_open {
            println!();
            self.partial_open = false;
        }
        eprintln!("[{text}]");
    }
}

// ============================================================================
// Watch
// ============================================================================

/// Forwards stdin lines until EOF or cancellation.
fn spawn_stdin_reader(cancel: CancellationToken) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                },
            }
        }
    });
    rx
}

async fn next_line(input: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_input(session: &SessionHandle, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if line == "/end" {
        if let Err(e) = session.send_end_call().await {
            eprintln!("Could not end call: {e}");
        }
        return;
    }

    match session.send(line).await {
        Ok(receipt) => {
            tokio::spawn(async move {
                if receipt.await == Delivery::Unconfirmed {
                    debug!("Message delivery not confirmed");
                }
            });
        }
        Err(SessionError::NotConnected) => eprintln!("[not connected, message not sent]"),
        Err(e) => eprintln!("[send failed: {e}]"),
    }
}

/// How following a call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowOutcome {
    /// The server ended the call
    Ended,
    /// Ctrl-C or the session went away
    Interrupted,
    /// Reconnect attempts ran out
    Lost,
}

/// Follows the call until it ends, the connection is lost for good or the
/// user interrupts.
async fn follow_call(
    session: &SessionHandle,
    call_id: &CallId,
    interactive: bool,
) -> Result<FollowOutcome> {
    let mut events = session.subscribe();
    let mut status = session.subscribe_status();
    session.connect(call_id.clone()).await?;

    let cancel = CancellationToken::new();
    let mut input = interactive.then(|| spawn_stdin_reader(cancel.clone()));
    let mut printer = ChatPrinter::default();

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break FollowOutcome::Interrupted;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Message(message)) => printer.print(&message),
                Ok(SessionEvent::Frame(frame)) => match frame {
                    InboundFrame::History(message) => printer.print(&message),
                    InboundFrame::Error { message } => printer.note(&format!("server error: {message}")),
                    InboundFrame::CallEnded => {
                        printer.note("call ended");
                        break FollowOutcome::Ended;
                    }
                    InboundFrame::Ended { status, auto_ended, .. } => {
                        let how = if auto_ended { "automatically" } else { "by request" };
                        match status {
                            Some(status) => printer.note(&format!("call ended {how} ({status})")),
                            None => printer.note(&format!("call ended {how}")),
                        }
                        break FollowOutcome::Ended;
                    }
                    other => debug!(kind = other.kind(), "Ignoring frame"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                Err(RecvError::Closed) => break FollowOutcome::Interrupted,
            },
            Some(current) = status.recv() => {
                printer.note(current.as_str());
                let lost = current == ConnectionStatus::Disconnected
                    && session.snapshot().await?.gave_up;
                if lost {
                    printer.note("gave up reconnecting");
                    break FollowOutcome::Lost;
                }
            }
            Some(line) = next_line(&mut input) => handle_input(session, &line).await,
        }
    };

    cancel.cancel();
    session.disconnect().await?;
    Ok(outcome)
}

// ============================================================================
// Analysis
// ============================================================================

fn print_analysis(record: &CallRecord) {
    let Some(analysis) = &record.analysis else {
        return;
    };

    println!();
    println!("Analysis for call {} ({})", record.id, record.status);
    if let Some(name) = &record.elderly_name {
        println!("  Recipient:   {name}");
    }
    println!("  Risk:        {}", analysis.risk_level);
    println!("  Sentiment:   {:.2}", analysis.sentiment_score);
    if let Some(state) = &analysis.emotional_state {
        println!("  Mood:        {state}");
    }
    if let Some(summary) = &analysis.summary {
        println!("  Summary:     {summary}");
    }
    if !analysis.key_topics.is_empty() {
        println!("  Topics:      {}", analysis.key_topics.join(", "));
    }
    if !analysis.health_mentions.is_empty() {
        println!("  Health:      {}", analysis.health_mentions.join(", "));
    }
    if !analysis.recommendations.is_empty() {
        println!("  Recommendations:");
        for item in &analysis.recommendations {
            println!("    - {item}");
        }
    }
}

/// Prints the call's analysis, polling until it appears or the poll
/// budget runs out.
async fn await_analysis(config: &ClientConfig, call_id: &CallId, tokens: StaticToken) -> Result<()> {
    let api = CallsApi::new(config.api_base_url.clone(), tokens);
    let record = api
        .get_call(call_id)
        .await
        .with_context(|| format!("fetching call {call_id}"))?;

    match record.analysis_state() {
        AnalysisState::Ready => {
            print_analysis(&record);
            return Ok(());
        }
        AnalysisState::NotExpected => {
            eprintln!("[call {call_id} is {}, no analysis yet]", record.status);
            return Ok(());
        }
        AnalysisState::Pending => eprintln!("[waiting for analysis]"),
    }

    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    let poller = spawn_poller(
        call_id.clone(),
        move |id: &CallId| {
            let _ = refresh_tx.send(id.clone());
        },
        &config.poll,
    );
    let mut progress = poller.subscribe();
    poller.observe_record(&record).await?;

    loop {
        tokio::select! {
            biased;

            Some(id) = refresh_rx.recv() => match api.get_call(&id).await {
                Ok(record) if record.has_analysis() => {
                    print_analysis(&record);
                    return Ok(());
                }
                Ok(record) => poller.observe_record(&record).await?,
                Err(e) => warn!(call_id = %id, error = %e, "Failed to refresh call"),
            },
            changed = progress.changed() => {
                changed?;
                let current = *progress.borrow();
                if current.state == PollState::Stopped(StopReason::Exhausted) {
                    eprintln!(
                        "[analysis still pending after {} checks; run `carewatch analysis {call_id}` later]",
                        current.attempts
                    );
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Command::Watch {
            call_id,
            interactive,
            common,
        } => {
            let call_id = CallId::parse(&call_id)?;
            let config = common.resolve_config()?;
            info!(call_id = %call_id, ws = %config.ws_base_url, "carewatch starting");

            let session = spawn_session(&config, WsConnector, common.tokens());
            match follow_call(&session, &call_id, interactive).await? {
                FollowOutcome::Ended => {
                    await_analysis(&config, &call_id, common.tokens()).await?;
                }
                FollowOutcome::Lost => bail!("lost connection to call {call_id}"),
                FollowOutcome::Interrupted => {}
            }
        }
        Command::Analysis { call_id, common } => {
            let call_id = CallId::parse(&call_id)?;
            let config = common.resolve_config()?;
            await_analysis(&config, &call_id, common.tokens()).await?;
        }
    }

    Ok(())
}
