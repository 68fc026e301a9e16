//! Single-owner async driver for an [`ExamSession`].
//!
//! The runner task owns the session and applies [`SessionCommand`]s one at a
//! time. A separate ticker task only sends `Tick` commands, so a manual submit
//! and an expiry submit are serialized by the channel. Snapshots are published
//! after every command. Progress writes run in the background and are awaited,
//! up to a bounded timeout, before the runner hands the session back.

use std::time::Duration;

use exam_core::model::{ChoiceLetter, QuestionId, ScoreResult, SessionStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use super::progress::ModuleProgress;
use super::service::{ExamSession, ModuleAdvance, SubmitOutcome, TickOutcome};
use super::view::{PaletteEntry, QuestionView, SessionState};
use crate::error::SessionError;
use crate::progress_sync::ProgressSyncService;

const COMMAND_BUFFER: usize = 64;
/// Upper bound on waiting for in-flight progress writes when the runner stops.
const SYNC_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a user or the ticker can ask of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Submit,
    ReopenForReview,
    SelectReviewModule(usize),
    Restart,
    FinishModule,
    SetAnswer(QuestionId, ChoiceLetter),
    ToggleEliminate(QuestionId, ChoiceLetter),
    ToggleFlag(QuestionId),
    SetNote(QuestionId, String),
    AddHighlight(QuestionId, String),
    RemoveHighlight(QuestionId, String),
    NavigateTo(i64),
    Next,
    Previous,
    ToggleTimerVisibility,
    Tick,
    Leave,
}

/// Published after every processed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current: Option<QuestionView>,
    pub palette: Vec<PaletteEntry>,
    pub progress: ModuleProgress,
    pub score: Option<ScoreResult>,
    /// Message from the last rejected command, cleared by the next accepted one.
    pub notice: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &ExamSession, notice: Option<String>) -> Self {
        Self {
            state: session.state(),
            current: session.current_view(),
            palette: session.palette(),
            progress: session.module_progress(),
            score: session.score(),
            notice,
        }
    }
}

/// Spawns runner tasks.
pub struct SessionRunner;

impl SessionRunner {
    /// Move `session` into a new runner task on the current tokio runtime.
    #[must_use]
    pub fn spawn(session: ExamSession, sync: ProgressSyncService) -> SessionHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots_tx, snapshots) = watch::channel(SessionSnapshot::capture(&session, None));
        let tick_every = Duration::from_millis(u64::from(session.settings().tick_interval_ms()));

        let state = RunnerState {
            session,
            sync,
            ticker: None,
            pending_syncs: JoinSet::new(),
            tick_every,
            commands: commands.downgrade(),
            snapshots: snapshots_tx,
        };
        let task = tokio::spawn(state.run(receiver));

        SessionHandle {
            commands,
            snapshots,
            task,
        }
    }
}

/// Caller side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<ExamSession>,
}

impl SessionHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RunnerClosed` once the runner has exited.
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::RunnerClosed)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the runner and the ticker, returning the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RunnerClosed` if the runner task panicked or was
    /// cancelled.
    pub async fn leave(self) -> Result<ExamSession, SessionError> {
        // A closed channel means the runner already exited; join it anyway.
        let _ = self.commands.send(SessionCommand::Leave).await;
        drop(self.commands);
        self.task.await.map_err(|_| SessionError::RunnerClosed)
    }
}

struct RunnerState {
    session: ExamSession,
    sync: ProgressSyncService,
    ticker: Option<JoinHandle<()>>,
    pending_syncs: JoinSet<()>,
    tick_every: Duration,
    commands: mpsc::WeakSender<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl RunnerState {
    async fn run(mut self, mut receiver: mpsc::Receiver<SessionCommand>) -> ExamSession {
        while let Some(command) = receiver.recv().await {
            if command == SessionCommand::Leave {
                tracing::info!("session left");
                break;
            }

            let notice = match self.apply(command) {
                Ok(()) => None,
                Err(err) => {
                    tracing::debug!(error = %err, "command rejected");
                    Some(err.to_string())
                }
            };

            self.sync_ticker();
            self.snapshots
                .send_replace(SessionSnapshot::capture(&self.session, notice));
        }

        self.stop_ticker();
        self.drain_syncs().await;
        self.session
    }

    fn apply(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        let session = &mut self.session;
        match command {
            SessionCommand::Start => session.start()?,
            SessionCommand::Submit => {
                let outcome = session.submit()?;
                self.dispatch(outcome);
            }
            SessionCommand::ReopenForReview => session.reopen_for_review()?,
            SessionCommand::SelectReviewModule(index) => {
                session.select_review_module(index)?;
            }
            SessionCommand::Restart => session.restart()?,
            SessionCommand::FinishModule => {
                if let ModuleAdvance::Submitted(outcome) = session.finish_module()? {
                    self.dispatch(outcome);
                }
            }
            SessionCommand::SetAnswer(id, letter) => session.set_answer(&id, letter)?,
            SessionCommand::ToggleEliminate(id, letter) => {
                session.toggle_eliminate(&id, letter)?;
            }
            SessionCommand::ToggleFlag(id) => {
                session.toggle_flag(&id)?;
            }
            SessionCommand::SetNote(id, note) => session.set_note(&id, note)?,
            SessionCommand::AddHighlight(id, span) => session.add_highlight(&id, span)?,
            SessionCommand::RemoveHighlight(id, span) => {
                session.remove_highlight(&id, &span)?;
            }
            SessionCommand::NavigateTo(index) => {
                session.navigate_to(index)?;
            }
            SessionCommand::Next => {
                session.next()?;
            }
            SessionCommand::Previous => {
                session.previous()?;
            }
            SessionCommand::ToggleTimerVisibility => {
                session.toggle_timer_visibility();
            }
            SessionCommand::Tick => {
                if let TickOutcome::Submitted(outcome) = session.tick() {
                    self.dispatch(outcome);
                }
            }
            SessionCommand::Leave => {}
        }
        Ok(())
    }

    /// Hand progress rows to a background sync task, awaited on exit.
    fn dispatch(&mut self, outcome: SubmitOutcome) {
        if !outcome.is_first() {
            return;
        }
        let Some(rows) = outcome.into_progress() else {
            tracing::debug!("anonymous submission, progress sync skipped");
            return;
        };
        let sync = self.sync.clone();
        self.pending_syncs.spawn(async move {
            sync.sync(&rows).await;
        });
    }

    async fn drain_syncs(&mut self) {
        if self.pending_syncs.is_empty() {
            return;
        }
        let pending = &mut self.pending_syncs;
        let drained = tokio::time::timeout(SYNC_DRAIN_TIMEOUT, async {
            while pending.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                pending = self.pending_syncs.len(),
                "progress sync still running at shutdown, abandoning"
            );
            self.pending_syncs.abort_all();
        }
    }

    /// The ticker runs exactly while the session is in progress.
    fn sync_ticker(&mut self) {
        let in_progress = self.session.status() == SessionStatus::InProgress;
        match (in_progress, self.ticker.is_some()) {
            (true, false) => {
                self.ticker = Some(spawn_ticker(self.commands.clone(), self.tick_every));
            }
            (false, true) => self.stop_ticker(),
            _ => {}
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

fn spawn_ticker(commands: mpsc::WeakSender<SessionCommand>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(sender) = commands.upgrade() else {
                break;
            };
            if sender.send(SessionCommand::Tick).await.is_err() {
                break;
            }
        }
    })
}
