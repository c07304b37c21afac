//! Controller driving one (job, stage) pair of the remote computation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use upres_job_client_interface::{JobClient, JobId, PreviewArtifact, Stage, StageProgress};

use crate::error::StageControlError;
use crate::scheduler::{RepeatingTask, TickOutcome};
use crate::state::{transition, StageEvent, StageState};

/// Cadences of the two observation loops. The preview loop runs on the
/// tighter interval so a fresh artifact lands between progress updates.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub progress_interval: Duration,
    pub preview_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(2500),
            preview_interval: Duration::from_millis(2000),
        }
    }
}

/// Observable state of one stage execution. Epoch fields are written only
/// by the progress loop; `fault` carries the message of the failure that
/// moved the run to [`StageState::Faulted`].
#[derive(Debug, Clone)]
pub struct StageRun {
    pub stage: Stage,
    pub current_epoch: u64,
    pub total_epoch: Option<u64>,
    pub state: StageState,
    pub fault: Option<String>,
}

impl StageRun {
    fn new(stage: Stage) -> Self {
        Self { stage, current_epoch: 0, total_epoch: None, state: StageState::Idle, fault: None }
    }
}

/// What the preview pane should show. Written only by the preview loop;
/// each poll supersedes the previous value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewSlot {
    /// No artifact yet (or the last poll said "not ready"); show a waiting
    /// message.
    #[default]
    Waiting,
    Ready(PreviewArtifact),
}

struct PollingLoops {
    session: CancellationToken,
    _progress: RepeatingTask,
    _preview: RepeatingTask,
}

/// Finite-state controller for one (job, stage) pair.
///
/// Commands go to the server first; the state only moves once the server
/// has acknowledged, and the legality of every move is checked against
/// [`transition`] up front. While `Running`, two repeating tasks poll
/// progress and preview on independent cadences; leaving `Running` for any
/// reason (stop, completion, fault, teardown) cancels them both.
pub struct StageController<C> {
    client: Arc<C>,
    job_id: JobId,
    stage: Stage,
    config: PollingConfig,
    run: Arc<Mutex<StageRun>>,
    preview: Arc<Mutex<PreviewSlot>>,
    loops: Mutex<Option<PollingLoops>>,
}

impl<C: JobClient + 'static> StageController<C> {
    pub fn new(client: Arc<C>, job_id: JobId, stage: Stage) -> Self {
        Self::with_config(client, job_id, stage, PollingConfig::default())
    }

    pub fn with_config(client: Arc<C>, job_id: JobId, stage: Stage, config: PollingConfig) -> Self {
        Self {
            client,
            job_id,
            stage,
            config,
            run: Arc::new(Mutex::new(StageRun::new(stage))),
            preview: Arc::new(Mutex::new(PreviewSlot::Waiting)),
            loops: Mutex::new(None),
        }
    }

    /// Issue the start command and begin observing. Valid from `Idle` only.
    pub async fn start(&self) -> Result<(), StageControlError> {
        let next = transition(self.state(), StageEvent::Start)?;
        self.client.start_stage(&self.job_id, self.stage).await?;

        self.run_mut().state = next;
        self.spawn_loops();
        info!(job_id = %self.job_id, stage = %self.stage, "Stage started");
        Ok(())
    }

    /// Issue the stop command and cancel both loops. Valid from `Running`.
    /// Epoch counters keep their last observed values.
    pub async fn stop(&self) -> Result<(), StageControlError> {
        let next = transition(self.state(), StageEvent::Stop)?;
        self.client.stop_stage(&self.job_id, self.stage).await?;

        self.cancel_loops();
        self.run_mut().state = next;
        info!(job_id = %self.job_id, stage = %self.stage, "Stage stopped");
        Ok(())
    }

    /// Issue the resume command and restart observation. Valid from
    /// `Stopped`; the epoch counter continues where it left off.
    pub async fn resume(&self) -> Result<(), StageControlError> {
        let next = transition(self.state(), StageEvent::Resume)?;
        self.client.resume_stage(&self.job_id, self.stage).await?;

        self.run_mut().state = next;
        self.spawn_loops();
        info!(job_id = %self.job_id, stage = %self.stage, "Stage resumed");
        Ok(())
    }

    /// One-shot inference for this stage; the surrounding flow moves to the
    /// next stage on success. Only offered once the run is stopped or
    /// completed; failure surfaces the error without transitioning anything.
    pub async fn advance(&self) -> Result<(), StageControlError> {
        let state = self.state();
        if !state.can_advance() {
            return Err(StageControlError::AdvanceUnavailable { state });
        }

        self.client.run_inference(&self.job_id, Some(self.stage)).await?;
        info!(job_id = %self.job_id, stage = %self.stage, "Inference complete");
        Ok(())
    }

    pub fn state(&self) -> StageState {
        self.run_mut().state
    }

    /// Snapshot of the run for rendering.
    pub fn run(&self) -> StageRun {
        self.run_mut().clone()
    }

    /// Latest preview artifact, or the waiting placeholder.
    pub fn preview(&self) -> PreviewSlot {
        self.preview.lock().expect("preview lock poisoned").clone()
    }

    fn run_mut(&self) -> std::sync::MutexGuard<'_, StageRun> {
        self.run.lock().expect("stage run lock poisoned")
    }

    fn spawn_loops(&self) {
        let session = CancellationToken::new();

        let progress = {
            let client = self.client.clone();
            let job_id = self.job_id.clone();
            let stage = self.stage;
            let run = self.run.clone();
            let token = session.clone();
            RepeatingTask::spawn_with_token(
                "progress-poll",
                self.config.progress_interval,
                session.clone(),
                move || {
                    progress_tick(client.clone(), job_id.clone(), stage, run.clone(), token.clone())
                },
            )
        };

        let preview = {
            let client = self.client.clone();
            let job_id = self.job_id.clone();
            let stage = self.stage;
            let run = self.run.clone();
            let slot = self.preview.clone();
            let token = session.clone();
            RepeatingTask::spawn_with_token(
                "preview-poll",
                self.config.preview_interval,
                session.clone(),
                move || {
                    preview_tick(
                        client.clone(),
                        job_id.clone(),
                        stage,
                        run.clone(),
                        slot.clone(),
                        token.clone(),
                    )
                },
            )
        };

        // Replacing the previous loops drops them, which cancels their
        // session token.
        *self.loops.lock().expect("loops lock poisoned") =
            Some(PollingLoops { session, _progress: progress, _preview: preview });
    }

    fn cancel_loops(&self) {
        if let Some(loops) = self.loops.lock().expect("loops lock poisoned").take() {
            loops.session.cancel();
        }
    }
}

impl<C> Drop for StageController<C> {
    /// Tearing the controller down must never leave a polling loop behind.
    fn drop(&mut self) {
        if let Some(loops) = self.loops.lock().expect("loops lock poisoned").take() {
            loops.session.cancel();
        }
    }
}

async fn progress_tick<C: JobClient>(
    client: Arc<C>,
    job_id: JobId,
    stage: Stage,
    run: Arc<Mutex<StageRun>>,
    session: CancellationToken,
) -> TickOutcome {
    match client.stage_progress(&job_id, stage).await {
        Ok(progress) => apply_progress(&job_id, stage, progress, &run, &session),
        Err(e) => {
            warn!(job_id = %job_id, stage = %stage, error = %e, "Progress poll failed");
            let mut run = run.lock().expect("stage run lock poisoned");
            if run.state == StageState::Running {
                // Explicit terminal state instead of silently dropping out
                // of observation; epoch values stay untouched.
                run.state = StageState::Faulted;
                run.fault = Some(e.to_string());
            }
            drop(run);
            session.cancel();
            TickOutcome::Stop
        }
    }
}

fn apply_progress(
    job_id: &JobId,
    stage: Stage,
    progress: StageProgress,
    run: &Mutex<StageRun>,
    session: &CancellationToken,
) -> TickOutcome {
    let mut run = run.lock().expect("stage run lock poisoned");
    if run.state != StageState::Running {
        // In-flight result that arrived after Running was exited.
        return TickOutcome::Stop;
    }

    if let Some(current) = progress.current_epoch {
        run.current_epoch = current;
    }
    if let Some(total) = progress.total_epoch {
        run.total_epoch = Some(total);
    }

    if progress.is_complete() {
        run.state = StageState::Completed;
        info!(job_id = %job_id, stage = %stage, epochs = run.current_epoch, "Stage completed");
        drop(run);
        session.cancel();
        return TickOutcome::Stop;
    }

    debug!(
        job_id = %job_id,
        stage = %stage,
        current_epoch = run.current_epoch,
        total_epoch = run.total_epoch,
        "Progress updated"
    );
    TickOutcome::Continue
}

async fn preview_tick<C: JobClient>(
    client: Arc<C>,
    job_id: JobId,
    stage: Stage,
    run: Arc<Mutex<StageRun>>,
    slot: Arc<Mutex<PreviewSlot>>,
    session: CancellationToken,
) -> TickOutcome {
    match client.latest_preview(&job_id, stage).await {
        Ok(result) => {
            if run.lock().expect("stage run lock poisoned").state != StageState::Running {
                return TickOutcome::Stop;
            }
            let mut slot = slot.lock().expect("preview lock poisoned");
            match result {
                Some(artifact) => {
                    debug!(job_id = %job_id, stage = %stage, "Preview refreshed");
                    *slot = PreviewSlot::Ready(artifact);
                }
                None => {
                    // Not an error: the stage has produced nothing to show
                    // yet. Clear any stale image and wait.
                    debug!(job_id = %job_id, stage = %stage, "Preview not ready");
                    *slot = PreviewSlot::Waiting;
                }
            }
            TickOutcome::Continue
        }
        Err(e) if e.is_unauthorized() => {
            warn!(job_id = %job_id, stage = %stage, "Credential rejected during preview poll");
            let mut run = run.lock().expect("stage run lock poisoned");
            if run.state == StageState::Running {
                run.state = StageState::Faulted;
                run.fault = Some(e.to_string());
            }
            drop(run);
            session.cancel();
            TickOutcome::Stop
        }
        Err(e) => {
            // Transport trouble on the preview path stops this loop only;
            // progress observation and the run state are unaffected.
            warn!(job_id = %job_id, stage = %stage, error = %e, "Preview poll failed");
            TickOutcome::Stop
        }
    }
}
