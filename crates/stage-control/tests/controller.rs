use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use upres_job_client_interface::{
    JobClientError, JobId, MockJobClient, PreviewArtifact, Stage, StageProgress,
};
use upres_stage_control::{PollingConfig, PreviewSlot, StageController, StageControlError, StageState};

fn fast_config() -> PollingConfig {
    PollingConfig { progress_interval: Duration::from_millis(50), preview_interval: Duration::from_millis(40) }
}

fn progress(current: u64, total: u64) -> StageProgress {
    StageProgress { current_epoch: Some(current), total_epoch: Some(total) }
}

fn job_id() -> JobId {
    JobId::new("job-1")
}

/// Mock with the stage commands expected by most tests and a preview that
/// is permanently "not ready".
fn base_client() -> MockJobClient {
    let mut client = MockJobClient::new();
    client.expect_start_stage().returning(|_, _| Ok(()));
    client.expect_latest_preview().returning(|_, _| Ok(None));
    client
}

#[tokio::test]
async fn start_runs_polls_and_completes_when_epochs_reach_total() {
    let mut client = base_client();

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    client.expect_stage_progress().returning(move |_, _| {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(progress(5, 10)),
            _ => Ok(progress(10, 10)),
        }
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();

    sleep(Duration::from_millis(25)).await;
    let run = controller.run();
    assert_eq!(run.state, StageState::Running);
    assert_eq!(run.current_epoch, 5);
    assert_eq!(run.total_epoch, Some(10));

    sleep(Duration::from_millis(50)).await;
    let run = controller.run();
    assert_eq!(run.state, StageState::Completed);
    assert_eq!(run.current_epoch, 10);

    // Completion cancels both loops: no further poll lands inside this
    // window.
    let settled = polls.load(Ordering::SeqCst);
    assert_eq!(settled, 2);
    sleep(Duration::from_millis(250)).await;
    assert_eq!(polls.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn stop_preserves_epochs_and_resume_continues_polling() {
    let mut client = base_client();
    client.expect_stop_stage().times(1).returning(|_, _| Ok(()));
    client.expect_resume_stage().times(1).returning(|_, _| Ok(()));

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    client.expect_stage_progress().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(progress(5, 10))
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(25)).await;

    controller.stop().await.unwrap();
    let run = controller.run();
    assert_eq!(run.state, StageState::Stopped);
    assert_eq!(run.current_epoch, 5, "stopping must not touch the epoch counter");

    let polls_while_stopped = polls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(polls.load(Ordering::SeqCst), polls_while_stopped, "no polling while stopped");

    controller.resume().await.unwrap();
    sleep(Duration::from_millis(25)).await;
    let run = controller.run();
    assert_eq!(run.state, StageState::Running);
    assert_eq!(run.current_epoch, 5, "resume continues from the unchanged epoch");
    assert!(polls.load(Ordering::SeqCst) > polls_while_stopped);
}

#[tokio::test]
async fn advance_is_rejected_while_running_and_allowed_once_stopped() {
    let mut client = base_client();
    client.expect_stop_stage().returning(|_, _| Ok(()));
    client.expect_stage_progress().returning(|_, _| Ok(progress(1, 10)));
    client.expect_run_inference().times(1).returning(|_, _| Ok(()));

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(20)).await;

    let denied = controller.advance().await;
    assert!(matches!(denied, Err(StageControlError::AdvanceUnavailable { state: StageState::Running })));

    controller.stop().await.unwrap();
    controller.advance().await.unwrap();
}

#[tokio::test]
async fn advance_failure_surfaces_the_error_without_transitioning() {
    let mut client = base_client();
    client.expect_stop_stage().returning(|_, _| Ok(()));
    client.expect_stage_progress().returning(|_, _| Ok(progress(1, 10)));
    client
        .expect_run_inference()
        .returning(|_, _| Err(JobClientError::api("run_inference", 500, "boom".to_string())));

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    controller.stop().await.unwrap();

    assert!(controller.advance().await.is_err());
    assert_eq!(controller.state(), StageState::Stopped);
}

#[tokio::test]
async fn authorization_failure_during_progress_polling_faults_the_run() {
    let mut client = base_client();

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    client.expect_stage_progress().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(JobClientError::unauthorized("stage_progress"))
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(25)).await;

    let run = controller.run();
    assert_eq!(run.state, StageState::Faulted);
    assert_eq!(run.current_epoch, 0, "a failed poll must not touch the epoch values");
    assert!(run.fault.is_some());

    // Terminal: both loops are gone.
    let settled = polls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(polls.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn preview_updates_replace_the_slot_and_not_ready_clears_it() {
    let mut client = MockJobClient::new();
    client.expect_start_stage().returning(|_, _| Ok(()));
    client.expect_stage_progress().returning(|_, _| Ok(progress(2, 10)));

    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    client.expect_latest_preview().returning(move |_, _| {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(Some(PreviewArtifact { image_base64: "data:image/png;base64,AAAA".to_string() })),
            _ => Ok(None),
        }
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage2, fast_config());
    controller.start().await.unwrap();

    sleep(Duration::from_millis(25)).await;
    assert!(matches!(controller.preview(), PreviewSlot::Ready(_)));

    sleep(Duration::from_millis(45)).await;
    // The second poll said "not ready": stale image cleared, waiting again,
    // and the run itself is untouched.
    assert_eq!(controller.preview(), PreviewSlot::Waiting);
    assert_eq!(controller.state(), StageState::Running);
}

#[tokio::test]
async fn preview_transport_failure_stops_only_the_preview_loop() {
    let mut client = MockJobClient::new();
    client.expect_start_stage().returning(|_, _| Ok(()));
    client.expect_stage_progress().returning(|_, _| Ok(progress(3, 10)));

    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    client.expect_latest_preview().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(JobClientError::transport("latest_preview", "connection reset"))
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(150)).await;

    assert_eq!(fetches.load(Ordering::SeqCst), 1, "preview loop ended after its failure");
    assert_eq!(controller.state(), StageState::Running, "progress observation is unaffected");
}

#[tokio::test]
async fn commands_are_validated_before_reaching_the_server() {
    let mut client = MockJobClient::new();
    client.expect_start_stage().times(1).returning(|_, _| Ok(()));
    client.expect_latest_preview().returning(|_, _| Ok(None));
    client.expect_stage_progress().returning(|_, _| Ok(progress(1, 10)));
    // No expectation for stop/resume misuse: an illegal command must never
    // hit the client.

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());

    assert!(matches!(
        controller.resume().await,
        Err(StageControlError::InvalidTransition { .. })
    ));

    controller.start().await.unwrap();
    assert!(matches!(
        controller.start().await,
        Err(StageControlError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn dropping_the_controller_cancels_both_loops() {
    let mut client = base_client();

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    client.expect_stage_progress().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(progress(1, 10))
    });

    let controller = StageController::with_config(Arc::new(client), job_id(), Stage::Stage1, fast_config());
    controller.start().await.unwrap();
    sleep(Duration::from_millis(25)).await;

    drop(controller);
    sleep(Duration::from_millis(60)).await;
    let settled = polls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(120)).await;
    assert_eq!(polls.load(Ordering::SeqCst), settled);
}
