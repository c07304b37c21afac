use upres_job_client_interface::FolderRole;

/// Sink for the caller-visible side of a transfer: per-file progress
/// percentages and the single failure notification an aborted upload
/// produces.
///
/// Progress for a role restarts from 0 with each file and is reset to 0 when
/// the job transfer aborts, so the caller never shows a stale in-progress
/// state.
pub trait TransferObserver: Send + Sync {
    fn on_file_progress(&self, role: FolderRole, percent: u8);

    /// Exactly one call per aborted upload attempt; chunk-level errors are
    /// not reported individually.
    fn on_transfer_failed(&self, message: &str);
}

/// Observer for callers that only need the returned job id.
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_file_progress(&self, _role: FolderRole, _percent: u8) {}

    fn on_transfer_failed(&self, _message: &str) {}
}
