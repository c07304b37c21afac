//! Job-level transfer orchestration across the two reference sets.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use upres_job_client_interface::{FolderRole, JobClient, JobId};

use crate::error::TransferError;
use crate::observer::TransferObserver;
use crate::transmitter::ChunkTransmitter;

/// Drives a whole job upload: creates the server-side job record, then
/// transmits every low-resolution file and every high-resolution file, in
/// caller order, one at a time, with no interleaving between the two sets.
///
/// Any failure aborts the remaining files, resets the observable progress
/// for both roles and surfaces a single failure notification. The job
/// record already created server-side is abandoned, not repaired; retrying
/// the flow creates a fresh job.
pub struct TransferOrchestrator<C: JobClient> {
    client: Arc<C>,
    transmitter: ChunkTransmitter<C>,
}

impl<C: JobClient> TransferOrchestrator<C> {
    pub fn new(client: Arc<C>) -> Self {
        let transmitter = ChunkTransmitter::new(client.clone());
        Self { client, transmitter }
    }

    pub fn with_chunk_size(client: Arc<C>, chunk_size: u64) -> Self {
        let transmitter = ChunkTransmitter::with_chunk_size(client.clone(), chunk_size);
        Self { client, transmitter }
    }

    /// Upload both reference sets under a freshly created job. Returns the
    /// job identifier the caller carries into the preview/preprocessing
    /// step.
    pub async fn upload_all(
        &self,
        reference_low: &[PathBuf],
        reference_high: &[PathBuf],
        observer: &dyn TransferObserver,
    ) -> Result<JobId, TransferError> {
        match self.try_upload_all(reference_low, reference_high, observer).await {
            Ok(job_id) => {
                info!(job_id = %job_id, "Job upload complete");
                Ok(job_id)
            }
            Err(e) => {
                warn!(error = %e, "Job upload aborted");
                observer.on_file_progress(FolderRole::ReferenceLow, 0);
                observer.on_file_progress(FolderRole::ReferenceHigh, 0);
                observer.on_transfer_failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn try_upload_all(
        &self,
        reference_low: &[PathBuf],
        reference_high: &[PathBuf],
        observer: &dyn TransferObserver,
    ) -> Result<JobId, TransferError> {
        let job_id = self.client.create_job().await?;
        info!(
            job_id = %job_id,
            low_files = reference_low.len(),
            high_files = reference_high.len(),
            "Created job, starting transfers"
        );

        for path in reference_low {
            self.transmitter.transmit(path, FolderRole::ReferenceLow, &job_id, observer).await?;
        }
        for path in reference_high {
            self.transmitter.transmit(path, FolderRole::ReferenceHigh, &job_id, observer).await?;
        }

        Ok(job_id)
    }
}
