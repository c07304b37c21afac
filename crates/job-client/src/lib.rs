pub mod client;
pub mod credentials;
mod error;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use upres_job_client_interface::{
    ChunkUpload, FileMerge, JobClient, JobClientError, JobId, PreviewArtifact, Stage, StageProgress,
};
use url::Url;

use crate::client::TrainingApiClient;
use crate::credentials::CredentialStore;
use crate::types::{JobHistoryEntry, MergeChunksRequest, PreprocessPreviewResponse};

/// Validated connection parameters for the training server.
#[derive(Debug, Clone)]
pub struct JobServiceArgs {
    /// API root, e.g. `https://host/api`.
    pub service_url: Url,
}

/// [`JobClient`] implementation backed by the training server's REST API.
pub struct TrainingJobService {
    api: TrainingApiClient,
}

impl TrainingJobService {
    pub fn new_with_args(args: &JobServiceArgs, credentials: Arc<CredentialStore>) -> Self {
        Self { api: TrainingApiClient::new_with_args(&args.service_url, credentials) }
    }

    /// Service pointed at a mock server on localhost.
    pub fn with_test_params(port: u16, credentials: Arc<CredentialStore>) -> Self {
        let args = JobServiceArgs {
            service_url: format!("http://127.0.0.1:{}/api", port).parse().expect("valid test URL"),
        };
        Self::new_with_args(&args, credentials)
    }

    /// Kick the server-side preprocessing step for an uploaded job.
    pub async fn run_preprocess(&self, job_id: &JobId) -> Result<(), JobClientError> {
        self.api.run_preprocess(job_id).await
    }

    /// Paths of the preprocessed volumes, once preprocessing has produced
    /// them.
    pub async fn preprocess_preview(
        &self,
        job_id: &JobId,
    ) -> Result<PreprocessPreviewResponse, JobClientError> {
        self.api.preprocess_preview(job_id).await
    }

    /// The caller's past jobs, newest first as the server returns them.
    pub async fn job_history(&self) -> Result<Vec<JobHistoryEntry>, JobClientError> {
        self.api.job_history().await
    }
}

#[async_trait]
impl JobClient for TrainingJobService {
    async fn create_job(&self) -> Result<JobId, JobClientError> {
        let response = self.api.create_job().await?;
        let job_id = JobId::new(response.history_id);
        info!(job_id = %job_id, "Created job");
        Ok(job_id)
    }

    async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<(), JobClientError> {
        self.api.upload_chunk(&chunk).await
    }

    /// A merge rejection is the server telling us the assembled file did not
    /// match the digest, so non-auth failures surface as verification
    /// errors rather than generic API errors.
    async fn merge_file(&self, merge: FileMerge) -> Result<(), JobClientError> {
        let request = MergeChunksRequest {
            history_id: merge.job_id.to_string(),
            file_id: merge.file_id,
            file_name: merge.file_name.clone(),
            folder_type: merge.folder_role.to_string(),
            digest: merge.digest,
        };

        match self.api.merge_chunks(&request).await {
            Ok(()) => {
                info!(file_name = %merge.file_name, "File merged and verified");
                Ok(())
            }
            Err(JobClientError::Api { message, .. }) => {
                Err(JobClientError::Verification { file_name: merge.file_name, message })
            }
            Err(other) => Err(other),
        }
    }

    async fn start_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        info!(job_id = %job_id, stage = %stage, "Starting stage");
        self.api.start_stage(job_id, stage).await
    }

    async fn stop_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        info!(job_id = %job_id, stage = %stage, "Stopping stage");
        self.api.stop_stage(job_id, stage).await
    }

    async fn resume_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        info!(job_id = %job_id, stage = %stage, "Resuming stage");
        self.api.resume_stage(job_id, stage).await
    }

    async fn stage_progress(&self, job_id: &JobId, stage: Stage) -> Result<StageProgress, JobClientError> {
        let response = self.api.train_progress(job_id, stage).await?;
        Ok(StageProgress { current_epoch: response.current_epoch, total_epoch: response.total_epoch })
    }

    async fn latest_preview(
        &self,
        job_id: &JobId,
        stage: Stage,
    ) -> Result<Option<PreviewArtifact>, JobClientError> {
        let response = self.api.latest_test_image(job_id, stage).await?;
        Ok(response.image_base64.map(|image_base64| PreviewArtifact { image_base64 }))
    }

    async fn run_inference(&self, job_id: &JobId, stage: Option<Stage>) -> Result<(), JobClientError> {
        info!(job_id = %job_id, stage = ?stage, "Running inference");
        self.api.inference(job_id, stage).await
    }
}
