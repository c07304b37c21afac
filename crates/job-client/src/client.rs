use std::sync::Arc;

use reqwest::Method;
use tracing::debug;
use upres_job_client_interface::{ChunkUpload, JobClientError, JobId, Stage};
use upres_utils::http_client::{HttpClient, RequestBuilder};
use url::Url;

use crate::credentials::CredentialStore;
use crate::error::{from_error_response, from_reqwest_error};
use crate::types::{
    CreateJobResponse, InferenceRequest, JobHistoryEntry, MergeChunksRequest, PreprocessPreviewResponse,
    PreviewRequest, PreviewResponse, RunPreprocessRequest, StageCommandRequest, TrainProgressResponse,
};

/// Wire-level async client for the training server's REST API.
///
/// One method per endpoint; requests are built through the shared
/// [`HttpClient`] layer and carry the bearer credential current at send
/// time. Response interpretation beyond status/JSON handling (e.g. turning
/// a merge failure into a verification error) belongs to the service layer.
pub struct TrainingApiClient {
    client: HttpClient,
    credentials: Arc<CredentialStore>,
}

impl TrainingApiClient {
    /// `base_url` is the API root, e.g. `https://host/api`.
    pub fn new_with_args(base_url: &Url, credentials: Arc<CredentialStore>) -> Self {
        let client = HttpClient::builder(base_url.as_str())
            .expect("Failed to create HTTP client builder")
            .build()
            .expect("Failed to build HTTP client");
        Self { client, credentials }
    }

    fn request(&self) -> RequestBuilder<'_> {
        let builder = self.client.request();
        match self.credentials.token() {
            Some(token) => builder.bearer_auth(&token),
            None => builder,
        }
    }

    pub async fn create_job(&self) -> Result<CreateJobResponse, JobClientError> {
        let response = self
            .request()
            .method(Method::POST)
            .path("new-history")
            .send()
            .await
            .map_err(|e| from_reqwest_error("create_job", e))?;

        match response.status().is_success() {
            true => response.json().await.map_err(|e| JobClientError::parse("create_job", e.to_string())),
            false => Err(from_error_response("create_job", response).await),
        }
    }

    /// Upload one chunk as a multipart form. The `digest` field rides along
    /// only when the caller attached it (final chunk).
    pub async fn upload_chunk(&self, chunk: &ChunkUpload) -> Result<(), JobClientError> {
        debug!(
            job_id = %chunk.job_id,
            file_id = %chunk.file_id,
            chunk_index = chunk.chunk_index,
            chunk_bytes = chunk.payload.len(),
            has_digest = chunk.digest.is_some(),
            "Uploading chunk"
        );

        let mut request = self
            .request()
            .method(Method::POST)
            .path("upload-chunk")
            .form_text("historyId", chunk.job_id.as_str())
            .form_text("fileId", &chunk.file_id)
            .form_text("fileName", &chunk.file_name)
            .form_text("folderType", &chunk.folder_role.to_string())
            .form_text("chunkIndex", &chunk.chunk_index.to_string())
            .form_file_bytes(
                "chunk",
                chunk.payload.to_vec(),
                &chunk.file_name,
                Some("application/octet-stream"),
            )
            .map_err(|e| JobClientError::transport("upload_chunk", e.to_string()))?;

        if let Some(digest) = &chunk.digest {
            request = request.form_text("digest", digest);
        }

        let response = request.send().await.map_err(|e| from_reqwest_error("upload_chunk", e))?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(from_error_response("upload_chunk", response).await),
        }
    }

    pub async fn merge_chunks(&self, merge: &MergeChunksRequest) -> Result<(), JobClientError> {
        debug!(file_id = %merge.file_id, digest = %merge.digest, "Requesting chunk merge");

        let response = self
            .request()
            .method(Method::POST)
            .path("merge-chunks")
            .body(merge)
            .map_err(|e| JobClientError::parse("merge_chunks", e.to_string()))?
            .send()
            .await
            .map_err(|e| from_reqwest_error("merge_chunks", e))?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(from_error_response("merge_chunks", response).await),
        }
    }

    async fn stage_command(
        &self,
        operation: &str,
        path: &str,
        job_id: &JobId,
        stage: Stage,
    ) -> Result<(), JobClientError> {
        debug!(job_id = %job_id, stage = %stage, operation = operation, "Issuing stage command");

        let body = StageCommandRequest { history_id: job_id.to_string(), stage };
        let response = self
            .request()
            .method(Method::POST)
            .path(path)
            .body(&body)
            .map_err(|e| JobClientError::parse(operation, e.to_string()))?
            .send()
            .await
            .map_err(|e| from_reqwest_error(operation, e))?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(from_error_response(operation, response).await),
        }
    }

    pub async fn start_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        self.stage_command("start_stage", "train-stage", job_id, stage).await
    }

    pub async fn stop_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        self.stage_command("stop_stage", "stop-training", job_id, stage).await
    }

    pub async fn resume_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError> {
        self.stage_command("resume_stage", "resume-training", job_id, stage).await
    }

    pub async fn train_progress(
        &self,
        job_id: &JobId,
        stage: Stage,
    ) -> Result<TrainProgressResponse, JobClientError> {
        let response = self
            .request()
            .method(Method::GET)
            .path("train-progress")
            .query_param("history_id", job_id.as_str())
            .query_param("stage", &stage.to_string())
            .send()
            .await
            .map_err(|e| from_reqwest_error("stage_progress", e))?;

        match response.status().is_success() {
            true => {
                response.json().await.map_err(|e| JobClientError::parse("stage_progress", e.to_string()))
            }
            false => Err(from_error_response("stage_progress", response).await),
        }
    }

    /// Fetch the most recent test image for a running stage. A response
    /// without an image is a legitimate "not ready yet", not a failure, so
    /// non-auth error statuses map to an empty [`PreviewResponse`].
    pub async fn latest_test_image(
        &self,
        job_id: &JobId,
        stage: Stage,
    ) -> Result<PreviewResponse, JobClientError> {
        let body = PreviewRequest { history_id: job_id.to_string(), stage };
        let response = self
            .request()
            .method(Method::POST)
            .path("get-latest-test-image")
            .body(&body)
            .map_err(|e| JobClientError::parse("latest_preview", e.to_string()))?
            .send()
            .await
            .map_err(|e| from_reqwest_error("latest_preview", e))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| JobClientError::parse("latest_preview", e.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(JobClientError::unauthorized("latest_preview"));
        }

        let message = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<PreviewResponse>(&message)
            .ok()
            .and_then(|parsed| parsed.error)
            .or(Some(message));
        debug!(job_id = %job_id, stage = %stage, status = %status, "Preview not ready");
        Ok(PreviewResponse { image_base64: None, error })
    }

    pub async fn inference(&self, job_id: &JobId, stage: Option<Stage>) -> Result<(), JobClientError> {
        let body = InferenceRequest { history_id: job_id.to_string(), stage };
        let response = self
            .request()
            .method(Method::POST)
            .path("inference")
            .body(&body)
            .map_err(|e| JobClientError::parse("run_inference", e.to_string()))?
            .send()
            .await
            .map_err(|e| from_reqwest_error("run_inference", e))?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(from_error_response("run_inference", response).await),
        }
    }

    pub async fn run_preprocess(&self, job_id: &JobId) -> Result<(), JobClientError> {
        let body = RunPreprocessRequest { history_id: job_id.to_string() };
        let response = self
            .request()
            .method(Method::POST)
            .path("run_preprocess")
            .body(&body)
            .map_err(|e| JobClientError::parse("run_preprocess", e.to_string()))?
            .send()
            .await
            .map_err(|e| from_reqwest_error("run_preprocess", e))?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(from_error_response("run_preprocess", response).await),
        }
    }

    pub async fn preprocess_preview(
        &self,
        job_id: &JobId,
    ) -> Result<PreprocessPreviewResponse, JobClientError> {
        let response = self
            .request()
            .method(Method::GET)
            .path("preprocess-preview")
            .query_param("history_id", job_id.as_str())
            .send()
            .await
            .map_err(|e| from_reqwest_error("preprocess_preview", e))?;

        match response.status().is_success() {
            true => {
                response.json().await.map_err(|e| JobClientError::parse("preprocess_preview", e.to_string()))
            }
            false => Err(from_error_response("preprocess_preview", response).await),
        }
    }

    pub async fn job_history(&self) -> Result<Vec<JobHistoryEntry>, JobClientError> {
        let response = self
            .request()
            .method(Method::GET)
            .path("history")
            .send()
            .await
            .map_err(|e| from_reqwest_error("job_history", e))?;

        match response.status().is_success() {
            true => response.json().await.map_err(|e| JobClientError::parse("job_history", e.to_string())),
            false => Err(from_error_response("job_history", response).await),
        }
    }
}
