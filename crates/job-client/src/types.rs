use serde::{Deserialize, Serialize};
use upres_job_client_interface::Stage;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobResponse {
    pub history_id: String,
}

/// Body of the `merge-chunks` finalize call. The upload endpoints predate the
/// rest of the API and use camelCase field names on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChunksRequest {
    pub history_id: String,
    pub file_id: String,
    pub file_name: String,
    pub folder_type: String,
    pub digest: String,
}

/// Body shared by the `train-stage`, `stop-training` and `resume-training`
/// commands.
#[derive(Debug, Clone, Serialize)]
pub struct StageCommandRequest {
    pub history_id: String,
    pub stage: Stage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainProgressResponse {
    pub current_epoch: Option<u64>,
    pub total_epoch: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewRequest {
    pub history_id: String,
    pub stage: Stage,
}

/// Either `image_base64` is present (artifact ready) or `error` explains why
/// it is not yet available. Absence of an artifact is not a failure.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPreprocessRequest {
    pub history_id: String,
}

/// Paths of the preprocessed training volumes; the caller uses their
/// presence to decide the job is viewable.
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessPreviewResponse {
    pub lr_h5: Option<String>,
    pub hr_h5: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobHistoryEntry {
    pub history_id: String,
    #[serde(default)]
    pub preprocess_status: Option<String>,
}
