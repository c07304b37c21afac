use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Job client provides an abstraction over the training server that does the
/// following:
/// - Create a job record spanning one dataset upload through inference
/// - Accept a file as an ordered sequence of bounded-size chunks and merge
///   them once the content digest is known
/// - Start, stop and resume a named stage of the remote computation and
///   expose its epoch-based progress and latest preview artifact
///
/// The trait covers exactly the calls the transfer pipeline and the stage
/// controller depend on; everything else the server offers stays on the
/// concrete implementation.
#[automock]
#[async_trait]
pub trait JobClient: Send + Sync {
    async fn create_job(&self) -> Result<JobId, JobClientError>;
    async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<(), JobClientError>;
    async fn merge_file(&self, merge: FileMerge) -> Result<(), JobClientError>;
    async fn start_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError>;
    async fn stop_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError>;
    async fn resume_stage(&self, job_id: &JobId, stage: Stage) -> Result<(), JobClientError>;
    async fn stage_progress(&self, job_id: &JobId, stage: Stage) -> Result<StageProgress, JobClientError>;
    async fn latest_preview(&self, job_id: &JobId, stage: Stage)
        -> Result<Option<PreviewArtifact>, JobClientError>;
    async fn run_inference(&self, job_id: &JobId, stage: Option<Stage>) -> Result<(), JobClientError>;
}

/// Server-assigned job identifier. Opaque to the client; round-trips through
/// the caller's navigation state so a job can be picked up across page loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which of the two paired reference sets a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum FolderRole {
    #[serde(rename = "lr")]
    #[strum(serialize = "lr")]
    ReferenceLow,
    #[serde(rename = "hr")]
    #[strum(serialize = "hr")]
    ReferenceHigh,
}

/// Named phase of the remote computation, each with its own epoch counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[strum(serialize = "stage1")]
    Stage1,
    #[strum(serialize = "stage2")]
    Stage2,
}

/// One bounded-size byte range of a file in flight to the server.
///
/// Chunks of a file are uploaded in strictly increasing `chunk_index` order;
/// the final chunk, and only the final chunk, carries the whole-file digest.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub job_id: JobId,
    pub file_id: String,
    pub file_name: String,
    pub folder_role: FolderRole,
    pub chunk_index: u64,
    pub payload: Bytes,
    pub digest: Option<String>,
}

/// Finalize request issued after a file's last chunk has been acknowledged.
/// The server assembles the chunks and verifies the digest before the file
/// counts as durably stored.
#[derive(Debug, Clone)]
pub struct FileMerge {
    pub job_id: JobId,
    pub file_id: String,
    pub file_name: String,
    pub folder_role: FolderRole,
    pub digest: String,
}

/// Epoch counters for one (job, stage) pair. Either field may be unknown
/// early in a run; `total_epoch` is fixed once the server reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProgress {
    pub current_epoch: Option<u64>,
    pub total_epoch: Option<u64>,
}

impl StageProgress {
    /// A run is complete once both counters are known and current has
    /// reached total.
    pub fn is_complete(&self) -> bool {
        match (self.current_epoch, self.total_epoch) {
            (Some(current), Some(total)) => current >= total,
            _ => false,
        }
    }
}

/// Latest intermediate visual output of a running stage. No identity beyond
/// "most recent for (job, stage)"; superseded by the next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArtifact {
    pub image_base64: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JobClientError {
    /// Request could not complete (connect/timeout/stream errors).
    #[error("Transport failure during {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Bearer credential rejected. Terminal for the current operation.
    #[error("Credential rejected during {operation}")]
    Unauthorized { operation: String },

    /// Server reported a digest mismatch while merging a file.
    #[error("Digest verification failed for {file_name}: {message}")]
    Verification { file_name: String, message: String },

    /// Server returned a non-success status outside the cases above.
    #[error("Server error during {operation} (status {status}): {message}")]
    Api { operation: String, status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Failed to parse response during {operation}: {message}")]
    Parse { operation: String, message: String },
}

impl JobClientError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { operation: operation.into(), message: message.into() }
    }

    pub fn unauthorized(operation: impl Into<String>) -> Self {
        Self::Unauthorized { operation: operation.into() }
    }

    pub fn api(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api { operation: operation.into(), status, message: message.into() }
    }

    pub fn parse(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { operation: operation.into(), message: message.into() }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
