//! Sequential, single-file chunk transmission.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use upres_job_client_interface::{ChunkUpload, FileMerge, FolderRole, JobClient, JobId};

use crate::chunk::{self, MAX_CHUNK_SIZE_BYTES};
use crate::digest::file_digest;
use crate::error::TransferError;
use crate::observer::TransferObserver;

/// Moves one file to the server as an ordered chunk sequence.
///
/// Chunks go out strictly one at a time in index order; the digest is
/// computed before the final chunk is sent and travels with it, and a merge
/// request finalizes the file once every chunk is acknowledged. Any failed
/// call aborts the file with no retry and no local state left behind.
pub struct ChunkTransmitter<C: JobClient> {
    client: Arc<C>,
    chunk_size: u64,
}

impl<C: JobClient> ChunkTransmitter<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self::with_chunk_size(client, MAX_CHUNK_SIZE_BYTES)
    }

    pub fn with_chunk_size(client: Arc<C>, chunk_size: u64) -> Self {
        Self { client, chunk_size }
    }

    /// Upload `path` under `role` for `job_id`, reporting progress after
    /// each acknowledged chunk. Returns the file identifier the server
    /// knows the file by.
    pub async fn transmit(
        &self,
        path: &Path,
        role: FolderRole,
        job_id: &JobId,
        observer: &dyn TransferObserver,
    ) -> Result<String, TransferError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TransferError::InvalidFileName { path: path.to_path_buf() })?;

        let size = tokio::fs::metadata(path).await.map_err(|e| TransferError::file_read(path, e))?.len();
        let ranges = chunk::plan(size, self.chunk_size);
        let count = ranges.len() as u64;

        // Unique across retries within a session: a retry of the same file
        // gets a fresh timestamp and therefore a fresh identifier.
        let file_id = format!("{}-{}-{}", role, file_name, Utc::now().timestamp_millis());
        let digest = file_digest(path, self.chunk_size).await?;

        info!(
            job_id = %job_id,
            file_id = %file_id,
            file_bytes = size,
            chunk_count = count,
            "Starting file transmission"
        );

        let mut file = File::open(path).await.map_err(|e| TransferError::file_read(path, e))?;
        for range in &ranges {
            let mut buffer = vec![0u8; range.len() as usize];
            file.read_exact(&mut buffer).await.map_err(|e| TransferError::file_read(path, e))?;

            let is_last = range.index + 1 == count;
            self.client
                .upload_chunk(ChunkUpload {
                    job_id: job_id.clone(),
                    file_id: file_id.clone(),
                    file_name: file_name.to_string(),
                    folder_role: role,
                    chunk_index: range.index,
                    payload: Bytes::from(buffer),
                    digest: is_last.then(|| digest.clone()),
                })
                .await?;

            let percent = progress_percent(range.index, count);
            observer.on_file_progress(role, percent);
            debug!(file_id = %file_id, chunk_index = range.index, percent = percent, "Chunk acknowledged");
        }

        self.client
            .merge_file(FileMerge {
                job_id: job_id.clone(),
                file_id: file_id.clone(),
                file_name: file_name.to_string(),
                folder_role: role,
                digest,
            })
            .await?;

        info!(job_id = %job_id, file_id = %file_id, "File transmission complete");
        Ok(file_id)
    }
}

/// Progress after chunk `index` out of `count` has been acknowledged,
/// rounded to a whole percent. Reaches exactly 100 on the final chunk.
pub(crate) fn progress_percent(index: u64, count: u64) -> u8 {
    (((index + 1) as f64 / count as f64) * 100.0).round() as u8
}
