//! Incremental whole-file digest, fed one chunk-sized read at a time.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::TransferError;

/// Hash a file's contents without holding more than one chunk in memory.
///
/// The bytes stream through the hasher in the same order the transmitter
/// sends them, so the value here is exactly what the server recomputes over
/// the merged file. Returns the lowercase hex SHA-256 digest.
pub async fn file_digest(path: &Path, chunk_size: u64) -> Result<String, TransferError> {
    let mut file = File::open(path).await.map_err(|e| TransferError::file_read(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size as usize];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| TransferError::file_read(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
