use std::path::PathBuf;

use upres_job_client_interface::JobClientError;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Client(#[from] JobClientError),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File name of {path} is missing or not valid UTF-8")]
    InvalidFileName { path: PathBuf },
}

impl TransferError {
    pub(crate) fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead { path: path.into(), source }
    }
}
