//! Chunked, content-verified transfer of the two reference file sets that
//! make up a job's dataset.
//!
//! Files move one at a time, each as an ordered sequence of bounded-size
//! chunks; the final chunk carries a whole-file digest the server verifies
//! after merging. One chunk is resident in memory at any moment.

pub mod chunk;
pub mod digest;
pub mod error;
pub mod observer;
pub mod transmitter;
pub mod uploader;

pub use chunk::{plan, ChunkRange, MAX_CHUNK_SIZE_BYTES};
pub use error::TransferError;
pub use observer::{NoopObserver, TransferObserver};
pub use transmitter::ChunkTransmitter;
pub use uploader::TransferOrchestrator;
