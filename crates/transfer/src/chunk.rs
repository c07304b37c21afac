//! Chunk planning: split a byte length into the ordered ranges the
//! transmitter walks.

/// Upper bound on a single chunk. Matches the server's reassembly buffer.
pub const MAX_CHUNK_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Contiguous byte range `[start, end)` of a file, addressed by its index
/// within the file's chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ordered ranges covering `[0, size)`, each `chunk_size` long except
/// possibly the last. An empty file still yields one zero-length chunk so
/// the digest and finalize steps run for it like any other file.
pub fn plan(size: u64, chunk_size: u64) -> Vec<ChunkRange> {
    assert!(chunk_size > 0, "chunk_size must be positive");

    if size == 0 {
        return vec![ChunkRange { index: 0, start: 0, end: 0 }];
    }

    (0..size.div_ceil(chunk_size))
        .map(|index| ChunkRange {
            index,
            start: index * chunk_size,
            end: size.min((index + 1) * chunk_size),
        })
        .collect()
}
