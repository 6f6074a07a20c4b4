//! Block layout and queued block tasks.

/// A pending block task: the block index plus how many times it has already
/// been requeued after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: usize,
    pub retry_count: u32,
}

impl Block {
    /// First attempt for `index`.
    pub fn new(index: usize) -> Self {
        Block {
            index,
            retry_count: 0,
        }
    }

    /// The same block, one retry later.
    pub fn retried(self) -> Self {
        Block {
            index: self.index,
            retry_count: self.retry_count + 1,
        }
    }
}

/// Fixed-size partition of an object of `total_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    block_size: u64,
    total_size: u64,
}

impl BlockLayout {
    /// `block_size` must be non-zero; callers validate it from config.
    pub fn new(block_size: u64, total_size: u64) -> Self {
        debug_assert!(block_size > 0, "block size must be non-zero");
        BlockLayout {
            block_size: block_size.max(1),
            total_size,
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of blocks (0 for an empty object).
    pub fn block_count(&self) -> usize {
        self.total_size.div_ceil(self.block_size) as usize
    }

    /// File offset where block `index` starts.
    pub fn offset(&self, index: usize) -> u64 {
        index as u64 * self.block_size
    }

    /// Inclusive byte range `[start, end]` of block `index`.
    pub fn range(&self, index: usize) -> (u64, u64) {
        let start = self.offset(index);
        let end = (start + self.block_size - 1).min(self.total_size.saturating_sub(1));
        (start, end)
    }

    /// Length in bytes of block `index`.
    pub fn len(&self, index: usize) -> u64 {
        let (start, end) = self.range(index);
        end + 1 - start
    }
}
