//! Tunables for the counting pipeline

use crate::error::{Error, Result};

/// Default number of clusters carried by one chunk
pub const DEFAULT_CHUNK_SIZE: usize = 40_000;
/// Default number of chunks a queue holds before its producer blocks
pub const DEFAULT_QUEUE_DEPTH: usize = 100;

/// Sizes that bound the memory held by one lane's pipeline: at most
/// `queue_depth` chunks of `chunk_size` elements between any two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl PipelineConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidParameter {
                parameter: "chunk-size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_depth == 0 {
            return Err(Error::InvalidParameter {
                parameter: "queue-depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
