//! Stream configuration

use serde::{Deserialize, Serialize};

/// Per-processor stream configuration
///
/// The decoder is forced to this output geometry regardless of the source
/// stream, so `frame_size()` is exact for every frame on the pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Consecutive empty reads before the processor gives up for good
    pub max_empty_reads: u32,
    /// Consecutive decoder restarts before the processor gives up
    pub max_restart_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            max_empty_reads: 150,
            max_restart_attempts: 3,
        }
    }
}

impl StreamConfig {
    /// Size in bytes of one raw BGR24 frame
    pub fn frame_size(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_size() {
        let config = StreamConfig::default();
        assert_eq!(config.frame_size(), 960 * 540 * 3);
    }
}
