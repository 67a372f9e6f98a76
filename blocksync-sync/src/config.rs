use std::path::PathBuf;
use std::time::Duration;

/// Largest number of blocks the remote accepts in one append call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Tunables for a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Blocks per append call. Clamped to `1..=MAX_BATCH_SIZE`.
    pub batch_size: usize,
    /// Pause between consecutive append calls.
    pub throttle: Duration,
    /// Where pulled documents go when no directory is given.
    pub default_output_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            throttle: Duration::from_millis(100),
            default_output_dir: std::env::temp_dir().join("notion"),
        }
    }
}

impl SyncConfig {
    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_is_clamped() {
        let mut config = SyncConfig::default();
        assert_eq!(config.effective_batch_size(), 100);
        config.batch_size = 0;
        assert_eq!(config.effective_batch_size(), 1);
        config.batch_size = 500;
        assert_eq!(config.effective_batch_size(), 100);
    }
}
