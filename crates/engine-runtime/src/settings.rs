use crate::error::MigrationError;
use engine_core::retry::RetryPolicy;
use model::migration::task::DEFAULT_BATCH_SIZE;
use std::{path::PathBuf, time::Duration};

/// Reconnects attempted after the first failed write of a batch.
pub const DEFAULT_WRITE_RECONNECTS: usize = 3;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Directory of the embedded task store.
    pub state_dir: PathBuf,
    /// Used when a request carries no positive batch size.
    pub default_batch_size: usize,
    pub write_retry: RetryPolicy,
}

impl EngineSettings {
    /// Settings rooted at `~/.datamigrate/state`.
    pub fn from_home() -> Result<Self, MigrationError> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            MigrationError::InitializationError("Could not determine home directory".to_string())
        })?;
        Ok(Self::with_state_dir(home_dir.join(".datamigrate").join("state")))
    }

    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            default_batch_size: DEFAULT_BATCH_SIZE,
            write_retry: RetryPolicy::new(
                DEFAULT_WRITE_RECONNECTS + 1,
                Duration::from_millis(500),
                Duration::from_secs(5),
            ),
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.default_batch_size = size;
        }
        self
    }

    pub fn write_retry(mut self, retry: RetryPolicy) -> Self {
        self.write_retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = EngineSettings::with_state_dir("/tmp/state");
        assert_eq!(settings.default_batch_size, 1000);
        assert_eq!(settings.write_retry.max_attempts, 4);
        assert_eq!(settings.state_dir, PathBuf::from("/tmp/state"));
    }

    #[test]
    fn zero_batch_size_is_ignored() {
        let settings = EngineSettings::with_state_dir("/tmp/state").batch_size(0);
        assert_eq!(settings.default_batch_size, 1000);
        let settings = settings.batch_size(250);
        assert_eq!(settings.default_batch_size, 250);
    }

    #[test]
    fn home_state_dir_layout() {
        if let Ok(settings) = EngineSettings::from_home() {
            assert!(settings.state_dir.ends_with(".datamigrate/state"));
        }
    }
}
