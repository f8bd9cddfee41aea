use std::path::PathBuf;

use crate::error::ProvisionerError;
use crate::state::ProvisionerState;

/// Local-disk state persistence.
pub struct StatePersistence {
    pub local_path: PathBuf,
}

impl StatePersistence {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }

    /// Write state to local disk atomically (tmp + rename).
    pub async fn flush(&self, state: &ProvisionerState) -> Result<(), ProvisionerError> {
        let json = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.local_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.local_path).await?;

        tracing::debug!(path = %self.local_path.display(), "state flushed to local disk");
        Ok(())
    }

    /// Load state, or return Default if none has been written yet.
    pub async fn load(&self) -> Result<ProvisionerState, ProvisionerError> {
        match tokio::fs::read(&self.local_path).await {
            Ok(json) => {
                let state: ProvisionerState = serde_json::from_slice(&json)?;
                tracing::debug!(path = %self.local_path.display(), "state loaded from local disk");
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no existing state found, starting fresh");
                Ok(ProvisionerState::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
