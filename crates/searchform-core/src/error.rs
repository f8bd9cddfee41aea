use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid replica identifier: {0}")]
    InvalidReplicaId(String),

    #[error("invalid index name: {0:?}")]
    InvalidIndexName(String),
}
