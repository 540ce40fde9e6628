use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported hash algorithm: {0}")]
  UnsupportedAlgorithm(String),

  #[error("cannot build a hash tree from zero items")]
  EmptyInput,

  #[error("leaf not found: {0}")]
  LeafNotFound(String),

  #[error("item count mismatch: {expected} stored leaves, {actual} items given")]
  LengthMismatch { expected: usize, actual: usize },

  #[error("malformed proof path: {0}")]
  MalformedProof(String),

  #[error("invalid data: {0}")]
  InvalidData(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}
