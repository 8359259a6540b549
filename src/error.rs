use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GatheringError {
  #[error("mesh resource not found: {}", .0.display())]
  ResourceNotFound(PathBuf),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("unable to parse mesh at line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("invalid mesh: {0}")]
  InvalidMesh(String),

  #[error("no active session")]
  NoActiveSession,

  #[error("invalid parameter `{name}`: {message}")]
  InvalidParameter { name: &'static str, message: String },

  #[error(
    "vessel interior only fits {available} particles, {requested} requested"
  )]
  InsufficientSpace { requested: usize, available: usize },

  #[error("image error: {0}")]
  Image(#[from] image::ImageError),

  #[error("configuration error: {0}")]
  Config(#[from] figment::Error),
}

pub type Result<T> = std::result::Result<T, GatheringError>;

impl GatheringError {
  pub(crate) fn invalid_parameter(
    name: &'static str,
    message: impl Into<String>,
  ) -> Self {
    GatheringError::InvalidParameter {
      name,
      message: message.into(),
    }
  }
}

/// Rejects values that are NaN, infinite or not strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f32) -> Result<()> {
  if value.is_finite() && value > 0.0 {
    Ok(())
  } else {
    Err(GatheringError::invalid_parameter(
      name,
      format!("expected a finite value > 0, got {}", value),
    ))
  }
}

pub(crate) fn ensure_finite(name: &'static str, value: f32) -> Result<()> {
  if value.is_finite() {
    Ok(())
  } else {
    Err(GatheringError::invalid_parameter(
      name,
      format!("expected a finite value, got {}", value),
    ))
  }
}
