use super::*;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  /// The request named a language for which no table entry exists.
  #[error("unsupported language: {0}")]
  UnsupportedLanguage(String),

  /// The request named a language/version pair with no installed match.
  #[error("no installed runtime matches {language} {version}")]
  RuntimeNotFound { language: String, version: String },

  /// The request itself is malformed: bad path, oversized field, empty
  /// file list, and so on. No workspace is created for these.
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// Workspace creation or file materialization failed.
  #[error("workspace setup failed: {0}")]
  Setup(String),

  /// A mount rule was internally inconsistent (e.g. a temporary mount
  /// given an outside path).
  #[error("mount error: {0}")]
  Mount(String),

  /// The sandbox helper is missing, the probe failed, or the child's
  /// preexec limit setup could not be applied.
  #[error("sandbox error: {0}")]
  Sandbox(String),

  /// Filesystem error surfaced verbatim from `std::io`.
  #[error("filesystem error: {0}")]
  Filesystem(#[from] std::io::Error),

  /// A bug, an unreachable state, or an OS call that should not fail did.
  #[error("internal error: {0}")]
  Internal(String),
}
