use super::*;

pub trait PathExt {
  fn create(&self, mode: u32) -> Result;
  fn recreate(&self, mode: u32) -> Result;
  fn remove_best_effort(&self);
}

impl PathExt for PathBuf {
  fn create(&self, mode: u32) -> Result {
    fs::create_dir_all(self)?;
    fs::set_permissions(self, fs::Permissions::from_mode(mode))?;
    Ok(())
  }

  fn recreate(&self, mode: u32) -> Result {
    if self.exists() {
      fs::remove_dir_all(self)?;
    }

    self.create(mode)
  }

  /// Recursively delete, logging and continuing on any path that refuses
  /// to unlink instead of propagating the error. Used for workspace
  /// teardown, which must run on every exit path including panics.
  fn remove_best_effort(&self) {
    if let Err(error) = fs::remove_dir_all(self) {
      if error.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!(path = %self.display(), %error, "failed to remove workspace");
      }
    }
  }
}
