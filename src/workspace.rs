use super::*;

/// A transient on-disk directory holding one execution's input files.
/// Exclusively owned by the Executor for the duration of one request.
/// [`Workspace::teardown`] removes it on the normal return path; `Drop`
/// removes it on every other exit, including a panic between `create` and
/// `teardown`.
#[derive(Debug)]
pub struct Workspace {
  root: PathBuf,
  entry_relative: PathBuf,
}

impl Drop for Workspace {
  fn drop(&mut self) {
    self.root.remove_best_effort();
  }
}

impl Workspace {
  /// Creates a unique `0700` directory under `config.workspace_root` and
  /// writes every file in `request`, rejecting any file whose resolved
  /// path would escape the workspace (second line of defense behind
  /// `ExecRequest::validate`'s name check).
  pub fn create(request: &ExecRequest, runtime: &RuntimeDescriptor, config: &HostConfig) -> Result<Self> {
    let root = config.workspace_root.join(Uuid::new_v4().simple().to_string());
    root
      .create(0o700)
      .map_err(|error| Error::Setup(format!("creating workspace {}: {error}", root.display())))?;

    for file in &request.files {
      if let Err(error) = write_file(&root, file) {
        root.remove_best_effort();
        return Err(error);
      }
    }

    let entry_relative = PathBuf::from(&request.entry_file().name);
    let entry_path = root.join(&entry_relative);

    if runtime.entry_must_be_executable {
      if let Err(error) = fs::set_permissions(&entry_path, fs::Permissions::from_mode(0o700)) {
        root.remove_best_effort();
        return Err(Error::Setup(format!(
          "marking entry file executable: {error}"
        )));
      }
    }

    Ok(Self {
      root,
      entry_relative,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Absolute path to the entry file, passed to the interpreter.
  pub fn entry_path(&self) -> PathBuf {
    self.root.join(&self.entry_relative)
  }

  /// Recursively removes the workspace. Equivalent to dropping `self`;
  /// kept as a named call at the Executor's normal return site for
  /// clarity. `Drop` is what actually guarantees removal on every path.
  pub fn teardown(self) {
    drop(self);
  }
}

fn write_file(root: &Path, file: &SubmittedFile) -> Result {
  let path = root.join(&file.name);

  let canonical_root = fs::canonicalize(root)
    .map_err(|error| Error::Setup(format!("resolving workspace root: {error}")))?;

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .map_err(|error| Error::Setup(format!("creating directory for {}: {error}", file.name)))?;
  }

  fs::write(&path, &file.content)
    .map_err(|error| Error::Setup(format!("writing file {}: {error}", file.name)))?;

  let canonical_path = fs::canonicalize(&path)
    .map_err(|error| Error::Setup(format!("resolving path for {}: {error}", file.name)))?;

  ensure!(
    canonical_path.starts_with(&canonical_root),
    Error::InvalidRequest(format!("file {} escapes the workspace", file.name))
  );

  fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
    .map_err(|error| Error::Setup(format!("setting permissions on {}: {error}", file.name)))?;

  Ok(())
}
