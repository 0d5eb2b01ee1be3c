use super::*;

/// One file submitted as part of a request. `name` is validated against
/// path-traversal and size ceilings by [`ExecRequest::validate`] before any
/// workspace is created.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
  pub name: String,
  pub content: Vec<u8>,
}

/// A single execution request. Constructed by the (out-of-scope) HTTP
/// layer; every field is validated by [`ExecRequest::validate`] before the
/// `Executor` touches the filesystem.
#[derive(Debug, Clone)]
pub struct ExecRequest {
  pub language: String,
  pub version: String,
  pub files: Vec<SubmittedFile>,
  pub stdin: Option<Vec<u8>>,
  pub args: Vec<String>,
  pub internet: bool,
  pub time_limit_seconds: f64,
  pub memory_limit_mb: u32,
  pub process_limit: u32,
}

impl ExecRequest {
  /// Checks every invariant in spec §3 and §8 ("For any file name
  /// containing `..` or an absolute path, `execute` rejects the request
  /// without creating a workspace"). Called before any filesystem access.
  pub fn validate(&self, config: &HostConfig) -> Result {
    ensure!(
      !self.files.is_empty(),
      Error::InvalidRequest("request must include at least one file".into())
    );

    ensure!(
      self.files.len() <= config.max_files,
      Error::InvalidRequest(format!(
        "request has {} files, limit is {}",
        self.files.len(),
        config.max_files
      ))
    );

    let mut seen_names = std::collections::HashSet::with_capacity(self.files.len());
    let mut total_bytes: u64 = 0;

    for file in &self.files {
      validate_file_name(&file.name, config.max_name_len)?;

      ensure!(
        seen_names.insert(file.name.as_str()),
        Error::InvalidRequest(format!("duplicate file name: {}", file.name))
      );

      ensure!(
        (file.content.len() as u64) <= config.max_file_bytes,
        Error::InvalidRequest(format!(
          "file {} is {} bytes, limit is {}",
          file.name,
          file.content.len(),
          config.max_file_bytes
        ))
      );

      total_bytes += file.content.len() as u64;
    }

    ensure!(
      total_bytes <= config.max_total_bytes,
      Error::InvalidRequest(format!(
        "request totals {total_bytes} bytes, limit is {}",
        config.max_total_bytes
      ))
    );

    if let Some(stdin) = &self.stdin {
      ensure!(
        (stdin.len() as u64) <= config.max_stdin_bytes,
        Error::InvalidRequest(format!(
          "stdin is {} bytes, limit is {}",
          stdin.len(),
          config.max_stdin_bytes
        ))
      );
    }

    ensure!(
      self.args.len() <= config.max_args,
      Error::InvalidRequest(format!(
        "request has {} args, limit is {}",
        self.args.len(),
        config.max_args
      ))
    );

    ensure!(
      self.time_limit_seconds > 0.0 && self.time_limit_seconds <= config.max_time_limit_seconds,
      Error::InvalidRequest(format!(
        "time_limit_seconds {} out of range (0, {}]",
        self.time_limit_seconds, config.max_time_limit_seconds
      ))
    );

    ensure!(
      self.memory_limit_mb > 0 && self.memory_limit_mb <= config.max_memory_mb,
      Error::InvalidRequest(format!(
        "memory_limit_mb {} out of range (0, {}]",
        self.memory_limit_mb, config.max_memory_mb
      ))
    );

    ensure!(
      self.process_limit >= 1 && self.process_limit <= config.max_processes,
      Error::InvalidRequest(format!(
        "process_limit {} out of range [1, {}]",
        self.process_limit, config.max_processes
      ))
    );

    Ok(())
  }

  /// The entry file, i.e. `files[0]`, passed to the interpreter as its
  /// script argument. Only valid to call after `validate` has confirmed
  /// `files` is non-empty.
  pub fn entry_file(&self) -> &SubmittedFile {
    &self.files[0]
  }
}

fn validate_file_name(name: &str, max_len: usize) -> Result {
  ensure!(
    !name.is_empty(),
    Error::InvalidRequest("file name must not be empty".into())
  );

  ensure!(
    name.len() <= max_len,
    Error::InvalidRequest(format!("file name {name} exceeds {max_len} bytes"))
  );

  ensure!(
    !name.contains('\0'),
    Error::InvalidRequest(format!("file name {name} contains a NUL byte"))
  );

  let path = Path::new(name);

  ensure!(
    !path.is_absolute(),
    Error::InvalidRequest(format!("file name {name} must be relative"))
  );

  ensure!(
    path
      .components()
      .all(|component| matches!(component, std::path::Component::Normal(_))),
    Error::InvalidRequest(format!("file name {name} must not traverse directories"))
  );

  Ok(())
}

/// An installed interpreter, resolved by `RuntimeRegistry::resolve`.
#[derive(Debug, Clone)]
pub struct RuntimeDescriptor {
  pub language: String,
  pub resolved_version: String,
  pub interpreter_path: PathBuf,
  pub entry_must_be_executable: bool,
  pub env_overrides: &'static [(&'static str, &'static str)],
  argv_builder: fn(&Path, &[String]) -> Vec<String>,
}

impl RuntimeDescriptor {
  pub fn new(
    language: String,
    resolved_version: String,
    interpreter_path: PathBuf,
    entry_must_be_executable: bool,
    env_overrides: &'static [(&'static str, &'static str)],
    argv_builder: fn(&Path, &[String]) -> Vec<String>,
  ) -> Self {
    Self {
      language,
      resolved_version,
      interpreter_path,
      entry_must_be_executable,
      env_overrides,
      argv_builder,
    }
  }

  /// Builds the full command line: interpreter path, then
  /// interpreter-specific flags and the entry file, then the user's `args`
  /// verbatim.
  pub fn argv(&self, entry_file: &Path, args: &[String]) -> Vec<String> {
    let mut argv = vec![self.interpreter_path.display().to_string()];
    argv.extend((self.argv_builder)(entry_file, args));
    argv
  }
}

/// Whether the namespace-based sandbox is actually usable on this host.
/// Resolved once by `SandboxProbe` and cached for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
  Namespaced,
  Direct,
}

/// How an execution ended. `Completed` through `SandboxError` are all
/// *successful executions* of the service per spec §7 — they are returned
/// as values, never raised as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Completed,
  TimedOut,
  MemoryExceeded,
  OutputExceeded,
  RuntimeError {
    exit_code: Option<i32>,
    signal: Option<i32>,
  },
  SandboxError,
  /// The caller's cancellation signal fired before the process exited on
  /// its own. Distinct from `TimedOut`: the wall-clock deadline never fired.
  Cancelled,
}

/// The result of one execution. Bytes fields are always within the
/// configured ceilings; `*_truncated` records whether a cap was hit.
#[derive(Debug, Clone)]
pub struct ExecResult {
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  pub stdout_truncated: bool,
  pub stderr_truncated: bool,
  pub exit_code: Option<i32>,
  pub termination_signal: Option<i32>,
  pub outcome: Outcome,
  pub wall_time_ms: u64,
  pub cpu_time_ms: Option<u64>,
}
