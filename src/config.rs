use super::*;

/// Process-wide configuration, read once at startup and shared read-only
/// with every execution. Mirrors the "Consumed from configuration" table:
/// loading these from environment or a config file is the HTTP layer's job
/// (out of scope here); this struct only names the knobs and their defaults.
#[derive(Debug, Clone)]
pub struct HostConfig {
  /// Root of the installed runtime tree:
  /// `<packages_root>/<language>/<version>/bin/<interpreter>`.
  pub packages_root: PathBuf,

  /// Path to the `bwrap`-compatible namespace helper binary.
  pub sandbox_helper_path: PathBuf,

  /// If false, skip the sandbox probe and force `SandboxMode::Direct`.
  pub use_sandbox: bool,

  /// Root directory under which per-execution workspaces are created.
  pub workspace_root: PathBuf,

  /// Wall-clock ceiling used when a request omits `time_limit_seconds`.
  pub default_time_limit_seconds: f64,
  /// Hard upper bound on `time_limit_seconds`.
  pub max_time_limit_seconds: f64,

  /// Address-space ceiling used when a request omits `memory_limit_mb`.
  pub default_memory_mb: u32,
  /// Hard upper bound on `memory_limit_mb`.
  pub max_memory_mb: u32,

  /// Process-count ceiling used when a request omits `process_limit`.
  pub default_processes: u32,
  /// Hard upper bound on `process_limit`.
  pub max_processes: u32,

  /// Hard upper bound on the number of files in one request.
  pub max_files: usize,
  /// Hard upper bound on the size of any one submitted file, in bytes.
  pub max_file_bytes: u64,
  /// Hard upper bound on the combined size of all submitted files.
  pub max_total_bytes: u64,
  /// Hard upper bound on the size of `stdin`, in bytes.
  pub max_stdin_bytes: u64,
  /// Hard upper bound on the number of `args` entries.
  pub max_args: usize,
  /// Hard upper bound on the length of a submitted file name.
  pub max_name_len: usize,

  /// Output ceilings applied to the child's stdout and stderr streams.
  pub max_stdout_bytes: usize,
  pub max_stderr_bytes: usize,

  /// Maximum size of a file the child may create or extend, applied via
  /// `RLIMIT_FSIZE`.
  pub max_output_file_bytes: u64,
  /// Maximum number of open file descriptors, applied via `RLIMIT_NOFILE`.
  pub max_fds: u64,

  /// Window between SIGTERM and SIGKILL when tearing down an uncooperative
  /// process group.
  pub sigterm_grace_ms: u64,
  /// Window after SIGKILL before the group is assumed gone regardless.
  pub sigkill_grace_ms: u64,

  /// Grace added to `time_limit_seconds` before the wall-clock deadline
  /// fires, to let a CPU-bound `SIGXCPU` classification win the race.
  pub deadline_grace_ms: u64,
}

impl Default for HostConfig {
  fn default() -> Self {
    Self {
      packages_root: PathBuf::from("/var/lib/codecrucible/packages"),
      sandbox_helper_path: PathBuf::from("/usr/bin/bwrap"),
      use_sandbox: true,
      workspace_root: PathBuf::from("/var/lib/codecrucible/workspaces"),

      default_time_limit_seconds: 5.0,
      max_time_limit_seconds: 60.0,

      default_memory_mb: 256,
      max_memory_mb: 4096,

      default_processes: 1,
      max_processes: 64,

      max_files: 32,
      max_file_bytes: 4 * 1024 * 1024,
      max_total_bytes: 16 * 1024 * 1024,
      max_stdin_bytes: 4 * 1024 * 1024,
      max_args: 32,
      max_name_len: 255,

      max_stdout_bytes: 256 * 1024,
      max_stderr_bytes: 256 * 1024,

      max_output_file_bytes: 16 * 1024 * 1024,
      max_fds: 64,

      sigterm_grace_ms: 300,
      sigkill_grace_ms: 200,
      deadline_grace_ms: 250,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_internally_consistent() {
    let config = HostConfig::default();

    assert!(config.default_time_limit_seconds <= config.max_time_limit_seconds);
    assert!(config.default_memory_mb <= config.max_memory_mb);
    assert!(config.default_processes <= config.max_processes);
  }
}
