use super::*;

/// Per-execution ceilings applied to the child between fork and exec.
/// Constructed by the Executor from the request and `HostConfig`, then
/// installed via [`ResourceLimiter::install`] inside a `pre_exec` closure.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimiter {
  cpu_seconds: u64,
  memory_bytes: u64,
  max_file_bytes: u64,
  max_fds: u64,
  process_limit: u64,
}

impl ResourceLimiter {
  pub fn new(request: &ExecRequest, config: &HostConfig) -> Self {
    Self {
      cpu_seconds: request.time_limit_seconds.ceil() as u64,
      memory_bytes: request.memory_limit_mb as u64 * 1024 * 1024,
      max_file_bytes: config.max_output_file_bytes,
      max_fds: config.max_fds,
      process_limit: request.process_limit as u64,
    }
  }

  /// Applies every ceiling. Must run after `fork` and before `exec` inside
  /// a `pre_exec` closure: returning `Err` here aborts the child before
  /// exec and is surfaced to the parent as `Command::spawn`'s `io::Error`,
  /// which the Executor maps to `Error::Sandbox` / `Outcome::SandboxError`.
  ///
  /// Also moves the child into its own session so signals sent to the
  /// process group reach the whole subtree.
  pub fn install(&self) -> io::Result<()> {
    setsid().map_err(nix_to_io)?;

    set_rlimit(libc::RLIMIT_CPU, self.cpu_seconds)?;
    set_rlimit(libc::RLIMIT_AS, self.memory_bytes)?;
    set_rlimit(libc::RLIMIT_FSIZE, self.max_file_bytes)?;
    set_rlimit(libc::RLIMIT_NOFILE, self.max_fds)?;
    set_rlimit(libc::RLIMIT_NPROC, self.process_limit)?;
    set_rlimit(libc::RLIMIT_CORE, 0)?;

    Ok(())
  }
}

fn set_rlimit(resource: libc::c_int, limit: u64) -> io::Result<()> {
  let rlimit = libc::rlimit {
    rlim_cur: limit,
    rlim_max: limit,
  };

  // SAFETY: `resource` is one of the RLIMIT_* constants and `rlimit` is a
  // valid, fully-initialized value on the stack for the duration of the call.
  let result = unsafe { libc::setrlimit(resource, &rlimit) };

  if result != 0 {
    return Err(io::Error::last_os_error());
  }

  Ok(())
}

fn nix_to_io(error: nix::Error) -> io::Error {
  io::Error::from_raw_os_error(error as i32)
}
