use super::*;

/// Bytes read past `cap * HARD_OVERSHOOT_MULTIPLIER` on either stream
/// escalate the outcome to `OutputExceeded` and get the child signaled,
/// per spec: "if the total bytes across both streams greatly exceeds
/// configuration, the outcome may be escalated... with the child signaled."
const HARD_OVERSHOOT_MULTIPLIER: u64 = 8;

/// Carries one request end to end: resolve runtime, materialize workspace,
/// launch, enforce ceilings, classify, tear down. Holds no per-request
/// mutable state; every execution's workspace and process tree is private
/// to that call.
pub struct Executor {
  registry: RuntimeRegistry,
  probe: SandboxProbe,
  config: HostConfig,
}

impl Executor {
  pub fn new(registry: RuntimeRegistry, probe: SandboxProbe, config: HostConfig) -> Self {
    Self {
      registry,
      probe,
      config,
    }
  }

  pub fn runtimes(&self) -> Vec<(&'static str, Vec<String>)> {
    self.registry.list_runtimes()
  }

  pub fn capabilities(&self) -> (SandboxMode, Option<&str>) {
    (self.probe.mode(), self.probe.probe_error())
  }

  /// Validates the request, resolves a runtime, and carries it through to
  /// an `ExecResult`. The workspace is guaranteed gone by the time this
  /// returns, on every exit path including an early validation failure.
  /// `cancel` is checked throughout `run`; firing it tears the execution
  /// down the same way a deadline does.
  pub async fn execute(&self, request: &ExecRequest, cancel: &CancellationToken) -> Result<ExecResult> {
    request.validate(&self.config)?;
    let runtime = self.registry.resolve(&request.language, &request.version)?;
    let workspace = Workspace::create(request, &runtime, &self.config)?;

    let span = tracing::info_span!(
      "execute",
      language = %request.language,
      resolved_version = %runtime.resolved_version,
    );

    let result = self
      .run(&workspace, &runtime, request, cancel)
      .instrument(span)
      .await;

    workspace.teardown();

    result
  }

  async fn run(
    &self,
    workspace: &Workspace,
    runtime: &RuntimeDescriptor,
    request: &ExecRequest,
    cancel: &CancellationToken,
  ) -> Result<ExecResult> {
    let mode = self.probe.mode();
    let mut command = build_command(workspace, runtime, request, mode, &self.config)?;

    let start = Instant::now();

    let mut child = match command.spawn() {
      Ok(child) => child,
      Err(error) => {
        tracing::warn!(%error, "sandboxed process failed to spawn");
        return Ok(sandbox_error_result(start));
      }
    };

    let Some(raw_pid) = child.id() else {
      return Ok(sandbox_error_result(start));
    };
    let pid = Pid::from_raw(raw_pid as i32);

    spawn_stdin_writer(&mut child, request.stdin.clone());

    let stdout = child.stdout.take().expect("stdout is piped");
    let stderr = child.stderr.take().expect("stderr is piped");

    let stdout_task = tokio::spawn(drain(stdout, self.config.max_stdout_bytes, pid));
    let stderr_task = tokio::spawn(drain(stderr, self.config.max_stderr_bytes, pid));

    let deadline_secs = request.time_limit_seconds + self.config.deadline_grace_ms as f64 / 1000.0;
    let deadline = Instant::now() + Duration::from_secs_f64(deadline_secs.max(0.0));

    let mut deadline_fired = false;
    let mut cancelled = false;

    let status = tokio::select! {
      status = child.wait() => status.map_err(|error| Error::Sandbox(format!("waiting on child: {error}")))?,
      _ = sleep_until(deadline) => {
        deadline_fired = true;
        terminate_process_group(pid, &self.config).await;
        child.wait().await.map_err(|error| Error::Sandbox(format!("waiting on signaled child: {error}")))?
      }
      _ = cancel.cancelled() => {
        cancelled = true;
        terminate_process_group(pid, &self.config).await;
        child.wait().await.map_err(|error| Error::Sandbox(format!("waiting on signaled child: {error}")))?
      }
    };

    let stdout_result = stdout_task.await.unwrap_or_default();
    let stderr_result = stderr_task.await.unwrap_or_default();

    let output_exceeded = stdout_result.exceeded || stderr_result.exceeded;
    if output_exceeded && !deadline_fired && !cancelled {
      terminate_process_group(pid, &self.config).await;
    }

    let outcome = classify(
      &status,
      deadline_fired,
      cancelled,
      output_exceeded,
      request.memory_limit_mb > 0,
    );

    Ok(ExecResult {
      stdout: stdout_result.bytes,
      stderr: stderr_result.bytes,
      stdout_truncated: stdout_result.truncated,
      stderr_truncated: stderr_result.truncated,
      exit_code: status.code(),
      termination_signal: status.signal(),
      outcome,
      wall_time_ms: start.elapsed().as_millis() as u64,
      cpu_time_ms: None,
    })
  }
}

fn sandbox_error_result(start: Instant) -> ExecResult {
  ExecResult {
    stdout: Vec::new(),
    stderr: Vec::new(),
    stdout_truncated: false,
    stderr_truncated: false,
    exit_code: None,
    termination_signal: None,
    outcome: Outcome::SandboxError,
    wall_time_ms: start.elapsed().as_millis() as u64,
    cpu_time_ms: None,
  }
}

fn spawn_stdin_writer(child: &mut Child, stdin_bytes: Option<Vec<u8>>) {
  let Some(mut stdin) = child.stdin.take() else {
    return;
  };

  match stdin_bytes {
    Some(bytes) => {
      tokio::spawn(async move {
        let _ = stdin.write_all(&bytes).await;
      });
    }
    None => drop(stdin),
  }
}

/// Classification order, first match wins, per the spec's outcome table.
/// The distinctive-preexec-failure-exit-code step is not needed here: a
/// `pre_exec` failure never reaches this function, since `Command::spawn`
/// surfaces it as an `io::Error` the caller maps straight to `SandboxError`.
/// `deadline_fired` and `cancelled` are mutually exclusive: `run`'s
/// `select!` only takes one of those two branches.
fn classify(
  status: &ExitStatus,
  deadline_fired: bool,
  cancelled: bool,
  output_exceeded: bool,
  memory_limited: bool,
) -> Outcome {
  if cancelled {
    return Outcome::Cancelled;
  }

  if deadline_fired {
    return Outcome::TimedOut;
  }

  if output_exceeded {
    return Outcome::OutputExceeded;
  }

  if let Some(signal) = status.signal() {
    if signal == libc::SIGKILL && memory_limited {
      return Outcome::MemoryExceeded;
    }

    if signal == libc::SIGXCPU {
      return Outcome::TimedOut;
    }

    return Outcome::RuntimeError {
      exit_code: None,
      signal: Some(signal),
    };
  }

  match status.code() {
    Some(0) | None => Outcome::Completed,
    Some(code) => Outcome::RuntimeError {
      exit_code: Some(code),
      signal: None,
    },
  }
}

async fn terminate_process_group(pid: Pid, config: &HostConfig) {
  let _ = killpg(pid, Signal::SIGTERM);
  sleep(Duration::from_millis(config.sigterm_grace_ms)).await;
  let _ = killpg(pid, Signal::SIGKILL);
  sleep(Duration::from_millis(config.sigkill_grace_ms)).await;
}

#[derive(Debug, Default)]
struct DrainResult {
  bytes: Vec<u8>,
  truncated: bool,
  exceeded: bool,
}

/// Reads a pipe to EOF, keeping only the first `cap` bytes but continuing
/// to consume (and discard) past that so the child never blocks on a full
/// pipe. If the raw stream keeps growing far past `cap`, signals the
/// process group directly so a runaway writer cannot stall teardown.
async fn drain(mut stream: impl tokio::io::AsyncRead + Unpin, cap: usize, pid: Pid) -> DrainResult {
  let mut buffer = Vec::with_capacity(cap.min(64 * 1024));
  let mut raw_len: u64 = 0;
  let mut chunk = [0u8; 8192];
  let mut exceeded = false;

  loop {
    match stream.read(&mut chunk).await {
      Ok(0) => break,
      Ok(n) => {
        raw_len += n as u64;

        if buffer.len() < cap {
          let remaining = cap - buffer.len();
          buffer.extend_from_slice(&chunk[..n.min(remaining)]);
        }

        if !exceeded && raw_len > cap as u64 * HARD_OVERSHOOT_MULTIPLIER {
          exceeded = true;
          let _ = killpg(pid, Signal::SIGKILL);
        }
      }
      Err(_) => break,
    }
  }

  let truncated = raw_len > cap as u64;

  if truncated {
    let boundary = last_char_boundary(&buffer, buffer.len());
    buffer.truncate(boundary);
    buffer.extend_from_slice(format!("\n...[truncated, original {raw_len} bytes]\n").as_bytes());
  }

  DrainResult {
    bytes: buffer,
    truncated,
    exceeded,
  }
}

/// Walks back from `at` while the byte is a UTF-8 continuation byte, so a
/// multi-byte code point is never split across the cut.
fn last_char_boundary(bytes: &[u8], at: usize) -> usize {
  let mut boundary = at.min(bytes.len());

  while boundary > 0 && (bytes[boundary] & 0b1100_0000) == 0b1000_0000 {
    boundary -= 1;
  }

  boundary
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status_from_code(code: i32) -> ExitStatus {
    std::process::ExitStatus::from_raw((code & 0xff) << 8)
  }

  fn status_from_signal(signal: i32) -> ExitStatus {
    std::process::ExitStatus::from_raw(signal)
  }

  #[test]
  fn cancellation_wins_over_everything() {
    let outcome = classify(&status_from_code(0), true, true, true, true);
    assert_eq!(outcome, Outcome::Cancelled);
  }

  #[test]
  fn deadline_wins_over_signal_and_output() {
    let outcome = classify(&status_from_code(0), true, false, true, true);
    assert_eq!(outcome, Outcome::TimedOut);
  }

  #[test]
  fn output_exceeded_wins_over_signal() {
    let outcome = classify(&status_from_signal(libc::SIGKILL), false, false, true, true);
    assert_eq!(outcome, Outcome::OutputExceeded);
  }

  #[test]
  fn sigkill_with_memory_limit_is_memory_exceeded() {
    let outcome = classify(&status_from_signal(libc::SIGKILL), false, false, false, true);
    assert_eq!(outcome, Outcome::MemoryExceeded);
  }

  #[test]
  fn sigkill_without_memory_limit_is_runtime_error() {
    let outcome = classify(&status_from_signal(libc::SIGKILL), false, false, false, false);
    assert_eq!(
      outcome,
      Outcome::RuntimeError {
        exit_code: None,
        signal: Some(libc::SIGKILL)
      }
    );
  }

  #[test]
  fn sigxcpu_is_timed_out() {
    let outcome = classify(&status_from_signal(libc::SIGXCPU), false, false, false, true);
    assert_eq!(outcome, Outcome::TimedOut);
  }

  #[test]
  fn nonzero_exit_is_runtime_error() {
    let outcome = classify(&status_from_code(7), false, false, false, true);
    assert_eq!(
      outcome,
      Outcome::RuntimeError {
        exit_code: Some(7),
        signal: None
      }
    );
  }

  #[test]
  fn zero_exit_is_completed() {
    let outcome = classify(&status_from_code(0), false, false, false, true);
    assert_eq!(outcome, Outcome::Completed);
  }

  #[test]
  fn truncation_cuts_at_char_boundary_and_marks_truncated() {
    let bytes = "a".repeat(10).into_bytes();
    let boundary = last_char_boundary(&bytes, 5);
    assert_eq!(boundary, 5);
  }

  #[test]
  fn truncation_backs_off_from_multibyte_character() {
    let bytes = "€€€".as_bytes().to_vec();
    // Each '€' is 3 bytes; cutting at byte 4 lands mid-character.
    let boundary = last_char_boundary(&bytes, 4);
    assert_eq!(boundary, 3);
  }

  #[tokio::test]
  async fn drain_caps_bytes_and_marks_truncated() {
    let data = vec![b'x'; 100];
    let result = drain(&data[..], 10, Pid::from_raw(std::process::id() as i32)).await;

    assert!(result.truncated);
    assert!(result.bytes.len() > 10);
    assert!(result.bytes.starts_with(b"xxxxxxxxxx"));
  }

  #[tokio::test]
  async fn drain_passes_through_short_reads() {
    let data = b"hello".to_vec();
    let result = drain(&data[..], 1024, Pid::from_raw(std::process::id() as i32)).await;

    assert!(!result.truncated);
    assert_eq!(result.bytes, b"hello".to_vec());
  }
}
