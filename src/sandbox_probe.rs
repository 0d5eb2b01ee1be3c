use super::*;

/// Result of probing the sandbox helper: which mode is actually usable, and
/// (if `Direct`) why, for the health surface.
#[derive(Debug, Clone)]
pub struct ProbeResult {
  pub mode: SandboxMode,
  pub probe_error: Option<String>,
}

/// Detects whether the namespace-based sandbox is actually usable on this
/// host, once, and caches the answer for the process lifetime. Installation
/// of the helper binary is not evidence of function: containerized or WSL
/// hosts often install `bwrap` but cannot create user namespaces.
#[derive(Debug)]
pub struct SandboxProbe {
  result: ProbeResult,
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

impl SandboxProbe {
  /// Runs the probe once. `config.use_sandbox = false` short-circuits to
  /// `Direct` without touching the filesystem or spawning anything.
  pub async fn probe(config: &HostConfig) -> Self {
    if !config.use_sandbox {
      return Self {
        result: ProbeResult {
          mode: SandboxMode::Direct,
          probe_error: Some("sandbox disabled by configuration".to_string()),
        },
      };
    }

    let result = Self::run_probe(&config.sandbox_helper_path).await;
    Self { result }
  }

  async fn run_probe(helper_path: &Path) -> ProbeResult {
    let metadata = match fs::metadata(helper_path) {
      Ok(metadata) => metadata,
      Err(error) => {
        return ProbeResult {
          mode: SandboxMode::Direct,
          probe_error: Some(format!("sandbox helper {}: {error}", helper_path.display())),
        };
      }
    };

    if metadata.permissions().mode() & 0o111 == 0 {
      return ProbeResult {
        mode: SandboxMode::Direct,
        probe_error: Some(format!(
          "sandbox helper {} is not executable",
          helper_path.display()
        )),
      };
    }

    let mut command = Command::new(helper_path);
    command
      .args([
        "--unshare-user",
        "--unshare-pid",
        "--unshare-net",
        "--die-with-parent",
        "/bin/true",
      ])
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped());

    let mut child = match command.spawn() {
      Ok(child) => child,
      Err(error) => {
        return ProbeResult {
          mode: SandboxMode::Direct,
          probe_error: Some(format!("failed to spawn sandbox helper: {error}")),
        };
      }
    };

    let stderr = child.stderr.take();

    match timeout(PROBE_TIMEOUT, child.wait()).await {
      Ok(Ok(status)) if status.success() => ProbeResult {
        mode: SandboxMode::Namespaced,
        probe_error: None,
      },
      Ok(Ok(status)) => {
        let stderr_text = read_stderr(stderr).await;
        ProbeResult {
          mode: SandboxMode::Direct,
          probe_error: Some(format!("sandbox probe exited {status}: {stderr_text}")),
        }
      }
      Ok(Err(error)) => ProbeResult {
        mode: SandboxMode::Direct,
        probe_error: Some(format!("sandbox probe wait failed: {error}")),
      },
      Err(_) => {
        let _ = child.start_kill();
        ProbeResult {
          mode: SandboxMode::Direct,
          probe_error: Some("sandbox probe timed out".to_string()),
        }
      }
    }
  }

  pub fn mode(&self) -> SandboxMode {
    self.result.mode
  }

  pub fn probe_error(&self) -> Option<&str> {
    self.result.probe_error.as_deref()
  }
}

async fn read_stderr(stderr: Option<tokio::process::ChildStderr>) -> String {
  let Some(mut stderr) = stderr else {
    return String::new();
  };

  let mut buffer = Vec::new();
  if tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut buffer)
    .await
    .is_err()
  {
    return String::new();
  }

  String::from_utf8_lossy(&buffer).into_owned()
}
