#![cfg(feature = "integration")]

//! End-to-end scenarios against real interpreters and (where installed) a
//! real `bwrap`. Requires `python3` on `PATH`; `packages_root` below
//! symlinks it into the `<packages_root>/<language>/<version>/bin/`
//! layout `RuntimeRegistry::scan` expects.

use {
  codecrucible::{Core, Error, ExecRequest, HostConfig, Outcome, SandboxMode, SubmittedFile},
  std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
  },
  tempfile::TempDir,
  tokio_util::sync::CancellationToken,
};

fn file(name: &str, content: &str) -> SubmittedFile {
  SubmittedFile {
    name: name.to_string(),
    content: content.as_bytes().to_vec(),
  }
}

fn request(files: Vec<SubmittedFile>) -> ExecRequest {
  ExecRequest {
    language: "python".into(),
    version: "3".into(),
    files,
    stdin: None,
    args: vec![],
    internet: false,
    time_limit_seconds: 2.0,
    memory_limit_mb: 256,
    process_limit: 4,
  }
}

fn which(binary: &str) -> Option<PathBuf> {
  std::env::var_os("PATH")?.to_str()?.split(':').find_map(|dir| {
    let candidate = Path::new(dir).join(binary);
    let metadata = std::fs::metadata(&candidate).ok()?;
    (metadata.is_file() && metadata.permissions().mode() & 0o111 != 0).then_some(candidate)
  })
}

/// Symlinks the host's real `python3` into a `<root>/python/3/bin/python3`
/// layout, so these tests run against whatever interpreter the CI image
/// provides instead of a packaged one. Leaks the temp dir deliberately:
/// its contents must outlive this function, and the OS reclaims it at
/// process exit.
fn packages_root() -> PathBuf {
  let real_python3 = which("python3").expect("python3 must be on PATH for integration tests");

  let temp = TempDir::new().unwrap();
  let bin_dir = temp.path().join("python/3/bin");
  std::fs::create_dir_all(&bin_dir).unwrap();
  std::os::unix::fs::symlink(&real_python3, bin_dir.join("python3")).unwrap();

  let root = temp.path().to_path_buf();
  std::mem::forget(temp);
  root
}

async fn core() -> Core {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();

  let config = HostConfig {
    packages_root: packages_root(),
    workspace_root: TempDir::new().unwrap().into_path(),
    use_sandbox: true,
    ..HostConfig::default()
  };

  Core::initialize(config).await
}

#[tokio::test]
async fn happy_path() {
  let core = core().await;

  let result = core
    .execute(&request(vec![file("main.py", "print('hi')")]), &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.outcome, Outcome::Completed);
  assert_eq!(result.exit_code, Some(0));
  assert_eq!(result.stdout, b"hi\n");
  assert_eq!(result.stderr, b"");
}

#[tokio::test]
async fn wall_timeout() {
  let core = core().await;

  let mut req = request(vec![file("m.py", "import time\ntime.sleep(5)\n")]);
  req.time_limit_seconds = 0.5;

  let result = core.execute(&req, &CancellationToken::new()).await.unwrap();

  assert_eq!(result.outcome, Outcome::TimedOut);
  assert_eq!(result.stdout, b"");
}

#[tokio::test]
async fn memory_bound() {
  let core = core().await;

  let mut req = request(vec![file("m.py", "a = bytearray(512 * 1024 * 1024)\n")]);
  req.memory_limit_mb = 64;

  let result = core.execute(&req, &CancellationToken::new()).await.unwrap();

  assert_eq!(result.outcome, Outcome::MemoryExceeded);
}

#[tokio::test]
async fn runtime_error_reports_exit_code() {
  let core = core().await;

  let result = core
    .execute(&request(vec![file("m.py", "raise SystemExit(7)\n")]), &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(
    result.outcome,
    Outcome::RuntimeError {
      exit_code: Some(7),
      signal: None
    }
  );
}

#[tokio::test]
async fn output_cap_truncates_stdout() {
  let core = core().await;

  let mut req = request(vec![file("m.py", "print('x' * 10_000_000)")]);
  req.time_limit_seconds = 5.0;

  let result = core.execute(&req, &CancellationToken::new()).await.unwrap();

  assert!(result.stdout_truncated);
  assert!(result.stdout.len() <= 256 * 1024 + 128);
}

#[tokio::test]
async fn network_denied_in_namespaced_mode() {
  let core = core().await;

  if core.capabilities().0 != SandboxMode::Namespaced {
    eprintln!("skipping: bwrap not usable on this host");
    return;
  }

  let result = core
    .execute(
      &request(vec![file(
        "m.py",
        "import socket\nsocket.create_connection(('1.1.1.1', 53), timeout=1)\n",
      )]),
      &CancellationToken::new(),
    )
    .await
    .unwrap();

  assert!(matches!(result.outcome, Outcome::RuntimeError { .. }));
}

#[tokio::test]
async fn cancellation_tears_down_before_the_deadline() {
  let core = core().await;

  let mut req = request(vec![file("m.py", "import time\ntime.sleep(5)\n")]);
  req.time_limit_seconds = 30.0;

  let cancel = CancellationToken::new();
  let canceller = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(200)).await;
    canceller.cancel();
  });

  let start = tokio::time::Instant::now();
  let result = core.execute(&req, &cancel).await.unwrap();

  assert_eq!(result.outcome, Outcome::Cancelled);
  assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn path_traversal_is_rejected_before_workspace_creation() {
  let core = core().await;

  let result = core
    .execute(&request(vec![file("../evil", "x")]), &CancellationToken::new())
    .await;

  assert!(matches!(result, Err(Error::InvalidRequest(_))));
}
