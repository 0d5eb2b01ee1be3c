use super::*;

/// Builds the `tokio::process::Command` for one execution, either the
/// `bwrap`-style sandboxed invocation or the direct runtime invocation,
/// per the cached `SandboxMode`. `ResourceLimiter` is installed via
/// `pre_exec` in both variants: rlimits set before `execve` persist across
/// it, so limits applied to the about-to-exec helper still bind the
/// runtime process inside the sandbox.
pub fn build_command(
  workspace: &Workspace,
  runtime: &RuntimeDescriptor,
  request: &ExecRequest,
  mode: SandboxMode,
  config: &HostConfig,
) -> Result<Command> {
  let limiter = ResourceLimiter::new(request, config);

  let mut command = match mode {
    SandboxMode::Namespaced => build_namespaced(workspace, runtime, request, config)?,
    SandboxMode::Direct => {
      ensure!(
        request.internet,
        Error::Sandbox(
          "internet=false requires Namespaced mode, which is unavailable".to_string()
        )
      );
      build_direct(workspace, runtime, request)
    }
  };

  command
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  // SAFETY: the closure only calls async-signal-safe functions
  // (`setsid`, `setrlimit`) and never allocates or touches Rust-managed
  // state shared with the parent.
  unsafe {
    command.pre_exec(move || limiter.install());
  }

  Ok(command)
}

fn build_direct(workspace: &Workspace, runtime: &RuntimeDescriptor, request: &ExecRequest) -> Command {
  let argv = runtime.argv(&workspace.entry_path(), &request.args);

  let mut command = Command::new(&argv[0]);
  command.args(&argv[1..]);
  command.current_dir(workspace.root());
  apply_environment(&mut command, runtime, workspace);

  command
}

fn build_namespaced(
  workspace: &Workspace,
  runtime: &RuntimeDescriptor,
  request: &ExecRequest,
  config: &HostConfig,
) -> Result<Command> {
  const SANDBOX_APP_DIR: &str = "/app";

  let mut command = Command::new(&config.sandbox_helper_path);

  command.args([
    "--die-with-parent",
    "--new-session",
    "--unshare-user",
    "--unshare-pid",
    "--unshare-ipc",
    "--unshare-uts",
    "--unshare-cgroup",
    "--cap-drop",
    "ALL",
    "--setenv",
    "HOSTNAME",
    "sandbox",
    "--hostname",
    "sandbox",
  ]);

  if !request.internet {
    command.arg("--unshare-net");
  }

  for mount in default_mounts(workspace, runtime, config)? {
    command.args(mount.to_bwrap_args());
  }

  command.args(["--chdir", SANDBOX_APP_DIR]);
  command.arg("--");

  let entry_in_sandbox = Path::new(SANDBOX_APP_DIR).join(&request.entry_file().name);
  let argv = runtime.argv(&entry_in_sandbox, &request.args);
  command.args(&argv);

  apply_environment(&mut command, runtime, workspace);

  Ok(command)
}

fn default_mounts(workspace: &Workspace, runtime: &RuntimeDescriptor, config: &HostConfig) -> Result<Vec<Mount>> {
  // interpreter_path is .../<language>/<version>/bin/<interpreter>; bind the
  // whole version directory so the dynamic linker and any bundled stdlib
  // resolve correctly, without exposing sibling versions.
  let runtime_root = runtime
    .interpreter_path
    .parent()
    .and_then(Path::parent)
    .ok_or_else(|| Error::Internal("runtime interpreter path has no version root".to_string()))?
    .to_path_buf();

  Ok(vec![
    Mount::read_only("/usr", Some("/usr"))?,
    Mount::read_only("/bin", Some("/bin"))?,
    Mount::read_only("/lib", Some("/lib"))?,
    Mount::optional("/lib64", Some("/lib64"))?,
    Mount::optional("/etc/alternatives", Some("/etc/alternatives"))?,
    Mount::read_only(&runtime_root, Some(&runtime_root))?,
    Mount::read_only(&config.packages_root, Some(&config.packages_root))?,
    Mount::filesystem("/dev", "dev")?,
    Mount::filesystem("/proc", "proc")?,
    Mount::temporary("/tmp")?,
    Mount::read_write("/app", Some(workspace.root()))?,
  ])
}

fn apply_environment(command: &mut Command, runtime: &RuntimeDescriptor, workspace: &Workspace) {
  let bin_dir = runtime
    .interpreter_path
    .parent()
    .map(|dir| dir.display().to_string())
    .unwrap_or_default();

  let mut variables = vec![
    Variable::with_set_value("PATH", bin_dir),
    Variable::with_set_value("HOME", "/app"),
    Variable::with_set_value("LANG", "C.UTF-8"),
  ];

  for (key, value) in runtime.env_overrides {
    variables.push(Variable::with_set_value(*key, *value));
  }

  command.env_clear();
  command.current_dir(workspace.root());

  for variable in variables {
    if let Some(value) = variable.get_value() {
      command.env(&variable.key, value);
    }
  }
}

#[cfg(test)]
mod tests {
  use {super::*, assert_matches::assert_matches, tempfile::TempDir};

  fn runtime(interpreter_path: PathBuf) -> RuntimeDescriptor {
    RuntimeDescriptor::new(
      "python".into(),
      "3.11.9".into(),
      interpreter_path,
      false,
      &[("PYTHONUNBUFFERED", "1")],
      |entry, args| {
        let mut argv = vec![entry.display().to_string()];
        argv.extend(args.iter().cloned());
        argv
      },
    )
  }

  fn request() -> ExecRequest {
    ExecRequest {
      language: "python".into(),
      version: "3.11".into(),
      files: vec![SubmittedFile {
        name: "main.py".into(),
        content: b"print(1)".to_vec(),
      }],
      stdin: None,
      args: vec!["--flag".to_string()],
      internet: false,
      time_limit_seconds: 2.0,
      memory_limit_mb: 256,
      process_limit: 1,
    }
  }

  #[test]
  fn direct_mode_builds_runtime_argv() {
    let temp = TempDir::new().unwrap();
    let config = HostConfig {
      workspace_root: temp.path().to_path_buf(),
      ..HostConfig::default()
    };

    let runtime = runtime(PathBuf::from("/opt/python/3.11.9/bin/python3"));
    let workspace = Workspace::create(&request(), &runtime, &config).unwrap();

    let mut req = request();
    req.internet = true;

    let command = build_command(&workspace, &runtime, &req, SandboxMode::Direct, &config).unwrap();
    let std_command = command.as_std();

    assert_eq!(std_command.get_program(), "/opt/python/3.11.9/bin/python3");
  }

  #[test]
  fn direct_mode_refuses_internet_false() {
    let temp = TempDir::new().unwrap();
    let config = HostConfig {
      workspace_root: temp.path().to_path_buf(),
      ..HostConfig::default()
    };

    let runtime = runtime(PathBuf::from("/opt/python/3.11.9/bin/python3"));
    let workspace = Workspace::create(&request(), &runtime, &config).unwrap();

    let result = build_command(&workspace, &runtime, &request(), SandboxMode::Direct, &config);

    assert_matches!(result, Err(Error::Sandbox(_)));
  }

  #[test]
  fn namespaced_mode_invokes_helper() {
    let temp = TempDir::new().unwrap();
    let config = HostConfig {
      workspace_root: temp.path().to_path_buf(),
      sandbox_helper_path: PathBuf::from("/usr/bin/bwrap"),
      ..HostConfig::default()
    };

    let runtime = runtime(PathBuf::from("/opt/python/3.11.9/bin/python3"));
    let workspace = Workspace::create(&request(), &runtime, &config).unwrap();

    let command = build_command(&workspace, &runtime, &request(), SandboxMode::Namespaced, &config).unwrap();
    let std_command = command.as_std();

    assert_eq!(std_command.get_program(), "/usr/bin/bwrap");

    let args: Vec<_> = std_command
      .get_args()
      .map(|arg| arg.to_string_lossy().into_owned())
      .collect();

    assert!(args.contains(&"--unshare-net".to_string()));
    assert!(args.iter().any(|arg| arg == "--"));
  }
}
