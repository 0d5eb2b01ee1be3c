mod config;
mod ensure;
mod error;
mod executor;
mod launch;
mod model;
mod mount;
mod path_ext;
mod resource_limiter;
mod runtime_registry;
mod sandbox_probe;
mod variable;
mod workspace;

pub use config::HostConfig;
pub use error::{Error, Result};
pub use executor::Executor;
pub use model::{
  ExecRequest, ExecResult, Outcome, RuntimeDescriptor, SandboxMode, SubmittedFile,
};
pub use mount::{Mount, MountOptions};
pub use runtime_registry::RuntimeRegistry;
pub use sandbox_probe::{ProbeResult, SandboxProbe};
pub use variable::{Action, Variable};

use tokio_util::sync::CancellationToken;

/// Owns the long-lived, read-only state of the service: the discovered
/// runtime table and the cached sandbox probe result. Constructed once at
/// startup; every `execute` call shares it read-only.
pub struct Core {
  executor: Executor,
}

impl Core {
  /// Scans `config.packages_root` and probes `config.sandbox_helper_path`.
  /// Both happen once; neither touches per-request state.
  pub async fn initialize(config: HostConfig) -> Self {
    let registry = RuntimeRegistry::scan(&config.packages_root);
    let probe = SandboxProbe::probe(&config).await;

    if let Some(error) = probe.probe_error() {
      tracing::warn!(%error, mode = ?probe.mode(), "sandbox probe did not confirm Namespaced mode");
    }

    Self {
      executor: Executor::new(registry, probe, config),
    }
  }

  /// Runs one request to completion. `cancel` lets the caller abort an
  /// in-flight execution (e.g. on transport disconnect): triggering it
  /// sends SIGKILL to the process group and tears down the workspace, the
  /// same as a deadline firing, and the returned result carries
  /// `Outcome::Cancelled`. Pass a token that's never cancelled if the
  /// caller has no abort signal of its own.
  pub async fn execute(&self, request: &ExecRequest, cancel: &CancellationToken) -> Result<ExecResult> {
    self.executor.execute(request, cancel).await
  }

  pub fn runtimes(&self) -> Vec<(&'static str, Vec<String>)> {
    self.executor.runtimes()
  }

  pub fn capabilities(&self) -> (SandboxMode, Option<&str>) {
    self.executor.capabilities()
  }
}
