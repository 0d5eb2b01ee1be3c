use super::*;

/// One row of the static language table. Adding a language means adding one
/// entry here; `Executor` and `SandboxProbe` need no change.
#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
  pub language: &'static str,
  pub interpreter: &'static str,
  pub entry_must_be_executable: bool,
  pub env_overrides: &'static [(&'static str, &'static str)],
  argv_builder: fn(&Path, &[String]) -> Vec<String>,
}

fn script_argv(entry_file: &Path, args: &[String]) -> Vec<String> {
  let mut argv = vec![entry_file.display().to_string()];
  argv.extend(args.iter().cloned());
  argv
}

/// The static language table. Each row names the generic interpreter
/// binary name expected under `<packages_root>/<language>/<version>/bin/`.
pub const LANGUAGES: &[LanguageSpec] = &[
  LanguageSpec {
    language: "python",
    interpreter: "python3",
    entry_must_be_executable: false,
    env_overrides: &[
      ("PYTHONDONTWRITEBYTECODE", "1"),
      ("PYTHONUNBUFFERED", "1"),
    ],
    argv_builder: script_argv,
  },
  LanguageSpec {
    language: "node",
    interpreter: "node",
    entry_must_be_executable: false,
    env_overrides: &[],
    argv_builder: script_argv,
  },
  LanguageSpec {
    language: "bash",
    interpreter: "bash",
    entry_must_be_executable: false,
    env_overrides: &[],
    argv_builder: script_argv,
  },
  LanguageSpec {
    language: "ruby",
    interpreter: "ruby",
    entry_must_be_executable: false,
    env_overrides: &[],
    argv_builder: script_argv,
  },
];

/// Enumerates runtimes installed on disk and resolves a (language, version)
/// request to a concrete interpreter. Built once at startup and shared
/// read-only thereafter.
#[derive(Debug)]
pub struct RuntimeRegistry {
  packages_root: PathBuf,
  /// language -> installed versions in ascending string order, so the last
  /// entry is the lexicographically-greatest, not necessarily the newest.
  installed: HashMap<&'static str, Vec<String>>,
}

impl RuntimeRegistry {
  /// Scans `packages_root` for installed runtimes. Never fails: a language
  /// with no installed versions simply resolves no requests for it.
  pub fn scan(packages_root: impl Into<PathBuf>) -> Self {
    let packages_root = packages_root.into();
    let mut installed = HashMap::with_capacity(LANGUAGES.len());

    for spec in LANGUAGES {
      let mut versions = Vec::new();
      let language_dir = packages_root.join(spec.language);

      if let Ok(entries) = fs::read_dir(&language_dir) {
        for entry in entries.flatten() {
          let Ok(file_type) = entry.file_type() else {
            continue;
          };

          if !file_type.is_dir() {
            continue;
          }

          let Some(version) = entry.file_name().to_str().map(str::to_string) else {
            continue;
          };

          if interpreter_path(&language_dir, &version, spec.interpreter).is_some() {
            versions.push(version);
          }
        }
      }

      versions.sort();
      installed.insert(spec.language, versions);
    }

    Self {
      packages_root,
      installed,
    }
  }

  /// Reflects on-disk state as of the last scan. Pure; does not re-read
  /// the filesystem.
  pub fn list_runtimes(&self) -> Vec<(&'static str, Vec<String>)> {
    LANGUAGES
      .iter()
      .map(|spec| (spec.language, self.installed[spec.language].clone()))
      .collect()
  }

  pub fn refresh(&mut self) {
    *self = Self::scan(self.packages_root.clone());
  }

  /// Resolves a (language, version) request per spec §4.1: exact match
  /// first, then the lexicographically-greatest installed version whose
  /// string begins with `version + "."` or equals `version`.
  pub fn resolve(&self, language: &str, version: &str) -> Result<RuntimeDescriptor> {
    let spec = LANGUAGES
      .iter()
      .find(|spec| spec.language == language)
      .ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))?;

    let versions = &self.installed[spec.language];
    let language_dir = self.packages_root.join(spec.language);

    let resolved_version = versions
      .iter()
      .find(|installed| installed.as_str() == version)
      .or_else(|| {
        let prefix = format!("{version}.");
        versions
          .iter()
          .rev()
          .find(|installed| installed.starts_with(&prefix))
      })
      .ok_or_else(|| Error::RuntimeNotFound {
        language: language.to_string(),
        version: version.to_string(),
      })?;

    let interpreter_path = interpreter_path(&language_dir, resolved_version, spec.interpreter)
      .ok_or_else(|| Error::RuntimeNotFound {
        language: language.to_string(),
        version: version.to_string(),
      })?;

    Ok(RuntimeDescriptor::new(
      spec.language.to_string(),
      resolved_version.clone(),
      interpreter_path,
      spec.entry_must_be_executable,
      spec.env_overrides,
      spec.argv_builder,
    ))
  }
}

fn interpreter_path(language_dir: &Path, version: &str, interpreter: &str) -> Option<PathBuf> {
  let candidate = language_dir.join(version).join("bin").join(interpreter);

  let metadata = fs::metadata(&candidate).ok()?;

  if !metadata.is_file() {
    return None;
  }

  if metadata.permissions().mode() & 0o111 == 0 {
    return None;
  }

  Some(candidate)
}
