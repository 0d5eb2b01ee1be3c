use super::*;

#[derive(Debug, Default, PartialEq)]
pub struct MountOptions {
  /// Allow access to character and block devices.
  pub allow_devices: bool,

  /// Instead of binding a directory, mount a device-less filesystem called
  /// `inside_path`.
  ///
  /// For example, this can be `proc` or `sysfs`.
  pub filesystem: Option<String>,

  /// Disallow execution of binaries.
  pub no_exec: bool,

  /// Do not bind recursively.
  ///
  /// Without this option, mount points in the outside directory tree are
  /// automatically propagated to the sandbox.
  pub no_recursive: bool,

  /// Silently ignore the mount if the directory to be bound does not exist.
  pub optional: bool,

  /// Allow read-write access.
  pub read_write: bool,

  /// Bind a freshly created temporary directory writeable for the sandbox
  /// user.
  ///
  /// Accepts no `outside_path`, implies `rw`.
  pub temporary: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct Mount {
  /// Path inside the sandbox where the directory will be mounted.
  inside_path: PathBuf,
  /// Path outside the sandbox to be mounted.
  outside_path: Option<PathBuf>,
  /// Mount options for this directory.
  options: MountOptions,
}

impl Mount {
  pub fn new(
    inside_path: impl AsRef<Path>,
    outside_path: Option<impl AsRef<Path>>,
    options: MountOptions,
  ) -> Result<Self> {
    let inside_path = inside_path.as_ref();

    if options.temporary && outside_path.is_some() {
      return Err(Error::Mount(
        "temporary directory cannot have an outside path".to_string(),
      ));
    }

    let read_write = if options.temporary {
      true
    } else {
      options.read_write
    };

    Ok(Self {
      inside_path: inside_path.to_path_buf(),
      outside_path: outside_path.map(|p| p.as_ref().to_path_buf()),
      options: MountOptions {
        read_write,
        ..options
      },
    })
  }

  pub fn read_only(inside: impl AsRef<Path>, outside: Option<impl AsRef<Path>>) -> Result<Self> {
    Self::new(inside, outside, MountOptions::default())
  }

  pub fn read_write(inside: impl AsRef<Path>, outside: Option<impl AsRef<Path>>) -> Result<Self> {
    Self::new(
      inside,
      outside,
      MountOptions {
        read_write: true,
        ..Default::default()
      },
    )
  }

  pub fn device(inside: impl AsRef<Path>, outside: Option<impl AsRef<Path>>) -> Result<Self> {
    Self::new(
      inside,
      outside,
      MountOptions {
        allow_devices: true,
        ..Default::default()
      },
    )
  }

  pub fn temporary(inside: impl AsRef<Path>) -> Result<Self> {
    Self::new(
      inside,
      None::<&Path>,
      MountOptions {
        temporary: true,
        read_write: true,
        ..Default::default()
      },
    )
  }

  pub fn filesystem(inside: impl AsRef<Path>, fs_type: impl Into<String>) -> Result<Self> {
    Self::new(
      inside,
      None::<&Path>,
      MountOptions {
        filesystem: Some(fs_type.into()),
        ..Default::default()
      },
    )
  }

  pub fn optional(inside: impl AsRef<Path>, outside: Option<impl AsRef<Path>>) -> Result<Self> {
    Self::new(
      inside,
      outside,
      MountOptions {
        optional: true,
        ..Default::default()
      },
    )
  }

  /// Renders this rule as the `bwrap` flags that implement it.
  pub fn to_bwrap_args(&self) -> Vec<String> {
    let inside = self.inside_path.display().to_string();

    if self.options.temporary {
      return vec!["--tmpfs".to_string(), inside];
    }

    if let Some(fs_type) = &self.options.filesystem {
      let flag = match fs_type.as_str() {
        "proc" => "--proc",
        "dev" => "--dev",
        _ => "--tmpfs",
      };
      return vec![flag.to_string(), inside];
    }

    let outside = self
      .outside_path
      .as_ref()
      .expect("non-filesystem, non-temporary mount must have an outside path")
      .display()
      .to_string();

    let flag = match (
      self.options.allow_devices,
      self.options.read_write,
      self.options.optional,
    ) {
      (true, _, _) => "--dev-bind",
      (false, true, false) => "--bind",
      (false, true, true) => "--bind-try",
      (false, false, false) => "--ro-bind",
      (false, false, true) => "--ro-bind-try",
    };

    vec![flag.to_string(), outside, inside]
  }
}
