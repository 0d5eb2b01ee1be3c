use super::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  Inherit,
  Clear,
  Set(String),
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Inherit => write!(f, "inherit"),
      Action::Clear => write!(f, "clear"),
      Action::Set(value) => write!(f, "set({})", value),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
  pub key: String,
  pub action: Action,
}

impl Variable {
  pub fn new(key: impl Into<String>, action: Action) -> Self {
    Self {
      key: key.into(),
      action,
    }
  }

  pub fn get_value(&self) -> Option<&str> {
    match &self.action {
      Action::Set(value) => Some(value),
      _ => None,
    }
  }

  pub fn is_clear(&self) -> bool {
    matches!(self.action, Action::Clear)
  }

  pub fn is_inherit(&self) -> bool {
    matches!(self.action, Action::Inherit)
  }

  pub fn with_set_value(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      action: Action::Set(value.into()),
    }
  }
}
