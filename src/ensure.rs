#[cfg(test)]
use super::*;

#[macro_export]
macro_rules! ensure {
  ($cond:expr, $err:expr) => {
    if !($cond) {
      return Err($err);
    }
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ensures_properly() {
    fn validate_process_limit(limit: u32, max: u32) -> Result<()> {
      ensure!(
        limit <= max,
        Error::InvalidRequest(format!("process_limit {limit} exceeds {max}"))
      );

      Ok(())
    }

    assert!(validate_process_limit(5, 10).is_ok());

    assert!(matches!(
      validate_process_limit(11, 10),
      Err(Error::InvalidRequest(_))
    ));
  }
}
