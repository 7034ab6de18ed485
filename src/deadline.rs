use crate::github_api::UsageError;
use anyhow::Result;
use std::time::{Duration, Instant};

/// Caller supplied deadline shared by every network call of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
  at: Option<Instant>,
}

impl Deadline {
  pub fn none() -> Self {
    Self { at: None }
  }

  pub fn at(at: Instant) -> Self {
    Self { at: Some(at) }
  }

  /// Unbounded when `timeout` lies beyond what `Instant` can represent.
  pub fn after(timeout: Duration) -> Self {
    Self {
      at: Instant::now().checked_add(timeout),
    }
  }

  /// Time left before the deadline, `None` when unbounded. Fails once the
  /// deadline has passed so no new request is started.
  pub fn remaining(&self) -> Result<Option<Duration>> {
    match self.at {
      None => Ok(None),
      Some(at) => {
        let now = Instant::now();
        if now >= at {
          Err(UsageError::DeadlineExceeded.into())
        } else {
          Ok(Some(at - now))
        }
      }
    }
  }
}

impl Default for Deadline {
  fn default() -> Self {
    Self::none()
  }
}

#[test]
fn unbounded() -> Result<()> {
  assert_eq!(Deadline::none().remaining()?, None);

  Ok(())
}

#[test]
fn expired() -> Result<()> {
  let err = Deadline::at(Instant::now()).remaining().unwrap_err();
  crate::check_error(err, &UsageError::DeadlineExceeded)
}

#[test]
fn still_running() -> Result<()> {
  let remaining = Deadline::after(Duration::from_secs(60)).remaining()?;
  assert!(matches!(remaining, Some(d) if d <= Duration::from_secs(60)));

  Ok(())
}

#[test]
fn huge_timeout_is_unbounded() -> Result<()> {
  let deadline = Deadline::after(Duration::from_secs(u64::MAX));
  assert_eq!(deadline, Deadline::none());
  assert_eq!(deadline.remaining()?, None);

  Ok(())
}
