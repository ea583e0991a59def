//! Bounded retry around remote calls.

use crate::remote::{RemoteAccountService, RemoteError, RemoteResult};
use tracing::{debug, warn};

/// Retries remote calls whose session expired.
///
/// Connection failures and remote faults abort at once. An expired session
/// is reset and the call retried, up to `max_attempts` calls in total. The
/// session is also reset whenever the call is given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` calls; zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` against `remote`. `what` names the call in logs.
    pub fn run<R, T, F>(&self, remote: &mut R, what: &str, mut op: F) -> RemoteResult<T>
    where
        R: RemoteAccountService + ?Sized,
        F: FnMut(&mut R) -> RemoteResult<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(call = what, attempt, "remote call");
            match op(remote) {
                Ok(value) => return Ok(value),
                Err(RemoteError::AuthExpired) if attempt < self.max_attempts => {
                    warn!(call = what, attempt, "remote session expired, retrying");
                    remote.reset_session();
                }
                Err(e) => {
                    warn!(call = what, attempt, error = %e, "remote call failed");
                    remote.reset_session();
                    return Err(e);
                }
            }
        }
    }
}
