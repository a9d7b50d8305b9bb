//! Bounded waiting on names that are already taken.
//!
//! Both the staging allocator and the unpackager claim a path with an atomic create-if-absent
//! operation. When the path exists the caller waits and tries again for as long as the
//! [`RetryPolicy`] allows. [`FixedIntervalRetry`] is the policy used unless another one is
//! injected.

use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use parcel_config::RetryConfig;
pub use retry_policies::{RetryDecision, RetryPolicy};

/// Retries a fixed number of times with a constant pause in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIntervalRetry {
    max_retries: u32,
    interval: Duration,
}

impl FixedIntervalRetry {
    /// Retry at most `max_retries` times, waiting `interval` before every retry.
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// The maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The pause before every retry.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedIntervalRetry {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for FixedIntervalRetry {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries(), config.wait_interval())
    }
}

impl RetryPolicy for FixedIntervalRetry {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::Retry {
            execute_after: SystemTime::now() + self.interval,
        }
    }
}

/// Outcome of [`retry_on_collision`] when it does not succeed.
#[derive(Debug)]
pub enum CollisionError {
    /// The path was still taken when the policy stopped retrying.
    Exhausted {
        /// The contested path.
        path: PathBuf,
        /// Retries made after the first attempt.
        retries: u32,
    },
    /// Any error other than the path already existing. These are never retried.
    Io(io::Error),
}

/// Calls `attempt` until it succeeds, fails with anything but [`io::ErrorKind::AlreadyExists`],
/// or `policy` refuses another retry. The calling thread sleeps between attempts.
pub fn retry_on_collision<T, P>(
    policy: &P,
    target: &Path,
    mut attempt: impl FnMut() -> io::Result<T>,
) -> Result<T, CollisionError>
where
    P: RetryPolicy + ?Sized,
{
    let start = SystemTime::now();
    let mut n_past_retries = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(CollisionError::Io(err)),
        }

        let execute_after = match policy.should_retry(start, n_past_retries) {
            RetryDecision::Retry { execute_after } => execute_after,
            RetryDecision::DoNotRetry => {
                tracing::warn!(
                    "'{}' is still in use after {} retries, giving up",
                    target.display(),
                    n_past_retries
                );
                return Err(CollisionError::Exhausted {
                    path: target.to_path_buf(),
                    retries: n_past_retries,
                });
            }
        };
        let duration = execute_after
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);

        n_past_retries += 1;
        tracing::warn!(
            "'{}' is in use by another operation. Retry #{}, sleeping {:?} until the next attempt...",
            target.display(),
            n_past_retries,
            duration
        );
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    /// Wraps a policy and counts how often it was asked.
    #[derive(Default)]
    pub(crate) struct CountingPolicy {
        pub(crate) inner: FixedIntervalRetry,
        pub(crate) asked: AtomicU32,
    }

    impl CountingPolicy {
        pub(crate) fn new(max_retries: u32, interval: Duration) -> Self {
            Self {
                inner: FixedIntervalRetry::new(max_retries, interval),
                asked: AtomicU32::new(0),
            }
        }
    }

    impl RetryPolicy for CountingPolicy {
        fn should_retry(&self, start: SystemTime, n_past_retries: u32) -> RetryDecision {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.inner.should_retry(start, n_past_retries)
        }
    }

    fn collision() -> io::Error {
        io::Error::new(io::ErrorKind::AlreadyExists, "taken")
    }

    #[test]
    fn test_default_policy_matches_config_defaults() {
        let policy = FixedIntervalRetry::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_fixed_interval_decisions() {
        let policy = FixedIntervalRetry::new(3, Duration::from_secs(5));
        let now = SystemTime::now();
        for n in 0..3 {
            assert_matches!(
                policy.should_retry(now, n),
                RetryDecision::Retry { execute_after } if execute_after >= now + Duration::from_secs(5)
            );
        }
        assert_matches!(policy.should_retry(now, 3), RetryDecision::DoNotRetry);
    }

    #[test]
    fn test_gives_up_after_exactly_max_retries() {
        let interval = Duration::from_millis(20);
        let policy = CountingPolicy::new(3, interval);
        let mut attempts = 0;

        let started = Instant::now();
        let result: Result<(), _> = retry_on_collision(&policy, Path::new("taken"), || {
            attempts += 1;
            Err(collision())
        });

        assert_matches!(
            result,
            Err(CollisionError::Exhausted { retries: 3, .. })
        );
        assert_eq!(attempts, 4);
        assert_eq!(policy.asked.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= interval * 3);
    }

    #[test]
    fn test_succeeds_once_the_name_is_free() {
        let policy = FixedIntervalRetry::new(3, Duration::ZERO);
        let mut attempts = 0;
        let result = retry_on_collision(&policy, Path::new("taken"), || {
            attempts += 1;
            if attempts < 3 {
                Err(collision())
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let policy = CountingPolicy::new(3, Duration::ZERO);
        let result: Result<(), _> = retry_on_collision(&policy, Path::new("denied"), || {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        assert_matches!(result, Err(CollisionError::Io(err)) if err.kind() == io::ErrorKind::PermissionDenied);
        assert_eq!(policy.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_retries_fails_on_first_collision() {
        let policy = FixedIntervalRetry::new(0, Duration::from_secs(60));
        let result: Result<(), _> =
            retry_on_collision(&policy, Path::new("taken"), || Err(collision()));
        assert_matches!(result, Err(CollisionError::Exhausted { retries: 0, .. }));
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_collisions_are_logged() {
        let policy = FixedIntervalRetry::new(1, Duration::ZERO);
        let _ = retry_on_collision(&policy, Path::new("busy.txt"), || -> io::Result<()> {
            Err(collision())
        });
        assert!(logs_contain("Retry #1"));
        assert!(logs_contain("giving up"));
    }
}
