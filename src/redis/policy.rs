use std::time::Duration;

const MAX_TOTAL_RETRY_TIME: Duration = Duration::from_secs(60 * 60);
const MAX_ATTEMPTS: u32 = 10;
const BACKOFF_STEP: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_millis(3000);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Classification of the failure that triggered a reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionRefused,
    Other,
}

impl FailureKind {
    pub fn of(err: &redis::RedisError) -> Self {
        if err.is_connection_refusal() {
            FailureKind::ConnectionRefused
        } else {
            FailureKind::Other
        }
    }
}

/// Snapshot handed to the policy after each failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based count of failed attempts so far.
    pub attempt: u32,
    pub total_retry_time: Duration,
    pub failure: FailureKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    ConnectionRefused,
    RetryTimeExhausted,
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalReason::ConnectionRefused => write!(f, "the server refused the connection"),
            FatalReason::RetryTimeExhausted => write!(f, "retry time exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Give up and surface the reason as an error.
    Fatal(FatalReason),
    /// Give up silently; the link stays disconnected.
    Stop,
}

/// Linear backoff with three stop conditions, checked in order:
/// refused connection, total retry time, attempt count.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_total_retry_time: Duration,
    pub max_attempts: u32,
    pub step: Duration,
    pub max_delay: Duration,
    /// Upper bound for a single connection attempt.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_total_retry_time: MAX_TOTAL_RETRY_TIME,
            max_attempts: MAX_ATTEMPTS,
            step: BACKOFF_STEP,
            max_delay: MAX_BACKOFF,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ReconnectPolicy {
    pub fn decide(&self, state: &RetryState) -> ReconnectDecision {
        if state.failure == FailureKind::ConnectionRefused {
            return ReconnectDecision::Fatal(FatalReason::ConnectionRefused);
        }
        if state.total_retry_time > self.max_total_retry_time {
            return ReconnectDecision::Fatal(FatalReason::RetryTimeExhausted);
        }
        if state.attempt > self.max_attempts {
            return ReconnectDecision::Stop;
        }
        ReconnectDecision::Retry(self.step.saturating_mul(state.attempt).min(self.max_delay))
    }

    /// Time allowed for the next attempt: the connect timeout, capped by
    /// whatever is left of the total retry budget.
    pub fn attempt_timeout(&self, elapsed: Duration) -> Duration {
        self.connect_timeout
            .min(self.max_total_retry_time.saturating_sub(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(attempt: u32, total_ms: u64, failure: FailureKind) -> RetryState {
        RetryState {
            attempt,
            total_retry_time: Duration::from_millis(total_ms),
            failure,
        }
    }

    #[test]
    fn backoff_grows_linearly_for_first_ten_attempts() {
        let policy = ReconnectPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=10u32 {
            let decision = policy.decide(&state(attempt, 500, FailureKind::Other));
            let expected = Duration::from_millis((u64::from(attempt) * 100).min(3000));
            assert_eq!(decision, ReconnectDecision::Retry(expected));
            assert!(expected >= previous);
            previous = expected;
        }
        assert_eq!(previous, Duration::from_millis(1000));
    }

    #[test]
    fn delay_is_capped_at_three_seconds() {
        let policy = ReconnectPolicy {
            max_attempts: 100,
            ..ReconnectPolicy::default()
        };
        assert_eq!(
            policy.decide(&state(30, 0, FailureKind::Other)),
            ReconnectDecision::Retry(Duration::from_millis(3000))
        );
        assert_eq!(
            policy.decide(&state(75, 0, FailureKind::Other)),
            ReconnectDecision::Retry(Duration::from_millis(3000))
        );
    }

    #[test]
    fn stops_after_ten_attempts() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(&state(11, 0, FailureKind::Other)),
            ReconnectDecision::Stop
        );
        for attempt in 11..=100 {
            assert_eq!(
                policy.decide(&state(attempt, 1_000, FailureKind::Other)),
                ReconnectDecision::Stop
            );
        }
    }

    #[test]
    fn refused_connection_is_fatal_on_any_attempt() {
        let policy = ReconnectPolicy::default();
        for attempt in [1, 5, 11, 500] {
            assert_eq!(
                policy.decide(&state(attempt, 0, FailureKind::ConnectionRefused)),
                ReconnectDecision::Fatal(FatalReason::ConnectionRefused)
            );
        }
        // refusal wins over an exhausted time budget
        assert_eq!(
            policy.decide(&state(3, 4_000_000, FailureKind::ConnectionRefused)),
            ReconnectDecision::Fatal(FatalReason::ConnectionRefused)
        );
    }

    #[test]
    fn retry_time_over_one_hour_is_fatal() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(&state(2, 3_600_001, FailureKind::Other)),
            ReconnectDecision::Fatal(FatalReason::RetryTimeExhausted)
        );
        assert_eq!(
            policy.decide(&state(50, 3_600_001, FailureKind::Other)),
            ReconnectDecision::Fatal(FatalReason::RetryTimeExhausted)
        );
        // exactly one hour is still within budget
        assert_eq!(
            policy.decide(&state(2, 3_600_000, FailureKind::Other)),
            ReconnectDecision::Retry(Duration::from_millis(200))
        );
    }

    #[test]
    fn attempt_timeout_is_capped_by_remaining_budget() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.attempt_timeout(Duration::ZERO),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.attempt_timeout(Duration::from_secs(3595)),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.attempt_timeout(Duration::from_secs(4000)),
            Duration::ZERO
        );
    }

    #[test]
    fn classifies_refused_io_errors() {
        let refused = redis::RedisError::from(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        ));
        let reset = redis::RedisError::from(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        ));
        assert_eq!(FailureKind::of(&refused), FailureKind::ConnectionRefused);
        assert_eq!(FailureKind::of(&reset), FailureKind::Other);
    }
}
