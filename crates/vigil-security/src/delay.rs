//! Progressive failed-authentication delays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::Seconds;

/// How the delay grows with repeated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayEscalation {
    /// Always the base delay.
    Constant,
    /// `base^N`.
    Linear,
    /// `base^(N²)`.
    Quadratic,
}

/// Failed-authentication delay policy, configured separately for users
/// and devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAuthDelay {
    /// Base delay time, in seconds.
    pub base: Seconds,
    /// Delay growth curve.
    pub escalation: DelayEscalation,
    /// Failed attempts before the account is locked outright; zero means
    /// unlimited attempts.
    pub max_attempts: u32,
    /// Leading failures that incur no delay.
    pub ignored_attempts: u32,
}

impl FailedAuthDelay {
    /// Delay after `failed_attempts` consecutive failures, in seconds.
    ///
    /// Attempts within the ignored prefix incur no delay; past it the
    /// exponent counts attempts beyond the prefix, so the first delayed
    /// attempt gets `base^1` under linear escalation. Overflow saturates
    /// at the maximum representable delay.
    pub fn delay_for(&self, failed_attempts: u32) -> Seconds {
        if failed_attempts <= self.ignored_attempts {
            return 0;
        }
        let exponent = failed_attempts - self.ignored_attempts;

        match self.escalation {
            DelayEscalation::Constant => self.base,
            DelayEscalation::Linear => self.base.checked_pow(exponent).unwrap_or_else(|| {
                tracing::error!(
                    base = self.base,
                    exponent,
                    "delay calculation overflowed; clamping to the maximum"
                );
                Seconds::MAX
            }),
            DelayEscalation::Quadratic => {
                let squared = exponent.checked_mul(exponent).unwrap_or(u32::MAX);
                self.base.checked_pow(squared).unwrap_or_else(|| {
                    tracing::error!(
                        base = self.base,
                        exponent = squared,
                        "delay calculation overflowed; clamping to the maximum"
                    );
                    Seconds::MAX
                })
            }
        }
    }

    /// Whether `failed_attempts` failures trip the permanent lock.
    pub fn locks_after(&self, failed_attempts: u32) -> bool {
        self.max_attempts != 0 && failed_attempts >= self.max_attempts
    }
}

/// Remaining wait before the next attempt is allowed, in seconds.
///
/// Informational only; the allow/deny decision compares timestamps
/// directly.
pub(crate) fn delay_remaining(
    last_failed_at: DateTime<Utc>,
    full_delay: Seconds,
    now: DateTime<Utc>,
) -> Seconds {
    let elapsed = (now - last_failed_at).num_seconds();
    if elapsed < 0 {
        tracing::warn!("last failed attempt is in the future; reporting the full delay");
        return full_delay;
    }
    full_delay.saturating_sub(elapsed as Seconds)
}
