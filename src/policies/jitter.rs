//! # Jitter policy for respawn delays.
//!
//! [`JitterPolicy`] adds randomness to the respawn delay so that workers
//! felled by a common cause (a bad upstream, a poisoned request replayed to
//! every process) do not all come back in the same instant.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Full`] random delay in [0, delay]
//! - [`JitterPolicy::Equal`] delay/2 + random[0, delay/2] (balanced)

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of respawn delays.
///
/// ## Trade-offs
/// - **None**: predictable, the default; a single respawning worker has no
///   herd to avoid.
/// - **Full**: maximum spreading, can cut the delay to near zero.
/// - **Equal**: preserves at least half of the configured delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// Use the exact configured delay.
    #[default]
    None,
    /// Random delay in [0, delay].
    Full,
    /// delay/2 + random[0, delay/2].
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }
}

/// Full jitter: random in [0, delay].
fn full_jitter(delay: Duration) -> Duration {
    let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// Equal jitter: delay/2 + random[0, delay/2].
fn equal_jitter(delay: Duration) -> Duration {
    let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}
