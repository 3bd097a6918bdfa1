use std::time::Duration;

/// Delays shorter than this are raised to it, so a misconfigured zero
/// interval cannot spin the poll loop.
pub const MIN_DELAY: Duration = Duration::from_millis(10);

/// Selects the growth curve of [`Backoff`]. Parsed from configuration strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackoffKind {
    #[default]
    Constant,
    Linear,
    Exponential,
}

/// Delay schedule between two run-status polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every poll.
    Constant { interval: Duration },
    /// `initial + step * attempt`, capped at `max`.
    Linear {
        initial: Duration,
        step: Duration,
        max: Duration,
    },
    /// `initial * factor^attempt`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Constant {
            interval: Duration::from_millis(1500),
        }
    }
}

impl Backoff {
    pub fn constant(interval: Duration) -> Self {
        Backoff::Constant { interval }
    }

    /// Build a schedule of the given kind: linear grows by `initial` per
    /// attempt, exponential doubles.
    pub fn from_kind(kind: BackoffKind, initial: Duration, max: Duration) -> Self {
        match kind {
            BackoffKind::Constant => Backoff::Constant { interval: initial },
            BackoffKind::Linear => Backoff::Linear {
                initial,
                step: initial,
                max,
            },
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                factor: 2,
                max,
            },
        }
    }

    /// Delay before poll number `attempt + 1` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let raw = match *self {
            Backoff::Constant { interval } => interval,
            Backoff::Linear { initial, step, max } => step
                .checked_mul(attempt)
                .and_then(|grown| initial.checked_add(grown))
                .map_or(max, |d| d.min(max)),
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => factor
                .checked_pow(attempt)
                .and_then(|scale| initial.checked_mul(scale))
                .map_or(max, |d| d.min(max)),
        };
        raw.max(MIN_DELAY)
    }

    /// The smallest delay the schedule will ever produce.
    pub fn min_delay(&self) -> Duration {
        match *self {
            // 0^n collapses to zero after the first attempt.
            Backoff::Exponential { factor: 0, .. } => MIN_DELAY,
            Backoff::Exponential { initial, max, .. } => initial.min(max).max(MIN_DELAY),
            _ => self.delay(0),
        }
    }
}
