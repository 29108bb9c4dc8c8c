//! Wait durations with an explicit "forever" sentinel.

use crate::error::Error;
use core::fmt;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::time::Duration;

/// How long something should wait.
///
/// Either a finite, non-negative [`Duration`] or [`WaitDuration::Forever`].
/// Operations that must eventually complete (arming a timer, a one-shot
/// wait) reject `Forever` with [`Error::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitDuration {
    /// A finite wait.
    Finite(Duration),
    /// An unbounded wait.
    Forever,
}

impl WaitDuration {
    /// The unbounded wait.
    pub const FOREVER: Self = Self::Forever;

    /// A zero-length wait.
    pub const ZERO: Self = Self::Finite(Duration::ZERO);

    /// Creates a finite wait of `millis` milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    /// Creates a finite wait of `secs` seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::Finite(Duration::from_secs(secs))
    }

    /// Returns `true` for the unbounded wait.
    #[must_use]
    pub const fn is_forever(&self) -> bool {
        matches!(self, Self::Forever)
    }

    /// Returns the finite duration, or `None` for `Forever`.
    #[must_use]
    pub const fn as_finite(&self) -> Option<Duration> {
        match self {
            Self::Finite(d) => Some(*d),
            Self::Forever => None,
        }
    }

    /// Returns the finite duration or an invalid-argument error naming `what`.
    pub(crate) fn require_finite(&self, what: &str) -> Result<Duration, Error> {
        self.as_finite()
            .ok_or_else(|| Error::invalid_argument(format!("{what} is forever, cannot await it")))
    }
}

impl From<Duration> for WaitDuration {
    fn from(duration: Duration) -> Self {
        Self::Finite(duration)
    }
}

impl fmt::Display for WaitDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forever => f.write_str("forever"),
            Self::Finite(d) if d.as_secs() > 0 && d.subsec_nanos() == 0 => write!(f, "{}s", d.as_secs()),
            Self::Finite(d) => write!(f, "{}ms", d.as_millis()),
        }
    }
}

impl FromStr for WaitDuration {
    type Err = Error;

    /// Parses `"forever"`, `"<n>ms"`, `"<n>s"`, or a bare millisecond count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("forever") {
            return Ok(Self::Forever);
        }
        let (digits, scale) = if let Some(ms) = text.strip_suffix("ms") {
            (ms, 1)
        } else if let Some(secs) = text.strip_suffix('s') {
            (secs, 1000)
        } else {
            (text, 1)
        };
        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| Error::invalid_argument(format!("not a duration: {s:?}")))?;
        value
            .checked_mul(scale)
            .map(Self::from_millis)
            .ok_or_else(|| Error::invalid_argument(format!("duration out of range: {s:?}")))
    }
}

impl<'de> Deserialize<'de> for WaitDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Self::from_millis(ms)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
