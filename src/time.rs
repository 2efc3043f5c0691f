//! Time codes, bake intervals and sorted time-list helpers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in time at which an attribute can be evaluated.
///
/// `Default` is the distinguished non-numeric time that selects an
/// attribute's authored default value. It orders before every numeric time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimeCode {
    Default,
    Numeric(f64),
}

impl TimeCode {
    #[inline]
    #[must_use]
    pub fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Returns the numeric value, or `None` for the default time.
    #[inline]
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Default => None,
            Self::Numeric(t) => Some(t),
        }
    }
}

impl From<f64> for TimeCode {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Default, Self::Default) => Some(Ordering::Equal),
            (Self::Default, Self::Numeric(_)) => Some(Ordering::Less),
            (Self::Numeric(_), Self::Default) => Some(Ordering::Greater),
            (Self::Numeric(a), Self::Numeric(b)) => a.partial_cmp(b),
        }
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("DEFAULT"),
            Self::Numeric(t) => write!(f, "{t}"),
        }
    }
}

/// Closed interval `[min, max]` of numeric time codes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.is_nan() || self.max.is_nan() || self.min > self.max
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.min && t <= self.max
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Appends `samples` restricted to `interval` onto `times`.
///
/// When `samples` is non-empty both interval endpoints are appended as well,
/// so an attribute sampled outside the interval still contributes its
/// clamped value at the boundaries. Samples at or beyond an endpoint collapse
/// onto it. The output is unsorted; call [`sort_dedup`] afterwards.
pub fn insert_times_in_interval(interval: &Interval, samples: &[f64], times: &mut Vec<f64>) {
    if samples.is_empty() || interval.is_empty() {
        return;
    }
    times.reserve(samples.len() + 2);
    times.push(interval.min);
    times.extend(
        samples
            .iter()
            .copied()
            .filter(|&t| t > interval.min && t < interval.max),
    );
    times.push(interval.max);
}

/// Sorts ascending and removes exact duplicates.
pub fn sort_dedup(times: &mut Vec<f64>) {
    times.sort_by(f64::total_cmp);
    times.dedup();
}

/// Merges two sorted, deduplicated lists into their sorted union.
#[must_use]
pub fn union_times(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].total_cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
