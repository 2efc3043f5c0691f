//! Cached, lazily re-evaluated per-sample computations.
//!
//! A [`Task`] wraps one value an adapter needs at every sample (a transform,
//! a buffer of rest points...). It decides whether its compute closure has
//! to run again at a given time and remembers whether the last run produced
//! a value.

use std::fmt;

use crate::time::TimeCode;

/// Activation state of a [`Task`].
///
/// Active tasks only run once something downstream marks them required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    #[default]
    Inactive,
    ActiveNotRequired,
    ActiveRequired,
}

#[derive(Debug, Clone)]
pub struct Task<T> {
    state: TaskState,
    might_be_time_varying: bool,
    is_first_sample: bool,
    has_sample_at_current_time: bool,
    value: Option<T>,
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self {
            state: TaskState::Inactive,
            might_be_time_varying: false,
            is_first_sample: true,
            has_sample_at_current_time: false,
            value: None,
        }
    }
}

impl<T> Task<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn set_active(&mut self, active: bool, required: bool) {
        self.state = match (active, required) {
            (false, _) => TaskState::Inactive,
            (true, false) => TaskState::ActiveNotRequired,
            (true, true) => TaskState::ActiveRequired,
        };
    }

    /// Changes the required bit of an active task; inactive tasks stay inactive.
    pub fn set_required(&mut self, required: bool) {
        if self.state != TaskState::Inactive {
            self.set_active(true, required);
        }
    }

    pub fn set_might_be_time_varying(&mut self, varying: bool) {
        self.might_be_time_varying = varying;
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != TaskState::Inactive
    }

    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.state == TaskState::ActiveRequired
    }

    #[inline]
    #[must_use]
    pub fn might_be_time_varying(&self) -> bool {
        self.might_be_time_varying
    }

    #[inline]
    #[must_use]
    pub fn has_sample_at_current_time(&self) -> bool {
        self.has_sample_at_current_time
    }

    /// Runs `compute` if needed and reports whether a value is available.
    ///
    /// Does nothing unless the task is active and required. The closure runs
    /// when the value might vary, on the first numeric sample, and always at
    /// the default time; otherwise the previous result is reused.
    pub fn run<F>(&mut self, time: TimeCode, compute: F) -> bool
    where
        F: FnOnce(TimeCode) -> Option<T>,
    {
        if !self.is_required() {
            return false;
        }

        if self.might_be_time_varying || self.is_first_sample || time.is_default() {
            match compute(time) {
                Some(value) => {
                    self.value = Some(value);
                    self.has_sample_at_current_time = true;
                }
                None => self.has_sample_at_current_time = false,
            }
            if time.is_numeric() {
                self.is_first_sample = false;
            }
        }
        self.has_sample_at_current_time
    }

    /// The value computed by the last successful run, if the most recent
    /// run succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        if self.has_sample_at_current_time {
            self.value.as_ref()
        } else {
            None
        }
    }
}

impl<T> fmt::Display for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}, mightBeTimeVarying={}]",
            self.state, self.might_be_time_varying
        )
    }
}
