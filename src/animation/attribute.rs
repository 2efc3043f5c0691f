use crate::animation::values::Interpolate;
use crate::time::TimeCode;

/// A time-sampled value with an optional default.
///
/// Numeric evaluation linearly blends between the bracketing samples and
/// clamps to the first/last sample outside the sampled range. Evaluating at
/// [`TimeCode::Default`] only ever returns the authored default value.
#[derive(Debug, Clone)]
pub struct Attribute<T> {
    default: Option<T>,
    times: Vec<f64>,
    values: Vec<T>,
}

impl<T> Default for Attribute<T> {
    fn default() -> Self {
        Self {
            default: None,
            times: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T: Interpolate> Attribute<T> {
    /// An attribute with no authored opinion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An attribute holding a single default value and no samples.
    #[must_use]
    pub fn uniform(value: T) -> Self {
        Self {
            default: Some(value),
            ..Self::default()
        }
    }

    /// Builds an attribute from `(time, value)` samples in any order.
    /// A later sample at an already used time replaces the earlier one.
    #[must_use]
    pub fn from_samples(samples: impl IntoIterator<Item = (f64, T)>) -> Self {
        let mut attr = Self::default();
        for (time, value) in samples {
            attr.set(time, value);
        }
        attr
    }

    #[must_use]
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    pub fn set_default(&mut self, value: T) {
        self.default = Some(value);
    }

    /// Inserts or replaces the sample at `time`, keeping samples sorted.
    pub fn set(&mut self, time: f64, value: T) {
        let index = self.times.partition_point(|&t| t < time);
        if self.times.get(index) == Some(&time) {
            self.values[index] = value;
        } else {
            self.times.insert(index, time);
            self.values.insert(index, value);
        }
    }

    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn time_samples(&self) -> &[f64] {
        &self.times
    }

    #[inline]
    #[must_use]
    pub fn has_authored_value(&self) -> bool {
        self.default.is_some() || !self.times.is_empty()
    }

    /// True when more than one sample is authored.
    #[inline]
    #[must_use]
    pub fn value_might_be_time_varying(&self) -> bool {
        self.times.len() > 1
    }

    #[must_use]
    pub fn get(&self, time: TimeCode) -> Option<T> {
        match time {
            TimeCode::Default => self.default.clone(),
            TimeCode::Numeric(_) if self.times.is_empty() => self.default.clone(),
            TimeCode::Numeric(t) => Some(self.sample(t)),
        }
    }

    fn sample(&self, time: f64) -> T {
        let len = self.times.len();
        // partition_point finds the first index where t > time, i.e. the next sample
        let next = self.times.partition_point(|&t| t <= time);

        if next == 0 {
            return self.values[0].clone();
        }
        if next >= len {
            return self.values[len - 1].clone();
        }

        let index = next - 1;
        let t0 = self.times[index];
        let t1 = self.times[next];
        let dt = t1 - t0;

        let t = if dt > 1e-12 { (time - t0) / dt } else { 0.0 };
        let t = t.clamp(0.0, 1.0);

        T::interpolate(&self.values[index], &self.values[next], t)
    }
}
