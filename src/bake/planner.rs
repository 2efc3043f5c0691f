//! Global sample-time planning.
//!
//! Every skeleton contributes the times at which its own outputs or any of
//! its targets' inputs change. The plan is the union of those times and the
//! stage playback frames, always prefixed by the default time, plus one
//! mask per skeleton marking the samples its own times contributed.

use crate::time::{Interval, TimeCode, sort_dedup, union_times};

/// Ordered sample times of a bake. Index 0 is always the default time.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTimeSet {
    times: Vec<TimeCode>,
}

impl Default for SampleTimeSet {
    fn default() -> Self {
        Self {
            times: vec![TimeCode::Default],
        }
    }
}

impl SampleTimeSet {
    #[inline]
    #[must_use]
    pub fn times(&self) -> &[TimeCode] {
        &self.times
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// True when nothing is animated and only the default time remains.
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.times.len() == 1
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<TimeCode> {
        self.times.get(index).copied()
    }

    /// Index of the numeric sample within `tolerance` of `time`.
    #[must_use]
    pub fn index_of(&self, time: f64, tolerance: f64) -> Option<usize> {
        self.times
            .iter()
            .position(|t| t.value().is_some_and(|v| (v - time).abs() <= tolerance))
    }
}

/// Sample times plus one evaluation mask per skeleton slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    pub times: SampleTimeSet,
    pub masks: Vec<Vec<bool>>,
}

impl SamplePlan {
    /// True when any skeleton has a numeric sample to evaluate.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        !self.times.is_static()
    }
}

/// Collects candidate times per skeleton and builds a [`SamplePlan`].
#[derive(Debug, Clone)]
pub struct TimeSamplePlanner {
    interval: Interval,
    playback_times: Vec<f64>,
    skeleton_times: Vec<Vec<f64>>,
}

impl TimeSamplePlanner {
    /// `playback_times` are the stage frames inside `interval`.
    #[must_use]
    pub fn new(interval: Interval, mut playback_times: Vec<f64>) -> Self {
        sort_dedup(&mut playback_times);
        Self {
            interval,
            playback_times,
            skeleton_times: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Reserves a skeleton slot and returns its index.
    pub fn add_skeleton(&mut self) -> usize {
        self.skeleton_times.push(Vec::new());
        self.skeleton_times.len() - 1
    }

    /// Candidate times of a slot; append in any order.
    pub fn candidate_times_mut(&mut self, slot: usize) -> &mut Vec<f64> {
        &mut self.skeleton_times[slot]
    }

    #[must_use]
    pub fn plan(mut self) -> SamplePlan {
        for times in &mut self.skeleton_times {
            sort_dedup(times);
        }

        let mut all_times = self.playback_times.clone();
        for times in &self.skeleton_times {
            all_times = union_times(&all_times, times);
        }

        let index_of = |t: f64| all_times.partition_point(|&x| x < t) + 1;
        let len = all_times.len() + 1;

        let mut is_animated = false;
        let mut masks = Vec::with_capacity(self.skeleton_times.len());
        for times in &self.skeleton_times {
            let mut mask = vec![false; len];
            mask[0] = true;

            if let (Some(&first), Some(&last)) = (times.first(), times.last()) {
                for &t in times {
                    mask[index_of(t)] = true;
                }
                is_animated = true;

                // Between its first and last sample an animated skeleton
                // also claims every playback frame.
                if times.len() > 1 {
                    for &t in self.playback_times.iter().filter(|&&t| t >= first && t <= last) {
                        mask[index_of(t)] = true;
                    }
                }
            }
            masks.push(mask);
        }

        let mut times: Vec<TimeCode> = std::iter::once(TimeCode::Default)
            .chain(all_times.iter().copied().map(TimeCode::Numeric))
            .collect();

        if !is_animated {
            times.truncate(1);
            for mask in &mut masks {
                mask.truncate(1);
            }
        }

        SamplePlan {
            times: SampleTimeSet { times },
            masks,
        }
    }
}
