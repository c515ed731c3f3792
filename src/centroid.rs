//! Centroid detection over a one-dimensional taxel array.
//!
//! The strip is scanned for contiguous runs of active taxels. Each run
//! becomes one touch, located at the intensity-weighted mean of its taxel
//! indices. On a ring-shaped strip the last and first run are folded
//! together when they sit close enough across the boundary.

use crate::touch::{Touch, TouchSet};

/// Static parameters of a [`CentroidDetector`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSetup {
    /// Number of taxels in one scan
    pub taxel_count: usize,
    /// Maximum number of touches reported per scan
    pub capacity: usize,
    /// Divisor applied to the summed intensity of a run to get its size
    pub size_scale: f32,
    /// Runs on either side of the boundary separated by at most this many
    /// inactive taxels are merged into one touch. `0` disables wrap-around,
    /// i.e. a linear strip.
    pub wrap_around: usize,
    /// Runs separated by at most this many inactive taxels are merged.
    pub merge_distance: usize,
    /// A taxel is active when its value is strictly greater than this.
    pub activation_threshold: f32,
}

impl DetectorSetup {
    pub fn new(taxel_count: usize, capacity: usize, size_scale: f32) -> Self {
        Self {
            taxel_count,
            capacity,
            size_scale,
            wrap_around: 0,
            merge_distance: 0,
            activation_threshold: 0.0,
        }
    }

    pub fn with_wrap_around(mut self, wrap_around: usize) -> Self {
        self.wrap_around = wrap_around;
        self
    }

    pub fn with_merge_distance(mut self, merge_distance: usize) -> Self {
        self.merge_distance = merge_distance;
        self
    }

    /// Negative thresholds are clamped to zero so every active taxel carries
    /// positive weight.
    pub fn with_activation_threshold(mut self, threshold: f32) -> Self {
        self.activation_threshold = if threshold.is_finite() { threshold.max(0.0) } else { 0.0 };
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct Run {
    start: usize,
    /// Inclusive
    end: usize,
    /// Sum of intensities
    weight: f32,
    /// Sum of index * intensity
    moment: f32,
}

impl Run {
    fn absorb(&mut self, other: &Run) {
        self.end = other.end;
        self.weight += other.weight;
        self.moment += other.moment;
    }
}

/// Turns raw taxel scans into [`TouchSet`]s.
///
/// Scratch space is allocated once in [`new`](Self::new); [`process`](Self::process)
/// never allocates and keeps no state from one call to the next.
pub struct CentroidDetector {
    setup: DetectorSetup,
    runs: Vec<Run>,
    touches: TouchSet,
}

impl CentroidDetector {
    pub fn new(setup: DetectorSetup) -> Self {
        // alternating active/inactive taxels is the worst case
        let max_runs = setup.taxel_count / 2 + 1;
        Self {
            setup,
            runs: Vec::with_capacity(max_runs),
            touches: TouchSet::with_capacity(setup.capacity),
        }
    }

    #[inline]
    pub fn setup(&self) -> &DetectorSetup {
        &self.setup
    }

    /// Touches found by the last call to [`process`](Self::process)
    #[inline]
    pub fn touches(&self) -> &TouchSet {
        &self.touches
    }

    /// Detect touches in one scan.
    ///
    /// Only the first `taxel_count` values are looked at; a shorter slice is
    /// padded with zeros. Non-finite values count as inactive.
    pub fn process(&mut self, taxels: &[f32]) -> &TouchSet {
        self.collect_runs(taxels);
        self.merge_across_boundary();

        self.touches.clear();
        let n = self.setup.taxel_count as f32;
        for run in &self.runs {
            if self.touches.len() == self.touches.capacity() {
                break;
            }
            let location = (run.moment / run.weight).rem_euclid(n);
            let size = run.weight / self.setup.size_scale;
            self.touches.push(Touch::new(location, size));
        }

        &self.touches
    }

    fn collect_runs(&mut self, taxels: &[f32]) {
        self.runs.clear();
        let threshold = self.setup.activation_threshold;
        let mut current: Option<Run> = None;

        for i in 0..self.setup.taxel_count {
            let value = taxels.get(i).copied().unwrap_or(0.0);
            if value.is_finite() && value > threshold {
                let run = current.get_or_insert(Run { start: i, end: i, weight: 0.0, moment: 0.0 });
                run.end = i;
                run.weight += value;
                run.moment += i as f32 * value;
            } else if let Some(run) = current.take() {
                self.push_run(run);
            }
        }
        if let Some(run) = current.take() {
            self.push_run(run);
        }
    }

    /// Greedy left-to-right merge of runs closer than `merge_distance`.
    fn push_run(&mut self, run: Run) {
        if let Some(previous) = self.runs.last_mut() {
            let gap = run.start - previous.end - 1;
            if gap <= self.setup.merge_distance && self.setup.merge_distance > 0 {
                previous.absorb(&run);
                return;
            }
        }
        self.runs.push(run);
    }

    fn merge_across_boundary(&mut self) {
        let wrap_around = self.setup.wrap_around;
        if wrap_around == 0 || self.runs.len() < 2 {
            return;
        }
        let n = self.setup.taxel_count;
        let first = self.runs[0];
        let last = self.runs[self.runs.len() - 1];

        // inactive taxels between the two runs, counted across the seam
        let gap = first.start + n - last.end - 1;
        if gap > wrap_around {
            return;
        }

        // unroll the first run past the end of the strip so the mean is
        // taken over contiguous indices
        let mut merged = last;
        merged.weight += first.weight;
        merged.moment += first.moment + n as f32 * first.weight;
        merged.end = first.end;

        self.runs.pop();
        self.runs[0] = merged;
    }
}

/// One-shot detection. Allocates; prefer a long-lived [`CentroidDetector`]
/// on timing-sensitive threads.
pub fn detect(taxels: &[f32], setup: &DetectorSetup) -> TouchSet {
    let mut detector = CentroidDetector::new(*setup);
    detector.process(taxels);
    detector.touches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(wrap: usize) -> DetectorSetup {
        DetectorSetup::new(28, 4, 1.0).with_wrap_around(wrap)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-4, "expected {expected}, got {actual}");
    }

    #[test]
    fn all_zero_scan_is_empty() {
        let touches = detect(&[0.0; 28], &ring(5));
        assert!(touches.is_empty());
        assert_eq!(touches.capacity(), 4);
    }

    #[test]
    fn single_run_lands_on_weighted_centroid() {
        let mut taxels = [0.0; 28];
        taxels[10] = 1.0;
        taxels[11] = 3.0;
        taxels[12] = 2.0;
        let touches = detect(&taxels, &ring(5));

        assert_eq!(touches.len(), 1);
        let touch = touches.get(0).unwrap();
        assert_close(touch.location, (10.0 + 33.0 + 24.0) / 6.0);
        assert_close(touch.size, 6.0);
    }

    #[test]
    fn size_is_divided_by_scale() {
        let mut taxels = [0.0; 28];
        taxels[3] = 1600.0;
        taxels[4] = 1600.0;
        let touches = detect(&taxels, &DetectorSetup::new(28, 4, 3200.0));
        assert_close(touches.get(0).unwrap().size, 1.0);
    }

    #[test]
    fn distant_runs_stay_separate_in_either_direction() {
        let mut taxels = [0.0; 28];
        taxels[3] = 1.0;
        taxels[20] = 1.0;
        let mut reversed = taxels;
        reversed.reverse();

        assert_eq!(detect(&taxels, &ring(5)).len(), 2);
        assert_eq!(detect(&reversed, &ring(5)).len(), 2);
    }

    #[test]
    fn contiguous_run_split_by_boundary_is_one_touch() {
        let mut taxels = [0.0; 28];
        taxels[27] = 1.0;
        taxels[0] = 1.0;
        taxels[1] = 1.0;
        let touches = detect(&taxels, &ring(5));

        assert_eq!(touches.len(), 1);
        // indices 27, 28, 29 -> 28, which wraps to 0
        assert_close(touches.get(0).unwrap().location, 0.0);
        assert_close(touches.get(0).unwrap().size, 3.0);
    }

    #[test]
    fn runs_with_small_gap_across_boundary_merge() {
        let mut taxels = [0.0; 28];
        taxels[25] = 1.0;
        taxels[1] = 1.0;
        let touches = detect(&taxels, &ring(5));

        assert_eq!(touches.len(), 1);
        assert_close(touches.get(0).unwrap().location, 27.0);
    }

    #[test]
    fn boundary_gap_equal_to_wrap_around_merges() {
        let mut taxels = [0.0; 28];
        // 25, 26, 27, 0, 1 inactive
        taxels[24] = 1.0;
        taxels[2] = 1.0;
        let touches = detect(&taxels, &ring(5));

        assert_eq!(touches.len(), 1);
        assert_close(touches.get(0).unwrap().location, 27.0);
    }

    #[test]
    fn boundary_gap_one_past_wrap_around_stays_split() {
        let mut taxels = [0.0; 28];
        taxels[23] = 1.0;
        taxels[2] = 1.0;
        assert_eq!(detect(&taxels, &ring(5)).len(), 2);
    }

    #[test]
    fn seam_and_interior_gaps_are_counted_alike() {
        let mut seam = [0.0; 28];
        seam[24] = 1.0;
        seam[2] = 1.0;
        let mut interior = [0.0; 28];
        interior[10] = 1.0;
        interior[16] = 1.0;

        let wrapped = DetectorSetup::new(28, 4, 1.0).with_wrap_around(5);
        let merged = DetectorSetup::new(28, 4, 1.0).with_merge_distance(5);
        assert_eq!(detect(&seam, &wrapped).len(), detect(&interior, &merged).len());
        assert_eq!(detect(&interior, &merged).len(), 1);
    }

    #[test]
    fn runs_far_apart_across_boundary_do_not_merge() {
        let mut taxels = [0.0; 28];
        taxels[20] = 1.0;
        taxels[3] = 1.0;
        assert_eq!(detect(&taxels, &ring(5)).len(), 2);
    }

    #[test]
    fn linear_strip_never_wraps() {
        let mut taxels = [0.0; 28];
        taxels[27] = 1.0;
        taxels[0] = 1.0;
        let touches = detect(&taxels, &ring(0));
        assert_eq!(touches.len(), 2);
        assert_close(touches.get(0).unwrap().location, 0.0);
        assert_close(touches.get(1).unwrap().location, 27.0);
    }

    #[test]
    fn excess_runs_are_truncated_in_scan_order() {
        let mut taxels = [0.0; 28];
        for i in [2, 6, 10, 14, 18, 22] {
            taxels[i] = 1.0;
        }
        let touches = detect(&taxels, &ring(0));
        assert_eq!(touches.len(), 4);
        let locations: Vec<f32> = touches.iter().map(|t| t.location).collect();
        assert_eq!(locations, vec![2.0, 6.0, 10.0, 14.0]);
    }

    #[test]
    fn merge_distance_bridges_small_gaps() {
        let mut taxels = [0.0; 28];
        taxels[10] = 1.0;
        taxels[12] = 1.0;
        taxels[20] = 1.0;
        let setup = DetectorSetup::new(28, 4, 1.0).with_merge_distance(1);
        let touches = detect(&taxels, &setup);

        assert_eq!(touches.len(), 2);
        assert_close(touches.get(0).unwrap().location, 11.0);
        assert_close(touches.get(1).unwrap().location, 20.0);
    }

    #[test]
    fn activation_threshold_filters_noise() {
        let mut taxels = [0.02; 28];
        taxels[8] = 0.5;
        let setup = DetectorSetup::new(28, 4, 1.0).with_activation_threshold(0.05);
        let touches = detect(&taxels, &setup);
        assert_eq!(touches.len(), 1);
        assert_close(touches.get(0).unwrap().location, 8.0);
    }

    #[test]
    fn non_finite_and_short_input_is_handled() {
        let mut taxels = vec![0.0; 10];
        taxels[2] = f32::NAN;
        taxels[3] = f32::INFINITY;
        taxels[6] = 1.0;
        let touches = detect(&taxels, &ring(5));
        assert_eq!(touches.len(), 1);
        assert_close(touches.get(0).unwrap().location, 6.0);
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let mut taxels = [0.0; 28];
        taxels[4] = 0.3;
        taxels[5] = 0.6;
        taxels[27] = 0.2;
        let mut detector = CentroidDetector::new(ring(5));
        let first = detector.process(&taxels).clone();
        detector.process(&[1.0; 28]);
        let again = detector.process(&taxels).clone();
        assert_eq!(first, again);
    }
}
