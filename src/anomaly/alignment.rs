/// Right-aligned positional joins.
///
/// Overlay series (anomaly records, forecast steps) carry no calendar dates.
/// They are placed onto the observed series by count from the end: the last
/// `k` overlay rows map one-to-one, in order, onto the last `k` observed
/// rows, whatever dates those rows have.

use crate::model::PredictionSample;

/// Placement of an overlay slice onto an observed series of known length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailAlignment<'a, T> {
    /// Index of the first observed row that receives an overlay row.
    pub start: usize,
    /// The overlay rows used, oldest first; `overlay.len()` is the window.
    pub overlay: &'a [T],
}

impl<'a, T> TailAlignment<'a, T> {
    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }

    /// Overlay row for observed row `index`, if it falls in the window.
    pub fn at(&self, index: usize) -> Option<&'a T> {
        index
            .checked_sub(self.start)
            .and_then(|offset| self.overlay.get(offset))
    }

    /// Observed indices covered by the window.
    pub fn observed_range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.overlay.len()
    }
}

/// Aligns the tail of `overlay` onto an observed series of `observed_len`.
///
/// The window is `min(window, observed_len, overlay.len())`. Fewer observed
/// rows than `window` is not an error; all of them are used.
pub fn align_tail<T>(observed_len: usize, overlay: &[T], window: usize) -> TailAlignment<'_, T> {
    let k = window.min(observed_len).min(overlay.len());
    TailAlignment {
        start: observed_len - k,
        overlay: &overlay[overlay.len() - k..],
    }
}

/// Lays forecast steps out densely so they can be tail-aligned.
///
/// Slot `s` of a prediction set holds step `s`, or `None` where the cell was
/// missing, so a gap never moves later steps. A set ends at its highest
/// present step. Sets follow each other in load order; a new set starts when
/// the label changes or the step counter restarts.
pub fn step_slots(predictions: &[PredictionSample]) -> Vec<Option<&PredictionSample>> {
    let mut slots: Vec<Option<&PredictionSample>> = Vec::new();
    let mut set_start = 0;
    let mut prev: Option<&PredictionSample> = None;

    for p in predictions {
        if prev.is_some_and(|q| q.label != p.label || p.step <= q.step) {
            set_start = slots.len();
        }
        let slot = set_start + p.step;
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        slots[slot] = Some(p);
        prev = Some(p);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step: usize, value: f64, label: &str) -> PredictionSample {
        PredictionSample {
            pid: "A".to_string(),
            step,
            predicted_displacement: value,
            label: label.to_string(),
        }
    }

    fn values(slots: &[Option<&PredictionSample>]) -> Vec<Option<f64>> {
        slots.iter().map(|s| s.map(|p| p.predicted_displacement)).collect()
    }

    #[test]
    fn test_longer_observed_series_uses_only_its_tail() {
        let overlay: Vec<usize> = (0..60).collect();
        let aligned = align_tail(200, &overlay, 60);
        assert_eq!(aligned.start, 140);
        assert_eq!(aligned.len(), 60);
        assert_eq!(aligned.at(139), None);
        assert_eq!(aligned.at(140), Some(&0));
        assert_eq!(aligned.at(199), Some(&59));
        assert_eq!(aligned.at(200), None);
    }

    #[test]
    fn test_short_observed_series_uses_all_samples() {
        let overlay: Vec<usize> = (0..60).collect();
        let aligned = align_tail(10, &overlay, 60);
        assert_eq!(aligned.start, 0);
        assert_eq!(aligned.len(), 10);
        // The last 10 overlay rows are used, not the first 10.
        assert_eq!(aligned.at(0), Some(&50));
        assert_eq!(aligned.at(9), Some(&59));
    }

    #[test]
    fn test_short_overlay_is_right_aligned() {
        let overlay = ['a', 'b', 'c'];
        let aligned = align_tail(100, &overlay, 60);
        assert_eq!(aligned.observed_range(), 97..100);
        assert_eq!(aligned.at(97), Some(&'a'));
    }

    #[test]
    fn test_empty_overlay_aligns_nothing() {
        let overlay: [u8; 0] = [];
        let aligned = align_tail(5, &overlay, 60);
        assert!(aligned.is_empty());
        assert_eq!(aligned.start, 5);
        assert_eq!(aligned.at(4), None);
    }

    #[test]
    fn test_interior_step_gap_keeps_its_slot() {
        let preds = vec![step(0, 100.0, "set1"), step(2, 300.0, "set1")];
        let slots = step_slots(&preds);
        assert_eq!(values(&slots), vec![Some(100.0), None, Some(300.0)]);

        let aligned = align_tail(3, &slots, 60);
        assert_eq!(aligned.start, 0, "step 0 lands on the first observation");
        assert_eq!(aligned.at(1), Some(&None));
    }

    #[test]
    fn test_sets_are_laid_out_in_load_order() {
        let preds = vec![
            step(0, 1.0, "set1"),
            step(1, 2.0, "set1"),
            step(1, 20.0, "set2"),
            step(0, 30.0, "set3"),
        ];
        assert_eq!(
            values(&step_slots(&preds)),
            vec![Some(1.0), Some(2.0), None, Some(20.0), Some(30.0)]
        );
    }

    #[test]
    fn test_restarted_steps_with_same_label_start_a_new_set() {
        let preds = vec![step(0, 1.0, "set1"), step(0, 2.0, "set1")];
        assert_eq!(values(&step_slots(&preds)), vec![Some(1.0), Some(2.0)]);
    }
}
