/// Run-length confirmation of anomaly flags.
///
/// A raw flag is confirmed only when it sits in a run of consecutive
/// anomalous samples longer than the threshold. Runs are broken whenever
/// the flag toggles or the point id changes, so isolated single-sample
/// flags never survive.

/// Confirmed flag for every `(key, is_anomaly)` row.
///
/// `confirmed = is_anomaly && run_anomaly_count > threshold`, where the run
/// is the maximal stretch of rows with equal key and equal flag.
pub fn confirm_runs<K: PartialEq>(rows: &[(K, bool)], threshold: usize) -> Vec<bool> {
    let mut confirmed = vec![false; rows.len()];
    let mut start = 0;

    for i in 1..=rows.len() {
        let run_ends = i == rows.len() || rows[i].0 != rows[start].0 || rows[i].1 != rows[start].1;
        if !run_ends {
            continue;
        }
        if start < i && rows[start].1 {
            let anomalous = i - start;
            if anomalous > threshold {
                confirmed[start..i].iter_mut().for_each(|c| *c = true);
            }
        }
        start = i;
    }

    confirmed
}
