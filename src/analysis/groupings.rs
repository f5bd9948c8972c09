/// Grouping helpers that organize flat sample lists into per-point structures.

use std::collections::HashMap;
use std::ops::Range;

/// Ranges of consecutive items sharing the same point id.
///
/// Input must already be grouped (e.g. sorted by pid); a pid that reappears
/// after a different one starts a new range.
pub fn contiguous_partitions<T>(items: &[T], pid: impl Fn(&T) -> &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=items.len() {
        if i == items.len() || pid(&items[i]) != pid(&items[start]) {
            if start < i {
                ranges.push(start..i);
            }
            start = i;
        }
    }
    ranges
}

/// Buckets items by point id, keeping their original relative order.
pub fn index_by_pid<T>(items: Vec<T>, pid: impl Fn(&T) -> &str) -> HashMap<String, Vec<T>> {
    let mut index: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        let key = pid(&item).to_string();
        index.entry(key).or_default().push(item);
    }
    index
}
