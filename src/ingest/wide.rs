/// Wide-to-long reshaping for displacement and prediction tables.
///
/// Displacement exports have one row per acquisition date and one column
/// per point. Prediction exports drop the date column entirely; each row is
/// the next forecast step for every point.

use std::collections::HashSet;

use tracing::debug;

use crate::ingest::table::{parse_date, parse_number, Table};
use crate::model::{DefmonError, DisplacementSample, PredictionSample};

/// Reshapes a wide displacement table into long `(pid, date, value)` samples,
/// tagging every sample with `label`.
///
/// `id_column` is the date column. Missing cells produce no sample. Output
/// is grouped by point in column order, dates in row order.
pub fn load_wide_series(
    table: &Table,
    id_column: &str,
    label: &str,
) -> Result<Vec<DisplacementSample>, DefmonError> {
    let date_col = table.column_index(id_column)?;
    check_unique_columns(table)?;

    let mut dates = Vec::with_capacity(table.rows.len());
    let mut seen = HashSet::new();
    for row in 0..table.rows.len() {
        let cell = table.cell(row, date_col).ok_or_else(|| {
            DefmonError::malformed(
                &table.source,
                format!("row {} has no value in '{}'", row + 1, id_column),
            )
        })?;
        let date = parse_date(&table.source, cell)?;
        if !seen.insert(date) {
            return Err(DefmonError::malformed(
                &table.source,
                format!("date {} appears more than once", date),
            ));
        }
        dates.push(date);
    }

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for (col, pid) in table.headers.iter().enumerate() {
        if col == date_col {
            continue;
        }
        for (row, date) in dates.iter().enumerate() {
            let raw = table.rows[row][col].as_str();
            match parse_number(&table.source, pid, raw)? {
                Some(displacement) => samples.push(DisplacementSample {
                    pid: pid.clone(),
                    timestamp: *date,
                    displacement,
                    label: label.to_string(),
                }),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        debug!(source = %table.source, skipped, "skipped missing displacement cells");
    }
    Ok(samples)
}

/// Reshapes a wide prediction table into `(pid, step, value)` samples.
///
/// Every column is a point. `step` is the row ordinal within that column;
/// a missing cell emits nothing but still consumes its step.
pub fn load_prediction_series(
    table: &Table,
    label: &str,
) -> Result<Vec<PredictionSample>, DefmonError> {
    check_unique_columns(table)?;
    let mut samples = Vec::with_capacity(table.headers.len() * table.rows.len());
    for (col, pid) in table.headers.iter().enumerate() {
        for (step, row) in table.rows.iter().enumerate() {
            if let Some(predicted_displacement) = parse_number(&table.source, pid, &row[col])? {
                samples.push(PredictionSample {
                    pid: pid.clone(),
                    step,
                    predicted_displacement,
                    label: label.to_string(),
                });
            }
        }
    }
    Ok(samples)
}

/// A point column may appear once; a repeat would duplicate its samples.
fn check_unique_columns(table: &Table) -> Result<(), DefmonError> {
    let mut seen = HashSet::with_capacity(table.headers.len());
    match table.headers.iter().find(|h| !seen.insert(h.as_str())) {
        Some(repeated) => Err(DefmonError::malformed(
            &table.source,
            format!("column '{}' appears more than once", repeated),
        )),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn displacement_table() -> Table {
        Table::parse_csv(
            "mz2_10.csv",
            "Date,A,B\n2020-01-01,0.0,1.0\n2020-01-13,1.5,\n2020-01-25,3.0,2.0\n",
        )
        .unwrap()
    }

    #[test]
    fn test_wide_series_is_reshaped_per_point() {
        let samples = load_wide_series(&displacement_table(), "Date", "Descending 175").unwrap();
        // A has 3 values, B has 2 (one missing cell).
        assert_eq!(samples.len(), 5);
        let a: Vec<_> = samples.iter().filter(|s| s.pid == "A").collect();
        assert_eq!(a.len(), 3);
        assert_eq!(a[1].timestamp, NaiveDate::from_ymd_opt(2020, 1, 13).unwrap());
        assert_eq!(a[1].displacement, 1.5);
        assert!(samples.iter().all(|s| s.label == "Descending 175"));
    }

    #[test]
    fn test_missing_id_column_is_malformed() {
        let err = load_wide_series(&displacement_table(), "timestamp", "x").unwrap_err();
        assert!(matches!(err, DefmonError::MalformedInput { .. }));
    }

    #[test]
    fn test_duplicate_dates_are_rejected() {
        let table = Table::parse_csv("x.csv", "Date,A\n2020-01-01,1\n2020-01-01,2\n").unwrap();
        assert!(load_wide_series(&table, "Date", "x").is_err());
    }

    #[test]
    fn test_non_numeric_cell_is_malformed() {
        let table = Table::parse_csv("x.csv", "Date,A\n2020-01-01,abc\n").unwrap();
        assert!(load_wide_series(&table, "Date", "x").is_err());
    }

    #[test]
    fn test_prediction_steps_follow_row_order_per_point() {
        let table = Table::parse_csv("predictions_values.csv", "A,B\n1.0,5.0\n2.0,\n3.0,7.0\n")
            .unwrap();
        let preds = load_prediction_series(&table, "Prediction Set 1").unwrap();

        let a: Vec<_> = preds.iter().filter(|p| p.pid == "A").map(|p| p.step).collect();
        assert_eq!(a, vec![0, 1, 2]);

        // The missing cell in B keeps its step, so the last value is still step 2.
        let b: Vec<_> = preds
            .iter()
            .filter(|p| p.pid == "B")
            .map(|p| (p.step, p.predicted_displacement))
            .collect();
        assert_eq!(b, vec![(0, 5.0), (2, 7.0)]);
    }

    #[test]
    fn test_blank_prediction_line_keeps_its_step() {
        let table = Table::parse_csv("predictions.csv", "P1\n100.0\n\n300.0\n").unwrap();
        let steps: Vec<_> = load_prediction_series(&table, "Prediction Set 1")
            .unwrap()
            .iter()
            .map(|p| (p.step, p.predicted_displacement))
            .collect();
        assert_eq!(steps, vec![(0, 100.0), (2, 300.0)]);
    }

    #[test]
    fn test_repeated_point_column_is_malformed() {
        let table = Table::parse_csv("x.csv", "Date,A,A\n2020-01-01,1.0,2.0\n").unwrap();
        let err = load_wide_series(&table, "Date", "x").unwrap_err();
        assert!(err.to_string().contains("'A'"), "got {}", err);

        let table = Table::parse_csv("p.csv", "A,A\n1.0,2.0\n").unwrap();
        assert!(load_prediction_series(&table, "x").is_err());
    }
}
