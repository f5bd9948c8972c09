/// Long-format loaders: point geolocation and precomputed anomaly records.

use crate::ingest::table::{parse_flag, parse_number, Table};
use crate::model::{AnomalyRecord, Band, DefmonError, Point, SignificanceLevel};

const PID: &str = "pid";

/// Column names accepted for the predicted value, in order of preference.
const PREDICTED_COLUMNS: &[&str] = &["predicted_value", "predicted_displacement"];

/// Reads `pid, latitude, longitude, height` rows into points.
///
/// Every row must be complete; a point without coordinates is not a point.
pub fn load_geolocation(table: &Table) -> Result<Vec<Point>, DefmonError> {
    let pid_col = table.column_index(PID)?;
    let lat_col = table.column_index("latitude")?;
    let lon_col = table.column_index("longitude")?;
    let height_col = table.column_index("height")?;

    let mut points = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let pid = table.cell(row, pid_col).ok_or_else(|| {
            DefmonError::malformed(&table.source, format!("row {} has no pid", row + 1))
        })?;
        let required = |col: usize| -> Result<f64, DefmonError> {
            let name = &table.headers[col];
            parse_number(&table.source, name, &table.rows[row][col])?.ok_or_else(|| {
                DefmonError::malformed(
                    &table.source,
                    format!("point '{}' has no value in '{}'", pid, name),
                )
            })
        };
        points.push(Point {
            pid: pid.to_string(),
            latitude: required(lat_col)?,
            longitude: required(lon_col)?,
            height: required(height_col)?,
        });
    }
    Ok(points)
}

/// Reads precomputed anomaly rows.
///
/// Required: `pid`, one of `predicted_value`/`predicted_displacement`,
/// `upper_bound`, `lower_bound`, `is_anomaly`. When the table also carries
/// `upper_bound_99` and `lower_bound_99`, each record gets a secondary band;
/// its flag comes from `is_anomaly_99` when present and is otherwise left
/// unset, to be judged against the observed value once aligned.
pub fn load_anomaly_records(
    table: &Table,
    label: &str,
    primary_level: SignificanceLevel,
    secondary_level: SignificanceLevel,
) -> Result<Vec<AnomalyRecord>, DefmonError> {
    let pid_col = table.column_index(PID)?;
    let predicted_col = PREDICTED_COLUMNS
        .iter()
        .find_map(|name| table.find_column(name))
        .ok_or_else(|| {
            DefmonError::malformed(
                &table.source,
                "missing column 'predicted_value' (or 'predicted_displacement')",
            )
        })?;
    let upper_col = table.column_index("upper_bound")?;
    let lower_col = table.column_index("lower_bound")?;
    let flag_col = table.column_index("is_anomaly")?;

    let secondary_cols = match (
        table.find_column("upper_bound_99"),
        table.find_column("lower_bound_99"),
    ) {
        (Some(u), Some(l)) => Some((u, l, table.find_column("is_anomaly_99"))),
        _ => None,
    };

    let mut records = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let pid = table.cell(row, pid_col).ok_or_else(|| {
            DefmonError::malformed(&table.source, format!("row {} has no pid", row + 1))
        })?;
        let number = |col: usize| -> Result<f64, DefmonError> {
            let name = &table.headers[col];
            parse_number(&table.source, name, &table.rows[row][col])?.ok_or_else(|| {
                DefmonError::malformed(
                    &table.source,
                    format!("row {} has no value in '{}'", row + 1, name),
                )
            })
        };
        let flag = |col: usize| parse_flag(&table.source, &table.headers[col], &table.rows[row][col]);

        let primary = Band {
            level: primary_level,
            upper_bound: number(upper_col)?,
            lower_bound: number(lower_col)?,
            is_anomaly: Some(flag(flag_col)?),
        };
        let secondary = match secondary_cols {
            Some((u, l, f)) => Some(Band {
                level: secondary_level,
                upper_bound: number(u)?,
                lower_bound: number(l)?,
                is_anomaly: f.map(flag).transpose()?,
            }),
            None => None,
        };

        records.push(AnomalyRecord {
            pid: pid.to_string(),
            label: label.to_string(),
            predicted_value: number(predicted_col)?,
            primary,
            secondary,
        });
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
