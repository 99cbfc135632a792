//! Wide-to-long reshape of the accident CSV.
//!
//! Each input row carries one 0/1 flag per vehicle type. The transform emits
//! one [`NormalizedRecord`] per flag set to 1, so a row with two flags yields
//! two records and a row with none yields nothing.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{Result, TransformError};
use crate::record::{NormalizedRecord, Vehicle};

/// Field delimiter of the source files.
pub const DELIMITER: u8 = b';';

/// Columns copied (or combined) into every emitted record.
pub const FIXED_COLUMNS: [&str; 4] = ["data", "horario", "trecho", DEATHS_COLUMN];

pub const DEATHS_COLUMN: &str = "mortos";

/// Counters describing one reshape run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReshapeStats {
    pub rows_read: usize,
    /// Rows with no vehicle flag set to 1.
    pub rows_dropped: usize,
    pub records_emitted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReshapeOutput {
    pub records: Vec<NormalizedRecord>,
    pub stats: ReshapeStats,
}

/// Reshape semicolon-delimited CSV text into normalized records.
pub fn reshape(text: &str) -> Result<Vec<NormalizedRecord>> {
    reshape_with_stats(text).map(|output| output.records)
}

/// Reshape raw object bytes. The bytes must be UTF-8.
pub fn reshape_bytes(bytes: &[u8]) -> Result<ReshapeOutput> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| TransformError::malformed(format!("input is not valid UTF-8: {}", e)))?;
    reshape_with_stats(text)
}

/// Reshape and report row/record counters alongside the records.
pub fn reshape_with_stats(text: &str) -> Result<ReshapeOutput> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| TransformError::malformed(format!("failed to read header row: {}", e)))?
        .clone();
    let layout = ColumnLayout::resolve(&headers)?;

    let mut records = Vec::new();
    let mut stats = ReshapeStats::default();

    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| TransformError::malformed(e.to_string()))?;
        // Header is line 1; fall back to that numbering if csv has no position.
        let line = row
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);

        stats.rows_read += 1;
        let emitted = layout.expand_row(&row, line, &mut records)?;
        if emitted == 0 {
            stats.rows_dropped += 1;
        }
        stats.records_emitted += emitted;
    }

    Ok(ReshapeOutput { records, stats })
}

/// Positions of the required columns within the header.
#[derive(Debug)]
struct ColumnLayout {
    data: usize,
    horario: usize,
    trecho: usize,
    mortos: usize,
    vehicles: [(Vehicle, usize); 5],
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        // First occurrence wins on duplicate header names.
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            positions.entry(name).or_insert(idx);
        }

        let missing: Vec<&str> = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(Vehicle::ALL.iter().map(Vehicle::as_str))
            .filter(|name| !positions.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(TransformError::malformed(format!(
                "header is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let at = |name: &str| positions[name];
        Ok(Self {
            data: at("data"),
            horario: at("horario"),
            trecho: at("trecho"),
            mortos: at(DEATHS_COLUMN),
            vehicles: Vehicle::ALL.map(|vehicle| (vehicle, at(vehicle.as_str()))),
        })
    }

    /// Push one record per set flag; returns how many were pushed.
    /// Fields past the end of a short row read as empty.
    fn expand_row(
        &self,
        row: &StringRecord,
        line: u64,
        out: &mut Vec<NormalizedRecord>,
    ) -> Result<usize> {
        let field = |idx: usize| row.get(idx).unwrap_or("");

        let set: Vec<Vehicle> = self
            .vehicles
            .iter()
            .filter(|(_, idx)| is_flag_set(field(*idx)))
            .map(|(vehicle, _)| *vehicle)
            .collect();
        if set.is_empty() {
            return Ok(0);
        }

        let number_deaths = parse_deaths(field(self.mortos), line)?;
        let created_at = format!("{} {}", field(self.data), field(self.horario));
        let road_name = field(self.trecho);

        for vehicle in &set {
            out.push(NormalizedRecord {
                created_at: created_at.clone(),
                road_name: road_name.to_string(),
                vehicle: *vehicle,
                number_deaths,
            });
        }

        Ok(set.len())
    }
}

/// `1`, or any numeric text equal to 1 (`1.0`). Everything else is false.
fn is_flag_set(raw: &str) -> bool {
    let value = raw.trim();
    value == "1" || value.parse::<f64>().is_ok_and(|n| n == 1.0)
}

fn parse_deaths(raw: &str, line: u64) -> Result<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(TransformError::type_conversion(
            line,
            DEATHS_COLUMN,
            raw,
            "is missing",
        ));
    }

    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }

    // Integral floats show up when the source column had gaps ("3.0").
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => Ok(n as i64),
        _ => Err(TransformError::type_conversion(
            line,
            DEATHS_COLUMN,
            raw,
            "is not an integer",
        )),
    }
}
