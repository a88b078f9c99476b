//! Snapshot normalizer: raw sheet cells in, typed snapshots out.
//!
//! The sheet hands back untyped cell text. This module is the single place
//! that text becomes ids, timestamps and flags. Bad values are reported per
//! row and never coerced, since a guessed timestamp would corrupt the
//! last-writer-wins order.

use crate::{
    error::{Result, RowRef},
    snapshot::{Snapshot, SnapshotRow, HEADER_ROWS},
    Entity, EntityKind, Error, Origin, RowId, Timestamp,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Raw cell text of one sheet tab, header row first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Build from a grid of JSON cell values, first row being the header.
    ///
    /// Sheets returns strings for formatted reads but numbers and booleans
    /// for unformatted ones; both are accepted.
    pub fn from_values(values: Vec<Vec<serde_json::Value>>) -> Self {
        let mut grid = values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let header = grid.next().unwrap_or_default();
        Self {
            header,
            rows: grid.collect(),
        }
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A sheet row that failed normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// 1-indexed sheet row number
    pub row_number: usize,
    /// The row's id, when it could be parsed
    pub id: Option<RowId>,
    pub error: Error,
}

/// Result of normalizing one sheet tab.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub snapshot: Snapshot<T>,
    pub rejected: Vec<Rejected>,
}

impl<T: Entity> Normalized<T> {
    /// Every id present on the sheet, including those of rejected rows.
    ///
    /// A row that failed to parse is still on the sheet; its id must not be
    /// read as a sheet-side deletion.
    pub fn seen_ids(&self) -> BTreeSet<RowId> {
        let mut ids = self.snapshot.ids();
        ids.extend(self.rejected.iter().filter_map(|r| r.id));
        ids
    }

    /// Ids of rows that were rejected.
    pub fn rejected_ids(&self) -> BTreeSet<RowId> {
        self.rejected.iter().filter_map(|r| r.id).collect()
    }
}

/// Typed access to the cells of one sheet row.
pub struct Cells<'a> {
    kind: EntityKind,
    row_number: usize,
    cells: &'a [String],
    id: std::result::Result<Option<RowId>, String>,
}

impl<'a> Cells<'a> {
    pub fn new(kind: EntityKind, row_number: usize, cells: &'a [String]) -> Self {
        let mut this = Self {
            kind,
            row_number,
            cells,
            id: Ok(None),
        };
        this.id = parse_id(this.raw("id"));
        this
    }

    /// Where this row lives, by id when it has a valid one.
    pub fn row_ref(&self) -> RowRef {
        match self.id {
            Ok(Some(id)) => RowRef::Id(id),
            _ => RowRef::SheetRow(self.row_number),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::malformed(self.kind, self.row_ref(), reason)
    }

    fn raw(&self, column: &str) -> &'a str {
        self.kind
            .columns()
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The row id, `None` for a new row.
    pub fn id(&self) -> Result<Option<RowId>> {
        self.id.clone().map_err(|reason| self.malformed(reason))
    }

    /// Non-empty text.
    pub fn text(&self, column: &str) -> Result<&'a str> {
        let value = self.raw(column);
        if value.trim().is_empty() {
            return Err(self.malformed(format!("'{}' is empty", column)));
        }
        Ok(value)
    }

    /// Text that may be empty.
    pub fn optional_text(&self, column: &str) -> &'a str {
        self.raw(column)
    }

    /// A positive integer reference.
    pub fn integer(&self, column: &str) -> Result<RowId> {
        match parse_integer(self.raw(column)) {
            Ok(Some(n)) => Ok(n),
            Ok(None) => Err(self.malformed(format!("'{}' is empty", column))),
            Err(reason) => Err(self.malformed(format!("'{}': {}", column, reason))),
        }
    }

    pub fn flag(&self, column: &str) -> Result<bool> {
        parse_bool(self.raw(column))
            .map_err(|reason| self.malformed(format!("'{}': {}", column, reason)))
    }

    /// `updated_at`, required for every row that already has an id.
    pub fn updated_at(&self) -> Result<Option<Timestamp>> {
        let value = self.raw("updated_at").trim();
        if value.is_empty() {
            return match self.id {
                Ok(Some(_)) => Err(self.malformed("'updated_at' is empty")),
                _ => Ok(None),
            };
        }
        parse_timestamp(value)
            .map(Some)
            .map_err(|reason| self.malformed(format!("'updated_at': {}", reason)))
    }
}

/// Parse an id cell.
///
/// Empty, `none` in any case, and `0` all mean "not created yet".
pub fn parse_id(value: &str) -> std::result::Result<Option<RowId>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match parse_integer(trimmed)? {
        Some(0) | None => Ok(None),
        Some(id) => Ok(Some(id)),
    }
}

fn parse_integer(value: &str) -> std::result::Result<Option<i64>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = match trimmed.parse::<i64>() {
        Ok(n) => n,
        // Sheets renders some numbers as "12.0".
        Err(_) => match trimmed.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(format!("'{}' is not an integer", trimmed)),
        },
    };
    if parsed < 0 {
        return Err(format!("'{}' is negative", trimmed));
    }
    Ok(Some(parsed))
}

/// Parse a boolean cell. Empty reads as `false`.
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "0" => Ok(false),
        "true" | "yes" | "1" => Ok(true),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

/// Parse a timestamp cell into an instant.
///
/// Accepts RFC 3339, the space-separated form database drivers print
/// (`2024-05-01 10:00:00.123456+00:00`), and naive date-times, which are
/// taken as UTC.
pub fn parse_timestamp(value: &str) -> std::result::Result<Timestamp, String> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("'{}' is not a timestamp", trimmed))
}

/// Canonical cell rendering of a timestamp.
///
/// Microsecond precision matches the database, so a value written to the
/// sheet parses back to the exact instant stored.
pub fn render_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Check that the header lists the collection's columns, in order.
///
/// Extra trailing columns are allowed and ignored.
pub fn check_header(kind: EntityKind, header: &[String]) -> Result<()> {
    for (position, expected) in kind.columns().iter().enumerate() {
        let found = match header.get(position) {
            Some(found) => found.trim().to_ascii_lowercase(),
            None => {
                return Err(Error::MissingColumn {
                    kind,
                    column: expected.to_string(),
                })
            }
        };
        if found != *expected {
            return Err(Error::ColumnMismatch {
                kind,
                position: position + 1,
                expected: expected.to_string(),
                found,
            });
        }
    }
    Ok(())
}

/// Normalize one sheet tab into a typed snapshot.
///
/// Fails only when the header is unusable. Row-level problems are returned
/// in [`Normalized::rejected`] and the remaining rows still normalize.
pub fn normalize_table<T: Entity>(raw: &RawTable, captured_at: Timestamp) -> Result<Normalized<T>> {
    check_header(T::KIND, &raw.header)?;

    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut rejected = Vec::new();
    let mut seen = HashSet::new();

    for (position, cells) in raw.rows.iter().enumerate() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let row_number = position + HEADER_ROWS + 1;
        let access = Cells::new(T::KIND, row_number, cells);
        let id = access.id().ok().flatten();

        if let Some(id) = id {
            if !seen.insert(id) {
                rejected.push(Rejected {
                    row_number,
                    id: Some(id),
                    error: Error::malformed(
                        T::KIND,
                        RowRef::SheetRow(row_number),
                        format!("duplicate id {}", id),
                    ),
                });
                continue;
            }
        }

        match T::from_cells(&access) {
            Ok(record) => rows.push(SnapshotRow {
                position: Some(position),
                record,
            }),
            Err(error) => rejected.push(Rejected {
                row_number,
                id,
                error,
            }),
        }
    }

    Ok(Normalized {
        snapshot: Snapshot {
            origin: Origin::Sheet,
            captured_at,
            rows,
        },
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Word};
    use chrono::TimeZone;
    use serde_json::json;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn words_table(rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            strings(Word::COLUMNS),
            rows.iter().map(|r| strings(r)).collect(),
        )
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn id_sentinels_mean_new_row() {
        for value in ["", "   ", "none", "None", "NONE", "0", "0.0"] {
            assert_eq!(parse_id(value), Ok(None), "value {:?}", value);
        }
        assert_eq!(parse_id("42"), Ok(Some(42)));
        assert_eq!(parse_id(" 42 "), Ok(Some(42)));
        assert_eq!(parse_id("42.0"), Ok(Some(42)));
        assert!(parse_id("abc").is_err());
        assert!(parse_id("4.5").is_err());
        assert!(parse_id("-3").is_err());
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Ok(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00+00:00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00+00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00"), Ok(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Ok(expected));

        let micros = parse_timestamp("2024-05-01 10:00:00.123456+00:00").unwrap();
        assert_eq!(micros.timestamp_subsec_micros(), 123456);

        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-05-01").is_err());
    }

    #[test]
    fn rendered_timestamp_round_trips_exactly() {
        let ts = parse_timestamp("2024-05-01 10:00:00.123456+00:00").unwrap();
        let rendered = render_timestamp(ts);
        assert_eq!(rendered, "2024-05-01T10:00:00.123456Z");
        assert_eq!(parse_timestamp(&rendered), Ok(ts));
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool(""), Ok(false));
        assert_eq!(parse_bool("FALSE"), Ok(false));
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("yes"), Ok(true));
        assert_eq!(parse_bool("1"), Ok(true));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn header_must_match_layout() {
        assert!(check_header(EntityKind::Categories, &strings(&["ID", " Name ", "updated_at"])).is_ok());
        assert!(check_header(
            EntityKind::Categories,
            &strings(&["id", "name", "updated_at", "notes"])
        )
        .is_ok());

        assert_eq!(
            check_header(EntityKind::Categories, &strings(&["id", "name"])),
            Err(Error::MissingColumn {
                kind: EntityKind::Categories,
                column: "updated_at".into()
            })
        );
        assert!(matches!(
            check_header(EntityKind::Categories, &strings(&["name", "id", "updated_at"])),
            Err(Error::ColumnMismatch { position: 1, .. })
        ));
    }

    #[test]
    fn normalizes_typed_rows() {
        let raw = words_table(&[
            &["9", "3", "cat", "feline", "FALSE", "2024-05-01T10:00:00Z"],
            &["", "3", "dog", "canine"],
        ]);

        let normalized = normalize_table::<Word>(&raw, now()).unwrap();
        assert!(normalized.rejected.is_empty());
        assert_eq!(normalized.snapshot.origin, Origin::Sheet);
        assert_eq!(normalized.snapshot.len(), 2);

        let existing = &normalized.snapshot.rows[0];
        assert_eq!(existing.record.id, Some(9));
        assert_eq!(existing.row_number(), Some(2));
        assert_eq!(
            existing.record.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );

        let new = &normalized.snapshot.rows[1];
        assert_eq!(new.record.id, None);
        assert_eq!(new.record.updated_at, None);
        assert!(!new.record.deleted);
    }

    #[test]
    fn bad_timestamp_rejects_row_but_keeps_id_seen() {
        let raw = words_table(&[
            &["9", "3", "cat", "feline", "FALSE", "not a time"],
            &["10", "3", "dog", "canine", "FALSE", "2024-05-01T10:00:00Z"],
        ]);

        let normalized = normalize_table::<Word>(&raw, now()).unwrap();
        assert_eq!(normalized.snapshot.ids(), BTreeSet::from([10]));
        assert_eq!(normalized.rejected.len(), 1);

        let rejected = &normalized.rejected[0];
        assert_eq!(rejected.row_number, 2);
        assert_eq!(rejected.id, Some(9));
        assert_eq!(rejected.error.row(), Some(RowRef::Id(9)));

        assert_eq!(normalized.seen_ids(), BTreeSet::from([9, 10]));
        assert_eq!(normalized.rejected_ids(), BTreeSet::from([9]));
    }

    #[test]
    fn existing_row_without_timestamp_is_malformed() {
        let raw = RawTable::new(
            strings(Category::COLUMNS),
            vec![strings(&["5", "Animals", ""])],
        );
        let normalized = normalize_table::<Category>(&raw, now()).unwrap();
        assert!(normalized.snapshot.is_empty());
        assert!(matches!(
            normalized.rejected[0].error,
            Error::MalformedRow {
                row: RowRef::Id(5),
                ..
            }
        ));
    }

    #[test]
    fn duplicate_ids_reject_later_rows() {
        let raw = RawTable::new(
            strings(Category::COLUMNS),
            vec![
                strings(&["5", "Animals", "2024-05-01T10:00:00Z"]),
                strings(&["5", "Animals copy", "2024-05-01T10:00:00Z"]),
            ],
        );
        let normalized = normalize_table::<Category>(&raw, now()).unwrap();
        assert_eq!(normalized.snapshot.len(), 1);
        assert_eq!(normalized.snapshot.rows[0].record.name, "Animals");
        assert_eq!(normalized.rejected[0].row_number, 3);
    }

    #[test]
    fn blank_rows_are_skipped_but_positions_kept() {
        let raw = RawTable::new(
            strings(Category::COLUMNS),
            vec![
                strings(&["", "", ""]),
                strings(&["", "Plants", ""]),
            ],
        );
        let normalized = normalize_table::<Category>(&raw, now()).unwrap();
        assert_eq!(normalized.snapshot.len(), 1);
        assert_eq!(normalized.snapshot.rows[0].row_number(), Some(3));
    }

    #[test]
    fn malformed_new_row_is_attributed_to_sheet_row() {
        let raw = words_table(&[&["", "three", "cat", "feline", "", ""]]);
        let normalized = normalize_table::<Word>(&raw, now()).unwrap();
        assert_eq!(
            normalized.rejected[0].error.row(),
            Some(RowRef::SheetRow(2))
        );
        assert_eq!(normalized.rejected[0].id, None);
    }

    #[test]
    fn missing_column_is_fatal() {
        let raw = RawTable::new(strings(&["id", "category_id", "word"]), vec![]);
        assert!(matches!(
            normalize_table::<Word>(&raw, now()),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn raw_table_from_json_values() {
        let raw = RawTable::from_values(vec![
            vec![json!("id"), json!("name"), json!("updated_at")],
            vec![json!(5), json!("Animals"), json!("2024-05-01T10:00:00Z")],
            vec![json!(null), json!("Plants")],
        ]);

        assert_eq!(raw.header, strings(Category::COLUMNS));
        assert_eq!(raw.rows[0][0], "5");
        assert_eq!(raw.rows[1][0], "");

        let normalized = normalize_table::<Category>(&raw, now()).unwrap();
        assert_eq!(normalized.snapshot.len(), 2);
    }
}
