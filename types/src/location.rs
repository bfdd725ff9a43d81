//! Source locations as the mutation server protocol defines them.
//!
//! Positions are 1-based and inclusive of the character at that column,
//! unlike the 0-based positions most editors use internally. Conversion is
//! the presenter's concern; this crate keeps the wire convention.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Error)]
#[error("location end {end_line}:{end_column} precedes start {start_line}:{start_column}")]
pub struct LocationOrderError {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

/// A span between two positions, end not before start in document order.
///
/// Server-reported locations are deserialized without the ordering check so
/// that one odd span cannot poison a whole result map; the fallible
/// constructor is for locally built ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(start: Position, end: Position) -> Result<Self, LocationOrderError> {
        if (end.line, end.column) < (start.line, start.column) {
            return Err(LocationOrderError {
                start_line: start.line,
                start_column: start.column,
                end_line: end.line,
                end_column: end.column,
            });
        }
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_location_is_accepted() {
        let loc = Location::new(Position::new(7, 5), Position::new(7, 35)).unwrap();
        assert_eq!(loc.start.line, 7);
        assert_eq!(loc.end.column, 35);
    }

    #[test]
    fn test_single_point_location_is_accepted() {
        assert!(Location::new(Position::new(3, 4), Position::new(3, 4)).is_ok());
    }

    #[test]
    fn test_reversed_location_is_rejected() {
        let err = Location::new(Position::new(7, 5), Position::new(6, 1)).unwrap_err();
        assert!(err.to_string().contains("precedes"));
    }

    #[test]
    fn test_reversed_column_on_same_line_is_rejected() {
        assert!(Location::new(Position::new(7, 5), Position::new(7, 4)).is_err());
    }

    #[test]
    fn test_location_wire_shape() {
        let loc = Location::new(Position::new(1, 2), Position::new(3, 4)).unwrap();
        let json = serde_json::to_value(loc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "start": { "line": 1, "column": 2 },
                "end": { "line": 3, "column": 4 }
            })
        );
    }

    #[test]
    fn test_unordered_location_still_deserializes() {
        // The wire boundary is lenient; only local construction validates.
        let loc: Location = serde_json::from_value(serde_json::json!({
            "start": { "line": 9, "column": 1 },
            "end": { "line": 1, "column": 1 }
        }))
        .unwrap();
        assert_eq!(loc.start.line, 9);
    }
}
