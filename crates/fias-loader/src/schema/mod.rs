//! Record schemas and the rows they produce
//!
//! A [`RecordSchema`] binds one XML element name to one target table and an
//! ordered list of [`Column`]s. Each column names the XML attribute it is read
//! from and the destination column it is written to. Destination names are
//! the case-folded record field names and must already match the table; the
//! loader never reconciles them.
//!
//! ```
//! use fias_loader::schema::{Column, RecordSchema, Value};
//!
//! const STATUS: RecordSchema = RecordSchema {
//!     table: "actual_status",
//!     element: "ActualStatus",
//!     columns: &[
//!         Column::integer("actstatid", "ACTSTATID"),
//!         Column::text("name", "NAME"),
//!     ],
//! };
//!
//! let row = STATUS.row_from_attributes(&[("NAME", "Актуальный".into())]);
//! assert_eq!(row.get("actstatid"), Some(&Value::Integer(0)));
//! assert_eq!(row.len(), 2);
//! ```

pub mod registry;

pub use registry::{SchemaKey, SchemaRegistry};

use std::borrow::Cow;
use std::fmt;

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Integer,
    Byte,
}

impl ColumnType {
    /// The value a column takes when its attribute is absent
    pub fn zero(self) -> Value {
        match self {
            ColumnType::Text => Value::Text(String::new()),
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Byte => Value::Byte(0),
        }
    }

    /// Best-effort conversion of a raw attribute value.
    ///
    /// Numbers are parsed after trimming; anything unparseable becomes the
    /// zero value.
    pub fn coerce(self, raw: &str) -> Value {
        match self {
            ColumnType::Text => Value::Text(raw.to_string()),
            ColumnType::Integer => Value::Integer(raw.trim().parse().unwrap_or(0)),
            ColumnType::Byte => Value::Byte(raw.trim().parse().unwrap_or(0)),
        }
    }

    /// PostgreSQL array type used for columnar bulk binds
    pub fn pg_array_type(self) -> &'static str {
        match self {
            ColumnType::Text => "text[]",
            ColumnType::Integer => "int8[]",
            ColumnType::Byte => "int2[]",
        }
    }
}

/// One destination column and the attribute that feeds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub attribute: &'static str,
    pub kind: ColumnType,
}

impl Column {
    pub const fn text(name: &'static str, attribute: &'static str) -> Self {
        Self { name, attribute, kind: ColumnType::Text }
    }

    pub const fn integer(name: &'static str, attribute: &'static str) -> Self {
        Self { name, attribute, kind: ColumnType::Integer }
    }

    pub const fn byte(name: &'static str, attribute: &'static str) -> Self {
        Self { name, attribute, kind: ColumnType::Byte }
    }
}

/// Shape of one record kind: element, table and ordered columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub table: &'static str,
    pub element: &'static str,
    pub columns: &'static [Column],
}

impl RecordSchema {
    /// Build a row from decoded `(attribute, value)` pairs.
    ///
    /// Columns are read in schema order; attributes the schema does not know
    /// are ignored and missing ones take the column's zero value.
    pub fn row_from_attributes(&self, attributes: &[(&str, Cow<'_, str>)]) -> IngestRow {
        let values = self
            .columns
            .iter()
            .map(|column| {
                let value = attributes
                    .iter()
                    .find(|(name, _)| *name == column.attribute)
                    .map(|(_, raw)| column.kind.coerce(raw))
                    .unwrap_or_else(|| column.kind.zero());
                (column.name, value)
            })
            .collect();

        IngestRow { values }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Scalar value of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Byte(u8),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Byte(b) => write!(f, "{b}"),
        }
    }
}

/// One decoded element as an ordered column -> value mapping.
///
/// Always holds a value for every column of the schema that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRow {
    values: Vec<(&'static str, Value)>,
}

impl IngestRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Value at schema position `index`
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).map(|(_, value)| value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STEAD_LIKE: RecordSchema = RecordSchema {
        table: "steads",
        element: "Stead",
        columns: &[
            Column::text("steadguid", "STEADGUID"),
            Column::integer("operstatus", "OPERSTATUS"),
            Column::byte("livestatus", "LIVESTATUS"),
        ],
    };

    #[test]
    fn test_row_follows_schema_order() {
        let row = STEAD_LIKE.row_from_attributes(&[
            ("LIVESTATUS", "1".into()),
            ("STEADGUID", "abc".into()),
            ("OPERSTATUS", "10".into()),
        ]);

        let names: Vec<_> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["steadguid", "operstatus", "livestatus"]);
        assert_eq!(row.value_at(1), Some(&Value::Integer(10)));
        assert_eq!(row.get("livestatus"), Some(&Value::Byte(1)));
    }

    #[test]
    fn test_missing_and_unknown_attributes() {
        let row = STEAD_LIKE.row_from_attributes(&[("NUMBER", "12".into())]);

        assert_eq!(row.len(), STEAD_LIKE.columns.len());
        assert_eq!(row.get("steadguid"), Some(&Value::Text(String::new())));
        assert_eq!(row.get("operstatus"), Some(&Value::Integer(0)));
        assert_eq!(row.get("number"), None);
    }

    #[test]
    fn test_coerce_is_best_effort() {
        assert_eq!(ColumnType::Integer.coerce(" 42 "), Value::Integer(42));
        assert_eq!(ColumnType::Integer.coerce("4x2"), Value::Integer(0));
        assert_eq!(ColumnType::Byte.coerce("300"), Value::Byte(0));
        assert_eq!(ColumnType::Text.coerce(" keep "), Value::Text(" keep ".to_string()));
    }
}
