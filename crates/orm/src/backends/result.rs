//! Backend-neutral query output
//!
//! Every backend copies its native rows into [`ResultSet`]/[`Row`]
//! immediately after execution, so no driver type escapes a backend. Cells
//! are kept as optional text; typed access goes through [`FromCell`].

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{OrmError, OrmResult};

/// Rows, column names and write metadata produced by one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Arc<[String]>,
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into(),
            ..Self::default()
        }
    }

    /// Build a result set from text cells; handy for scripted test data
    pub fn from_rows<C, R, V>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<V>>,
        V: Into<Option<String>>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut set = Self::new(columns);
        for row in rows {
            set.push_row(row.into_iter().map(Into::into).collect());
        }
        set
    }

    /// Append a row; missing trailing cells are read back as NULL
    pub fn push_row(&mut self, values: Vec<Option<String>>) {
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// First cell of the first row, for `COUNT(*)` style queries
    pub fn scalar<T: FromCell>(&self) -> Option<T> {
        self.rows.first().map(|row| row.get_index(0))
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.rows.iter().map(Row::to_json).collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// One row of string-or-null cells
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Raw cell by column name; `None` for NULL or an unknown column
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.position(name).and_then(|i| self.get_str_index(i))
    }

    /// Raw cell by position
    pub fn get_str_index(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Typed cell by column name, using the lossy [`FromCell`] coercion
    pub fn get<T: FromCell>(&self, name: &str) -> T {
        T::from_cell(name, self.get_str(name))
    }

    /// Typed cell by position
    pub fn get_index<T: FromCell>(&self, index: usize) -> T {
        let name = self.columns.get(index).map(String::as_str).unwrap_or("?");
        T::from_cell(name, self.get_str_index(index))
    }

    /// Typed cell by name, failing when the column is absent
    pub fn try_get<T: FromCell>(&self, name: &str) -> OrmResult<T> {
        match self.position(name) {
            Some(i) => Ok(T::from_cell(name, self.get_str_index(i))),
            None => Err(OrmError::QueryFailed(format!("Column '{}' not found", name))),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (i, column) in self.columns.iter().enumerate() {
            let value = match self.get_str_index(i) {
                Some(text) => JsonValue::String(text.to_string()),
                None => JsonValue::Null,
            };
            map.insert(column.clone(), value);
        }
        JsonValue::Object(map)
    }
}

/// Coerce one optional text cell into a field type
///
/// The conversion never fails; it is deliberately lossy:
///
/// | target            | NULL      | unparseable |
/// |-------------------|-----------|-------------|
/// | integers          | `0`       | `0`         |
/// | floats            | `0.0`     | `0.0`       |
/// | `bool`            | `false`   | `false` unless the text is `"1"` |
/// | `String`          | `""`      | raw text    |
/// | `Vec<u8>`         | empty     | UTF-8 bytes of the text |
/// | `Option<T>`       | `None`    | `Some(T's fallback)` |
///
/// Every lossy parse is logged at `debug` level with the column name.
pub trait FromCell: Sized {
    fn from_cell(column: &str, cell: Option<&str>) -> Self;
}

macro_rules! impl_from_cell_parse {
    ($($t:ty => $fallback:expr),* $(,)?) => {
        $(impl FromCell for $t {
            fn from_cell(column: &str, cell: Option<&str>) -> Self {
                match cell {
                    Some(text) => text.trim().parse::<$t>().unwrap_or_else(|_| {
                        debug!(column, text, target_type = stringify!($t), "lossy cell coercion");
                        $fallback
                    }),
                    None => $fallback,
                }
            }
        })*
    };
}

impl_from_cell_parse!(
    i8 => 0, i16 => 0, i32 => 0, i64 => 0, isize => 0,
    u8 => 0, u16 => 0, u32 => 0, u64 => 0, usize => 0,
    f32 => 0.0, f64 => 0.0,
);

impl FromCell for bool {
    fn from_cell(_column: &str, cell: Option<&str>) -> Self {
        cell == Some("1")
    }
}

impl FromCell for String {
    fn from_cell(_column: &str, cell: Option<&str>) -> Self {
        cell.map(str::to_string).unwrap_or_default()
    }
}

/// Cells are text, so blob bytes arrive UTF-8-decoded: valid UTF-8 round-trips,
/// any other byte sequence comes back with U+FFFD in place of the invalid
/// bytes. Store binary payloads that must survive exactly as hex or base64
/// text.
impl FromCell for Vec<u8> {
    fn from_cell(_column: &str, cell: Option<&str>) -> Self {
        cell.map(|s| s.as_bytes().to_vec()).unwrap_or_default()
    }
}

impl FromCell for chrono::DateTime<chrono::Utc> {
    fn from_cell(column: &str, cell: Option<&str>) -> Self {
        let parsed = cell.and_then(|text| {
            chrono::NaiveDateTime::parse_from_str(text, crate::value::TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
                .or_else(|| {
                    chrono::DateTime::parse_from_rfc3339(text)
                        .ok()
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                })
        });
        parsed.unwrap_or_else(|| {
            if let Some(text) = cell {
                debug!(column, text, "lossy timestamp coercion");
            }
            chrono::DateTime::<chrono::Utc>::default()
        })
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(column: &str, cell: Option<&str>) -> Self {
        cell.map(|text| T::from_cell(column, Some(text)))
    }
}
