use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;

/// Widest bounded string; longer text becomes `TEXT`.
pub const VARCHAR_LIMIT: usize = 255;

/// Extra room added to the longest observed string when sizing a `VARCHAR`.
pub const VARCHAR_HEADROOM: usize = 50;

/// Precision and scale of inferred decimal columns.
pub const DECIMAL_PRECISION: u8 = 10;
pub const DECIMAL_SCALE: u8 = 2;

/// Storage types a column can be inferred as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 8-bit signed integers
    TinyInt,
    /// 16-bit signed integers
    SmallInt,
    /// 32-bit signed integers
    Int,
    /// 64-bit signed integers
    BigInt,
    /// Fixed point `DECIMAL(10,2)`
    Decimal,
    /// Date and time
    DateTime,
    /// Boolean values (true/false)
    Boolean,
    /// Bounded strings of the given length
    Varchar(usize),
    /// Unbounded text
    Text,
}

impl ColumnType {
    /// Returns the smallest integer type covering `[min, max]`.
    pub fn integer_for_range(min: i64, max: i64) -> ColumnType {
        let fits = |lower: i64, upper: i64| min >= lower && max <= upper;
        if fits(i8::MIN.into(), i8::MAX.into()) {
            ColumnType::TinyInt
        } else if fits(i16::MIN.into(), i16::MAX.into()) {
            ColumnType::SmallInt
        } else if fits(i32::MIN.into(), i32::MAX.into()) {
            ColumnType::Int
        } else {
            ColumnType::BigInt
        }
    }

    /// Sizes a string column from its longest rendered value.
    pub fn string_for_length(max_length: usize) -> ColumnType {
        if max_length <= VARCHAR_LIMIT {
            ColumnType::Varchar((max_length + VARCHAR_HEADROOM).min(VARCHAR_LIMIT))
        } else {
            ColumnType::Text
        }
    }

    /// Returns true if this column type represents integer values.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt
        )
    }

    /// Returns true for `VARCHAR` and `TEXT`.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, ColumnType::Varchar(_) | ColumnType::Text)
    }

    /// Declared length of bounded string types.
    pub fn max_length(&self) -> Option<usize> {
        match self {
            ColumnType::Varchar(length) => Some(*length),
            _ => None,
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::TinyInt => f.write_str("TINYINT"),
            ColumnType::SmallInt => f.write_str("SMALLINT"),
            ColumnType::Int => f.write_str("INT"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Decimal => write!(f, "DECIMAL({},{})", DECIMAL_PRECISION, DECIMAL_SCALE),
            ColumnType::DateTime => f.write_str("DATETIME"),
            ColumnType::Boolean => f.write_str("BOOLEAN"),
            ColumnType::Varchar(length) => write!(f, "VARCHAR({})", length),
            ColumnType::Text => f.write_str("TEXT"),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Structural metadata of one column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Present only for bounded string types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_column: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            column_type,
            max_length: column_type.max_length(),
            nullable,
            is_primary_key: false,
            is_foreign_key: false,
            references_table: None,
            references_column: None,
        }
    }

    /// `table.column` of the referenced column, for foreign keys.
    pub fn references(&self) -> Option<String> {
        self.references_table
            .as_ref()
            .zip(self.references_column.as_ref())
            .map(|(table, column)| format!("{}.{}", table, column))
    }
}
