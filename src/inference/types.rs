//! Column type inference.
//!
//! Rules are tried in priority order and the first one that accepts every present
//! value decides the storage type. Text always accepts, so inference never fails.

use crate::database::ColumnType;
use crate::spreadsheet::CellValue;

/// Inferred storage facts of one column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InferredType {
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// One type inference rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeRule {
    /// Every value is an integer; narrowest integer type covering the range
    Integer,
    /// Every value is numeric with at least one fraction
    Decimal,
    /// Every value is a datetime
    DateTime,
    /// Every value is a boolean
    Boolean,
    /// Fallback: sized string
    Text,
}

impl TypeRule {
    /// Rules in the order they are tried.
    pub const PRIORITY: [TypeRule; 5] = [
        TypeRule::Integer,
        TypeRule::Decimal,
        TypeRule::DateTime,
        TypeRule::Boolean,
        TypeRule::Text,
    ];

    /// Applies the rule to the present values of a column, `None` when it does not match.
    pub fn apply(self, values: &[&CellValue]) -> Option<ColumnType> {
        match self {
            TypeRule::Integer => {
                let integers = values
                    .iter()
                    .map(|value| value.as_integer())
                    .collect::<Option<Vec<_>>>()?;
                let min = integers.iter().min()?;
                let max = integers.iter().max()?;
                Some(ColumnType::integer_for_range(*min, *max))
            }
            TypeRule::Decimal => values
                .iter()
                .all(|value| matches!(value, CellValue::Int(_) | CellValue::Float(_)))
                .then_some(ColumnType::Decimal),
            TypeRule::DateTime => values
                .iter()
                .all(|value| matches!(value, CellValue::DateTime(_)))
                .then_some(ColumnType::DateTime),
            TypeRule::Boolean => values
                .iter()
                .all(|value| matches!(value, CellValue::Bool(_)))
                .then_some(ColumnType::Boolean),
            TypeRule::Text => {
                let max_length = values
                    .iter()
                    .filter_map(|value| value.render())
                    .map(|text| text.chars().count())
                    .max()
                    .unwrap_or(0);
                Some(ColumnType::string_for_length(max_length))
            }
        }
    }
}

/// Infers the storage type and nullability of a column from all of its values.
///
/// A column without any present value is `TEXT` and nullable.
pub fn infer_column_type(values: &[CellValue]) -> InferredType {
    let present = values.iter().filter(|value| !value.is_null()).collect::<Vec<_>>();
    let nullable = present.len() < values.len();
    if present.is_empty() {
        return InferredType {
            column_type: ColumnType::Text,
            nullable: true,
        };
    }

    let column_type = TypeRule::PRIORITY
        .iter()
        .find_map(|rule| rule.apply(&present))
        .unwrap_or(ColumnType::Text);
    InferredType { column_type, nullable }
}
