use crate::spreadsheet::SpreadsheetError;
use glob::Pattern;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

/// Text values treated as missing when no other list is configured.
pub const DEFAULT_NULL_LITERALS: &[&str] = &[
    "", "#N/A", "N/A", "NA", "NULL", "NaN", "nan", "null", "None", "n/a", "<NA>",
];

/// User-facing options for reading a workbook.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Glob patterns selecting sheets by name. Every sheet is read when empty.
    pub sheets: Vec<String>,
    /// Text cell values read as missing.
    pub null_literals: BTreeSet<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            sheets: Vec::new(),
            null_literals: DEFAULT_NULL_LITERALS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ReadOptions {
    /// Compiles the options into reading criteria.
    pub(crate) fn criteria(&self) -> Result<Criteria, SpreadsheetError> {
        let sheet_name_patterns = if self.sheets.is_empty() {
            None
        } else {
            let patterns = self
                .sheets
                .iter()
                .map(|pattern| Pattern::new(pattern))
                .collect::<Result<Vec<_>, _>>()?;
            Some(patterns)
        };
        Ok(Criteria {
            sheet_name_patterns,
            nulls: self.null_literals.clone(),
        })
    }
}

/// Criteria for selecting sheets and interpreting cell text.
#[derive(Clone, Debug, Default)]
pub(crate) struct Criteria {
    /// Sheet name patterns for filtering which sheets to process.
    pub(crate) sheet_name_patterns: Option<Vec<Pattern>>,

    /// Null literals.
    pub(crate) nulls: BTreeSet<String>,
}

impl Criteria {
    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }

    /// Returns true when the text should be read as a missing value.
    pub(crate) fn is_null(&self, text: &str) -> bool {
        self.nulls.contains(text)
    }
}
