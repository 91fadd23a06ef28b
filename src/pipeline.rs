//! End-to-end entry points: analyze a workbook, render its plan, migrate it.

use crate::config::Config;
use crate::database::Schema;
use crate::database::Table;
use crate::error::MigrateError;
use crate::error::Result;
use crate::inference::infer_schema;
use crate::inference::normalize::normalize_sheets;
use crate::migration::execute_plan;
use crate::migration::load_tables;
use crate::migration::Dialect;
use crate::migration::MigrationPlan;
use crate::migration::SkippedConstraint;
use crate::spreadsheet::RawSheet;
use crate::spreadsheet::ReadOptions;
use crate::spreadsheet::Workbook;
use crate::store;
use crate::store::TargetStore;
use serde::Serialize;
use std::path::Path;
use tracing::info;
use tracing::warn;

/// A sheet that could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    pub message: String,
}

/// Inferred structure of a workbook, free of side effects.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub workbook: String,
    pub schema: Schema,
    /// Groups of mutually referencing tables
    pub cycles: Vec<Vec<String>>,
    pub skipped_sheets: Vec<SkippedSheet>,
}

/// A workbook read, normalized and analyzed, ready to be planned or migrated.
pub struct PreparedWorkbook {
    pub analysis: Analysis,
    pub tables: Vec<Table>,
}

impl PreparedWorkbook {
    /// Reads a workbook file.
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        let mut workbook = Workbook::open(path)?;
        Self::read(&mut workbook, options)
    }

    /// Reads a workbook held in memory.
    pub fn from_bytes(name: &str, bytes: Vec<u8>, options: &ReadOptions) -> Result<Self> {
        let mut workbook = Workbook::from_bytes(name, bytes)?;
        Self::read(&mut workbook, options)
    }

    fn read(workbook: &mut Workbook, options: &ReadOptions) -> Result<Self> {
        let (sheets, failures) = workbook.read_sheets(options)?;
        let skipped = failures
            .into_iter()
            .map(|(sheet, error)| SkippedSheet {
                sheet,
                message: error.to_string(),
            })
            .collect();
        Self::from_sheets(workbook.name(), sheets, skipped)
    }

    /// Analyzes sheets that were already read.
    pub fn from_sheets(name: &str, sheets: Vec<RawSheet>, skipped_sheets: Vec<SkippedSheet>) -> Result<Self> {
        let tables = normalize_sheets(&sheets);
        if tables.is_empty() {
            return Err(MigrateError::NoUsableData(name.to_owned()));
        }

        let schema = infer_schema(&tables);
        let cycles = schema.graph().cycles();
        for cycle in &cycles {
            warn!(tables = ?cycle, "Tables reference each other");
        }
        info!(workbook = name, tables = tables.len(), "Analyzed workbook");

        Ok(PreparedWorkbook {
            analysis: Analysis {
                workbook: name.to_owned(),
                schema,
                cycles,
                skipped_sheets,
            },
            tables,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.analysis.schema
    }

    /// Builds the statement plan in `dialect`, checking its ordering.
    pub fn plan(&self, dialect: &dyn Dialect) -> Result<MigrationPlan> {
        let plan = MigrationPlan::build(self.schema(), dialect);
        plan.verify()?;
        Ok(plan)
    }

    /// Creates the schema in `store` and loads every table.
    pub fn migrate_into(&self, store: &mut dyn TargetStore, batch_size: usize) -> Result<MigrationReport> {
        let plan = self.plan(store.dialect())?;
        let outcome = execute_plan(&plan, store)?;
        let counts = load_tables(self.schema(), &self.tables, store, batch_size)?;

        let tables = self
            .schema()
            .tables
            .iter()
            .map(|table| TableReport {
                name: table.name.clone(),
                column_count: table.columns.len(),
                primary_key: table.primary_key.clone(),
                rows_inserted: counts.get(&table.name).copied().unwrap_or(0),
                columns: table
                    .columns
                    .iter()
                    .map(|column| ColumnReport {
                        name: column.name.clone(),
                        data_type: column.column_type.to_string(),
                        nullable: column.nullable,
                        primary_key: column.is_primary_key,
                        foreign_key: column.is_foreign_key,
                        references: column.references(),
                    })
                    .collect(),
            })
            .collect();

        let report = MigrationReport {
            workbook: self.analysis.workbook.clone(),
            store: store.name(),
            tables,
            statements_executed: outcome.executed,
            skipped_constraint_count: outcome.skipped.len(),
            skipped_constraints: outcome.skipped,
            cycles: self.analysis.cycles.clone(),
        };
        info!(
            workbook = %report.workbook,
            store = %report.store,
            tables = report.tables.len(),
            rows = report.total_rows(),
            skipped_constraints = report.skipped_constraint_count,
            "Migration complete"
        );
        Ok(report)
    }
}

/// Per-column metadata of a migrated table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    /// `table.column` the foreign key points to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub column_count: usize,
    pub primary_key: Option<String>,
    pub rows_inserted: usize,
    pub columns: Vec<ColumnReport>,
}

/// Outcome of a completed migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub workbook: String,
    pub store: String,
    pub tables: Vec<TableReport>,
    pub statements_executed: usize,
    pub skipped_constraint_count: usize,
    pub skipped_constraints: Vec<SkippedConstraint>,
    pub cycles: Vec<Vec<String>>,
}

impl MigrationReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|table| table.rows_inserted).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// Analyzes a workbook file.
pub fn analyze(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Analysis> {
    PreparedWorkbook::open(path, options).map(|prepared| prepared.analysis)
}

/// Analyzes a workbook held in memory.
pub fn analyze_bytes(name: &str, bytes: Vec<u8>, options: &ReadOptions) -> Result<Analysis> {
    PreparedWorkbook::from_bytes(name, bytes, options).map(|prepared| prepared.analysis)
}

/// Analyzes sheets supplied by the caller.
pub fn analyze_sheets(name: &str, sheets: Vec<RawSheet>) -> Result<Analysis> {
    PreparedWorkbook::from_sheets(name, sheets, Vec::new()).map(|prepared| prepared.analysis)
}

/// Migrates a workbook file into the store described by `config.target`.
///
/// The workbook is fully read and analyzed before the store is opened, so input
/// errors never touch the target.
pub fn migrate(path: impl AsRef<Path>, config: &Config) -> Result<MigrationReport> {
    config.validate()?;
    config.target.validate_connection()?;
    let prepared = PreparedWorkbook::open(path, &config.read)?;
    let mut store = store::open(&config.target)?;
    prepared.migrate_into(store.as_mut(), config.target.batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::spreadsheet::CellValue;
    use crate::store::DuckDbStore;

    fn sheet(name: &str, header: &[&str], rows: Vec<Vec<CellValue>>) -> RawSheet {
        RawSheet::new(name, header.iter().map(|&h| CellValue::from(h)).collect(), rows)
    }

    fn ints(values: &[i64]) -> Vec<CellValue> {
        values.iter().map(|&v| CellValue::Int(v)).collect()
    }

    #[test]
    fn empty_sheets_are_no_usable_data() {
        let error = analyze_sheets("blank.xlsx", vec![sheet("Sheet1", &["a"], Vec::new())]).unwrap_err();
        assert!(matches!(error, MigrateError::NoUsableData(ref name) if name == "blank.xlsx"));
        assert!(error.is_input_error());
    }

    #[test]
    fn analysis_reports_schema() {
        let analysis = analyze_sheets(
            "school.xlsx",
            vec![
                sheet("Students", &["student_id", "name"], vec![
                    vec![CellValue::Int(1), CellValue::from("Ann")],
                    vec![CellValue::Int(2), CellValue::from("Bob")],
                ]),
                sheet("Enrollments", &["student_id", "course"], vec![
                    vec![CellValue::Int(1), CellValue::from("Math")],
                    vec![CellValue::Int(1), CellValue::from("Art")],
                ]),
            ],
        )
        .unwrap();
        assert_eq!(analysis.schema.tables.len(), 2);
        assert_eq!(analysis.schema.relationships.len(), 1);
        assert!(analysis.cycles.is_empty());
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["schema"]["tables"][0]["name"], "students");
    }

    #[test]
    fn migrates_into_memory_store() {
        let prepared = PreparedWorkbook::from_sheets(
            "numbers.xlsx",
            vec![sheet("Numbers", &["id"], vec![ints(&[1]), ints(&[2]), ints(&[3])])],
            Vec::new(),
        )
        .unwrap();
        let mut store = DuckDbStore::open(&TargetConfig::memory()).unwrap();
        let report = prepared.migrate_into(&mut store, 2).unwrap();
        assert_eq!(report.total_rows(), 3);
        assert_eq!(report.statements_executed, 1);
        let numbers = report.table("numbers").unwrap();
        assert_eq!(numbers.primary_key.as_deref(), Some("id"));
        assert_eq!(numbers.columns[0].data_type, "TINYINT");
    }

    #[test]
    fn migrate_requires_a_target_database() {
        let error = migrate("unused.xlsx", &Config::default()).unwrap_err();
        assert!(matches!(error, MigrateError::Config(ref message) if message == "target.database is required"));
    }
}
