use crate::database::Schema;
use crate::migration::dialect::Dialect;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Execution phase of a statement. Phases run in declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Create,
    Unique,
    ForeignKey,
}

impl Phase {
    /// A failing statement of a fatal phase aborts the migration.
    pub fn is_fatal(self) -> bool {
        matches!(self, Phase::Create)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::Unique => "unique",
            Phase::ForeignKey => "foreign_key",
        }
    }
}

/// What a statement does to the target schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable { primary_key: Option<String> },
    AddUnique { column: String },
    AddForeignKey { column: String, target_table: String, target_column: String },
}

/// One rendered schema statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub table: String,
    #[serde(flatten)]
    pub kind: StatementKind,
    pub sql: String,
}

impl Statement {
    pub fn phase(&self) -> Phase {
        match self.kind {
            StatementKind::CreateTable { .. } => Phase::Create,
            StatementKind::AddUnique { .. } => Phase::Unique,
            StatementKind::AddForeignKey { .. } => Phase::ForeignKey,
        }
    }
}

/// Ordering violations found by [`MigrationPlan::verify`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("Foreign key on '{table}.{column}' references table '{target}' before it is created")]
    TargetNotCreated { table: String, column: String, target: String },

    #[error("Foreign key on '{table}.{column}' references '{target}.{target_column}' before it is unique")]
    TargetNotUnique {
        table: String,
        column: String,
        target: String,
        target_column: String,
    },

    #[error("Statement for '{0}' runs in an earlier phase than the statement before it")]
    PhaseOrder(String),
}

/// Dialect-rendered schema statements in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub dialect: String,
    pub statements: Vec<Statement>,
}

impl MigrationPlan {
    /// Builds the plan: every table, then uniqueness for referenced non-key columns,
    /// then the foreign keys.
    pub fn build(schema: &Schema, dialect: &dyn Dialect) -> MigrationPlan {
        let mut statements = Vec::new();

        for table in &schema.tables {
            statements.push(Statement {
                table: table.name.clone(),
                kind: StatementKind::CreateTable {
                    primary_key: table.primary_key.clone(),
                },
                sql: dialect.create_table(table),
            });
        }

        let mut unique_targets = HashSet::<(String, String)>::new();
        for column in schema.tables.iter().flat_map(|table| table.foreign_keys()) {
            let target = column.references_table.as_deref().and_then(|name| schema.table(name));
            let target_column = target.zip(column.references_column.as_deref()).and_then(
                |(target, name)| target.column(name).map(|column| (target, column)),
            );
            let Some((target, target_column)) = target_column else {
                continue;
            };
            if target.is_primary_key(&target_column.name) {
                continue;
            }
            if unique_targets.insert((target.name.clone(), target_column.name.clone())) {
                statements.push(Statement {
                    table: target.name.clone(),
                    kind: StatementKind::AddUnique {
                        column: target_column.name.clone(),
                    },
                    sql: dialect.add_unique(target, target_column),
                });
            }
        }

        for table in &schema.tables {
            for column in table.foreign_keys() {
                let (Some(target_table), Some(target_column)) = (&column.references_table, &column.references_column)
                else {
                    continue;
                };
                statements.push(Statement {
                    table: table.name.clone(),
                    kind: StatementKind::AddForeignKey {
                        column: column.name.clone(),
                        target_table: target_table.clone(),
                        target_column: target_column.clone(),
                    },
                    sql: dialect.add_foreign_key(&table.name, &column.name, target_table, target_column),
                });
            }
        }

        MigrationPlan {
            dialect: dialect.name().to_owned(),
            statements,
        }
    }

    /// Statements of one phase, in order.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(move |statement| statement.phase() == phase)
    }

    /// Checks the ordering invariant: phases never go backwards, and every foreign key
    /// comes after the creation of its target table and, unless the target column is
    /// that table's primary key, after the target's uniqueness statement.
    pub fn verify(&self) -> Result<(), PlanError> {
        let mut created = HashSet::<&str>::new();
        let mut primary_keys = HashSet::<(&str, &str)>::new();
        let mut unique = HashSet::<(&str, &str)>::new();
        let mut phase = Phase::Create;
        for statement in &self.statements {
            if statement.phase() < phase {
                return Err(PlanError::PhaseOrder(statement.table.clone()));
            }
            phase = statement.phase();
            match &statement.kind {
                StatementKind::CreateTable { primary_key } => {
                    created.insert(statement.table.as_str());
                    if let Some(primary_key) = primary_key {
                        primary_keys.insert((statement.table.as_str(), primary_key.as_str()));
                    }
                }
                StatementKind::AddUnique { column } => {
                    unique.insert((statement.table.as_str(), column.as_str()));
                }
                StatementKind::AddForeignKey {
                    column,
                    target_table,
                    target_column,
                } => {
                    if !created.contains(target_table.as_str()) {
                        return Err(PlanError::TargetNotCreated {
                            table: statement.table.clone(),
                            column: column.clone(),
                            target: target_table.clone(),
                        });
                    }
                    let key = (target_table.as_str(), target_column.as_str());
                    if !primary_keys.contains(&key) && !unique.contains(&key) {
                        return Err(PlanError::TargetNotUnique {
                            table: statement.table.clone(),
                            column: column.clone(),
                            target: target_table.clone(),
                            target_column: target_column.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Renders the plan as a SQL script, one statement per paragraph.
    pub fn to_script(&self) -> String {
        let mut script = String::new();
        let mut current = None;
        for statement in &self.statements {
            if current != Some(statement.phase()) {
                current = Some(statement.phase());
                if !script.is_empty() {
                    script.push('\n');
                }
                script.push_str(&format!("-- {}\n", statement.phase().as_str()));
            }
            script.push_str(&statement.sql);
            script.push_str(";\n");
        }
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ColumnSchema;
    use crate::database::ColumnType;
    use crate::database::TableSchema;
    use crate::migration::dialect::MariaDbDialect;

    fn table(name: &str, primary_key: Option<&str>, columns: Vec<ColumnSchema>) -> TableSchema {
        let columns = columns
            .into_iter()
            .map(|mut column| {
                column.is_primary_key = primary_key == Some(column.name.as_str());
                column
            })
            .collect();
        TableSchema {
            name: name.to_owned(),
            columns,
            primary_key: primary_key.map(str::to_owned),
            row_count: 1,
        }
    }

    fn column(name: &str) -> ColumnSchema {
        ColumnSchema::new(name, ColumnType::Int, false)
    }

    fn foreign_key(name: &str, table: &str, target: &str) -> ColumnSchema {
        let mut column = column(name);
        column.is_foreign_key = true;
        column.references_table = Some(table.to_owned());
        column.references_column = Some(target.to_owned());
        column
    }

    fn school() -> Schema {
        Schema {
            tables: vec![
                table("enrollments", Some("enrollment_id"), vec![
                    column("enrollment_id"),
                    foreign_key("student_id", "students", "student_id"),
                    foreign_key("course_code", "courses", "code"),
                ]),
                table("students", Some("student_id"), vec![column("student_id")]),
                table("courses", Some("course_id"), vec![column("course_id"), column("code")]),
                table("labs", Some("lab_id"), vec![column("lab_id"), foreign_key("course_code", "courses", "code")]),
            ],
            relationships: Vec::new(),
        }
    }

    #[test]
    fn phases_are_ordered() {
        let plan = MigrationPlan::build(&school(), &MariaDbDialect);
        let phases = plan.statements.iter().map(Statement::phase).collect::<Vec<_>>();
        assert_eq!(
            phases,
            vec![
                Phase::Create,
                Phase::Create,
                Phase::Create,
                Phase::Create,
                Phase::Unique,
                Phase::ForeignKey,
                Phase::ForeignKey,
                Phase::ForeignKey,
            ]
        );
        assert_eq!(plan.dialect, "mariadb");
        assert!(plan.verify().is_ok());
    }

    #[test]
    fn unique_targets_are_deduplicated_and_skip_primary_keys() {
        let plan = MigrationPlan::build(&school(), &MariaDbDialect);
        let unique = plan.phase(Phase::Unique).collect::<Vec<_>>();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].table, "courses");
        assert_eq!(
            unique[0].sql,
            "ALTER TABLE `courses` ADD UNIQUE KEY `unique_courses_code` (`code`)"
        );
    }

    #[test]
    fn verify_rejects_foreign_key_before_unique() {
        let mut plan = MigrationPlan::build(&school(), &MariaDbDialect);
        plan.statements.retain(|statement| statement.phase() != Phase::Unique);
        assert_eq!(
            plan.verify(),
            Err(PlanError::TargetNotUnique {
                table: "enrollments".to_owned(),
                column: "course_code".to_owned(),
                target: "courses".to_owned(),
                target_column: "code".to_owned(),
            })
        );
    }

    #[test]
    fn verify_rejects_missing_target_table() {
        let mut plan = MigrationPlan::build(&school(), &MariaDbDialect);
        plan.statements.retain(|statement| statement.table != "students" || statement.phase() != Phase::Create);
        assert!(matches!(plan.verify(), Err(PlanError::TargetNotCreated { .. })));
    }

    #[test]
    fn verify_rejects_phase_regression() {
        let mut plan = MigrationPlan::build(&school(), &MariaDbDialect);
        let create = plan.statements[0].clone();
        plan.statements.push(create);
        assert_eq!(plan.verify(), Err(PlanError::PhaseOrder("enrollments".to_owned())));
    }

    #[test]
    fn script_groups_phases() {
        let plan = MigrationPlan::build(&school(), &MariaDbDialect);
        let script = plan.to_script();
        assert!(script.starts_with("-- create\nCREATE TABLE IF NOT EXISTS `enrollments`"));
        assert!(script.contains("\n-- unique\nALTER TABLE `courses` ADD UNIQUE KEY"));
        assert!(script.contains("\n-- foreign_key\nALTER TABLE `enrollments` ADD CONSTRAINT `fk_enrollments_student_id`"));
        assert_eq!(script.matches(";\n").count(), plan.statements.len());
    }
}
