use crate::error::MigrateError;
use crate::migration::plan::MigrationPlan;
use crate::migration::plan::Phase;
use crate::store::TargetStore;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// A constraint statement the store refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedConstraint {
    pub phase: Phase,
    pub table: String,
    pub sql: String,
    pub message: String,
}

/// Result of applying a plan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub executed: usize,
    pub skipped: Vec<SkippedConstraint>,
}

/// Runs every plan statement in order.
///
/// Table creation runs as one unit: when a table cannot be created the phase is
/// rolled back, tables this run created are dropped on stores whose DDL is not
/// transactional, and the error is [`MigrateError::SchemaCreation`]. Failing
/// constraints are logged and collected in the outcome.
pub fn execute_plan(plan: &MigrationPlan, store: &mut dyn TargetStore) -> Result<PlanOutcome, MigrateError> {
    let mut outcome = PlanOutcome::default();

    store.begin()?;
    let mut created = Vec::new();
    match create_tables(plan, store, &mut created) {
        Ok(executed) => {
            store.commit()?;
            outcome.executed += executed;
        }
        Err(e) => {
            discard_tables(store, &created);
            return Err(e);
        }
    }

    let adds_foreign_keys = store.dialect().supports_added_foreign_keys();
    for statement in plan.statements.iter().filter(|statement| !statement.phase().is_fatal()) {
        let phase = statement.phase();
        let result = if phase == Phase::ForeignKey && !adds_foreign_keys {
            Err(format!(
                "{} does not support adding foreign keys to existing tables",
                store.dialect().name()
            ))
        } else {
            store.execute(&statement.sql).map_err(|e| e.to_string())
        };
        match result {
            Ok(()) => {
                debug!(phase = phase.as_str(), table = %statement.table, "Executed statement");
                outcome.executed += 1;
            }
            Err(message) => {
                warn!(
                    phase = phase.as_str(),
                    table = %statement.table,
                    error = %message,
                    "Skipped constraint"
                );
                outcome.skipped.push(SkippedConstraint {
                    phase,
                    table: statement.table.clone(),
                    sql: statement.sql.clone(),
                    message,
                });
            }
        }
    }
    info!(
        executed = outcome.executed,
        skipped = outcome.skipped.len(),
        "Applied schema plan"
    );
    Ok(outcome)
}

/// Executes the create phase, recording tables that did not exist before on
/// stores that cannot roll DDL back.
fn create_tables(plan: &MigrationPlan, store: &mut dyn TargetStore, created: &mut Vec<String>) -> Result<usize, MigrateError> {
    let track = !store.dialect().transactional_ddl();
    let mut executed = 0;
    for statement in plan.phase(Phase::Create) {
        let existed = track && store.table_exists(&statement.table)?;
        store
            .execute(&statement.sql)
            .map_err(|e| MigrateError::schema_creation(&statement.table, e))?;
        if track && !existed {
            created.push(statement.table.clone());
        }
        debug!(phase = Phase::Create.as_str(), table = %statement.table, "Executed statement");
        executed += 1;
    }
    Ok(executed)
}

fn discard_tables(store: &mut dyn TargetStore, created: &[String]) {
    if let Err(e) = store.rollback() {
        warn!(error = %e, "Failed to roll back table creation");
    }
    for table in created.iter().rev() {
        let sql = store.dialect().drop_table(table);
        match store.execute(&sql) {
            Ok(()) => debug!(table = %table, "Dropped table after failed creation"),
            Err(e) => warn!(table = %table, error = %e, "Failed to drop table after failed creation"),
        }
    }
}
