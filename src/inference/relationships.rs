//! Foreign key discovery from value containment and naming conventions.

use crate::database::Table;
use crate::inference::keys::unique_columns;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Share of a source column's distinct values that must exist in the target
/// for a name-backed match.
pub const OVERLAP_THRESHOLD: f64 = 0.8;

/// Naming conventions that back a partial value overlap, tried in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingRule {
    /// `{table}_id`
    TableUnderscoreId,
    /// `{table}id`
    TableId,
    /// ends with `_id` and mentions the target table
    IdSuffixWithTable,
    /// target column is `id` and the source mentions the target table
    TargetIdWithTable,
    /// same name ending with `_id`
    SameIdColumn,
    /// same name containing `name`
    SameNameColumn,
}

impl NamingRule {
    pub const ALL: [NamingRule; 6] = [
        NamingRule::TableUnderscoreId,
        NamingRule::TableId,
        NamingRule::IdSuffixWithTable,
        NamingRule::TargetIdWithTable,
        NamingRule::SameIdColumn,
        NamingRule::SameNameColumn,
    ];

    /// Tests the rule against lower-cased source column, target column and target table names.
    pub fn matches(self, source: &str, target: &str, table: &str) -> bool {
        match self {
            NamingRule::TableUnderscoreId => source == format!("{}_id", table),
            NamingRule::TableId => source == format!("{}id", table),
            NamingRule::IdSuffixWithTable => source.ends_with("_id") && source.contains(table),
            NamingRule::TargetIdWithTable => target == "id" && source.contains(table),
            NamingRule::SameIdColumn => source == target && source.ends_with("_id"),
            NamingRule::SameNameColumn => source == target && source.contains("name"),
        }
    }

    /// First rule matching the names, if any.
    pub fn find(source: &str, target: &str, table: &str) -> Option<NamingRule> {
        let source = source.to_lowercase();
        let target = target.to_lowercase();
        let table = table.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|rule| rule.matches(&source, &target, &table))
    }
}

/// Why a relationship was accepted.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Every source value exists in the target column
    Containment,
    /// Most source values exist in the target and a naming rule matched
    Overlap { ratio: f64, rule: NamingRule },
}

/// A detected foreign key `source_table.source_column -> target_table.target_column`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relationship {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub evidence: Evidence,
}

/// Value overlap between a source column and a candidate target column.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Overlap {
    /// Distinct source values found in the target
    pub shared: usize,
    /// Every distinct source value is in the target
    pub contains: bool,
    /// `shared` over the distinct source count, 0 for an empty source
    pub ratio: f64,
}

impl Overlap {
    pub fn measure(source: &HashSet<String>, target: &HashSet<String>) -> Overlap {
        let shared = source.intersection(target).count();
        let ratio = if source.is_empty() {
            0.0
        } else {
            shared as f64 / source.len() as f64
        };
        Overlap {
            shared,
            contains: shared == source.len(),
            ratio,
        }
    }
}

/// Decides whether `source -> table.target` is a foreign key.
fn evidence(source: &str, target: &str, table: &str, overlap: Overlap) -> Option<Evidence> {
    if overlap.contains {
        return Some(Evidence::Containment);
    }
    if overlap.ratio > OVERLAP_THRESHOLD {
        return NamingRule::find(source, target, table).map(|rule| Evidence::Overlap {
            ratio: overlap.ratio,
            rule,
        });
    }
    None
}

/// Finds at most one foreign key per column across all tables.
///
/// Tables are visited in the given order and columns in declared order; for each
/// source column the first matching unique target column wins. A column is never
/// compared against its own table, and a column without present values never matches.
pub fn detect_relationships(tables: &[Table]) -> Vec<Relationship> {
    let distinct = tables
        .iter()
        .map(|table| table.columns.iter().map(|column| column.distinct_values()).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let unique = tables.iter().map(unique_columns).collect::<Vec<_>>();

    let mut relationships = Vec::new();
    for (source_index, source_table) in tables.iter().enumerate() {
        for (column_index, source_column) in source_table.columns.iter().enumerate() {
            let values = &distinct[source_index][column_index];
            if values.is_empty() {
                continue;
            }
            let found = tables
                .iter()
                .enumerate()
                .filter(|(target_index, _)| *target_index != source_index)
                .flat_map(|(target_index, target_table)| {
                    unique[target_index]
                        .iter()
                        .map(move |&target_column| (target_index, target_table, target_column))
                })
                .find_map(|(target_index, target_table, target_column)| {
                    let target_name = &target_table.columns[target_column].name;
                    let overlap = Overlap::measure(values, &distinct[target_index][target_column]);
                    evidence(&source_column.name, target_name, &target_table.name, overlap).map(|evidence| {
                        Relationship {
                            source_table: source_table.name.clone(),
                            source_column: source_column.name.clone(),
                            target_table: target_table.name.clone(),
                            target_column: target_name.clone(),
                            evidence,
                        }
                    })
                });
            if let Some(relationship) = found {
                debug!(
                    source = %format!("{}.{}", relationship.source_table, relationship.source_column),
                    target = %format!("{}.{}", relationship.target_table, relationship.target_column),
                    evidence = ?relationship.evidence,
                    "Detected relationship"
                );
                relationships.push(relationship);
            }
        }
    }
    relationships
}
