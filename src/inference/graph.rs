//! Table-level dependency graph built from detected relationships.

use crate::inference::relationships::Relationship;
use petgraph::algo::is_cyclic_directed;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::Directed;
use petgraph::Graph;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

/// Directed graph with an edge `source_table -> target_table` per relationship.
///
/// Nodes are added in table order, so node indexes double as workbook positions.
pub struct DependencyGraph {
    graph: Graph<String, String, Directed>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new<'a>(tables: impl IntoIterator<Item = &'a str>, relationships: &[Relationship]) -> DependencyGraph {
        let mut graph = Graph::<String, String, Directed>::new();
        let mut node_map = HashMap::new();
        for table in tables {
            node_map
                .entry(table.to_owned())
                .or_insert_with(|| graph.add_node(table.to_owned()));
        }
        for relationship in relationships {
            let source = node_map.get(&relationship.source_table);
            let target = node_map.get(&relationship.target_table);
            if let Some((&source, &target)) = source.zip(target) {
                graph.add_edge(source, target, relationship.source_column.clone());
            }
        }
        DependencyGraph { graph, node_map }
    }

    /// `(source_table, target_table)` pairs, one per relationship.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| (self.graph[edge.source()].clone(), self.graph[edge.target()].clone()))
            .collect()
    }

    /// Tables the given table references.
    pub fn references(&self, table: &str) -> Vec<String> {
        let mut targets = match self.node_map.get(table) {
            Some(&node) => self.graph.neighbors(node).collect::<Vec<_>>(),
            None => Vec::new(),
        };
        targets.sort();
        targets.dedup();
        targets.into_iter().map(|node| self.graph[node].clone()).collect()
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Groups of tables that reference each other, each in workbook order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect::<Vec<_>>();
        cycles.sort();
        cycles
            .into_iter()
            .map(|component| component.into_iter().map(|node| self.graph[node].clone()).collect())
            .collect()
    }

    /// Parent-first table order: every referenced table comes before the tables
    /// referencing it. Tables inside a cycle keep workbook order; otherwise ties
    /// are broken by workbook position.
    pub fn load_order(&self) -> Vec<String> {
        let components = tarjan_scc(&self.graph)
            .into_iter()
            .map(|mut component| {
                component.sort();
                component
            })
            .collect::<Vec<_>>();
        let mut component_of = HashMap::<NodeIndex, usize>::new();
        for (index, component) in components.iter().enumerate() {
            for &node in component {
                component_of.insert(node, index);
            }
        }

        let mut dependencies = HashSet::<(usize, usize)>::new();
        for edge in self.graph.raw_edges() {
            let source = component_of[&edge.source()];
            let target = component_of[&edge.target()];
            if source != target {
                dependencies.insert((source, target));
            }
        }
        let mut pending = vec![0usize; components.len()];
        let mut dependents = vec![Vec::<usize>::new(); components.len()];
        for &(source, target) in &dependencies {
            pending[source] += 1;
            dependents[target].push(source);
        }

        let mut ready = components
            .iter()
            .enumerate()
            .filter(|(index, _)| pending[*index] == 0)
            .map(|(index, component)| (component[0], index))
            .collect::<BTreeSet<_>>();
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, index)) = ready.pop_first() {
            order.extend(components[index].iter().map(|&node| self.graph[node].clone()));
            for &dependent in &dependents[index] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert((components[dependent][0], dependent));
                }
            }
        }
        order
    }
}
