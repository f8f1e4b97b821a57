use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Schemas keyed by model name.
pub type SchemaSet = BTreeMap<String, Arc<Schema>>;

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Creation-order report for a set of schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraphReport {
    pub summary: DependencyGraphSummary,
    pub order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Returned by [`resolve_order`] when some models can never become ready.
///
/// Not an error: the caller decides how cycles are handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSignal {
    /// Models whose dependencies never resolved, sorted by name.
    pub unresolved: Vec<String>,
}

/// Models whose tables must exist before `schema`'s table can be created.
///
/// Only relations that own a foreign key count. Self references and repeated
/// targets are dropped; order follows first occurrence.
pub fn dependencies(schema: &Schema) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut deps = Vec::new();

    for (_, relation) in schema.owned_foreign_keys() {
        if relation.model == schema.name {
            continue;
        }
        if seen.insert(relation.model.as_str()) {
            deps.push(relation.model.clone());
        }
    }

    deps
}

/// Dependencies for every schema that has at least one.
pub fn dependency_map(schemas: &SchemaSet) -> BTreeMap<String, Vec<String>> {
    schemas
        .iter()
        .filter_map(|(name, schema)| {
            let deps = dependencies(schema);
            if deps.is_empty() {
                None
            } else {
                Some((name.clone(), deps))
            }
        })
        .collect()
}

/// Order `schemas` so every model follows the models it depends on.
///
/// Dependencies on models outside `schemas` are not graph nodes; they are
/// assumed satisfiable and checked later against the store. Ready models are
/// taken in name order, so the result is reproducible.
pub fn resolve_order(schemas: &SchemaSet) -> Result<Vec<String>, CycleSignal> {
    let graph = build_adjacency(schemas);
    toposort(&graph)
}

/// Find one dependency cycle among `schemas`.
///
/// Depth-first search with an explicit stack. Start nodes are taken in name
/// order and edges in dependency order, so the same input always yields the
/// same chain. The chain starts at the node that closes the cycle; it is not
/// necessarily the shortest one. Empty when the graph is acyclic.
pub fn find_cycle(schemas: &SchemaSet) -> Vec<String> {
    let edges: BTreeMap<&str, Vec<String>> = schemas
        .iter()
        .map(|(name, schema)| {
            let deps = dependencies(schema)
                .into_iter()
                .filter(|dep| schemas.contains_key(dep))
                .collect();
            (name.as_str(), deps)
        })
        .collect();

    let mut visited: BTreeSet<&str> = BTreeSet::new();

    for start in edges.keys().copied() {
        if visited.contains(start) {
            continue;
        }

        // Each frame is a node on the current path and the next edge to try.
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut path: Vec<&str> = vec![start];
        let mut on_path: BTreeSet<&str> = BTreeSet::from([start]);
        visited.insert(start);

        while let Some((node, next_edge)) = stack.last_mut() {
            let deps = edges.get(*node).map(Vec::as_slice).unwrap_or(&[]);

            let Some(dep) = deps.get(*next_edge) else {
                on_path.remove(*node);
                path.pop();
                stack.pop();
                continue;
            };
            *next_edge += 1;
            let dep = dep.as_str();

            if on_path.contains(dep) {
                let from = path.iter().position(|item| *item == dep).unwrap_or(0);
                return path[from..].iter().map(|item| item.to_string()).collect();
            }

            if visited.insert(dep) {
                on_path.insert(dep);
                path.push(dep);
                stack.push((dep, 0));
            }
        }
    }

    Vec::new()
}

/// Build a deterministic dependency report for a set of schemas.
pub fn build_dependency_report(schemas: &SchemaSet) -> DependencyGraphReport {
    let graph = build_adjacency(schemas);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencyGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => DependencyGraphReport {
            summary,
            order: Some(order),
            cycle: None,
        },
        Err(_) => DependencyGraphReport {
            summary,
            order: None,
            cycle: Some(find_cycle(schemas)),
        },
    }
}

/// Edges point from a depended-on model to its dependents.
fn build_adjacency(schemas: &SchemaSet) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (name, schema) in schemas {
        graph.entry(name.clone()).or_default();

        for dep in dependencies(schema) {
            if schemas.contains_key(&dep) {
                graph.entry(dep).or_default().insert(name.clone());
            }
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, CycleSignal> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let unresolved = indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node.to_string()) } else { None })
            .collect();
        Err(CycleSignal { unresolved })
    }
}
