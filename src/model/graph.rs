use super::Score;
use crate::error::ModelError;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, BTreeSet};

/// grain -> grains whose tables its foreign keys reference.
pub fn grain_dependencies(score: &Score) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut deps: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for grain in &score.grains {
        let entry = deps.entry(grain.name.as_str()).or_default();
        for table in &grain.tables {
            for fk in &table.foreign_keys {
                let target = fk.references.grain_or(&grain.name);
                if target != grain.name {
                    entry.insert(target);
                }
            }
        }
    }
    deps
}

/// Depth-first search keeping the current path; the first back edge found
/// yields the cycle, closed by repeating its first grain.
pub fn find_cycle<'a>(deps: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> Option<Vec<String>> {
    fn dfs<'a>(
        node: &'a str,
        deps: &BTreeMap<&'a str, BTreeSet<&'a str>>,
        path: &mut Vec<&'a str>,
        on_path: &mut BTreeSet<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Option<Vec<String>> {
        if done.contains(node) {
            return None;
        }
        if on_path.contains(node) {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        path.push(node);
        on_path.insert(node);
        for next in deps.get(node).into_iter().flatten() {
            if let Some(cycle) = dfs(*next, deps, path, on_path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        on_path.remove(node);
        done.insert(node);
        None
    }

    let mut done = BTreeSet::new();
    for node in deps.keys() {
        let mut path = Vec::new();
        let mut on_path = BTreeSet::new();
        if let Some(cycle) = dfs(*node, deps, &mut path, &mut on_path, &mut done) {
            return Some(cycle);
        }
    }
    None
}

/// Grains ordered so that referenced grains come first.
pub fn grain_order(score: &Score) -> Result<Vec<&str>, ModelError> {
    let deps = grain_dependencies(score);
    if let Some(cycle) = find_cycle(&deps) {
        return Err(ModelError::GrainCycle(cycle));
    }

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut indices = BTreeMap::new();
    for grain in &score.grains {
        indices.insert(grain.name.as_str(), graph.add_node(grain.name.as_str()));
    }
    for (grain, targets) in &deps {
        for target in targets {
            let target_idx = indices.get(target).ok_or_else(|| ModelError::Unknown {
                kind: "grain",
                name: target.to_string(),
            })?;
            if let Some(grain_idx) = indices.get(grain) {
                graph.add_edge(*target_idx, *grain_idx, ());
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        ModelError::GrainCycle(vec![graph[cycle.node_id()].to_string()])
    })?;
    Ok(sorted.into_iter().map(|idx| graph[idx]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, ForeignKey, Grain, Table, TableRef};

    fn grain_referencing(name: &str, targets: &[&str]) -> Grain {
        let mut table = Table::new("t", vec![Column::integer("id").not_null()], &["id"]);
        for target in targets {
            table.foreign_keys.push(ForeignKey {
                name: None,
                columns: vec!["id".into()],
                references: TableRef {
                    grain: Some(target.to_string()),
                    table: "t".into(),
                },
                on_delete: Default::default(),
                on_update: Default::default(),
            });
        }
        let mut grain = Grain::new(name);
        grain.tables.push(table);
        grain
    }

    #[test]
    fn test_referenced_grains_come_first() {
        let score = Score::new(vec![
            grain_referencing("sales", &["core", "crm"]),
            grain_referencing("crm", &["core"]),
            grain_referencing("core", &[]),
        ]);
        let order = grain_order(&score).unwrap();
        let pos = |g: &str| order.iter().position(|o| *o == g).unwrap();
        assert!(pos("core") < pos("crm"));
        assert!(pos("crm") < pos("sales"));
    }

    #[test]
    fn test_cycle_is_reported_with_full_path() {
        let score = Score::new(vec![
            grain_referencing("a", &["b"]),
            grain_referencing("b", &["c"]),
            grain_referencing("c", &["a"]),
        ]);
        assert_eq!(
            grain_order(&score),
            Err(ModelError::GrainCycle(vec![
                "a".into(),
                "b".into(),
                "c".into(),
                "a".into()
            ]))
        );
    }

    #[test]
    fn test_backtracking_does_not_report_false_cycle() {
        // diamond: a -> b -> d, a -> c -> d
        let score = Score::new(vec![
            grain_referencing("a", &["b", "c"]),
            grain_referencing("b", &["d"]),
            grain_referencing("c", &["d"]),
            grain_referencing("d", &[]),
        ]);
        assert!(find_cycle(&grain_dependencies(&score)).is_none());
    }

    #[test]
    fn test_self_references_are_ignored() {
        let score = Score::new(vec![grain_referencing("a", &["a"])]);
        assert_eq!(grain_order(&score).unwrap(), vec!["a"]);
    }
}
