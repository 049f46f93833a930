//! Circular-dependency detection.

use std::collections::HashMap;

use super::Detector;
use crate::error::AnalyzerResult;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::naming;

/// Finds cycles in the relationship graph with a depth-first search.
///
/// Nodes are the scanned models held in an arena (indices, not object
/// references), and edges come only from relationship kinds that place a
/// foreign-key dependency on the related side. A correctly paired
/// `hasMany`/`belongsTo` association therefore contributes a single edge
/// and is never a cycle, and a self-referential `hasMany('children')` is a
/// tree, not a loop. Only the first cycle per component is reported.
pub struct CircularDependencyDetector;

impl Detector for CircularDependencyDetector {
    const NAME: &'static str = "CircularDependencyDetector";

    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()> {
        let nodes: Vec<&str> = result.models.iter().map(|m| m.class.as_str()).collect();
        let index: HashMap<&str, usize> =
            nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (from, model) in result.models.iter().enumerate() {
            for rel in &model.relationships {
                if !rel.kind.is_dependency_edge() {
                    continue;
                }
                let Some(related) = rel.related.as_deref() else {
                    continue;
                };
                // Edges to unscanned classes are dropped; self-edges are
                // not cycles.
                let Some(&to) = index.get(related) else {
                    continue;
                };
                if from != to && !adjacency[from].contains(&to) {
                    adjacency[from].push(to);
                }
            }
        }

        let mut visited = vec![false; nodes.len()];
        let mut in_path = vec![false; nodes.len()];
        let mut issues = Vec::new();

        for start in 0..nodes.len() {
            if visited[start] {
                continue;
            }
            let mut path = Vec::new();
            let Some(cycle) = dfs(start, &adjacency, &mut visited, &mut in_path, &mut path)
            else {
                continue;
            };

            let classes: Vec<&str> = cycle.iter().map(|&i| nodes[i]).collect();
            let mut display: Vec<&str> =
                classes.iter().map(|c| naming::class_basename(c)).collect();
            display.push(display[0]); // close the loop

            issues.push(
                Issue::new(
                    IssueKind::CircularDependency,
                    Severity::Error,
                    naming::class_basename(classes[0]),
                    format!("Circular relationship detected: {}", display.join(" → ")),
                )
                .suggest(
                    "Review these relationships and consider whether bidirectional \
                     navigation is truly needed, or break the cycle by removing one direction.",
                )
                .context("cycle", classes),
            );
        }

        result.issues.extend(issues);
        Ok(())
    }
}

/// DFS with a global visited set and an in-current-path set. On an edge to
/// a node already in the current path, the cycle is the path slice from
/// that node's first occurrence onward.
fn dfs(
    node: usize,
    adjacency: &[Vec<usize>],
    visited: &mut [bool],
    in_path: &mut [bool],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited[node] = true;
    in_path[node] = true;
    path.push(node);

    for &next in &adjacency[node] {
        if !visited[next] {
            if let Some(cycle) = dfs(next, adjacency, visited, in_path, path) {
                return Some(cycle);
            }
        } else if in_path[next] {
            let entry = path.iter().position(|&n| n == next).unwrap();
            return Some(path[entry..].to_vec());
        }
    }

    path.pop();
    in_path[node] = false;
    None
}
