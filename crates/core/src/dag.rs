// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! DAG dependency ordering for `Boss::enforce_task_dependencies` (§4.F).
//!
//! Implemented iteratively with an explicit stack and a `visiting` marker
//! (§9 design note), so a cycle reports the node that closed it instead of
//! blowing the call stack via recursive descent.

use crate::task::{Task, TaskId};
use std::collections::HashMap;

/// Topological sort detected a cycle; carries the id that closed the loop.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("circular dependency detected at task `{0}`")]
pub struct CircularDependency(pub TaskId);

impl crate::error::HasErrorKind for CircularDependency {
    fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::CircularDependency
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Stable topological sort of `tasks` by their `dependencies` edges.
///
/// Ties (no dependency relationship between two tasks) are broken by
/// original input order. Returns [`CircularDependency`] naming the task
/// whose visit closed a cycle.
pub fn topo_sort(tasks: &[Task]) -> Result<Vec<Task>, CircularDependency> {
    let index: HashMap<&TaskId, usize> = tasks.iter().enumerate().map(|(i, t)| (&t.id, i)).collect();
    let mut marks: HashMap<&TaskId, Mark> = HashMap::new();
    let mut order: Vec<usize> = Vec::with_capacity(tasks.len());

    for start in 0..tasks.len() {
        if marks.contains_key(&tasks[start].id) {
            continue;
        }
        visit(start, tasks, &index, &mut marks, &mut order)?;
    }

    Ok(order.into_iter().map(|i| tasks[i].clone()).collect())
}

fn visit<'a>(
    idx: usize,
    tasks: &'a [Task],
    index: &HashMap<&'a TaskId, usize>,
    marks: &mut HashMap<&'a TaskId, Mark>,
    order: &mut Vec<usize>,
) -> Result<(), CircularDependency> {
    // Explicit stack of (node, next-dependency-to-visit) frames, in
    // dependency-list order, so siblings keep their original relative order.
    let mut stack: Vec<(usize, usize)> = vec![(idx, 0)];
    marks.insert(&tasks[idx].id, Mark::Visiting);

    while let Some((node, dep_pos)) = stack.pop() {
        let deps: Vec<&TaskId> = tasks[node].dependencies.iter().collect();
        if dep_pos < deps.len() {
            // Re-push this frame to resume after the dependency below.
            stack.push((node, dep_pos + 1));

            let dep_id = deps[dep_pos];
            let Some(&dep_idx) = index.get(dep_id) else {
                // Dependency on an id outside this batch: treat as already
                // satisfied (it is not part of the DAG we are ordering).
                continue;
            };

            match marks.get(dep_id) {
                Some(Mark::Done) => continue,
                Some(Mark::Visiting) => {
                    return Err(CircularDependency(tasks[dep_idx].id.clone()));
                }
                None => {
                    marks.insert(dep_id, Mark::Visiting);
                    stack.push((dep_idx, 0));
                }
            }
        } else {
            marks.insert(&tasks[node].id, Mark::Done);
            order.push(node);
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
