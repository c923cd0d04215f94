//! Kahn's-algorithm topological batching over a scoped set of tasks.

use crate::domain::{Dependency, DependencyType, Task};
use crate::id::EntityId;
use crate::store::IsTerminal;
use std::collections::{HashMap, HashSet, VecDeque};

/// Partition `tasks` into ordered execution batches: batch 0 can start
/// immediately, batch 1 once everything in batch 0 completes, and so on.
///
/// Terminal-status tasks are dropped before batching (they impose no further
/// ordering constraint and have nothing left to execute). `blocks_edges`
/// should already be restricted to `BLOCKS` edges touching this scope; edges
/// whose `from` or `to` falls outside `tasks` are ignored, since a blocker
/// outside scope is not something this batching run can schedule anyway.
///
/// Within a batch, tasks are ordered by priority (high first), then
/// complexity (ascending, so quick wins surface first), then creation time
/// (oldest first).
#[must_use]
pub fn compute_batches(
    tasks: &[Task],
    blocks_edges: &[Dependency],
    is_terminal: &IsTerminal,
) -> Vec<Vec<EntityId>> {
    let active: HashMap<EntityId, &Task> = tasks
        .iter()
        .filter(|t| !is_terminal(&t.status))
        .map(|t| (t.id, t))
        .collect();

    // dependents[from] = tasks that become unblocked once `from` completes.
    let mut dependents: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
    let mut in_degree: HashMap<EntityId, usize> = active.keys().map(|id| (*id, 0)).collect();

    for dep in blocks_edges {
        if dep.dep_type != DependencyType::Blocks {
            continue;
        }
        if !active.contains_key(&dep.from) || !active.contains_key(&dep.to) {
            continue;
        }
        // `to` cannot complete until `from` completes: `from` precedes `to`.
        dependents.entry(dep.from).or_default().push(dep.to);
        *in_degree.entry(dep.to).or_insert(0) += 1;
    }

    let mut remaining: HashSet<EntityId> = active.keys().copied().collect();
    let mut batches = Vec::new();

    while !remaining.is_empty() {
        let mut ready: Vec<EntityId> = remaining
            .iter()
            .copied()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();

        if ready.is_empty() {
            // Leftover tasks form a cycle that should have been rejected at
            // edge-insertion time; surface them as one final batch rather
            // than looping forever or silently dropping them.
            ready = remaining.iter().copied().collect();
        }

        ready.sort_by(|a, b| {
            let ta = active[a];
            let tb = active[b];
            ta.priority
                .cmp(&tb.priority)
                .then(ta.complexity.cmp(&tb.complexity))
                .then(ta.created_at.cmp(&tb.created_at))
        });

        let mut queue: VecDeque<EntityId> = ready.iter().copied().collect();
        for id in &ready {
            remaining.remove(id);
        }
        while let Some(id) = queue.pop_front() {
            if let Some(deps) = dependents.get(&id) {
                for dependent in deps {
                    if let Some(count) = in_degree.get_mut(dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        batches.push(ready);
    }

    batches
}
