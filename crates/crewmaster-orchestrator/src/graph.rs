use crewmaster_core::TaskSpec;
use std::collections::VecDeque;

/// Whether the task dependency graph contains a cycle.
///
/// Out-of-range dependencies are ignored here; structural checks catch them.
pub fn has_cycle(tasks: &[TaskSpec]) -> bool {
    // 0 = unvisited, 1 = in progress, 2 = done
    let mut state = vec![0u8; tasks.len()];
    (0..tasks.len()).any(|idx| dfs_cycle(tasks, idx, &mut state))
}

fn dfs_cycle(tasks: &[TaskSpec], idx: usize, state: &mut [u8]) -> bool {
    match state[idx] {
        1 => return true,
        2 => return false,
        _ => {}
    }
    state[idx] = 1;
    for &dep in &tasks[idx].depends_on {
        if dep < tasks.len() && dfs_cycle(tasks, dep, state) {
            return true;
        }
    }
    state[idx] = 2;
    false
}

/// Kahn's algorithm: an execution order where every task follows its
/// dependencies. `None` if the graph has a cycle.
///
/// Ties are broken by task index, so the order is stable.
pub fn topological_order(tasks: &[TaskSpec]) -> Option<Vec<usize>> {
    let n = tasks.len();
    let mut pending = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (idx, task) in tasks.iter().enumerate() {
        for &dep in task.depends_on.iter().filter(|d| **d < n) {
            pending[idx] += 1;
            dependents[dep].push(idx);
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|i| pending[*i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(idx) = ready.pop_front() {
        order.push(idx);
        for &next in &dependents[idx] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    (order.len() == n).then_some(order)
}
