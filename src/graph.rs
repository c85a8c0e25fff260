//! Wait-for graph construction and cycle detection.
//!
//! The wait-for graph is derived fresh from entity state on every detection
//! pass and never updated incrementally. A cycle in it is, by definition, a
//! deadlock.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;
use crate::resource::ResourceId;
use crate::store::EntityStore;

/// One derived wait-for edge: a blocked process waiting on a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitForEdge {
    /// The blocked process.
    pub from: ProcessId,

    /// A process currently holding an instance of the contended resource.
    pub to: ProcessId,

    /// The contended resource.
    pub resource: ResourceId,
}

/// Derives the wait-for edge set from current entity state.
///
/// For each process with a pending request, one edge is emitted per distinct
/// holder of the requested resource, excluding the process itself. A request
/// for a resource nobody holds produces no edge (it is satisfiable next
/// tick). Output order is insertion order over processes, then over holders;
/// it carries no semantic meaning.
#[must_use]
pub fn build_wait_for_graph(store: &EntityStore) -> Vec<WaitForEdge> {
    let mut edges = Vec::new();
    for process in store.processes() {
        let Some(wanted) = &process.pending_request else {
            continue;
        };
        let Some(resource) = store.resource(wanted) else {
            continue;
        };
        for holder in resource.holders() {
            if holder != &process.id {
                edges.push(WaitForEdge {
                    from: process.id.clone(),
                    to: holder.clone(),
                    resource: wanted.clone(),
                });
            }
        }
    }
    edges
}

/// Returns true if the wait-for graph contains a directed cycle.
///
/// Depth-first traversal with a fully-visited set and a recursion-stack set,
/// starting from each process in list order and short-circuiting on the
/// first cycle found. Repeated calls without a state change yield the same
/// answer.
#[must_use]
pub fn has_cycle(edges: &[WaitForEdge], order: &[ProcessId]) -> bool {
    let mut adjacency: HashMap<&ProcessId, Vec<&ProcessId>> = HashMap::new();
    for edge in edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut visited: HashSet<&ProcessId> = HashSet::new();
    let mut rec_stack: HashSet<&ProcessId> = HashSet::new();

    for start in order {
        if !visited.contains(start) && dfs(start, &adjacency, &mut visited, &mut rec_stack) {
            return true;
        }
    }
    false
}

fn dfs<'a>(
    node: &'a ProcessId,
    adjacency: &HashMap<&'a ProcessId, Vec<&'a ProcessId>>,
    visited: &mut HashSet<&'a ProcessId>,
    rec_stack: &mut HashSet<&'a ProcessId>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);

    if let Some(neighbors) = adjacency.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if dfs(neighbor, adjacency, visited, rec_stack) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                return true;
            }
        }
    }

    rec_stack.remove(node);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn edge(from: &str, to: &str, resource: &str) -> WaitForEdge {
        WaitForEdge {
            from: ProcessId::from(from),
            to: ProcessId::from(to),
            resource: ResourceId::from(resource),
        }
    }

    fn ids(names: &[&str]) -> Vec<ProcessId> {
        names.iter().map(|n| ProcessId::from(*n)).collect()
    }

    #[test]
    fn test_two_cycle_detected() {
        let edges = vec![edge("P1", "P2", "R2"), edge("P2", "P1", "R1")];
        assert!(has_cycle(&edges, &ids(&["P1", "P2"])));
    }

    #[test]
    fn test_broken_cycle_not_detected() {
        let edges = vec![edge("P1", "P2", "R2")];
        assert!(!has_cycle(&edges, &ids(&["P1", "P2"])));
    }

    #[test]
    fn test_empty_graph_has_no_cycle() {
        assert!(!has_cycle(&[], &ids(&["P1", "P2", "P3"])));
    }

    #[test]
    fn test_long_cycle_detected() {
        let edges = vec![
            edge("P1", "P2", "R2"),
            edge("P2", "P3", "R3"),
            edge("P3", "P1", "R1"),
        ];
        assert!(has_cycle(&edges, &ids(&["P1", "P2", "P3"])));
    }

    #[test]
    fn test_diamond_without_back_edge_is_acyclic() {
        let edges = vec![
            edge("P1", "P2", "R2"),
            edge("P1", "P3", "R3"),
            edge("P2", "P4", "R4"),
            edge("P3", "P4", "R4"),
        ];
        assert!(!has_cycle(&edges, &ids(&["P1", "P2", "P3", "P4"])));
    }

    #[test]
    fn test_cycle_unreachable_from_first_start_still_found() {
        // P1 has no outgoing edges; the cycle lives in P2/P3.
        let edges = vec![edge("P2", "P3", "R3"), edge("P3", "P2", "R2")];
        assert!(has_cycle(&edges, &ids(&["P1", "P2", "P3"])));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let edges = vec![edge("P1", "P2", "R2"), edge("P2", "P1", "R1")];
        let order = ids(&["P1", "P2"]);
        assert_eq!(has_cycle(&edges, &order), has_cycle(&edges, &order));
    }

    #[test]
    fn test_build_graph_emits_edge_per_holder() {
        let mut store = EntityStore::new();
        store.add_process("P1").unwrap();
        store.add_process("P2").unwrap();
        store.add_process("P3").unwrap();
        store.add_resource("R4", 2).unwrap();

        // P2 and P3 each hold an instance of R4; P1 waits on it.
        let r4 = ResourceId::from("R4");
        store.process_mut(&ProcessId::from("P1")).unwrap().pending_request = Some(r4.clone());
        store.process_mut(&ProcessId::from("P2")).unwrap().held = vec![r4.clone()];
        store.process_mut(&ProcessId::from("P3")).unwrap().held = vec![r4.clone()];
        store.resource_mut(&r4).unwrap().allocated_to =
            vec![ProcessId::from("P2"), ProcessId::from("P3")];

        let edges = build_wait_for_graph(&store);
        assert_eq!(edges, vec![edge("P1", "P2", "R4"), edge("P1", "P3", "R4")]);
    }

    #[test]
    fn test_build_graph_skips_unheld_resource() {
        let mut store = EntityStore::new();
        store.add_process("P1").unwrap();
        store.add_resource("R1", 1).unwrap();
        store.process_mut(&ProcessId::from("P1")).unwrap().pending_request =
            Some(ResourceId::from("R1"));

        assert!(build_wait_for_graph(&store).is_empty());
    }

    #[test]
    fn test_build_graph_excludes_self_edges() {
        // Contrived: a second holder alongside the requester would be the
        // only edge source; the requester itself never appears as `to`.
        let mut store = EntityStore::new();
        store.add_process("P1").unwrap();
        store.add_process("P2").unwrap();
        store.add_resource("R4", 2).unwrap();

        let r4 = ResourceId::from("R4");
        store.process_mut(&ProcessId::from("P1")).unwrap().held = vec![r4.clone()];
        store.process_mut(&ProcessId::from("P2")).unwrap().pending_request = Some(r4.clone());
        {
            let resource: &mut Resource = store.resource_mut(&r4).unwrap();
            resource.allocated_to = vec![ProcessId::from("P1")];
        }

        let edges = build_wait_for_graph(&store);
        assert_eq!(edges, vec![edge("P2", "P1", "R4")]);
    }
}
