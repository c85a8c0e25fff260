//! Deadlock resolution policy.
//!
//! The resolver picks a victim among the waiting processes and either
//! preempts one resource from it or aborts it. The whole decision is
//! planned as a pure sequence of inspectable stages; direct application
//! simply installs the final stage's state, so the "instant" and "stepped"
//! presentation modes replay the exact same logic.

use serde::{Deserialize, Serialize};

use crate::process::{Process, ProcessId, ProcessStatus};
use crate::resource::{Resource, ResourceId};
use crate::store::EntityStore;

/// A full copy of process and resource state at one resolution stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Processes in store order.
    pub processes: Vec<Process>,

    /// Resources in store order.
    pub resources: Vec<Resource>,
}

impl StateSnapshot {
    fn of(store: &EntityStore) -> Self {
        Self {
            processes: store.processes().to_vec(),
            resources: store.resources().to_vec(),
        }
    }
}

/// What a resolution pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Resolution {
    /// No process was waiting; nothing to resolve.
    NoCandidates,

    /// The victim held nothing, so it was aborted.
    Aborted {
        /// The aborted process.
        process: ProcessId,
    },

    /// One resource was preempted from the victim.
    Preempted {
        /// The victim, still running with its pending request.
        process: ProcessId,
        /// The resource taken from it (its earliest acquisition).
        resource: ResourceId,
    },
}

/// Which step of the resolution sequence a stage represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Collect the waiting processes.
    IdentifyCandidates,
    /// Order candidates and pick the victim.
    SelectVictim,
    /// Abort the victim or preempt a resource from it.
    Apply,
    /// Verify the resulting state.
    ConfirmStable,
}

/// One inspectable stage of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStage {
    /// Which step this stage represents.
    pub kind: StageKind,

    /// Human-readable description of what happened.
    pub description: String,

    /// Entity state after this stage.
    pub snapshot: StateSnapshot,

    /// Processes touched or spotlighted by this stage.
    pub highlighted_processes: Vec<ProcessId>,

    /// Resources touched or spotlighted by this stage.
    pub highlighted_resources: Vec<ResourceId>,
}

/// The complete, replayable outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// The stages in order; the last stage holds the final state.
    pub stages: Vec<ResolutionStage>,

    /// What the pass did.
    pub outcome: Resolution,
}

impl ResolutionPlan {
    /// State after the final stage.
    ///
    /// # Panics
    ///
    /// Never panics: a plan always contains at least one stage.
    #[must_use]
    pub fn final_state(&self) -> &StateSnapshot {
        &self
            .stages
            .last()
            .expect("a resolution plan always has stages")
            .snapshot
    }
}

/// Plans one resolution pass against the given state without mutating it.
///
/// Candidates are the processes with a pending request, ordered by
/// descending held-resource count; ties keep store order (the sort is
/// stable). The first candidate is the victim: if it holds nothing it is
/// aborted, otherwise its earliest-acquired resource is preempted from both
/// sides. With no waiting process the pass is a no-op.
#[must_use]
pub fn plan_resolution(store: &EntityStore) -> ResolutionPlan {
    let mut candidates: Vec<&Process> = store
        .processes()
        .iter()
        .filter(|p| p.is_waiting())
        .collect();
    candidates.sort_by(|a, b| b.held.len().cmp(&a.held.len()));

    let candidate_ids: Vec<ProcessId> = candidates.iter().map(|p| p.id.clone()).collect();
    let before = StateSnapshot::of(store);

    let mut stages = vec![ResolutionStage {
        kind: StageKind::IdentifyCandidates,
        description: if candidate_ids.is_empty() {
            "No process is waiting on a resource; nothing to resolve".to_string()
        } else {
            format!(
                "Waiting processes considered for resolution: {}",
                join_ids(&candidate_ids)
            )
        },
        snapshot: before.clone(),
        highlighted_processes: candidate_ids.clone(),
        highlighted_resources: Vec::new(),
    }];

    let Some(victim) = candidates.first().copied() else {
        stages.push(ResolutionStage {
            kind: StageKind::ConfirmStable,
            description: "State unchanged".to_string(),
            snapshot: before,
            highlighted_processes: Vec::new(),
            highlighted_resources: Vec::new(),
        });
        return ResolutionPlan {
            stages,
            outcome: Resolution::NoCandidates,
        };
    };

    stages.push(ResolutionStage {
        kind: StageKind::SelectVictim,
        description: format!(
            "Selected {} as victim (holds {} resource{})",
            victim.id,
            victim.held.len(),
            if victim.held.len() == 1 { "" } else { "s" }
        ),
        snapshot: before.clone(),
        highlighted_processes: vec![victim.id.clone()],
        highlighted_resources: Vec::new(),
    });

    let mut after = before;
    let outcome = apply_to_snapshot(&mut after, &victim.id);

    let (description, highlighted_resources) = match &outcome {
        Resolution::Aborted { process } => (
            format!("Process {process} aborted: it held nothing to preempt"),
            Vec::new(),
        ),
        Resolution::Preempted { process, resource } => (
            format!("Preempted {resource} from {process}"),
            vec![resource.clone()],
        ),
        Resolution::NoCandidates => unreachable!("victim was selected"),
    };

    stages.push(ResolutionStage {
        kind: StageKind::Apply,
        description,
        snapshot: after.clone(),
        highlighted_processes: vec![victim.id.clone()],
        highlighted_resources,
    });

    stages.push(ResolutionStage {
        kind: StageKind::ConfirmStable,
        description: "Allocation state is consistent; deadlock flag may be cleared".to_string(),
        snapshot: after,
        highlighted_processes: Vec::new(),
        highlighted_resources: Vec::new(),
    });

    ResolutionPlan { stages, outcome }
}

/// Plans a resolution pass and installs its final state into the store.
///
/// This is the direct (non-staged) form of the policy; it is the staged
/// plan's final snapshot by construction, never an independent code path.
pub fn apply_resolution(store: &mut EntityStore) -> Resolution {
    let plan = plan_resolution(store);
    let final_state = plan.final_state().clone();
    store.install(final_state.processes, final_state.resources);
    plan.outcome
}

fn apply_to_snapshot(snapshot: &mut StateSnapshot, victim_id: &ProcessId) -> Resolution {
    let victim = snapshot
        .processes
        .iter_mut()
        .find(|p| &p.id == victim_id)
        .expect("victim comes from the same snapshot");

    if victim.held.is_empty() {
        victim.pending_request = None;
        victim.status = ProcessStatus::Aborted;
        return Resolution::Aborted {
            process: victim_id.clone(),
        };
    }

    // Earliest acquisition is preempted first.
    let preempted = victim.held.remove(0);
    if let Some(resource) = snapshot.resources.iter_mut().find(|r| r.id == preempted) {
        resource.allocated_to.retain(|holder| holder != victim_id);
    }
    Resolution::Preempted {
        process: victim_id.clone(),
        resource: preempted,
    }
}

fn join_ids(ids: &[ProcessId]) -> String {
    ids.iter()
        .map(ProcessId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_wait_for_graph, has_cycle};

    fn hold(store: &mut EntityStore, process: &str, resource: &str) {
        let pid = ProcessId::from(process);
        let rid = ResourceId::from(resource);
        store.process_mut(&pid).unwrap().held.push(rid.clone());
        store.resource_mut(&rid).unwrap().allocated_to.push(pid);
    }

    fn request(store: &mut EntityStore, process: &str, resource: &str) {
        store
            .process_mut(&ProcessId::from(process))
            .unwrap()
            .pending_request = Some(ResourceId::from(resource));
    }

    fn deadlocked_seed() -> EntityStore {
        let mut store = EntityStore::seed_default();
        hold(&mut store, "P1", "R1");
        hold(&mut store, "P2", "R2");
        request(&mut store, "P1", "R2");
        request(&mut store, "P2", "R1");
        store
    }

    #[test]
    fn test_no_candidates_is_noop() {
        let mut store = EntityStore::seed_default();
        let before = store.clone();
        let outcome = apply_resolution(&mut store);
        assert_eq!(outcome, Resolution::NoCandidates);
        assert_eq!(store, before);
    }

    #[test]
    fn test_abort_branch() {
        let mut store = EntityStore::seed_default();
        hold(&mut store, "P1", "R1");
        // P2 holds nothing but waits, so it cannot be preempted from.
        request(&mut store, "P2", "R1");

        let outcome = apply_resolution(&mut store);
        assert_eq!(
            outcome,
            Resolution::Aborted {
                process: ProcessId::from("P2")
            }
        );
        let p2 = store.process(&ProcessId::from("P2")).unwrap();
        assert_eq!(p2.status, ProcessStatus::Aborted);
        assert!(p2.held.is_empty());
        assert!(p2.pending_request.is_none());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_preempt_branch_takes_earliest_held() {
        let mut store = EntityStore::seed_default();
        hold(&mut store, "P1", "R1");
        hold(&mut store, "P1", "R3");
        request(&mut store, "P1", "R2");

        let outcome = apply_resolution(&mut store);
        assert_eq!(
            outcome,
            Resolution::Preempted {
                process: ProcessId::from("P1"),
                resource: ResourceId::from("R1"),
            }
        );
        let p1 = store.process(&ProcessId::from("P1")).unwrap();
        assert_eq!(p1.status, ProcessStatus::Running);
        assert_eq!(p1.held, vec![ResourceId::from("R3")]);
        assert_eq!(p1.pending_request, Some(ResourceId::from("R2")));
        assert!(store
            .resource(&ResourceId::from("R1"))
            .unwrap()
            .allocated_to
            .is_empty());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_victim_is_largest_holder() {
        let mut store = EntityStore::seed_default();
        hold(&mut store, "P1", "R1");
        hold(&mut store, "P2", "R2");
        hold(&mut store, "P2", "R3");
        request(&mut store, "P1", "R2");
        request(&mut store, "P2", "R1");

        let outcome = apply_resolution(&mut store);
        assert_eq!(
            outcome,
            Resolution::Preempted {
                process: ProcessId::from("P2"),
                resource: ResourceId::from("R2"),
            }
        );
    }

    #[test]
    fn test_tie_breaks_by_store_order() {
        let mut store = deadlocked_seed();
        let outcome = apply_resolution(&mut store);
        // P1 and P2 both hold one resource; the stable sort keeps P1 first.
        assert_eq!(
            outcome,
            Resolution::Preempted {
                process: ProcessId::from("P1"),
                resource: ResourceId::from("R1"),
            }
        );
    }

    #[test]
    fn test_resolution_removes_cycle_on_seed_scenario() {
        let mut store = deadlocked_seed();
        let order: Vec<ProcessId> = store.processes().iter().map(|p| p.id.clone()).collect();
        assert!(has_cycle(&build_wait_for_graph(&store), &order));

        apply_resolution(&mut store);
        assert!(!has_cycle(&build_wait_for_graph(&store), &order));
    }

    #[test]
    fn test_staged_final_state_matches_direct_application() {
        let staged = plan_resolution(&deadlocked_seed());

        let mut direct = deadlocked_seed();
        apply_resolution(&mut direct);

        assert_eq!(staged.final_state().processes, direct.processes());
        assert_eq!(staged.final_state().resources, direct.resources());
    }

    #[test]
    fn test_stage_sequence_shape() {
        let plan = plan_resolution(&deadlocked_seed());
        let kinds: Vec<StageKind> = plan.stages.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::IdentifyCandidates,
                StageKind::SelectVictim,
                StageKind::Apply,
                StageKind::ConfirmStable,
            ]
        );
        assert_eq!(
            plan.stages[1].highlighted_processes,
            vec![ProcessId::from("P1")]
        );
        assert_eq!(
            plan.stages[2].highlighted_resources,
            vec![ResourceId::from("R1")]
        );
        // Early stages show the untouched state.
        assert_eq!(plan.stages[0].snapshot.processes[0].held.len(), 1);
    }

    #[test]
    fn test_noop_plan_has_confirm_stage() {
        let plan = plan_resolution(&EntityStore::seed_default());
        assert_eq!(plan.outcome, Resolution::NoCandidates);
        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.stages.last().unwrap().kind, StageKind::ConfirmStable);
    }

    #[test]
    fn test_planning_does_not_mutate_input() {
        let store = deadlocked_seed();
        let before = store.clone();
        let _ = plan_resolution(&store);
        assert_eq!(store, before);
    }
}
