//! In-memory entity store.
//!
//! The store owns the current process and resource collections and is the
//! single mutation point for allocation state. Iteration order is insertion
//! order and is semantically relevant: the step engine's grant phase and the
//! resolver's tie-break both follow it.
//!
//! Every mutating operation either fully applies or fully rejects; a
//! rejected operation leaves the store untouched.

use serde::{Deserialize, Serialize};

use crate::error::{SimResult, ValidationError};
use crate::process::{Process, ProcessId};
use crate::resource::{Resource, ResourceId};

/// Ordered collections of processes and resources plus their allocation state.
///
/// Invariants (upheld by every operation, checkable via
/// [`EntityStore::check_invariants`]):
/// - for every resource, `allocated_to.len() <= instances`;
/// - no process simultaneously holds and requests the same resource;
/// - a pending request always names a resource the process does not hold;
/// - ids are unique within their entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    processes: Vec<Process>,
    resources: Vec<Resource>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Creates the default seed: processes P1..P4 running with no holdings,
    /// resources R1, R2, R3 with one instance each and R4 with two.
    #[must_use]
    pub fn seed_default() -> Self {
        let mut store = Self::new();
        for id in ["P1", "P2", "P3", "P4"] {
            store.processes.push(Process::new(id));
        }
        for (id, instances) in [("R1", 1), ("R2", 1), ("R3", 1), ("R4", 2)] {
            store.resources.push(Resource::new(id, instances));
        }
        store
    }

    /// All processes in insertion order.
    #[must_use]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// All resources in insertion order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Replaces the full process and resource collections.
    ///
    /// Used when installing a resolution plan's final state; callers are
    /// responsible for supplying a state that satisfies the invariants.
    pub(crate) fn install(&mut self, processes: Vec<Process>, resources: Vec<Resource>) {
        self.processes = processes;
        self.resources = resources;
    }

    /// Looks up a process by id.
    #[must_use]
    pub fn process(&self, id: &ProcessId) -> Option<&Process> {
        self.processes.iter().find(|p| &p.id == id)
    }

    /// Looks up a resource by id.
    #[must_use]
    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub(crate) fn process_mut(&mut self, id: &ProcessId) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| &p.id == id)
    }

    pub(crate) fn resource_mut(&mut self, id: &ResourceId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| &r.id == id)
    }

    /// Adds a running process with no holdings.
    ///
    /// # Errors
    ///
    /// Rejects an empty (after trimming) or duplicate id.
    pub fn add_process(&mut self, id: &str) -> SimResult<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyProcessId.into());
        }
        if self.processes.iter().any(|p| p.id.as_str() == id) {
            return Err(ValidationError::DuplicateProcess { id: id.to_string() }.into());
        }
        self.processes.push(Process::new(id));
        Ok(())
    }

    /// Removes a process, first releasing every resource it holds back to
    /// that resource's allocation list.
    ///
    /// # Errors
    ///
    /// Rejects an unknown id.
    pub fn remove_process(&mut self, id: &str) -> SimResult<()> {
        let pid = ProcessId::from(id);
        let Some(pos) = self.processes.iter().position(|p| p.id == pid) else {
            return Err(ValidationError::ProcessNotFound { id: id.to_string() }.into());
        };

        let held = self.processes[pos].held.clone();
        for rid in &held {
            if let Some(resource) = self.resource_mut(rid) {
                resource.allocated_to.retain(|holder| holder != &pid);
            }
        }
        self.processes.remove(pos);
        Ok(())
    }

    /// Adds an unallocated resource with the given instance capacity.
    ///
    /// # Errors
    ///
    /// Rejects an empty/duplicate id or a capacity below 1.
    pub fn add_resource(&mut self, id: &str, instances: u32) -> SimResult<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyResourceId.into());
        }
        if self.resources.iter().any(|r| r.id.as_str() == id) {
            return Err(ValidationError::DuplicateResource { id: id.to_string() }.into());
        }
        if instances < 1 {
            return Err(ValidationError::InvalidInstanceCount { value: instances }.into());
        }
        self.resources.push(Resource::new(id, instances));
        Ok(())
    }

    /// Removes a resource, first clearing it from every process's held list
    /// and pending request.
    ///
    /// # Errors
    ///
    /// Rejects an unknown id.
    pub fn remove_resource(&mut self, id: &str) -> SimResult<()> {
        let rid = ResourceId::from(id);
        let Some(pos) = self.resources.iter().position(|r| r.id == rid) else {
            return Err(ValidationError::ResourceNotFound { id: id.to_string() }.into());
        };

        for process in &mut self.processes {
            process.held.retain(|held| held != &rid);
            if process.pending_request.as_ref() == Some(&rid) {
                process.pending_request = None;
            }
        }
        self.resources.remove(pos);
        Ok(())
    }

    /// Deterministically grants one instance of a resource to a process,
    /// satisfying a matching pending request if present.
    ///
    /// This is the non-randomized counterpart of the step engine's grant
    /// phase, used by collaborators (and tests) to set up exact scenarios.
    ///
    /// # Errors
    ///
    /// Rejects unknown ids, an exhausted resource, or a double grant.
    pub fn grant(&mut self, process: &str, resource: &str) -> SimResult<()> {
        let pid = ProcessId::from(process);
        let rid = ResourceId::from(resource);
        if self.process(&pid).is_none() {
            return Err(ValidationError::ProcessNotFound { id: process.to_string() }.into());
        }
        let Some(target) = self.resource(&rid) else {
            return Err(ValidationError::ResourceNotFound { id: resource.to_string() }.into());
        };
        if !target.has_spare_capacity() {
            return Err(ValidationError::ResourceExhausted { id: resource.to_string() }.into());
        }
        if target.allocated_to.contains(&pid) {
            return Err(ValidationError::AlreadyHeld {
                process: process.to_string(),
                resource: resource.to_string(),
            }
            .into());
        }

        self.resource_mut(&rid)
            .expect("existence checked above")
            .allocated_to
            .push(pid.clone());
        let proc = self.process_mut(&pid).expect("existence checked above");
        proc.held.push(rid.clone());
        if proc.pending_request.as_ref() == Some(&rid) {
            proc.pending_request = None;
        }
        Ok(())
    }

    /// Deterministically records a pending request, replacing any existing
    /// one.
    ///
    /// # Errors
    ///
    /// Rejects unknown ids or a request for a resource the process already
    /// holds.
    pub fn submit_request(&mut self, process: &str, resource: &str) -> SimResult<()> {
        let pid = ProcessId::from(process);
        let rid = ResourceId::from(resource);
        if self.resource(&rid).is_none() {
            return Err(ValidationError::ResourceNotFound { id: resource.to_string() }.into());
        }
        let Some(proc) = self.process_mut(&pid) else {
            return Err(ValidationError::ProcessNotFound { id: process.to_string() }.into());
        };
        if proc.holds(&rid) {
            return Err(ValidationError::AlreadyHeld {
                process: process.to_string(),
                resource: resource.to_string(),
            }
            .into());
        }
        proc.pending_request = Some(rid);
        Ok(())
    }

    /// Verifies the documented invariants, returning the first violation
    /// found as a description.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        for resource in &self.resources {
            if resource.allocated_to.len() as u32 > resource.instances {
                return Err(format!(
                    "resource {} over-allocated: {} holders for {} instances",
                    resource.id,
                    resource.allocated_to.len(),
                    resource.instances
                ));
            }
            let mut seen = std::collections::HashSet::new();
            for holder in &resource.allocated_to {
                if !seen.insert(holder) {
                    return Err(format!(
                        "resource {} allocated twice to process {holder}",
                        resource.id
                    ));
                }
                if self.process(holder).is_none() {
                    return Err(format!(
                        "resource {} allocated to unknown process {holder}",
                        resource.id
                    ));
                }
            }
        }

        for process in &self.processes {
            if let Some(request) = &process.pending_request {
                if process.holds(request) {
                    return Err(format!(
                        "process {} holds and requests {request}",
                        process.id
                    ));
                }
            }
            for held in &process.held {
                let Some(resource) = self.resource(held) else {
                    return Err(format!("process {} holds unknown resource {held}", process.id));
                };
                if !resource.allocated_to.contains(&process.id) {
                    return Err(format!(
                        "process {} holds {held} but is missing from its allocation list",
                        process.id
                    ));
                }
            }
        }

        let mut ids = std::collections::HashSet::new();
        for process in &self.processes {
            if !ids.insert(process.id.as_str()) {
                return Err(format!("duplicate process id {}", process.id));
            }
        }
        ids.clear();
        for resource in &self.resources {
            if !ids.insert(resource.id.as_str()) {
                return Err(format!("duplicate resource id {}", resource.id));
            }
        }

        Ok(())
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::seed_default()
    }
}
