//! Process entities.
//!
//! A process is a simulated entity, not an OS thread: it holds resource
//! instances, may block on at most one pending request, and is advanced one
//! logical step at a time by the step engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceId;

/// Identifier of a simulated process, unique within the entity store.
///
/// # Examples
///
/// ```
/// use gridlock::ProcessId;
///
/// let id = ProcessId::from("P1");
/// assert_eq!(id.as_str(), "P1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    /// Creates a process id from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProcessId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a process.
///
/// Aborted processes are permanently excluded from the randomized
/// acquisition/release phases but remain visible in the entity store until
/// explicitly removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Participating in the simulation.
    Running,
    /// Terminated by the resolver; inert until removed.
    Aborted,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A simulated process contending for resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Unique identifier.
    pub id: ProcessId,

    /// Resource ids currently held, in acquisition order.
    ///
    /// A process holds at most one instance of a given resource, so this
    /// list never contains duplicates.
    pub held: Vec<ResourceId>,

    /// The resource this process is blocked requesting, if any.
    ///
    /// Never refers to a resource in `held`.
    pub pending_request: Option<ResourceId>,

    /// Lifecycle status.
    pub status: ProcessStatus,
}

impl Process {
    /// Creates a running process with no holdings and no pending request.
    #[must_use]
    pub fn new(id: impl Into<ProcessId>) -> Self {
        Self {
            id: id.into(),
            held: Vec::new(),
            pending_request: None,
            status: ProcessStatus::Running,
        }
    }

    /// Returns true if the process is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Running
    }

    /// Returns true if the process currently holds the given resource.
    #[must_use]
    pub fn holds(&self, resource: &ResourceId) -> bool {
        self.held.contains(resource)
    }

    /// Returns true if the process is blocked on a pending request.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.pending_request.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_process_is_running_and_empty() {
        let p = Process::new("P1");
        assert!(p.is_running());
        assert!(p.held.is_empty());
        assert!(p.pending_request.is_none());
        assert!(!p.is_waiting());
    }

    #[test]
    fn test_holds() {
        let mut p = Process::new("P1");
        p.held.push(ResourceId::from("R1"));
        assert!(p.holds(&ResourceId::from("R1")));
        assert!(!p.holds(&ResourceId::from("R2")));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProcessStatus::Running.to_string(), "running");
        assert_eq!(ProcessStatus::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_process_id_roundtrip() {
        let id = ProcessId::from("P7".to_string());
        assert_eq!(id.to_string(), "P7");
        assert_eq!(id, ProcessId::new("P7"));
    }
}
