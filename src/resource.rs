//! Resource entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::process::ProcessId;

/// Identifier of a resource, unique within the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource id from a string.
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

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A finite-instance resource that processes contend for.
///
/// The allocation list never exceeds the instance capacity, and a process
/// appears in it at most once (a process holds at most one instance of a
/// given resource in this model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier.
    pub id: ResourceId,

    /// Instance capacity (always ≥ 1).
    pub instances: u32,

    /// Processes currently holding an instance, in grant order.
    pub allocated_to: Vec<ProcessId>,
}

impl Resource {
    /// Creates an unallocated resource with the given capacity.
    #[must_use]
    pub fn new(id: impl Into<ResourceId>, instances: u32) -> Self {
        Self {
            id: id.into(),
            instances,
            allocated_to: Vec::new(),
        }
    }

    /// Returns true if at least one instance is free.
    #[must_use]
    pub fn has_spare_capacity(&self) -> bool {
        (self.allocated_to.len() as u32) < self.instances
    }

    /// Returns true if every instance is allocated.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        !self.has_spare_capacity()
    }

    /// Processes currently holding an instance.
    #[must_use]
    pub fn holders(&self) -> &[ProcessId] {
        &self.allocated_to
    }
}
