//! # Gridlock - Resource-Allocation Deadlock Simulation
//!
//! Gridlock models a set of simulated processes contending for
//! finite-instance resources, detects deadlock cycles in the derived
//! wait-for graph, predicts impending deadlock from contention metrics, and
//! applies a victim-selection recovery policy.
//!
//! ## Core Concepts
//!
//! - **Process**: a simulated entity holding resource instances, blocked on
//!   at most one pending request
//! - **Resource**: a finite-instance resource with an allocation list
//! - **Wait-for graph**: derived fresh each detection pass; a cycle in it is
//!   a deadlock
//! - **Resolver**: picks a victim among the waiting processes and preempts
//!   from it or aborts it
//!
//! ## Usage
//!
//! ```rust
//! use gridlock::{ScriptedRandom, SimEngine};
//!
//! // A scripted random source keeps the example deterministic; production
//! // code uses `SimEngine::new()` for real entropy.
//! let mut engine = SimEngine::with_random(Box::new(ScriptedRandom::quiet()));
//!
//! // Force the classic two-process cycle, bypassing randomization.
//! engine.grant("P1", "R1").unwrap();
//! engine.grant("P2", "R2").unwrap();
//! engine.submit_request("P1", "R2").unwrap();
//! engine.submit_request("P2", "R1").unwrap();
//!
//! engine.step();
//! assert!(engine.deadlock_detected());
//!
//! // The next tick resolves it.
//! engine.step();
//! assert!(!engine.deadlock_detected());
//! ```
//!
//! The crate is a library consumed in-process by a presentation layer; the
//! rendering, controls, and timer loop are external collaborators that read
//! the engine's snapshot accessors and invoke its mutating operations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod error;
pub mod graph;
pub mod log;
pub mod predict;
pub mod process;
pub mod resolve;
pub mod resource;
pub mod rng;
pub mod store;

// Re-export primary types at crate root for convenience
pub use engine::{EngineConfig, SimEngine, RELEASE_PROBABILITY, REQUEST_PROBABILITY};
pub use error::{SimError, SimResult, ValidationError};
pub use graph::{build_wait_for_graph, has_cycle, WaitForEdge};
pub use log::{ActivityLog, LogEntry, LOG_RETENTION};
pub use predict::{assess, PendingPrediction, Prediction};
pub use process::{Process, ProcessId, ProcessStatus};
pub use resolve::{
    apply_resolution, plan_resolution, Resolution, ResolutionPlan, ResolutionStage, StageKind,
    StateSnapshot,
};
pub use resource::{Resource, ResourceId};
pub use rng::{EntropyRandom, RandomSource, ScriptedRandom};
pub use store::EntityStore;
