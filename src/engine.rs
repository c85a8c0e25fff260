//! The step engine: one simulation tick and everything around it.
//!
//! The engine owns the entity store and all derived state. Every mutation
//! goes through `&mut self`, so the single-writer discipline required during
//! a tick is enforced by the borrow checker; a timer-driven collaborator
//! serializes ticks by wrapping the engine in its own lock and must not
//! start a tick while another is in flight.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SimResult;
use crate::graph::{build_wait_for_graph, has_cycle, WaitForEdge};
use crate::log::{ActivityLog, LogEntry};
use crate::predict::{assess, PendingPrediction, Prediction};
use crate::process::{Process, ProcessId};
use crate::resolve::{apply_resolution, plan_resolution, Resolution, ResolutionPlan};
use crate::resource::{Resource, ResourceId};
use crate::rng::{EntropyRandom, RandomSource};
use crate::store::EntityStore;

/// Per-tick probability that a running process releases one held resource.
pub const RELEASE_PROBABILITY: f64 = 0.2;

/// Per-tick probability that an unblocked running process issues a request.
pub const REQUEST_PROBABILITY: f64 = 0.3;

/// Engine configuration. Pure gating knobs; none of these affect the
/// algorithms beyond enabling or delaying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether the predictor runs after a no-deadlock detection pass.
    pub predictive_mode: bool,

    /// Interval the external timer collaborator should tick at.
    pub tick_interval_ms: u64,

    /// Whether the external timer collaborator should be ticking at all.
    pub running: bool,

    /// The predictor's "thinking time" before its outcome applies.
    pub prediction_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            predictive_mode: true,
            tick_interval_ms: 1000,
            running: false,
            prediction_delay_ms: 800,
        }
    }
}

/// The deadlock simulation engine.
///
/// Holds the entity store, the last derived wait-for graph, the deadlock
/// flag, the bounded activity log, and at most one pending (deferred)
/// prediction outcome.
pub struct SimEngine {
    store: EntityStore,
    wait_for: Vec<WaitForEdge>,
    deadlock_detected: bool,
    log: ActivityLog,
    config: EngineConfig,
    pending_prediction: Option<PendingPrediction>,
    rng: Box<dyn RandomSource>,
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEngine")
            .field("processes", &self.store.processes().len())
            .field("resources", &self.store.resources().len())
            .field("deadlock_detected", &self.deadlock_detected)
            .field("config", &self.config)
            .field("pending_prediction", &self.pending_prediction)
            .finish_non_exhaustive()
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    /// Creates an engine seeded with the default scenario and entropy-backed
    /// randomness.
    #[must_use]
    pub fn new() -> Self {
        Self::with_random(Box::new(EntropyRandom::new()))
    }

    /// Creates an engine with an injected random source.
    #[must_use]
    pub fn with_random(rng: Box<dyn RandomSource>) -> Self {
        Self {
            store: EntityStore::seed_default(),
            wait_for: Vec::new(),
            deadlock_detected: false,
            log: ActivityLog::new(),
            config: EngineConfig::default(),
            pending_prediction: None,
            rng,
        }
    }

    // ----- snapshot accessors -----

    /// Processes in store order.
    #[must_use]
    pub fn processes(&self) -> &[Process] {
        self.store.processes()
    }

    /// Resources in store order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        self.store.resources()
    }

    /// The wait-for edges from the most recent detection pass.
    #[must_use]
    pub fn wait_for_edges(&self) -> &[WaitForEdge] {
        &self.wait_for
    }

    /// Whether the last detection pass found a deadlock.
    #[must_use]
    pub fn deadlock_detected(&self) -> bool {
        self.deadlock_detected
    }

    /// Recent activity, newest first, at most ten entries.
    #[must_use]
    pub fn logs(&self) -> &[LogEntry] {
        self.log.entries()
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True while a prediction outcome is waiting out its thinking time.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.pending_prediction.is_some()
    }

    // ----- configuration -----

    /// Enables or disables the predictor.
    pub fn set_predictive_mode(&mut self, enabled: bool) {
        self.config.predictive_mode = enabled;
    }

    /// Sets the interval the timer collaborator should tick at.
    pub fn set_tick_interval_ms(&mut self, interval_ms: u64) {
        self.config.tick_interval_ms = interval_ms;
    }

    /// Starts or stops timer-driven ticking.
    ///
    /// Stopping also drops a pending prediction outcome so that nothing
    /// scheduled before the stop can fire after it.
    pub fn set_running(&mut self, running: bool) {
        if self.config.running && !running && self.pending_prediction.take().is_some() {
            debug!("dropped pending prediction on stop");
        }
        self.config.running = running;
    }

    /// Overrides the predictor's thinking-time delay.
    pub fn set_prediction_delay_ms(&mut self, delay_ms: u64) {
        self.config.prediction_delay_ms = delay_ms;
    }

    // ----- entity operations -----

    /// Adds a running process with no holdings.
    ///
    /// # Errors
    ///
    /// Rejects an empty or duplicate id, leaving state unchanged. The
    /// failure is also reported on the activity log.
    pub fn add_process(&mut self, id: &str) -> SimResult<()> {
        match self.store.add_process(id) {
            Ok(()) => {
                self.log.push(format!("Process {} added to simulation", id.trim()));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "add_process rejected");
                self.log.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Removes a process after releasing everything it holds.
    ///
    /// # Errors
    ///
    /// Rejects an unknown id, leaving state unchanged.
    pub fn remove_process(&mut self, id: &str) -> SimResult<()> {
        match self.store.remove_process(id) {
            Ok(()) => {
                self.log.push(format!("Process {id} removed from simulation"));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "remove_process rejected");
                self.log.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Adds an unallocated resource.
    ///
    /// # Errors
    ///
    /// Rejects an empty/duplicate id or a zero instance count.
    pub fn add_resource(&mut self, id: &str, instances: u32) -> SimResult<()> {
        match self.store.add_resource(id, instances) {
            Ok(()) => {
                self.log.push(format!(
                    "Resource {} ({instances} instance{}) added to simulation",
                    id.trim(),
                    if instances == 1 { "" } else { "s" }
                ));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "add_resource rejected");
                self.log.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Removes a resource after clearing it from every holder and requester.
    ///
    /// # Errors
    ///
    /// Rejects an unknown id, leaving state unchanged.
    pub fn remove_resource(&mut self, id: &str) -> SimResult<()> {
        match self.store.remove_resource(id) {
            Ok(()) => {
                self.log.push(format!("Resource {id} removed from simulation"));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "remove_resource rejected");
                self.log.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Deterministically grants a resource instance to a process, bypassing
    /// the randomized phases.
    ///
    /// # Errors
    ///
    /// Rejects unknown ids, an exhausted resource, or a double grant.
    pub fn grant(&mut self, process: &str, resource: &str) -> SimResult<()> {
        self.store.grant(process, resource)?;
        self.log.push(format!("Process {process} acquired {resource}"));
        Ok(())
    }

    /// Deterministically records a pending request, bypassing the randomized
    /// phases.
    ///
    /// # Errors
    ///
    /// Rejects unknown ids or a request for an already-held resource.
    pub fn submit_request(&mut self, process: &str, resource: &str) -> SimResult<()> {
        self.store.submit_request(process, resource)?;
        self.log.push(format!("Process {process} requested {resource}"));
        Ok(())
    }

    /// Restores the default seed and clears all derived state: wait-for
    /// graph, deadlock flag, logs, pending prediction. Stops the timer flag.
    pub fn reset(&mut self) {
        self.store = EntityStore::seed_default();
        self.wait_for.clear();
        self.deadlock_detected = false;
        self.pending_prediction = None;
        self.config.running = false;
        self.log.clear();
        self.log.push("Simulation reset");
    }

    // ----- simulation -----

    /// Advances the simulation by one tick.
    ///
    /// Order within the tick: settle or cancel a pending prediction; if a
    /// deadlock is flagged, resolve it reactively and return; otherwise run
    /// the grant phase, the randomized release phase, the randomized request
    /// phase, then rebuild the wait-for graph and detect. A found deadlock
    /// flags and stops the tick; with no deadlock and predictive mode on,
    /// the predictor's outcome is scheduled behind its thinking-time delay.
    pub fn step(&mut self) {
        self.settle_pending_prediction();

        if self.deadlock_detected {
            debug!("tick entered with deadlock flagged; resolving reactively");
            self.prevent_deadlock();
            return;
        }

        self.grant_phase();
        self.release_phase();
        self.request_phase();

        if self.detect() {
            return;
        }

        if self.config.predictive_mode {
            let outcome = assess(&self.store);
            debug!(?outcome, "prediction scheduled");
            self.pending_prediction = Some(PendingPrediction {
                outcome,
                fires_at: Instant::now()
                    + Duration::from_millis(self.config.prediction_delay_ms),
            });
        }
    }

    /// Rebuilds the wait-for graph from current state and updates the
    /// deadlock flag. Idempotent for unchanged state.
    pub fn detect(&mut self) -> bool {
        self.wait_for = build_wait_for_graph(&self.store);
        let order: Vec<ProcessId> = self.store.processes().iter().map(|p| p.id.clone()).collect();
        self.deadlock_detected = has_cycle(&self.wait_for, &order);
        if self.deadlock_detected {
            self.log
                .push("Deadlock detected in the system. Initiating resolution strategy.");
        }
        self.deadlock_detected
    }

    /// Applies the resolution policy once and clears the deadlock flag.
    ///
    /// Invoked reactively by [`SimEngine::step`] when a deadlock is flagged,
    /// preventively by the predictor's high-risk branch, or manually by a
    /// control collaborator at any time. With no waiting process it is a
    /// no-op apart from clearing the flag.
    pub fn prevent_deadlock(&mut self) -> Resolution {
        let outcome = apply_resolution(&mut self.store);
        match &outcome {
            Resolution::Aborted { process } => {
                self.log.push(format!(
                    "AI Resolution: Process {process} has been aborted to prevent deadlock."
                ));
            }
            Resolution::Preempted { process, resource } => {
                self.log.push(format!(
                    "AI Resolution: Released resource {resource} from {process} to prevent deadlock."
                ));
            }
            Resolution::NoCandidates => {}
        }
        self.deadlock_detected = false;
        outcome
    }

    /// Plans the staged form of the resolution policy against current state
    /// without applying it.
    #[must_use]
    pub fn plan_prevention(&self) -> ResolutionPlan {
        plan_resolution(&self.store)
    }

    /// Applies a due pending prediction outcome, if any.
    ///
    /// Returns true if an outcome was applied. Collaborators driving a timer
    /// call this between ticks so that thinking time elapses off the tick
    /// path; [`SimEngine::step`] also settles it at tick start.
    pub fn poll_prediction(&mut self) -> bool {
        match self.pending_prediction {
            Some(pending) if pending.is_due(Instant::now()) => {
                self.pending_prediction = None;
                self.apply_prediction(pending.outcome);
                true
            }
            _ => false,
        }
    }

    fn settle_pending_prediction(&mut self) {
        let Some(pending) = self.pending_prediction.take() else {
            return;
        };
        if pending.is_due(Instant::now()) {
            self.apply_prediction(pending.outcome);
        } else {
            // Superseded by the new tick; dropped, not queued.
            debug!(outcome = ?pending.outcome, "cancelled superseded prediction");
        }
    }

    fn apply_prediction(&mut self, outcome: Prediction) {
        match outcome {
            Prediction::Quiet => {}
            Prediction::Monitor { .. } => {
                self.log.push(format!(
                    "AI predicts {}% chance of deadlock. Monitoring situation.",
                    outcome.percent()
                ));
            }
            Prediction::HighRisk { .. } => {
                self.log.push(format!(
                    "AI predicts {}% chance of deadlock. Recommending preemptive action.",
                    outcome.percent()
                ));
                self.prevent_deadlock();
            }
        }
    }

    fn grant_phase(&mut self) {
        for i in 0..self.store.processes().len() {
            let (pid, wanted) = {
                let process = &self.store.processes()[i];
                if !process.is_running() {
                    continue;
                }
                match &process.pending_request {
                    Some(wanted) => (process.id.clone(), wanted.clone()),
                    None => continue,
                }
            };

            // Later processes in this pass see earlier grants: capacity is
            // evaluated against progressively updated resource state.
            let granted = match self.store.resource_mut(&wanted) {
                Some(resource) if resource.has_spare_capacity() => {
                    resource.allocated_to.push(pid.clone());
                    true
                }
                _ => false,
            };

            if granted {
                if let Some(process) = self.store.process_mut(&pid) {
                    process.held.push(wanted.clone());
                    process.pending_request = None;
                }
                self.log.push(format!("Process {pid} acquired {wanted}"));
            }
        }
    }

    fn release_phase(&mut self) {
        for i in 0..self.store.processes().len() {
            let (pid, released) = {
                let process = &self.store.processes()[i];
                if !process.is_running() || process.held.is_empty() {
                    continue;
                }
                if !self.rng.chance(RELEASE_PROBABILITY) {
                    continue;
                }
                let pick = self.rng.pick_index(process.held.len());
                (process.id.clone(), process.held[pick].clone())
            };

            if let Some(process) = self.store.process_mut(&pid) {
                process.held.retain(|held| held != &released);
            }
            if let Some(resource) = self.store.resource_mut(&released) {
                resource.allocated_to.retain(|holder| holder != &pid);
            }
            self.log.push(format!("Process {pid} released {released}"));
        }
    }

    fn request_phase(&mut self) {
        for i in 0..self.store.processes().len() {
            let (pid, requested) = {
                let process = &self.store.processes()[i];
                if !process.is_running() || process.pending_request.is_some() {
                    continue;
                }
                if !self.rng.chance(REQUEST_PROBABILITY) {
                    continue;
                }
                let available: Vec<ResourceId> = self
                    .store
                    .resources()
                    .iter()
                    .map(|r| r.id.clone())
                    .filter(|rid| !process.holds(rid))
                    .collect();
                if available.is_empty() {
                    continue;
                }
                let pick = self.rng.pick_index(available.len());
                (process.id.clone(), available[pick].clone())
            };

            if let Some(process) = self.store.process_mut(&pid) {
                process.pending_request = Some(requested.clone());
            }
            self.log.push(format!("Process {pid} requested {requested}"));
        }
    }

    /// Read-only access to the underlying entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}
