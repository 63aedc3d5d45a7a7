//! The simulation engine: owns the workbench and orchestrates the six-phase
//! tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - An immutable [`Registry`] (reagents, equipment types, rules, steps)
//! - A [`Workbench`] (placed instances and their contents)
//! - A [`ThermalSimulator`] plus the [`TickScheduler`] its deadlines live in
//! - A [`ProcedureController`] (the monotonic guided-step index)
//! - A [`CommandQueue`] for externally-submitted mutations
//! - An [`EventBus`] for typed simulation events
//!
//! # Six-phase pipeline
//!
//! Each `step()` runs:
//! 1. **Pre-tick** -- apply reactive mutations, deferred follow-ups, and
//!    queued commands; record observed actions.
//! 2. **Thermal** -- zone transitions, deadline firing, temperature
//!    interpolation.
//! 3. **Mixture** -- recompute mix color and measurement for containers
//!    whose derived state went stale.
//! 4. **Procedure** -- feed observed actions to the step controller; fire
//!    the completion callback when the sequence is exhausted.
//! 5. **Post-tick** -- deliver buffered events to subscribers.
//! 6. **Bookkeeping** -- tick counter, state hash, dirty flags.

use crate::chemistry::{self, MixOutcome};
use crate::command::{CommandQueue, DropPayload, DropTarget, LabCommand};
use crate::dirty::DirtyTracker;
use crate::event::{EventBus, EventKind, LabEvent, LabMutation};
use crate::id::{EquipmentId, EquipmentTypeId, ReagentId, RuleId};
use crate::measure::{self, Measurement};
use crate::procedure::{ObservedAction, ProcedureController};
use crate::query::{BenchSnapshot, EquipmentSnapshot};
use crate::registry::{Registry, ThermalSourceSpec};
use crate::schedule::{ScheduledAction, TickScheduler};
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};
use crate::thermal::{self, ThermalPhase, ThermalSimulator};
use crate::units::{Degrees, Ticks, degrees, fixed64_to_f64};
use crate::workbench::{PlacementOutcome, Workbench, WorkbenchConfig};
use slotmap::{Key, SecondaryMap};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Completion report
// ---------------------------------------------------------------------------

/// One detected reaction, kept for the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionRecord {
    pub tick: Ticks,
    pub equipment: EquipmentId,
    pub rule: RuleId,
}

/// Final state handed to the completion callback once the guided procedure
/// is exhausted.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub tick: Ticks,
    /// Per-container measurements at completion time.
    pub measurements: Vec<(EquipmentId, Measurement)>,
    /// Every reaction detected during the session, oldest first.
    pub reactions: Vec<ReactionRecord>,
}

/// Invoked once when the last guided step completes.
pub type CompletionCallback = Box<dyn FnMut(&CompletionReport)>;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The core simulation engine for one experiment session.
pub struct Engine {
    registry: Registry,
    strategy: SimulationStrategy,
    pub sim_state: SimState,
    paused: bool,

    workbench: Workbench,
    thermal: ThermalSimulator,
    scheduler: TickScheduler,
    procedure: ProcedureController,
    commands: CommandQueue,

    /// Typed event bus for simulation events.
    pub event_bus: EventBus,

    /// Engine-generated follow-up commands (e.g. source removal after a
    /// completed phase), applied at the next pre-tick before user commands.
    deferred: Vec<LabCommand>,

    /// Actions observed this tick, consumed by the procedure phase.
    observed: Vec<ObservedAction>,

    dirty: DirtyTracker,
    mixes: SecondaryMap<EquipmentId, MixOutcome>,
    measurements: SecondaryMap<EquipmentId, Measurement>,
    reactions: Vec<ReactionRecord>,

    last_state_hash: u64,
    completion_callback: Option<CompletionCallback>,
    completion_fired: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("sim_state", &self.sim_state)
            .field("paused", &self.paused)
            .field("workbench", &self.workbench)
            .field("thermal", &self.thermal)
            .field("current_step", &self.procedure.current_step())
            .field("last_state_hash", &self.last_state_hash)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with default bench geometry and 25 degree ambient.
    pub fn new(registry: Registry, strategy: SimulationStrategy) -> Self {
        Self::with_config(registry, strategy, WorkbenchConfig::default(), degrees(25))
    }

    /// Create an engine with explicit bench geometry and ambient temperature.
    pub fn with_config(
        registry: Registry,
        strategy: SimulationStrategy,
        bench: WorkbenchConfig,
        ambient: Degrees,
    ) -> Self {
        let step_count = registry.step_count();
        Self {
            registry,
            strategy,
            sim_state: SimState::new(),
            paused: false,
            workbench: Workbench::new(bench),
            thermal: ThermalSimulator::new(ambient),
            scheduler: TickScheduler::new(),
            procedure: ProcedureController::new(step_count),
            commands: CommandQueue::with_max_history(256),
            event_bus: EventBus::default(),
            deferred: Vec::new(),
            observed: Vec::new(),
            dirty: DirtyTracker::new(),
            mixes: SecondaryMap::new(),
            measurements: SecondaryMap::new(),
            reactions: Vec::new(),
            last_state_hash: 0,
            completion_callback: None,
            completion_fired: false,
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Queue a command for the next tick boundary.
    pub fn submit(&mut self, command: LabCommand) {
        self.commands.push(command);
    }

    pub fn submit_batch(&mut self, commands: impl IntoIterator<Item = LabCommand>) {
        self.commands.push_batch(commands);
    }

    /// Resolve a drag payload against a drop target and queue the resulting
    /// command. Malformed payloads are dropped; returns whether anything
    /// was queued.
    pub fn handle_drop(&mut self, payload: DropPayload, target: DropTarget) -> bool {
        match payload.into_command(&self.registry, target) {
            Some(command) => {
                self.commands.push(command);
                true
            }
            None => {
                log::debug!("ignoring malformed drop payload on {target:?}");
                false
            }
        }
    }

    /// Invoked once when the final guided step completes.
    pub fn set_completion_callback(&mut self, callback: CompletionCallback) {
        self.completion_callback = Some(callback);
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: crate::event::PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: crate::event::ReactiveHandler) {
        self.event_bus.on_reactive(kind, handler);
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Pause the simulation. While paused, `advance()` and `step()` are
    /// no-ops; commands still queue.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    pub fn thermal_phase(&self, container: EquipmentId) -> ThermalPhase {
        self.thermal.phase(container)
    }

    pub fn thermal(&self) -> &ThermalSimulator {
        &self.thermal
    }

    pub fn temperature(&self, container: EquipmentId) -> Degrees {
        self.thermal.temperature(container)
    }

    /// Latest mix outcome for a container (recomputed in the mixture phase).
    pub fn mix(&self, container: EquipmentId) -> Option<&MixOutcome> {
        self.mixes.get(container)
    }

    /// Latest measurement snapshot for a container.
    pub fn measurement(&self, container: EquipmentId) -> Option<&Measurement> {
        self.measurements.get(container)
    }

    pub fn current_step(&self) -> usize {
        self.procedure.current_step()
    }

    pub fn step_count(&self) -> usize {
        self.procedure.step_count()
    }

    pub fn is_complete(&self) -> bool {
        self.procedure.is_complete()
    }

    /// Jump the procedure forward to step `n`. Backward requests are
    /// rejected (the index is monotonic). Returns whether it moved.
    pub fn set_current_step(&mut self, n: usize) -> bool {
        self.procedure.set_current_step(n)
    }

    pub fn reactions(&self) -> &[ReactionRecord] {
        &self.reactions
    }

    pub fn command_history(&self) -> &[(Ticks, LabCommand)] {
        self.commands.history()
    }

    pub fn pending_deadlines(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// A display snapshot of the whole bench.
    pub fn snapshot(&self) -> BenchSnapshot {
        let mut equipment: Vec<EquipmentSnapshot> = self
            .workbench
            .iter()
            .map(|(id, inst)| {
                let color = self
                    .mixes
                    .get(id)
                    .map(|m| m.color)
                    .unwrap_or_default();
                let type_key = self
                    .registry
                    .get_equipment(inst.equipment_type)
                    .map(|def| def.key.clone())
                    .unwrap_or_default();
                EquipmentSnapshot {
                    equipment: id,
                    equipment_type: inst.equipment_type,
                    type_key,
                    x: inst.x,
                    y: inst.y,
                    color,
                    volume_ml: inst.contents.total_volume(),
                    phase: self.thermal.phase(id),
                    temperature_c: fixed64_to_f64(self.thermal.temperature(id)),
                }
            })
            .collect();
        equipment.sort_by_key(|snap| snap.equipment);
        BenchSnapshot {
            tick: self.sim_state.tick,
            current_step: self.procedure.current_step(),
            step_count: self.procedure.step_count(),
            equipment,
        }
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Restore the experiment to its starting state: empty bench, idle
    /// thermal states, step index zero. Every pending deadline and queued
    /// command is cancelled deterministically; event subscribers survive.
    pub fn reset(&mut self) {
        self.thermal.reset(&mut self.scheduler);
        self.scheduler.clear();
        self.workbench.reset();
        self.procedure.reset();
        self.commands.clear_pending();
        self.deferred.clear();
        self.observed.clear();
        self.mixes.clear();
        self.measurements.clear();
        self.reactions.clear();
        self.dirty.mark_clean();
        self.event_bus.clear_all();
        self.completion_fired = false;
        log::debug!("engine reset at tick {}", self.sim_state.tick);
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Advance the simulation according to the configured strategy.
    ///
    /// - **Tick mode**: `dt` is ignored; exactly one step runs.
    /// - **Delta mode**: `dt` is accumulated; as many fixed steps run as fit.
    pub fn advance(&mut self, dt: Ticks) -> AdvanceResult {
        if self.paused {
            return AdvanceResult::default();
        }
        let mut result = AdvanceResult::default();

        match self.strategy.clone() {
            SimulationStrategy::Tick => {
                self.step_internal(&mut result);
            }
            SimulationStrategy::Delta { fixed_timestep } => {
                self.sim_state.accumulator += dt;
                let step_size = fixed_timestep.max(1);
                while self.sim_state.accumulator >= step_size {
                    self.sim_state.accumulator -= step_size;
                    self.step_internal(&mut result);
                }
            }
        }

        result
    }

    /// Run a single simulation step (convenience for tick mode).
    pub fn step(&mut self) -> AdvanceResult {
        self.advance(0)
    }

    fn step_internal(&mut self, result: &mut AdvanceResult) {
        self.phase_pre_tick(result);
        self.phase_thermal();
        self.phase_mixture();
        self.phase_procedure();
        self.phase_post_tick();
        self.phase_bookkeeping();
        result.steps_run += 1;
    }

    // -----------------------------------------------------------------------
    // Phase 1: Pre-tick
    // -----------------------------------------------------------------------

    fn phase_pre_tick(&mut self, result: &mut AdvanceResult) {
        // Reactive handler mutations from the previous tick's delivery.
        for mutation in self.event_bus.drain_mutations() {
            let command = match mutation {
                LabMutation::PlaceEquipment {
                    equipment_type,
                    x,
                    y,
                } => LabCommand::PlaceEquipment {
                    equipment_type,
                    x,
                    y,
                },
                LabMutation::RemoveEquipment { equipment } => {
                    LabCommand::RemoveEquipment { equipment }
                }
                LabMutation::Dispense {
                    reagent,
                    equipment,
                    amount,
                } => LabCommand::Dispense {
                    reagent,
                    equipment,
                    amount,
                },
            };
            self.apply_command(command, result);
        }

        // Engine-generated follow-ups run before user input.
        let deferred = std::mem::take(&mut self.deferred);
        for command in deferred {
            self.apply_command(command, result);
        }

        let drained = self.commands.drain(self.sim_state.tick);
        for command in drained {
            self.apply_command(command, result);
        }
    }

    fn apply_command(&mut self, command: LabCommand, result: &mut AdvanceResult) {
        match command {
            LabCommand::PlaceEquipment {
                equipment_type,
                x,
                y,
            } => {
                if let Some(outcome) = self.apply_place(equipment_type, x, y) {
                    result.placements.push(outcome);
                }
            }
            LabCommand::Dispense {
                reagent,
                equipment,
                amount,
            } => {
                self.apply_dispense(reagent, equipment, amount);
            }
            LabCommand::RemoveEquipment { equipment } => {
                self.apply_remove(equipment);
            }
            LabCommand::Reset => {
                self.reset();
            }
        }
    }

    fn apply_place(
        &mut self,
        equipment_type: EquipmentTypeId,
        x: i32,
        y: i32,
    ) -> Option<PlacementOutcome> {
        let tick = self.sim_state.tick;
        let Some(outcome) = self
            .workbench
            .place_or_move(&self.registry, equipment_type, x, y)
        else {
            log::debug!("place of unregistered equipment type {equipment_type:?} ignored");
            return None;
        };

        if outcome.created {
            self.event_bus.emit(LabEvent::EquipmentPlaced {
                equipment: outcome.equipment,
                equipment_type,
                x: outcome.x,
                y: outcome.y,
                tick,
            });
            self.dirty.mark_bench();
        } else {
            self.event_bus.emit(LabEvent::EquipmentMoved {
                equipment: outcome.equipment,
                x: outcome.x,
                y: outcome.y,
                tick,
            });
        }
        self.dirty.mark_moved(outcome.equipment);

        if let Some(target) = outcome.docked_to {
            self.event_bus.emit(LabEvent::EquipmentDocked {
                equipment: outcome.equipment,
                target,
                x: outcome.x,
                y: outcome.y,
                tick,
            });
        }
        for &(docked, dx, dy) in &outcome.re_docked {
            self.event_bus.emit(LabEvent::EquipmentDocked {
                equipment: docked,
                target: outcome.equipment,
                x: dx,
                y: dy,
                tick,
            });
            self.dirty.mark_moved(docked);
        }

        // Every successful drop counts as a placement action, matching how
        // drop handlers re-check the procedure on each drag.
        self.observed
            .push(ObservedAction::EquipmentPlaced { equipment: equipment_type });

        Some(outcome)
    }

    fn apply_dispense(&mut self, reagent: ReagentId, equipment: EquipmentId, amount: i64) {
        let tick = self.sim_state.tick;
        let Some(volume) = self
            .workbench
            .dispense(&self.registry, reagent, equipment, amount)
        else {
            log::debug!("dispense of {reagent:?} onto {equipment:?} ignored");
            return;
        };
        let Some(target_type) = self.workbench.get(equipment).map(|i| i.equipment_type) else {
            return;
        };
        self.event_bus.emit(LabEvent::ChemicalDispensed {
            equipment,
            reagent,
            volume,
            tick,
        });
        self.dirty.mark_contents(equipment);
        self.observed.push(ObservedAction::ChemicalApplied {
            reagent,
            target: target_type,
        });
    }

    fn apply_remove(&mut self, equipment: EquipmentId) {
        let tick = self.sim_state.tick;
        let Some(instance) = self.workbench.remove(equipment) else {
            return;
        };
        self.event_bus.emit(LabEvent::EquipmentRemoved {
            equipment,
            equipment_type: instance.equipment_type,
            tick,
        });
        // Phases owned by or driven from the removed equipment die with it.
        for (container, mode) in self.thermal.handle_removed(equipment, &mut self.scheduler) {
            self.event_bus.emit(LabEvent::PhaseAborted {
                container,
                mode,
                tick,
            });
        }
        self.mixes.remove(equipment);
        self.measurements.remove(equipment);
        self.dirty.mark_bench();
    }

    // -----------------------------------------------------------------------
    // Phase 2: Thermal
    // -----------------------------------------------------------------------

    fn phase_thermal(&mut self) {
        let tick = self.sim_state.tick;

        // Snapshot sources and containers so zone checks don't alias the
        // bench while thermal state mutates.
        let sources: Vec<(EquipmentId, ThermalSourceSpec, i32, i32)> = self
            .workbench
            .iter()
            .filter_map(|(id, inst)| {
                self.registry
                    .get_equipment(inst.equipment_type)
                    .and_then(|def| def.thermal.clone())
                    .map(|spec| (id, spec, inst.x, inst.y))
            })
            .collect();
        let containers: Vec<(EquipmentId, i32, i32)> = self
            .workbench
            .iter()
            .filter(|(_, inst)| {
                self.registry
                    .get_equipment(inst.equipment_type)
                    .map(|def| def.container)
                    .unwrap_or(false)
            })
            .map(|(id, inst)| (id, inst.x, inst.y))
            .collect();

        // Zone transitions. Leaving a zone aborts before any entry is
        // considered, so switching sources passes through idle.
        for &(container, cx, cy) in &containers {
            let zone = sources
                .iter()
                .find(|&&(source, _, sx, sy)| {
                    source != container && thermal::in_zone((cx, cy), (sx, sy))
                });

            if let Some(active_source) = self.thermal.active_source(container) {
                let still_in_zone = zone
                    .map(|&(source, _, _, _)| source == active_source)
                    .unwrap_or(false);
                if !still_in_zone
                    && let Some(mode) = self.thermal.abort(container, &mut self.scheduler)
                {
                    self.event_bus.emit(LabEvent::PhaseAborted {
                        container,
                        mode,
                        tick,
                    });
                }
            }

            if let Some((source, spec, _, _)) = zone
                && self
                    .thermal
                    .begin(container, *source, spec, tick, &mut self.scheduler)
            {
                self.event_bus.emit(LabEvent::PhaseStarted {
                    container,
                    mode: spec.mode,
                    tick,
                });
            }
        }

        // Fire due deadlines before interpolating so a completing phase
        // reports elapsed == duration.
        for (token, action) in self.scheduler.fire_due(tick) {
            match action {
                ScheduledAction::CompleteThermalPhase { container } => {
                    let Some(done) = self.thermal.complete(container, token) else {
                        // Stale deadline for a phase that already exited.
                        continue;
                    };
                    self.event_bus.emit(LabEvent::PhaseCompleted {
                        container,
                        mode: done.mode,
                        tick,
                    });
                    self.observed
                        .push(ObservedAction::ThermalPhaseComplete { mode: done.mode });
                    if done.removes_source {
                        self.deferred.push(LabCommand::RemoveEquipment {
                            equipment: done.source,
                        });
                    }
                }
            }
        }

        self.thermal.advance_tick();
    }

    // -----------------------------------------------------------------------
    // Phase 3: Mixture
    // -----------------------------------------------------------------------

    fn phase_mixture(&mut self) {
        let tick = self.sim_state.tick;

        // Containers with changed contents, plus anything in an active
        // thermal phase (its temperature measurement is moving).
        let mut targets: BTreeSet<EquipmentId> = self.dirty.changed_contents().clone();
        for container in self.thermal.active_containers() {
            targets.insert(container);
        }

        for container in targets {
            let Some(instance) = self.workbench.get(container) else {
                continue;
            };
            let outcome = chemistry::mix(&instance.contents, &self.registry);

            let previous = self.mixes.get(container);
            let previous_rule = previous.and_then(|m| m.rule);
            let previous_color = previous.map(|m| m.color);

            if let Some(rule) = outcome.rule
                && previous_rule != Some(rule)
            {
                self.event_bus.emit(LabEvent::ReactionDetected {
                    equipment: container,
                    rule,
                    tick,
                });
                self.reactions.push(ReactionRecord {
                    tick,
                    equipment: container,
                    rule,
                });
            }
            if previous_color != Some(outcome.color) {
                self.event_bus.emit(LabEvent::MixtureChanged {
                    equipment: container,
                    color: outcome.color,
                    tick,
                });
            }

            let measurement = measure::measure(
                &instance.contents,
                &self.registry,
                &outcome,
                self.thermal.temperature(container),
            );
            self.measurements.insert(container, measurement);
            self.mixes.insert(container, outcome);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Procedure
    // -----------------------------------------------------------------------

    fn phase_procedure(&mut self) {
        let tick = self.sim_state.tick;
        let actions = std::mem::take(&mut self.observed);
        for action in actions {
            if let Some(step) = self.procedure.observe(&self.registry, &action) {
                log::debug!("guided step {step:?} completed by {action:?}");
                self.event_bus.emit(LabEvent::StepAdvanced { step, tick });
            }
        }

        if self.procedure.is_complete() && !self.completion_fired {
            self.completion_fired = true;
            self.event_bus.emit(LabEvent::ExperimentCompleted { tick });

            let mut measurements: Vec<(EquipmentId, Measurement)> = self
                .measurements
                .iter()
                .map(|(id, m)| (id, m.clone()))
                .collect();
            measurements.sort_by_key(|&(id, _)| id);
            let report = CompletionReport {
                tick,
                measurements,
                reactions: self.reactions.clone(),
            };
            if let Some(callback) = self.completion_callback.as_mut() {
                callback(&report);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 5: Post-tick
    // -----------------------------------------------------------------------

    fn phase_post_tick(&mut self) {
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Phase 6: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;

        let mut hash = StateHash::new();
        hash.write_u64(self.sim_state.tick);
        hash.write_u64(self.procedure.current_step() as u64);
        for (id, inst) in self.workbench.iter() {
            hash.write_u64(id.data().as_ffi());
            hash.write_u32(inst.equipment_type.0);
            hash.write_i32(inst.x);
            hash.write_i32(inst.y);
            for entry in inst.contents.entries() {
                hash.write_u32(entry.reagent.0);
                hash.write_u32(entry.volume);
            }
            let phase = match self.thermal.phase(id) {
                ThermalPhase::Idle => 0u32,
                ThermalPhase::Heating => 1,
                ThermalPhase::Cooling => 2,
            };
            hash.write_u32(phase);
            hash.write_degrees(self.thermal.temperature(id));
            if let Some(state) = self.thermal.state(id) {
                hash.write_u64(state.elapsed);
            }
        }
        self.last_state_hash = hash.finish();

        self.dirty.mark_clean();
    }
}
