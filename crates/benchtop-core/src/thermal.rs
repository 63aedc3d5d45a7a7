//! Per-container thermal phases: heating and cooling toward a target
//! temperature, driven one tick at a time.
//!
//! The only legal transitions are idle -> heating -> idle and
//! idle -> cooling -> idle. A container switching between sources passes
//! through idle (abrupt reset, by the source behavior this models: leaving
//! the zone snaps temperature and elapsed time back to baseline).
//!
//! Each active phase owns the scheduler token for its completion deadline.
//! Exit paths cancel the token; completion checks that the firing token is
//! still the one the state owns, so a stale deadline can never complete a
//! later phase.

use crate::id::{EquipmentId, TaskId};
use crate::registry::{ThermalMode, ThermalSourceSpec};
use crate::schedule::{ScheduledAction, TickScheduler};
use crate::units::{Degrees, Ticks, degrees, step_toward};
use slotmap::SecondaryMap;

// ---------------------------------------------------------------------------
// Zone geometry
// ---------------------------------------------------------------------------

/// Horizontal tolerance around a source's center, in bench units.
pub const ZONE_HALF_WIDTH: i32 = 25;
/// Vertical band above the source where a container counts as "in zone".
pub const ZONE_BAND_MIN: i32 = 15;
pub const ZONE_BAND_MAX: i32 = 60;

/// True when a container sits in a source's active zone: within the
/// horizontal tolerance and suspended 15-60 units above the source.
pub fn in_zone(container: (i32, i32), source: (i32, i32)) -> bool {
    let dx = (container.0 - source.0).abs();
    let dy = source.1 - container.1;
    dx <= ZONE_HALF_WIDTH && (ZONE_BAND_MIN..=ZONE_BAND_MAX).contains(&dy)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The thermal mode a container is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ThermalPhase {
    #[default]
    Idle,
    Heating,
    Cooling,
}

impl From<ThermalMode> for ThermalPhase {
    fn from(mode: ThermalMode) -> Self {
        match mode {
            ThermalMode::Heating => ThermalPhase::Heating,
            ThermalMode::Cooling => ThermalPhase::Cooling,
        }
    }
}

/// Runtime thermal state for one container.
#[derive(Debug, Clone)]
pub struct ThermalState {
    pub phase: ThermalPhase,
    /// Current temperature, degrees Celsius.
    pub actual: Degrees,
    pub target: Degrees,
    /// Degrees moved per tick while the phase is active.
    pub rate: Degrees,
    /// Ticks spent in the current phase.
    pub elapsed: Ticks,
    pub duration: Ticks,
    /// The source equipment driving this phase.
    pub source: EquipmentId,
    /// Whether completion removes the source from the bench.
    pub removes_source: bool,
    /// Completion deadline token. Present exactly while the phase is active.
    pub deadline: Option<TaskId>,
}

/// What a completed phase reports back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedPhase {
    pub mode: ThermalMode,
    pub source: EquipmentId,
    pub final_temp: Degrees,
    pub removes_source: bool,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Per-container thermal states. Containers without an entry (or with an
/// idle entry) sit at ambient temperature.
#[derive(Debug)]
pub struct ThermalSimulator {
    ambient: Degrees,
    states: SecondaryMap<EquipmentId, ThermalState>,
}

impl Default for ThermalSimulator {
    fn default() -> Self {
        Self::new(degrees(25))
    }
}

impl ThermalSimulator {
    pub fn new(ambient: Degrees) -> Self {
        Self {
            ambient,
            states: SecondaryMap::new(),
        }
    }

    pub fn ambient(&self) -> Degrees {
        self.ambient
    }

    pub fn phase(&self, container: EquipmentId) -> ThermalPhase {
        self.states
            .get(container)
            .map(|s| s.phase)
            .unwrap_or(ThermalPhase::Idle)
    }

    pub fn state(&self, container: EquipmentId) -> Option<&ThermalState> {
        self.states.get(container)
    }

    /// Current temperature of a container; ambient when no phase has
    /// touched it.
    pub fn temperature(&self, container: EquipmentId) -> Degrees {
        self.states
            .get(container)
            .map(|s| s.actual)
            .unwrap_or(self.ambient)
    }

    /// The source driving a container's active phase.
    pub fn active_source(&self, container: EquipmentId) -> Option<EquipmentId> {
        self.states
            .get(container)
            .filter(|s| s.phase != ThermalPhase::Idle)
            .map(|s| s.source)
    }

    /// Containers currently in an active phase.
    pub fn active_containers(&self) -> Vec<EquipmentId> {
        self.states
            .iter()
            .filter(|(_, s)| s.phase != ThermalPhase::Idle)
            .map(|(id, _)| id)
            .collect()
    }

    /// Start a phase for a container entering a source's zone. A container
    /// already in a phase keeps it (duplicate entry is a no-op); starting a
    /// different phase requires passing through idle first.
    /// Returns `true` when a phase actually started.
    pub fn begin(
        &mut self,
        container: EquipmentId,
        source: EquipmentId,
        spec: &ThermalSourceSpec,
        now: Ticks,
        scheduler: &mut TickScheduler,
    ) -> bool {
        if self.phase(container) != ThermalPhase::Idle {
            return false;
        }
        let token = scheduler.schedule_in(
            now,
            spec.duration,
            ScheduledAction::CompleteThermalPhase { container },
        );
        self.states.insert(
            container,
            ThermalState {
                phase: spec.mode.into(),
                actual: self.ambient,
                target: spec.target_temp,
                rate: spec.rate,
                elapsed: 0,
                duration: spec.duration,
                source,
                removes_source: spec.removes_source,
                deadline: Some(token),
            },
        );
        true
    }

    /// Abort a container's active phase: cancel the deadline and snap back
    /// to ambient. Returns the aborted mode, or `None` if nothing was
    /// active.
    pub fn abort(
        &mut self,
        container: EquipmentId,
        scheduler: &mut TickScheduler,
    ) -> Option<ThermalMode> {
        let state = self.states.get_mut(container)?;
        let mode = match state.phase {
            ThermalPhase::Idle => return None,
            ThermalPhase::Heating => ThermalMode::Heating,
            ThermalPhase::Cooling => ThermalMode::Cooling,
        };
        if let Some(token) = state.deadline.take() {
            scheduler.cancel(token);
        }
        state.phase = ThermalPhase::Idle;
        state.actual = self.ambient;
        state.elapsed = 0;
        Some(mode)
    }

    /// Complete the phase whose deadline just fired. The token must still be
    /// the one the state owns; anything else is a stale deadline and is
    /// ignored, which makes double completion impossible.
    pub fn complete(&mut self, container: EquipmentId, token: TaskId) -> Option<CompletedPhase> {
        let state = self.states.get_mut(container)?;
        if state.deadline != Some(token) {
            return None;
        }
        let mode = match state.phase {
            ThermalPhase::Idle => return None,
            ThermalPhase::Heating => ThermalMode::Heating,
            ThermalPhase::Cooling => ThermalMode::Cooling,
        };
        let done = CompletedPhase {
            mode,
            source: state.source,
            final_temp: state.actual,
            removes_source: state.removes_source,
        };
        state.deadline = None;
        state.phase = ThermalPhase::Idle;
        state.actual = self.ambient;
        state.elapsed = 0;
        Some(done)
    }

    /// Advance every active phase by one tick: temperature steps toward the
    /// target without overshoot, elapsed time increments.
    pub fn advance_tick(&mut self) {
        for (_, state) in self.states.iter_mut() {
            if state.phase == ThermalPhase::Idle {
                continue;
            }
            state.actual = step_toward(state.actual, state.target, state.rate);
            state.elapsed += 1;
        }
    }

    /// A piece of equipment left the bench. Drops the container's own state
    /// and aborts any phase the equipment was driving as a source. Returns
    /// the aborted `(container, mode)` pairs.
    pub fn handle_removed(
        &mut self,
        equipment: EquipmentId,
        scheduler: &mut TickScheduler,
    ) -> Vec<(EquipmentId, ThermalMode)> {
        let mut aborted = Vec::new();

        if self.phase(equipment) != ThermalPhase::Idle
            && let Some(mode) = self.abort(equipment, scheduler)
        {
            aborted.push((equipment, mode));
        }
        self.states.remove(equipment);

        let dependents: Vec<EquipmentId> = self
            .states
            .iter()
            .filter(|(_, s)| s.phase != ThermalPhase::Idle && s.source == equipment)
            .map(|(id, _)| id)
            .collect();
        for container in dependents {
            if let Some(mode) = self.abort(container, scheduler) {
                aborted.push((container, mode));
            }
        }

        aborted
    }

    /// Cancel every deadline and drop all states.
    pub fn reset(&mut self, scheduler: &mut TickScheduler) {
        for (_, state) in self.states.iter_mut() {
            if let Some(token) = state.deadline.take() {
                scheduler.cancel(token);
            }
        }
        self.states.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
