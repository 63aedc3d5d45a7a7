//! The guided procedure: an ordered sequence of required actions whose only
//! mutable datum is the current step index.
//!
//! The index is strictly monotonic. An action is compared against the
//! current step's precondition only -- an action matching a future step is
//! ignored, and there is no way to move backward, mirroring the
//! irreversibility of a physical lab procedure.

use crate::id::{EquipmentTypeId, ReagentId, StepId};
use crate::registry::{Precondition, Registry, ThermalMode};

/// An engine-observed action, fed to the controller once per occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedAction {
    /// Equipment of this type was placed on (or moved around) the bench.
    EquipmentPlaced { equipment: EquipmentTypeId },
    /// A reagent was dispensed into an instance of `target`.
    ChemicalApplied {
        reagent: ReagentId,
        target: EquipmentTypeId,
    },
    /// A thermal phase ran to completion.
    ThermalPhaseComplete { mode: ThermalMode },
}

fn matches(precondition: &Precondition, action: &ObservedAction) -> bool {
    match (precondition, action) {
        (
            Precondition::EquipmentPlaced { equipment },
            ObservedAction::EquipmentPlaced { equipment: placed },
        ) => equipment == placed,
        (
            Precondition::ChemicalApplied { reagent, target },
            ObservedAction::ChemicalApplied {
                reagent: applied,
                target: into,
            },
        ) => reagent == applied && target == into,
        (
            Precondition::ThermalPhaseComplete { mode },
            ObservedAction::ThermalPhaseComplete { mode: completed },
        ) => mode == completed,
        _ => false,
    }
}

/// Tracks progress through the registry's step sequence.
#[derive(Debug, Clone)]
pub struct ProcedureController {
    current: usize,
    completed: Vec<bool>,
}

impl ProcedureController {
    pub fn new(step_count: usize) -> Self {
        Self {
            current: 0,
            completed: vec![false; step_count],
        }
    }

    /// Index of the step waiting to be satisfied. Equal to the step count
    /// once the procedure is exhausted.
    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn step_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.completed.len()
    }

    pub fn is_step_completed(&self, step: StepId) -> bool {
        self.completed
            .get(step.0 as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Compare an action against the current step's precondition only.
    /// On match, mark the step complete, advance, and return the completed
    /// step's id. Everything else leaves the index untouched.
    pub fn observe(&mut self, registry: &Registry, action: &ObservedAction) -> Option<StepId> {
        let step_id = StepId(self.current as u32);
        let step = registry.get_step(step_id)?;
        if !matches(&step.precondition, action) {
            return None;
        }
        if let Some(flag) = self.completed.get_mut(self.current) {
            *flag = true;
        }
        self.current += 1;
        Some(step_id)
    }

    /// Jump forward to step `n`, marking skipped steps complete. Requests to
    /// move backward are rejected. Returns whether the index changed.
    pub fn set_current_step(&mut self, n: usize) -> bool {
        if n <= self.current {
            return false;
        }
        let n = n.min(self.completed.len());
        for flag in &mut self.completed[self.current..n] {
            *flag = true;
        }
        self.current = n;
        true
    }

    /// Back to the first step with nothing completed.
    pub fn reset(&mut self) {
        self.current = 0;
        self.completed.fill(false);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
