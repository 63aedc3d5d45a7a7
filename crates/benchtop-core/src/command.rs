//! Input commands for externally-submitted engine mutations, and the typed
//! form of the UI drag-payload boundary.
//!
//! Commands are queued by the host (drop handlers, scripting, tests) and
//! executed at the next tick boundary so every mutation happens inside the
//! pipeline. Malformed drag payloads convert to `None` and are dropped
//! without an error -- a bad drop is a no-op, never a crash.

use crate::id::{EquipmentId, EquipmentTypeId, ReagentId};
use crate::registry::Registry;
use crate::units::Ticks;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A single command that can be submitted to the engine. Executed during the
/// pre-tick phase of the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabCommand {
    /// Place equipment of a type at a drop point, or move the existing
    /// instance of that type.
    PlaceEquipment {
        equipment_type: EquipmentTypeId,
        x: i32,
        y: i32,
    },
    /// Dispense a reagent into a container instance. The amount is clamped
    /// at execution time.
    Dispense {
        reagent: ReagentId,
        equipment: EquipmentId,
        amount: i64,
    },
    /// Remove an instance and everything dispensed into it.
    RemoveEquipment { equipment: EquipmentId },
    /// Restore the experiment to its starting state.
    Reset,
}

// ---------------------------------------------------------------------------
// Drag payload boundary
// ---------------------------------------------------------------------------

/// The wire shape a UI drag source produces: `{ "kind": ..., "id": ...,
/// "amount"? }`. Ids are registry string keys, resolved at drop time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DropPayload {
    Equipment {
        id: String,
    },
    Chemical {
        id: String,
        #[serde(default)]
        amount: Option<i64>,
    },
}

/// Where a payload was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// An open spot on the bench.
    Bench { x: i32, y: i32 },
    /// Directly onto a placed instance.
    Equipment(EquipmentId),
}

impl DropPayload {
    /// Resolve a payload against the registry and drop target. Returns
    /// `None` for every malformed combination: unknown keys, chemicals
    /// dropped on the open bench, equipment dropped onto equipment.
    pub fn into_command(self, registry: &Registry, target: DropTarget) -> Option<LabCommand> {
        match (self, target) {
            (DropPayload::Equipment { id }, DropTarget::Bench { x, y }) => {
                let equipment_type = registry.equipment_id(&id)?;
                Some(LabCommand::PlaceEquipment {
                    equipment_type,
                    x,
                    y,
                })
            }
            (DropPayload::Chemical { id, amount }, DropTarget::Equipment(equipment)) => {
                let reagent = registry.reagent_id(&id)?;
                let amount = amount.unwrap_or_else(|| {
                    registry
                        .get_reagent(reagent)
                        .map(|def| def.default_volume as i64)
                        .unwrap_or(0)
                });
                Some(LabCommand::Dispense {
                    reagent,
                    equipment,
                    amount,
                })
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting to be executed at the next tick boundary, with optional
/// bounded history for debugging.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<LabCommand>,
    /// Executed commands as `(tick, command)` pairs.
    history: Vec<(Ticks, LabCommand)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that retains up to `max_history` executed commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: LabCommand) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = LabCommand>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands in submission order, recording them in
    /// history with the given tick.
    pub fn drain(&mut self, tick: Ticks) -> Vec<LabCommand> {
        let commands: Vec<LabCommand> = self.pending.drain(..).collect();
        if self.max_history > 0 {
            for cmd in &commands {
                self.history.push((tick, cmd.clone()));
            }
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }
        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop pending commands without executing them. Used by reset.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn history(&self) -> &[(Ticks, LabCommand)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
