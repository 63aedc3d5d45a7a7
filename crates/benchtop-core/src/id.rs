use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a piece of equipment placed on the workbench.
    pub struct EquipmentId;

    /// Identifies a pending task in the tick scheduler. Owned by whoever
    /// scheduled it; cancelling requires the token back.
    pub struct TaskId;
}

/// Identifies a chemical reagent in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReagentId(pub u32);

/// Identifies an equipment type (template) in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EquipmentTypeId(pub u32);

/// Identifies a reaction rule in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u32);

/// Identifies a guided step in the registry. Steps are ordered; the id is
/// also the step's position in the procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub u32);
