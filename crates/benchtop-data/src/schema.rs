//! JSON data structures for experiment definitions.
//!
//! These mirror the on-disk format one-to-one; resolution of string keys to
//! registry ids happens in [`loader`](crate::loader).

use serde::Deserialize;

/// Top-level experiment definition.
#[derive(Debug, Deserialize)]
pub struct ExperimentData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reagents: Vec<ReagentData>,
    #[serde(default)]
    pub equipment: Vec<EquipmentData>,
    #[serde(default)]
    pub rules: Vec<RuleData>,
    #[serde(default)]
    pub steps: Vec<StepData>,
}

/// JSON representation of a reagent.
#[derive(Debug, Deserialize)]
pub struct ReagentData {
    pub key: String,
    pub name: String,
    pub formula: String,
    /// `#RRGGBB` hex string.
    pub color: String,
    pub concentration: String,
    #[serde(default)]
    pub molarity: f64,
    #[serde(default = "default_dispense_volume")]
    pub default_volume: u32,
    /// `"acid"` or `"base"`, absent for neutral reagents.
    #[serde(default)]
    pub acid_base: Option<String>,
}

fn default_dispense_volume() -> u32 {
    25
}

/// JSON representation of an equipment type.
#[derive(Debug, Deserialize)]
pub struct EquipmentData {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub container: bool,
    #[serde(default)]
    pub dock: Option<DockData>,
    #[serde(default)]
    pub thermal: Option<ThermalData>,
}

/// Docking pairing, referencing the target equipment by key.
#[derive(Debug, Deserialize)]
pub struct DockData {
    pub target: String,
    /// Snap offset above the target (negative = below).
    pub offset_y: i32,
}

/// Heat/cold source behavior.
#[derive(Debug, Deserialize)]
pub struct ThermalData {
    /// `"heating"` or `"cooling"`.
    pub mode: String,
    pub target_temp: f64,
    /// Degrees per tick.
    pub rate: f64,
    /// Ticks until the phase auto-completes.
    pub duration: u64,
    #[serde(default)]
    pub removes_source: bool,
}

/// A reaction rule over reagent keys.
#[derive(Debug, Deserialize)]
pub struct RuleData {
    pub reagents: Vec<String>,
    /// Outcome color, `#RRGGBB`.
    pub outcome: String,
    pub description: String,
    #[serde(default)]
    pub reaction_type: Option<String>,
}

/// A guided step with its tagged precondition.
#[derive(Debug, Deserialize)]
pub struct StepData {
    pub title: String,
    pub description: String,
    pub precondition: PreconditionData,
}

/// Tagged precondition variants, matching the engine's three kinds.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreconditionData {
    EquipmentPlaced { equipment: String },
    ChemicalApplied { reagent: String, target: String },
    ThermalPhaseComplete { mode: String },
}
