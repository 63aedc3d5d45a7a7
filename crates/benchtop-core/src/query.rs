//! Read-only snapshot types for display layers.
//!
//! Snapshots are plain data: a host can hold them across frames without
//! borrowing the engine.

use crate::color::Color;
use crate::id::{EquipmentId, EquipmentTypeId};
use crate::thermal::ThermalPhase;
use crate::units::Ticks;

/// One placed instance as the display layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentSnapshot {
    pub equipment: EquipmentId,
    pub equipment_type: EquipmentTypeId,
    /// Registry string key of the type, for asset lookup.
    pub type_key: String,
    pub x: i32,
    pub y: i32,
    /// Current mixed color of the contents.
    pub color: Color,
    /// Total contained volume, mL.
    pub volume_ml: u64,
    pub phase: ThermalPhase,
    /// Temperature for display, degrees Celsius.
    pub temperature_c: f64,
}

/// The whole bench at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchSnapshot {
    pub tick: Ticks,
    /// Index of the guided step waiting to be satisfied.
    pub current_step: usize,
    pub step_count: usize,
    pub equipment: Vec<EquipmentSnapshot>,
}
