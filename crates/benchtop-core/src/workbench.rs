//! The workbench placement model: equipment instances on a bounded 2D
//! surface, proximity docking, and chemical dispensing.
//!
//! Positions are pixel-space integers. Every mutation clamps into the bench
//! bounds minus a margin, so a placed instance is never out of bounds no
//! matter what coordinates a drop handler reports.
//!
//! At most one instance of each equipment type is on the bench at a time;
//! dropping a type that is already placed moves the existing instance.

use crate::contents::{Contents, DispensedChemical, clamp_volume};
use crate::id::{EquipmentId, EquipmentTypeId, ReagentId};
use crate::registry::Registry;
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bench geometry and docking distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkbenchConfig {
    pub width: i32,
    pub height: i32,
    /// Placements clamp into `[margin, bound - margin]` on both axes.
    pub margin: i32,
    /// Maximum center distance at which a dockable instance snaps to its
    /// dock target.
    pub dock_radius: i32,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            margin: 40,
            dock_radius: 180,
        }
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// A piece of equipment placed on the bench.
#[derive(Debug, Clone)]
pub struct EquipmentInstance {
    pub equipment_type: EquipmentTypeId,
    pub x: i32,
    pub y: i32,
    pub contents: Contents,
}

/// What a place/move did: where the instance ended up and which dock snaps
/// happened as a consequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub equipment: EquipmentId,
    /// `true` when this drop created the instance, `false` when it moved an
    /// existing one.
    pub created: bool,
    pub x: i32,
    pub y: i32,
    /// The dock target this instance snapped onto, if any.
    pub docked_to: Option<EquipmentId>,
    /// Instances that re-snapped because the moved equipment is *their*
    /// dock target: `(instance, x, y)` after the snap.
    pub re_docked: Vec<(EquipmentId, i32, i32)>,
}

// ---------------------------------------------------------------------------
// Workbench
// ---------------------------------------------------------------------------

/// Equipment placement state for one bench.
#[derive(Debug)]
pub struct Workbench {
    config: WorkbenchConfig,
    instances: SlotMap<EquipmentId, EquipmentInstance>,
    /// One instance per type; the index preserves "dropping a placed type
    /// moves it" semantics.
    by_type: BTreeMap<EquipmentTypeId, EquipmentId>,
}

impl Workbench {
    pub fn new(config: WorkbenchConfig) -> Self {
        Self {
            config,
            instances: SlotMap::with_key(),
            by_type: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    fn clamp_point(&self, x: i32, y: i32) -> (i32, i32) {
        let c = &self.config;
        (
            x.clamp(c.margin, c.width - c.margin),
            y.clamp(c.margin, c.height - c.margin),
        )
    }

    fn within_dock_radius(&self, a: (i32, i32), b: (i32, i32)) -> bool {
        let dx = (a.0 - b.0) as i64;
        let dy = (a.1 - b.1) as i64;
        let r = self.config.dock_radius as i64;
        dx * dx + dy * dy <= r * r
    }

    /// Place a new instance of `equipment_type` at the (clamped) drop point,
    /// or move the existing instance if the type is already on the bench.
    /// Returns `None` for an unregistered type (a malformed drop).
    ///
    /// After the move, docking runs in both directions: the moved instance
    /// snaps onto a nearby dock target, and any instance that docks to the
    /// moved type re-snaps onto it.
    pub fn place_or_move(
        &mut self,
        registry: &Registry,
        equipment_type: EquipmentTypeId,
        x: i32,
        y: i32,
    ) -> Option<PlacementOutcome> {
        let def = registry.get_equipment(equipment_type)?;
        let (cx, cy) = self.clamp_point(x, y);

        let existing = self
            .by_type
            .get(&equipment_type)
            .copied()
            .filter(|&id| self.instances.contains_key(id));
        let (id, created) = match existing {
            Some(existing) => {
                let inst = &mut self.instances[existing];
                inst.x = cx;
                inst.y = cy;
                (existing, false)
            }
            None => {
                let id = self.instances.insert(EquipmentInstance {
                    equipment_type,
                    x: cx,
                    y: cy,
                    contents: Contents::new(),
                });
                self.by_type.insert(equipment_type, id);
                (id, true)
            }
        };

        // Dock the moved instance onto its target, if one is close enough.
        let mut docked_to = None;
        if let Some(dock) = &def.dock
            && let Some(&target_id) = self.by_type.get(&dock.target)
            && target_id != id
        {
            let target_pos = {
                let target = &self.instances[target_id];
                (target.x, target.y)
            };
            if self.within_dock_radius((cx, cy), target_pos) {
                let snapped = self.clamp_point(target_pos.0, target_pos.1 - dock.offset_y);
                let inst = &mut self.instances[id];
                inst.x = snapped.0;
                inst.y = snapped.1;
                docked_to = Some(target_id);
            }
        }

        // The moved instance may itself be a dock target: re-snap nearby
        // instances whose dock spec names this type.
        let my_pos = {
            let inst = &self.instances[id];
            (inst.x, inst.y)
        };
        let mut snaps: Vec<(EquipmentId, i32, i32)> = Vec::new();
        for (other_id, other) in &self.instances {
            if other_id == id {
                continue;
            }
            let Some(other_def) = registry.get_equipment(other.equipment_type) else {
                continue;
            };
            if let Some(dock) = &other_def.dock
                && dock.target == equipment_type
                && self.within_dock_radius((other.x, other.y), my_pos)
            {
                let snapped = self.clamp_point(my_pos.0, my_pos.1 - dock.offset_y);
                snaps.push((other_id, snapped.0, snapped.1));
            }
        }
        for &(other_id, sx, sy) in &snaps {
            let inst = &mut self.instances[other_id];
            inst.x = sx;
            inst.y = sy;
        }

        let inst = &self.instances[id];
        Some(PlacementOutcome {
            equipment: id,
            created,
            x: inst.x,
            y: inst.y,
            docked_to,
            re_docked: snaps,
        })
    }

    /// Dispense a reagent into a container. Returns the accepted volume, or
    /// `None` when the drop is a no-op: unknown equipment or reagent,
    /// non-container target, or a non-positive amount. Amounts above the
    /// accepted range are clamped, not rejected.
    pub fn dispense(
        &mut self,
        registry: &Registry,
        reagent: ReagentId,
        equipment: EquipmentId,
        amount: i64,
    ) -> Option<u32> {
        let volume = clamp_volume(amount)?;
        let reagent_def = registry.get_reagent(reagent)?;
        let inst = self.instances.get_mut(equipment)?;
        let def = registry.get_equipment(inst.equipment_type)?;
        if !def.container {
            return None;
        }
        inst.contents.push(DispensedChemical {
            reagent,
            volume,
            concentration: reagent_def.concentration.clone(),
        });
        Some(volume)
    }

    /// Remove an instance and everything dispensed into it.
    pub fn remove(&mut self, equipment: EquipmentId) -> Option<EquipmentInstance> {
        let inst = self.instances.remove(equipment)?;
        self.by_type.remove(&inst.equipment_type);
        Some(inst)
    }

    pub fn get(&self, equipment: EquipmentId) -> Option<&EquipmentInstance> {
        self.instances.get(equipment)
    }

    /// The placed instance of a type, if any.
    pub fn instance_of_type(&self, equipment_type: EquipmentTypeId) -> Option<EquipmentId> {
        self.by_type.get(&equipment_type).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipmentId, &EquipmentInstance)> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Clear the bench entirely.
    pub fn reset(&mut self) {
        self.instances.clear();
        self.by_type.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
