//! Immutable experiment configuration: reagents, equipment types, reaction
//! rules, and the guided-step sequence.
//!
//! Built once per experiment session through [`RegistryBuilder`]
//! (three-phase lifecycle: registration -> mutation -> finalization) and
//! frozen afterwards. Each experiment owns its own rule table; nothing here
//! is shared between experiments.

use crate::color::Color;
use crate::id::{EquipmentTypeId, ReagentId, RuleId, StepId};
use crate::units::{Degrees, Fixed32, Ticks};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Acid/base classification for derived pH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcidBase {
    Acid,
    Base,
}

/// A chemical reagent definition. Reference data, never mutated after build.
#[derive(Debug, Clone)]
pub struct ReagentDef {
    /// Stable string key, e.g. `"cocl2"`. Matches drag-payload ids.
    pub key: String,
    pub name: String,
    pub formula: String,
    /// Base display color of the pure reagent.
    pub color: Color,
    /// Human-readable concentration label, e.g. `"0.1 M"`.
    pub concentration: String,
    /// Molar concentration backing the label.
    pub molarity: Fixed32,
    /// Volume dispensed when a drop carries no explicit amount, in mL.
    pub default_volume: u32,
    pub acid_base: Option<AcidBase>,
}

/// Docking behavior: when an instance of this type lands near an instance of
/// `target`, it snaps to a fixed offset directly above (positive `offset_y`)
/// or below (negative) the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockSpec {
    pub target: EquipmentTypeId,
    pub offset_y: i32,
}

/// Which way a thermal source drives container temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ThermalMode {
    Heating,
    Cooling,
}

/// A heat or cold source. Containers sitting in this source's zone enter the
/// corresponding thermal phase.
#[derive(Debug, Clone)]
pub struct ThermalSourceSpec {
    pub mode: ThermalMode,
    /// Temperature the container converges to, degrees Celsius.
    pub target_temp: Degrees,
    /// Degrees moved per tick.
    pub rate: Degrees,
    /// Ticks until the phase auto-completes.
    pub duration: Ticks,
    /// Remove the source equipment from the bench once the phase completes.
    pub removes_source: bool,
}

/// An equipment type definition.
#[derive(Debug, Clone)]
pub struct EquipmentTypeDef {
    /// Stable string key, e.g. `"test_tubes"`. Matches drag-payload ids.
    pub key: String,
    pub name: String,
    /// Only containers accept dispensed chemicals.
    pub container: bool,
    pub dock: Option<DockSpec>,
    pub thermal: Option<ThermalSourceSpec>,
}

/// A reaction rule: an exact set of reagents mapped to an outcome color.
/// The reagent set is sorted and deduplicated at build time.
#[derive(Debug, Clone)]
pub struct ReactionRuleDef {
    pub reagents: Vec<ReagentId>,
    pub outcome: Color,
    pub description: String,
    pub reaction_type: Option<String>,
}

/// What must be observed for a guided step to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The named equipment type was placed on (or moved around) the bench.
    EquipmentPlaced { equipment: EquipmentTypeId },
    /// The named reagent was dispensed into an instance of `target`.
    ChemicalApplied {
        reagent: ReagentId,
        target: EquipmentTypeId,
    },
    /// A thermal phase of the given mode ran to completion.
    ThermalPhaseComplete { mode: ThermalMode },
}

/// One guided step in the fixed experimental procedure.
#[derive(Debug, Clone)]
pub struct StepDef {
    pub title: String,
    pub description: String,
    pub precondition: Precondition,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    reagents: Vec<ReagentDef>,
    reagent_key_to_id: HashMap<String, ReagentId>,
    equipment: Vec<EquipmentTypeDef>,
    equipment_key_to_id: HashMap<String, EquipmentTypeId>,
    rules: Vec<ReactionRuleDef>,
    steps: Vec<StepDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a reagent. Returns its ID.
    pub fn register_reagent(&mut self, def: ReagentDef) -> ReagentId {
        let id = ReagentId(self.reagents.len() as u32);
        self.reagent_key_to_id.insert(def.key.clone(), id);
        self.reagents.push(def);
        id
    }

    /// Phase 1: Register an equipment type. Returns its ID.
    pub fn register_equipment(&mut self, def: EquipmentTypeDef) -> EquipmentTypeId {
        let id = EquipmentTypeId(self.equipment.len() as u32);
        self.equipment_key_to_id.insert(def.key.clone(), id);
        self.equipment.push(def);
        id
    }

    /// Phase 1: Register a reaction rule. The reagent set is sorted and
    /// deduplicated here; set-size validation happens at build.
    pub fn register_rule(
        &mut self,
        reagents: Vec<ReagentId>,
        outcome: Color,
        description: &str,
        reaction_type: Option<&str>,
    ) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        let mut reagents = reagents;
        reagents.sort();
        reagents.dedup();
        self.rules.push(ReactionRuleDef {
            reagents,
            outcome,
            description: description.to_string(),
            reaction_type: reaction_type.map(str::to_string),
        });
        id
    }

    /// Phase 1: Append a guided step. Steps complete in registration order.
    pub fn register_step(
        &mut self,
        title: &str,
        description: &str,
        precondition: Precondition,
    ) -> StepId {
        let id = StepId(self.steps.len() as u32);
        self.steps.push(StepDef {
            title: title.to_string(),
            description: description.to_string(),
            precondition,
        });
        id
    }

    /// Phase 2: Mutate an existing reagent by key.
    pub fn mutate_reagent<F>(&mut self, key: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ReagentDef),
    {
        let id = self
            .reagent_key_to_id
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        f(&mut self.reagents[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing equipment type by key. Used e.g. to attach
    /// dock specs once every equipment id is known.
    pub fn mutate_equipment<F>(&mut self, key: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut EquipmentTypeDef),
    {
        let id = self
            .equipment_key_to_id
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        f(&mut self.equipment[id.0 as usize]);
        Ok(())
    }

    /// Lookup reagent ID by key.
    pub fn reagent_id(&self, key: &str) -> Option<ReagentId> {
        self.reagent_key_to_id.get(key).copied()
    }

    /// Lookup equipment type ID by key.
    pub fn equipment_id(&self, key: &str) -> Option<EquipmentTypeId> {
        self.equipment_key_to_id.get(key).copied()
    }

    /// Phase 3: Validate cross-references and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let reagent_count = self.reagents.len() as u32;
        let equipment_count = self.equipment.len() as u32;

        // Rules: every reagent must exist, and mixing requires at least two
        // distinct reagents. Exact duplicate sets would shadow each other.
        let mut rule_index: HashMap<Vec<ReagentId>, RuleId> = HashMap::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.reagents.len() < 2 {
                return Err(RegistryError::RuleTooFewReagents { rule: i });
            }
            for &r in &rule.reagents {
                if r.0 >= reagent_count {
                    return Err(RegistryError::InvalidReagentRef(r));
                }
            }
            if let Some(prev) = rule_index.insert(rule.reagents.clone(), RuleId(i as u32)) {
                return Err(RegistryError::DuplicateRule {
                    rule: i,
                    first: prev,
                });
            }
        }

        // Equipment: dock targets must exist.
        for eq in &self.equipment {
            if let Some(dock) = &eq.dock
                && dock.target.0 >= equipment_count
            {
                return Err(RegistryError::InvalidEquipmentRef(dock.target));
            }
        }

        // Steps: every referenced reagent/equipment must exist.
        for (i, step) in self.steps.iter().enumerate() {
            match &step.precondition {
                Precondition::EquipmentPlaced { equipment } => {
                    if equipment.0 >= equipment_count {
                        return Err(RegistryError::InvalidStepRef { step: i });
                    }
                }
                Precondition::ChemicalApplied { reagent, target } => {
                    if reagent.0 >= reagent_count || target.0 >= equipment_count {
                        return Err(RegistryError::InvalidStepRef { step: i });
                    }
                }
                Precondition::ThermalPhaseComplete { .. } => {}
            }
        }

        Ok(Registry {
            reagents: self.reagents,
            reagent_key_to_id: self.reagent_key_to_id,
            equipment: self.equipment,
            equipment_key_to_id: self.equipment_key_to_id,
            rules: self.rules,
            rule_index,
            steps: self.steps,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable registry. Frozen after build(). One per experiment session.
#[derive(Debug)]
pub struct Registry {
    reagents: Vec<ReagentDef>,
    reagent_key_to_id: HashMap<String, ReagentId>,
    equipment: Vec<EquipmentTypeDef>,
    equipment_key_to_id: HashMap<String, EquipmentTypeId>,
    rules: Vec<ReactionRuleDef>,
    rule_index: HashMap<Vec<ReagentId>, RuleId>,
    steps: Vec<StepDef>,
}

impl Registry {
    pub fn get_reagent(&self, id: ReagentId) -> Option<&ReagentDef> {
        self.reagents.get(id.0 as usize)
    }

    pub fn get_equipment(&self, id: EquipmentTypeId) -> Option<&EquipmentTypeDef> {
        self.equipment.get(id.0 as usize)
    }

    pub fn get_rule(&self, id: RuleId) -> Option<&ReactionRuleDef> {
        self.rules.get(id.0 as usize)
    }

    pub fn get_step(&self, id: StepId) -> Option<&StepDef> {
        self.steps.get(id.0 as usize)
    }

    pub fn reagent_id(&self, key: &str) -> Option<ReagentId> {
        self.reagent_key_to_id.get(key).copied()
    }

    pub fn equipment_id(&self, key: &str) -> Option<EquipmentTypeId> {
        self.equipment_key_to_id.get(key).copied()
    }

    /// Exact-set rule lookup. `reagents` must be sorted and deduplicated
    /// (see [`Contents::distinct_reagents`](crate::contents::Contents)).
    pub fn match_rule(&self, reagents: &[ReagentId]) -> Option<RuleId> {
        self.rule_index.get(reagents).copied()
    }

    pub fn steps(&self) -> &[StepDef] {
        &self.steps
    }

    pub fn reagent_count(&self) -> usize {
        self.reagents.len()
    }

    pub fn equipment_count(&self) -> usize {
        self.equipment.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid reagent reference: {0:?}")]
    InvalidReagentRef(ReagentId),
    #[error("invalid equipment reference: {0:?}")]
    InvalidEquipmentRef(EquipmentTypeId),
    #[error("rule {rule} needs at least two distinct reagents")]
    RuleTooFewReagents { rule: usize },
    #[error("rule {rule} duplicates the reagent set of rule {first:?}")]
    DuplicateRule { rule: usize, first: RuleId },
    #[error("step {step} references an unregistered reagent or equipment type")]
    InvalidStepRef { step: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::f64_to_fixed32;

    fn reagent(key: &str, color: Color) -> ReagentDef {
        ReagentDef {
            key: key.to_string(),
            name: key.to_uppercase(),
            formula: key.to_string(),
            color,
            concentration: "0.1 M".to_string(),
            molarity: f64_to_fixed32(0.1),
            default_volume: 25,
            acid_base: None,
        }
    }

    fn equipment(key: &str, container: bool) -> EquipmentTypeDef {
        EquipmentTypeDef {
            key: key.to_string(),
            name: key.to_string(),
            container,
            dock: None,
            thermal: None,
        }
    }

    fn setup_builder() -> RegistryBuilder {
        let mut b = RegistryBuilder::new();
        let hcl = b.register_reagent(reagent("hcl", Color::rgb(0xFF, 0xF5, 0x9D)));
        let naoh = b.register_reagent(reagent("naoh", Color::rgb(0xE1, 0xF5, 0xFE)));
        b.register_equipment(equipment("test_tubes", true));
        b.register_equipment(equipment("burner", false));
        b.register_rule(
            vec![hcl, naoh],
            Color::rgb(0xE8, 0xF5, 0xE8),
            "neutralization to salt and water",
            Some("acid-base"),
        );
        b.register_step(
            "Set up",
            "Place the test tubes on the bench",
            Precondition::EquipmentPlaced {
                equipment: b.equipment_id("test_tubes").unwrap(),
            },
        );
        b
    }

    #[test]
    fn register_and_build() {
        let reg = setup_builder().build().unwrap();
        assert_eq!(reg.reagent_count(), 2);
        assert_eq!(reg.equipment_count(), 2);
        assert_eq!(reg.rule_count(), 1);
        assert_eq!(reg.step_count(), 1);
    }

    #[test]
    fn lookup_by_key() {
        let reg = setup_builder().build().unwrap();
        assert!(reg.reagent_id("hcl").is_some());
        assert!(reg.reagent_id("nonexistent").is_none());
        assert!(reg.equipment_id("test_tubes").is_some());
    }

    #[test]
    fn rule_set_is_sorted_and_deduplicated() {
        let mut b = setup_builder();
        let hcl = b.reagent_id("hcl").unwrap();
        let naoh = b.reagent_id("naoh").unwrap();
        let extra = b.register_reagent(reagent("water", Color::rgb(0x87, 0xCE, 0xEB)));
        b.register_rule(
            vec![extra, naoh, hcl, naoh],
            Color::rgb(1, 2, 3),
            "mixed",
            None,
        );
        let reg = b.build().unwrap();
        let rule = reg.get_rule(RuleId(1)).unwrap();
        assert_eq!(rule.reagents, vec![hcl, naoh, extra]);
    }

    #[test]
    fn match_rule_is_exact_set() {
        let reg = setup_builder().build().unwrap();
        let hcl = reg.reagent_id("hcl").unwrap();
        let naoh = reg.reagent_id("naoh").unwrap();
        assert!(reg.match_rule(&[hcl, naoh]).is_some());
        // A superset is a different set.
        assert!(reg.match_rule(&[hcl]).is_none());
        assert!(reg.match_rule(&[hcl, naoh, ReagentId(5)]).is_none());
    }

    #[test]
    fn single_reagent_rule_fails_build() {
        let mut b = setup_builder();
        let hcl = b.reagent_id("hcl").unwrap();
        b.register_rule(vec![hcl, hcl], Color::rgb(0, 0, 0), "degenerate", None);
        match b.build() {
            Err(RegistryError::RuleTooFewReagents { rule }) => assert_eq!(rule, 1),
            other => panic!("expected RuleTooFewReagents, got: {other:?}"),
        }
    }

    #[test]
    fn dangling_reagent_in_rule_fails_build() {
        let mut b = setup_builder();
        let hcl = b.reagent_id("hcl").unwrap();
        b.register_rule(vec![hcl, ReagentId(99)], Color::rgb(0, 0, 0), "bad", None);
        assert!(matches!(
            b.build(),
            Err(RegistryError::InvalidReagentRef(ReagentId(99)))
        ));
    }

    #[test]
    fn duplicate_rule_set_fails_build() {
        let mut b = setup_builder();
        let hcl = b.reagent_id("hcl").unwrap();
        let naoh = b.reagent_id("naoh").unwrap();
        // Same set in a different order still collides.
        b.register_rule(vec![naoh, hcl], Color::rgb(9, 9, 9), "shadow", None);
        assert!(matches!(b.build(), Err(RegistryError::DuplicateRule { .. })));
    }

    #[test]
    fn dangling_dock_target_fails_build() {
        let mut b = setup_builder();
        b.mutate_equipment("test_tubes", |eq| {
            eq.dock = Some(DockSpec {
                target: EquipmentTypeId(42),
                offset_y: 35,
            });
        })
        .unwrap();
        assert!(matches!(
            b.build(),
            Err(RegistryError::InvalidEquipmentRef(EquipmentTypeId(42)))
        ));
    }

    #[test]
    fn dangling_step_reference_fails_build() {
        let mut b = setup_builder();
        b.register_step(
            "Ghost",
            "References nothing real",
            Precondition::ChemicalApplied {
                reagent: ReagentId(77),
                target: EquipmentTypeId(0),
            },
        );
        assert!(matches!(
            b.build(),
            Err(RegistryError::InvalidStepRef { step: 1 })
        ));
    }

    #[test]
    fn mutate_nonexistent_fails() {
        let mut b = setup_builder();
        assert!(b.mutate_reagent("nonexistent", |_| {}).is_err());
        assert!(b.mutate_equipment("nonexistent", |_| {}).is_err());
    }

    #[test]
    fn mutate_equipment_attaches_dock() {
        let mut b = setup_builder();
        let burner = b.equipment_id("burner").unwrap();
        b.mutate_equipment("test_tubes", |eq| {
            eq.dock = Some(DockSpec {
                target: burner,
                offset_y: 35,
            });
        })
        .unwrap();
        let reg = b.build().unwrap();
        let tubes = reg.get_equipment(reg.equipment_id("test_tubes").unwrap()).unwrap();
        assert_eq!(tubes.dock, Some(DockSpec { target: burner, offset_y: 35 }));
    }

    #[test]
    fn empty_registry_builds() {
        let reg = RegistryBuilder::new().build().unwrap();
        assert_eq!(reg.reagent_count(), 0);
        assert_eq!(reg.step_count(), 0);
    }

    #[test]
    fn registry_get_nonexistent_returns_none() {
        let reg = setup_builder().build().unwrap();
        assert!(reg.get_reagent(ReagentId(99)).is_none());
        assert!(reg.get_equipment(EquipmentTypeId(99)).is_none());
        assert!(reg.get_rule(RuleId(99)).is_none());
        assert!(reg.get_step(StepId(99)).is_none());
    }
}
