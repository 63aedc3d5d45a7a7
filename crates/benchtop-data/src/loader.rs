//! Experiment loading: JSON definition -> validated [`RegistryBuilder`].
//!
//! Loading runs in registration order: reagents and equipment first, then
//! dock pairings (phase-2 mutation, once every equipment id exists), then
//! rules and steps, resolving every string key as it goes. Cross-reference
//! validation that doesn't need key resolution is left to
//! [`RegistryBuilder::build`].

use crate::schema::{ExperimentData, PreconditionData};
use benchtop_core::color::{Color, ColorParseError};
use benchtop_core::registry::{
    AcidBase, DockSpec, EquipmentTypeDef, Precondition, ReagentDef, RegistryBuilder,
    RegistryError, ThermalMode, ThermalSourceSpec,
};
use benchtop_core::units::{f64_to_fixed32, f64_to_fixed64};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading an experiment definition.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("invalid color: {0}")]
    InvalidColor(#[from] ColorParseError),
    #[error("unknown reagent reference: {0}")]
    UnknownReagentRef(String),
    #[error("unknown equipment reference: {0}")]
    UnknownEquipmentRef(String),
    #[error("unknown thermal mode '{0}' (expected 'heating' or 'cooling')")]
    UnknownMode(String),
    #[error("unknown acid/base class '{0}' (expected 'acid' or 'base')")]
    UnknownAcidBase(String),
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load an experiment definition from a JSON string.
pub fn load_experiment_json(json: &str) -> Result<RegistryBuilder, DataLoadError> {
    let data: ExperimentData = serde_json::from_str(json)?;
    load_experiment(data)
}

/// Build a registry builder from an already-deserialized definition.
pub fn load_experiment(data: ExperimentData) -> Result<RegistryBuilder, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    for reagent in &data.reagents {
        if builder.reagent_id(&reagent.key).is_some() {
            log::warn!(
                "experiment '{}': duplicate reagent key '{}' shadows the earlier entry",
                data.name,
                reagent.key
            );
        }
        builder.register_reagent(ReagentDef {
            key: reagent.key.clone(),
            name: reagent.name.clone(),
            formula: reagent.formula.clone(),
            color: Color::parse_hex(&reagent.color)?,
            concentration: reagent.concentration.clone(),
            molarity: f64_to_fixed32(reagent.molarity),
            default_volume: reagent.default_volume,
            acid_base: parse_acid_base(reagent.acid_base.as_deref())?,
        });
    }

    // Equipment shells first; dock pairings attach below once every
    // equipment key resolves.
    for equipment in &data.equipment {
        builder.register_equipment(EquipmentTypeDef {
            key: equipment.key.clone(),
            name: equipment.name.clone(),
            container: equipment.container,
            dock: None,
            thermal: equipment
                .thermal
                .as_ref()
                .map(|thermal| {
                    Ok::<_, DataLoadError>(ThermalSourceSpec {
                        mode: parse_mode(&thermal.mode)?,
                        target_temp: f64_to_fixed64(thermal.target_temp),
                        rate: f64_to_fixed64(thermal.rate),
                        duration: thermal.duration,
                        removes_source: thermal.removes_source,
                    })
                })
                .transpose()?,
        });
    }

    for equipment in &data.equipment {
        let Some(dock) = &equipment.dock else {
            continue;
        };
        let target = builder
            .equipment_id(&dock.target)
            .ok_or_else(|| DataLoadError::UnknownEquipmentRef(dock.target.clone()))?;
        let spec = DockSpec {
            target,
            offset_y: dock.offset_y,
        };
        builder.mutate_equipment(&equipment.key, |def| {
            def.dock = Some(spec);
        })?;
    }

    for rule in &data.rules {
        let reagents = rule
            .reagents
            .iter()
            .map(|key| {
                builder
                    .reagent_id(key)
                    .ok_or_else(|| DataLoadError::UnknownReagentRef(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        builder.register_rule(
            reagents,
            Color::parse_hex(&rule.outcome)?,
            &rule.description,
            rule.reaction_type.as_deref(),
        );
    }

    for step in &data.steps {
        let precondition = match &step.precondition {
            PreconditionData::EquipmentPlaced { equipment } => Precondition::EquipmentPlaced {
                equipment: builder
                    .equipment_id(equipment)
                    .ok_or_else(|| DataLoadError::UnknownEquipmentRef(equipment.clone()))?,
            },
            PreconditionData::ChemicalApplied { reagent, target } => Precondition::ChemicalApplied {
                reagent: builder
                    .reagent_id(reagent)
                    .ok_or_else(|| DataLoadError::UnknownReagentRef(reagent.clone()))?,
                target: builder
                    .equipment_id(target)
                    .ok_or_else(|| DataLoadError::UnknownEquipmentRef(target.clone()))?,
            },
            PreconditionData::ThermalPhaseComplete { mode } => {
                Precondition::ThermalPhaseComplete {
                    mode: parse_mode(mode)?,
                }
            }
        };
        builder.register_step(&step.title, &step.description, precondition);
    }

    Ok(builder)
}

fn parse_mode(mode: &str) -> Result<ThermalMode, DataLoadError> {
    match mode {
        "heating" => Ok(ThermalMode::Heating),
        "cooling" => Ok(ThermalMode::Cooling),
        other => Err(DataLoadError::UnknownMode(other.to_string())),
    }
}

fn parse_acid_base(class: Option<&str>) -> Result<Option<AcidBase>, DataLoadError> {
    match class {
        None => Ok(None),
        Some("acid") => Ok(Some(AcidBase::Acid)),
        Some("base") => Ok(Some(AcidBase::Base)),
        Some(other) => Err(DataLoadError::UnknownAcidBase(other.to_string())),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CRYSTAL_HYDRATE_JSON;
    use benchtop_core::registry::ThermalMode;
    use benchtop_core::units::degrees;

    #[test]
    fn crystal_hydrate_loads_and_builds() {
        let builder = load_experiment_json(CRYSTAL_HYDRATE_JSON).unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.reagent_count(), 3);
        assert_eq!(registry.equipment_count(), 2);
        assert_eq!(registry.rule_count(), 2);
        assert_eq!(registry.step_count(), 6);
    }

    #[test]
    fn crystal_hydrate_dock_resolves() {
        let registry = load_experiment_json(CRYSTAL_HYDRATE_JSON)
            .unwrap()
            .build()
            .unwrap();
        let tubes = registry.equipment_id("test_tubes").unwrap();
        let bath = registry.equipment_id("beaker_hot_water").unwrap();
        let def = registry.get_equipment(tubes).unwrap();
        let dock = def.dock.expect("tubes dock onto the bath");
        assert_eq!(dock.target, bath);
        assert_eq!(dock.offset_y, 35);
    }

    #[test]
    fn crystal_hydrate_thermal_spec() {
        let registry = load_experiment_json(CRYSTAL_HYDRATE_JSON)
            .unwrap()
            .build()
            .unwrap();
        let bath = registry.equipment_id("beaker_hot_water").unwrap();
        let spec = registry
            .get_equipment(bath)
            .unwrap()
            .thermal
            .clone()
            .expect("bath is a heat source");
        assert_eq!(spec.mode, ThermalMode::Heating);
        assert_eq!(spec.target_temp, degrees(85));
        assert_eq!(spec.rate, degrees(2));
        assert_eq!(spec.duration, 900);
        assert!(spec.removes_source);
    }

    #[test]
    fn crystal_hydrate_rules_resolve() {
        let registry = load_experiment_json(CRYSTAL_HYDRATE_JSON)
            .unwrap()
            .build()
            .unwrap();
        let cocl2 = registry.reagent_id("cocl2").unwrap();
        let water = registry.reagent_id("water").unwrap();
        let hcl = registry.reagent_id("hcl").unwrap();

        let mut pair = vec![cocl2, water];
        pair.sort();
        assert!(registry.match_rule(&pair).is_some());

        let mut triple = vec![cocl2, water, hcl];
        triple.sort();
        assert!(registry.match_rule(&triple).is_some());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            load_experiment_json("{not json"),
            Err(DataLoadError::JsonParse(_))
        ));
    }

    #[test]
    fn bad_color_is_rejected() {
        let json = r##"{
            "name": "bad",
            "reagents": [{
                "key": "x", "name": "X", "formula": "X",
                "color": "red", "concentration": "1 M"
            }]
        }"##;
        assert!(matches!(
            load_experiment_json(json),
            Err(DataLoadError::InvalidColor(_))
        ));
    }

    #[test]
    fn unknown_dock_target_is_rejected() {
        let json = r##"{
            "name": "bad",
            "equipment": [{
                "key": "tubes", "name": "Tubes", "container": true,
                "dock": { "target": "phantom", "offset_y": 35 }
            }]
        }"##;
        match load_experiment_json(json) {
            Err(DataLoadError::UnknownEquipmentRef(key)) => assert_eq!(key, "phantom"),
            other => panic!("expected UnknownEquipmentRef, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_rule_reagent_is_rejected() {
        let json = r##"{
            "name": "bad",
            "reagents": [{
                "key": "water", "name": "Water", "formula": "H2O",
                "color": "#87CEEB", "concentration": "pure"
            }],
            "rules": [{
                "reagents": ["water", "phlogiston"],
                "outcome": "#000000",
                "description": "impossible"
            }]
        }"##;
        match load_experiment_json(json) {
            Err(DataLoadError::UnknownReagentRef(key)) => assert_eq!(key, "phlogiston"),
            other => panic!("expected UnknownReagentRef, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_thermal_mode_is_rejected() {
        let json = r##"{
            "name": "bad",
            "equipment": [{
                "key": "laser", "name": "Laser", "container": false,
                "thermal": { "mode": "vaporizing", "target_temp": 3000, "rate": 50, "duration": 10 }
            }]
        }"##;
        assert!(matches!(
            load_experiment_json(json),
            Err(DataLoadError::UnknownMode(_))
        ));
    }

    #[test]
    fn unknown_acid_base_is_rejected() {
        let json = r##"{
            "name": "bad",
            "reagents": [{
                "key": "x", "name": "X", "formula": "X",
                "color": "#000000", "concentration": "1 M",
                "acid_base": "spicy"
            }]
        }"##;
        assert!(matches!(
            load_experiment_json(json),
            Err(DataLoadError::UnknownAcidBase(_))
        ));
    }

    #[test]
    fn step_precondition_variants_parse() {
        let registry = load_experiment_json(CRYSTAL_HYDRATE_JSON)
            .unwrap()
            .build()
            .unwrap();
        use benchtop_core::id::StepId;
        use benchtop_core::registry::Precondition;
        assert!(matches!(
            registry.get_step(StepId(0)).unwrap().precondition,
            Precondition::EquipmentPlaced { .. }
        ));
        assert!(matches!(
            registry.get_step(StepId(1)).unwrap().precondition,
            Precondition::ChemicalApplied { .. }
        ));
        assert!(matches!(
            registry.get_step(StepId(4)).unwrap().precondition,
            Precondition::ThermalPhaseComplete {
                mode: ThermalMode::Heating
            }
        ));
    }
}
