//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::color::Color;
use crate::command::LabCommand;
use crate::engine::Engine;
use crate::id::EquipmentId;
use crate::registry::{
    AcidBase, DockSpec, EquipmentTypeDef, Precondition, ReagentDef, Registry, RegistryBuilder,
    ThermalMode, ThermalSourceSpec,
};
use crate::sim::SimulationStrategy;
use crate::units::{degrees, f64_to_fixed32};

// ===========================================================================
// Definition constructors
// ===========================================================================

pub fn make_reagent(
    key: &str,
    name: &str,
    formula: &str,
    color: &str,
    molarity: f64,
    acid_base: Option<AcidBase>,
) -> ReagentDef {
    ReagentDef {
        key: key.to_string(),
        name: name.to_string(),
        formula: formula.to_string(),
        color: Color::parse_hex(color).expect("test color parses"),
        concentration: format!("{molarity} M"),
        molarity: f64_to_fixed32(molarity),
        default_volume: 25,
        acid_base,
    }
}

pub fn make_container(key: &str, name: &str) -> EquipmentTypeDef {
    EquipmentTypeDef {
        key: key.to_string(),
        name: name.to_string(),
        container: true,
        dock: None,
        thermal: None,
    }
}

pub fn make_heat_source(key: &str, name: &str, duration: u64) -> EquipmentTypeDef {
    EquipmentTypeDef {
        key: key.to_string(),
        name: name.to_string(),
        container: false,
        dock: None,
        thermal: Some(ThermalSourceSpec {
            mode: ThermalMode::Heating,
            target_temp: degrees(85),
            rate: degrees(2),
            duration,
            removes_source: false,
        }),
    }
}

pub fn make_cold_source(key: &str, name: &str, duration: u64) -> EquipmentTypeDef {
    EquipmentTypeDef {
        key: key.to_string(),
        name: name.to_string(),
        container: false,
        dock: None,
        thermal: Some(ThermalSourceSpec {
            mode: ThermalMode::Cooling,
            target_temp: degrees(0),
            rate: degrees(2),
            duration,
            removes_source: false,
        }),
    }
}

// ===========================================================================
// Reference experiment
// ===========================================================================

/// The reference acid/base experiment used across tests and benches.
///
/// Reagents: hcl (0.1 M acid), naoh (0.1 M base), cocl2, water.
/// Equipment: test_tubes (container, docks onto beaker_hot_water at 35
/// above), beaker_hot_water (heating, 900 ticks), ice_bath (cooling, 600
/// ticks).
/// Rules: {hcl, naoh} -> #E8F5E8 neutralization.
/// Steps: place tubes, add hcl, add naoh, place ice bath, cooling completes.
pub fn reference_registry() -> Registry {
    reference_builder().build().expect("reference registry builds")
}

/// The same configuration, pre-build, for tests that want to tweak it.
pub fn reference_builder() -> RegistryBuilder {
    let mut b = RegistryBuilder::new();

    let hcl = b.register_reagent(make_reagent(
        "hcl",
        "Hydrochloric acid",
        "HCl",
        "#FFF59D",
        0.1,
        Some(AcidBase::Acid),
    ));
    let naoh = b.register_reagent(make_reagent(
        "naoh",
        "Sodium hydroxide",
        "NaOH",
        "#E1F5FE",
        0.1,
        Some(AcidBase::Base),
    ));
    b.register_reagent(make_reagent(
        "cocl2",
        "Cobalt(II) chloride",
        "CoCl2",
        "#FFB6C1",
        0.5,
        None,
    ));
    b.register_reagent(make_reagent(
        "water",
        "Distilled water",
        "H2O",
        "#87CEEB",
        0.0,
        None,
    ));

    let tubes = b.register_equipment(make_container("test_tubes", "Test tubes"));
    let bath = b.register_equipment(make_heat_source(
        "beaker_hot_water",
        "Hot water bath",
        900,
    ));
    let ice = b.register_equipment(make_cold_source("ice_bath", "Ice bath", 600));
    // Tubes dock above either source; the hot bath is the primary pairing.
    b.mutate_equipment("test_tubes", |eq| {
        eq.dock = Some(DockSpec {
            target: bath,
            offset_y: 35,
        });
    })
    .expect("test_tubes registered");

    b.register_rule(
        vec![hcl, naoh],
        Color::parse_hex("#E8F5E8").expect("rule color parses"),
        "Neutralization to salt and water",
        Some("acid-base"),
    );

    b.register_step(
        "Set up",
        "Place the test tubes on the bench",
        Precondition::EquipmentPlaced { equipment: tubes },
    );
    b.register_step(
        "Add acid",
        "Dispense HCl into the test tubes",
        Precondition::ChemicalApplied {
            reagent: hcl,
            target: tubes,
        },
    );
    b.register_step(
        "Add base",
        "Dispense NaOH into the test tubes",
        Precondition::ChemicalApplied {
            reagent: naoh,
            target: tubes,
        },
    );
    b.register_step(
        "Chill",
        "Place the ice bath under the tubes",
        Precondition::EquipmentPlaced { equipment: ice },
    );
    b.register_step(
        "Wait",
        "Let the cooling phase run to completion",
        Precondition::ThermalPhaseComplete {
            mode: ThermalMode::Cooling,
        },
    );

    b
}

/// Engine over the reference registry in tick mode.
pub fn reference_engine() -> Engine {
    Engine::new(reference_registry(), SimulationStrategy::Tick)
}

// ===========================================================================
// Driving helpers
// ===========================================================================

/// Queue a placement by type key and run one step. Panics on unknown keys
/// (tests configure their own registries).
pub fn place(engine: &mut Engine, type_key: &str, x: i32, y: i32) -> EquipmentId {
    let equipment_type = engine
        .registry()
        .equipment_id(type_key)
        .unwrap_or_else(|| panic!("unknown equipment key {type_key:?}"));
    engine.submit(LabCommand::PlaceEquipment {
        equipment_type,
        x,
        y,
    });
    engine.step();
    engine
        .workbench()
        .instance_of_type(equipment_type)
        .unwrap_or_else(|| panic!("{type_key:?} did not land on the bench"))
}

/// Queue a dispense by reagent key and run one step.
pub fn dispense(engine: &mut Engine, reagent_key: &str, equipment: EquipmentId, amount: i64) {
    let reagent = engine
        .registry()
        .reagent_id(reagent_key)
        .unwrap_or_else(|| panic!("unknown reagent key {reagent_key:?}"));
    engine.submit(LabCommand::Dispense {
        reagent,
        equipment,
        amount,
    });
    engine.step();
}

/// Run `n` steps.
pub fn run_ticks(engine: &mut Engine, n: u64) {
    for _ in 0..n {
        engine.step();
    }
}
