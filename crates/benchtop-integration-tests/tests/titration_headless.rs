//! Headless acid/base session driven entirely through the drag-payload
//! boundary, the way a UI host would: JSON payloads in, events and
//! snapshots out.

use benchtop_core::color::Color;
use benchtop_core::command::{DropPayload, DropTarget};
use benchtop_core::engine::Engine;
use benchtop_core::sim::SimulationStrategy;
use benchtop_core::test_utils::{reference_registry, run_ticks};
use benchtop_core::thermal::ThermalPhase;
use std::cell::RefCell;
use std::rc::Rc;

fn payload(raw: &str) -> DropPayload {
    serde_json::from_str(raw).expect("payload parses")
}

fn reference_engine() -> Engine {
    Engine::new(reference_registry(), SimulationStrategy::Tick)
}

#[test]
fn payload_driven_titration_completes() {
    let mut engine = reference_engine();
    let completions = Rc::new(RefCell::new(0u32));
    let count = Rc::clone(&completions);
    engine.set_completion_callback(Box::new(move |_| *count.borrow_mut() += 1));

    // The host drags the tube rack onto the bench...
    assert!(engine.handle_drop(
        payload(r#"{"kind":"equipment","id":"test_tubes"}"#),
        DropTarget::Bench { x: 500, y: 500 },
    ));
    engine.step();
    let tubes = engine
        .workbench()
        .instance_of_type(engine.registry().equipment_id("test_tubes").unwrap())
        .expect("tubes placed");
    assert_eq!(engine.current_step(), 1);

    // ...then acid and base, with explicit volumes from the burette UI.
    assert!(engine.handle_drop(
        payload(r#"{"kind":"chemical","id":"hcl","amount":25}"#),
        DropTarget::Equipment(tubes),
    ));
    engine.step();
    assert!(engine.handle_drop(
        payload(r#"{"kind":"chemical","id":"naoh","amount":50}"#),
        DropTarget::Equipment(tubes),
    ));
    engine.step();
    assert_eq!(engine.current_step(), 3);

    // The neutralization rule wins over the 25:50 weighted blend.
    let mix = engine.mix(tubes).expect("mix computed");
    assert_eq!(mix.color, Color::parse_hex("#E8F5E8").unwrap());

    // Ice bath below the tubes; cooling runs its 600-tick course.
    assert!(engine.handle_drop(
        payload(r#"{"kind":"equipment","id":"ice_bath"}"#),
        DropTarget::Bench { x: 505, y: 540 },
    ));
    engine.step();
    assert_eq!(engine.current_step(), 4);
    assert_eq!(engine.thermal_phase(tubes), ThermalPhase::Cooling);

    run_ticks(&mut engine, 600);
    assert!(engine.is_complete());
    assert_eq!(*completions.borrow(), 1);
}

#[test]
fn weighted_blend_when_no_rule_matches() {
    let mut engine = reference_engine();
    engine.handle_drop(
        payload(r#"{"kind":"equipment","id":"test_tubes"}"#),
        DropTarget::Bench { x: 500, y: 500 },
    );
    engine.step();
    let tubes = engine
        .workbench()
        .instance_of_type(engine.registry().equipment_id("test_tubes").unwrap())
        .unwrap();

    // cocl2 and water have no rule in this experiment: 30:20 blend of
    // #FFB6C1 and #87CEEB.
    engine.handle_drop(
        payload(r#"{"kind":"chemical","id":"cocl2","amount":30}"#),
        DropTarget::Equipment(tubes),
    );
    engine.handle_drop(
        payload(r#"{"kind":"chemical","id":"water","amount":20}"#),
        DropTarget::Equipment(tubes),
    );
    engine.step();

    let mix = engine.mix(tubes).expect("mix computed");
    assert_eq!(mix.rule, None);
    assert_eq!(mix.color, Color::rgb(207, 192, 210));
}

#[test]
fn snapshot_reflects_bench_state() {
    let mut engine = reference_engine();
    engine.handle_drop(
        payload(r#"{"kind":"equipment","id":"test_tubes"}"#),
        DropTarget::Bench { x: 500, y: 500 },
    );
    engine.step();
    let tubes = engine
        .workbench()
        .instance_of_type(engine.registry().equipment_id("test_tubes").unwrap())
        .unwrap();
    engine.handle_drop(
        payload(r#"{"kind":"chemical","id":"hcl","amount":25}"#),
        DropTarget::Equipment(tubes),
    );
    engine.step();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.current_step, 2);
    assert_eq!(snapshot.step_count, 5);
    assert_eq!(snapshot.equipment.len(), 1);
    let tube_snap = &snapshot.equipment[0];
    assert_eq!(tube_snap.type_key, "test_tubes");
    assert_eq!((tube_snap.x, tube_snap.y), (500, 500));
    assert_eq!(tube_snap.volume_ml, 25);
    assert_eq!(tube_snap.phase, ThermalPhase::Idle);
    assert_eq!(tube_snap.temperature_c, 25.0);
}

#[test]
fn garbled_payloads_leave_the_session_untouched() {
    let mut engine = reference_engine();
    engine.step();

    for raw in [
        r#"{"kind":"chemical","id":"hcl","amount":25}"#, // chemical on bench
        r#"{"kind":"equipment","id":"unknown_thing"}"#,
    ] {
        let parsed = payload(raw);
        let target = match &parsed {
            DropPayload::Chemical { .. } => DropTarget::Bench { x: 10, y: 10 },
            DropPayload::Equipment { .. } => DropTarget::Bench { x: 10, y: 10 },
        };
        assert!(!engine.handle_drop(parsed, target));
    }
    engine.step();

    assert!(engine.workbench().is_empty());
    assert_eq!(engine.current_step(), 0);
    // The whole session is indistinguishable from one that received no
    // drops at all.
    let mut control = reference_engine();
    control.step();
    control.step();
    assert_eq!(engine.state_hash(), control.state_hash());
}
