//! Guided run example: drives the reference acid/base experiment headless,
//! printing events and the final report.
//!
//! Place tubes -> add HCl -> add NaOH (neutralization rule fires) -> place
//! the ice bath -> let the cooling phase run out.
//!
//! Run with: `cargo run -p benchtop-core --example guided_run`

use benchtop_core::event::{EventKind, LabEvent};
use benchtop_core::test_utils::*;

fn main() {
    env_logger::init();

    let mut engine = reference_engine();

    // Print every step advance and phase transition as it happens.
    for kind in [
        EventKind::StepAdvanced,
        EventKind::ReactionDetected,
        EventKind::PhaseStarted,
        EventKind::PhaseCompleted,
        EventKind::ExperimentCompleted,
    ] {
        engine.on_passive(
            kind,
            Box::new(|event: &LabEvent| {
                println!("[tick {:>4}] {event:?}", event.tick());
            }),
        );
    }

    engine.set_completion_callback(Box::new(|report| {
        println!("--- experiment complete at tick {} ---", report.tick);
        for (id, measurement) in &report.measurements {
            println!(
                "{id:?}: {} mL, pH {:.2}, {} at {:.1} C",
                measurement.volume_ml,
                measurement.ph,
                measurement.color.to_hex(),
                measurement.temperature_c,
            );
        }
        println!("reactions observed: {}", report.reactions.len());
    }));

    // Step 1: set up the tubes.
    let tubes = place(&mut engine, "test_tubes", 500, 500);

    // Steps 2-3: acid then base. The exact-set rule {hcl, naoh} overrides
    // the weighted blend.
    dispense(&mut engine, "hcl", tubes, 25);
    dispense(&mut engine, "naoh", tubes, 25);

    // Step 4: the ice bath lands below the tubes, inside the cooling zone.
    place(&mut engine, "ice_bath", 505, 540);

    // Step 5: run the cooling phase to its 600-tick deadline.
    run_ticks(&mut engine, 600);

    let snapshot = engine.snapshot();
    println!(
        "final bench: {} instances, step {}/{}",
        snapshot.equipment.len(),
        snapshot.current_step,
        snapshot.step_count,
    );
}
