//! Benchtop Core -- the simulation engine for interactive chemistry-lab
//! experiments.
//!
//! This crate provides the workbench placement model, reaction detection and
//! color mixing, per-container thermal phases, the guided-step procedure,
//! typed events, and the deterministic tick pipeline every Benchtop
//! experiment runs on. It has no UI: hosts submit commands and subscribe to
//! events.
//!
//! # Six-Phase Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one tick
//! through the following phases:
//!
//! 1. **Pre-tick** -- Apply queued commands and reactive-handler mutations
//!    (place/move equipment, dispense chemicals, removals).
//! 2. **Thermal** -- Classify containers against heat/cold-source zones,
//!    fire due phase deadlines, interpolate temperatures.
//! 3. **Mixture** -- Re-run reaction lookup, color mixing, and measurement
//!    for containers whose derived state went stale.
//! 4. **Procedure** -- Gate the guided-step index on the actions observed
//!    this tick.
//! 5. **Post-tick** -- Deliver buffered events; collect reactive mutations
//!    for the next tick.
//! 6. **Bookkeeping** -- Increment the tick counter and compute the state
//!    hash.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Main simulation engine and pipeline orchestrator.
//! - [`workbench::Workbench`] -- Placed equipment, bounds clamping, and
//!   proximity docking.
//! - [`registry::Registry`] -- Immutable per-experiment configuration:
//!   reagents, equipment types, reaction rules, guided steps.
//! - [`chemistry::mix`] -- Rule-table lookup with volume-weighted fallback.
//! - [`thermal::ThermalSimulator`] -- Per-container heating/cooling state
//!   machines with scheduler-owned completion deadlines.
//! - [`procedure::ProcedureController`] -- The strictly monotonic
//!   guided-step index.
//! - [`event::EventBus`] -- Subscription-based event bus with buffered
//!   delivery.
//! - [`units::Fixed64`] -- Q32.32 fixed-point for deterministic thermal
//!   math.

pub mod chemistry;
pub mod color;
pub mod command;
pub mod contents;
pub mod dirty;
pub mod engine;
pub mod event;
pub mod id;
pub mod measure;
pub mod procedure;
pub mod query;
pub mod registry;
pub mod schedule;
pub mod sim;
pub mod thermal;
pub mod units;
pub mod workbench;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
