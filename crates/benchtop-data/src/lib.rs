//! Benchtop Data -- data-driven experiment configuration.
//!
//! Experiments are defined in JSON: reagents, equipment types, reaction
//! rules, and the guided-step sequence. [`loader::load_experiment_json`]
//! deserializes a definition and produces a validated
//! [`RegistryBuilder`](benchtop_core::registry::RegistryBuilder) ready to
//! build and hand to the engine.
//!
//! The crate ships one reference experiment,
//! [`CRYSTAL_HYDRATE_JSON`]: the cobalt(II) chloride hydrate color-change
//! procedure.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_experiment, load_experiment_json};
pub use schema::ExperimentData;

/// The bundled cobalt chloride hydrate experiment definition.
pub const CRYSTAL_HYDRATE_JSON: &str = include_str!("../data/crystal_hydrate.json");
