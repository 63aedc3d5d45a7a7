//! Simulation strategy and state types.
//!
//! The engine is parameterized by a [`SimulationStrategy`] that determines
//! how time advances. Both strategies execute the same six-phase pipeline;
//! they differ only in how many steps run per `advance()` call.

use crate::units::{Degrees, Ticks};
use crate::workbench::PlacementOutcome;

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the engine advances time. Chosen at engine construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SimulationStrategy {
    /// Single step per call. The host calls `engine.step()` at a fixed rate
    /// (one tick = one second of simulated time).
    Tick,

    /// Real-time mode. The host calls `engine.advance(dt)` with elapsed
    /// ticks; the engine accumulates and runs as many fixed steps as fit,
    /// carrying the remainder forward.
    Delta {
        /// Duration of one fixed simulation step, in ticks.
        fixed_timestep: Ticks,
    },
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: Ticks,

    /// Accumulated time remainder for delta mode. Unused in tick mode.
    pub accumulator: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            accumulator: 0,
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// Number of simulation steps actually executed.
    pub steps_run: u64,

    /// Placement outcomes from commands applied during those steps, in
    /// application order. Lets the host position drag previews without
    /// re-querying the bench.
    pub placements: Vec<PlacementOutcome>,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for regression checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_degrees(&mut self, v: Degrees) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
