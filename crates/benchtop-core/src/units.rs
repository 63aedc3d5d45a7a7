use fixed::types::{I16F16, I32F32};

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Q16.16 fixed-point for compact storage (molarities, etc.).
pub type Fixed32 = I16F16;

/// Ticks are the atomic unit of simulated time. One tick models one second.
pub type Ticks = u64;

/// Temperatures are degrees Celsius in fixed-point so the thermal loop stays
/// deterministic. Floats appear only at the display boundary.
pub type Degrees = Fixed64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert an f64 to Fixed32. Use only for initialization.
#[inline]
pub fn f64_to_fixed32(v: f64) -> Fixed32 {
    Fixed32::from_num(v)
}

/// Convert Fixed32 to f64. Use only for display.
#[inline]
pub fn fixed32_to_f64(v: Fixed32) -> f64 {
    v.to_num::<f64>()
}

/// Whole-number degrees.
#[inline]
pub fn degrees(v: i32) -> Degrees {
    Degrees::from_num(v)
}

/// Move `actual` one step of `rate` toward `target`, stopping exactly at
/// `target` once reached. Never overshoots. `rate` is assumed non-negative.
#[inline]
pub fn step_toward(actual: Degrees, target: Degrees, rate: Degrees) -> Degrees {
    if actual < target {
        let next = actual + rate;
        if next > target { target } else { next }
    } else if actual > target {
        let next = actual - rate;
        if next < target { target } else { next }
    } else {
        actual
    }
}
