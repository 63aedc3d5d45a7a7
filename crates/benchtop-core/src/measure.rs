//! Derived measurements for a container: volume, molarity, moles, pH, and
//! temperature.
//!
//! This is the display boundary. The sim loop stays in fixed-point; here the
//! values are converted to f64 for the snapshot the host renders or exports.
//! Measurements are recomputed after every dispense/mix and while a thermal
//! phase is moving a container's temperature.

use crate::chemistry::MixOutcome;
use crate::color::Color;
use crate::contents::Contents;
use crate::id::RuleId;
use crate::registry::{AcidBase, Registry};
use crate::units::{Degrees, fixed32_to_f64, fixed64_to_f64};
use std::collections::BTreeMap;

/// A point-in-time snapshot of a container's derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Total liquid volume, mL.
    pub volume_ml: f64,
    pub color: Color,
    /// The reaction rule currently matching the contents, if any.
    pub rule: Option<RuleId>,
    /// Concentration label of the dominant (largest-volume) reagent.
    pub concentration: Option<String>,
    /// Total moles of solute across all entries.
    pub moles: f64,
    /// Overall molarity, mol/L. Zero for an empty container.
    pub molarity: f64,
    /// Derived pH. 7.0 when no acid or base is present.
    pub ph: f64,
    /// Current temperature, degrees Celsius.
    pub temperature_c: f64,
}

/// Compute the measurement snapshot for one container.
pub fn measure(
    contents: &Contents,
    registry: &Registry,
    mix: &MixOutcome,
    temperature: Degrees,
) -> Measurement {
    let mut volume_ml_total: u64 = 0;
    let mut moles = 0.0_f64;
    let mut acid_moles = 0.0_f64;
    let mut base_moles = 0.0_f64;
    let mut has_acid_base = false;
    let mut per_reagent_volume: BTreeMap<_, u64> = BTreeMap::new();

    for entry in contents.entries() {
        volume_ml_total += entry.volume as u64;
        *per_reagent_volume.entry(entry.reagent).or_default() += entry.volume as u64;
        let Some(def) = registry.get_reagent(entry.reagent) else {
            continue;
        };
        let liters = entry.volume as f64 / 1000.0;
        let entry_moles = fixed32_to_f64(def.molarity) * liters;
        moles += entry_moles;
        match def.acid_base {
            Some(AcidBase::Acid) => {
                acid_moles += entry_moles;
                has_acid_base = true;
            }
            Some(AcidBase::Base) => {
                base_moles += entry_moles;
                has_acid_base = true;
            }
            None => {}
        }
    }

    let liters = volume_ml_total as f64 / 1000.0;
    let molarity = if liters > 0.0 { moles / liters } else { 0.0 };

    // Dominant reagent by combined volume; ties break toward the lower id.
    let concentration = per_reagent_volume
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .and_then(|(&reagent, _)| registry.get_reagent(reagent))
        .map(|def| def.concentration.clone());

    let ph = derive_ph(acid_moles, base_moles, liters, has_acid_base);

    Measurement {
        volume_ml: volume_ml_total as f64,
        color: mix.color,
        rule: mix.rule,
        concentration,
        moles,
        molarity,
        ph,
        temperature_c: fixed64_to_f64(temperature),
    }
}

/// Strong acid/base pH from the net excess of H+ over OH-. Neutral (7.0)
/// when nothing acid/base is present or the excess cancels exactly.
fn derive_ph(acid_moles: f64, base_moles: f64, liters: f64, has_acid_base: bool) -> f64 {
    if !has_acid_base || liters <= 0.0 {
        return 7.0;
    }
    let net = acid_moles - base_moles;
    if net > 0.0 {
        (-(net / liters).log10()).clamp(0.0, 14.0)
    } else if net < 0.0 {
        (14.0 + (-net / liters).log10()).clamp(0.0, 14.0)
    } else {
        7.0
    }
}
