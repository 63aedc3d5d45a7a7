//! Reaction palette example: prints what every reagent pair in the
//! reference experiment mixes to -- rule overrides versus weighted blends.
//!
//! Run with: `cargo run -p benchtop-core --example reaction_palette`

use benchtop_core::chemistry;
use benchtop_core::contents::{Contents, DispensedChemical};
use benchtop_core::id::ReagentId;
use benchtop_core::test_utils::reference_registry;

fn main() {
    env_logger::init();

    let registry = reference_registry();

    println!("reagents:");
    for i in 0..registry.reagent_count() {
        let def = registry.get_reagent(ReagentId(i as u32)).unwrap();
        println!(
            "  {:<8} {:<22} {:>6}  {}",
            def.key,
            def.name,
            def.formula,
            def.color.to_hex(),
        );
    }

    println!("\npairwise mixes (30 mL + 20 mL):");
    for a in 0..registry.reagent_count() as u32 {
        for b in (a + 1)..registry.reagent_count() as u32 {
            let mut contents = Contents::new();
            contents.push(DispensedChemical {
                reagent: ReagentId(a),
                volume: 30,
                concentration: String::new(),
            });
            contents.push(DispensedChemical {
                reagent: ReagentId(b),
                volume: 20,
                concentration: String::new(),
            });
            let outcome = chemistry::mix(&contents, &registry);
            let left = registry.get_reagent(ReagentId(a)).unwrap();
            let right = registry.get_reagent(ReagentId(b)).unwrap();
            match outcome.rule {
                Some(rule_id) => {
                    let rule = registry.get_rule(rule_id).unwrap();
                    println!(
                        "  {:<8} + {:<8} -> {}  (rule: {})",
                        left.key,
                        right.key,
                        outcome.color.to_hex(),
                        rule.description,
                    );
                }
                None => {
                    println!(
                        "  {:<8} + {:<8} -> {}  (weighted blend)",
                        left.key,
                        right.key,
                        outcome.color.to_hex(),
                    );
                }
            }
        }
    }
}
