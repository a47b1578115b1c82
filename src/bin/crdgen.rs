//! CRD YAML Generator
//!
//! Prints the HyperConverged CRD manifest.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/hyperconverged.yaml

use hyperconverged_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
