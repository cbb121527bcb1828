use super::load_inputs;
use crate::cli::InspectArgs;
use crate::config::build_config;
use crate::error::Result;
use std::fmt::{self, Write as _};
use torsionfit::workflows::fit::TorsionFitModel;
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    let app = build_config(&args.model)?;
    let mut inputs = load_inputs(&app)?;

    info!("Building the torsion fit model...");
    let model = TorsionFitModel::new(
        &mut inputs.base,
        inputs.stream.as_ref(),
        inputs.fragments,
        app.model,
    )?;

    let report = render(&model).map_err(anyhow::Error::from)?;
    print!("{}", report);
    Ok(())
}

fn render<S>(model: &TorsionFitModel<'_, S>) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Phase policy: {}", model.config().phase_policy)?;
    writeln!(
        out,
        "Fragments: {} ({} QM energies)",
        model.fragments().len(),
        model.qm_energy().len()
    )?;

    writeln!(out, "\nSelected torsions:")?;
    for (torsion, bitstring) in model.torsions().zip(model.initial_bitstrings()) {
        let active: Vec<String> = bitstring.active().map(|p| p.to_string()).collect();
        writeln!(
            out,
            "  {:<32} bitstring {}  periodicities [{}]",
            torsion.to_string(),
            bitstring,
            active.join(", ")
        )?;
    }

    writeln!(out, "\nLatent parameters:")?;
    for (_, variable) in model.parameters().iter() {
        writeln!(
            out,
            "  {:<48} {:<26} {:>10.4}",
            variable.name(),
            variable.domain().to_string(),
            variable.value()
        )?;
    }
    Ok(out)
}
