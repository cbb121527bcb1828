use super::load_inputs;
use crate::cli::ExportArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use torsionfit::workflows::fit::TorsionFitModel;
use tracing::info;

pub fn run(args: ExportArgs) -> Result<()> {
    let app = build_config(&args.model)?;
    let mut inputs = load_inputs(&app)?;

    {
        let mut model = TorsionFitModel::new(
            &mut inputs.base,
            inputs.stream.as_ref(),
            inputs.fragments,
            app.model,
        )?;
        info!("Writing initial latent values into the parameter set...");
        model.update_parameters()?;
    }

    info!("Saving {} dihedral types to {:?}", inputs.base.len(), &args.output);
    inputs
        .base
        .save(&args.output)
        .map_err(|e| CliError::FileParsing {
            path: args.output.clone(),
            source: e.into(),
        })?;

    println!(
        "Completed parameter set written to: {}",
        args.output.display()
    );
    Ok(())
}
