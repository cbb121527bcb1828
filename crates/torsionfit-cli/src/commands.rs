pub mod export;
pub mod inspect;

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use std::path::Path;
use torsionfit::core::forcefield::params::DihedralParameterSet;
use torsionfit::core::models::fragment::{Fragment, load_qm_energies_csv};
use tracing::info;

/// Everything a model is built from, loaded from disk.
pub struct ModelInputs {
    pub base: DihedralParameterSet,
    pub stream: Option<DihedralParameterSet>,
    pub fragments: Vec<Fragment>,
}

pub fn load_inputs(app: &AppConfig) -> Result<ModelInputs> {
    info!("Loading base parameters from {:?}", &app.base_parameters);
    let base = load_parameters(&app.base_parameters)?;
    let stream = match &app.stream_parameters {
        Some(path) => {
            info!("Loading parameter stream from {:?}", path);
            Some(load_parameters(path)?)
        }
        None => None,
    };

    let fragments = app
        .fragments
        .iter()
        .map(|source| {
            let qm = load_qm_energies_csv(&source.qm_energies).map_err(|e| {
                CliError::FileParsing {
                    path: source.qm_energies.clone(),
                    source: e.into(),
                }
            })?;
            info!(
                "Loaded {} QM energies for fragment '{}'.",
                qm.len(),
                source.residue
            );
            Ok(Fragment::from_qm_energies(&source.residue, qm))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelInputs {
        base,
        stream,
        fragments,
    })
}

fn load_parameters(path: &Path) -> Result<DihedralParameterSet> {
    DihedralParameterSet::load(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}
