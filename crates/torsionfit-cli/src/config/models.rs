use std::path::PathBuf;
use torsionfit::engine::config::ModelConfig;

/// A fragment to load: its residue name and the CSV file with its QM scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSource {
    pub residue: String,
    pub qm_energies: PathBuf,
}

pub struct AppConfig {
    pub base_parameters: PathBuf,
    pub stream_parameters: Option<PathBuf>,
    pub fragments: Vec<FragmentSource>,
    pub model: ModelConfig,
}
