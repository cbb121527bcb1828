use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use torsionfit::engine::config::PhasePolicy;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<FileModelConfig>,
    pub parameters: Option<FileParametersConfig>,
    #[serde(default)]
    pub fragments: Vec<FileFragmentConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    pub phase_policy: Option<PhasePolicy>,
    pub decouple_n: Option<bool>,
    pub sample_n5: Option<bool>,
    /// Torsions written as `"A-B-C-D"`.
    pub torsions: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileParametersConfig {
    pub base: Option<String>,
    pub stream: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFragmentConfig {
    pub residue: String,
    pub qm_energies: String,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_is_parsed() {
        let config: FileConfig = toml::from_str(
            r#"
            [model]
            phase-policy = "continuous-phase"
            decouple-n = true
            torsions = ["CG331-CG321-CG321-OG311"]

            [parameters]
            base = "base.toml"
            stream = "ligand.toml"

            [[fragments]]
            residue = "ETOH"
            qm-energies = "scans/etoh.csv"
            "#,
        )
        .unwrap();

        let model = config.model.unwrap();
        assert_eq!(model.phase_policy, Some(PhasePolicy::ContinuousPhase));
        assert_eq!(model.decouple_n, Some(true));
        assert_eq!(model.sample_n5, None);
        assert_eq!(config.parameters.unwrap().stream.as_deref(), Some("ligand.toml"));
        assert_eq!(config.fragments.len(), 1);
        assert_eq!(config.fragments[0].qm_energies, "scans/etoh.csv");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str(
            r#"
            [model]
            phase-policy = "standard"
            temperature = 300.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_file_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(&path, "[model]\nphase-policy = \"sideways\"\n").unwrap();

        let result = FileConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { path: p, .. }) if p == path));
    }
}
