use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileFragmentConfig};
use super::models::{AppConfig, FragmentSource};
use crate::cli::{ModelArgs, PhasePolicyArg};
use crate::error::{CliError, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use torsionfit::core::models::torsion::TorsionKey;
use torsionfit::engine::config::ModelConfigBuilder;

/// Merges CLI arguments, `--set` overrides, the config file and defaults, in
/// that order of precedence. Relative paths in the file are resolved against
/// the file's directory.
pub fn build_config(args: &ModelArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;
    let root = args.config.parent().unwrap_or_else(|| Path::new(""));

    let model_file = file_config.model.take().unwrap_or_default();
    let phase_policy = args
        .phase_policy
        .map(Into::into)
        .or(model_file.phase_policy)
        .unwrap_or(defaults.phase_policy);
    let decouple_n = args.decouple_n || model_file.decouple_n.unwrap_or(defaults.decouple_n);
    let sample_n5 = args.sample_n5 || model_file.sample_n5.unwrap_or(defaults.sample_n5);

    let mut builder = ModelConfigBuilder::new()
        .phase_policy(phase_policy)
        .decouple_n(decouple_n)
        .sample_n5(sample_n5);
    if let Some(torsions) = model_file.torsions {
        builder = builder.torsions_to_optimize(parse_torsions(&torsions)?);
    }
    let model = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let parameters_file = file_config.parameters.take().unwrap_or_default();
    let base_parameters = parameters_file
        .base
        .map(|p| resolve_path(root, &p))
        .ok_or_else(|| {
            CliError::Config("A value for 'parameters.base' is required.".to_string())
        })?;
    let stream_parameters = parameters_file.stream.map(|p| resolve_path(root, &p));

    let fragments = file_config
        .fragments
        .into_iter()
        .map(|f: FileFragmentConfig| FragmentSource {
            residue: f.residue,
            qm_energies: resolve_path(root, &f.qm_energies),
        })
        .collect();

    Ok(AppConfig {
        base_parameters,
        stream_parameters,
        fragments,
        model,
    })
}

fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn parse_torsions(torsions: &[String]) -> Result<Vec<TorsionKey>> {
    torsions
        .iter()
        .map(|t| {
            t.parse::<TorsionKey>()
                .map_err(|e| CliError::Config(format!("Invalid torsion '{}': {}", t, e)))
        })
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid boolean value for {}: {}", key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;

        match key {
            "model.phase-policy" => {
                let policy = PhasePolicyArg::from_str(value_str, true).map_err(|_| {
                    CliError::Config(format!("Invalid phase policy for {}: {}", key, value_str))
                })?;
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .phase_policy = Some(policy.into());
            }
            "model.decouple-n" => {
                config.model.get_or_insert_with(Default::default).decouple_n =
                    Some(parse_bool(key, value_str)?);
            }
            "model.sample-n5" => {
                config.model.get_or_insert_with(Default::default).sample_n5 =
                    Some(parse_bool(key, value_str)?);
            }
            "parameters.base" => {
                config.parameters.get_or_insert_with(Default::default).base =
                    Some(value_str.to_string());
            }
            "parameters.stream" => {
                config.parameters.get_or_insert_with(Default::default).stream =
                    Some(value_str.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};
    use torsionfit::engine::config::PhasePolicy;

    fn write_config(content: &str) -> (TempDir, ModelArgs) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(&path, content).unwrap();
        let args = ModelArgs {
            config: path,
            ..Default::default()
        };
        (dir, args)
    }

    const MINIMAL: &str = r#"
        [parameters]
        base = "base.toml"
        stream = "/abs/ligand.toml"

        [[fragments]]
        residue = "ETOH"
        qm-energies = "scans/etoh.csv"
    "#;

    #[test]
    fn defaults_fill_missing_model_options() {
        let (dir, args) = write_config(MINIMAL);
        let app = build_config(&args).unwrap();

        assert_eq!(app.model.phase_policy, DefaultsConfig::default().phase_policy);
        assert!(!app.model.decouple_n);
        assert!(!app.model.sample_n5);
        assert_eq!(app.model.torsions_to_optimize, None);
        assert_eq!(app.base_parameters, dir.path().join("base.toml"));
        assert_eq!(app.stream_parameters, Some(PathBuf::from("/abs/ligand.toml")));
        assert_eq!(
            app.fragments,
            vec![FragmentSource {
                residue: "ETOH".to_string(),
                qm_energies: dir.path().join("scans/etoh.csv"),
            }]
        );
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let content = format!(
            "[model]\nphase-policy = \"standard\"\n{}",
            MINIMAL
        );
        let (_dir, mut args) = write_config(&content);
        args.phase_policy = Some(PhasePolicyArg::PhaseEliminated);
        args.sample_n5 = true;

        let app = build_config(&args).unwrap();
        assert_eq!(app.model.phase_policy, PhasePolicy::PhaseEliminated);
        assert!(app.model.sample_n5);
    }

    #[test]
    fn set_values_override_file_values() {
        let content = format!(
            "[model]\nphase-policy = \"standard\"\ndecouple-n = false\n{}",
            MINIMAL
        );
        let (_dir, mut args) = write_config(&content);
        args.set_values = vec![
            "model.phase-policy=continuous-phase".to_string(),
            "model.decouple-n=true".to_string(),
        ];

        let app = build_config(&args).unwrap();
        assert_eq!(app.model.phase_policy, PhasePolicy::ContinuousPhase);
        assert!(app.model.decouple_n);
    }

    #[test]
    fn explicit_torsions_are_parsed() {
        let content = format!(
            "[model]\ntorsions = [\"CG331-CG321-CG321-OG311\"]\n{}",
            MINIMAL
        );
        let (_dir, args) = write_config(&content);
        let app = build_config(&args).unwrap();
        assert_eq!(
            app.model.torsions_to_optimize,
            Some(vec!["CG331-CG321-CG321-OG311".parse().unwrap()])
        );
    }

    #[test]
    fn malformed_torsion_is_a_config_error() {
        let content = format!("[model]\ntorsions = [\"A-B-C\"]\n{}", MINIMAL);
        let (_dir, args) = write_config(&content);
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn sample_n5_with_standard_policy_is_rejected() {
        let (_dir, mut args) = write_config(MINIMAL);
        args.sample_n5 = true;
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn missing_base_parameters_is_an_error() {
        let (_dir, args) = write_config("[model]\nphase-policy = \"standard\"\n");
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let (_dir, mut args) = write_config(MINIMAL);
        for bad in ["model.decouple-n", "model.decouple-n=maybe", "model.unknown=1"] {
            args.set_values = vec![bad.to_string()];
            assert!(matches!(build_config(&args), Err(CliError::Config(_))));
        }
    }
}
