use thiserror::Error;

use super::bitstring::BitstringError;
use super::config::ConfigError;
use super::likelihood::EvaluationError;
use super::variables::VariableError;
use crate::core::forcefield::params::StoreError;
use crate::core::forcefield::selection::SelectionError;
use crate::core::models::torsion::{Periodicity, TorsionKey};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid model configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Torsion selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("Parameter store error: {0}")]
    Store(#[from] StoreError),

    #[error("Latent parameter error: {0}")]
    Variable(#[from] VariableError),

    #[error("Invalid multiplicity bitstring for torsion {torsion}: {source}")]
    Bitstring {
        torsion: TorsionKey,
        source: BitstringError,
    },

    #[error("No {kind} variable is registered for torsion {torsion}, periodicity {periodicity}")]
    MissingVariable {
        torsion: TorsionKey,
        periodicity: Periodicity,
        kind: &'static str,
    },

    #[error("Torsion {torsion} has no term with periodicity {periodicity} after completion")]
    MissingTerm {
        torsion: TorsionKey,
        periodicity: Periodicity,
    },

    #[error("Energy evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
