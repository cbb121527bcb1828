use crate::core::models::torsion::{Periodicity, TorsionKey, candidate_periodicities};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Option '{option}' is not supported by the {policy} phase policy")]
    UnsupportedOption {
        option: &'static str,
        policy: PhasePolicy,
    },
}

/// How phase angles are represented in the latent parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhasePolicy {
    /// Force constants in [0, 20] with a binary phase indicator (0° or 180°) per periodicity.
    #[default]
    Standard,
    /// Force constants in [0, 20] with a continuous phase in [0°, 180°] per periodicity.
    ContinuousPhase,
    /// All phases fixed at 0°; force constants in [-20, 20] so the sign plays the role of a 180° flip.
    PhaseEliminated,
}

impl PhasePolicy {
    pub fn force_constant_bounds(self) -> (f64, f64) {
        match self {
            PhasePolicy::Standard | PhasePolicy::ContinuousPhase => (0.0, 20.0),
            PhasePolicy::PhaseEliminated => (-20.0, 20.0),
        }
    }

    pub fn has_phase_variables(self) -> bool {
        !matches!(self, PhasePolicy::PhaseEliminated)
    }
}

impl fmt::Display for PhasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhasePolicy::Standard => write!(f, "standard"),
            PhasePolicy::ContinuousPhase => write!(f, "continuous-phase"),
            PhasePolicy::PhaseEliminated => write!(f, "phase-eliminated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub phase_policy: PhasePolicy,
    /// Ignore the multiplicity bitstrings and always write every candidate periodicity.
    pub decouple_n: bool,
    /// Sample periodicity 5 as well. Only valid with [`PhasePolicy::PhaseEliminated`].
    pub sample_n5: bool,
    /// Explicit torsions to optimize. When `None`, they are derived from a parameter stream.
    pub torsions_to_optimize: Option<Vec<TorsionKey>>,
}

impl ModelConfig {
    pub fn candidate_periodicities(&self) -> Vec<Periodicity> {
        candidate_periodicities(self.sample_n5)
    }
}

#[derive(Default)]
pub struct ModelConfigBuilder {
    phase_policy: Option<PhasePolicy>,
    decouple_n: Option<bool>,
    sample_n5: Option<bool>,
    torsions_to_optimize: Option<Vec<TorsionKey>>,
}

impl ModelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase_policy(mut self, policy: PhasePolicy) -> Self {
        self.phase_policy = Some(policy);
        self
    }
    pub fn decouple_n(mut self, decouple: bool) -> Self {
        self.decouple_n = Some(decouple);
        self
    }
    pub fn sample_n5(mut self, sample: bool) -> Self {
        self.sample_n5 = Some(sample);
        self
    }
    pub fn torsions_to_optimize(mut self, torsions: Vec<TorsionKey>) -> Self {
        self.torsions_to_optimize = Some(torsions);
        self
    }

    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        let phase_policy = self
            .phase_policy
            .ok_or(ConfigError::MissingParameter("phase_policy"))?;
        let sample_n5 = self.sample_n5.unwrap_or(false);
        if sample_n5 && phase_policy != PhasePolicy::PhaseEliminated {
            return Err(ConfigError::UnsupportedOption {
                option: "sample_n5",
                policy: phase_policy,
            });
        }
        Ok(ModelConfig {
            phase_policy,
            decouple_n: self.decouple_n.unwrap_or(false),
            sample_n5,
            torsions_to_optimize: self.torsions_to_optimize,
        })
    }
}
