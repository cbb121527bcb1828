use super::error::EngineError;
use super::variables::ParameterSpace;
use crate::core::forcefield::params::DihedralParameterSet;
use crate::core::forcefield::units::EnergyUnit;
use crate::core::models::fragment::Fragment;
use crate::core::models::ids::VariableId;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::trace;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Computes molecular-mechanics energies of a fragment's conformations under
/// the current dihedral parameters.
///
/// Implementations own everything about the simulation backend (topology
/// conversion, platform choice, ...). One energy per QM conformation must be
/// returned, in [`EnergyEvaluator::unit`].
pub trait EnergyEvaluator<S> {
    fn evaluate(
        &mut self,
        fragment: &Fragment<S>,
        parameters: &DihedralParameterSet,
        offset: f64,
    ) -> Result<Vec<f64>, BoxError>;

    fn unit(&self) -> EnergyUnit {
        EnergyUnit::KilojoulesPerMole
    }
}

impl<S, F> EnergyEvaluator<S> for F
where
    F: FnMut(&Fragment<S>, &DihedralParameterSet, f64) -> Result<Vec<f64>, BoxError>,
{
    fn evaluate(
        &mut self,
        fragment: &Fragment<S>,
        parameters: &DihedralParameterSet,
        offset: f64,
    ) -> Result<Vec<f64>, BoxError> {
        self(fragment, parameters, offset)
    }
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Energy evaluator failed for fragment '{fragment}': {source}")]
    Evaluator { fragment: String, source: BoxError },
    #[error("Energy evaluator returned {value} for conformation {index} of fragment '{fragment}'")]
    NonFiniteEnergy {
        fragment: String,
        index: usize,
        value: f64,
    },
    #[error(
        "Energy evaluator returned {found} energies for fragment '{fragment}', which has {expected} QM energies"
    )]
    LengthMismatch {
        fragment: String,
        expected: usize,
        found: usize,
    },
}

/// Log density of `Normal(mu, 1/tau)` at `x`.
#[inline]
pub fn normal_log_density(x: f64, mu: f64, tau: f64) -> f64 {
    0.5 * (tau / (2.0 * PI)).ln() - 0.5 * tau * (x - mu) * (x - mu)
}

/// Deterministic MM-energy node and the Normal likelihood of the QM data.
///
/// The concatenated QM energies are fixed at construction; the MM energies are
/// recomputed on every evaluation in the same fragment order.
#[derive(Debug, Clone)]
pub struct LikelihoodNode {
    qm_energy: Vec<f64>,
    fragment_offsets: Vec<VariableId>,
}

impl LikelihoodNode {
    pub fn new<S>(fragments: &[Fragment<S>], fragment_offsets: Vec<VariableId>) -> Self {
        let qm_energy = fragments
            .iter()
            .flat_map(|f| f.qm_energy.iter().copied())
            .collect();
        Self {
            qm_energy,
            fragment_offsets,
        }
    }

    /// Concatenated QM reference energies in kJ/mol.
    pub fn qm_energy(&self) -> &[f64] {
        &self.qm_energy
    }

    /// Evaluates every fragment against `parameters`, stores the result on the
    /// fragment and returns the concatenation aligned with [`Self::qm_energy`].
    pub fn compute_mm_energy<S, E>(
        &self,
        fragments: &mut [Fragment<S>],
        parameters: &DihedralParameterSet,
        space: &ParameterSpace,
        evaluator: &mut E,
    ) -> Result<Vec<f64>, EngineError>
    where
        E: EnergyEvaluator<S> + ?Sized,
    {
        if fragments.len() != self.fragment_offsets.len() {
            return Err(EngineError::Internal(format!(
                "{} fragments but {} offset handles",
                fragments.len(),
                self.fragment_offsets.len()
            )));
        }

        let unit = evaluator.unit();
        let mut mm = Vec::with_capacity(self.qm_energy.len());
        for (fragment, &offset_id) in fragments.iter_mut().zip(&self.fragment_offsets) {
            let offset = space.value(offset_id)?;
            let raw = evaluator
                .evaluate(fragment, parameters, offset)
                .map_err(|source| EvaluationError::Evaluator {
                    fragment: fragment.residue_name.clone(),
                    source,
                })?;
            if raw.len() != fragment.qm_energy.len() {
                return Err(EvaluationError::LengthMismatch {
                    fragment: fragment.residue_name.clone(),
                    expected: fragment.qm_energy.len(),
                    found: raw.len(),
                }
                .into());
            }
            if let Some((index, &value)) = raw.iter().enumerate().find(|(_, e)| !e.is_finite()) {
                return Err(EvaluationError::NonFiniteEnergy {
                    fragment: fragment.residue_name.clone(),
                    index,
                    value,
                }
                .into());
            }

            fragment.mm_energy = raw
                .into_iter()
                .map(|e| unit.to_kilojoules_per_mole(e))
                .collect();
            trace!(
                fragment = %fragment.residue_name,
                offset,
                "Computed {} MM energies.",
                fragment.mm_energy.len()
            );
            mm.extend_from_slice(&fragment.mm_energy);
        }
        Ok(mm)
    }

    /// `Σ log Normal(qm_i | mm_i, 1/precision)`.
    pub fn log_likelihood(&self, mm_energy: &[f64], precision: f64) -> f64 {
        self.qm_energy
            .iter()
            .zip(mm_energy)
            .map(|(&qm, &mm)| normal_log_density(qm, mm, precision))
            .sum()
    }
}
