use super::bitstring::MultiplicityBitstring;
use super::completion::add_missing_multiplicities;
use super::config::{ModelConfig, PhasePolicy};
use super::error::EngineError;
use super::update::ensure_complete;
use super::variables::{Domain, ParameterKey, ParameterSpace};
use crate::core::forcefield::params::{DihedralParameterSet, DihedralTerm, StoreError};
use crate::core::models::fragment::Fragment;
use crate::core::models::ids::VariableId;
use crate::core::models::torsion::{Periodicity, TorsionKey};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const OFFSET_BOUNDS: (f64, f64) = (-50.0, 50.0);
pub const LOG_SIGMA_BOUNDS: (f64, f64) = (-10.0, 3.0);
pub const INITIAL_SIGMA: f64 = 0.01;
pub const PHASE_BOUNDS: (f64, f64) = (0.0, 180.0);

const PHASE_TOLERANCE: f64 = 1e-6;

/// Handles of the latent variables that drive one optimized torsion.
#[derive(Debug, Clone)]
pub struct TorsionHandles {
    pub torsion: TorsionKey,
    pub bitstring: VariableId,
    pub force_constants: BTreeMap<Periodicity, VariableId>,
    /// Empty under [`PhasePolicy::PhaseEliminated`].
    pub phases: BTreeMap<Periodicity, VariableId>,
}

#[derive(Debug, Clone)]
pub struct BuiltSpace {
    pub space: ParameterSpace,
    pub torsions: Vec<TorsionHandles>,
    /// Offset handle for each fragment, parallel to the fragment list.
    pub fragment_offsets: Vec<VariableId>,
    pub log_sigma: VariableId,
    pub initial_bitstrings: Vec<MultiplicityBitstring>,
}

/// Creates the latent parameters for the selected torsions and pads the store
/// so that every candidate periodicity has a term to write to.
///
/// The parameter store is read for initial values. Under
/// [`PhasePolicy::PhaseEliminated`] it is also modified: every phase except
/// that of periodicity 5 is set to 0 first.
pub fn build_parameter_space<S>(
    parameters: &mut DihedralParameterSet,
    torsions: &[TorsionKey],
    fragments: &[Fragment<S>],
    config: &ModelConfig,
) -> Result<BuiltSpace, EngineError> {
    let candidates = config.candidate_periodicities();
    let mut space = ParameterSpace::new();

    if !config.phase_policy.has_phase_variables() {
        zero_phases(parameters, torsions)?;
    }

    let fragment_offsets = register_offsets(&mut space, fragments)?;

    let mut handles = Vec::with_capacity(torsions.len());
    let mut initial_bitstrings = Vec::with_capacity(torsions.len());
    for torsion in torsions {
        let terms = parameters
            .get_terms(torsion)
            .ok_or_else(|| StoreError::MissingTorsion(torsion.clone()))?;
        let (torsion_handles, bitstring) =
            register_torsion(&mut space, torsion, terms, &candidates, config.phase_policy)?;
        debug!(
            "Torsion {} starts with multiplicity bitstring {}.",
            torsion, bitstring
        );
        handles.push(torsion_handles);
        initial_bitstrings.push(bitstring);
    }

    let log_sigma = space.register(
        ParameterKey::LogSigma,
        Domain::Uniform {
            lower: LOG_SIGMA_BOUNDS.0,
            upper: LOG_SIGMA_BOUNDS.1,
        },
        INITIAL_SIGMA.ln(),
    )?;

    add_missing_multiplicities(parameters, torsions, &candidates)?;
    for torsion_handles in &handles {
        ensure_complete(parameters, torsion_handles)?;
    }

    info!(
        policy = %config.phase_policy,
        num_variables = space.len(),
        "Built latent parameter space."
    );

    Ok(BuiltSpace {
        space,
        torsions: handles,
        fragment_offsets,
        log_sigma,
        initial_bitstrings,
    })
}

fn zero_phases(
    parameters: &mut DihedralParameterSet,
    torsions: &[TorsionKey],
) -> Result<(), StoreError> {
    for torsion in torsions {
        parameters.update_terms(torsion, |terms: &mut Vec<DihedralTerm>| {
            for term in terms.iter_mut().filter(|t| !t.periodicity.is_five()) {
                term.phase = 0.0;
            }
            Ok::<_, StoreError>(())
        })?;
    }
    Ok(())
}

/// One offset per distinct residue name; fragments sharing a residue share the offset.
fn register_offsets<S>(
    space: &mut ParameterSpace,
    fragments: &[Fragment<S>],
) -> Result<Vec<VariableId>, EngineError> {
    let mut by_residue: BTreeMap<&str, VariableId> = BTreeMap::new();
    let mut offsets = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let id = match by_residue.get(fragment.residue_name.as_str()) {
            Some(&id) => {
                warn!(
                    "Fragment residue '{}' appears more than once; its fragments share one offset.",
                    fragment.residue_name
                );
                id
            }
            None => {
                let id = space.register(
                    ParameterKey::Offset {
                        residue: fragment.residue_name.clone(),
                    },
                    Domain::Uniform {
                        lower: OFFSET_BOUNDS.0,
                        upper: OFFSET_BOUNDS.1,
                    },
                    0.0,
                )?;
                by_residue.insert(fragment.residue_name.as_str(), id);
                id
            }
        };
        offsets.push(id);
    }
    Ok(offsets)
}

fn register_torsion(
    space: &mut ParameterSpace,
    torsion: &TorsionKey,
    terms: &[DihedralTerm],
    candidates: &[Periodicity],
    policy: PhasePolicy,
) -> Result<(TorsionHandles, MultiplicityBitstring), EngineError> {
    let (k_lower, k_upper) = policy.force_constant_bounds();
    let mut bitstring = MultiplicityBitstring::empty();
    let mut force_constants = BTreeMap::new();
    let mut phases = BTreeMap::new();

    for &periodicity in candidates {
        let existing = terms.iter().find(|t| t.periodicity == periodicity);
        if existing.is_some() {
            bitstring.insert(periodicity);
        }

        let k_id = space.register(
            ParameterKey::ForceConstant {
                torsion: torsion.clone(),
                periodicity,
            },
            Domain::Uniform {
                lower: k_lower,
                upper: k_upper,
            },
            existing.map_or(0.0, |t| t.force_constant),
        )?;
        force_constants.insert(periodicity, k_id);

        let phase_key = ParameterKey::Phase {
            torsion: torsion.clone(),
            periodicity,
        };
        let phase_id = match policy {
            PhasePolicy::Standard => Some(space.register(
                phase_key,
                Domain::DiscreteUniform { lower: 0, upper: 1 },
                existing.map_or(0.0, |t| phase_indicator(torsion, t)),
            )?),
            PhasePolicy::ContinuousPhase => Some(space.register(
                phase_key,
                Domain::Uniform {
                    lower: PHASE_BOUNDS.0,
                    upper: PHASE_BOUNDS.1,
                },
                existing.map_or(0.0, |t| t.phase),
            )?),
            PhasePolicy::PhaseEliminated => None,
        };
        if let Some(id) = phase_id {
            phases.insert(periodicity, id);
        }
    }

    let bitstring_id = space.register(
        ParameterKey::MultiplicityBitstring {
            torsion: torsion.clone(),
        },
        Domain::DiscreteUniform {
            lower: 0,
            upper: MultiplicityBitstring::MAX as i64,
        },
        bitstring.into(),
    )?;

    Ok((
        TorsionHandles {
            torsion: torsion.clone(),
            bitstring: bitstring_id,
            force_constants,
            phases,
        },
        bitstring,
    ))
}

/// Binary phase indicator: 1 for a 180° term, 0 otherwise.
fn phase_indicator(torsion: &TorsionKey, term: &DihedralTerm) -> f64 {
    if (term.phase - 180.0).abs() < PHASE_TOLERANCE {
        1.0
    } else {
        if term.phase.abs() >= PHASE_TOLERANCE {
            warn!(
                "Torsion {} periodicity {} has phase {}°, which the binary phase indicator cannot represent; starting from 0°.",
                torsion, term.periodicity, term.phase
            );
        }
        0.0
    }
}
