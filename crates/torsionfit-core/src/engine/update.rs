use super::bitstring::MultiplicityBitstring;
use super::builder::TorsionHandles;
use super::config::{ModelConfig, PhasePolicy};
use super::error::EngineError;
use super::variables::ParameterSpace;
use crate::core::forcefield::params::{DihedralParameterSet, DihedralTerm, StoreError};
use crate::core::models::ids::VariableId;
use crate::core::models::torsion::Periodicity;
use std::collections::BTreeMap;
use tracing::{instrument, trace};

const PHASE_FLIP_THRESHOLD: f64 = 0.5;

/// Writes the current latent values into the parameter store.
///
/// For every term of every selected torsion, an active periodicity (its bit is
/// set, or `decouple_n` is on) receives its force constant and, depending on
/// the phase policy, its phase. An inactive periodicity has its force constant
/// zeroed. Both orientations of a torsion receive identical writes.
///
/// Under [`PhasePolicy::Standard`] only the first active term of a torsion has
/// its phase written; later active terms keep their stored phase while their
/// force constants are still written.
///
/// Calling this twice with unchanged latent values leaves the store unchanged.
#[instrument(skip_all, name = "update_parameters")]
pub fn update_parameters(
    parameters: &mut DihedralParameterSet,
    space: &ParameterSpace,
    torsions: &[TorsionHandles],
    config: &ModelConfig,
) -> Result<(), EngineError> {
    for handles in torsions {
        let raw = space.value(handles.bitstring)?;
        let bitstring =
            MultiplicityBitstring::from_value(raw).map_err(|source| EngineError::Bitstring {
                torsion: handles.torsion.clone(),
                source,
            })?;
        trace!(
            "Updating torsion {} with multiplicity bitstring {}.",
            handles.torsion, bitstring
        );

        ensure_complete(parameters, handles)?;
        parameters.update_terms(&handles.torsion, |terms: &mut Vec<DihedralTerm>| {
            apply_to_terms(terms, space, handles, bitstring, config)
        })?;
    }
    Ok(())
}

/// Fails if a periodicity with a force-constant variable has no term in the store.
pub(crate) fn ensure_complete(
    parameters: &DihedralParameterSet,
    handles: &TorsionHandles,
) -> Result<(), EngineError> {
    let terms = parameters
        .get_terms(&handles.torsion)
        .ok_or_else(|| StoreError::MissingTorsion(handles.torsion.clone()))?;
    match handles
        .force_constants
        .keys()
        .find(|&&m| !terms.iter().any(|t| t.periodicity == m))
    {
        Some(&periodicity) => Err(EngineError::MissingTerm {
            torsion: handles.torsion.clone(),
            periodicity,
        }),
        None => Ok(()),
    }
}

fn apply_to_terms(
    terms: &mut [DihedralTerm],
    space: &ParameterSpace,
    handles: &TorsionHandles,
    bitstring: MultiplicityBitstring,
    config: &ModelConfig,
) -> Result<(), EngineError> {
    let mut phase_written = false;
    for term in terms.iter_mut() {
        let periodicity = term.periodicity;
        if !(config.decouple_n || bitstring.contains(periodicity)) {
            term.force_constant = 0.0;
            continue;
        }
        if periodicity.is_five() && !config.sample_n5 {
            continue;
        }

        let k_id = handle(&handles.force_constants, handles, periodicity, "force constant")?;
        term.force_constant = space.value(k_id)?;

        match config.phase_policy {
            PhasePolicy::Standard => {
                if phase_written {
                    continue;
                }
                let phase_id = handle(&handles.phases, handles, periodicity, "phase")?;
                term.phase = if space.value(phase_id)? >= PHASE_FLIP_THRESHOLD {
                    180.0
                } else {
                    0.0
                };
                phase_written = true;
            }
            PhasePolicy::ContinuousPhase => {
                let phase_id = handle(&handles.phases, handles, periodicity, "phase")?;
                term.phase = space.value(phase_id)?;
            }
            PhasePolicy::PhaseEliminated => {}
        }
    }
    Ok(())
}

fn handle(
    map: &BTreeMap<Periodicity, VariableId>,
    handles: &TorsionHandles,
    periodicity: Periodicity,
    kind: &'static str,
) -> Result<VariableId, EngineError> {
    map.get(&periodicity)
        .copied()
        .ok_or_else(|| EngineError::MissingVariable {
            torsion: handles.torsion.clone(),
            periodicity,
            kind,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::fragment::Fragment;
    use crate::core::models::torsion::TorsionKey;
    use crate::engine::builder::{BuiltSpace, build_parameter_space};
    use crate::engine::config::ModelConfigBuilder;
    use crate::engine::variables::ParameterKey;

    fn key(s: &str) -> TorsionKey {
        s.parse().unwrap()
    }

    fn p(m: u8) -> Periodicity {
        Periodicity::new(m).unwrap()
    }

    fn term(m: u8, phase: f64, k: f64) -> DihedralTerm {
        DihedralTerm::new(p(m), phase, k)
    }

    fn config(policy: PhasePolicy, decouple: bool) -> ModelConfig {
        ModelConfigBuilder::new()
            .phase_policy(policy)
            .decouple_n(decouple)
            .build()
            .unwrap()
    }

    fn setup(policy: PhasePolicy, decouple: bool) -> (DihedralParameterSet, BuiltSpace, ModelConfig) {
        let mut set = DihedralParameterSet::new();
        set.insert(
            key("A-B-C-D"),
            vec![term(2, 0.0, 1.5), term(3, 180.0, 0.8)],
        );
        let cfg = config(policy, decouple);
        let frags = vec![Fragment::from_qm_energies("AAA", vec![0.0])];
        let built = build_parameter_space(&mut set, &[key("A-B-C-D")], &frags, &cfg).unwrap();
        (set, built, cfg)
    }

    fn force_constants(set: &DihedralParameterSet, k: &TorsionKey) -> Vec<(u8, f64)> {
        set.get_terms(k)
            .unwrap()
            .iter()
            .map(|t| (t.periodicity.get(), t.force_constant))
            .collect()
    }

    fn k_key(m: u8) -> ParameterKey {
        ParameterKey::ForceConstant {
            torsion: key("A-B-C-D"),
            periodicity: p(m),
        }
    }

    fn phase_key(m: u8) -> ParameterKey {
        ParameterKey::Phase {
            torsion: key("A-B-C-D"),
            periodicity: p(m),
        }
    }

    #[test]
    fn unchanged_latent_values_reproduce_the_input_force_constants() {
        let (mut set, built, cfg) = setup(PhasePolicy::Standard, false);
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        assert_eq!(
            force_constants(&set, &key("A-B-C-D")),
            vec![(2, 1.5), (3, 0.8), (1, 0.0), (4, 0.0), (6, 0.0)]
        );
    }

    #[test]
    fn both_orientations_stay_identical() {
        let (mut set, mut built, cfg) = setup(PhasePolicy::ContinuousPhase, false);
        built.space.set_by_key(&k_key(2), 3.25).unwrap();
        built.space.set_by_key(&phase_key(2), 42.0).unwrap();
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        let forward = set.get_terms(&key("A-B-C-D")).unwrap();
        let reverse = set.get_terms(&key("D-C-B-A")).unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward[0].force_constant, 3.25);
        assert_eq!(forward[0].phase, 42.0);
    }

    #[test]
    fn update_is_idempotent() {
        let (mut set, mut built, cfg) = setup(PhasePolicy::Standard, false);
        built.space.set_by_key(&k_key(3), 2.0).unwrap();
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();
        let once = set.clone();
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();
        assert_eq!(set, once);
    }

    #[test]
    fn cleared_bit_disables_the_term_but_keeps_its_phase() {
        let (mut set, mut built, cfg) = setup(PhasePolicy::ContinuousPhase, false);
        let bitstring = built.torsions[0].bitstring;
        // Only periodicity 2 active.
        built.space.set_value(bitstring, 2.0).unwrap();
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        let terms = set.get_terms(&key("A-B-C-D")).unwrap();
        assert_eq!(terms[0].force_constant, 1.5);
        assert_eq!(terms[1].force_constant, 0.0);
        assert_eq!(terms[1].phase, 180.0);
    }

    #[test]
    fn decouple_writes_every_force_constant_regardless_of_bitstring() {
        let (mut set, mut built, cfg) = setup(PhasePolicy::Standard, true);
        built.space.set_value(built.torsions[0].bitstring, 0.0).unwrap();
        for (m, k) in [(1, 0.1), (2, 0.2), (3, 0.3), (4, 0.4), (6, 0.6)] {
            built.space.set_by_key(&k_key(m), k).unwrap();
        }
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        assert_eq!(
            force_constants(&set, &key("A-B-C-D")),
            vec![(2, 0.2), (3, 0.3), (1, 0.1), (4, 0.4), (6, 0.6)]
        );
    }

    #[test]
    fn standard_policy_writes_only_the_first_active_phase() {
        let (mut set, mut built, cfg) = setup(PhasePolicy::Standard, false);
        built.space.set_by_key(&phase_key(2), 1.0).unwrap();
        built.space.set_by_key(&phase_key(3), 0.0).unwrap();
        built.space.set_by_key(&k_key(3), 1.1).unwrap();
        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        let terms = set.get_terms(&key("A-B-C-D")).unwrap();
        assert_eq!(terms[0].phase, 180.0);
        // Periodicity 3 keeps its stored phase, but its force constant is still written.
        assert_eq!(terms[1].phase, 180.0);
        assert_eq!(terms[1].force_constant, 1.1);
    }

    #[test]
    fn phase_eliminated_policy_never_writes_phases() {
        let mut set = DihedralParameterSet::new();
        set.insert(key("A-B-C-D"), vec![term(2, 180.0, 1.5)]);
        let cfg = config(PhasePolicy::PhaseEliminated, false);
        let frags = vec![Fragment::from_qm_energies("AAA", vec![0.0])];
        let mut built =
            build_parameter_space(&mut set, &[key("A-B-C-D")], &frags, &cfg).unwrap();
        built.space.set_by_key(&k_key(2), -4.0).unwrap();

        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        let terms = set.get_terms(&key("A-B-C-D")).unwrap();
        assert_eq!(terms[0].force_constant, -4.0);
        assert!(terms.iter().all(|t| t.phase == 0.0));
    }

    #[test]
    fn periodicity_five_is_left_alone_when_active_but_not_sampled() {
        let mut set = DihedralParameterSet::new();
        set.insert(key("A-B-C-D"), vec![term(5, 90.0, 0.7)]);
        let cfg = config(PhasePolicy::Standard, false);
        let frags = vec![Fragment::from_qm_energies("AAA", vec![0.0])];
        let mut built =
            build_parameter_space(&mut set, &[key("A-B-C-D")], &frags, &cfg).unwrap();
        built
            .space
            .set_value(built.torsions[0].bitstring, f64::from(p(5).mask()))
            .unwrap();

        update_parameters(&mut set, &built.space, &built.torsions, &cfg).unwrap();

        let terms = set.get_terms(&key("A-B-C-D")).unwrap();
        assert_eq!(terms[0].periodicity, p(5));
        assert_eq!(terms[0].force_constant, 0.7);
        assert_eq!(terms[0].phase, 90.0);
    }

    #[test]
    fn non_integral_bitstring_is_rejected() {
        let (mut set, built, cfg) = setup(PhasePolicy::Standard, false);
        let mut handles = built.torsions.clone();
        // Point the bitstring handle at a continuous variable.
        handles[0].bitstring = built.space.id(&k_key(2)).unwrap();
        let mut space = built.space.clone();
        space.set_by_key(&k_key(2), 1.5).unwrap();

        let result = update_parameters(&mut set, &space, &handles, &cfg);
        assert!(matches!(result, Err(EngineError::Bitstring { .. })));
    }

    #[test]
    fn missing_term_for_a_sampled_periodicity_is_fatal() {
        let (_, mut built, cfg) = setup(PhasePolicy::Standard, true);
        built.space.set_by_key(&k_key(4), 3.0).unwrap();
        let mut uncompleted = DihedralParameterSet::new();
        uncompleted.insert(key("A-B-C-D"), vec![term(2, 0.0, 1.5)]);

        let result = update_parameters(&mut uncompleted, &built.space, &built.torsions, &cfg);
        assert!(matches!(
            result,
            Err(EngineError::MissingTerm { periodicity, .. }) if periodicity == p(1)
        ));
        assert_eq!(force_constants(&uncompleted, &key("A-B-C-D")), vec![(2, 1.5)]);
    }
}
