use crate::core::forcefield::params::DihedralParameterSet;
use crate::core::forcefield::selection::{SelectionError, select_torsions};
use crate::core::models::fragment::Fragment;
use crate::core::models::torsion::TorsionKey;
use crate::engine::bitstring::MultiplicityBitstring;
use crate::engine::builder::{BuiltSpace, TorsionHandles, build_parameter_space};
use crate::engine::config::ModelConfig;
use crate::engine::error::EngineError;
use crate::engine::likelihood::{EnergyEvaluator, LikelihoodNode};
use crate::engine::update;
use crate::engine::variables::ParameterSpace;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Bayesian model of the torsion parameters of a force field.
///
/// The model owns the latent parameters and the fragments, and borrows the
/// dihedral parameter store exclusively: every evaluation writes the current
/// latent values into that store before handing it to the energy evaluator.
/// Sampling, acceptance and trace storage are left to the caller.
pub struct TorsionFitModel<'a, S = ()> {
    store: &'a mut DihedralParameterSet,
    config: ModelConfig,
    space: ParameterSpace,
    handles: Vec<TorsionHandles>,
    initial_bitstrings: Vec<MultiplicityBitstring>,
    fragments: Vec<Fragment<S>>,
    likelihood: LikelihoodNode,
}

impl<'a, S> TorsionFitModel<'a, S> {
    /// Selects the torsions to optimize, builds the latent parameter space and
    /// completes the store with placeholder terms for missing periodicities.
    ///
    /// `stream`, when given, is merged into `store` first; without an explicit
    /// torsion list in `config` it also decides which torsions are selected.
    #[instrument(skip_all, name = "torsion_fit_model")]
    pub fn new(
        store: &'a mut DihedralParameterSet,
        stream: Option<&DihedralParameterSet>,
        fragments: Vec<Fragment<S>>,
        config: ModelConfig,
    ) -> Result<Self, EngineError> {
        info!(policy = %config.phase_policy, "Building torsion fit model.");
        if fragments.is_empty() {
            warn!("No fragments given; the likelihood is constant.");
        }

        let torsions = select_torsions(store, stream, config.torsions_to_optimize.as_deref())?;
        let BuiltSpace {
            space,
            torsions: handles,
            fragment_offsets,
            log_sigma: _,
            initial_bitstrings,
        } = build_parameter_space(store, &torsions, &fragments, &config)?;
        let likelihood = LikelihoodNode::new(&fragments, fragment_offsets);

        info!(
            torsions = handles.len(),
            fragments = fragments.len(),
            observations = likelihood.qm_energy().len(),
            variables = space.len(),
            "Torsion fit model ready."
        );

        Ok(Self {
            store,
            config,
            space,
            handles,
            initial_bitstrings,
            fragments,
            likelihood,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The optimized torsions, in selection order.
    pub fn torsions(&self) -> impl Iterator<Item = &TorsionKey> {
        self.handles.iter().map(|h| &h.torsion)
    }

    /// Latent parameters, for a sampler to read and propose values.
    pub fn parameters(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSpace {
        &mut self.space
    }

    /// The dihedral parameter store as of the last update.
    pub fn store(&self) -> &DihedralParameterSet {
        &*self.store
    }

    pub fn fragments(&self) -> &[Fragment<S>] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<Fragment<S>> {
        self.fragments
    }

    /// Concatenated QM reference energies, aligned with [`Self::mm_energy`].
    pub fn qm_energy(&self) -> &[f64] {
        self.likelihood.qm_energy()
    }

    /// Bitstrings derived from the input force field, in selection order.
    pub fn initial_bitstrings(&self) -> &[MultiplicityBitstring] {
        &self.initial_bitstrings
    }

    /// Current value of the multiplicity bitstring of `torsion`.
    pub fn bitstring(&self, torsion: &TorsionKey) -> Result<MultiplicityBitstring, EngineError> {
        let handles = self
            .handles
            .iter()
            .find(|h| h.torsion.same_torsion(torsion))
            .ok_or_else(|| SelectionError::UnknownTorsion(torsion.clone()))?;
        MultiplicityBitstring::from_value(self.space.value(handles.bitstring)?).map_err(|source| {
            EngineError::Bitstring {
                torsion: handles.torsion.clone(),
                source,
            }
        })
    }

    /// Writes the current latent values into the store.
    pub fn update_parameters(&mut self) -> Result<(), EngineError> {
        update::update_parameters(self.store, &self.space, &self.handles, &self.config)
    }

    /// Updates the store, then evaluates every fragment.
    ///
    /// Returns the MM energies in kJ/mol, concatenated in fragment order.
    pub fn mm_energy<E>(&mut self, evaluator: &mut E) -> Result<Vec<f64>, EngineError>
    where
        E: EnergyEvaluator<S> + ?Sized,
    {
        self.update_parameters()?;
        self.likelihood
            .compute_mm_energy(&mut self.fragments, &*self.store, &self.space, evaluator)
    }

    pub fn log_prior(&self) -> f64 {
        self.space.log_prior()
    }

    pub fn log_likelihood<E>(&mut self, evaluator: &mut E) -> Result<f64, EngineError>
    where
        E: EnergyEvaluator<S> + ?Sized,
    {
        let mm = self.mm_energy(evaluator)?;
        let precision = self.space.precision()?;
        Ok(self.likelihood.log_likelihood(&mm, precision))
    }

    /// Log prior plus log likelihood. The evaluator is not called when the
    /// current values lie outside the prior support.
    pub fn log_posterior<E>(&mut self, evaluator: &mut E) -> Result<f64, EngineError>
    where
        E: EnergyEvaluator<S> + ?Sized,
    {
        let prior = self.log_prior();
        if prior == f64::NEG_INFINITY {
            debug!("Latent values lie outside the prior support.");
            return Ok(prior);
        }
        Ok(prior + self.log_likelihood(evaluator)?)
    }

    /// Current latent values by flat name, including `sigma` and `precision`.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.space.snapshot()
    }

    /// Replaces every latent value with a draw from its prior.
    pub fn draw_from_prior<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.space.draw_from_prior(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::DihedralTerm;
    use crate::core::models::torsion::Periodicity;
    use crate::engine::config::{ModelConfigBuilder, PhasePolicy};
    use crate::engine::likelihood::BoxError;
    use crate::engine::variables::ParameterKey;

    fn key(s: &str) -> TorsionKey {
        s.parse().unwrap()
    }

    fn term(m: u8, phase: f64, k: f64) -> DihedralTerm {
        DihedralTerm::new(Periodicity::new(m).unwrap(), phase, k)
    }

    fn stream() -> DihedralParameterSet {
        let mut stream = DihedralParameterSet::new();
        stream.insert(
            key("CG331-CG321-CG321-CG331"),
            vec![term(2, 0.0, 1.5), term(3, 180.0, 0.8)],
        );
        stream
    }

    fn zero_evaluator(
        fragment: &Fragment,
        _: &DihedralParameterSet,
        offset: f64,
    ) -> Result<Vec<f64>, BoxError> {
        Ok(vec![offset; fragment.qm_energy.len()])
    }

    fn standard() -> ModelConfig {
        ModelConfigBuilder::new()
            .phase_policy(PhasePolicy::Standard)
            .build()
            .unwrap()
    }

    #[test]
    fn new_selects_stream_torsions_and_seeds_bitstrings() {
        let mut base = DihedralParameterSet::new();
        let frags = vec![Fragment::from_qm_energies("BUTA", vec![0.0, 1.0])];
        let model = TorsionFitModel::new(&mut base, Some(&stream()), frags, standard()).unwrap();

        assert_eq!(
            model.torsions().cloned().collect::<Vec<_>>(),
            vec![key("CG331-CG321-CG321-CG331")]
        );
        assert_eq!(model.initial_bitstrings()[0].bits(), 6);
        assert_eq!(
            model.bitstring(&key("CG331-CG321-CG321-CG331")).unwrap().bits(),
            6
        );
        assert_eq!(model.store().get_terms(&key("CG331-CG321-CG321-CG331")).unwrap().len(), 5);
    }

    #[test]
    fn new_without_stream_or_list_fails() {
        let mut base = DihedralParameterSet::new();
        let result = TorsionFitModel::new(&mut base, None, Vec::<Fragment>::new(), standard());
        assert!(matches!(
            result,
            Err(EngineError::Selection(SelectionError::NothingToOptimize))
        ));
    }

    #[test]
    fn bitstring_of_unselected_torsion_is_an_error() {
        let mut base = DihedralParameterSet::new();
        let model =
            TorsionFitModel::new(&mut base, Some(&stream()), Vec::<Fragment>::new(), standard())
                .unwrap();
        assert!(matches!(
            model.bitstring(&key("X-Y-Z-W")),
            Err(EngineError::Selection(SelectionError::UnknownTorsion(_)))
        ));
    }

    #[test]
    fn mm_energy_applies_offsets_per_fragment() {
        let mut base = DihedralParameterSet::new();
        let frags = vec![
            Fragment::from_qm_energies("AAA", vec![0.0, 0.0]),
            Fragment::from_qm_energies("BBB", vec![0.0]),
        ];
        let mut model = TorsionFitModel::new(&mut base, Some(&stream()), frags, standard()).unwrap();
        model
            .parameters_mut()
            .set_by_key(
                &ParameterKey::Offset {
                    residue: "BBB".to_string(),
                },
                7.0,
            )
            .unwrap();

        let mm = model.mm_energy(&mut zero_evaluator).unwrap();
        assert_eq!(mm, vec![0.0, 0.0, 7.0]);
        assert_eq!(model.fragments()[1].mm_energy, vec![7.0]);
    }

    #[test]
    fn log_posterior_is_prior_plus_likelihood() {
        let mut base = DihedralParameterSet::new();
        let frags = vec![Fragment::from_qm_energies("AAA", vec![0.0])];
        let mut model = TorsionFitModel::new(&mut base, Some(&stream()), frags, standard()).unwrap();
        let mut calls = 0;
        let mut counting = |f: &Fragment, p: &DihedralParameterSet, o: f64| {
            calls += 1;
            zero_evaluator(f, p, o)
        };

        let inside = model.log_posterior(&mut counting).unwrap();
        assert!(inside.is_finite());
        assert_eq!(calls, 1);
        let precision = model.parameters().precision().unwrap();
        let expected = model.log_prior() + model.likelihood.log_likelihood(&[0.0], precision);
        assert!((inside - expected).abs() < 1e-9);
    }

    #[test]
    fn snapshot_contains_every_flat_name() {
        let mut base = DihedralParameterSet::new();
        let frags = vec![Fragment::from_qm_energies("AAA", vec![0.0])];
        let model = TorsionFitModel::new(&mut base, Some(&stream()), frags, standard()).unwrap();
        let snapshot = model.snapshot();

        for name in [
            "CG331_CG321_CG321_CG331_2_K",
            "CG331_CG321_CG321_CG331_3_Phase",
            "CG331_CG321_CG321_CG331_multiplicity_bitstring",
            "AAA_offset",
            "log_sigma",
            "sigma",
            "precision",
        ] {
            assert!(snapshot.contains_key(name), "missing {name}");
        }
        assert!((snapshot["sigma"] - 0.01).abs() < 1e-12);
    }
}
