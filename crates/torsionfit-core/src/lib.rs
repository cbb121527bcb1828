//! # TorsionFit Core Library
//!
//! Bayesian fitting of CHARMM-style torsion parameters (force constants, phase
//! angles and periodicities) against quantum-mechanical torsion scans.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Torsion keys, the dihedral parameter store,
//!   fragments with their QM reference energies, and torsion selection.
//!
//! - **[`engine`]: The Model Machinery.** The typed latent-parameter registry,
//!   the multiplicity bitstring codec, the parameter-space builder for each
//!   phase policy, missing-multiplicity completion, the force-field updater and
//!   the energy likelihood node.
//!
//! - **[`workflows`]: The Public API.** [`workflows::fit::TorsionFitModel`]
//!   wires the engine together and exposes the latent parameters, the
//!   deterministic MM-energy node and the log densities an external sampler
//!   needs.
//!
//! The molecular-mechanics energy evaluator and the sampler are supplied by the
//! caller; see [`engine::likelihood::EnergyEvaluator`].

pub mod core;
pub mod engine;
pub mod workflows;
